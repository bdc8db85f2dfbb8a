//! Hsieh's SuperFastHash, used to bucket table entries into the fixed
//! 2048-slot dedup table.
//!
//! Ported from the widely-circulated public-domain 32-bit variant; kept as
//! a free function rather than a trait so it can be unit-tested against
//! known vectors independent of [`crate::table::Table`].

#[must_use]
pub fn hsieh_hash(data: &[u8], mut hash: u32) -> u32 {
    if data.is_empty() {
        return hash;
    }

    let len = data.len() as u32;
    hash = hash.wrapping_add(len);

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let data0 = u16::from_le_bytes([chunk[0], chunk[1]]) as u32;
        let data1 = u16::from_le_bytes([chunk[2], chunk[3]]) as u32;
        hash = hash.wrapping_add(data0);
        let tmp = (data1 << 11).wrapping_sub(hash.rotate_left(16));
        hash = (hash << 16) ^ tmp;
        hash = hash.wrapping_add(hash >> 11);
    }

    let rem = chunks.remainder();
    match rem.len() {
        3 => {
            let data0 = u16::from_le_bytes([rem[0], rem[1]]) as u32;
            hash = hash.wrapping_add(data0);
            hash ^= hash << 16;
            hash ^= u32::from(rem[2]) << 18;
            hash = hash.wrapping_add(hash >> 11);
        }
        2 => {
            let data0 = u16::from_le_bytes([rem[0], rem[1]]) as u32;
            hash = hash.wrapping_add(data0);
            hash ^= hash << 11;
            hash = hash.wrapping_add(hash >> 17);
        }
        1 => {
            hash = hash.wrapping_add(u32::from(rem[0]));
            hash ^= hash << 10;
            hash = hash.wrapping_add(hash >> 1);
        }
        _ => {}
    }

    hash ^= hash << 3;
    hash = hash.wrapping_add(hash >> 5);
    hash ^= hash << 4;
    hash = hash.wrapping_add(hash >> 17);
    hash ^= hash << 25;
    hash = hash.wrapping_add(hash >> 6);
    hash
}

/// Convenience wrapper over a slice of `u32` words (the shape
/// [`crate::color::ColorInfo::hash_words`] and raw color samples come in).
#[must_use]
pub fn hsieh_hash_words(words: &[u32], seed: u32) -> u32 {
    let mut buf = Vec::with_capacity(words.len() * 4);
    for w in words {
        buf.extend_from_slice(&w.to_le_bytes());
    }
    hsieh_hash(&buf, seed)
}
