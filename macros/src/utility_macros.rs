/// Locks a mutex and runs a block with the guard bound to `$lock`.
///
/// Used around the shared pool/purge-list state (`BackdropShared`) so the
/// lock-poisoned path has one place to fall back to a default rather than
/// unwrapping at every call site.
#[macro_export]
macro_rules! acquire_lock {
    ($mutex:expr, $lock:ident => $exec:block ) => {
        match $mutex.lock() {
            #[allow(unused_mut)]
            Ok(mut $lock) => $exec,
            _ => Default::default(),
        }
    };
}

/// Debug-only structural assertion, elided in release builds.
///
/// Load-bearing for property tests, but too costly to run per-pixel in a
/// release RIP.
#[macro_export]
macro_rules! assert_invariant {
    ($cond:expr) => {
        debug_assert!($cond, "invariant violated: {}", stringify!($cond));
    };
    ($cond:expr, $($arg:tt)+) => {
        debug_assert!($cond, $($arg)+);
    };
}
