//! Logging bootstrap
//!
//! Library code only uses the `log` facade. Binaries and tests call one of
//! these to install `env_logger` as the backend.

/// Install `env_logger`, honouring `RUST_LOG` and defaulting to `info`
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Install a test-friendly logger that writes through the test harness
pub fn init_test_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init();
}
