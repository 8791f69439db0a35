//! Logger setup for binaries and examples using this crate.
use log::LevelFilter;

/// Install an `env_logger` logger at `level`.
///
/// `RUST_LOG` still takes precedence for individual modules. Calling this more
/// than once is harmless; later calls are ignored.
pub fn init_logging(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_env("RUST_LOG")
        .format_timestamp_millis()
        .try_init();
}
