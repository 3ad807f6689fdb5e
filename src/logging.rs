//! Logging setup. Installs `env_logger` reading `RUST_LOG` (default `info`),
//! matching the severities of the original engine's logger
//! (trace/debug/info/warning/error, plus `fatal` in [`crate::error`]).

pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
