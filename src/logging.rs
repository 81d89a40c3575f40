// Logging setup
// RUST_LOG wins when set, otherwise the given default filter applies

use env_logger::{Builder, Env, WriteStyle};

/// Install the env_logger backend. Safe to call more than once.
pub fn init(default_filter: &str) {
    let style = if atty::is(atty::Stream::Stderr) {
        WriteStyle::Auto
    } else {
        WriteStyle::Never
    };

    let result = Builder::from_env(Env::default().default_filter_or(default_filter))
        .write_style(style)
        .format_timestamp_millis()
        .try_init();

    if result.is_ok() {
        log::debug!("Logging initialised (default filter: {})", default_filter);
    }
}
