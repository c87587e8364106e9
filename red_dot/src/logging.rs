use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "RED_DOT_LOG";

/// Install the global log subscriber.
///
/// Defaults to `info` (`debug` when `debug` is set) unless overridden by
/// `RED_DOT_LOG`.  Safe to call more than once.
pub fn init(debug: bool) {
    let default = if debug { LevelFilter::DEBUG } else { LevelFilter::INFO };
    let filter = EnvFilter::builder()
        .with_env_var(LOG_ENV)
        .with_default_directive(default.into())
        .from_env_lossy();

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_thread_names(true),
        )
        .try_init();
}
