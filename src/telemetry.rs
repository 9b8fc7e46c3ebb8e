use crate::config::LogFormat;
use tracing::dispatcher::{self, DefaultGuard, Dispatch};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// RUST_LOG overrides the default `info` filter.
/// Output goes to stderr so stdout stays usable for command output.
fn dispatch(format: LogFormat) -> Dispatch {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => Dispatch::new(
            registry.with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            ),
        ),
        LogFormat::Text => Dispatch::new(
            registry.with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            ),
        ),
    }
}

/// Install the global subscriber
pub fn init_tracing(format: LogFormat) {
    dispatch(format).init();
}

/// Subscriber for the current thread until the guard is dropped.
/// The terminal UI drops it before taking over the screen.
pub fn scoped_tracing(format: LogFormat) -> DefaultGuard {
    dispatcher::set_default(&dispatch(format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::subscriber::NoSubscriber;

    fn has_subscriber() -> bool {
        dispatcher::get_default(|current| !current.is::<NoSubscriber>())
    }

    #[test]
    fn test_scoped_subscriber_ends_with_guard() {
        assert!(!has_subscriber());

        let guard = scoped_tracing(LogFormat::Text);
        assert!(has_subscriber());
        tracing::info!("visible while the guard lives");
        drop(guard);

        assert!(!has_subscriber());
    }

    #[test]
    fn test_scoped_json_subscriber() {
        let _guard = scoped_tracing(LogFormat::Json);
        assert!(has_subscriber());
    }
}
