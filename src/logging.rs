use tracing::Level;
use tracing_subscriber::fmt;

/// JSON logs on stdout. Span context is left out; the interesting fields on
/// the byte-level traces are the event fields themselves.
pub fn setup_logging(level: Level) {
    fmt()
        .json()
        .with_max_level(level)
        .with_current_span(false)
        .with_span_list(false)
        .init()
}
