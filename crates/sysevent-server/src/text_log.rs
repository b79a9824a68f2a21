//! Bridge from `tracing` events into the `text_log` system log.
//!
//! [`TextLogLayer`] is installed in the subscriber before the database is
//! open, so it starts detached and is pointed at the `text_log` log with
//! [`TextLogLayer::attach`] once the logs exist. Until then (or when
//! `text_log` is disabled) events only reach the formatter.
//!
//! Events whose target lies inside `sysevent_log` are never copied: the flush
//! worker's own diagnostics must not feed records back into a queue.
//!
//! [`subscriber`] filters the formatter and this layer independently, so
//! `logging.text_log_level` may be more verbose than `logging.level`.

use chrono::Utc;
use std::fmt::{self, Write as _};
use std::sync::{Arc, OnceLock};
use sysevent_log::SystemLog;
use sysevent_types::{LogLevel, TextLog};
use tracing::field::{Field, Visit};
use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::{fmt as ts_fmt, EnvFilter, Registry};

use crate::config::LoggingConfig;

const SELF_TARGET: &str = "sysevent_log";

/// A `tracing_subscriber` layer that appends events to `text_log`.
#[derive(Clone)]
pub struct TextLogLayer {
    log: Arc<OnceLock<Arc<SystemLog<TextLog>>>>,
    min_level: LogLevel,
}

impl TextLogLayer {
    /// Creates a detached layer copying events at `min_level` or more severe.
    pub fn new(min_level: LogLevel) -> Self {
        Self {
            log: Arc::new(OnceLock::new()),
            min_level,
        }
    }

    /// The per-layer filter matching `min_level`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.min_level {
            LogLevel::Fatal | LogLevel::Critical | LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Notice | LogLevel::Information => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// Starts copying events into `log`. Only the first call takes effect.
    pub fn attach(&self, log: Arc<SystemLog<TextLog>>) {
        if self.log.set(log).is_err() {
            tracing::warn!("text log layer is already attached");
        }
    }
}

/// Builds the process subscriber: the formatter filtered by `logging.level`
/// and `text_log` filtered by its own level.
pub fn subscriber(
    logging: &LoggingConfig,
    text_log: &TextLogLayer,
) -> impl Subscriber + Send + Sync + 'static {
    let filter = EnvFilter::try_new(&logging.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = if logging.json {
        ts_fmt::layer().json().with_filter(filter).boxed()
    } else {
        ts_fmt::layer().with_filter(filter).boxed()
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(text_log.clone().with_filter(text_log.level_filter()))
}

fn to_log_level(level: &Level) -> LogLevel {
    match *level {
        Level::ERROR => LogLevel::Error,
        Level::WARN => LogLevel::Warning,
        Level::INFO => LogLevel::Information,
        Level::DEBUG => LogLevel::Debug,
        Level::TRACE => LogLevel::Trace,
    }
}

/// Collects the message and the remaining fields as `key=value` pairs.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
    query_id: String,
}

impl MessageVisitor {
    fn push_field(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.fields.is_empty() {
            self.fields.push(' ');
        }
        let _ = write!(self.fields, "{}={}", name, value);
    }

    fn finish(self) -> (String, String) {
        let message = match (self.message.is_empty(), self.fields.is_empty()) {
            (_, true) => self.message,
            (true, false) => self.fields,
            (false, false) => format!("{} {}", self.message, self.fields),
        };
        (message, self.query_id)
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message.push_str(value),
            "query_id" => self.query_id = value.to_string(),
            name => self.push_field(name, format_args!("{}", value)),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => {
                let _ = write!(self.message, "{:?}", value);
            }
            "query_id" => self.query_id = format!("{:?}", value),
            name => self.push_field(name, format_args!("{:?}", value)),
        }
    }
}

impl<S: Subscriber> Layer<S> for TextLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if metadata.target().starts_with(SELF_TARGET) {
            return;
        }
        let level = to_log_level(metadata.level());
        if level > self.min_level {
            return;
        }
        let Some(log) = self.log.get() else {
            return;
        };

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let (message, query_id) = visitor.finish();

        log.add(TextLog {
            event_time: Utc::now(),
            thread_name: std::thread::current()
                .name()
                .unwrap_or("unnamed")
                .to_string(),
            level,
            query_id,
            logger_name: metadata.target().to_string(),
            message,
            source_file: metadata.file().map(str::to_string),
            source_line: metadata.line(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use sysevent_log::{LogSettings, LogSink, SinkError};

    #[derive(Default)]
    struct CapturingSink {
        records: Mutex<Vec<(LogLevel, String, String, String)>>,
    }

    impl LogSink<TextLog> for CapturingSink {
        fn ensure_destination_exists(&self) -> Result<(), SinkError> {
            Ok(())
        }

        fn persist_batch(&self, records: &[TextLog]) -> Result<(), SinkError> {
            let mut captured = self.records.lock().unwrap();
            for record in records {
                captured.push((
                    record.level,
                    record.logger_name.clone(),
                    record.message.clone(),
                    record.query_id.clone(),
                ));
            }
            Ok(())
        }
    }

    fn attached(min_level: LogLevel) -> (TextLogLayer, Arc<SystemLog<TextLog>>, Arc<CapturingSink>) {
        let sink = Arc::new(CapturingSink::default());
        let log = Arc::new(SystemLog::new(
            sink.clone(),
            LogSettings::new(64, Duration::from_secs(60)),
        ));
        log.startup();
        let layer = TextLogLayer::new(min_level);
        layer.attach(log.clone());
        (layer, log, sink)
    }

    #[test]
    fn copies_events_at_or_above_min_level() {
        let (layer, log, sink) = attached(LogLevel::Information);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!(target: "merge", part = "all_1_1_0", "merge took too long");
            tracing::info!(target: "executor", query_id = "q-42", "query finished");
            tracing::debug!(target: "executor", "too verbose");
        });

        assert!(log.flush(false).complete);
        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0],
            (
                LogLevel::Warning,
                "merge".to_string(),
                "merge took too long part=all_1_1_0".to_string(),
                String::new(),
            )
        );
        assert_eq!(records[1].0, LogLevel::Information);
        assert_eq!(records[1].2, "query finished");
        assert_eq!(records[1].3, "q-42");
    }

    #[test]
    fn skips_events_from_the_logging_core() {
        let (layer, log, sink) = attached(LogLevel::Trace);
        let subscriber = tracing_subscriber::registry().with(layer);

        tracing::subscriber::with_default(subscriber, || {
            tracing::error!(target: "sysevent_log::worker", "failed to flush");
            tracing::info!(target: "sysevent_server", "still copied");
        });

        assert!(log.flush(false).complete);
        let records = sink.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1, "sysevent_server");
    }

    #[test]
    fn detached_layer_drops_events() {
        let layer = TextLogLayer::new(LogLevel::Trace);
        let subscriber = tracing_subscriber::registry().with(layer);
        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("nowhere to go");
        });
    }

    #[test]
    fn text_log_level_is_independent_of_the_formatter_filter() {
        let (layer, log, sink) = attached(LogLevel::Debug);
        let logging = LoggingConfig {
            level: "warn".to_string(),
            json: false,
            text_log_level: "debug".to_string(),
        };

        tracing::subscriber::with_default(subscriber(&logging, &layer), || {
            tracing::info!(target: "executor", "query started");
            tracing::debug!(target: "executor", "plan chosen");
            tracing::trace!(target: "executor", "too verbose");
        });

        assert!(log.flush(false).complete);
        let records = sink.records.lock().unwrap();
        let levels: Vec<LogLevel> = records.iter().map(|record| record.0).collect();
        assert_eq!(levels, vec![LogLevel::Information, LogLevel::Debug]);
    }

    #[test]
    fn level_filter_follows_min_level() {
        assert_eq!(TextLogLayer::new(LogLevel::Critical).level_filter(), LevelFilter::ERROR);
        assert_eq!(TextLogLayer::new(LogLevel::Notice).level_filter(), LevelFilter::INFO);
        assert_eq!(TextLogLayer::new(LogLevel::Trace).level_filter(), LevelFilter::TRACE);
    }
}
