use serde_json::Value;

use super::{LogLevel, LogRecord, LogSink, normalize_error_field};

/// 服务端输出：每条记录对应一个结构化的 `tracing` 事件
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

macro_rules! emit_event {
    ($macro:ident, $record:expr, $fields:expr, $fatal:expr) => {{
        let b = &$record.bindings;
        tracing::$macro!(
            service = %b.service,
            environment = %b.environment,
            context = %b.context,
            user_id = %b.user_id,
            user_email = b.user_email.as_deref().unwrap_or(""),
            request_id = b.request_id.as_deref().unwrap_or(""),
            fatal = $fatal,
            fields = %$fields,
            "{}",
            $record.message
        )
    }};
}

impl LogSink for TracingSink {
    fn emit(&self, record: &LogRecord) {
        let mut fields = record.fields.clone();
        if record.level >= LogLevel::Error {
            normalize_error_field(&mut fields);
        }
        let fields = Value::Object(fields);

        match record.level {
            LogLevel::Debug => emit_event!(debug, record, fields, false),
            LogLevel::Info => emit_event!(info, record, fields, false),
            LogLevel::Warn => emit_event!(warn, record, fields, false),
            LogLevel::Error => emit_event!(error, record, fields, false),
            // tracing 没有 fatal 级别
            LogLevel::Fatal => emit_event!(error, record, fields, true),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fmt;
    use std::sync::{Arc, Mutex};

    use serde_json::json;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::{Layer, layer::Context, prelude::*};

    use super::*;
    use crate::logging::{LogBindings, fields};

    type Captured = Arc<Mutex<Vec<(tracing::Level, HashMap<String, String>)>>>;

    /// 记录每个事件的级别和字段
    struct CaptureLayer(Captured);

    struct FieldVisitor<'a>(&'a mut HashMap<String, String>);

    impl Visit for FieldVisitor<'_> {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            self.0.insert(field.name().to_string(), format!("{value:?}"));
        }

        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_string(), value.to_string());
        }

        fn record_bool(&mut self, field: &Field, value: bool) {
            self.0.insert(field.name().to_string(), value.to_string());
        }
    }

    impl<S: tracing::Subscriber> Layer<S> for CaptureLayer {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            let mut values = HashMap::new();
            event.record(&mut FieldVisitor(&mut values));
            self.0
                .lock()
                .unwrap()
                .push((*event.metadata().level(), values));
        }
    }

    fn record(level: LogLevel) -> LogRecord {
        LogRecord {
            level,
            message: "save failed".into(),
            fields: fields(json!({"error": "disk full", "path": "/tmp/a"})),
            bindings: Arc::new(LogBindings {
                service: "svc".into(),
                environment: "test".into(),
                context: "storage".into(),
                user_id: "u-7".into(),
                user_email: None,
                request_id: Some("req-1".into()),
            }),
            timestamp: chrono::Utc::now(),
        }
    }

    fn capture(level: LogLevel) -> (tracing::Level, HashMap<String, String>) {
        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry().with(CaptureLayer(Arc::clone(&captured)));
        tracing::subscriber::with_default(subscriber, || TracingSink.emit(&record(level)));
        let mut events = captured.lock().unwrap();
        assert_eq!(events.len(), 1);
        events.remove(0)
    }

    fn event_fields(values: &HashMap<String, String>) -> Value {
        serde_json::from_str(&values["fields"]).unwrap()
    }

    #[test]
    fn error_and_fatal_rename_error_to_err() {
        for level in [LogLevel::Error, LogLevel::Fatal] {
            let (tracing_level, values) = capture(level);
            assert_eq!(tracing_level, tracing::Level::ERROR);
            let logged = event_fields(&values);
            assert_eq!(logged["err"], json!("disk full"));
            assert!(logged.get("error").is_none());
            assert_eq!(values["fatal"], (level == LogLevel::Fatal).to_string());
        }
    }

    #[test]
    fn lower_levels_keep_error_field() {
        for (level, expected) in [
            (LogLevel::Debug, tracing::Level::DEBUG),
            (LogLevel::Info, tracing::Level::INFO),
            (LogLevel::Warn, tracing::Level::WARN),
        ] {
            let (tracing_level, values) = capture(level);
            assert_eq!(tracing_level, expected);
            let logged = event_fields(&values);
            assert_eq!(logged["error"], json!("disk full"));
            assert!(logged.get("err").is_none());
            assert_eq!(values["context"], "storage");
            assert_eq!(values["request_id"], "req-1");
            assert_eq!(values["message"], "save failed");
        }
    }
}
