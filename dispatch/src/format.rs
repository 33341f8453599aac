//! Output documents and error payloads.

use std::fmt;
use std::sync::Arc;

use morph_core::{Classify, ErrorKind, ErrorPayload, Value};
use tracing::error;

/// Rewrite stored documents for output: `_id` is exposed as `id`, at every depth.
pub fn present(value: Value) -> Value {
    match value {
        Value::Object(doc) => Value::Object(
            doc.into_iter()
                .map(|(key, value)| {
                    let key = if key == "_id" { "id".to_string() } else { key };
                    (key, present(value))
                })
                .collect(),
        ),
        Value::List(items) => Value::List(items.into_iter().map(present).collect()),
        other => other,
    }
}

/// Hook that may replace a formatted payload. `None` keeps the original.
pub type ErrorCallback = Arc<dyn Fn(&ErrorPayload) -> Option<ErrorPayload> + Send + Sync>;

/// Turns any classified error into the surfaced payload.
#[derive(Clone, Default)]
pub struct ErrorFormatter {
    callback: Option<ErrorCallback>,
}

impl ErrorFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback<F>(callback: F) -> Self
    where
        F: Fn(&ErrorPayload) -> Option<ErrorPayload> + Send + Sync + 'static,
    {
        Self {
            callback: Some(Arc::new(callback)),
        }
    }

    pub fn format<E: Classify + ?Sized>(&self, err: &E) -> ErrorPayload {
        let payload = err.payload();
        if err.kind() == ErrorKind::Internal {
            error!(error = %err, cause = ?payload.cause, "internal error");
        }
        match &self.callback {
            Some(callback) => callback(&payload).unwrap_or(payload),
            None => payload,
        }
    }
}

impl fmt::Debug for ErrorFormatter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorFormatter")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
