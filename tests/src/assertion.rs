//! Assertion types and builders for verifying step results.

use morph_core::ErrorPayload;
use morph_dispatch::RequestContext;
use serde_json::Value as Json;

use crate::error::{ScenarioError, ScenarioResult};

/// Expectations on one step result.
#[derive(Default)]
pub struct Assertion {
    // Success assertions
    pub null: bool,
    pub rows: Option<usize>,
    pub count: Option<u64>,
    pub fields: Vec<(String, Json)>,
    pub column: Option<(String, Vec<Json>)>,

    // Error assertions
    pub code: Option<String>,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub error_pattern: Option<String>,

    #[allow(clippy::type_complexity)]
    pub custom: Option<Box<dyn Fn(&Json) -> bool + Send + Sync>>,
}

impl std::fmt::Debug for Assertion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assertion")
            .field("null", &self.null)
            .field("rows", &self.rows)
            .field("count", &self.count)
            .field("fields", &self.fields)
            .field("column", &self.column)
            .field("code", &self.code)
            .field("status", &self.status)
            .field("error", &self.error)
            .field("custom", &self.custom.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Assertion {
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Builders ====================

    /// Succeeds with any result.
    pub fn ok(self) -> Self {
        self
    }

    /// Succeeds with `null`.
    pub fn is_null(mut self) -> Self {
        self.null = true;
        self
    }

    /// Succeeds with a list of `n` documents.
    pub fn rows(mut self, n: usize) -> Self {
        self.rows = Some(n);
        self
    }

    /// The request context carries this total afterwards.
    pub fn count(mut self, n: u64) -> Self {
        self.count = Some(n);
        self
    }

    /// The value at a dotted path equals `expected`. Numeric segments index lists.
    pub fn field(mut self, path: &str, expected: impl Into<Json>) -> Self {
        self.fields.push((path.to_string(), expected.into()));
        self
    }

    /// Projects `field` out of every returned row, in order.
    pub fn column<I, V>(mut self, field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Json>,
    {
        self.column = Some((field.to_string(), values.into_iter().map(Into::into).collect()));
        self
    }

    /// Fails with this error code.
    pub fn code(mut self, code: &str) -> Self {
        self.code = Some(code.to_string());
        self
    }

    /// Fails with this status.
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Fails with a message containing `text`.
    pub fn error(mut self, text: &str) -> Self {
        self.error = Some(text.to_string());
        self
    }

    /// Fails with a message matching `pattern`.
    pub fn error_pattern(mut self, pattern: &str) -> Self {
        self.error_pattern = Some(pattern.to_string());
        self
    }

    pub fn custom(mut self, f: impl Fn(&Json) -> bool + Send + Sync + 'static) -> Self {
        self.custom = Some(Box::new(f));
        self
    }

    fn expects_error(&self) -> bool {
        self.code.is_some() || self.status.is_some() || self.error.is_some() || self.error_pattern.is_some()
    }

    // ==================== Verification ====================

    pub fn verify(
        &self,
        step: &str,
        result: &Result<Json, ErrorPayload>,
        request: &RequestContext,
    ) -> ScenarioResult<()> {
        let fail = |message: String| Err(ScenarioError::assertion_failed(step, message));

        if self.expects_error() {
            let payload = match result {
                Err(payload) => payload,
                Ok(value) => return fail(format!("expected an error, but step returned {}", value)),
            };
            return self.verify_error(step, payload);
        }

        let value = match result {
            Ok(value) => value,
            Err(payload) => return fail(format!("step failed: {} ({})", payload.message, payload.code)),
        };

        if self.null && !value.is_null() {
            return fail(format!("expected null, got {}", value));
        }
        if let Some(expected) = self.rows {
            match value.as_array() {
                Some(rows) if rows.len() == expected => {}
                Some(rows) => return fail(format!("expected {} rows, got {}", expected, rows.len())),
                None => return fail(format!("expected a list, got {}", value)),
            }
        }
        if let Some(expected) = self.count {
            if request.count != Some(expected) {
                return fail(format!("expected count {}, got {:?}", expected, request.count));
            }
        }
        for (path, expected) in &self.fields {
            match lookup(value, path) {
                Some(actual) if actual == expected => {}
                Some(actual) => return fail(format!("{}: expected {}, got {}", path, expected, actual)),
                None => return fail(format!("{}: missing in {}", path, value)),
            }
        }
        if let Some((field, expected)) = &self.column {
            let actual: Vec<Json> = value
                .as_array()
                .map(|rows| rows.iter().map(|row| lookup(row, field).cloned().unwrap_or(Json::Null)).collect())
                .unwrap_or_default();
            if &actual != expected {
                return fail(format!("column {}: expected {:?}, got {:?}", field, expected, actual));
            }
        }
        if let Some(custom) = &self.custom {
            if !custom(value) {
                return fail("custom assertion failed".to_string());
            }
        }
        Ok(())
    }

    fn verify_error(&self, step: &str, payload: &ErrorPayload) -> ScenarioResult<()> {
        let fail = |message: String| Err(ScenarioError::assertion_failed(step, message));

        if let Some(code) = &self.code {
            if &payload.code != code {
                return fail(format!("expected code {}, got {} ({})", code, payload.code, payload.message));
            }
        }
        if let Some(status) = self.status {
            if payload.status != status {
                return fail(format!("expected status {}, got {}", status, payload.status));
            }
        }
        if let Some(text) = &self.error {
            if !payload.message.contains(text.as_str()) {
                return fail(format!("expected error containing '{}', got: {}", text, payload.message));
            }
        }
        if let Some(pattern) = &self.error_pattern {
            let re = regex_lite::Regex::new(pattern)
                .map_err(|e| ScenarioError::assertion_failed(step, format!("invalid regex pattern: {}", e)))?;
            if !re.is_match(&payload.message) {
                return fail(format!("expected error matching '{}', got: {}", pattern, payload.message));
            }
        }
        Ok(())
    }
}

/// Walk a dotted path through objects and lists.
pub(crate) fn lookup<'a>(value: &'a Json, path: &str) -> Option<&'a Json> {
    path.split('.').try_fold(value, |current, segment| match current {
        Json::Object(map) => map.get(segment),
        Json::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_walks_objects_and_lists() {
        let value = json!({ "items": [{ "sku": "A" }, { "sku": "B" }] });

        assert_eq!(lookup(&value, "items.1.sku"), Some(&json!("B")));
        assert_eq!(lookup(&value, "items.2.sku"), None);
    }

    #[test]
    fn test_error_expectations() {
        let request = RequestContext::new();
        let failed = Err(ErrorPayload::new("Action is not allowed from state PAID", "BAD_REQUEST", 400));

        let matching = Assertion::new().code("BAD_REQUEST").error("state PAID");
        let wrong_status = Assertion::new().status(404);
        let expected_success = Assertion::new().rows(1);

        assert!(matching.verify("s", &failed, &request).is_ok());
        assert!(wrong_status.verify("s", &failed, &request).is_err());
        assert!(expected_success.verify("s", &failed, &request).is_err());
    }
}
