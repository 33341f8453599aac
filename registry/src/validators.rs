//! Field and entity validators.
//!
//! Validators run during materialization, keyed by [`Operation`](crate::Operation),
//! in declaration order. The first failure aborts the operation.

use async_trait::async_trait;
use morph_core::{DomainError, Document, Value};
use morph_store::SessionHandle;
use regex_lite::Regex;

use crate::HookError;

/// Checks one field of an input argument tree.
///
/// `value` is `None` when the field was not supplied.
#[async_trait]
pub trait FieldValidator: Send + Sync {
    async fn validate(
        &self,
        entity: &str,
        field: &str,
        value: Option<&Value>,
        session: &SessionHandle,
    ) -> Result<(), HookError>;
}

/// Checks a whole materialized document against its raw arguments.
#[async_trait]
pub trait EntityValidator: Send + Sync {
    async fn validate(
        &self,
        entity: &str,
        args: &Document,
        doc: &Document,
        session: &SessionHandle,
    ) -> Result<(), HookError>;
}

/// Rejects absent, null and empty-string values.
#[derive(Debug, Clone, Copy, Default)]
pub struct Required;

#[async_trait]
impl FieldValidator for Required {
    async fn validate(
        &self,
        entity: &str,
        field: &str,
        value: Option<&Value>,
        _session: &SessionHandle,
    ) -> Result<(), HookError> {
        match value {
            Some(v) if !v.is_empty() => Ok(()),
            _ => Err(DomainError::validation(format!("{}.{} is required", entity, field)).into()),
        }
    }
}

/// Bounds the character length of string values. Other values pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct Length {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Length {
    pub fn between(min: usize, max: usize) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }
}

#[async_trait]
impl FieldValidator for Length {
    async fn validate(
        &self,
        entity: &str,
        field: &str,
        value: Option<&Value>,
        _session: &SessionHandle,
    ) -> Result<(), HookError> {
        let Some(text) = value.and_then(Value::as_str) else {
            return Ok(());
        };
        let len = text.chars().count();
        if self.min.map(|min| len < min).unwrap_or(false) {
            return Err(DomainError::validation(format!(
                "{}.{} must be at least {} characters",
                entity,
                field,
                self.min.unwrap_or_default()
            ))
            .into());
        }
        if self.max.map(|max| len > max).unwrap_or(false) {
            return Err(DomainError::validation(format!(
                "{}.{} must be at most {} characters",
                entity,
                field,
                self.max.unwrap_or_default()
            ))
            .into());
        }
        Ok(())
    }
}

/// Bounds numeric values, inclusive. Other values pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct Range {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Range {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_least(min: f64) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }
}

#[async_trait]
impl FieldValidator for Range {
    async fn validate(
        &self,
        entity: &str,
        field: &str,
        value: Option<&Value>,
        _session: &SessionHandle,
    ) -> Result<(), HookError> {
        let Some(number) = value.and_then(Value::as_float) else {
            return Ok(());
        };
        let below = self.min.map(|min| number < min).unwrap_or(false);
        let above = self.max.map(|max| number > max).unwrap_or(false);
        if below || above {
            return Err(DomainError::validation(format!(
                "{}.{} is out of range: {}",
                entity, field, number
            ))
            .into());
        }
        Ok(())
    }
}

/// Requires string values to match a regular expression. Other values pass.
#[derive(Debug, Clone)]
pub struct Pattern {
    regex: Regex,
}

impl Pattern {
    pub fn new(pattern: &str) -> Result<Self, regex_lite::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }
}

#[async_trait]
impl FieldValidator for Pattern {
    async fn validate(
        &self,
        entity: &str,
        field: &str,
        value: Option<&Value>,
        _session: &SessionHandle,
    ) -> Result<(), HookError> {
        match value.and_then(Value::as_str) {
            Some(text) if !self.regex.is_match(text) => Err(DomainError::validation(format!(
                "{}.{} does not match {}",
                entity,
                field,
                self.regex.as_str()
            ))
            .into()),
            _ => Ok(()),
        }
    }
}
