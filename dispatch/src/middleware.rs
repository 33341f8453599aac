//! The before-call middleware chain.
//!
//! Middleware run in registration order. Each one receives the call and the
//! rest of the chain as `next`; not calling `next` skips the remaining
//! middleware. Returning an error rejects the call.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use morph_core::{Document, Value};

use crate::{DispatchResult, Endpoint};

/// Per-request state shared by middleware and entry points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestContext {
    /// Total matched by the last list call that asked for a count.
    pub count: Option<u64>,
    /// Free-form values set by middleware or the embedding application.
    pub values: BTreeMap<String, Value>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }
}

/// What a middleware sees of a call.
#[derive(Debug)]
pub struct CallContext<'c> {
    pub endpoint: &'c Endpoint,
    pub args: &'c Document,
    pub request: &'c mut RequestContext,
}

impl CallContext<'_> {
    pub fn operation(&self) -> &'static str {
        self.endpoint.kind.operation()
    }
}

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, call: &mut CallContext<'_>, next: Next<'_>) -> DispatchResult<()>;
}

/// The remainder of the chain.
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
}

impl<'a> Next<'a> {
    pub(crate) fn new(chain: &'a [Arc<dyn Middleware>]) -> Self {
        Self { chain }
    }

    /// Run the next middleware, if any.
    pub async fn run(self, call: &mut CallContext<'_>) -> DispatchResult<()> {
        match self.chain.split_first() {
            Some((head, rest)) => head.handle(call, Next::new(rest)).await,
            None => Ok(()),
        }
    }
}
