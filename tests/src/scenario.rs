//! Scenario definitions.

use morph_core::EngineConfig;
use morph_dispatch::SchemaBuilder;
use morph_registry::Registry;
use serde_json::Value as Json;

use crate::{Assertion, Outcome, Runner, ScenarioResult};

/// One call against an entry point.
#[derive(Debug)]
pub struct Step {
    pub name: String,
    pub endpoint: String,
    /// Wire arguments. A string `"$name"` anywhere is replaced by the id bound to `name`.
    pub args: Json,
    /// Remember the returned `id` under this name.
    pub bind: Option<String>,
    /// Commits to fail transiently before this step runs.
    pub fail_commits: u32,
    pub assertion: Assertion,
}

type Customize = Box<dyn Fn(SchemaBuilder) -> SchemaBuilder + Send + Sync>;

/// A domain plus an ordered list of steps.
pub struct Scenario {
    pub name: String,
    pub(crate) domain: fn() -> Registry,
    pub(crate) config: EngineConfig,
    pub(crate) customize: Option<Customize>,
    pub(crate) steps: Vec<Step>,
}

impl Scenario {
    /// Retries run without delays unless the configuration is replaced.
    pub fn new(name: &str, domain: fn() -> Registry) -> Self {
        let mut config = EngineConfig::default();
        config.retry.base_delay_ms = 0;
        config.retry.jitter = false;
        Self {
            name: name.to_string(),
            domain,
            config,
            customize: None,
            steps: Vec::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Adjust the schema builder, e.g. to add middleware.
    pub fn customize(mut self, f: impl Fn(SchemaBuilder) -> SchemaBuilder + Send + Sync + 'static) -> Self {
        self.customize = Some(Box::new(f));
        self
    }

    pub fn step<F>(mut self, name: &str, endpoint: &str, args: Json, f: F) -> Self
    where
        F: FnOnce(Assertion) -> Assertion,
    {
        self.steps.push(Step {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            args,
            bind: None,
            fail_commits: 0,
            assertion: f(Assertion::new()),
        });
        self
    }

    /// Bind the id returned by the last step.
    pub fn bind(mut self, binding: &str) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.bind = Some(binding.to_string());
        }
        self
    }

    /// Make the last step's first `n` commits fail transiently.
    pub fn fail_commits(mut self, n: u32) -> Self {
        if let Some(step) = self.steps.last_mut() {
            step.fail_commits = n;
        }
        self
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Run against a fresh store.
    pub async fn run(&self) -> ScenarioResult<Outcome> {
        Runner::new(self).run().await
    }
}

impl std::fmt::Debug for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scenario")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("steps", &self.steps)
            .finish_non_exhaustive()
    }
}
