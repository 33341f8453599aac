//! Scenario runner.

use std::collections::BTreeMap;
use std::sync::Arc;

use morph_dispatch::{RequestContext, SchemaBuilder};
use morph_store::{DocumentStore, MemoryStore};
use serde_json::Value as Json;
use tracing::info;

use crate::error::{ScenarioError, ScenarioResult};
use crate::fixtures;
use crate::scenario::Scenario;

/// What a finished scenario leaves behind.
#[derive(Debug)]
pub struct Outcome {
    pub store: MemoryStore,
    /// Bound ids, as hex strings.
    pub bindings: BTreeMap<String, String>,
}

impl Outcome {
    pub fn id(&self, binding: &str) -> &str {
        self.bindings.get(binding).map(String::as_str).unwrap_or_default()
    }
}

/// Runs a scenario against a fresh in-memory store.
pub struct Runner<'s> {
    scenario: &'s Scenario,
}

impl<'s> Runner<'s> {
    pub fn new(scenario: &'s Scenario) -> Self {
        Self { scenario }
    }

    pub async fn run(&self) -> ScenarioResult<Outcome> {
        fixtures::init_tracing();
        let scenario = self.scenario;

        // 1. Register the domain and build the schema
        let store = MemoryStore::new();
        let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
        let mut builder = SchemaBuilder::new((scenario.domain)(), shared).config(scenario.config.clone());
        if let Some(customize) = &scenario.customize {
            builder = customize(builder);
        }
        let schema = builder
            .build()
            .await
            .map_err(|e| ScenarioError::build(&scenario.name, e.to_string()))?;

        // 2. Run every step in order
        let mut bindings = BTreeMap::new();
        for step in &scenario.steps {
            if step.fail_commits > 0 {
                store.inject_transient_failures(step.fail_commits);
            }
            let args = substitute(&step.name, &step.args, &bindings)?;
            let mut request = RequestContext::new();
            let result = schema.execute(&step.endpoint, args, &mut request).await;
            step.assertion.verify(&step.name, &result, &request)?;

            if let (Some(binding), Ok(value)) = (&step.bind, &result) {
                let id = value
                    .get("id")
                    .and_then(Json::as_str)
                    .ok_or_else(|| ScenarioError::assertion_failed(&step.name, "result has no id to bind"))?;
                bindings.insert(binding.clone(), id.to_string());
            }
        }

        info!(scenario = %scenario.name, steps = scenario.steps.len(), "scenario passed");
        Ok(Outcome { store, bindings })
    }
}

/// Replace `"$name"` strings by bound ids.
fn substitute(step: &str, args: &Json, bindings: &BTreeMap<String, String>) -> ScenarioResult<Json> {
    Ok(match args {
        Json::String(s) => match s.strip_prefix('$') {
            Some(binding) => bindings
                .get(binding)
                .map(|id| Json::String(id.clone()))
                .ok_or_else(|| ScenarioError::unknown_binding(step, binding))?,
            None => args.clone(),
        },
        Json::Array(items) => Json::Array(
            items
                .iter()
                .map(|item| substitute(step, item, bindings))
                .collect::<ScenarioResult<_>>()?,
        ),
        Json::Object(map) => Json::Object(
            map.iter()
                .map(|(k, v)| Ok((k.clone(), substitute(step, v, bindings)?)))
                .collect::<ScenarioResult<_>>()?,
        ),
        other => other.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_substitute_replaces_bindings_at_any_depth() {
        let bindings = BTreeMap::from([("ann".to_string(), "abc".to_string())]);

        let args = substitute("s", &json!({ "input": { "customer": { "id": "$ann" }, "ids": ["$ann"] } }), &bindings).unwrap();
        let unknown = substitute("s", &json!("$bob"), &bindings);

        assert_eq!(args, json!({ "input": { "customer": { "id": "abc" }, "ids": ["abc"] } }));
        assert!(matches!(unknown, Err(ScenarioError::UnknownBinding { .. })));
    }
}
