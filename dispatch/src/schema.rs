//! The executable schema: entry points bound to the engines.

use std::collections::BTreeMap;
use std::sync::Arc;

use morph_core::{Document, EngineConfig, ErrorPayload, QueryConfig, Value};
use morph_mutation::MutationExecutor;
use morph_query::{ListArgs, QueryCompiler, COUNT_FIELD};
use morph_registry::Registry;
use morph_store::DocumentStore;
use morph_synth::{InputCatalog, Synthesizer};
use morph_transaction::{RetryPolicy, TransactionRunner};
use tracing::{debug, info};

use crate::middleware::Next;
use crate::{
    present, CallContext, DispatchError, DispatchResult, Endpoint, EndpointKind, ErrorFormatter,
    Middleware, RequestContext,
};

/// Assembles a [`Schema`] from a registry and a store.
pub struct SchemaBuilder {
    registry: Registry,
    store: Arc<dyn DocumentStore>,
    config: EngineConfig,
    retry: Option<RetryPolicy>,
    included_queries: Option<Vec<String>>,
    included_mutations: Option<Vec<String>>,
    included_custom: Option<Vec<String>>,
    middlewares: Vec<Arc<dyn Middleware>>,
    formatter: ErrorFormatter,
}

impl SchemaBuilder {
    pub fn new(registry: Registry, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            registry,
            store,
            config: EngineConfig::default(),
            retry: None,
            included_queries: None,
            included_mutations: None,
            included_custom: None,
            middlewares: Vec::new(),
            formatter: ErrorFormatter::new(),
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the retry policy derived from the configuration.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    /// Only these entities get get-by-id and list entry points.
    pub fn include_queries<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.included_queries = Some(entities.into_iter().map(Into::into).collect());
        self
    }

    /// Only these entities get add, update, delete and action entry points.
    pub fn include_mutations<I, S>(mut self, entities: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.included_mutations = Some(entities.into_iter().map(Into::into).collect());
        self
    }

    /// Only these custom mutations are exposed.
    pub fn include_custom_mutations<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.included_custom = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Append a middleware to the chain.
    pub fn use_middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middlewares.push(Arc::new(middleware));
        self
    }

    pub fn error_formatter(mut self, formatter: ErrorFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    /// Synthesize input shapes, install collections and generate entry points.
    pub async fn build(self) -> DispatchResult<Schema> {
        let registry = Arc::new(self.registry);
        let catalog = Arc::new(Synthesizer::new(&registry, self.config.synthesis.max_passes).synthesize()?);
        registry.install(self.store.as_ref()).await?;

        let included = |list: &Option<Vec<String>>, name: &str| {
            list.as_ref().map_or(true, |names| names.iter().any(|n| n == name))
        };
        let mut endpoints = BTreeMap::new();
        for descriptor in registry.all_entities() {
            if included(&self.included_queries, descriptor.name()) {
                for endpoint in Endpoint::queries(descriptor) {
                    endpoints.insert(endpoint.name.clone(), endpoint);
                }
            }
            if included(&self.included_mutations, descriptor.name()) {
                for endpoint in Endpoint::mutations(descriptor) {
                    endpoints.insert(endpoint.name.clone(), endpoint);
                }
            }
        }
        for mutation in registry.custom_mutations() {
            if included(&self.included_custom, &mutation.name) {
                endpoints.insert(
                    mutation.name.clone(),
                    Endpoint::custom(&mutation.name, &mutation.description),
                );
            }
        }

        let policy = self
            .retry
            .unwrap_or_else(|| RetryPolicy::from_config(&self.config.retry));
        let runner = TransactionRunner::new(self.store.clone(), policy);
        let executor = MutationExecutor::new(registry.clone(), catalog.clone(), runner);
        info!(
            entities = registry.entity_count(),
            endpoints = endpoints.len(),
            passes = catalog.passes(),
            "schema built"
        );

        Ok(Schema {
            registry,
            catalog,
            executor,
            store: self.store,
            query: self.config.query,
            endpoints,
            middlewares: self.middlewares,
            formatter: self.formatter,
        })
    }
}

/// Named entry points over one registry and one store.
pub struct Schema {
    registry: Arc<Registry>,
    catalog: Arc<InputCatalog>,
    executor: MutationExecutor,
    store: Arc<dyn DocumentStore>,
    query: QueryConfig,
    endpoints: BTreeMap<String, Endpoint>,
    middlewares: Vec<Arc<dyn Middleware>>,
    formatter: ErrorFormatter,
}

impl Schema {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn catalog(&self) -> &InputCatalog {
        &self.catalog
    }

    pub fn executor(&self) -> &MutationExecutor {
        &self.executor
    }

    pub fn endpoint(&self, name: &str) -> Option<&Endpoint> {
        self.endpoints.get(name)
    }

    /// Entry points by name.
    pub fn endpoints(&self) -> impl Iterator<Item = &Endpoint> {
        self.endpoints.values()
    }

    /// Call an entry point with wire JSON and get wire JSON back. Errors come
    /// out formatted.
    pub async fn execute(
        &self,
        name: &str,
        args: serde_json::Value,
        request: &mut RequestContext,
    ) -> Result<serde_json::Value, ErrorPayload> {
        let args = match Value::from_json(&args) {
            Value::Object(doc) => doc,
            Value::Null => Document::new(),
            _ => {
                let err = DispatchError::invalid_argument(name, "arguments must be an object");
                return Err(self.formatter.format(&err));
            }
        };
        match self.call(name, &args, request).await {
            Ok(value) => Ok(value.to_json()),
            Err(err) => Err(self.formatter.format(&err)),
        }
    }

    /// Call an entry point: run the middleware chain, then the operation.
    pub async fn call(&self, name: &str, args: &Document, request: &mut RequestContext) -> DispatchResult<Value> {
        let endpoint = self
            .endpoints
            .get(name)
            .ok_or_else(|| DispatchError::UnknownEndpoint(name.to_string()))?;
        debug!(endpoint = %endpoint, "dispatching");

        let mut call = CallContext {
            endpoint,
            args,
            request,
        };
        Next::new(&self.middlewares).run(&mut call).await?;

        let entity = endpoint.entity.as_deref().unwrap_or_default();
        let result = match &endpoint.kind {
            EndpointKind::GetById => {
                let id = id_arg(name, args)?;
                let collection = self.registry.collection_of(entity)?;
                self.store
                    .find_by_id(collection, id)
                    .await?
                    .map(Value::Object)
                    .unwrap_or(Value::Null)
            }
            EndpointKind::List => self.list(entity, args, call.request).await?,
            EndpointKind::Add => Value::Object(self.executor.add(entity, input_arg(name, args)?).await?),
            EndpointKind::Update => Value::Object(self.executor.update(entity, input_arg(name, args)?).await?),
            EndpointKind::Delete => Value::Object(self.executor.delete(entity, id_arg(name, args)?).await?),
            EndpointKind::Action(action) => Value::Object(
                self.executor
                    .transition(entity, action, input_arg(name, args)?)
                    .await?,
            ),
            EndpointKind::Custom => {
                let input = args.get("input").and_then(Value::as_object);
                self.executor.custom(name, input).await?
            }
        };
        Ok(present(result))
    }

    async fn list(&self, entity: &str, args: &Document, request: &mut RequestContext) -> DispatchResult<Value> {
        let args = ListArgs::from_document(args)?;
        let compiler = QueryCompiler::new(&self.registry, &self.query);
        let collection = self.registry.collection_of(entity)?;

        if args.wants_count() {
            let counted = self
                .store
                .aggregate(collection, &compiler.compile_count(entity, &args)?)
                .await?;
            let total = counted
                .first()
                .and_then(|doc| doc.get(COUNT_FIELD))
                .and_then(Value::as_int)
                .unwrap_or(0);
            request.count = Some(total.max(0) as u64);
        }

        let pipeline = compiler.compile(entity, &args)?;
        let documents = if pipeline.is_empty() {
            self.store.find_all(collection).await?
        } else {
            self.store.aggregate(collection, &pipeline).await?
        };
        Ok(Value::List(documents.into_iter().map(Value::Object).collect()))
    }
}

fn id_arg(endpoint: &str, args: &Document) -> DispatchResult<morph_core::ObjectId> {
    args.get("id")
        .and_then(Value::to_id)
        .ok_or_else(|| DispatchError::invalid_argument(endpoint, "id must be an identifier"))
}

fn input_arg<'a>(endpoint: &str, args: &'a Document) -> DispatchResult<&'a Document> {
    args.get("input")
        .and_then(Value::as_object)
        .ok_or_else(|| DispatchError::invalid_argument(endpoint, "input is required"))
}
