//! Engine construction and the template registry.
//!
//! Resolver and mapper chains are fixed when [`EngineBuilder::build`] runs and
//! shared read-only by every render afterwards. Templates are parsed once and
//! reused; each render gets its own [`TemplateInstance`].

use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, PoisonError, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use stencil_types::Expression;
use tracing::{debug, warn};

use crate::{
    Completion, EngineConfig, EngineError, ResolutionError,
    context::ResolutionContext,
    instance::{RenderData, TemplateInstance},
    mapper::{MapperChain, ResultMapper},
    node::{ResultNode, TemplateNode},
    parser::parse_template,
    resolver::{NamespaceAdapter, NamespaceResolver, ResolverChain, ValueResolver},
    resolvers,
};

type Initializer = Arc<dyn Fn(&TemplateInstance) + Send + Sync>;

/// Shared evaluation engine; cheap to clone.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    resolvers: ResolverChain,
    namespaces: HashMap<String, ResolverChain>,
    mappers: MapperChain,
    initializers: Vec<Initializer>,
    config: EngineConfig,
    templates: RwLock<HashMap<String, Arc<ParsedTemplate>>>,
    next_id: AtomicU64,
}

struct ParsedTemplate {
    id: String,
    generated_id: String,
    nodes: Vec<TemplateNode>,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub(crate) fn resolvers(&self) -> &ResolverChain {
        &self.inner.resolvers
    }

    pub(crate) fn namespace_resolvers(&self, namespace: &str) -> Option<&ResolverChain> {
        self.inner.namespaces.get(namespace)
    }

    pub(crate) fn mappers(&self) -> &MapperChain {
        &self.inner.mappers
    }

    /// True when at least one resolver is registered for `namespace`.
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.inner.namespaces.contains_key(namespace)
    }

    /// Parses an unregistered template; its id is the generated id.
    pub fn parse(&self, source: &str) -> Result<Template, EngineError> {
        let generated_id = self.next_generated_id();
        let parsed = self.parse_with_id(generated_id.clone(), generated_id, source)?;
        Ok(self.template(parsed))
    }

    /// Parses `source` and registers it under `id`, replacing any previous template.
    pub fn register(&self, id: impl Into<String>, source: &str) -> Result<Template, EngineError> {
        let id = id.into();
        let parsed = self.parse_with_id(id.clone(), self.next_generated_id(), source)?;
        self.inner
            .templates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), Arc::clone(&parsed));
        debug!(template = %id, "registered template");
        Ok(self.template(parsed))
    }

    /// Looks up a registered template.
    pub fn get_template(&self, id: &str) -> Result<Template, EngineError> {
        let parsed = self
            .inner
            .templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::template_not_found(id))?;
        Ok(self.template(parsed))
    }

    /// Registered template ids, sorted.
    pub fn template_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .inner
            .templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    fn next_generated_id(&self) -> String {
        self.inner.next_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    fn parse_with_id(&self, id: String, generated_id: String, source: &str) -> Result<Arc<ParsedTemplate>, EngineError> {
        let nodes = parse_template(&id, source)?;
        Ok(Arc::new(ParsedTemplate { id, generated_id, nodes }))
    }

    fn template(&self, parsed: Arc<ParsedTemplate>) -> Template {
        Template {
            parsed,
            engine: self.clone(),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut namespaces: Vec<&String> = self.inner.namespaces.keys().collect();
        namespaces.sort();
        f.debug_struct("Engine")
            .field("resolvers", &self.inner.resolvers.len())
            .field("namespaces", &namespaces)
            .field("mappers", &self.inner.mappers.len())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Parsed template bound to the engine that parsed it.
#[derive(Clone)]
pub struct Template {
    parsed: Arc<ParsedTemplate>,
    engine: Engine,
}

impl Template {
    pub fn id(&self) -> &str {
        &self.parsed.id
    }

    /// Identifier unique to this parse, even when ids are reused by re-registration.
    pub fn generated_id(&self) -> &str {
        &self.parsed.generated_id
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Top-level expressions in source order.
    pub fn expressions(&self) -> impl Iterator<Item = &Arc<Expression>> {
        self.parsed.nodes.iter().filter_map(|node| match node {
            TemplateNode::Expression(node) => Some(node.expression()),
            TemplateNode::Text(_) => None,
        })
    }

    /// Creates a fresh instance, running the engine's instance initializers.
    pub fn instance(&self) -> TemplateInstance {
        let instance = TemplateInstance::new(self.clone());
        for initializer in &self.engine.inner.initializers {
            initializer(&instance);
        }
        instance
    }

    /// Resolves every node against `data` and concatenates the output in node order.
    ///
    /// Nodes are resolved eagerly one after another; pending ones then complete
    /// concurrently. Output is written only once every node succeeded.
    ///
    /// Every node starts evaluating before any result is inspected, so a node
    /// after a synchronous failure still runs its resolvers. A failure aborts
    /// the render: pending nodes are dropped unfinished, no output is written
    /// and that failure is returned.
    pub(crate) fn render_with(&self, data: Arc<RenderData>) -> Completion<String> {
        debug!(template = %self.id(), "rendering template");
        let context = ResolutionContext::root(&self.engine, data);
        let results = self
            .parsed
            .nodes
            .iter()
            .map(|node| match node {
                TemplateNode::Text(text) => Completion::completed(ResultNode::Constant(Arc::clone(text))),
                TemplateNode::Expression(node) => node.resolve(&context),
            })
            .collect();
        let engine = self.engine.clone();
        Completion::all(results).and_then(move |results| Completion::Ready(write_results(&results, &engine)))
    }
}

fn write_results(results: &[ResultNode], engine: &Engine) -> Result<String, ResolutionError> {
    let mut out = String::new();
    for result in results {
        result.write_to(&mut out, engine.mappers(), engine.config())?;
    }
    Ok(out)
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("id", &self.parsed.id)
            .field("generated_id", &self.parsed.generated_id)
            .field("nodes", &self.parsed.nodes.len())
            .finish()
    }
}

/// Collects handlers and settings for an [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    resolvers: Vec<Arc<dyn ValueResolver>>,
    namespaces: Vec<Arc<dyn NamespaceResolver>>,
    mappers: Vec<Arc<dyn ResultMapper>>,
    initializers: Vec<Initializer>,
    config: Option<EngineConfig>,
}

impl EngineBuilder {
    /// Adds the built-in map, list, string and logic resolvers.
    pub fn add_defaults(mut self) -> Self {
        self.resolvers.extend(resolvers::defaults());
        self
    }

    pub fn add_value_resolver(mut self, resolver: impl ValueResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    pub fn add_namespace_resolver(mut self, resolver: impl NamespaceResolver + 'static) -> Self {
        self.namespaces.push(Arc::new(resolver));
        self
    }

    pub fn add_result_mapper(mut self, mapper: impl ResultMapper + 'static) -> Self {
        self.mappers.push(Arc::new(mapper));
        self
    }

    /// Registers a hook run on every new [`TemplateInstance`].
    pub fn add_instance_initializer<F>(mut self, initializer: F) -> Self
    where
        F: Fn(&TemplateInstance) + Send + Sync + 'static,
    {
        self.initializers.push(Arc::new(initializer));
        self
    }

    /// Uses `config` instead of the configuration file.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Freezes the chains. Without an explicit configuration the config file is
    /// read; an unreadable file is logged and replaced by the defaults.
    pub fn build(self) -> Engine {
        let config = self.config.unwrap_or_else(|| {
            EngineConfig::load().unwrap_or_else(|error| {
                warn!(error = %error, "failed to load engine config, using defaults");
                EngineConfig::from_env()
            })
        });

        let mut grouped: HashMap<String, Vec<Arc<dyn ValueResolver>>> = HashMap::new();
        for resolver in self.namespaces {
            let namespace = resolver.namespace().to_string();
            grouped.entry(namespace).or_default().push(Arc::new(NamespaceAdapter(resolver)));
        }
        let namespaces = grouped
            .into_iter()
            .map(|(namespace, resolvers)| (namespace, ResolverChain::new(resolvers)))
            .collect();

        Engine {
            inner: Arc::new(EngineInner {
                resolvers: ResolverChain::new(self.resolvers),
                namespaces,
                mappers: MapperChain::new(self.mappers),
                initializers: self.initializers,
                config,
                templates: RwLock::new(HashMap::new()),
                next_id: AtomicU64::new(1),
            }),
        }
    }
}
