//! Expression evaluation against a scope chain and the engine's resolvers.
//!
//! The root context of a render reads the template instance's data. Child
//! contexts add local bindings (for example one per iteration of a loop) and
//! fall back to their parent when neither their bindings nor the resolver
//! chain produce a value.

use std::sync::Arc;

use serde_json::{Map, Value};
use stencil_types::{Expression, Part};

use crate::{
    Completion, Engine, ResolutionError,
    compose::{Settled, flatten},
    instance::RenderData,
    resolver::{EvalContext, ResolverChain},
};

/// Per-scope evaluation state; cheap to clone.
#[derive(Clone)]
pub struct ResolutionContext {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    /// `null` for the root scope, an object of local bindings otherwise.
    scope: Arc<Value>,
    parent: Option<ResolutionContext>,
    engine: Engine,
    data: Arc<RenderData>,
}

/// One part of an expression awaiting resolution, with its evaluated arguments.
struct PartRequest {
    expression: Arc<Expression>,
    index: usize,
    arguments: Vec<Value>,
}

impl PartRequest {
    fn part(&self) -> &Part {
        &self.expression.parts()[self.index]
    }
}

impl ResolutionContext {
    /// Root context reading the given instance data.
    pub fn root(engine: &Engine, data: Arc<RenderData>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                scope: Arc::new(Value::Null),
                parent: None,
                engine: engine.clone(),
                data,
            }),
        }
    }

    /// Nested scope whose bindings shadow every enclosing scope.
    pub fn create_child(&self, bindings: Map<String, Value>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                scope: Arc::new(Value::Object(bindings)),
                parent: Some(self.clone()),
                engine: self.inner.engine.clone(),
                data: Arc::clone(&self.inner.data),
            }),
        }
    }

    pub fn parent(&self) -> Option<&ResolutionContext> {
        self.inner.parent.as_ref()
    }

    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    pub fn data(&self) -> &RenderData {
        &self.inner.data
    }

    /// Evaluates an expression.
    ///
    /// Literals complete immediately. Otherwise parts resolve left to right,
    /// each against the value of the previous one, and a not-found part makes
    /// the whole expression not found.
    pub fn evaluate(&self, expression: &Arc<Expression>) -> Completion<Settled> {
        if let Some(value) = expression.literal_value() {
            return Completion::completed(Settled::Value(value.clone()));
        }
        if expression.parts().is_empty() {
            return Completion::completed(Settled::NotFound);
        }
        self.resolve_part(Arc::clone(expression), 0, None)
    }

    fn resolve_part(&self, expression: Arc<Expression>, index: usize, base: Option<Arc<Value>>) -> Completion<Settled> {
        let context = self.clone();
        self.evaluate_arguments(&expression.parts()[index]).and_then(move |arguments| {
            let request = Arc::new(PartRequest {
                expression,
                index,
                arguments,
            });
            let resolved = match base {
                None => context.resolve_first(&request),
                Some(base) => {
                    let chain = context.engine().resolvers().clone();
                    context.resolve_with(chain, Arc::clone(&request), base, false, 0)
                }
            };
            resolved.and_then(move |settled| context.resolve_next(&request, settled))
        })
    }

    fn resolve_next(&self, request: &PartRequest, settled: Settled) -> Completion<Settled> {
        let next = request.index + 1;
        if settled.is_not_found() || next == request.expression.parts().len() {
            return Completion::completed(settled);
        }
        self.resolve_part(Arc::clone(&request.expression), next, Some(Arc::new(settled.into_value())))
    }

    /// Evaluates virtual method arguments; they run concurrently and the first failure wins.
    fn evaluate_arguments(&self, part: &Part) -> Completion<Vec<Value>> {
        if part.parameters().is_empty() {
            return Completion::completed(Vec::new());
        }
        let evaluations = part
            .parameters()
            .iter()
            .map(|parameter| self.evaluate(parameter).map(Settled::into_value))
            .collect();
        Completion::all(evaluations)
    }

    fn resolve_first(&self, request: &Arc<PartRequest>) -> Completion<Settled> {
        let Some(namespace) = request.expression.namespace() else {
            return self.lookup_scope(request);
        };
        match self.engine().namespace_resolvers(namespace) {
            Some(chain) => self.resolve_with(chain.clone(), Arc::clone(request), Arc::new(Value::Null), true, 0),
            None => Completion::failed(ResolutionError::namespace_unresolved(namespace, &request.expression)),
        }
    }

    /// Local data, then the resolver chain, then the parent scope.
    fn lookup_scope(&self, request: &Arc<PartRequest>) -> Completion<Settled> {
        let part = request.part();
        if !part.is_virtual_method()
            && let Some(found) = self.lookup_data(request)
        {
            return found;
        }
        let chain = self.engine().resolvers().clone();
        let context = self.clone();
        let pending_request = Arc::clone(request);
        self.resolve_with(chain, Arc::clone(request), Arc::clone(&self.inner.scope), true, 0)
            .and_then(move |settled| match context.parent() {
                Some(parent) if settled.is_not_found() => parent.lookup_scope(&pending_request),
                _ => Completion::completed(settled),
            })
    }

    fn lookup_data(&self, request: &PartRequest) -> Option<Completion<Settled>> {
        let name = request.part().name();
        if self.inner.parent.is_some() {
            let value = self.inner.scope.get(name)?;
            return Some(Completion::completed(Settled::Value(value.clone())));
        }
        if let Some(value) = self.data().get(name) {
            return Some(Completion::completed(Settled::Value(value)));
        }
        let binding = self.data().computed(name)?;
        Some(binding.evaluate(&request.expression, self.engine().config().unrestricted_async_values))
    }

    /// Offers the request to `chain` from `start`; an answer that settles to
    /// not-found passes the turn to the next resolver.
    fn resolve_with(&self, chain: ResolverChain, request: Arc<PartRequest>, base: Arc<Value>, top_level: bool, start: usize) -> Completion<Settled> {
        let eval = EvalContext {
            base: &base,
            part: request.part(),
            arguments: &request.arguments,
            top_level,
            data: self.data(),
            engine: self.engine(),
        };
        let Some((index, resolved)) = chain.next_resolved(&eval, start) else {
            return Completion::completed(Settled::NotFound);
        };
        let unrestricted = self.engine().config().unrestricted_async_values;
        let context = self.clone();
        flatten(resolved, &request.expression, unrestricted).and_then(move |settled| {
            if settled.is_not_found() {
                context.resolve_with(chain, request, base, top_level, index + 1)
            } else {
                Completion::completed(settled)
            }
        })
    }
}

impl std::fmt::Debug for ResolutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionContext")
            .field("scope", &self.inner.scope)
            .field("parent", &self.inner.parent)
            .finish_non_exhaustive()
    }
}
