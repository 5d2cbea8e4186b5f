//! Pluggable value resolvers and the ordered chains that hold them.
//!
//! A resolver is offered one `(base object, part)` pair at a time through an
//! [`EvalContext`]. It either produces a [`Resolved`] value (which may be
//! `null`, or asynchronous) or declines with [`Outcome::Declined`] so the next
//! resolver gets a turn. A chain that runs out of resolvers yields the
//! not-found sentinel, never a plain `null`.

use std::{cmp::Reverse, fmt::Debug, sync::Arc};

use serde_json::Value;
use stencil_types::{Expression, Part};

use crate::{Engine, compose::Resolved, instance::RenderData};

/// Priority assigned to handlers that do not override [`ValueResolver::priority`].
pub const DEFAULT_PRIORITY: i32 = 1;

/// Answer given by a resolver for one evaluation request.
#[derive(Debug)]
pub enum Outcome {
    Resolved(Resolved),
    Declined,
}

impl Outcome {
    /// Shorthand for a synchronously resolved plain value.
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Resolved(Resolved::Value(value.into()))
    }
}

impl From<Resolved> for Outcome {
    fn from(resolved: Resolved) -> Self {
        Self::Resolved(resolved)
    }
}

/// Everything a resolver may inspect while resolving one part.
///
/// Arguments of a virtual method part are already evaluated when the context
/// is built; the raw parameter expressions stay available for resolvers that
/// want to report on them.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub(crate) base: &'a Value,
    pub(crate) part: &'a Part,
    pub(crate) arguments: &'a [Value],
    pub(crate) top_level: bool,
    pub(crate) data: &'a RenderData,
    pub(crate) engine: &'a Engine,
}

impl<'a> EvalContext<'a> {
    /// Object the part is resolved against; `null` for top-level lookups.
    pub fn base(&self) -> &'a Value {
        self.base
    }

    pub fn part(&self) -> &'a Part {
        self.part
    }

    pub fn name(&self) -> &'a str {
        self.part.name()
    }

    pub fn is_virtual_method(&self) -> bool {
        self.part.is_virtual_method()
    }

    /// Unevaluated argument expressions of a virtual method part.
    pub fn parameters(&self) -> &'a [Arc<Expression>] {
        self.part.parameters()
    }

    /// Evaluated argument values, in declaration order.
    pub fn arguments(&self) -> &'a [Value] {
        self.arguments
    }

    pub fn argument(&self, index: usize) -> Option<&'a Value> {
        self.arguments.get(index)
    }

    /// True when resolving the first part of an expression.
    pub fn is_top_level(&self) -> bool {
        self.top_level
    }

    /// Data of the template instance being rendered.
    pub fn data(&self) -> &'a RenderData {
        self.data
    }

    pub fn engine(&self) -> &'a Engine {
        self.engine
    }
}

/// Resolver for general (unnamespaced) expression parts.
pub trait ValueResolver: Send + Sync + Debug {
    /// Higher priorities are consulted first.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Cheap pre-check; returning false is equivalent to declining.
    fn applies_to(&self, _context: &EvalContext<'_>) -> bool {
        true
    }

    fn resolve(&self, context: &EvalContext<'_>) -> Outcome;
}

/// Resolver dedicated to one namespace, e.g. `msg` in `{msg:hello}`.
///
/// Only the first part of a namespaced expression reaches it; later parts are
/// resolved by the general chain against the value it produced.
pub trait NamespaceResolver: Send + Sync + Debug {
    fn namespace(&self) -> &str;

    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    fn resolve(&self, context: &EvalContext<'_>) -> Outcome;
}

#[derive(Debug)]
pub(crate) struct NamespaceAdapter(pub(crate) Arc<dyn NamespaceResolver>);

impl ValueResolver for NamespaceAdapter {
    fn priority(&self) -> i32 {
        self.0.priority()
    }

    fn resolve(&self, context: &EvalContext<'_>) -> Outcome {
        self.0.resolve(context)
    }
}

/// Immutable, priority-ordered list of resolvers shared by every render.
#[derive(Debug, Clone, Default)]
pub struct ResolverChain {
    resolvers: Arc<[Arc<dyn ValueResolver>]>,
}

impl ResolverChain {
    /// Orders resolvers by descending priority; equal priorities keep registration order.
    pub fn new(mut resolvers: Vec<Arc<dyn ValueResolver>>) -> Self {
        resolvers.sort_by_key(|resolver| Reverse(resolver.priority()));
        Self {
            resolvers: resolvers.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ValueResolver>> {
        self.resolvers.iter()
    }

    /// Offers the request to resolvers starting at `start` and returns the
    /// first non-declining answer together with the index that produced it.
    ///
    /// Callers that later discover the answer settled to not-found continue
    /// from `index + 1`, so no resolver is asked twice.
    pub fn next_resolved(&self, context: &EvalContext<'_>, start: usize) -> Option<(usize, Resolved)> {
        self.resolvers.iter().enumerate().skip(start).find_map(|(index, resolver)| {
            if !resolver.applies_to(context) {
                return None;
            }
            match resolver.resolve(context) {
                Outcome::Resolved(resolved) => Some((index, resolved)),
                Outcome::Declined => None,
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug)]
    struct Fixed {
        priority: i32,
        answer: Option<&'static str>,
    }

    impl ValueResolver for Fixed {
        fn priority(&self) -> i32 {
            self.priority
        }

        fn resolve(&self, _context: &EvalContext<'_>) -> Outcome {
            match self.answer {
                Some(answer) => Outcome::value(answer),
                None => Outcome::Declined,
            }
        }
    }

    fn fixed(priority: i32, answer: Option<&'static str>) -> Arc<dyn ValueResolver> {
        Arc::new(Fixed { priority, answer })
    }

    fn answer(chain: &ResolverChain, start: usize) -> Option<(usize, Value)> {
        let engine = Engine::builder().config(crate::EngineConfig::default()).build();
        let data = RenderData::default();
        let part = Part::property("anything");
        let context = EvalContext {
            base: &Value::Null,
            part: &part,
            arguments: &[],
            top_level: true,
            data: &data,
            engine: &engine,
        };
        chain.next_resolved(&context, start).map(|(index, resolved)| match resolved {
            Resolved::Value(value) => (index, value),
            other => panic!("unexpected {other:?}"),
        })
    }

    #[test]
    fn higher_priority_wins_and_ties_keep_registration_order() {
        let chain = ResolverChain::new(vec![fixed(1, Some("first")), fixed(1, Some("second")), fixed(5, Some("urgent"))]);
        assert_eq!(answer(&chain, 0), Some((0, json!("urgent"))));
        assert_eq!(answer(&chain, 1), Some((1, json!("first"))));
        assert_eq!(answer(&chain, 2), Some((2, json!("second"))));
    }

    #[test]
    fn declining_resolvers_are_skipped() {
        let chain = ResolverChain::new(vec![fixed(3, None), fixed(2, Some("fallback"))]);
        assert_eq!(answer(&chain, 0), Some((1, json!("fallback"))));
    }

    #[test]
    fn exhausted_chain_yields_nothing() {
        let chain = ResolverChain::new(vec![fixed(1, None)]);
        assert_eq!(answer(&chain, 0), None);
        assert_eq!(answer(&ResolverChain::default(), 0), None);
    }
}
