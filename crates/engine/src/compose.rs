//! Normalization of resolver return values.
//!
//! Resolvers may hand back a plain value, an already-built [`ResultNode`], an
//! already-completed result, a pending future or a foreign future. [`flatten`]
//! unwraps these shapes repeatedly until a terminal [`Settled`] value remains.
//! Synchronous shapes are unwrapped in a loop without allocating; pending
//! shapes hand over to a single trampolined future, so long chains never grow
//! the call or await stack. The first failure stops unwrapping.

use std::{fmt, future::Future, sync::Arc};

use futures_util::future::BoxFuture;
use serde_json::Value;
use stencil_types::Expression;

use crate::{Completion, ResolutionError, node::ResultNode};

/// Boxed future produced by resolvers and computed suppliers.
pub type ResolveFuture = BoxFuture<'static, anyhow::Result<Resolved>>;

/// Every shape a resolver or computed supplier may produce.
pub enum Resolved {
    /// Plain value; `Value::Null` is a valid resolution.
    Value(Value),
    /// The not-found sentinel.
    NotFound,
    /// Final result node, used as-is.
    Node(ResultNode),
    /// Already-completed handle, possibly wrapping a further shape.
    Completed(anyhow::Result<Box<Resolved>>),
    /// Engine-native pending handle.
    Pending(ResolveFuture),
    /// Future handed over from foreign code; only awaited in unrestricted mode.
    Foreign(ResolveFuture),
}

impl Resolved {
    pub fn value(value: impl Into<Value>) -> Self {
        Self::Value(value.into())
    }

    pub fn completed(result: anyhow::Result<Resolved>) -> Self {
        Self::Completed(result.map(Box::new))
    }

    pub fn failed(error: impl Into<anyhow::Error>) -> Self {
        Self::Completed(Err(error.into()))
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = anyhow::Result<Resolved>> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }

    /// Wraps an arbitrary future whose output converts into a resolution.
    pub fn foreign<F, T, E>(future: F) -> Self
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Into<Resolved>,
        E: Into<anyhow::Error>,
    {
        Self::Foreign(Box::pin(async move { future.await.map(Into::into).map_err(Into::into) }))
    }
}

impl From<Value> for Resolved {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<ResultNode> for Resolved {
    fn from(node: ResultNode) -> Self {
        Self::Node(node)
    }
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::NotFound => f.write_str("NotFound"),
            Self::Node(node) => f.debug_tuple("Node").field(node).finish(),
            Self::Completed(result) => f.debug_tuple("Completed").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
            Self::Foreign(_) => f.write_str("Foreign(..)"),
        }
    }
}

/// Terminal outcome once every asynchronous shape has been unwrapped.
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    Value(Value),
    NotFound,
    Node(ResultNode),
}

impl Settled {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Value used as the base object for the next part or as a method argument.
    ///
    /// Not-found collapses to `Value::Null` here; callers that must tell the
    /// two apart check [`Settled::is_not_found`] first.
    pub fn into_value(self) -> Value {
        match self {
            Self::Value(value) => value,
            Self::NotFound => Value::Null,
            Self::Node(node) => node.into_value(),
        }
    }
}

impl From<Settled> for Resolved {
    fn from(settled: Settled) -> Self {
        match settled {
            Settled::Value(value) => Self::Value(value),
            Settled::NotFound => Self::NotFound,
            Settled::Node(node) => Self::Node(node),
        }
    }
}

enum Step {
    Done(Result<Settled, ResolutionError>),
    Suspend(ResolveFuture),
}

/// Normalizes a resolver return value into a single completion.
///
/// `expression` tags any failure with its source text and origin.
/// `unrestricted` decides whether [`Resolved::Foreign`] futures are awaited.
pub fn flatten(resolved: Resolved, expression: &Arc<Expression>, unrestricted: bool) -> Completion<Settled> {
    match step(resolved, expression, unrestricted) {
        Step::Done(result) => Completion::Ready(result),
        Step::Suspend(future) => Completion::pending(trampoline(future, Arc::clone(expression), unrestricted)),
    }
}

fn step(mut current: Resolved, expression: &Expression, unrestricted: bool) -> Step {
    loop {
        current = match current {
            Resolved::Value(value) => return Step::Done(Ok(Settled::Value(value))),
            Resolved::NotFound => return Step::Done(Ok(Settled::NotFound)),
            Resolved::Node(node) => return Step::Done(Ok(Settled::Node(node))),
            Resolved::Completed(Ok(next)) => *next,
            Resolved::Completed(Err(error)) => return Step::Done(Err(ResolutionError::resolver_failure(error, expression))),
            Resolved::Pending(future) => return Step::Suspend(future),
            Resolved::Foreign(future) if unrestricted => return Step::Suspend(future),
            Resolved::Foreign(_) => return Step::Done(Err(ResolutionError::foreign_async_value(expression))),
        };
    }
}

async fn trampoline(mut future: ResolveFuture, expression: Arc<Expression>, unrestricted: bool) -> Result<Settled, ResolutionError> {
    loop {
        let next = future
            .await
            .map_err(|error| ResolutionError::resolver_failure(error, &expression))?;
        match step(next, &expression, unrestricted) {
            Step::Done(result) => return result,
            Step::Suspend(pending) => future = pending,
        }
    }
}
