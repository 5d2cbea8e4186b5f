//! Asynchronous handle with a synchronous fast path.
//!
//! A [`Completion`] is either already finished or wraps a boxed future. The
//! ready variant never allocates or touches a runtime, so purely synchronous
//! resolvers, literals and plain data lookups complete in the caller's flow.

use std::{
    fmt,
    future::{Future, IntoFuture},
    task::{Context, Poll},
};

use futures_util::{
    FutureExt,
    future::{BoxFuture, Either, Ready, ready, try_join_all},
    task::noop_waker_ref,
};

use crate::ResolutionError;

/// Result of an asynchronous evaluation step.
pub enum Completion<T> {
    /// Already completed, successfully or not.
    Ready(Result<T, ResolutionError>),
    /// Still pending; completes when the future is driven.
    Pending(BoxFuture<'static, Result<T, ResolutionError>>),
}

impl<T: Send + 'static> Completion<T> {
    pub fn completed(value: T) -> Self {
        Self::Ready(Ok(value))
    }

    pub fn failed(error: ResolutionError) -> Self {
        Self::Ready(Err(error))
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, ResolutionError>> + Send + 'static,
    {
        Self::Pending(Box::pin(future))
    }

    /// Polls `future` once in the caller's flow.
    ///
    /// A future that finishes on that first poll yields a ready handle; one
    /// that does not is kept as is and resumed by whoever drives the result.
    pub fn eager<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, ResolutionError>> + Send + 'static,
    {
        let mut future: BoxFuture<'static, _> = Box::pin(future);
        match future.poll_unpin(&mut Context::from_waker(noop_waker_ref())) {
            Poll::Ready(result) => Self::Ready(result),
            Poll::Pending => Self::Pending(future),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Chains a continuation.
    ///
    /// A ready value runs `next` immediately; a pending one schedules it after
    /// the inner future. Failures short-circuit and `next` never runs.
    pub fn and_then<U, F>(self, next: F) -> Completion<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Completion<U> + Send + 'static,
    {
        match self {
            Self::Ready(Ok(value)) => next(value),
            Self::Ready(Err(error)) => Completion::Ready(Err(error)),
            Self::Pending(future) => Completion::pending(async move { next(future.await?).await }),
        }
    }

    pub fn map<U, F>(self, transform: F) -> Completion<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        self.and_then(|value| Completion::completed(transform(value)))
    }

    /// Joins completions, preserving their order.
    ///
    /// Stays synchronous while every element is ready. Once a pending element is
    /// met, the remainder is driven concurrently and the first failure wins.
    pub fn all(completions: Vec<Completion<T>>) -> Completion<Vec<T>> {
        let mut values = Vec::with_capacity(completions.len());
        let mut remaining = completions.into_iter();
        while let Some(completion) = remaining.next() {
            match completion {
                Self::Ready(Ok(value)) => values.push(value),
                Self::Ready(Err(error)) => return Completion::failed(error),
                pending @ Self::Pending(_) => {
                    let rest: Vec<_> = std::iter::once(pending).chain(remaining).map(IntoFuture::into_future).collect();
                    return Completion::pending(async move {
                        values.extend(try_join_all(rest).await?);
                        Ok(values)
                    });
                }
            }
        }
        Completion::completed(values)
    }
}

impl<T: Send + 'static> IntoFuture for Completion<T> {
    type Output = Result<T, ResolutionError>;
    type IntoFuture = Either<Ready<Result<T, ResolutionError>>, BoxFuture<'static, Result<T, ResolutionError>>>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Self::Ready(result) => Either::Left(ready(result)),
            Self::Pending(future) => Either::Right(future),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}
