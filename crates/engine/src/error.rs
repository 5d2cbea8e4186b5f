//! Failure taxonomy for evaluation and rendering.
//!
//! A missing value is not an error: it resolves to the engine's not-found
//! sentinel and renders with the configured fallback. Everything here aborts
//! the render it occurs in and reaches the `render()` caller tagged with the
//! expression text and its [`Origin`].

use stencil_types::{Expression, Origin};
use thiserror::Error;

/// Failure raised while evaluating or mapping a single expression.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("No namespace resolver registered for [{namespace}] in {{{expression}}} ({origin})")]
    NamespaceUnresolved { namespace: String, expression: String, origin: Origin },

    #[error("Resolver failed for {{{expression}}} ({origin}): {source}")]
    ResolverFailure {
        expression: String,
        origin: Origin,
        #[source]
        source: anyhow::Error,
    },

    #[error("Result mapper failed for {{{expression}}} ({origin}): {source}")]
    MapperFailure {
        expression: String,
        origin: Origin,
        #[source]
        source: anyhow::Error,
    },

    #[error("Property not found: {{{expression}}} ({origin})")]
    PropertyNotFound { expression: String, origin: Origin },

    #[error("Foreign async value returned for {{{expression}}} ({origin}) while unrestricted async values are disabled")]
    ForeignAsyncValue { expression: String, origin: Origin },
}

impl ResolutionError {
    /// Create a namespace-unresolved error for the given expression.
    pub fn namespace_unresolved(namespace: impl Into<String>, expression: &Expression) -> Self {
        Self::NamespaceUnresolved {
            namespace: namespace.into(),
            expression: expression.to_original_string(),
            origin: expression.origin().clone(),
        }
    }

    /// Wrap a resolver failure.
    ///
    /// Causes that already are tagged failures (for example a nested render
    /// triggered by a resolver) are passed through instead of wrapped twice.
    pub fn resolver_failure(source: anyhow::Error, expression: &Expression) -> Self {
        let source = match source.downcast::<ResolutionError>() {
            Ok(tagged) => return tagged,
            Err(source) => source,
        };
        let source = match source.downcast::<EngineError>() {
            Ok(EngineError::Render(tagged)) => return tagged,
            Ok(other) => anyhow::Error::new(other),
            Err(source) => source,
        };
        Self::ResolverFailure {
            expression: expression.to_original_string(),
            origin: expression.origin().clone(),
            source,
        }
    }

    /// Wrap a result mapper failure.
    pub fn mapper_failure(source: anyhow::Error, expression: &Expression) -> Self {
        Self::MapperFailure {
            expression: expression.to_original_string(),
            origin: expression.origin().clone(),
            source,
        }
    }

    /// Create a property-not-found error (strict rendering only).
    pub fn property_not_found(expression: &Expression) -> Self {
        Self::PropertyNotFound {
            expression: expression.to_original_string(),
            origin: expression.origin().clone(),
        }
    }

    /// Create a foreign-async-value error.
    pub fn foreign_async_value(expression: &Expression) -> Self {
        Self::ForeignAsyncValue {
            expression: expression.to_original_string(),
            origin: expression.origin().clone(),
        }
    }

    /// Source origin of the failing expression.
    pub fn origin(&self) -> &Origin {
        match self {
            Self::NamespaceUnresolved { origin, .. }
            | Self::ResolverFailure { origin, .. }
            | Self::MapperFailure { origin, .. }
            | Self::PropertyNotFound { origin, .. }
            | Self::ForeignAsyncValue { origin, .. } => origin,
        }
    }
}

/// Errors surfaced by the engine's public API.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Template not found: {id}")]
    TemplateNotFound { id: String },

    #[error("Parse error in template [{template_id}] line {line}: {message}")]
    Parse { template_id: String, line: usize, message: String },

    #[error(transparent)]
    Render(#[from] ResolutionError),

    #[error("Async runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}

impl EngineError {
    /// Create a template-not-found error.
    pub fn template_not_found(id: impl Into<String>) -> Self {
        Self::TemplateNotFound { id: id.into() }
    }

    /// Create a parse error.
    pub fn parse(template_id: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            template_id: template_id.into(),
            line,
            message: message.into(),
        }
    }
}
