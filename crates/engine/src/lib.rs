//! # Stencil Engine
//!
//! Expression resolution core of the Stencil template engine. Templates are
//! parsed once into text and expression nodes; each render evaluates the
//! expressions of one [`TemplateInstance`] against a chain of pluggable
//! resolvers, flattens whatever asynchronous shapes those resolvers return,
//! and turns the final values into text through a chain of result mappers.
//!
//! ```rust
//! use stencil_engine::{Engine, EngineConfig};
//!
//! let engine = Engine::builder().add_defaults().config(EngineConfig::default()).build();
//! let template = engine.parse("Hello {name}! You have {items.size} items.")?;
//! let output = template.instance().set("name", "Ada").set("items", vec![1, 2, 3]).render()?;
//! assert_eq!(output, "Hello Ada! You have 3 items.");
//! # Ok::<(), stencil_engine::EngineError>(())
//! ```
//!
//! Evaluation never blocks on its own: purely synchronous lookups complete in
//! the caller's flow and only genuinely pending values are awaited.
//! [`TemplateInstance::render`] blocks the caller until the output is ready,
//! [`TemplateInstance::render_async`] does not.

pub mod completion;
pub mod compose;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod instance;
pub mod mapper;
pub mod node;
pub mod parser;
pub mod resolver;
pub mod resolvers;

pub use completion::Completion;
pub use compose::{ResolveFuture, Resolved, Settled};
pub use config::EngineConfig;
pub use context::ResolutionContext;
pub use engine::{Engine, EngineBuilder, Template};
pub use error::{EngineError, ResolutionError};
pub use instance::{RenderData, TemplateInstance};
pub use mapper::{MapperChain, ResultMapper, format_value};
pub use node::{ExpressionNode, ResultNode, ResultValue, TemplateNode};
pub use resolver::{DEFAULT_PRIORITY, EvalContext, NamespaceResolver, Outcome, ResolverChain, ValueResolver};
pub use stencil_types::{Expression, Origin, Part};
