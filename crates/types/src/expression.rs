//! Immutable description of a template placeholder's data access path.
//!
//! An [`Expression`] such as `{msg:hello(user.name).length}` is an ordered list
//! of [`Part`]s (`hello(user.name)`, `length`), an optional namespace (`msg`),
//! and the [`Origin`] it was parsed from. Virtual-method parts keep their
//! argument expressions unevaluated so build-time validation can inspect them
//! without running anything.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Location of an expression in its template, used for diagnostics only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Origin {
    /// Identifier of the template the expression was parsed from.
    pub template_id: String,
    /// 1-based line number of the placeholder.
    pub line: usize,
}

impl Origin {
    pub fn new(template_id: impl Into<String>, line: usize) -> Self {
        Self {
            template_id: template_id.into(),
            line,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "template [{}] line {}", self.template_id, self.line)
    }
}

/// One segment of an expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    /// Plain property access, e.g. `name` in `user.name`.
    Property { name: String },
    /// Virtual method invocation, e.g. `get(0)` in `items.get(0)`.
    ///
    /// Each parameter is an independent expression that must be evaluated
    /// before the method itself can be resolved.
    VirtualMethod { name: String, parameters: Vec<Arc<Expression>> },
}

impl Part {
    /// Creates a property part.
    pub fn property(name: impl Into<String>) -> Self {
        Self::Property { name: name.into() }
    }

    /// Creates a virtual method part with the given argument expressions.
    pub fn virtual_method(name: impl Into<String>, parameters: Vec<Expression>) -> Self {
        Self::VirtualMethod {
            name: name.into(),
            parameters: parameters.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Property { name } | Self::VirtualMethod { name, .. } => name,
        }
    }

    pub fn is_virtual_method(&self) -> bool {
        matches!(self, Self::VirtualMethod { .. })
    }

    /// Unevaluated argument expressions; empty for property parts.
    pub fn parameters(&self) -> &[Arc<Expression>] {
        match self {
            Self::Property { .. } => &[],
            Self::VirtualMethod { parameters, .. } => parameters,
        }
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Property { name } => f.write_str(name),
            Self::VirtualMethod { name, parameters } => {
                write!(f, "{name}(")?;
                for (index, parameter) in parameters.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{parameter}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// Parsed, immutable template expression.
///
/// Fields are private so an expression cannot be mutated after construction;
/// clones are cheap enough that callers usually share one behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expression {
    namespace: Option<String>,
    parts: Vec<Part>,
    /// Pre-computed constant; present only for literal expressions.
    literal: Option<Value>,
    origin: Origin,
}

impl Expression {
    /// Creates a non-literal expression.
    pub fn new(namespace: Option<String>, parts: Vec<Part>, origin: Origin) -> Self {
        Self {
            namespace,
            parts,
            literal: None,
            origin,
        }
    }

    /// Creates a literal expression holding a pre-computed constant.
    ///
    /// The single part carries the literal's source text so that
    /// [`Expression::to_original_string`] still reproduces the placeholder.
    pub fn literal(value: Value, origin: Origin) -> Self {
        let text = literal_source_text(&value);
        Self {
            namespace: None,
            parts: vec![Part::property(text)],
            literal: Some(value),
            origin,
        }
    }

    /// Convenience constructor for an unnamespaced property path such as `user.name`.
    pub fn from_path(path: &str, origin: Origin) -> Self {
        let parts = path.split('.').filter(|segment| !segment.is_empty()).map(Part::property).collect();
        Self::new(None, parts, origin)
    }

    /// True iff the expression has exactly one part, no namespace and a constant value.
    pub fn is_literal(&self) -> bool {
        self.literal.is_some() && self.namespace.is_none() && self.parts.len() == 1
    }

    pub fn literal_value(&self) -> Option<&Value> {
        if self.is_literal() { self.literal.as_ref() } else { None }
    }

    pub fn has_namespace(&self) -> bool {
        self.namespace.is_some()
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    /// Name of the first part for unnamespaced, non-literal expressions.
    ///
    /// These are the names looked up in a template instance's data.
    pub fn top_level_name(&self) -> Option<&str> {
        if self.is_literal() || self.has_namespace() {
            return None;
        }
        self.parts.first().map(Part::name)
    }

    /// Reconstructs the placeholder content, e.g. `msg:hello(name)`.
    pub fn to_original_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(namespace) = &self.namespace {
            write!(f, "{namespace}:")?;
        }
        for (index, part) in self.parts.iter().enumerate() {
            if index > 0 {
                f.write_str(".")?;
            }
            write!(f, "{part}")?;
        }
        Ok(())
    }
}

fn literal_source_text(value: &Value) -> String {
    match value {
        Value::String(text) => format!("'{text}'"),
        other => other.to_string(),
    }
}
