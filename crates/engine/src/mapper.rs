//! Conversion of resolved values into output text.
//!
//! Mappers run in priority order once a result is final. The first mapper that
//! returns `Some(text)` wins; when every mapper declines, [`format_value`]
//! applies. Mappers see the originating [`Expression`] so formatting can depend
//! on where a value came from rather than only on the value itself.

use std::{cmp::Reverse, fmt::Debug, sync::Arc};

use serde_json::Value;
use stencil_types::Expression;

use crate::{EngineConfig, ResolutionError, node::ResultValue, resolver::DEFAULT_PRIORITY};

/// Post-processor turning a final value into text.
pub trait ResultMapper: Send + Sync + Debug {
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Returns `Ok(None)` to decline and let the next mapper try.
    fn map(&self, value: &ResultValue, expression: &Expression) -> anyhow::Result<Option<String>>;
}

/// Immutable, priority-ordered list of result mappers.
#[derive(Debug, Clone, Default)]
pub struct MapperChain {
    mappers: Arc<[Arc<dyn ResultMapper>]>,
}

impl MapperChain {
    pub fn new(mut mappers: Vec<Arc<dyn ResultMapper>>) -> Self {
        mappers.sort_by_key(|mapper| Reverse(mapper.priority()));
        Self { mappers: mappers.into() }
    }

    pub fn len(&self) -> usize {
        self.mappers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappers.is_empty()
    }

    /// Produces the text for one result.
    ///
    /// Not-found results that no mapper claims render as the configured
    /// missing value, or fail with `PropertyNotFound` in strict mode.
    pub fn map(&self, value: &ResultValue, expression: &Expression, config: &EngineConfig) -> Result<String, ResolutionError> {
        for mapper in self.mappers.iter() {
            let mapped = mapper
                .map(value, expression)
                .map_err(|error| ResolutionError::mapper_failure(error, expression))?;
            if let Some(text) = mapped {
                return Ok(text);
            }
        }
        match value {
            ResultValue::Value(value) => Ok(format_value(value)),
            ResultValue::NotFound if config.strict_rendering => Err(ResolutionError::property_not_found(expression)),
            ResultValue::NotFound => Ok(config.missing_value.clone()),
        }
    }
}

/// Default stringification used when no mapper claims a value.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(string_value) => string_value.clone(),
        Value::Number(number_value) => number_value.to_string(),
        Value::Bool(boolean_value) => boolean_value.to_string(),
        Value::Null => String::new(),
        other_value => other_value.to_string(),
    }
}
