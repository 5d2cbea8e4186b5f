//! Per-render state: data bindings, lazily computed bindings, attributes and
//! completion callbacks.
//!
//! A [`TemplateInstance`] belongs to exactly one logical render. Data is
//! readable by resolvers through [`RenderData`]; attributes are not.

use std::{
    any::Any,
    collections::HashMap,
    fmt,
    mem,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use serde_json::Value;
use stencil_types::Expression;
use stencil_util::block_on_future;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::{
    Completion, EngineError, Template,
    compose::{Resolved, Settled, flatten},
};

type Supplier = Box<dyn Fn(&str) -> Resolved + Send + Sync>;
type Callback = Box<dyn FnOnce() + Send>;

/// Named data visible to expression lookups during one render.
///
/// Explicit values always win over computed bindings for the same key.
/// Writes made while a render is running are visible to every lookup issued
/// afterwards.
#[derive(Default)]
pub struct RenderData {
    explicit: RwLock<HashMap<String, Value>>,
    computed: RwLock<HashMap<String, Arc<ComputedBinding>>>,
}

impl RenderData {
    /// Sets an explicit value; the last write wins.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.explicit
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.explicit.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.explicit.read().unwrap_or_else(PoisonError::into_inner).contains_key(key)
            || self.computed.read().unwrap_or_else(PoisonError::into_inner).contains_key(key)
    }

    /// Registers a lazy binding; the supplier receives the key it is bound to.
    pub fn set_computed<F>(&self, key: impl Into<String>, supplier: F)
    where
        F: Fn(&str) -> Resolved + Send + Sync + 'static,
    {
        let key = key.into();
        let binding = Arc::new(ComputedBinding {
            key: key.clone(),
            supplier: Box::new(supplier),
            memo: OnceCell::new(),
        });
        self.computed.write().unwrap_or_else(PoisonError::into_inner).insert(key, binding);
    }

    pub(crate) fn computed(&self, key: &str) -> Option<Arc<ComputedBinding>> {
        self.computed.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }
}

impl fmt::Debug for RenderData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let explicit = self.explicit.read().unwrap_or_else(PoisonError::into_inner);
        let computed = self.computed.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("RenderData")
            .field("explicit", &*explicit)
            .field("computed", &computed.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Lazily evaluated binding with a memoized outcome.
///
/// The supplier is invoked at most once successfully, even when several
/// lookups race on first access: the first caller runs it and the others
/// wait for its outcome. A failed invocation is not memoized, so a later
/// lookup runs the supplier again.
///
/// The first lookup runs the supplier in the caller's flow, so a supplier
/// returning a plain value completes without a runtime.
pub(crate) struct ComputedBinding {
    key: String,
    supplier: Supplier,
    memo: OnceCell<Settled>,
}

impl ComputedBinding {
    pub(crate) fn evaluate(self: &Arc<Self>, expression: &Arc<Expression>, unrestricted: bool) -> Completion<Settled> {
        if let Some(settled) = self.memo.get() {
            return Completion::completed(settled.clone());
        }
        let binding = Arc::clone(self);
        let expression = Arc::clone(expression);
        Completion::eager(async move {
            let settled = binding
                .memo
                .get_or_try_init(|| {
                    debug!(key = %binding.key, "evaluating computed binding");
                    flatten((binding.supplier)(&binding.key), &expression, unrestricted).into_future()
                })
                .await?;
            Ok(settled.clone())
        })
    }
}

/// One render invocation of a [`Template`].
pub struct TemplateInstance {
    template: Template,
    data: Arc<RenderData>,
    attributes: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
    callbacks: Mutex<Vec<Callback>>,
}

impl TemplateInstance {
    pub(crate) fn new(template: Template) -> Self {
        Self {
            template,
            data: Arc::new(RenderData::default()),
            attributes: RwLock::new(HashMap::new()),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn data(&self) -> &RenderData {
        &self.data
    }

    /// Sets explicit data for `key`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> &Self {
        self.data.set(key, value);
        self
    }

    /// Registers a computed binding evaluated on first lookup of `key`.
    pub fn set_computed<F>(&self, key: impl Into<String>, supplier: F) -> &Self
    where
        F: Fn(&str) -> Resolved + Send + Sync + 'static,
    {
        self.data.set_computed(key, supplier);
        self
    }

    /// Stores out-of-band metadata; never visible to resolvers.
    pub fn set_attribute<T>(&self, key: impl Into<String>, value: T) -> &Self
    where
        T: Any + Send + Sync,
    {
        self.attributes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), Arc::new(value));
        self
    }

    /// Returns the attribute stored under `key` if it has type `T`.
    pub fn get_attribute<T>(&self, key: &str) -> Option<T>
    where
        T: Any + Clone,
    {
        let attributes = self.attributes.read().unwrap_or_else(PoisonError::into_inner);
        attributes.get(key)?.downcast_ref::<T>().cloned()
    }

    /// Registers a callback fired once after the render succeeds.
    pub fn on_complete<F>(&self, callback: F) -> &Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.callbacks.lock().unwrap_or_else(PoisonError::into_inner).push(Box::new(callback));
        self
    }

    /// Renders the template, blocking the caller until every expression completes.
    ///
    /// Purely synchronous templates never touch an async runtime.
    pub fn render(&self) -> Result<String, EngineError> {
        let output = match self.template.render_with(Arc::clone(&self.data)) {
            Completion::Ready(result) => result?,
            Completion::Pending(future) => block_on_future(future)??,
        };
        self.fire_callbacks();
        Ok(output)
    }

    /// Non-blocking form of [`TemplateInstance::render`].
    ///
    /// Dropping the returned future abandons the render; callbacks do not fire.
    pub async fn render_async(&self) -> Result<String, EngineError> {
        let output = self.template.render_with(Arc::clone(&self.data)).await?;
        self.fire_callbacks();
        Ok(output)
    }

    fn fire_callbacks(&self) {
        let callbacks = mem::take(&mut *self.callbacks.lock().unwrap_or_else(PoisonError::into_inner));
        for callback in callbacks {
            callback();
        }
    }
}

impl fmt::Debug for TemplateInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateInstance")
            .field("template", &self.template.id())
            .field("data", &self.data)
            .finish_non_exhaustive()
    }
}
