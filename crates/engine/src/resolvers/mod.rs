//! Built-in value resolvers installed by [`EngineBuilder::add_defaults`](crate::EngineBuilder::add_defaults).
//!
//! They only resolve member parts (`user.name`, `items.size`); top-level names
//! come from instance data or user-registered resolvers.

mod list;
mod logic;
mod map;
mod string;

pub use list::ListResolver;
pub use logic::LogicResolver;
pub use map::MapResolver;
pub use string::StringResolver;

use std::sync::Arc;

use crate::resolver::ValueResolver;

pub(crate) fn defaults() -> Vec<Arc<dyn ValueResolver>> {
    vec![Arc::new(MapResolver), Arc::new(ListResolver), Arc::new(StringResolver), Arc::new(LogicResolver)]
}
