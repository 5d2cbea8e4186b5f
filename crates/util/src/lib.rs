pub mod async_runtime;
pub mod path_processing;

pub use async_runtime::block_on_future;
pub use path_processing::expand_tilde;
