//! Async runtime helpers for blocking callers.
//!
//! This module provides a single entry point for executing async futures from
//! synchronous code paths, reusing the current Tokio runtime when available.

use std::{future::Future, io, thread};
use tokio::{
    runtime::{Builder, Handle, RuntimeFlavor},
    task,
};

/// Execute an async future from synchronous code.
///
/// # Arguments
/// - `future`: The future to run to completion.
///
/// # Returns
/// Returns the future's output or an I/O error if a Tokio runtime cannot be created.
///
/// # Notes
/// - Reuses the current runtime when it is multi-threaded.
/// - Inside a current-thread runtime the future is driven on a helper thread,
///   since blocking that runtime's only worker would deadlock.
/// - Falls back to a single-threaded runtime for call sites outside Tokio.
pub fn block_on_future<F, T>(future: F) -> io::Result<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => Ok(task::block_in_place(|| handle.block_on(future))),
        Ok(_) => thread::scope(|scope| {
            scope
                .spawn(|| current_thread_block_on(future))
                .join()
                .unwrap_or_else(|_| Err(io::Error::other("blocking render thread panicked")))
        }),
        Err(_) => current_thread_block_on(future),
    }
}

fn current_thread_block_on<F, T>(future: F) -> io::Result<T>
where
    F: Future<Output = T>,
{
    Ok(Builder::new_current_thread().enable_all().build()?.block_on(future))
}
