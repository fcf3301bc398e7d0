//! Named thread helpers.

use std::io;
use std::thread::{self, JoinHandle};

/// Spawns a background thread named `muscle-{name}`.
///
/// # Errors
///
/// Returns an error if the operating system refuses to create the thread.
pub fn spawn_named_thread<F, T>(name: &str, task: F) -> io::Result<JoinHandle<T>>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let thread_name = format!("muscle-{name}");

    thread::Builder::new().name(thread_name.clone()).spawn(task).inspect_err(|err| {
        tracing::error!(thread = %thread_name, error = %err, "failed to spawn thread");
    })
}
