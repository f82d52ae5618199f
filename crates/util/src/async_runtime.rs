//! Async runtime helpers for blocking callers.
//!
//! The registration cache and the run orchestrator are synchronous. The HTTP bindings are async,
//! so they cross the boundary here, reusing the current Tokio runtime when one is running.

use std::future::Future;

use tokio::{runtime::Handle, task};

/// Execute an async future from synchronous code.
///
/// Runtime construction failures are converted into the caller's error type through
/// `From<std::io::Error>`, so bindings keep their own error taxonomy.
///
/// # Notes
/// - Reuses the current multi-threaded runtime when available.
/// - Falls back to a single-threaded runtime for call sites outside Tokio.
pub fn block_on_future<F, T, E>(future: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<std::io::Error>,
{
    if let Ok(handle) = Handle::try_current() {
        task::block_in_place(|| handle.block_on(future))
    } else {
        tokio::runtime::Builder::new_current_thread().enable_all().build()?.block_on(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_outside_a_runtime() {
        let value: Result<u32, std::io::Error> = block_on_future(async { Ok(7) });
        assert_eq!(value.unwrap(), 7);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn reuses_the_current_runtime() {
        let value: Result<&str, std::io::Error> = block_on_future(async { Ok("inside") });
        assert_eq!(value.unwrap(), "inside");
    }
}
