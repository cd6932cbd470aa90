// src/engine/common.rs
//
// Shared utilities for engine modules.

use crate::error::EngineError;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Run a codec call under the engine's panic policy: a panic inside a
/// third-party codec must surface as an error on this request, not take the
/// process down.
pub fn run_with_panic_policy<T>(
    stage: &'static str,
    f: impl FnOnce() -> Result<T, EngineError>,
) -> Result<T, EngineError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(EngineError::internal_panic(format!("{stage}: {message}")))
        }
    }
}
