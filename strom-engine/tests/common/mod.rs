//! Common test utilities for integration tests.

#![allow(dead_code)]

use strom_engine::{EngineConfig, ThreadedEngine};

/// Initialize tracing output for tests. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// An engine with small, deterministic pool sizes.
pub fn test_engine() -> ThreadedEngine {
    init_tracing();
    ThreadedEngine::new(
        EngineConfig::default()
            .with_compute_workers(4)
            .with_copy_channels(2),
    )
    .expect("test engine configuration is valid")
}
