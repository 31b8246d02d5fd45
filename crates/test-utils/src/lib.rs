pub mod builders;
pub mod fake_engine;
pub mod recording_backend;

use std::sync::{Arc, Once};

use datachef::PipeService;
use datachef::catalog::PipeCatalog;
use datachef::config::ConfigHandle;
use datachef::config::model::AppConfig;
use datachef::engine::{EngineBackend, EngineLauncher, ProcessEngine};
use tracing_subscriber::{fmt, EnvFilter};

use crate::recording_backend::RecordingBackend;

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// An engine that runs `script` through `sh -c`. The invocation arguments
/// are available to the script as `$1..`.
pub fn stub_engine(script: &str) -> ProcessEngine {
    ProcessEngine::new(
        EngineLauncher::new("sh")
            .arg("-c")
            .arg(script)
            .arg("stub-engine"),
    )
}

/// A service over an in-memory catalog and the given storage and engine.
pub fn service_with(backend: Arc<RecordingBackend>, engine: Arc<dyn EngineBackend>) -> PipeService {
    let catalog = PipeCatalog::in_memory().expect("in-memory catalog");
    PipeService::new(
        Arc::new(catalog),
        backend,
        engine,
        ConfigHandle::in_memory(AppConfig::default()),
    )
}
