#![allow(dead_code)]

use std::sync::Arc;

use datachef::PipeService;
use datachef_test_utils::fake_engine::FakeEngine;
use datachef_test_utils::recording_backend::RecordingBackend;
use datachef_test_utils::service_with;

pub use datachef_test_utils::builders::PipeSpecBuilder;
pub use datachef_test_utils::{init_tracing, with_timeout};

/// A service wired to counting storage and a scripted engine.
pub struct Harness {
    pub service: PipeService,
    pub storage: Arc<RecordingBackend>,
    pub engine: Arc<FakeEngine>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_engine(FakeEngine::new())
    }

    pub fn with_engine(engine: FakeEngine) -> Self {
        init_tracing();
        let storage = Arc::new(RecordingBackend::new());
        let engine = Arc::new(engine);
        let service = service_with(Arc::clone(&storage), engine.clone());
        Self {
            service,
            storage,
            engine,
        }
    }
}
