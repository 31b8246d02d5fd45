// src/pipe/mod.rs

//! Pipe specifications: model, validation and local record extraction.

pub mod defaults;
pub mod extract;
pub mod model;
pub mod records;
pub mod validate;

pub use extract::{ExtractionError, Extractor, FieldValue, Record};
pub use model::{Pipe, PipePatch, PipeSpec};
pub use validate::{ValidationError, ensure_valid, validate};
