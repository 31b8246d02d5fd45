// src/exec/mod.rs

//! Execution orchestration.
//!
//! - [`slot`] tracks the one execution allowed at a time and its cancel
//!   handle.
//! - [`orchestrator`] resolves a pipe, builds the engine config blob, runs
//!   the engine and records the outcome in the execution history.

pub mod orchestrator;
pub mod slot;

pub use orchestrator::{ExecutionOutcome, Orchestrator};
pub use slot::{ExecutionSlot, ExecutionStatusReport, SlotGuard};
