//! vigil-core — protocol primitives and shared plumbing for the vigil pipeline.

pub mod config;
pub mod control;
pub mod frame;
pub mod gate;
pub mod process;
