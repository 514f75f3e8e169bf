//! vigil-ctl — process supervisor for the vigil pipeline.

pub mod supervisor;

pub use supervisor::{StartOutcome, Supervisor};
