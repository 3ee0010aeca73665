//! Source generation pass.
//!
//! Generators run once per input tree on a worker pool and share a
//! `TagSet` through an explicit context. Their outputs are merged in a
//! path-sorted order after the join, so output never depends on thread
//! scheduling.

mod driver;
mod tags;

pub use driver::{
    GenerationConfig, GenerationContext, GenerationOutput, GenerationResult, Generator,
    OutputPaths, ParallelGenerationDriver, WorkerOutput, LOOSE_CODE_PATH,
};
pub use tags::TagSet;
