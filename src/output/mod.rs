//! Run output: the JSON envelope and its human-readable summary

mod envelope;

pub use envelope::PipelineOutput;
