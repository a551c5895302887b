//! Core pipeline orchestration and domain logic for bizproposal.
//!
//! This crate ties together text extraction, gap detection, detail
//! resolution, instruction normalization, per-topic generation, and
//! document assembly into one request pipeline ([`ProposalPipeline`]).

pub mod assembler;
pub mod gaps;
pub mod generator;
pub mod instructions;
pub mod pipeline;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use gaps::{GapReport, detect_missing};
pub use generator::{ProposalGenerator, build_prompt};
pub use instructions::{
    DEFAULT_SESSION, FileInstructionStore, InstructionNormalizer, InstructionSource,
    InstructionStore, MemoryInstructionStore,
};
pub use pipeline::{
    Collaborators, DocumentAnalysis, PipelineStage, ProgressReporter, ProposalOutcome,
    ProposalPipeline, ProposalRequest, SilentProgress, analyze_document, extract_text,
};
