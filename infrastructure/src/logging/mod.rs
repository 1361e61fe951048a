//! Transcript logging

pub mod jsonl_transcript;

pub use jsonl_transcript::JsonlTranscriptRenderer;
