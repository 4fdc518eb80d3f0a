//! Story generation pipeline
//!
//! Refinement, body generation with model fallback, metadata
//! extraction, and persistence, orchestrated by [`StoryGenerator`].

mod generator;
mod metadata;
mod prompts;
mod refiner;

pub use generator::{GenerationError, GenerationEvent, StoryGenerator};
pub use metadata::{StoryMetadata, extract_metadata};
pub use refiner::refine_topic;
