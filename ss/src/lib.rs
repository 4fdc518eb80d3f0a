//! StoryStore - persistent record store for generated stories
//!
//! A small SQLite-backed store keyed by opaque string ids. Records are
//! created once, after a generation fully succeeds, and are immutable
//! afterwards: the store exposes `create`, `get`, and `list` only.
//!
//! One `StoryStore` handle is opened per generation session and dropped
//! on every exit path, so the underlying connection is never shared
//! between sessions.

mod error;
mod record;
mod store;

pub use error::StoreError;
pub use record::{NewStory, QuestionAnswer, StoryRecord};
pub use store::StoryStore;
