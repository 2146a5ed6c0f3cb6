//! Conversational pipeline for Friday.
//!
//! A message is classified into an [`Intent`], routed through the
//! [`HandlerRegistry`] to a [`ChatHandler`], optionally synthesized into prose
//! by a [`Completion`] call, and recorded in a [`ConversationStore`]. The
//! [`ChatOrchestrator`] ties these together.

pub mod classifier;
pub mod collaborators;
pub mod completion;
pub mod conversation;
pub mod error;
pub mod handler;
pub mod intent;
pub mod memory;
pub mod orchestrator;
pub mod types;
pub mod vault;

#[cfg(test)]
mod testing;

pub use classifier::IntentClassifier;
pub use collaborators::{
    CalendarEvent, CalendarProvider, HealthProvider, KnowledgeBase, MemoryItem, MemoryStore,
    NewNote, NoteStore, RetrievedChunk, SavedNote, SearchHit, WebSearch,
};
pub use completion::{Completion, OpenAiCompletion};
pub use conversation::{ConversationStore, InMemoryConversationStore, SqliteConversationStore};
pub use error::{ChatError, CompletionError, HandlerError, ServiceError};
pub use handler::{ChatHandler, HandlerRegistry, Services};
pub use intent::{Action, Intent};
pub use memory::SqliteMemoryStore;
pub use orchestrator::ChatOrchestrator;
pub use types::{ChatContext, ChatResponse, Role, Turn};
pub use vault::VaultNoteStore;
