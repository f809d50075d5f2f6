//! IO modules - ticket persistence collaborators
//!
//! - `store` - `TicketStore` trait and the in-memory store
//! - `jsonl_store` - append-only JSONL ticket journal

pub mod jsonl_store;
pub mod store;

// Re-export commonly used types
pub use jsonl_store::JsonlTicketStore;
pub use store::{InMemoryTicketStore, TicketStore};
