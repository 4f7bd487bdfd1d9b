//! Storage engine interface and the in-memory reference engine.
//!
//! The executor consumes storage through the narrow [`Engine`] trait;
//! [`MemoryEngine`] is the bundled implementation.

mod engine;
mod error;
mod memory;
mod record;

pub use engine::{Attribute, Engine, KeyBound, QueryResponse, QueryTimes, Residual, RowComparator};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryEngine;
pub use record::Record;
