//! Storage backends for the LIMS repositories.
//!
//! [`MemoryStore`] keeps everything in process memory and backs tests and
//! one-shot commands. [`JsonStore`] persists to a directory of JSON files
//! with atomic rewrites under an advisory directory lock.

mod error;
mod io;
mod json;
mod memory;
mod state;

pub use error::{Result, StoreError};
pub use json::{AUDIT_FILE, BATCHES_FILE, JsonStore, LOCK_FILE, SAMPLES_FILE, SEQUENCES_FILE};
pub use memory::MemoryStore;
