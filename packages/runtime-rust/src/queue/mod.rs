//! Job backend implementations.

pub mod memory;

pub use memory::{DeadLetter, InMemoryJobBackend, JobDisposition};
