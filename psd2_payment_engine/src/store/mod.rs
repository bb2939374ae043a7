//! Session-store backends.
//!
//! [`MemorySessionStore`] is the default backend: a process-wide concurrency-safe map. Other
//! backends only need to implement [`crate::traits::SessionStore`].

mod memory;

pub use memory::MemorySessionStore;
