//! Built-in token store implementations.

mod memory;

pub use memory::MemoryTokenStore;
