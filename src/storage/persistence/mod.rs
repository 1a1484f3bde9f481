//! Persistence gateway implementations.

mod filesystem;
mod memory;

pub use filesystem::FilesystemGateway;
pub use memory::MemoryGateway;
