mod memory;
mod traits;

pub use memory::InMemoryIndex;
pub use traits::*;
