// Application layer: use cases and orchestration over the repository.

pub mod error;
mod locks;
mod service;

pub use error::*;
pub use locks::KeyedLocks;
pub use service::*;
