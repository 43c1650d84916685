pub mod chain;
pub mod conversation;
pub mod error;
pub mod events;
pub mod expand;
pub mod orchestrator;
pub mod prune;
pub mod queue;
pub mod store;
pub mod tokens;
pub mod tools;

pub use chain::*;
pub use conversation::*;
pub use error::*;
pub use events::*;
pub use expand::*;
pub use orchestrator::*;
pub use prune::*;
pub use queue::*;
pub use store::*;
pub use tokens::*;
pub use tools::*;
