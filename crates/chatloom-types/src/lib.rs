pub mod task;
pub mod wire;

pub use task::*;
pub use wire::*;
