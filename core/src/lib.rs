pub mod agent;
pub mod config;
pub mod error;
pub mod providers;
pub mod session;
pub mod tools;
pub mod traits;

#[cfg(test)]
mod testing;

pub use agent::{AgentLoop, ContextBuilder, ToolRegistry};
pub use config::*;
pub use error::ScoutError;
pub use providers::*;
pub use session::{ChatSession, Conversation, Message};
pub use tools::*;
pub use traits::*;
