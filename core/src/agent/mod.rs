pub mod context;
pub mod events;
pub mod loop_;
pub mod registry;

pub use context::ContextBuilder;
pub use events::{AgentEvent, LoopState, NoopObserver, StreamAccumulator, TurnObserver};
pub use loop_::{AgentLoop, TurnOutput};
pub use registry::{Dispatch, ToolRegistry};
