pub mod error;
pub mod events;
pub mod interfaces;
pub mod metrics;
pub mod types;

pub use error::{ControllerError, ExecutionError, GateKind, StreamError, UndoError};
pub use events::{AgentEvent, ChatRequest, Envelope, EventSink, Notice, TurnInput};
pub use interfaces::{AgentTransport, ThreadSearch, ToolDispatcher};
pub use metrics::{Metrics, MetricsSnapshot};
pub use types::*;
