//! Agent interaction controller.
//!
//! Mediates between a token-streaming agent and the operator: gated tool
//! calls, clarification prompts, auto-action batches with undo, and the
//! interaction mode the host should present.

pub mod auto_actions;
pub mod broker;
pub mod clarification;
pub mod config;
pub mod controller;
pub mod gate;
pub mod mode;
pub mod receipts;
pub mod search;
pub mod stream;

pub use auto_actions::AutoActionTracker;
pub use broker::{EventBroker, NoticePublisher};
pub use clarification::{Answered, Cancelled, ClarificationResolver};
pub use config::ControllerConfig;
pub use controller::{AgentController, Dispatched, UndoOutcome};
pub use gate::PendingActionGate;
pub use mode::{ModeDeriver, ModeSignals};
pub use receipts::ReadReceipts;
pub use search::{DebouncedSearch, SearchState};
pub use stream::{DeltaOutcome, MessageStreamManager, StreamHandle, StreamOutcome};
