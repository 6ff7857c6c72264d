pub mod tool_policy;
pub mod trust;

pub use tool_policy::{normalize_tool, PolicyError, ToolDecision, ToolPolicy};
pub use trust::SessionTrust;
