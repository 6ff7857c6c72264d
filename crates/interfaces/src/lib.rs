pub mod terminal;
pub mod traits;

pub use terminal::TerminalInterface;
pub use traits::{parse_clarification_reply, ApprovalChoice, Interface};
