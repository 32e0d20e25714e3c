//! Collaborators the controller talks to

use super::events::{Notice, OutboundMessage};

/// The page hosting the controller
pub trait EnvironmentContext: Send {
    /// Address currently shown, if known
    fn current_address(&self) -> Option<String>;

    /// Deliver a message to same-origin listeners
    fn broadcast(&self, message: OutboundMessage);

    /// Show a transient status notice
    fn notify(&self, notice: Notice);
}

/// The chat session that receives evaluation outcomes
pub trait ChatSessionHandle: Send {
    fn mark_started(&self);

    fn show_chat(&self);
}
