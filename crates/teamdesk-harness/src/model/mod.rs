//! Reference model for model-based testing.
//!
//! Operations are applied to both the model and the real engine, and their
//! observable states are compared.

mod inbox;
mod operation;

pub use inbox::{ModelInbox, ModelMessage, ObservableInbox, PushEffect};
pub use operation::{Author, MODEL_CONVERSATIONS, ModelConversation, Operation, conversation_ref};
