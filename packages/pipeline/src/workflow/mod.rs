// ABOUTME: The role-gated transition engine
// ABOUTME: Single authority over request status changes and their side effects

pub mod engine;
pub mod events;
pub mod locks;
pub mod transitions;

pub use engine::{TransitionEngine, TransitionParams};
pub use events::TransitionEvent;
pub use transitions::{legacy_lead_status, TransitionOp};
