// ABOUTME: Notification subsystem: durable rows plus best-effort live push
// ABOUTME: Consumes transition events from the pipeline engine

pub mod api;
pub mod dispatcher;
pub mod registry;
pub mod storage;
pub mod types;

pub use api::NotifyState;
pub use dispatcher::Dispatcher;
pub use registry::{ConnectionGuard, ConnectionRegistry};
pub use storage::NotificationStorage;
pub use types::{MentionEvent, Notification, NotificationKind};
