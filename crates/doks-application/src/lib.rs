//! Application layer for DoksAI.
//!
//! This crate provides the two stateful services of the client: the adaptive
//! API health monitor and the conversation store. Both talk to the remote API
//! only through the ports defined in `doks-core`.

pub mod conversation;
pub mod health_monitor;

pub use conversation::ConversationStore;
pub use health_monitor::HealthMonitor;
