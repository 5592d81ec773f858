//! Conversation layer: inbound events, the per-user state machine, and the
//! engine that turns transitions into outbound messages and supervised
//! backend submissions.

pub mod engine;
pub mod event;
pub mod language;
pub mod machine;
pub mod outbound;
pub mod supervisor;

pub use {
    engine::Engine,
    event::{Command, EventKind, InboundEvent},
    machine::{Effect, transition},
    outbound::{ChatOutbound, SelectionOption},
    supervisor::{Supervisor, SupervisorHandle, TaskOutcome},
};
