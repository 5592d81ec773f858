//! Per-user conversation state.
//!
//! One [`Session`] exists per [`UserId`](voxrelay_common::UserId) for the
//! lifetime of the process. Records are created lazily and kept in memory
//! only; nothing survives a restart.

pub mod session;
pub mod store;

pub use {
    session::{Action, Session},
    store::{SessionHandle, SessionStore},
};
