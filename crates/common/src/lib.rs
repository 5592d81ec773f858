//! Shared identifiers and error helpers used across all voxrelay crates.

pub mod error;
pub mod types;

pub use {
    error::FromMessage,
    types::{MediaRef, UserId},
};
