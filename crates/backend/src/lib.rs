//! Backend submission pipeline.
//!
//! Streams a user's attachment from the chat platform into a multipart
//! request, posts it to the media-processing backend, and interprets the
//! response according to the requested action.

pub mod client;
pub mod error;
pub mod media;

pub use {
    client::{BackendAction, BackendClient, Reply, SubmissionRequest},
    error::SubmissionError,
    media::{MediaLocation, MediaSource, MediaStream, media_extension},
};
