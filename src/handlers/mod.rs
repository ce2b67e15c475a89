//! HTTP request handlers
//!
//! - `api` - Health check endpoint
//! - `transcribe` - Chunked media transcription

pub mod api;
pub mod transcribe;

pub use transcribe::{transcribe_get, transcribe_post};
