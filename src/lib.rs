//! Mediaflow - Automated Azure Media Services Encoding Workflow
//!
//! Uploads a local video into a Media Services asset, encodes it with a
//! fixed H.264/AAC transform, polls the job, exports the output and removes
//! every transient resource it created.

pub mod auth;
pub mod cleanup;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod media;
pub mod naming;
pub mod storage;
pub mod workflow;
