//! Client-side engine for a remote object store: fragmented resumable
//! uploads, long-running operation monitoring, and multipart batching.

pub mod batch;
pub mod classifier;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod humanize;
pub mod models;
pub mod monitor;
pub mod upload;

pub use client::Client;
pub use error::{Error, Result};
