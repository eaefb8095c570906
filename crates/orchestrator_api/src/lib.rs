//! Transport primitives for the multi-agent orchestrator backend.
//!
//! This crate owns the agent channel (a websocket with bounded reconnect) and
//! the HTTP collaborator endpoints (file listing, file reads, approvals, usage).
//! It holds no session state: frames are decoded into
//! [`orchestrator_protocol::InboundEvent`] and handed to whoever owns the
//! receiving end of [`ConnectionManager::connect`].
//!
//! Malformed frames never surface as errors to the consumer. They are logged
//! and dropped at the frame boundary.

pub mod backoff;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod frames;
pub mod url;

pub use backoff::ReconnectPolicy;
pub use client::OrchestratorClient;
pub use config::OrchestratorConfig;
pub use connection::{ConnectionEvent, ConnectionManager, ConnectionState, ConnectionStatus};
pub use error::OrchestratorApiError;
pub use frames::{encode_frame, parse_frame};
pub use reqwest::StatusCode;
pub use crate::url::{endpoint_url, normalize_base_url, websocket_url};
