//! Client façade for a DeepDetect-style model server.
//!
//! The crate exposes a scikit-learn-like MLP object ([`mlp::GenericMlp`],
//! [`mlp::MlpFromArray`]) that creates a remote service, submits training jobs,
//! polls them and requests predictions over the server's REST API.

/// Application directory resolution for config and logs.
pub mod app_dirs;
/// TOML client configuration.
pub mod config;
/// Transport layer for the model server's REST API.
pub mod dd;
/// Shared HTTP agent and bounded response helpers.
pub mod http_client;
/// Global tracing setup.
pub mod logging;
/// MLP façade over the remote service.
pub mod mlp;
/// Sparse line-based exchange format writer.
pub mod svmlight;
/// Timestamp helpers for generated names.
pub mod timestamp;
