//! Transport layer for a DeepDetect-style model server.
//!
//! [`DdCalls`] is the seam the MLP façade talks through; [`DdClient`] is the
//! HTTP implementation. The wire format itself is owned by the server, so the
//! request types here only mirror what the façade sends.

mod client;
mod server_log;
pub mod wire;

use std::path::Path;

use serde_json::Value;

pub use client::DdClient;
pub use server_log::{SERVER_LOG_FILE, ServerLogError, read_server_log};
pub use wire::{CreateServiceRequest, DdResponse, PredictRequest, TrainRequest};

/// Errors raised by the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum DdError {
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
    #[error("HTTP error: {0}")]
    Transport(String),
    /// Non-2xx answer whose body is not a status envelope.
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },
    #[error("JSON error: {0}")]
    Json(String),
    #[error("Failed to read response body: {0}")]
    Io(#[from] std::io::Error),
}

/// How much of a service the server should drop on delete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClearMode {
    /// Drop the in-memory service only; repository files stay.
    #[default]
    Mem,
    /// Also remove the model files from the repository.
    Lib,
    /// Remove the whole repository.
    Full,
}

impl ClearMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mem => "mem",
            Self::Lib => "lib",
            Self::Full => "full",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mem" => Some(Self::Mem),
            "lib" => Some(Self::Lib),
            "full" => Some(Self::Full),
            _ => None,
        }
    }
}

/// REST calls against the model server.
///
/// Implementations return the server's status envelope even when it reports an
/// error code; only transport-level failures become `Err`.
pub trait DdCalls {
    /// `PUT /services/{name}`.
    fn create_service(
        &self,
        name: &str,
        request: &CreateServiceRequest,
    ) -> Result<DdResponse, DdError>;

    /// `DELETE /services/{name}?clear=..`.
    fn delete_service(&self, name: &str, clear: ClearMode) -> Result<DdResponse, DdError>;

    /// `POST /train`.
    fn post_train(&self, request: &TrainRequest) -> Result<DdResponse, DdError>;

    /// `GET /train?service=..&job=..&timeout=..`.
    fn get_train(&self, service: &str, job: u64, timeout_secs: u64)
    -> Result<DdResponse, DdError>;

    /// `POST /predict`.
    fn post_predict(&self, request: &PredictRequest) -> Result<DdResponse, DdError>;

    /// Lines the server appended to `<repository>/model.json`.
    fn server_log(&self, repository: &Path) -> Result<Vec<Value>, ServerLogError> {
        read_server_log(repository)
    }
}

impl<T: DdCalls + ?Sized> DdCalls for &T {
    fn create_service(
        &self,
        name: &str,
        request: &CreateServiceRequest,
    ) -> Result<DdResponse, DdError> {
        (**self).create_service(name, request)
    }

    fn delete_service(&self, name: &str, clear: ClearMode) -> Result<DdResponse, DdError> {
        (**self).delete_service(name, clear)
    }

    fn post_train(&self, request: &TrainRequest) -> Result<DdResponse, DdError> {
        (**self).post_train(request)
    }

    fn get_train(
        &self,
        service: &str,
        job: u64,
        timeout_secs: u64,
    ) -> Result<DdResponse, DdError> {
        (**self).get_train(service, job, timeout_secs)
    }

    fn post_predict(&self, request: &PredictRequest) -> Result<DdResponse, DdError> {
        (**self).post_predict(request)
    }

    fn server_log(&self, repository: &Path) -> Result<Vec<Value>, ServerLogError> {
        (**self).server_log(repository)
    }
}
