//! scikit-learn-like MLP façade over a remote model service.
//!
//! [`GenericMlp`] (alias [`MlpFromSvm`]) trains on exchange-format files the
//! caller already has; [`MlpFromArray`] exports in-memory matrices to the
//! staging directory first. Both create their service on construction, submit
//! training asynchronously and poll the job until it leaves the running state.

mod call_log;
mod config;
mod from_array;
mod generic;
pub mod poll;
mod request;
pub mod scores;


use std::path::PathBuf;

pub use call_log::{CallKind, CallLog, CallRecord};
pub use config::{DEFAULT_TRAIN_GRACE, FitOptions, RuntimeSettings, ServiceConfig};
pub use from_array::{MlpFromArray, ValidationSplit};
pub use generic::{DEFAULT_TRAIN_JOB, DataPaths, GENERATED_NAME_PREFIX, GenericMlp, MlpFromSvm};
pub use poll::{CancelToken, JobState, PollError, PollSettings, TrainOutcome, TrainProgress};
pub use scores::ScoreError;

pub use crate::dd::wire::{Activation, Connector, SolverType};

use crate::dd::{DdError, ServerLogError};
use crate::svmlight::SvmExportError;

/// Errors surfaced by the façade.
#[derive(Debug, thiserror::Error)]
pub enum MlpError {
    #[error(transparent)]
    Dd(#[from] DdError),
    #[error(transparent)]
    ServerLog(#[from] ServerLogError),
    #[error(transparent)]
    Export(#[from] SvmExportError),
    #[error(transparent)]
    Scores(#[from] ScoreError),
    #[error(transparent)]
    Poll(#[from] PollError),
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("nclasses must be set to weight classes or read class scores")]
    MissingClassCount,
    #[error("class_weights has {got} entries but the service has {expected} classes")]
    ClassWeights { expected: usize, got: usize },
    #[error("No training data given")]
    NoData,
    #[error("{call} failed with status {code}: {msg}")]
    Remote {
        call: &'static str,
        code: u16,
        msg: String,
    },
}
