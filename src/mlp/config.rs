use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use super::poll::PollSettings;
use crate::dd::wire::{Activation, Connector, SolverType};

/// Grace period between submitting a training job and the first status poll.
pub const DEFAULT_TRAIN_GRACE: Duration = Duration::from_secs(1);

/// Remote service definition sent on creation.
///
/// Every option the backend understands for the MLP template is listed here
/// with its default.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service name; a timestamped one is generated when `None`.
    pub name: Option<String>,
    /// Backend library identifier.
    pub mllib: String,
    pub description: String,
    /// Model repository; a temporary `model/` directory when `None`.
    pub repository: Option<PathBuf>,
    pub templates: String,
    pub connector: Connector,
    pub nclasses: Option<usize>,
    pub ntargets: Option<usize>,
    pub gpu: bool,
    pub gpuid: i32,
    /// Architecture template; dropped after the first fit.
    pub template: Option<String>,
    pub layers: Vec<usize>,
    pub activation: Activation,
    pub dropout: f64,
    pub regression: bool,
    pub finetuning: bool,
    pub db: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: None,
            mllib: "caffe".to_string(),
            description: String::new(),
            repository: None,
            templates: "../templates/caffe".to_string(),
            connector: Connector::Svm,
            nclasses: None,
            ntargets: None,
            gpu: false,
            gpuid: 0,
            template: Some("mlp".to_string()),
            layers: vec![50],
            activation: Activation::Relu,
            dropout: 0.5,
            regression: false,
            finetuning: false,
            db: true,
        }
    }
}

/// Solver and output options of a single `fit` call.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct FitOptions {
    pub iterations: u32,
    pub test_interval: Option<u32>,
    pub base_lr: f64,
    pub solver_type: SolverType,
    pub batch_size: u32,
    /// Measures the server reports while training.
    pub metrics: Vec<String>,
    /// Per-class weights; uniform `1.0` per class when `None`.
    pub class_weights: Option<Vec<f64>>,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            iterations: 100,
            test_interval: None,
            base_lr: 0.1,
            solver_type: SolverType::Sgd,
            batch_size: 128,
            metrics: vec!["mcll".to_string(), "accp".to_string()],
            class_weights: None,
        }
    }
}

/// Client-side timing of the façade.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RuntimeSettings {
    pub poll: PollSettings,
    pub train_grace: Duration,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            poll: PollSettings::default(),
            train_grace: DEFAULT_TRAIN_GRACE,
        }
    }
}
