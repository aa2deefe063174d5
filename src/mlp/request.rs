//! Assembly of request bodies from the façade configuration.

use std::path::Path;

use serde_json::Map;

use super::MlpError;
use super::config::{FitOptions, ServiceConfig};
use super::generic::DataPaths;
use crate::dd::wire::{
    CreateServiceRequest, Net, Parameters, PredictMllib, PredictOutput, PredictRequest,
    ServiceInput, ServiceMllib, ServiceModel, Solver, TrainInput, TrainMllib, TrainOutput,
    TrainRequest,
};

const SERVICE_KIND: &str = "supervised";

pub(crate) fn service_request(
    service: &ServiceConfig,
    description: &str,
    repository: &Path,
) -> CreateServiceRequest {
    CreateServiceRequest {
        description: description.to_string(),
        mllib: service.mllib.clone(),
        kind: SERVICE_KIND.to_string(),
        parameters: Parameters {
            input: ServiceInput {
                connector: service.connector,
            },
            mllib: ServiceMllib {
                nclasses: service.nclasses,
                ntargets: service.ntargets,
                gpu: service.gpu,
                gpuid: service.gpuid,
                template: service.template.clone(),
                layers: service.layers.clone(),
                activation: service.activation,
                dropout: service.dropout,
                regression: service.regression,
                finetuning: service.finetuning,
                db: service.db,
            },
            output: Map::new(),
        },
        model: ServiceModel {
            templates: service.templates.clone(),
            repository: repository.to_string_lossy().into_owned(),
        },
    }
}

pub(crate) fn train_request(
    name: &str,
    service: &ServiceConfig,
    data: &DataPaths,
    options: &FitOptions,
) -> Result<TrainRequest, MlpError> {
    Ok(TrainRequest {
        service: name.to_string(),
        asynchronous: true,
        parameters: Parameters {
            input: TrainInput { db: true },
            mllib: TrainMllib {
                gpu: service.gpu,
                solver: Solver {
                    iterations: options.iterations,
                    test_interval: options.test_interval,
                    base_lr: options.base_lr,
                    solver_type: options.solver_type,
                },
                net: Net {
                    batch_size: options.batch_size,
                },
                class_weights: class_weights(service, options)?,
            },
            output: TrainOutput {
                measure: options.metrics.clone(),
            },
        },
        data: data.as_slice().to_vec(),
    })
}

pub(crate) fn predict_request(
    name: &str,
    service: &ServiceConfig,
    nclasses: usize,
    data: String,
) -> PredictRequest {
    PredictRequest {
        service: name.to_string(),
        parameters: Parameters {
            input: Map::new(),
            mllib: PredictMllib {
                gpu: service.gpu,
                gpuid: service.gpuid,
            },
            output: PredictOutput { best: nclasses },
        },
        data: vec![data],
    }
}

/// Explicit weights must cover every class; otherwise each class weighs `1.0`.
///
/// Regression services without a class count send no weights at all.
fn class_weights(service: &ServiceConfig, options: &FitOptions) -> Result<Vec<f64>, MlpError> {
    match (&options.class_weights, service.nclasses) {
        (Some(weights), Some(expected)) if weights.len() != expected => {
            Err(MlpError::ClassWeights {
                expected,
                got: weights.len(),
            })
        }
        (Some(weights), _) => Ok(weights.clone()),
        (None, Some(nclasses)) => Ok(vec![1.0; nclasses]),
        (None, None) if service.regression => Ok(Vec::new()),
        (None, None) => Err(MlpError::MissingClassCount),
    }
}
