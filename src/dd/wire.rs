//! JSON bodies exchanged with the model server.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::DdError;

/// Input connector declared when the service is created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Connector {
    #[default]
    Svm,
    Csv,
    Txt,
}

/// Hidden-layer activation of the MLP template.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Prelu,
    Elu,
    Sigmoid,
    Tanh,
}

/// Optimizer used by the backend solver.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SolverType {
    #[default]
    Sgd,
    Adagrad,
    Nesterov,
    Rmsprop,
    Adadelta,
    Adam,
}

/// `{input, mllib, output}` parameter bundle shared by every call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Parameters<I, M, O> {
    pub input: I,
    pub mllib: M,
    pub output: O,
}

/// Body of `PUT /services/{name}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CreateServiceRequest {
    pub description: String,
    pub mllib: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub parameters: Parameters<ServiceInput, ServiceMllib, Map<String, Value>>,
    pub model: ServiceModel,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceInput {
    pub connector: Connector,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceMllib {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nclasses: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ntargets: Option<usize>,
    pub gpu: bool,
    pub gpuid: i32,
    /// Only valid on the first creation of a service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    pub layers: Vec<usize>,
    pub activation: Activation,
    pub dropout: f64,
    pub regression: bool,
    pub finetuning: bool,
    pub db: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceModel {
    pub templates: String,
    pub repository: String,
}

/// Body of `POST /train`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrainRequest {
    pub service: String,
    #[serde(rename = "async")]
    pub asynchronous: bool,
    pub parameters: Parameters<TrainInput, TrainMllib, TrainOutput>,
    pub data: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrainInput {
    /// Required for svm data; the backend crashes without it.
    pub db: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrainMllib {
    pub gpu: bool,
    pub solver: Solver,
    pub net: Net,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub class_weights: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Solver {
    pub iterations: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test_interval: Option<u32>,
    pub base_lr: f64,
    pub solver_type: SolverType,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Net {
    pub batch_size: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TrainOutput {
    pub measure: Vec<String>,
}

/// Body of `POST /predict`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictRequest {
    pub service: String,
    pub parameters: Parameters<Map<String, Value>, PredictMllib, PredictOutput>,
    pub data: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictMllib {
    pub gpu: bool,
    pub gpuid: i32,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PredictOutput {
    /// Number of top classes returned per example.
    pub best: usize,
}

/// `status` block of every answer.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Status {
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub dd_code: Option<i64>,
    #[serde(default)]
    pub dd_msg: Option<String>,
}

/// `head` block of train/predict answers.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Head {
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub job: Option<u64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub time: Option<f64>,
    #[serde(default)]
    pub service: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
struct Envelope {
    #[serde(default)]
    status: Status,
    #[serde(default)]
    head: Head,
}

/// A raw server answer together with its parsed status envelope.
#[derive(Clone, Debug, PartialEq)]
pub struct DdResponse {
    raw: Value,
    status: Status,
    head: Head,
}

impl DdResponse {
    /// Parse a response body.
    pub fn parse(body: &str) -> Result<Self, DdError> {
        let trimmed = body.trim();
        if trimmed.is_empty() {
            return Err(DdError::Json("Empty response body".to_string()));
        }
        let raw: Value = serde_json::from_str(trimmed)
            .map_err(|err| DdError::Json(format!("{err}: {trimmed}")))?;
        Self::from_value(raw)
    }

    /// Wrap an already decoded answer.
    pub fn from_value(raw: Value) -> Result<Self, DdError> {
        if !raw.is_object() {
            return Err(DdError::Json(format!("Expected a JSON object, got {raw}")));
        }
        let envelope: Envelope =
            serde_json::from_value(raw.clone()).map_err(|err| DdError::Json(err.to_string()))?;
        Ok(Self {
            raw,
            status: envelope.status,
            head: envelope.head,
        })
    }

    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn head(&self) -> &Head {
        &self.head
    }

    pub fn code(&self) -> u16 {
        self.status.code
    }

    pub fn is_error(&self) -> bool {
        self.status.code >= 400
    }

    /// Most specific message the server gave.
    pub fn message(&self) -> &str {
        self.status
            .dd_msg
            .as_deref()
            .filter(|msg| !msg.is_empty())
            .unwrap_or(&self.status.msg)
    }

    /// `head.status` of a training job, e.g. `"running"`.
    pub fn job_status(&self) -> Option<&str> {
        self.head.status.as_deref()
    }

    pub fn job(&self) -> Option<u64> {
        self.head.job
    }

    pub fn body(&self) -> Option<&Value> {
        self.raw.get("body")
    }

    /// `body.measure` of a training status answer.
    pub fn measure(&self) -> Option<&Map<String, Value>> {
        self.body()?.get("measure")?.as_object()
    }
}
