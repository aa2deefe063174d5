use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;
use std::time::Duration;

use serde_json::{Value, json};

use crate::dd::{
    ClearMode, CreateServiceRequest, DdCalls, DdError, DdResponse, PredictRequest,
    ServerLogError, TrainRequest,
};
use crate::mlp::{PollSettings, RuntimeSettings};

/// One call observed by [`ScriptedCalls`].
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Recorded {
    Create { name: String, body: Value },
    Delete { name: String, clear: ClearMode },
    Train { body: Value },
    Status { service: String, job: u64, timeout: u64 },
    Predict { body: Value },
}

impl Recorded {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Delete { .. } => "delete",
            Self::Train { .. } => "train",
            Self::Status { .. } => "status",
            Self::Predict { .. } => "predict",
        }
    }
}

/// In-memory server double with scripted answers.
///
/// Status requests pop queued answers and report `finished` once the queue
/// is empty.
pub(crate) struct ScriptedCalls {
    recorded: RefCell<Vec<Recorded>>,
    delete_code: Cell<u16>,
    statuses: RefCell<VecDeque<Value>>,
    predictions: RefCell<VecDeque<Value>>,
    server_log: RefCell<Vec<Value>>,
}

impl ScriptedCalls {
    pub(crate) fn new() -> Self {
        Self {
            recorded: RefCell::new(Vec::new()),
            delete_code: Cell::new(200),
            statuses: RefCell::new(VecDeque::new()),
            predictions: RefCell::new(VecDeque::new()),
            server_log: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn with_delete_code(self, code: u16) -> Self {
        self.delete_code.set(code);
        self
    }

    pub(crate) fn push_status(&self, status: &str, measure: Value) {
        self.statuses.borrow_mut().push_back(json!({
            "status": {"code": 200, "msg": "OK"},
            "head": {"method": "/train", "job": 1, "status": status},
            "body": {"measure": measure}
        }));
    }

    /// Queue a status answer exactly as given.
    pub(crate) fn push_raw_status(&self, answer: Value) {
        self.statuses.borrow_mut().push_back(answer);
    }

    /// Queue a prediction answer with one `{cat, prob}` list per example.
    pub(crate) fn push_prediction(&self, rows: &[&[f64]]) {
        let predictions: Vec<Value> = rows
            .iter()
            .enumerate()
            .map(|(uri, probs)| {
                let classes: Vec<Value> = probs
                    .iter()
                    .enumerate()
                    .map(|(cat, prob)| json!({"cat": cat.to_string(), "prob": prob}))
                    .collect();
                json!({"uri": uri.to_string(), "classes": classes})
            })
            .collect();
        self.predictions.borrow_mut().push_back(json!({
            "status": {"code": 200, "msg": "OK"},
            "head": {"method": "/predict", "service": "svc"},
            "body": {"predictions": predictions}
        }));
    }

    pub(crate) fn set_server_log(&self, lines: Vec<Value>) {
        *self.server_log.borrow_mut() = lines;
    }

    pub(crate) fn recorded(&self) -> Vec<Recorded> {
        self.recorded.borrow().clone()
    }

    pub(crate) fn kinds(&self) -> Vec<&'static str> {
        self.recorded.borrow().iter().map(Recorded::kind).collect()
    }

    pub(crate) fn clear_recorded(&self) {
        self.recorded.borrow_mut().clear();
    }

    fn record(&self, call: Recorded) {
        self.recorded.borrow_mut().push(call);
    }
}

fn answer(value: Value) -> Result<DdResponse, DdError> {
    DdResponse::from_value(value)
}

impl DdCalls for ScriptedCalls {
    fn create_service(
        &self,
        name: &str,
        request: &CreateServiceRequest,
    ) -> Result<DdResponse, DdError> {
        self.record(Recorded::Create {
            name: name.to_string(),
            body: serde_json::to_value(request).map_err(|err| DdError::Json(err.to_string()))?,
        });
        answer(json!({"status": {"code": 201, "msg": "Created"}}))
    }

    fn delete_service(&self, name: &str, clear: ClearMode) -> Result<DdResponse, DdError> {
        self.record(Recorded::Delete {
            name: name.to_string(),
            clear,
        });
        let code = self.delete_code.get();
        if code >= 400 {
            return answer(json!({
                "status": {"code": code, "msg": "Error", "dd_code": 1002, "dd_msg": "Service Not Found"}
            }));
        }
        answer(json!({"status": {"code": code, "msg": "OK"}}))
    }

    fn post_train(&self, request: &TrainRequest) -> Result<DdResponse, DdError> {
        self.record(Recorded::Train {
            body: serde_json::to_value(request).map_err(|err| DdError::Json(err.to_string()))?,
        });
        answer(json!({
            "status": {"code": 201, "msg": "Created"},
            "head": {"method": "/train", "job": 1, "time": 0}
        }))
    }

    fn get_train(
        &self,
        service: &str,
        job: u64,
        timeout_secs: u64,
    ) -> Result<DdResponse, DdError> {
        self.record(Recorded::Status {
            service: service.to_string(),
            job,
            timeout: timeout_secs,
        });
        let next = self.statuses.borrow_mut().pop_front();
        answer(next.unwrap_or_else(|| {
            json!({
                "status": {"code": 200, "msg": "OK"},
                "head": {"method": "/train", "job": job, "status": "finished"},
                "body": {"measure": {}}
            })
        }))
    }

    fn post_predict(&self, request: &PredictRequest) -> Result<DdResponse, DdError> {
        self.record(Recorded::Predict {
            body: serde_json::to_value(request).map_err(|err| DdError::Json(err.to_string()))?,
        });
        let next = self.predictions.borrow_mut().pop_front();
        answer(next.unwrap_or_else(|| {
            json!({"status": {"code": 200, "msg": "OK"}, "body": {"predictions": []}})
        }))
    }

    fn server_log(&self, _repository: &Path) -> Result<Vec<Value>, ServerLogError> {
        Ok(self.server_log.borrow().clone())
    }
}

/// Settings without sleeps so tests run instantly.
pub(crate) fn instant_settings() -> RuntimeSettings {
    RuntimeSettings {
        poll: PollSettings {
            interval: Duration::ZERO,
            ..PollSettings::default()
        },
        train_grace: Duration::ZERO,
    }
}
