use std::path::{Path, PathBuf};

use ndarray::Array2;
use serde_json::Value;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use super::call_log::{CallKind, CallLog};
use super::config::{RuntimeSettings, ServiceConfig};
use super::poll::{CancelToken, JobState, PollError, TrainOutcome, TrainProgress, poll_training};
use super::{FitOptions, MlpError, request, scores};
use crate::config::ClientConfig;
use crate::dd::{ClearMode, DdCalls, DdClient, DdResponse};
use crate::timestamp::full_timestamp;

/// Prefix of service names generated when none is configured.
pub const GENERATED_NAME_PREFIX: &str = "ddmlp_MLP_";
/// Job id used when the submission answer does not name one.
pub const DEFAULT_TRAIN_JOB: u64 = 1;
const NOT_FOUND: u16 = 404;

/// One or more data files handed to the server, as the strings it receives.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataPaths(Vec<String>);

impl DataPaths {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

impl From<&str> for DataPaths {
    fn from(path: &str) -> Self {
        Self(vec![path.to_string()])
    }
}

impl From<String> for DataPaths {
    fn from(path: String) -> Self {
        Self(vec![path])
    }
}

impl From<&Path> for DataPaths {
    fn from(path: &Path) -> Self {
        Self(vec![path_string(path)])
    }
}

impl From<PathBuf> for DataPaths {
    fn from(path: PathBuf) -> Self {
        Self(vec![path_string(&path)])
    }
}

impl From<&PathBuf> for DataPaths {
    fn from(path: &PathBuf) -> Self {
        Self(vec![path_string(path)])
    }
}

impl From<Vec<String>> for DataPaths {
    fn from(paths: Vec<String>) -> Self {
        Self(paths)
    }
}

impl From<Vec<PathBuf>> for DataPaths {
    fn from(paths: Vec<PathBuf>) -> Self {
        Self(paths.iter().map(|path| path_string(path)).collect())
    }
}

impl From<&[PathBuf]> for DataPaths {
    fn from(paths: &[PathBuf]) -> Self {
        Self(paths.iter().map(|path| path_string(path)).collect())
    }
}

impl From<&[&str]> for DataPaths {
    fn from(paths: &[&str]) -> Self {
        Self(paths.iter().map(|path| path.to_string()).collect())
    }
}

/// MLP façade over one named remote service, trained on existing data files.
///
/// The service name is a global resource on the server: a second façade built
/// with the same name deletes and re-creates the service. Two processes doing
/// this concurrently race without locking and the last create wins.
pub struct GenericMlp<C: DdCalls = DdClient> {
    calls: C,
    service: ServiceConfig,
    name: String,
    description: String,
    repository: PathBuf,
    data_dir: PathBuf,
    settings: RuntimeSettings,
    answers: CallLog,
    server_log: Vec<Value>,
    n_fit: usize,
    cancel: CancelToken,
    // Removes exported data files on drop; the model repository outlives the
    // façade because the service stays registered on the server.
    _staging: TempDir,
}

/// File-based façade; the caller already has exchange-format files.
pub type MlpFromSvm<C = DdClient> = GenericMlp<C>;

impl GenericMlp<DdClient> {
    /// Build an HTTP client from `config` and create the service.
    pub fn connect(config: &ClientConfig, service: ServiceConfig) -> Result<Self, MlpError> {
        let calls = config.dd_client()?;
        Self::new(calls, service, config.runtime_settings())
    }
}

impl<C: DdCalls> GenericMlp<C> {
    /// Create (or re-create) the remote service described by `service`.
    pub fn new(
        calls: C,
        mut service: ServiceConfig,
        settings: RuntimeSettings,
    ) -> Result<Self, MlpError> {
        let requested = service
            .name
            .clone()
            .filter(|name| !name.trim().is_empty());
        let (name, description) = match requested {
            Some(name) => {
                remove_service(&calls, &name)?;
                let description = service.description.clone();
                (name, description)
            }
            None => {
                let name = format!("{GENERATED_NAME_PREFIX}{}", full_timestamp());
                (name.clone(), name)
            }
        };

        let (repository, staging) = match service.repository.clone() {
            Some(repository) => {
                create_dir(&repository)?;
                (repository, staging_dir(None)?)
            }
            None => {
                let root = tempfile::Builder::new()
                    .prefix("ddmlp_")
                    .tempdir()
                    .map_err(|source| MlpError::CreateDir {
                        path: std::env::temp_dir(),
                        source,
                    })?
                    .keep();
                let repository = root.join("model");
                create_dir(&repository)?;
                (repository, staging_dir(Some(&root))?)
            }
        };
        let data_dir = staging.path().to_path_buf();
        service.name = Some(name.clone());
        service.repository = Some(repository.clone());

        let mut mlp = Self {
            calls,
            service,
            name,
            description,
            repository,
            data_dir,
            settings,
            answers: CallLog::default(),
            server_log: Vec::new(),
            n_fit: 0,
            cancel: CancelToken::new(),
            _staging: staging,
        };
        mlp.create_service()?;
        mlp.refresh_server_log()?;
        Ok(mlp)
    }

    /// Train on `data` and block until the server reports the job done.
    pub fn fit(
        &mut self,
        data: impl Into<DataPaths>,
        options: &FitOptions,
    ) -> Result<TrainOutcome, MlpError> {
        self.fit_with_progress(data, options, None)
    }

    /// [`Self::fit`], reporting every running status to `progress`.
    ///
    /// Every call after the first re-creates the service without its
    /// architecture template, which the server only accepts once.
    pub fn fit_with_progress(
        &mut self,
        data: impl Into<DataPaths>,
        options: &FitOptions,
        progress: Option<&mut dyn FnMut(&TrainProgress<'_>)>,
    ) -> Result<TrainOutcome, MlpError> {
        let data = data.into();
        if data.is_empty() {
            return Err(MlpError::NoData);
        }
        let request = request::train_request(&self.name, &self.service, &data, options)?;

        if self.n_fit > 0 {
            remove_service(&self.calls, &self.name)?;
            self.service.template = None;
            self.create_service()?;
        }

        info!("Submitting training of {} on {} file(s)", self.name, data.len());
        debug!("train payload: {request:?}");
        let response = self.calls.post_train(&request)?;
        ensure_ok("post_train", &response)?;
        let job = response.job().unwrap_or(DEFAULT_TRAIN_JOB);
        self.answers.push(CallKind::Train, &response);

        if !self.settings.train_grace.is_zero() {
            std::thread::sleep(self.settings.train_grace);
        }
        self.refresh_server_log()?;
        self.n_fit += 1;

        let outcome = poll_training(
            &self.calls,
            &self.name,
            job,
            &self.settings.poll,
            &self.cancel,
            progress,
        )
        .map_err(|err| match err {
            PollError::Remote { code, msg } => MlpError::Remote {
                call: "get_train",
                code,
                msg,
            },
            other => MlpError::Poll(other),
        })?;
        if outcome.state != JobState::Finished {
            warn!(
                "Training of {} ended in state {:?}: {}",
                self.name,
                outcome.state,
                outcome.response.message()
            );
        }
        Ok(outcome)
    }

    /// Class probabilities for every example in the file at `path`.
    pub fn predict_proba(&mut self, path: impl AsRef<Path>) -> Result<Array2<f64>, MlpError> {
        let nclasses = self.service.nclasses.ok_or(MlpError::MissingClassCount)?;
        let request = request::predict_request(
            &self.name,
            &self.service,
            nclasses,
            path_string(path.as_ref()),
        );
        debug!("predict payload: {request:?}");
        let response = self.calls.post_predict(&request)?;
        ensure_ok("post_predict", &response)?;
        self.answers.push(CallKind::Predict, &response);
        self.refresh_server_log()?;
        Ok(scores::to_array(response.raw(), nclasses)?)
    }

    /// Most probable class per example, as an `[n, 1]` column.
    pub fn predict(&mut self, path: impl AsRef<Path>) -> Result<Array2<usize>, MlpError> {
        let proba = self.predict_proba(path)?;
        Ok(scores::argmax_column(&proba))
    }

    pub fn service_name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn service_config(&self) -> &ServiceConfig {
        &self.service
    }

    pub fn call_log(&self) -> &CallLog {
        &self.answers
    }

    /// Last snapshot of the server-written `model.json` log.
    pub fn server_log(&self) -> &[Value] {
        &self.server_log
    }

    pub fn fit_count(&self) -> usize {
        self.n_fit
    }

    /// Staging directory for exported exchange-format files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn repository(&self) -> &Path {
        &self.repository
    }

    /// Token that stops a blocking [`Self::fit`] from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn calls(&self) -> &C {
        &self.calls
    }

    fn create_service(&mut self) -> Result<(), MlpError> {
        let request = request::service_request(&self.service, &self.description, &self.repository);
        debug!("create_service payload: {request:?}");
        let response = self.calls.create_service(&self.name, &request)?;
        ensure_ok("create_service", &response)?;
        info!("Created service {} ({})", self.name, self.service.mllib);
        self.answers.push(CallKind::CreateService, &response);
        Ok(())
    }

    fn refresh_server_log(&mut self) -> Result<(), MlpError> {
        self.server_log = self.calls.server_log(&self.repository)?;
        debug!("Server log has {} line(s)", self.server_log.len());
        Ok(())
    }
}

fn create_dir(path: &Path) -> Result<(), MlpError> {
    std::fs::create_dir_all(path).map_err(|source| MlpError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Staging directory for exports, inside `parent` or the system temp dir.
fn staging_dir(parent: Option<&Path>) -> Result<TempDir, MlpError> {
    let mut builder = tempfile::Builder::new();
    let result = match parent {
        Some(parent) => builder.prefix("data_").tempdir_in(parent),
        None => builder.prefix("ddmlp_data_").tempdir(),
    };
    result.map_err(|source| MlpError::CreateDir {
        path: parent.map_or_else(std::env::temp_dir, Path::to_path_buf),
        source,
    })
}

/// Delete `name` on the server; an unknown service is not an error.
fn remove_service<C: DdCalls + ?Sized>(calls: &C, name: &str) -> Result<(), MlpError> {
    let response = calls.delete_service(name, ClearMode::Mem)?;
    if response.code() == NOT_FOUND {
        debug!("Service {name} did not exist; nothing to delete");
        return Ok(());
    }
    ensure_ok("delete_service", &response)?;
    info!("Deleted service {name}");
    Ok(())
}

fn ensure_ok(call: &'static str, response: &DdResponse) -> Result<(), MlpError> {
    if response.is_error() {
        return Err(MlpError::Remote {
            call,
            code: response.code(),
            msg: response.message().to_string(),
        });
    }
    Ok(())
}
