//! Bounded, cancellable polling of a server-side training job.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::info;

use crate::dd::{DdCalls, DdError, DdResponse};

/// Slice used when sleeping so cancellation is noticed promptly.
const CANCEL_CHECK_SLICE: Duration = Duration::from_millis(50);

/// How status polling is paced and bounded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PollSettings {
    /// Long-poll timeout the server waits before answering a status request.
    pub server_timeout: Duration,
    /// Extra client-side pause between status requests.
    pub interval: Duration,
    /// Give up after this many status requests; `None` polls until the job ends.
    pub max_attempts: Option<usize>,
    /// Give up once this much time has passed since polling started.
    pub deadline: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            server_timeout: Duration::from_secs(2),
            interval: Duration::ZERO,
            max_attempts: Some(10_000),
            deadline: None,
        }
    }
}

impl PollSettings {
    fn server_timeout_secs(&self) -> u64 {
        self.server_timeout.as_secs().max(1)
    }
}

/// Shared flag that stops a blocking poll from another thread.
///
/// Once cancelled, a token stays cancelled.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// `head.status` of a training job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobState {
    Running,
    Finished,
    Error,
    Other(String),
    /// The answer carried no job status (e.g. an error envelope).
    Unknown,
}

impl JobState {
    pub fn from_status(status: Option<&str>) -> Self {
        match status.map(str::trim) {
            Some("running") => Self::Running,
            Some("finished") => Self::Finished,
            Some("error") => Self::Error,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Unknown,
        }
    }
}

/// Snapshot handed to progress callbacks while a job runs.
#[derive(Clone, Copy, Debug)]
pub struct TrainProgress<'a> {
    /// 1-based index of the status request that produced this snapshot.
    pub attempt: usize,
    pub measure: Option<&'a Map<String, Value>>,
}

/// Final answer of a training job.
#[derive(Clone, Debug)]
pub struct TrainOutcome {
    pub state: JobState,
    pub response: DdResponse,
    /// Number of status requests made, including the final one.
    pub polls: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("Polling cancelled after {attempts} status request(s)")]
    Cancelled { attempts: usize },
    #[error("Training still running after {elapsed:?} ({attempts} status request(s))")]
    DeadlineExceeded { attempts: usize, elapsed: Duration },
    #[error("Training still running after {attempts} status request(s)")]
    AttemptsExhausted { attempts: usize },
    /// The status request itself was answered with an error envelope.
    #[error("Status request failed with {code}: {msg}")]
    Remote { code: u16, msg: String },
    /// A successful status answer without `head.status`.
    #[error("Status answer has no job status: {raw}")]
    MissingJobStatus { raw: String },
    #[error(transparent)]
    Dd(#[from] DdError),
}

/// Poll `job` of `service` until it leaves the running state.
pub fn poll_training<C: DdCalls + ?Sized>(
    calls: &C,
    service: &str,
    job: u64,
    settings: &PollSettings,
    cancel: &CancelToken,
    mut progress: Option<&mut dyn FnMut(&TrainProgress<'_>)>,
) -> Result<TrainOutcome, PollError> {
    let started = Instant::now();
    let timeout_secs = settings.server_timeout_secs();
    let mut attempts = 0usize;
    loop {
        if cancel.is_cancelled() {
            return Err(PollError::Cancelled { attempts });
        }
        if let Some(deadline) = settings.deadline {
            let elapsed = started.elapsed();
            if elapsed >= deadline {
                return Err(PollError::DeadlineExceeded { attempts, elapsed });
            }
        }
        if settings.max_attempts.is_some_and(|max| attempts >= max) {
            return Err(PollError::AttemptsExhausted { attempts });
        }

        attempts += 1;
        let response = calls.get_train(service, job, timeout_secs)?;
        if response.is_error() {
            return Err(PollError::Remote {
                code: response.code(),
                msg: response.message().to_string(),
            });
        }
        let state = JobState::from_status(response.job_status());
        if state == JobState::Unknown {
            return Err(PollError::MissingJobStatus {
                raw: response.raw().to_string(),
            });
        }
        if state != JobState::Running {
            info!(
                "Training job {job} of {service} ended ({state:?}) after {attempts} poll(s): {}",
                response.raw()
            );
            return Ok(TrainOutcome {
                state,
                response,
                polls: attempts,
            });
        }

        let measure = response.measure();
        info!("{service} job {job}: {}", format_measure(measure));
        if let Some(progress) = progress.as_mut() {
            progress(&TrainProgress {
                attempt: attempts,
                measure,
            });
        }
        sleep_unless_cancelled(settings.interval, cancel);
    }
}

fn format_measure(measure: Option<&Map<String, Value>>) -> String {
    match measure {
        Some(measure) if !measure.is_empty() => measure
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join(" "),
        _ => "running".to_string(),
    }
}

fn sleep_unless_cancelled(total: Duration, cancel: &CancelToken) {
    let mut remaining = total;
    while !remaining.is_zero() && !cancel.is_cancelled() {
        let step = remaining.min(CANCEL_CHECK_SLICE);
        std::thread::sleep(step);
        remaining -= step;
    }
}
