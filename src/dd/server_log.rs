//! Reader for the line-delimited JSON log the server keeps in a service repository.

use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

/// File the server appends one JSON object per call to.
pub const SERVER_LOG_FILE: &str = "model.json";

#[derive(Debug, thiserror::Error)]
pub enum ServerLogError {
    #[error("Failed to read server log {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("Invalid JSON on line {line} of server log {path}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
}

/// Read `<repository>/model.json`.
///
/// A missing file yields an empty log; servers that do not persist one are
/// still usable. Blank lines are skipped, any other unparsable line fails.
pub fn read_server_log(repository: &Path) -> Result<Vec<Value>, ServerLogError> {
    let path = repository.join(SERVER_LOG_FILE);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!("No server log at {}", path.display());
            return Ok(Vec::new());
        }
        Err(source) => return Err(ServerLogError::Read { path, source }),
    };
    parse_lines(&path, &text)
}

fn parse_lines(path: &Path, text: &str) -> Result<Vec<Value>, ServerLogError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|source| ServerLogError::Parse {
                path: path.to_path_buf(),
                line: idx + 1,
                source,
            })
        })
        .collect()
}
