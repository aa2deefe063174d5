use serde::Serialize;
use tracing::debug;
use url::Url;

use super::{ClearMode, CreateServiceRequest, DdCalls, DdError, DdResponse, PredictRequest, TrainRequest};
use crate::http_client::{self, HttpTimeouts};

/// Prediction answers grow with the number of examples; keep the cap generous.
const MAX_RESPONSE_BYTES: usize = 64 * 1024 * 1024;

/// HTTP implementation of [`DdCalls`].
#[derive(Clone, Debug)]
pub struct DdClient {
    base: Url,
    agent: ureq::Agent,
}

impl DdClient {
    /// Client for `http://{host}:{port}/` using the shared agent.
    ///
    /// `host` may carry its own scheme (`https://models.internal`).
    pub fn new(host: &str, port: u16) -> Result<Self, DdError> {
        Ok(Self::with_agent(
            server_url(host, port)?,
            http_client::agent().clone(),
        ))
    }

    /// Client with dedicated socket timeouts.
    pub fn with_timeouts(host: &str, port: u16, timeouts: HttpTimeouts) -> Result<Self, DdError> {
        Ok(Self::with_agent(
            server_url(host, port)?,
            http_client::build_agent(timeouts),
        ))
    }

    pub fn with_agent(base: Url, agent: ureq::Agent) -> Self {
        Self { base, agent }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, DdError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DdError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn execute<B: Serialize>(
        &self,
        method: &str,
        url: &Url,
        body: Option<&B>,
    ) -> Result<DdResponse, DdError> {
        debug!("{method} {url}");
        let request = self
            .agent
            .request_url(method, url)
            .set("Accept", "application/json");
        let result = match body {
            Some(body) => request
                .set("Content-Type", "application/json")
                .send_json(body),
            None => request.call(),
        };
        match result {
            Ok(response) => {
                let text = http_client::read_response_text(response, MAX_RESPONSE_BYTES)?;
                DdResponse::parse(&text)
            }
            Err(ureq::Error::Status(code, response)) => {
                let body = http_client::read_response_text(response, MAX_RESPONSE_BYTES)
                    .unwrap_or_else(|err| err.to_string());
                DdResponse::parse(&body).map_err(|_| DdError::Status { code, body })
            }
            Err(ureq::Error::Transport(err)) => Err(DdError::Transport(err.to_string())),
        }
    }
}

impl DdCalls for DdClient {
    fn create_service(
        &self,
        name: &str,
        request: &CreateServiceRequest,
    ) -> Result<DdResponse, DdError> {
        let url = self.endpoint(&["services", name])?;
        self.execute("PUT", &url, Some(request))
    }

    fn delete_service(&self, name: &str, clear: ClearMode) -> Result<DdResponse, DdError> {
        let mut url = self.endpoint(&["services", name])?;
        url.query_pairs_mut().append_pair("clear", clear.as_str());
        self.execute::<()>("DELETE", &url, None)
    }

    fn post_train(&self, request: &TrainRequest) -> Result<DdResponse, DdError> {
        let url = self.endpoint(&["train"])?;
        self.execute("POST", &url, Some(request))
    }

    fn get_train(
        &self,
        service: &str,
        job: u64,
        timeout_secs: u64,
    ) -> Result<DdResponse, DdError> {
        let mut url = self.endpoint(&["train"])?;
        url.query_pairs_mut()
            .append_pair("service", service)
            .append_pair("job", &job.to_string())
            .append_pair("timeout", &timeout_secs.to_string());
        self.execute::<()>("GET", &url, None)
    }

    fn post_predict(&self, request: &PredictRequest) -> Result<DdResponse, DdError> {
        let url = self.endpoint(&["predict"])?;
        self.execute("POST", &url, Some(request))
    }
}

fn server_url(host: &str, port: u16) -> Result<Url, DdError> {
    let host = host.trim();
    if host.is_empty() {
        return Err(DdError::InvalidUrl("empty host".to_string()));
    }
    let raw = if host.contains("://") {
        host.to_string()
    } else {
        format!("http://{host}")
    };
    let mut url = Url::parse(&raw).map_err(|err| DdError::InvalidUrl(format!("{raw}: {err}")))?;
    url.set_port(Some(port))
        .map_err(|_| DdError::InvalidUrl(format!("{raw}: cannot carry a port")))?;
    // Endpoints are appended below the base path.
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_base_url_from_host_and_port() {
        let client = DdClient::new("localhost", 8080).unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:8080/");
        let client = DdClient::new("https://models.example/", 443).unwrap();
        assert_eq!(client.base_url().as_str(), "https://models.example/");
    }

    #[test]
    fn rejects_empty_host() {
        assert!(matches!(DdClient::new("  ", 8080), Err(DdError::InvalidUrl(_))));
    }

    #[test]
    fn keeps_base_path_of_host() {
        let client = DdClient::new("http://gw/dd", 8080).unwrap();
        assert_eq!(client.base_url().as_str(), "http://gw:8080/dd/");
        let url = client.endpoint(&["services", "svc"]).unwrap();
        assert_eq!(url.as_str(), "http://gw:8080/dd/services/svc");

        let client = DdClient::new("gw/dd/", 9000).unwrap();
        let url = client.endpoint(&["train"]).unwrap();
        assert_eq!(url.as_str(), "http://gw:9000/dd/train");
    }

    #[test]
    fn escapes_service_names_in_paths() {
        let client = DdClient::new("localhost", 8080).unwrap();
        let url = client.endpoint(&["services", "my svc"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/services/my%20svc");
    }
}
