//! C2: HTTP Fetcher (spec §4.2). Follows up to 5 redirects, enforces a
//! per-call timeout, attaches a configured User-Agent and default headers,
//! and records response time. Never retries on its own — that's C14.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::redirect::Policy;
use reqwest::{Client, Method};
use tracing::instrument;
use webchunk_common::error::PipelineErrorKind;

const MAX_REDIRECTS: usize = 5;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub url: String,
    pub final_url: String,
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub response_time_ms: u64,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

pub struct HttpFetcher {
    client: Client,
    default_headers: HashMap<String, String>,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, PipelineErrorKind> {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .redirect(Policy::limited(MAX_REDIRECTS))
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineErrorKind::Internal(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            default_headers: HashMap::new(),
        })
    }

    pub fn with_default_timeout(user_agent: &str) -> Result<Self, PipelineErrorKind> {
        Self::new(user_agent, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn set_default_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.default_headers.insert(key.into(), value.into());
    }

    #[instrument(skip(self, extra_headers), fields(url = %url))]
    pub async fn get(
        &self,
        url: &str,
        extra_headers: &HashMap<String, String>,
    ) -> Result<FetchResponse, PipelineErrorKind> {
        self.execute(Method::GET, url, extra_headers).await
    }

    pub async fn get_string(
        &self,
        url: &str,
        extra_headers: &HashMap<String, String>,
    ) -> Result<String, PipelineErrorKind> {
        Ok(self.get(url, extra_headers).await?.body_string())
    }

    pub async fn get_bytes(
        &self,
        url: &str,
        extra_headers: &HashMap<String, String>,
    ) -> Result<Vec<u8>, PipelineErrorKind> {
        Ok(self.get(url, extra_headers).await?.body)
    }

    #[instrument(skip(self, extra_headers), fields(url = %url))]
    pub async fn head(
        &self,
        url: &str,
        extra_headers: &HashMap<String, String>,
    ) -> Result<FetchResponse, PipelineErrorKind> {
        self.execute(Method::HEAD, url, extra_headers).await
    }

    async fn execute(
        &self,
        method: Method,
        url: &str,
        extra_headers: &HashMap<String, String>,
    ) -> Result<FetchResponse, PipelineErrorKind> {
        let mut builder = self.client.request(method, url);
        for (k, v) in self.default_headers.iter().chain(extra_headers.iter()) {
            builder = builder.header(k, v);
        }

        let started = Instant::now();
        let response = builder.send().await.map_err(classify_reqwest_error)?;
        let elapsed = started.elapsed();

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or_default().to_string()))
            .collect::<HashMap<_, _>>();
        let content_type = headers.get("content-type").cloned();

        if !(200..400).contains(&status_code) {
            let body = response.bytes().await.unwrap_or_default().to_vec();
            return if status_code >= 400 {
                Err(PipelineErrorKind::HttpStatus { code: status_code })
            } else {
                Ok(FetchResponse {
                    url: url.to_string(),
                    final_url,
                    status_code,
                    headers,
                    body,
                    content_type,
                    response_time_ms: elapsed.as_millis() as u64,
                })
            };
        }

        let body = response.bytes().await.map_err(classify_reqwest_error)?.to_vec();

        Ok(FetchResponse {
            url: url.to_string(),
            final_url,
            status_code,
            headers,
            body,
            content_type,
            response_time_ms: elapsed.as_millis() as u64,
        })
    }
}

fn classify_reqwest_error(err: reqwest::Error) -> PipelineErrorKind {
    if err.is_timeout() {
        PipelineErrorKind::Timeout
    } else if let Some(status) = err.status() {
        PipelineErrorKind::HttpStatus { code: status.as_u16() }
    } else {
        PipelineErrorKind::Network(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn get_records_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/hello"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hi there"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::with_default_timeout("test-agent/1.0").unwrap();
        let resp = fetcher
            .get(&format!("{}/hello", server.uri()), &HashMap::new())
            .await
            .unwrap();

        assert!(resp.is_success());
        assert_eq!(resp.body_string(), "hi there");
    }

    #[tokio::test]
    async fn server_error_status_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::with_default_timeout("test-agent/1.0").unwrap();
        let err = fetcher
            .get(&format!("{}/broken", server.uri()), &HashMap::new())
            .await
            .unwrap_err();

        assert_eq!(err, PipelineErrorKind::HttpStatus { code: 500 });
    }
}
