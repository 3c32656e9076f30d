use serde_json::Value;
use tracing::{debug, info};

use crate::config::{ClientConfig, Credentials};
use crate::endpoint::Endpoint;
use crate::errors::{ClientError, StreamError};
use crate::requests::{EndpointRequest, ResumeUpload};
use crate::retry::{AttemptSource, RetryPolicy, retry_stream};
use crate::session::{CancelHandle, StreamSession};
use crate::stream::StreamResult;

const EVENT_STREAM_MIME: &str = "text/event-stream";

/// HTTP client for the interview backend's streaming endpoints.
#[derive(Clone, Debug)]
pub struct InterviewClient {
    http: reqwest::Client,
    config: ClientConfig,
}

/// Response of the resume upload endpoint, which may answer either way.
#[derive(Debug)]
pub enum UploadResponse {
    /// The backend streams the analysis as SSE.
    Streaming(StreamSession),
    /// The backend answered with a complete JSON analysis.
    Immediate(Value),
}

impl From<UploadResponse> for AttemptSource {
    fn from(response: UploadResponse) -> Self {
        match response {
            UploadResponse::Streaming(session) => Self::Stream(session),
            UploadResponse::Immediate(value) => Self::Ready(StreamResult::Structured(value)),
        }
    }
}

impl InterviewClient {
    /// Creates a client from explicit configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .read_timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Posts `request` to its endpoint and returns a session over the response body.
    pub async fn open<R: EndpointRequest>(
        &self,
        request: &R,
        credentials: &Credentials,
    ) -> Result<StreamSession, ClientError> {
        request.validate()?;
        let endpoint = R::ENDPOINT;
        let url = self.config.endpoint_url(endpoint.path());
        debug!(endpoint = %endpoint, url = %url, "opening stream");

        let http_req = credentials.apply(self.http.post(url).json(request));
        let response = send(http_req).await?;
        let response = check_status(response).await?;
        let session = session_from_response(endpoint, response);
        info!(session_id = %session.id(), endpoint = %endpoint, "stream opened");
        Ok(session)
    }

    /// Uploads a resume. The backend either streams the analysis or returns it
    /// as one JSON document.
    pub async fn upload_resume(
        &self,
        upload: ResumeUpload,
        credentials: &Credentials,
    ) -> Result<UploadResponse, ClientError> {
        upload.validate()?;
        let endpoint = Endpoint::ResumeUpload;
        let url = self.config.endpoint_url(endpoint.path());
        debug!(endpoint = %endpoint, file = %upload.file_name, bytes = upload.bytes.len(), "uploading resume");

        let http_req = self
            .http
            .post(url)
            .timeout(self.config.upload_timeout)
            .multipart(upload.into_form()?);
        let response = send(credentials.apply(http_req)).await?;
        let response = check_status(response).await?;

        if is_event_stream(response.headers()) {
            let session = session_from_response(endpoint, response);
            info!(session_id = %session.id(), endpoint = %endpoint, "analysis stream opened");
            return Ok(UploadResponse::Streaming(session));
        }
        let body: Value = response
            .json()
            .await
            .map_err(|e| StreamError::protocol(format!("invalid upload response JSON: {e}")))?;
        Ok(UploadResponse::Immediate(extract_immediate_analysis(body)?))
    }

    /// Uploads a resume and waits for its analysis, retrying per `policy`.
    ///
    /// Streamed analyses are drained; `cancel` stops both the stream and any
    /// pending backoff.
    pub async fn analyze_resume(
        &self,
        upload: &ResumeUpload,
        credentials: &Credentials,
        policy: &RetryPolicy,
        cancel: &CancelHandle,
    ) -> Result<StreamResult, ClientError> {
        upload.validate()?;
        retry_stream(policy, cancel, |attempt| {
            let upload = upload.clone();
            let cancel = cancel.clone();
            async move {
                debug!(attempt, "resume analysis attempt");
                Ok(match self.upload_resume(upload, credentials).await? {
                    UploadResponse::Streaming(session) => {
                        UploadResponse::Streaming(session.with_cancel_handle(cancel))
                    }
                    immediate => immediate,
                })
            }
        })
        .await
    }
}

async fn send(request: reqwest::RequestBuilder) -> Result<reqwest::Response, StreamError> {
    request
        .send()
        .await
        .map_err(|e| StreamError::transport(format!("request failed: {e}")))
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StreamError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(StreamError::http(status.as_u16(), body))
}

fn session_from_response(endpoint: Endpoint, response: reqwest::Response) -> StreamSession {
    StreamSession::new(response.bytes_stream(), endpoint.classifier()).with_label(endpoint.name())
}

fn is_event_stream(headers: &reqwest::header::HeaderMap) -> bool {
    headers
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.to_ascii_lowercase().contains(EVENT_STREAM_MIME))
}

/// Unwraps a non-streamed upload response: `{"analysis": ...}` or the
/// `{"code": 200, "data": ...}` envelope.
fn extract_immediate_analysis(body: Value) -> Result<Value, StreamError> {
    if let Some(analysis) = body.get("analysis").filter(|v| is_present(v)) {
        return Ok(analysis.clone());
    }
    if body.get("code").and_then(Value::as_i64) == Some(200)
        && let Some(data) = body.get("data").filter(|v| is_present(v))
    {
        return Ok(data.clone());
    }
    let message = body
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or("upload response carried no analysis");
    Err(StreamError::protocol(message))
}

fn is_present(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
    use serde_json::json;

    #[test]
    fn immediate_analysis_is_unwrapped_from_either_envelope() {
        let direct = json!({"analysis": {"basic_info": {"name": "A"}}});
        assert_eq!(
            extract_immediate_analysis(direct).expect("analysis"),
            json!({"basic_info": {"name": "A"}})
        );
        let enveloped = json!({"code": 200, "data": {"match_score": 81}});
        assert_eq!(
            extract_immediate_analysis(enveloped).expect("data"),
            json!({"match_score": 81})
        );
    }

    #[test]
    fn immediate_failure_uses_backend_message() {
        let err = extract_immediate_analysis(json!({"code": 500, "message": "parse failed"}))
            .expect_err("no analysis");
        assert_eq!(err, StreamError::protocol("parse failed"));
        assert!(err.is_retryable());
    }

    #[test]
    fn content_type_sniffing_ignores_case_and_parameters() {
        let mut headers = HeaderMap::new();
        assert!(!is_event_stream(&headers));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("Text/Event-Stream; charset=utf-8"),
        );
        assert!(is_event_stream(&headers));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(!is_event_stream(&headers));
    }

    #[test]
    fn immediate_upload_becomes_ready_attempt() {
        let source: AttemptSource = UploadResponse::Immediate(json!({"x": 1})).into();
        assert!(matches!(
            source,
            AttemptSource::Ready(StreamResult::Structured(_))
        ));
    }

    #[test]
    fn client_rejects_invalid_config() {
        assert!(InterviewClient::new(ClientConfig::new("not a url")).is_err());
        let client = InterviewClient::new(ClientConfig::default()).expect("client");
        assert_eq!(client.config().base_url, crate::config::DEFAULT_BASE_URL);
    }

    #[tokio::test]
    async fn invalid_request_fails_before_sending() {
        let client = InterviewClient::new(ClientConfig::new("http://127.0.0.1:9")).expect("client");
        let err = client
            .open(&crate::requests::KnowledgeQuery::new("  "), &Credentials::anonymous())
            .await
            .expect_err("validation");
        assert!(matches!(err, ClientError::Validation(_)));

        let err = client
            .upload_resume(ResumeUpload::new("cv.exe", b"MZ".to_vec()), &Credentials::anonymous())
            .await
            .expect_err("validation");
        assert!(matches!(err, ClientError::Validation(_)));
    }

    /// Serves one chunked SSE response, pausing `gap` before each chunk.
    async fn serve_paced_sse(chunks: Vec<String>, gap: std::time::Duration) -> String {
        use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut request = vec![0_u8; 8192];
            let _ = socket.read(&mut request).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\n\
                      transfer-encoding: chunked\r\nconnection: close\r\n\r\n",
                )
                .await
                .expect("head");
            for chunk in chunks {
                tokio::time::sleep(gap).await;
                let frame = format!("{:x}\r\n{chunk}\r\n", chunk.len());
                socket.write_all(frame.as_bytes()).await.expect("chunk");
            }
            socket.write_all(b"0\r\n\r\n").await.expect("end");
            let _ = socket.shutdown().await;
            let _ = socket.read_to_end(&mut request).await;
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn stream_longer_than_read_timeout_is_not_cut_off() {
        use std::time::Duration;

        let chunks = ["Ru", "st ", "is ", "fun"]
            .iter()
            .map(|t| format!("data: {}\n\n", json!({"choices":[{"delta":{"content": t}}]})))
            .collect();
        let base_url = serve_paced_sse(chunks, Duration::from_millis(120)).await;
        let config = ClientConfig::new(base_url).timeout(Duration::from_millis(300));
        let client = InterviewClient::new(config).expect("client");

        let session = client
            .open(&crate::requests::KnowledgeQuery::new("rust?"), &Credentials::anonymous())
            .await
            .expect("open");
        let answer = session.drain().await.into_result().expect("stream completes");
        assert_eq!(answer.text, "Rust is fun");
    }
}
