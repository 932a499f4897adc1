//! Resilient API invoker.
//!
//! [`Invoker::invoke`] turns one logical request into however many physical
//! round trips it takes:
//!
//! | response                                   | action                                   |
//! |--------------------------------------------|------------------------------------------|
//! | 401 + `x-ms-public-api-error-code: TokenExpired` | refresh token, re-issue once (not counted as a retry) |
//! | 202, or 200 while polling                  | long-running envelope, see below         |
//! | 429                                        | sleep `min(300, 2^calls)` s, re-issue    |
//! | 400 / 401 / 403                            | [`ApiError::Status`]                     |
//! | other 2xx                                  | done                                     |
//! | anything else                              | [`ApiError::UnhandledStatus`]            |
//!
//! Long-running envelope `status`: `Succeeded` ends the loop, `Failed` and
//! `Undefined` are errors, anything else sleeps the poll interval and GETs the
//! `Location` header.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::backoff::{parse_retry_after, throttle_delay, Sleeper, TokioSleeper};
use crate::error::ApiError;
use crate::token::TokenCache;
use crate::transport::{HttpRequest, HttpTransport, RawResponse, RequestBody};

const TOKEN_EXPIRED_HEADER: &str = "x-ms-public-api-error-code";
const TOKEN_EXPIRED_CODE: &str = "TokenExpired";

/// Final response of a logical request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    /// Parsed body when the response declared a JSON content type.
    pub body: Option<Value>,
}

impl ApiResponse {
    fn from_raw(raw: RawResponse) -> Self {
        let body = if raw.is_json() { raw.json_lossy() } else { None };
        Self {
            status: raw.status,
            headers: raw.headers,
            body,
        }
    }

    /// String field at the top level of the body.
    pub fn str_field(&self, field: &str) -> Option<&str> {
        self.body.as_ref()?.get(field)?.as_str()
    }
}

pub struct Invoker {
    transport: Arc<dyn HttpTransport>,
    tokens: Arc<TokenCache>,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
    poll_interval: Duration,
    user_agent: String,
}

enum Step {
    Done,
    Retry,
    Poll { location: String },
}

impl Invoker {
    pub fn new(transport: Arc<dyn HttpTransport>, tokens: Arc<TokenCache>) -> Self {
        Self {
            transport,
            tokens,
            sleeper: Arc::new(TokioSleeper),
            cancel: CancellationToken::new(),
            poll_interval: Duration::from_secs(1),
            user_agent: format!("weft/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Execute one logical request. `max_retries` bounds 429 re-issues only.
    pub async fn invoke(
        &self,
        method: Method,
        url: &str,
        body: RequestBody,
        max_retries: u32,
    ) -> Result<ApiResponse, ApiError> {
        let mut method = method;
        let mut url = url.to_string();
        let mut body = body;
        let mut long_running = false;
        let mut calls: u32 = 0;
        let mut throttled: u32 = 0;
        let mut refreshed = false;

        loop {
            if self.cancel.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let request = HttpRequest {
                method: method.clone(),
                url: url.clone(),
                bearer_token: self.tokens.get_token().await?,
                user_agent: self.user_agent.clone(),
                body: body.clone(),
            };
            let response = match self.transport.send(&request).await {
                Ok(r) => r,
                Err(e) => {
                    error!("{method} {url} failed: no response received: {e}");
                    return Err(e);
                }
            };
            calls += 1;
            debug!("{}", format_exchange(&request, &response));

            // A second expiry after a fresh token is reported as a 401.
            if response.status == 401
                && !refreshed
                && response.header(TOKEN_EXPIRED_HEADER) == Some(TOKEN_EXPIRED_CODE)
            {
                refreshed = true;
                info!("access token expired, refreshing");
                self.tokens.refresh().await?;
                continue;
            }

            let step = self
                .classify(&method, &url, &response, long_running, calls, &mut throttled, max_retries)
                .map_err(|e| {
                    error!("{}\n{e}", format_exchange(&request, &response));
                    e
                })?;

            match step {
                Step::Done => return Ok(ApiResponse::from_raw(response)),
                Step::Retry => {
                    self.pause(throttle_delay(calls)).await?;
                }
                Step::Poll { location } => {
                    let wait = response
                        .header("retry-after")
                        .and_then(parse_retry_after)
                        .unwrap_or(self.poll_interval);
                    self.pause(wait).await?;
                    method = Method::GET;
                    url = location;
                    body = RequestBody::Empty;
                    long_running = true;
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn classify(
        &self,
        method: &Method,
        url: &str,
        response: &RawResponse,
        long_running: bool,
        calls: u32,
        throttled: &mut u32,
        max_retries: u32,
    ) -> Result<Step, ApiError> {
        let status = response.status;

        if (status == 200 && long_running) || status == 202 {
            let envelope = response.json_lossy();
            let op_status = envelope
                .as_ref()
                .and_then(|v| v.get("status"))
                .and_then(Value::as_str);
            return match op_status {
                Some("Succeeded") => Ok(Step::Done),
                Some("Failed") => {
                    let message = envelope
                        .as_ref()
                        .and_then(|v| v.pointer("/error/message"))
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown error");
                    Err(ApiError::OperationFailed(message.to_string()))
                }
                Some("Undefined") => Err(ApiError::OperationUndefined),
                _ => match response.header("location") {
                    Some(location) => {
                        debug!("operation in progress (call {calls}), polling {location}");
                        Ok(Step::Poll {
                            location: location.to_string(),
                        })
                    }
                    None => Err(ApiError::MissingLocation {
                        url: url.to_string(),
                    }),
                },
            };
        }

        match status {
            429 => {
                if *throttled >= max_retries {
                    return Err(ApiError::RetriesExhausted {
                        method: method.to_string(),
                        url: url.to_string(),
                        attempts: *throttled,
                    });
                }
                *throttled += 1;
                info!(
                    "throttled, retrying in {}s ({}/{max_retries})",
                    throttle_delay(calls).as_secs(),
                    *throttled
                );
                Ok(Step::Retry)
            }
            400 | 401 | 403 => Err(ApiError::Status {
                method: method.to_string(),
                url: url.to_string(),
                status,
                body: response.body.clone(),
            }),
            200..=299 => Ok(Step::Done),
            _ => Err(ApiError::UnhandledStatus {
                method: method.to_string(),
                url: url.to_string(),
                status,
                body: response.body.clone(),
            }),
        }
    }

    /// Sleep unless cancelled first.
    async fn pause(&self, duration: Duration) -> Result<(), ApiError> {
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ApiError::Cancelled),
            _ = self.sleeper.sleep(duration) => Ok(()),
        }
    }
}

fn format_exchange(request: &HttpRequest, response: &RawResponse) -> String {
    let mut out = format!(
        "\nURL: {}\nMethod: {}\nRequest Body:\n{}\nResponse Status: {}\nResponse Headers:\n",
        request.url, request.method, request.body, response.status
    );
    for (name, value) in &response.headers {
        out.push_str(&format!("{name}: {value}\n"));
    }
    if response.is_json() {
        out.push_str("Response Body:\n");
        out.push_str(&response.body);
        out.push('\n');
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::token::tests::CountingCredential;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses in order and records every request.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        responses: Mutex<VecDeque<RawResponse>>,
        pub requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(responses: Vec<RawResponse>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, request: &HttpRequest) -> Result<RawResponse, ApiError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .expect("script exhausted"))
        }
    }

    #[derive(Default)]
    pub(crate) struct RecordingSleeper {
        pub sleeps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    struct Harness {
        transport: Arc<ScriptedTransport>,
        sleeper: Arc<RecordingSleeper>,
        credential: Arc<CountingCredential>,
        invoker: Invoker,
    }

    fn harness(responses: Vec<RawResponse>) -> Harness {
        let transport = Arc::new(ScriptedTransport::new(responses));
        let sleeper = Arc::new(RecordingSleeper::default());
        let credential = Arc::new(CountingCredential::new(chrono::Duration::minutes(30)));
        let invoker = Invoker::new(transport.clone(), Arc::new(TokenCache::new(credential.clone())))
            .with_sleeper(sleeper.clone());
        Harness {
            transport,
            sleeper,
            credential,
            invoker,
        }
    }

    fn ok_json(body: Value) -> RawResponse {
        RawResponse::new(200).with_json(body)
    }

    #[tokio::test]
    async fn plain_success_is_one_call() {
        let h = harness(vec![ok_json(json!({"id": "x"}))]);
        let resp = h
            .invoker
            .invoke(Method::GET, "https://api/items", RequestBody::Empty, 5)
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.str_field("id"), Some("x"));
        assert_eq!(h.transport.calls(), 1);
        let sent = &h.transport.requests.lock().unwrap()[0];
        assert_eq!(sent.bearer_token, "token-1");
        assert!(sent.user_agent.starts_with("weft/"));
    }

    #[tokio::test]
    async fn expired_token_is_refreshed_once_and_request_reissued() {
        let h = harness(vec![
            RawResponse::new(401).with_header(TOKEN_EXPIRED_HEADER, TOKEN_EXPIRED_CODE),
            ok_json(json!({"value": []})),
        ]);
        let resp = h
            .invoker
            .invoke(Method::GET, "https://api/items", RequestBody::Empty, 0)
            .await
            .unwrap();
        assert_eq!(resp.body, Some(json!({"value": []})));
        assert_eq!(h.credential.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        let requests = h.transport.requests.lock().unwrap();
        assert_eq!(requests[1].bearer_token, "token-2");
        assert!(h.sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn token_expired_twice_fails_after_one_refresh() {
        let h = harness(vec![
            RawResponse::new(401).with_header(TOKEN_EXPIRED_HEADER, TOKEN_EXPIRED_CODE),
            RawResponse::new(401).with_header(TOKEN_EXPIRED_HEADER, TOKEN_EXPIRED_CODE),
        ]);
        let err = h
            .invoker
            .invoke(Method::GET, "https://api/items", RequestBody::Empty, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 401, .. }), "got: {err}");
        assert_eq!(h.transport.calls(), 2);
        assert_eq!(h.credential.calls.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn plain_unauthorized_is_not_retried() {
        let h = harness(vec![RawResponse {
            body: "denied".into(),
            ..RawResponse::new(401)
        }]);
        let err = h
            .invoker
            .invoke(Method::GET, "https://api/items", RequestBody::Empty, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Status { status: 401, .. }), "got: {err}");
        assert_eq!(h.transport.calls(), 1);
    }

    #[tokio::test]
    async fn throttling_backs_off_exponentially() {
        let h = harness(vec![
            RawResponse::new(429),
            RawResponse::new(429),
            ok_json(json!({})),
        ]);
        h.invoker
            .invoke(Method::POST, "https://api/items", RequestBody::Json(json!({})), 5)
            .await
            .unwrap();
        assert_eq!(
            *h.sleeper.sleeps.lock().unwrap(),
            vec![Duration::from_secs(2), Duration::from_secs(4)]
        );
        let requests = h.transport.requests.lock().unwrap();
        assert!(requests.iter().all(|r| r.method == Method::POST));
    }

    #[tokio::test]
    async fn throttling_beyond_budget_is_retries_exhausted() {
        let h = harness(vec![
            RawResponse::new(429),
            RawResponse::new(429),
            RawResponse::new(429),
        ]);
        let err = h
            .invoker
            .invoke(Method::GET, "https://api/items", RequestBody::Empty, 2)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ApiError::RetriesExhausted { attempts: 2, .. }),
            "got: {err}"
        );
        assert_eq!(h.transport.calls(), 3);
    }

    #[tokio::test]
    async fn long_running_operation_polls_location_until_succeeded() {
        let h = harness(vec![
            RawResponse::new(202).with_header("Location", "https://api/operations/1"),
            ok_json(json!({"status": "Running"})).with_header("Location", "https://api/operations/1"),
            ok_json(json!({"status": "Succeeded", "id": "new-guid"})),
        ]);
        let resp = h
            .invoker
            .invoke(Method::POST, "https://api/items", RequestBody::Json(json!({"a": 1})), 5)
            .await
            .unwrap();
        assert_eq!(resp.str_field("id"), Some("new-guid"));
        assert_eq!(h.transport.calls(), 3);

        let requests = h.transport.requests.lock().unwrap();
        assert_eq!(requests[1].method, Method::GET);
        assert_eq!(requests[1].url, "https://api/operations/1");
        assert_eq!(requests[1].body, RequestBody::Empty);
        assert_eq!(
            *h.sleeper.sleeps.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(1)]
        );
    }

    #[tokio::test]
    async fn poll_honours_retry_after() {
        let h = harness(vec![
            RawResponse::new(202)
                .with_header("Location", "https://api/operations/1")
                .with_header("Retry-After", "20"),
            ok_json(json!({"status": "Succeeded"})),
        ]);
        h.invoker
            .invoke(Method::POST, "https://api/items", RequestBody::Empty, 5)
            .await
            .unwrap();
        assert_eq!(*h.sleeper.sleeps.lock().unwrap(), vec![Duration::from_secs(20)]);
    }

    #[tokio::test]
    async fn failed_operation_stops_with_message() {
        let h = harness(vec![
            RawResponse::new(202).with_header("Location", "https://api/operations/1"),
            ok_json(json!({"status": "Failed", "error": {"message": "definition invalid"}})),
        ]);
        let err = h
            .invoker
            .invoke(Method::POST, "https://api/items", RequestBody::Empty, 5)
            .await
            .unwrap_err();
        match err {
            ApiError::OperationFailed(msg) => assert_eq!(msg, "definition invalid"),
            other => panic!("unexpected: {other}"),
        }
        assert_eq!(h.transport.calls(), 2);
    }

    #[tokio::test]
    async fn undefined_operation_is_an_error() {
        let h = harness(vec![RawResponse::new(202).with_json(json!({"status": "Undefined"}))]);
        let err = h
            .invoker
            .invoke(Method::POST, "https://api/items", RequestBody::Empty, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::OperationUndefined));
    }

    #[tokio::test]
    async fn accepted_without_location_is_missing_location() {
        let h = harness(vec![RawResponse::new(202)]);
        let err = h
            .invoker
            .invoke(Method::POST, "https://api/items", RequestBody::Empty, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingLocation { .. }), "got: {err}");
    }

    #[tokio::test]
    async fn server_error_is_unhandled_status() {
        let h = harness(vec![RawResponse {
            body: "boom".into(),
            ..RawResponse::new(500)
        }]);
        let err = h
            .invoker
            .invoke(Method::DELETE, "https://api/items/1", RequestBody::Empty, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnhandledStatus { status: 500, .. }));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn cancelled_before_send_makes_no_call() {
        let h = harness(vec![ok_json(json!({}))]);
        h.invoker.cancellation().cancel();
        let err = h
            .invoker
            .invoke(Method::GET, "https://api/items", RequestBody::Empty, 5)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Cancelled));
        assert_eq!(h.transport.calls(), 0);
    }

    #[tokio::test]
    async fn non_json_success_has_no_body() {
        let h = harness(vec![RawResponse {
            body: "plain".into(),
            ..RawResponse::new(200)
        }]);
        let resp = h
            .invoker
            .invoke(Method::DELETE, "https://api/items/1", RequestBody::Empty, 5)
            .await
            .unwrap();
        assert!(resp.body.is_none());
    }
}
