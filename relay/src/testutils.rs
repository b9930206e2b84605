use crate::config::FormConfig;
use crate::errors::{RelayError, Result};
use crate::payload::FormFields;
use crate::token::TokenExtractor;
use crate::upstream::{FormUpstream, UpstreamResponse};
use async_trait::async_trait;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, LOCATION};
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use metrics::{
    Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::net::TcpListener;
use url::Url;

pub const TEST_FORM_ID: &str = "1FAIpQLSdTestForm";
pub const REDIRECTING_FORM_ID: &str = "1FAIpQLSdRedirecting";
pub const TEST_PAGE: &str =
    r#"<html><form><input type="hidden" name="fbzx" value="-7390215548"></form></html>"#;

pub fn test_form_config(base_url: &Url, form_id: &str) -> FormConfig {
    let mut config = FormConfig::new(form_id);
    config.base_url = base_url.clone();
    config.timeout_secs = Some(5);
    config
}

/// Stand-in for the form backend:
/// - `GET {form}/viewform` returns `TEST_PAGE` for known forms
/// - `POST {TEST_FORM_ID}/formResponse` echoes content type and body
/// - `POST {REDIRECTING_FORM_ID}/formResponse` redirects to `/thanks`
async fn upstream_handler(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path().to_string();
    let method = req.method().clone();
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let body = req
        .into_body()
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .unwrap_or_default();

    let known_form = |suffix: &str| {
        [TEST_FORM_ID, REDIRECTING_FORM_ID]
            .iter()
            .any(|id| path == format!("/forms/d/e/{id}/{suffix}"))
    };

    let response = match method {
        Method::GET if known_form("viewform") => Response::new(Full::new(TEST_PAGE.into())),
        Method::GET if path == "/thanks" => Response::new(Full::new("thanks".into())),
        Method::POST if path.contains(REDIRECTING_FORM_ID) && known_form("formResponse") => {
            Response::builder()
                .status(StatusCode::FOUND)
                .header(LOCATION, "/thanks")
                .body(Full::new(Bytes::new()))
                .unwrap()
        }
        Method::POST if known_form("formResponse") => {
            let mut echoed = format!("{content_type}\n").into_bytes();
            echoed.extend_from_slice(&body);
            Response::new(Full::new(Bytes::from(echoed)))
        }
        _ => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new("not found".into()))
            .unwrap(),
    };

    Ok(response)
}

/// Starts the stand-in backend and returns its form base URL.
pub async fn start_upstream_server() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to address");

    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);

            tokio::spawn(async move {
                if let Err(err) = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, service_fn(upstream_handler))
                    .await
                {
                    eprintln!("Error serving connection: {:?}", err);
                }
            });
        }
    });

    Url::parse(&format!("http://127.0.0.1:{port}/forms/d/e/")).unwrap()
}

/// In-memory upstream that records every call.
pub struct StubUpstream {
    /// `None` makes the view fetch fail
    page: Option<String>,
    response: UpstreamResponse,
    fetch_calls: AtomicUsize,
    submitted: Mutex<Vec<FormFields>>,
}

impl StubUpstream {
    pub fn new(page: Option<&str>, status: StatusCode, body: &str) -> Self {
        Self {
            page: page.map(String::from),
            response: UpstreamResponse {
                status,
                body: body.to_string(),
            },
            fetch_calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    pub fn last_submission(&self) -> Option<FormFields> {
        self.submitted.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl FormUpstream for StubUpstream {
    async fn fetch_view(&self) -> Result<String> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.page
            .clone()
            .ok_or(RelayError::ViewFetchFailed(StatusCode::SERVICE_UNAVAILABLE))
    }

    async fn submit(&self, fields: &FormFields) -> Result<UpstreamResponse> {
        self.submitted.lock().unwrap().push(fields.clone());
        Ok(self.response.clone())
    }
}

pub struct PanickingExtractor;

impl TokenExtractor for PanickingExtractor {
    fn extract(&self, _document: &str) -> Option<String> {
        panic!("extractor bug");
    }
}

/// Current and highest value seen for one gauge.
#[derive(Default)]
struct TrackedGauge(Mutex<(f64, f64)>);

impl TrackedGauge {
    fn update(&self, f: impl FnOnce(f64) -> f64) {
        let mut state = self.0.lock().unwrap();
        state.0 = f(state.0);
        state.1 = state.1.max(state.0);
    }
}

impl GaugeFn for TrackedGauge {
    fn increment(&self, value: f64) {
        self.update(|current| current + value);
    }

    fn decrement(&self, value: f64) {
        self.update(|current| current - value);
    }

    fn set(&self, value: f64) {
        self.update(|_| value);
    }
}

/// Recorder that keeps gauge values by metric name and drops everything else.
#[derive(Default)]
pub struct GaugeRecorder {
    gauges: Mutex<HashMap<String, Arc<TrackedGauge>>>,
}

impl GaugeRecorder {
    fn tracked(&self, name: &str) -> Arc<TrackedGauge> {
        self.gauges
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    pub fn value(&self, name: &str) -> f64 {
        self.tracked(name).0.lock().unwrap().0
    }

    pub fn peak(&self, name: &str) -> f64 {
        self.tracked(name).0.lock().unwrap().1
    }
}

impl Recorder for GaugeRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
        Counter::noop()
    }

    fn register_gauge(&self, key: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(self.tracked(key.name()))
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}
