use crate::errors::RelayError;
use crate::handler::Relay;
use crate::payload::SubmissionPayload;
use crate::status::RelayStatus;
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use shared::http::{make_boxed_error_response, make_text_response};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type RelayBody = BoxBody<Bytes, RelayError>;

/// Accepts form posts from the custom HTML form.
///
/// Every relay outcome is answered with 200 and a text status line; callers
/// read `OK` or `ERR: ...` from the body.
pub struct RelayService {
    relay: Arc<Relay>,
}

impl RelayService {
    pub fn new(relay: Arc<Relay>) -> Self {
        Self { relay }
    }
}

impl Service<Request<Incoming>> for RelayService {
    type Response = Response<RelayBody>;
    type Error = RelayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let relay = self.relay.clone();
        Box::pin(async move { Ok(handle(relay, req).await) })
    }
}

pub async fn handle<B>(relay: Arc<Relay>, req: Request<B>) -> Response<RelayBody>
where
    B: hyper::body::Body + Send,
    B::Error: std::fmt::Display,
{
    let method = req.method().clone();
    let status = match method {
        Method::GET | Method::HEAD => relay.liveness(),
        Method::POST => match read_payload(req).await {
            Ok(payload) => run_isolated(relay, payload).await,
            Err(e) => e.into(),
        },
        _ => return make_boxed_error_response(StatusCode::METHOD_NOT_ALLOWED),
    };

    make_text_response(StatusCode::OK, status.to_string())
}

async fn read_payload<B>(req: Request<B>) -> Result<SubmissionPayload, RelayError>
where
    B: hyper::body::Body,
    B::Error: std::fmt::Display,
{
    let (parts, body) = req.into_parts();
    let bytes = body
        .collect()
        .await
        .map_err(|e| RelayError::RequestBody(e.to_string()))?
        .to_bytes();

    let mut payload = SubmissionPayload::from_form_encoded(&bytes);
    if let Some(query) = parts.uri.query() {
        payload.merge_query(query);
    }

    Ok(payload)
}

/// Runs the relay on its own task so a panic still produces a status line.
async fn run_isolated(relay: Arc<Relay>, payload: SubmissionPayload) -> RelayStatus {
    match tokio::spawn(async move { relay.relay(payload).await }).await {
        Ok(status) => status,
        Err(e) => {
            tracing::error!("Relay task panicked: {e}");
            RelayError::TaskFailed(e.to_string()).into()
        }
    }
}
