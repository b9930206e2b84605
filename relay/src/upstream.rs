use crate::config::FormConfig;
use crate::errors::{RelayError, Result};
use crate::payload::{FormFields, encode_form};
use async_trait::async_trait;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use std::time::Duration;
use url::Url;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Status and body of the submit call, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: String,
}

/// The two calls the relay makes against the form backend.
#[async_trait]
pub trait FormUpstream: Send + Sync {
    /// Fetches the form's view page.
    async fn fetch_view(&self) -> Result<String>;

    /// Posts one filled-in form. Non-2xx statuses are returned, not raised.
    async fn submit(&self, fields: &FormFields) -> Result<UpstreamResponse>;
}

pub struct HttpUpstream {
    client: reqwest::Client,
    view_url: Url,
    submit_url: Url,
}

impl HttpUpstream {
    pub fn try_new(config: &FormConfig) -> Result<Self> {
        let redirect = match config.follow_redirects {
            true => Policy::default(),
            false => Policy::none(),
        };

        let mut builder = reqwest::Client::builder().redirect(redirect);
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build().map_err(RelayError::HttpClient)?,
            view_url: config.view_url()?,
            submit_url: config.submit_url()?,
        })
    }
}

#[async_trait]
impl FormUpstream for HttpUpstream {
    async fn fetch_view(&self) -> Result<String> {
        let response = self
            .client
            .get(self.view_url.clone())
            .send()
            .await
            .map_err(RelayError::UpstreamUnreachable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::ViewFetchFailed(status));
        }

        response.text().await.map_err(RelayError::ResponseBody)
    }

    async fn submit(&self, fields: &FormFields) -> Result<UpstreamResponse> {
        let response = self
            .client
            .post(self.submit_url.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .body(encode_form(fields))
            .send()
            .await
            .map_err(RelayError::UpstreamUnreachable)?;

        let status = response.status();
        let body = response.text().await.map_err(RelayError::ResponseBody)?;

        Ok(UpstreamResponse { status, body })
    }
}
