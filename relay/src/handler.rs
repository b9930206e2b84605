use crate::config::FormConfig;
use crate::errors::Result;
use crate::metrics_defs::{RELAY_DURATION, RELAY_OUTCOME, RELAYS_INFLIGHT};
use crate::payload::{FormFields, SubmissionPayload};
use crate::status::RelayStatus;
use crate::token::{RegexTokenExtractor, TokenExtractor};
use crate::upstream::{FormUpstream, HttpUpstream};
use indexmap::IndexMap;
use shared::{counter, gauge, histogram};
use std::sync::Arc;
use std::time::Instant;

/// Relays one caller submission to the upstream form.
///
/// Each call fetches its own token and makes exactly one submit attempt.
/// Nothing is shared between calls except the HTTP connection pool.
pub struct Relay {
    upstream: Arc<dyn FormUpstream>,
    extractor: Arc<dyn TokenExtractor>,
    token_field: String,
    constants: IndexMap<String, String>,
}

impl Relay {
    pub fn try_new(config: &FormConfig) -> Result<Self> {
        let upstream = Arc::new(HttpUpstream::try_new(config)?);
        let extractor = Arc::new(RegexTokenExtractor::new(&config.token_field)?);
        Ok(Self::with_parts(config, upstream, extractor))
    }

    pub fn with_parts(
        config: &FormConfig,
        upstream: Arc<dyn FormUpstream>,
        extractor: Arc<dyn TokenExtractor>,
    ) -> Self {
        Self {
            upstream,
            extractor,
            token_field: config.token_field.clone(),
            constants: config.constants.clone(),
        }
    }

    /// Reachability check. Never touches upstream.
    pub fn liveness(&self) -> RelayStatus {
        RelayStatus::Ok
    }

    pub async fn relay(&self, payload: SubmissionPayload) -> RelayStatus {
        let start = Instant::now();
        let inflight = InflightGuard::enter();

        let status = match self.try_relay(payload).await {
            Ok(status) => status,
            Err(e) => {
                tracing::error!(error = %e, "Relay failed");
                e.into()
            }
        };

        drop(inflight);
        histogram!(RELAY_DURATION).record(start.elapsed().as_secs_f64());
        counter!(RELAY_OUTCOME, "outcome" => status.outcome()).increment(1);

        status
    }

    async fn try_relay(&self, payload: SubmissionPayload) -> Result<RelayStatus> {
        let document = self.upstream.fetch_view().await?;

        let Some(token) = self.extractor.extract(&document) else {
            tracing::warn!(
                token_field = %self.token_field,
                page_len = document.len(),
                "Token not found in view page"
            );
            return Ok(RelayStatus::TokenNotFound);
        };

        let fields = self.build_submission(payload, token);
        tracing::debug!(fields = fields.len(), "Submitting form response");

        let response = self.upstream.submit(&fields).await?;
        let status = RelayStatus::classify(response.status, &response.body);

        if !status.is_ok() {
            tracing::warn!(status = %response.status, "Upstream rejected submission");
        }

        Ok(status)
    }

    /// Caller fields, then the token, then the relay constants. Later entries win.
    pub fn build_submission(&self, payload: SubmissionPayload, token: String) -> FormFields {
        let mut fields = payload.into_fields();
        fields.insert(self.token_field.clone(), token);
        for (key, value) in &self.constants {
            fields.insert(key.clone(), value.clone());
        }
        fields
    }
}

/// Counts one relay in `RELAYS_INFLIGHT` until dropped, including on unwind.
struct InflightGuard;

impl InflightGuard {
    fn enter() -> Self {
        gauge!(RELAYS_INFLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(RELAYS_INFLIGHT).decrement(1.0);
    }
}
