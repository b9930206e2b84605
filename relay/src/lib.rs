pub mod config;
pub mod errors;
pub mod handler;
pub mod metrics_defs;
pub mod payload;
pub mod service;
pub mod status;
pub mod token;
pub mod upstream;

#[cfg(test)]
mod testutils;

use errors::RelayError;
use handler::Relay;
use service::RelayService;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;

/// Serves the relay listener and the admin listener until one of them fails.
pub async fn run(config: config::Config) -> Result<(), RelayError> {
    config.validate()?;

    let relay = Arc::new(Relay::try_new(&config.form)?);
    tracing::info!(form_id = %config.form.form_id, "Relaying submissions");

    let relay_task = run_http_service(
        &config.listener.host,
        config.listener.port,
        RelayService::new(relay),
    );
    let admin_task = run_http_service(
        &config.admin_listener.host,
        config.admin_listener.port,
        AdminService::<_, RelayError>::new(|| true),
    );

    tokio::try_join!(relay_task, admin_task)?;
    Ok(())
}
