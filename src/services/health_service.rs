use tracing::warn;

use crate::{dto::health::HealthResponse, state::SharedState};

/// Probe the document store and report queue sizes.
pub async fn health_status(state: &SharedState) -> HealthResponse {
    let storage_ok = match state.snapshots().store().health_check().await {
        Ok(()) => true,
        Err(err) => {
            warn!(error = %err, "storage health check failed");
            false
        }
    };

    let driver = state.driver().await;
    HealthResponse::new(
        storage_ok,
        driver.season.current_season,
        driver.season.ungraded_answers().len(),
        driver.scheduled_messages().len(),
    )
}
