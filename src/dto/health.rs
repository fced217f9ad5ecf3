use serde::Serialize;
use utoipa::ToSchema;

/// Health payload returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// "ok", or "degraded" when the document store fails its health check.
    pub status: String,
    /// Current season counter.
    pub current_season: i64,
    /// Answers waiting for a grader.
    pub ungraded_answers: usize,
    /// Broadcasts waiting for their delivery time.
    pub scheduled_messages: usize,
}

impl HealthResponse {
    /// Build the payload from the health check outcome and queue sizes.
    pub fn new(
        storage_ok: bool,
        current_season: i64,
        ungraded_answers: usize,
        scheduled_messages: usize,
    ) -> Self {
        Self {
            status: if storage_ok { "ok" } else { "degraded" }.to_string(),
            current_season,
            ungraded_answers,
            scheduled_messages,
        }
    }
}
