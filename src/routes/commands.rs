use axum::{Json, Router, extract::State, routing::post};
use validator::Validate;

use crate::{
    dto::{command::CommandRequest, reply::CommandReply},
    error::AppError,
    services::command_service,
    state::SharedState,
};

/// Routes accepting commands from the chat bridge.
pub fn router() -> Router<SharedState> {
    Router::new().route("/commands", post(run_command))
}

/// Run one command and return the messages to post back.
#[utoipa::path(
    post,
    path = "/commands",
    tag = "commands",
    request_body = CommandRequest,
    responses(
        (status = 200, description = "Command handled; expected failures are part of the reply", body = CommandReply),
        (status = 400, description = "Malformed invocation"),
        (status = 503, description = "State could not be persisted")
    )
)]
pub async fn run_command(
    State(state): State<SharedState>,
    Json(payload): Json<CommandRequest>,
) -> Result<Json<CommandReply>, AppError> {
    payload.validate()?;
    let reply = command_service::execute(&state, payload).await?;
    Ok(Json(reply))
}
