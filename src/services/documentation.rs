use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for POTD Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::commands::run_command,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::command::CommandRequest,
            crate::dto::command::Invoker,
            crate::dto::command::Command,
            crate::dto::command::NumericInput,
            crate::dto::reply::CommandReply,
            crate::dto::reply::ReplyMessage,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "commands", description = "Competition commands relayed by the chat bridge"),
    )
)]
pub struct ApiDoc;
