/// Command dispatch and the commit after each command.
pub mod command_service;
/// Per-command context and notification helpers.
pub mod context;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Rankings, leaderboard publishing and season archival.
pub mod leaderboard_service;
/// Background jobs on fixed periods.
pub mod periodic;
/// Problem, submission and grading commands.
pub mod potd_service;
/// Scheduled broadcasts.
pub mod schedule_service;
