//! Terminal command execution.
//!
//! POST /terminal/execute runs a single allowlisted command. Denied commands
//! are answered with 200 and `error: true` so the panel can print the
//! message in its terminal view.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use deck_core::{CommandOutput, Error as CoreError};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const ACTION: &str = "terminal_command";

/// Create terminal router
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/terminal/execute", post(execute_command))
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    #[serde(default)]
    pub command: String,
}

fn failure(status: StatusCode, output: String) -> (StatusCode, Json<CommandOutput>) {
    (status, Json(CommandOutput { output, error: true }))
}

async fn execute_command(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExecuteRequest>,
) -> ApiResult<(StatusCode, Json<CommandOutput>)> {
    let command = request.command.trim();
    if command.is_empty() {
        return Err(ApiError::bad_request("Command not specified"));
    }

    state
        .activity
        .info(ACTION, format!("Command requested: {}", command));

    match state.runner.run(command).await {
        Ok(output) if output.error => {
            state.activity.error(
                ACTION,
                format!("Command {} failed: {}", command, output.output.trim_end()),
            );
            Ok((StatusCode::OK, Json(output)))
        }
        Ok(output) => {
            info!("Command executed: {}", command);
            state
                .activity
                .success(ACTION, format!("Command {} executed", command));
            Ok((StatusCode::OK, Json(output)))
        }
        Err(CoreError::CommandDenied { reason, .. }) => {
            warn!("Denied command '{}': {}", command, reason);
            state
                .activity
                .warning(ACTION, format!("Denied command {} ({})", command, reason));
            Ok(failure(
                StatusCode::OK,
                format!("Command '{}' is forbidden for security reasons.", command),
            ))
        }
        Err(CoreError::EmptyCommand) => Err(ApiError::bad_request("Command not specified")),
        Err(e @ CoreError::CommandTimeout { .. }) => {
            state.activity.error(ACTION, e.to_string());
            Ok(failure(
                StatusCode::REQUEST_TIMEOUT,
                "Command execution timed out".to_string(),
            ))
        }
        Err(e) => {
            state
                .activity
                .error(ACTION, format!("Command {} failed: {}", command, e));
            Ok(failure(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Command execution failed: {}", e),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::routes::create_router;
    use crate::routes::test_support::post;
    use crate::state::test_support::{test_state, test_state_with};
    use axum::http::StatusCode;
    use deck_core::ActivityStatus;
    use serde_json::json;

    #[tokio::test]
    async fn test_allowed_command() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let app = create_router(state.clone());

        let (status, body) = post(&app, "/api/terminal/execute", json!({"command": "ls -la"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], false);
        assert!(!body["output"].as_str().unwrap().is_empty());

        let recent = state.activity.recent(Some(1));
        assert_eq!(recent[0].status, ActivityStatus::Success);
    }

    #[tokio::test]
    async fn test_denied_command_returns_200() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let app = create_router(state.clone());

        let (status, body) = post(&app, "/api/terminal/execute", json!({"command": "rm -rf /"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], true);
        assert_eq!(
            body["output"],
            "Command 'rm -rf /' is forbidden for security reasons."
        );

        let recent = state.activity.recent(Some(1));
        assert_eq!(recent[0].status, ActivityStatus::Warning);
    }

    #[tokio::test]
    async fn test_metacharacters_denied() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(test_state(dir.path()));

        let (status, body) = post(
            &app,
            "/api/terminal/execute",
            json!({"command": "echo hi > /tmp/deck_out"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], true);
    }

    #[tokio::test]
    async fn test_empty_command_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let app = create_router(test_state(dir.path()));

        let (status, body) = post(&app, "/api/terminal/execute", json!({"command": "   "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, _) = post(&app, "/api/terminal/execute", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_timeout_is_408() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state_with(dir.path(), |key| match key {
            "DECK_ALLOWED_COMMANDS" => Some("sleep".to_string()),
            "DECK_COMMAND_TIMEOUT_SECS" => Some("1".to_string()),
            _ => None,
        });
        let app = create_router(state);

        let (status, body) = post(&app, "/api/terminal/execute", json!({"command": "sleep 5"})).await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(body["error"], true);
    }

    #[tokio::test]
    async fn test_missing_executable_is_500() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state_with(dir.path(), |key| {
            (key == "DECK_ALLOWED_COMMANDS").then(|| "deck_no_such_program".to_string())
        });
        let app = create_router(state);

        let (status, body) = post(
            &app,
            "/api/terminal/execute",
            json!({"command": "deck_no_such_program"}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], true);
    }
}
