use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::error::MonitorError;
use crate::status::{QueryError, StatusEntry};
use crate::subscriptions::SubscriptionChange;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ChangeBody {
    pub group: String,
    pub name: String,
    pub outcome: &'static str,
}

#[derive(Debug, Serialize)]
pub struct FlushBody {
    pub flushed: usize,
}

#[derive(Debug, Serialize)]
pub struct MonitoringBody {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct MonitoringRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct ResetBody {
    pub name: String,
    pub cleared: bool,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, error: impl ToString) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
        }),
    )
}

pub async fn get_status(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<Json<StatusEntry>, ApiError> {
    match state.monitor.request_status(&name).await {
        Ok(entry) => Ok(Json(entry)),
        Err(e @ QueryError::EmptyName) => Err(api_error(StatusCode::BAD_REQUEST, e)),
        Err(e @ QueryError::Closed) => Err(api_error(StatusCode::SERVICE_UNAVAILABLE, e)),
        Err(e) => Err(api_error(StatusCode::BAD_GATEWAY, e)),
    }
}

fn change_response(
    group: String,
    name: String,
    result: Result<SubscriptionChange, MonitorError>,
    success: StatusCode,
) -> Result<(StatusCode, Json<ChangeBody>), ApiError> {
    let change = result.map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
    let status = if change.is_change() {
        success
    } else if change == SubscriptionChange::NotFound {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    Ok((
        status,
        Json(ChangeBody {
            group,
            name,
            outcome: change.as_str(),
        }),
    ))
}

pub async fn add_subscription(
    State(state): State<AdminState>,
    Path((group, name)): Path<(String, String)>,
) -> Result<(StatusCode, Json<ChangeBody>), ApiError> {
    let result = state.monitor.add_subscription(&group, &name);
    change_response(group, name, result, StatusCode::CREATED)
}

pub async fn remove_subscription(
    State(state): State<AdminState>,
    Path((group, name)): Path<(String, String)>,
) -> Result<(StatusCode, Json<ChangeBody>), ApiError> {
    let result = state.monitor.remove_subscription(&group, &name);
    change_response(group, name, result, StatusCode::OK)
}

pub async fn get_subscriptions(
    State(state): State<AdminState>,
    Path(group): Path<String>,
) -> String {
    state.monitor.subscription_summary(&group)
}

pub async fn get_stats(State(state): State<AdminState>) -> String {
    state.monitor.statistics()
}

pub async fn get_member_health(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<String, ApiError> {
    state
        .monitor
        .member_health(&name)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))
}

pub async fn flush(State(state): State<AdminState>) -> Json<FlushBody> {
    Json(FlushBody {
        flushed: state.monitor.flush_pending().await,
    })
}

pub async fn reset_stats(State(state): State<AdminState>) -> StatusCode {
    state.monitor.reset_statistics();
    StatusCode::NO_CONTENT
}

pub async fn sync_group(State(state): State<AdminState>, Path(group): Path<String>) -> String {
    state.monitor.sync_group(&group).await
}

pub async fn reset_member(
    State(state): State<AdminState>,
    Path(name): Path<String>,
) -> Result<(StatusCode, Json<ResetBody>), ApiError> {
    let cleared = state
        .monitor
        .reset_member(&name)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
    let status = if cleared {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    Ok((
        status,
        Json(ResetBody {
            name: name.trim().to_string(),
            cleared,
        }),
    ))
}

pub async fn get_monitoring(State(state): State<AdminState>) -> Json<MonitoringBody> {
    Json(MonitoringBody {
        enabled: state.monitor.is_enabled(),
        previous: None,
    })
}

pub async fn set_monitoring(
    State(state): State<AdminState>,
    Json(request): Json<MonitoringRequest>,
) -> Json<MonitoringBody> {
    let previous = state.monitor.set_enabled(request.enabled);
    Json(MonitoringBody {
        enabled: request.enabled,
        previous: Some(previous),
    })
}
