use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
};

use crate::auth::AuthUser;
use crate::errors::ServiceError;
use crate::services::reports::{ReportOutput, ReportQuery};
use crate::{ApiResponse, AppState};

/// CSV reports download as attachments; JSON and chart payloads go out
/// in the standard envelope.
fn into_response(output: ReportOutput) -> Result<Response, ServiceError> {
    match output {
        ReportOutput::Json(value) => Ok(Json(ApiResponse::success(value)).into_response()),
        ReportOutput::Csv { filename, content } => {
            let disposition = format!("attachment; filename=\"{}\"", filename);
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                content,
            )
                .into_response())
        }
    }
}

pub async fn attendance_report(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ServiceError> {
    let output = state
        .services
        .reports
        .attendance_report(&auth_user, query)
        .await?;
    into_response(output)
}

pub async fn leave_report(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ServiceError> {
    let output = state.services.reports.leave_report(&auth_user, query).await?;
    into_response(output)
}

pub async fn payroll_report(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ServiceError> {
    let output = state
        .services
        .reports
        .payroll_report(&auth_user, query)
        .await?;
    into_response(output)
}

pub async fn project_report(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(query): Query<ReportQuery>,
) -> Result<Response, ServiceError> {
    let output = state
        .services
        .reports
        .project_report(&auth_user, query)
        .await?;
    into_response(output)
}
