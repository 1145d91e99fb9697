//! Handlers for the `/jobs` resource.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use jobdeck_core::job::CreateJob;
use jobdeck_core::listing::{JobFilter, SortDirection, SortKey};
use jobdeck_core::status::JobStatus;
use serde::Deserialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Optional listing parameters. Values are parsed leniently: statuses by
/// name or wire code, sort keys by name.
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<String>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub direction: Option<String>,
}

impl ListJobsQuery {
    fn into_filter(self) -> AppResult<JobFilter> {
        let direction = match self.direction.as_deref().map(str::trim) {
            None | Some("") => SortDirection::default(),
            Some(d) if d.eq_ignore_ascii_case("asc") => SortDirection::Asc,
            Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            Some(other) => {
                return Err(jobdeck_core::error::CoreError::Validation(format!(
                    "Unknown sort direction: {other}"
                ))
                .into())
            }
        };

        Ok(JobFilter {
            status: self.status.as_deref().map(str::parse::<JobStatus>).transpose()?,
            search: self.search.filter(|s| !s.trim().is_empty()),
            sort_by: self
                .sort_by
                .as_deref()
                .map(str::parse::<SortKey>)
                .transpose()?
                .unwrap_or_default(),
            direction,
        })
    }
}

// ---------------------------------------------------------------------------
// List / get
// ---------------------------------------------------------------------------

/// GET /api/v1/jobs
///
/// Without parameters returns every job in store order.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListJobsQuery>,
) -> AppResult<impl IntoResponse> {
    let unfiltered = params.status.is_none()
        && params.search.is_none()
        && params.sort_by.is_none()
        && params.direction.is_none();

    let jobs = state.jobs.list().await;
    let jobs = if unfiltered {
        jobs
    } else {
        params.into_filter()?.apply(&jobs)
    };

    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let job = state.jobs.get(&id).await?;
    Ok(Json(DataResponse { data: job }))
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Create a Pending job. Returns 201 with the created job; 400 when the
/// body is malformed or the name fails validation.
pub async fn create_job(
    State(state): State<AppState>,
    input: Result<Json<CreateJob>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = input?;
    let job = state.jobs.create(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

// ---------------------------------------------------------------------------
// Stop / restart
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs/{id}/stop
///
/// Allowed from InQueue or Running; 409 otherwise.
pub async fn stop_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.jobs.stop(&id).await?))
}

/// POST /api/v1/jobs/{id}/restart
///
/// Allowed from Failed or Stopped; 409 otherwise.
pub async fn restart_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    Ok(Json(state.jobs.restart(&id).await?))
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

/// DELETE /api/v1/jobs/{id}
///
/// Allowed from Completed, Failed or Stopped. Returns 204.
pub async fn delete_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    state.jobs.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/jobs/status/{status}
///
/// `status` is a wire code or status name. Only Completed, Failed and
/// Stopped may be bulk-deleted.
pub async fn delete_jobs_by_status(
    State(state): State<AppState>,
    Path(status): Path<String>,
) -> AppResult<impl IntoResponse> {
    let status: JobStatus = status.parse()?;
    let result = state.jobs.delete_by_status(status).await?;
    Ok(Json(DataResponse { data: result }))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::error::AppError;

    #[test]
    fn query_parses_names_and_codes() {
        let filter = ListJobsQuery {
            status: Some("2".into()),
            search: Some("  ".into()),
            sort_by: Some("progress".into()),
            direction: Some("ASC".into()),
        }
        .into_filter()
        .unwrap();

        assert_eq!(filter.status, Some(JobStatus::Running));
        assert_eq!(filter.search, None);
        assert_eq!(filter.sort_by, SortKey::Progress);
        assert_eq!(filter.direction, SortDirection::Asc);
    }

    #[test]
    fn unknown_direction_is_rejected() {
        let result = ListJobsQuery {
            direction: Some("sideways".into()),
            ..Default::default()
        }
        .into_filter();

        assert_matches!(result, Err(AppError::Core(_)));
    }
}
