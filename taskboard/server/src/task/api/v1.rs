use crate::auth::CurrentUser;
use crate::task::{TaskService, TaskState};
use crate::web::api::{ApiError, ErrorResponse};
use axum::{
    Extension, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;
use taskboard_core::{NewTask, Task, TaskPatch, TaskQuery, TaskStats};
use utoipa::IntoParams;

/// Query parameters accepted by the task listing.
///
/// Values arrive as plain strings so that an empty or `all` status means no filter
/// and unknown values produce a validation error instead of a rejected request.
#[derive(Debug, Deserialize, Default, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListTasksParams {
    /// Case-insensitive text matched against title and description
    search_term: Option<String>,
    /// One of `pending`, `in-progress` or `completed`
    status: Option<String>,
    /// Field to sort by, defaults to `createdAt`
    sort_by: Option<String>,
    /// `asc` or `desc`, defaults to `desc`
    sort_order: Option<String>,
}

impl ListTasksParams {
    fn into_query(self) -> Result<TaskQuery, ApiError> {
        let invalid = |e: taskboard_core::ParseError| ApiError::Validation(e.to_string());

        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") | Some("all") => None,
            Some(value) => Some(value.parse().map_err(invalid)?),
        };
        let sort_by = match self.sort_by.as_deref() {
            None | Some("") => Default::default(),
            Some(value) => value.parse().map_err(invalid)?,
        };
        let sort_order = match self.sort_order.as_deref() {
            None | Some("") => Default::default(),
            Some(value) => value.parse().map_err(invalid)?,
        };

        Ok(TaskQuery {
            search_term: self.search_term.unwrap_or_default(),
            status,
            sort_by,
            sort_order,
        })
    }
}

/// Handler for GET /api/tasks - Lists the caller's tasks.
#[tracing::instrument(skip(state, current_user), fields(user_id = %current_user.id))]
#[utoipa::path(
    get,
    path = "/api/tasks",
    params(ListTasksParams),
    responses(
        (status = 200, description = "Tasks matching the query", body = Vec<Task>),
        (status = 400, description = "Unknown filter or sort value", body = ErrorResponse),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn list_tasks_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Query(params): Query<ListTasksParams>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let query = params.into_query()?;
    let tasks = TaskService::new(&state.db)
        .list_tasks(current_user.id, &query)
        .await?;
    Ok(Json(tasks))
}

/// Handler for GET /api/tasks/stats - Counts the caller's tasks by status.
#[tracing::instrument(skip(state, current_user), fields(user_id = %current_user.id))]
#[utoipa::path(
    get,
    path = "/api/tasks/stats",
    responses(
        (status = 200, description = "Task counters", body = TaskStats),
        (status = 401, description = "Missing or invalid access token", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn task_stats_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
) -> Result<Json<TaskStats>, ApiError> {
    let today = chrono::Utc::now().date_naive();
    let stats = TaskService::new(&state.db)
        .task_stats(current_user.id, today)
        .await?;
    Ok(Json(stats))
}

/// Handler for GET /api/tasks/{id}
#[tracing::instrument(skip(state, current_user), fields(user_id = %current_user.id))]
#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    params(("id" = String, Path, description = "Task identifier")),
    responses(
        (status = 200, description = "The task", body = Task),
        (status = 404, description = "Task not found", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn get_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    let task = TaskService::new(&state.db)
        .get_task(current_user.id, &id)
        .await?;
    Ok(Json(task))
}

/// Handler for POST /api/tasks
#[tracing::instrument(skip(state, current_user, new_task), fields(user_id = %current_user.id))]
#[utoipa::path(
    post,
    path = "/api/tasks",
    request_body = NewTask,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 400, description = "Invalid task", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn create_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Json(new_task): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let task = TaskService::new(&state.db)
        .create_task(current_user.id, new_task)
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// Handler for PUT and PATCH /api/tasks/{id} - Applies the fields present in the body.
#[tracing::instrument(skip(state, current_user, patch), fields(user_id = %current_user.id))]
#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    params(("id" = String, Path, description = "Task identifier")),
    request_body = TaskPatch,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 400, description = "Invalid task", body = ErrorResponse),
        (status = 404, description = "Task not found", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn update_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(patch): Json<TaskPatch>,
) -> Result<Json<Task>, ApiError> {
    let task = TaskService::new(&state.db)
        .update_task(current_user.id, &id, patch)
        .await?;
    Ok(Json(task))
}

/// Handler for DELETE /api/tasks/{id}
#[tracing::instrument(skip(state, current_user), fields(user_id = %current_user.id))]
#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    params(("id" = String, Path, description = "Task identifier")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "Task not found", body = ErrorResponse)
    ),
    security(("bearer" = [])),
    tag = "Tasks"
)]
pub async fn delete_task_handler(
    State(state): State<Arc<TaskState>>,
    Extension(current_user): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    TaskService::new(&state.db)
        .delete_task(current_user.id, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Creates the task routes. Every route expects a `CurrentUser` extension.
pub fn create_api_router(state: Arc<TaskState>) -> Router {
    Router::new()
        .route("/tasks", get(list_tasks_handler).post(create_task_handler))
        .route("/tasks/stats", get(task_stats_handler))
        .route(
            "/tasks/{id}",
            get(get_task_handler)
                .put(update_task_handler)
                .patch(update_task_handler)
                .delete(delete_task_handler),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_core::{SortField, SortOrder, TaskStatus};

    #[test]
    fn missing_params_use_defaults() {
        let query = ListTasksParams::default().into_query().unwrap();
        assert_eq!(query, TaskQuery::default());
        assert_eq!(query.sort_by, SortField::CreatedAt);
        assert_eq!(query.sort_order, SortOrder::Desc);
    }

    #[test]
    fn empty_or_all_status_means_no_filter() {
        for status in ["", "all"] {
            let params = ListTasksParams {
                status: Some(status.to_string()),
                ..Default::default()
            };
            assert_eq!(params.into_query().unwrap().status, None);
        }
    }

    #[test]
    fn parses_filter_and_sort() {
        let params = ListTasksParams {
            search_term: Some("report".to_string()),
            status: Some("in-progress".to_string()),
            sort_by: Some("deadline".to_string()),
            sort_order: Some("asc".to_string()),
        };
        let query = params.into_query().unwrap();
        assert_eq!(query.search_term, "report");
        assert_eq!(query.status, Some(TaskStatus::InProgress));
        assert_eq!(query.sort_by, SortField::Deadline);
        assert_eq!(query.sort_order, SortOrder::Asc);
    }

    #[test]
    fn unknown_sort_field_is_a_validation_error() {
        let params = ListTasksParams {
            sort_by: Some("colour".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            params.into_query(),
            Err(ApiError::Validation(message)) if message.contains("colour")
        ));
    }
}
