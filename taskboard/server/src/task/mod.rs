use crate::entities::task::{TaskPriority, TaskStatus as TaskStatusColumn};
use crate::entities::*;
use chrono::{NaiveDate, Utc};
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::*;
use std::sync::Arc;
use taskboard_core::{
    NewTask, Priority, SortField, SortOrder, Task, TaskPatch, TaskQuery, TaskStats, TaskStatus,
};
use uuid::Uuid;

pub mod api;

/// Shared state for the task routes.
#[derive(Clone)]
pub struct TaskState {
    pub db: Arc<DatabaseConnection>,
}

/// Error type for TaskService operations.
#[derive(Debug, thiserror::Error)]
pub enum TaskServiceError {
    /// No task with this ID exists for the requesting user.
    #[error("Task with ID {0} not found")]
    TaskNotFound(String),
    #[error("{0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl From<TaskStatusColumn> for TaskStatus {
    fn from(status: TaskStatusColumn) -> Self {
        match status {
            TaskStatusColumn::Pending => TaskStatus::Pending,
            TaskStatusColumn::InProgress => TaskStatus::InProgress,
            TaskStatusColumn::Completed => TaskStatus::Completed,
        }
    }
}

impl From<TaskStatus> for TaskStatusColumn {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Pending => TaskStatusColumn::Pending,
            TaskStatus::InProgress => TaskStatusColumn::InProgress,
            TaskStatus::Completed => TaskStatusColumn::Completed,
        }
    }
}

impl From<TaskPriority> for Priority {
    fn from(priority: TaskPriority) -> Self {
        match priority {
            TaskPriority::Low => Priority::Low,
            TaskPriority::Medium => Priority::Medium,
            TaskPriority::High => Priority::High,
        }
    }
}

impl From<Priority> for TaskPriority {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Low => TaskPriority::Low,
            Priority::Medium => TaskPriority::Medium,
            Priority::High => TaskPriority::High,
        }
    }
}

impl From<task::Model> for Task {
    fn from(model: task::Model) -> Self {
        Task {
            id: model.id.to_string(),
            title: model.title,
            description: model.description,
            deadline: model.deadline,
            assigned_to: model.assigned_to,
            status: model.status.into(),
            priority: model.priority.into(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

fn sort_column(field: SortField) -> task::Column {
    match field {
        SortField::CreatedAt => task::Column::CreatedAt,
        SortField::UpdatedAt => task::Column::UpdatedAt,
        SortField::Deadline => task::Column::Deadline,
        SortField::Title => task::Column::Title,
        SortField::Priority => task::Column::Priority,
        SortField::Status => task::Column::Status,
    }
}

/// Escapes LIKE wildcards so the search term is matched literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn validate_title(title: &str) -> Result<String, TaskServiceError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(TaskServiceError::Validation("Title is required".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Invalid IDs can never match a stored task.
fn parse_task_id(id: &str) -> Result<Uuid, TaskServiceError> {
    Uuid::parse_str(id).map_err(|_| TaskServiceError::TaskNotFound(id.to_string()))
}

pub struct TaskService<'a> {
    db: &'a DatabaseConnection,
}

impl TaskService<'_> {
    pub fn new(db: &DatabaseConnection) -> TaskService<'_> {
        TaskService { db }
    }

    fn owned_by(owner: Uuid) -> Select<task::Entity> {
        task::Entity::find().filter(task::Column::UserId.eq(owner))
    }

    async fn find_owned(&self, owner: Uuid, id: &str) -> Result<task::Model, TaskServiceError> {
        let task_id = parse_task_id(id)?;
        Self::owned_by(owner)
            .filter(task::Column::Id.eq(task_id))
            .one(self.db)
            .await?
            .ok_or_else(|| TaskServiceError::TaskNotFound(id.to_string()))
    }

    /// Lists the owner's tasks matching the query, in the requested order.
    ///
    /// The search term matches title or description case-insensitively.
    #[tracing::instrument(skip(self))]
    pub async fn list_tasks(
        &self,
        owner: Uuid,
        query: &TaskQuery,
    ) -> Result<Vec<Task>, TaskServiceError> {
        let mut select = Self::owned_by(owner);

        let term = query.search_term.trim();
        if !term.is_empty() {
            let pattern = like_pattern(term);
            select = select.filter(
                Condition::any()
                    .add(Expr::col(task::Column::Title).ilike(pattern.clone()))
                    .add(Expr::col(task::Column::Description).ilike(pattern)),
            );
        }

        if let Some(status) = query.status {
            select = select.filter(task::Column::Status.eq(TaskStatusColumn::from(status)));
        }

        let order = match query.sort_order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        };
        let select = match query.sort_by {
            SortField::Title => select.order_by(
                SimpleExpr::from(Func::lower(Expr::col(task::Column::Title))),
                order.clone(),
            ),
            field => select.order_by(sort_column(field), order.clone()),
        };

        let tasks = select
            .order_by(task::Column::Id, order)
            .all(self.db)
            .await?
            .into_iter()
            .map(Task::from)
            .collect();
        Ok(tasks)
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_task(&self, owner: Uuid, id: &str) -> Result<Task, TaskServiceError> {
        Ok(Task::from(self.find_owned(owner, id).await?))
    }

    /// Creates a task owned by `owner`. Missing status and priority fall back to defaults.
    #[tracing::instrument(skip(self, new_task), fields(title = %new_task.title))]
    pub async fn create_task(
        &self,
        owner: Uuid,
        new_task: NewTask,
    ) -> Result<Task, TaskServiceError> {
        let title = validate_title(&new_task.title)?;
        let now = Utc::now();

        let active_model = task::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4()),
            user_id: ActiveValue::Set(owner),
            title: ActiveValue::Set(title),
            description: ActiveValue::Set(new_task.description),
            deadline: ActiveValue::Set(new_task.deadline),
            assigned_to: ActiveValue::Set(new_task.assigned_to),
            status: ActiveValue::Set(new_task.status.into()),
            priority: ActiveValue::Set(new_task.priority.into()),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
        };
        let created_model = active_model.insert(self.db).await?;
        tracing::info!("Created task {}", created_model.id);
        Ok(Task::from(created_model))
    }

    /// Applies the fields present in `patch` and bumps `updated_at`.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_task(
        &self,
        owner: Uuid,
        id: &str,
        patch: TaskPatch,
    ) -> Result<Task, TaskServiceError> {
        let existing = self.find_owned(owner, id).await?;
        let mut active_model: task::ActiveModel = existing.into();

        if let Some(title) = patch.title {
            active_model.title = ActiveValue::Set(validate_title(&title)?);
        }
        if let Some(description) = patch.description {
            active_model.description = ActiveValue::Set(description);
        }
        if let Some(deadline) = patch.deadline {
            active_model.deadline = ActiveValue::Set(deadline);
        }
        if let Some(assigned_to) = patch.assigned_to {
            active_model.assigned_to = ActiveValue::Set(assigned_to);
        }
        if let Some(status) = patch.status {
            active_model.status = ActiveValue::Set(status.into());
        }
        if let Some(priority) = patch.priority {
            active_model.priority = ActiveValue::Set(priority.into());
        }
        active_model.updated_at = ActiveValue::Set(Utc::now());

        let updated_model = active_model.update(self.db).await?;
        Ok(Task::from(updated_model))
    }

    /// Deletes a task and returns what was removed.
    #[tracing::instrument(skip(self))]
    pub async fn delete_task(&self, owner: Uuid, id: &str) -> Result<Task, TaskServiceError> {
        let existing = self.find_owned(owner, id).await?;
        let removed = Task::from(existing.clone());
        existing.delete(self.db).await?;
        tracing::info!("Deleted task {}", removed.id);
        Ok(removed)
    }

    /// Counts the owner's tasks by status. Overdue tasks have a deadline before
    /// `today` and are not completed.
    #[tracing::instrument(skip(self))]
    pub async fn task_stats(
        &self,
        owner: Uuid,
        today: NaiveDate,
    ) -> Result<TaskStats, TaskServiceError> {
        let total = Self::owned_by(owner).count(self.db).await?;
        let pending = self.count_with_status(owner, TaskStatus::Pending).await?;
        let in_progress = self.count_with_status(owner, TaskStatus::InProgress).await?;
        let completed = self.count_with_status(owner, TaskStatus::Completed).await?;
        let overdue = Self::owned_by(owner)
            .filter(task::Column::Deadline.lt(today))
            .filter(task::Column::Status.ne(TaskStatusColumn::Completed))
            .count(self.db)
            .await?;

        Ok(TaskStats {
            total,
            pending,
            in_progress,
            completed,
            overdue,
        })
    }

    async fn count_with_status(
        &self,
        owner: Uuid,
        status: TaskStatus,
    ) -> Result<u64, TaskServiceError> {
        let count = Self::owned_by(owner)
            .filter(task::Column::Status.eq(TaskStatusColumn::from(status)))
            .count(self.db)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("report"), "%report%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn blank_title_is_rejected() {
        let result = validate_title("   ");
        assert!(matches!(
            result,
            Err(TaskServiceError::Validation(message)) if message == "Title is required"
        ));
        assert_eq!(validate_title("  Ship it ").unwrap(), "Ship it");
    }

    #[test]
    fn malformed_id_is_reported_as_not_found() {
        assert!(matches!(
            parse_task_id("not-a-uuid"),
            Err(TaskServiceError::TaskNotFound(id)) if id == "not-a-uuid"
        ));
    }

    #[test]
    fn status_and_priority_convert_both_ways() {
        for status in TaskStatus::ALL {
            assert_eq!(TaskStatus::from(TaskStatusColumn::from(status)), status);
        }
        for priority in Priority::ALL {
            assert_eq!(Priority::from(TaskPriority::from(priority)), priority);
        }
    }
}
