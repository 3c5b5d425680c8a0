use chrono::NaiveDate;
use taskboard_core::{NewTask, Priority, TaskPatch, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("Title is required")]
    TitleRequired,
    #[error("Deadline is required")]
    DeadlineRequired,
    #[error("Nothing to update")]
    NothingToUpdate,
}

/// Input for a new task as entered by the user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub deadline: Option<NaiveDate>,
    pub assigned_to: String,
    pub status: TaskStatus,
    pub priority: Priority,
}

impl TaskForm {
    /// Checks the input before anything is sent. The title is trimmed.
    pub fn validate(&self) -> Result<NewTask, FormError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(FormError::TitleRequired);
        }
        let deadline = self.deadline.ok_or(FormError::DeadlineRequired)?;

        Ok(NewTask {
            title: title.to_string(),
            description: self.description.trim().to_string(),
            deadline,
            assigned_to: self.assigned_to.trim().to_string(),
            status: self.status,
            priority: self.priority,
        })
    }
}

/// Changes to an existing task. Fields left as `None` stay as they are.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskEditForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<NaiveDate>,
    pub assigned_to: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
}

impl TaskEditForm {
    pub fn validate(&self) -> Result<TaskPatch, FormError> {
        let title = match &self.title {
            Some(title) if title.trim().is_empty() => return Err(FormError::TitleRequired),
            Some(title) => Some(title.trim().to_string()),
            None => None,
        };

        let patch = TaskPatch {
            title,
            description: self.description.clone(),
            deadline: self.deadline,
            assigned_to: self.assigned_to.clone(),
            status: self.status,
            priority: self.priority,
        };
        if patch.is_empty() {
            return Err(FormError::NothingToUpdate);
        }
        Ok(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(title: &str) -> TaskForm {
        TaskForm {
            title: title.to_string(),
            deadline: NaiveDate::from_ymd_opt(2025, 3, 1),
            ..Default::default()
        }
    }

    #[test]
    fn rejects_blank_title() {
        assert_eq!(form("").validate(), Err(FormError::TitleRequired));
        assert_eq!(form("   ").validate(), Err(FormError::TitleRequired));
        assert_eq!(FormError::TitleRequired.to_string(), "Title is required");
    }

    #[test]
    fn requires_deadline() {
        let mut input = form("Write report");
        input.deadline = None;
        assert_eq!(input.validate(), Err(FormError::DeadlineRequired));
    }

    #[test]
    fn trims_title_and_keeps_choices() {
        let mut input = form("  Write report ");
        input.priority = Priority::High;
        input.status = TaskStatus::InProgress;

        let task = input.validate().unwrap();

        assert_eq!(task.title, "Write report");
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.status, TaskStatus::InProgress);
    }

    #[test]
    fn edit_form_builds_partial_patch() {
        let edit = TaskEditForm {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        assert_eq!(
            edit.validate(),
            Ok(TaskPatch {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            })
        );
    }

    #[test]
    fn edit_form_rejects_blank_title_and_empty_edit() {
        let edit = TaskEditForm {
            title: Some(" ".to_string()),
            ..Default::default()
        };
        assert_eq!(edit.validate(), Err(FormError::TitleRequired));
        assert_eq!(
            TaskEditForm::default().validate(),
            Err(FormError::NothingToUpdate)
        );
    }
}
