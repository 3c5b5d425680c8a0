use std::sync::Arc;

use serde::{Deserialize, Serialize};
use taskboard_core::{
    NewTask, SortField, SortOrder, Task, TaskPatch, TaskQuery, TaskStats, TaskStatus,
};

use crate::api::TaskApi;
use crate::error::ApiError;
use crate::storage::{self, Storage};

/// Storage key for the persisted list preferences.
pub const PREFERENCES_KEY: &str = "tasks-storage";

/// Filter and sort choices remembered between sessions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskPreferences {
    pub search_term: String,
    pub status_filter: Option<TaskStatus>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskState {
    pub tasks: Vec<Task>,
    pub task_stats: TaskStats,
    pub current_task: Option<Task>,
    pub is_loading: bool,
    pub error: Option<String>,
    pub is_creating: bool,
    pub is_updating: bool,
    pub is_deleting: bool,
    pub search_term: String,
    pub status_filter: Option<TaskStatus>,
    pub sort_by: SortField,
    pub sort_order: SortOrder,
}

impl TaskState {
    fn with_preferences(preferences: TaskPreferences) -> Self {
        Self {
            search_term: preferences.search_term,
            status_filter: preferences.status_filter,
            sort_by: preferences.sort_by,
            sort_order: preferences.sort_order,
            ..Default::default()
        }
    }

    /// Criteria the next list request is made with.
    pub fn query(&self) -> TaskQuery {
        TaskQuery {
            search_term: self.search_term.clone(),
            status: self.status_filter,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
        }
    }

    pub fn preferences(&self) -> TaskPreferences {
        TaskPreferences {
            search_term: self.search_term.clone(),
            status_filter: self.status_filter,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
        }
    }
}

pub type Listener = Box<dyn FnMut(&TaskState) + Send>;

/// Client-side cache of the user's tasks.
///
/// Mutations are applied optimistically where possible and rolled back to the
/// exact prior list when the server rejects them. Listeners see every state change.
pub struct TaskStore<A> {
    api: A,
    storage: Arc<dyn Storage>,
    state: TaskState,
    listeners: Vec<Listener>,
}

impl<A: TaskApi> TaskStore<A> {
    /// Creates an empty store, restoring the saved list preferences.
    pub fn new(api: A, storage: Arc<dyn Storage>) -> Self {
        let preferences =
            storage::load::<TaskPreferences>(storage.as_ref(), PREFERENCES_KEY).unwrap_or_default();
        Self {
            api,
            storage,
            state: TaskState::with_preferences(preferences),
            listeners: Vec::new(),
        }
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    /// Registers a callback invoked after every state change.
    pub fn subscribe(&mut self, listener: impl FnMut(&TaskState) + Send + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&mut self) {
        for listener in self.listeners.iter_mut() {
            listener(&self.state);
        }
    }

    fn record_error(&mut self, action: &str, err: &ApiError) {
        tracing::error!("Failed to {}: {}", action, err);
        self.state.error = Some(err.to_string());
    }

    fn persist_preferences(&self) {
        let preferences = self.state.preferences();
        if let Err(err) = storage::save(self.storage.as_ref(), PREFERENCES_KEY, &preferences) {
            tracing::warn!("Failed to persist task preferences: {}", err);
        }
    }

    /// Replaces the list with the tasks matching the current criteria.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_tasks(&mut self) {
        self.state.is_loading = true;
        self.state.error = None;
        self.notify();

        let query = self.state.query();
        match self.api.list_tasks(&query).await {
            Ok(tasks) => self.state.tasks = tasks,
            Err(err) => {
                self.record_error("fetch tasks", &err);
                self.state.tasks.clear();
            }
        }

        self.state.is_loading = false;
        self.notify();
    }

    /// Reloads the counters. On failure the previous counters are kept.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_task_stats(&mut self) {
        match self.api.task_stats().await {
            Ok(stats) => self.state.task_stats = stats,
            Err(err) => self.record_error("fetch task stats", &err),
        }
        self.notify();
    }

    #[tracing::instrument(skip(self))]
    pub async fn fetch_task(&mut self, id: &str) {
        self.state.current_task = None;
        self.state.is_loading = true;
        self.state.error = None;
        self.notify();

        match self.api.get_task(id).await {
            Ok(task) => self.state.current_task = Some(task),
            Err(err) => self.record_error("fetch task", &err),
        }

        self.state.is_loading = false;
        self.notify();
    }

    /// Creates a task and puts it at the head of the list.
    #[tracing::instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create_task(&mut self, input: NewTask) -> Result<Task, ApiError> {
        self.state.is_creating = true;
        self.state.error = None;
        self.notify();

        let result = self.api.create_task(&input).await;
        match &result {
            Ok(task) => self.state.tasks.insert(0, task.clone()),
            Err(err) => self.record_error("create task", err),
        }
        self.state.is_creating = false;
        self.notify();

        if result.is_ok() {
            self.fetch_task_stats().await;
        }
        result
    }

    /// Applies the patch locally, then on the server. A rejected update restores the list.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_task(&mut self, id: &str, patch: TaskPatch) -> Result<Task, ApiError> {
        let snapshot = self.state.tasks.clone();
        if let Some(task) = self.state.tasks.iter_mut().find(|task| task.id == id) {
            task.apply(&patch);
        }
        self.state.is_updating = true;
        self.state.error = None;
        self.notify();

        let result = self.api.update_task(id, &patch).await;
        match &result {
            Ok(updated) => {
                if let Some(task) = self.state.tasks.iter_mut().find(|task| task.id == id) {
                    *task = updated.clone();
                }
                if self
                    .state
                    .current_task
                    .as_ref()
                    .is_some_and(|current| current.id == id)
                {
                    self.state.current_task = Some(updated.clone());
                }
            }
            Err(err) => {
                self.state.tasks = snapshot;
                self.record_error("update task", err);
            }
        }
        self.state.is_updating = false;
        self.notify();

        if result.is_ok() {
            self.fetch_task_stats().await;
        }
        result
    }

    /// Removes the task locally, then on the server. A rejected delete restores the list.
    #[tracing::instrument(skip(self))]
    pub async fn delete_task(&mut self, id: &str) -> Result<(), ApiError> {
        let snapshot = self.state.tasks.clone();
        self.state.tasks.retain(|task| task.id != id);
        self.state.is_deleting = true;
        self.state.error = None;
        self.notify();

        let result = self.api.delete_task(id).await;
        match &result {
            Ok(()) => {
                if self
                    .state
                    .current_task
                    .as_ref()
                    .is_some_and(|current| current.id == id)
                {
                    self.state.current_task = None;
                }
            }
            Err(err) => {
                self.state.tasks = snapshot;
                self.record_error("delete task", err);
            }
        }
        self.state.is_deleting = false;
        self.notify();

        if result.is_ok() {
            self.fetch_task_stats().await;
        }
        result
    }

    /// Updates the search term without fetching.
    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.state.search_term = term.into();
        self.persist_preferences();
        self.notify();
    }

    /// Changes the status filter and reloads the list. `None` shows every status.
    pub async fn set_status_filter(&mut self, status: Option<TaskStatus>) {
        self.state.status_filter = status;
        self.persist_preferences();
        self.fetch_tasks().await;
    }

    pub async fn set_sorting(&mut self, sort_by: SortField, sort_order: SortOrder) {
        self.state.sort_by = sort_by;
        self.state.sort_order = sort_order;
        self.persist_preferences();
        self.fetch_tasks().await;
    }

    pub fn clear_error(&mut self) {
        self.state.error = None;
        self.notify();
    }

    /// Tasks in the cache that match the current search and status criteria.
    pub fn filtered_tasks(&self) -> Vec<&Task> {
        let query = self.state.query();
        self.state
            .tasks
            .iter()
            .filter(|task| query.matches(task))
            .collect()
    }

    pub fn task_by_id(&self, id: &str) -> Option<&Task> {
        self.state.tasks.iter().find(|task| task.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockTaskApi;
    use crate::storage::MemoryStorage;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::sync::Mutex;
    use taskboard_core::Priority;

    fn task(id: &str, title: &str, status: TaskStatus) -> Task {
        let timestamp = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        Task {
            id: id.to_string(),
            title: title.to_string(),
            description: String::new(),
            deadline: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            assigned_to: String::new(),
            status,
            priority: Priority::Medium,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    fn store_with(api: MockTaskApi, tasks: Vec<Task>) -> TaskStore<MockTaskApi> {
        let mut store = TaskStore::new(api, Arc::new(MemoryStorage::new()));
        store.state.tasks = tasks;
        store
    }

    fn stats(total: u64) -> TaskStats {
        TaskStats {
            total,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_prepends_task_and_refreshes_stats_once() {
        let mut api = MockTaskApi::new();
        api.expect_create_task()
            .withf(|input: &NewTask| {
                input.title == "A"
                    && input.status == TaskStatus::Pending
                    && input.priority == Priority::Low
                    && input.assigned_to == "bob"
            })
            .times(1)
            .returning(|input| {
                let mut created = task("new", &input.title, input.status);
                created.priority = input.priority;
                created.assigned_to = input.assigned_to.clone();
                Ok(created)
            });
        api.expect_task_stats().times(1).returning(|| Ok(stats(1)));

        let mut store = store_with(api, Vec::new());
        let creating = Arc::new(Mutex::new(Vec::new()));
        let observed = creating.clone();
        store.subscribe(move |state| observed.lock().unwrap().push(state.is_creating));

        let input = NewTask {
            title: "A".to_string(),
            description: String::new(),
            deadline: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            assigned_to: "bob".to_string(),
            status: TaskStatus::Pending,
            priority: Priority::Low,
        };
        let created = store.create_task(input).await.unwrap();

        assert_eq!(store.state().tasks, vec![created]);
        assert_eq!(store.state().tasks[0].title, "A");
        assert_eq!(store.state().task_stats, stats(1));
        assert!(!store.state().is_creating);

        let transitions = creating.lock().unwrap().clone();
        assert_eq!(transitions.first(), Some(&true));
        assert_eq!(transitions.last(), Some(&false));
    }

    #[tokio::test]
    async fn create_lands_at_head_of_existing_list() {
        let mut api = MockTaskApi::new();
        api.expect_create_task()
            .returning(|input| Ok(task("2", &input.title, input.status)));
        api.expect_task_stats().times(1).returning(|| Ok(stats(2)));

        let mut store = store_with(api, vec![task("1", "Old", TaskStatus::Pending)]);
        let input = NewTask {
            title: "New".to_string(),
            description: String::new(),
            deadline: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            assigned_to: String::new(),
            status: TaskStatus::Pending,
            priority: Priority::Medium,
        };
        store.create_task(input).await.unwrap();

        let ids: Vec<_> = store.state().tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["2", "1"]);
    }

    #[tokio::test]
    async fn failed_create_leaves_list_untouched() {
        let mut api = MockTaskApi::new();
        api.expect_create_task().returning(|_| {
            Err(ApiError::Validation {
                status: 400,
                message: "Title is required".to_string(),
            })
        });
        api.expect_task_stats().never();

        let existing = vec![task("1", "Old", TaskStatus::Pending)];
        let mut store = store_with(api, existing.clone());
        let input = NewTask {
            title: String::new(),
            description: String::new(),
            deadline: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
            assigned_to: String::new(),
            status: TaskStatus::Pending,
            priority: Priority::Medium,
        };

        let result = store.create_task(input).await;

        assert!(result.is_err());
        assert_eq!(store.state().tasks, existing);
        assert_eq!(store.state().error.as_deref(), Some("Title is required"));
        assert!(!store.state().is_creating);
    }

    #[tokio::test]
    async fn update_applies_server_version() {
        let mut api = MockTaskApi::new();
        api.expect_update_task()
            .withf(|id: &str, patch: &TaskPatch| {
                id == "1" && patch.status == Some(TaskStatus::Completed)
            })
            .returning(|_, _| {
                let mut updated = task("1", "Old", TaskStatus::Completed);
                updated.updated_at = Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap();
                Ok(updated)
            });
        api.expect_task_stats().times(1).returning(|| Ok(stats(1)));

        let mut store = store_with(api, vec![task("1", "Old", TaskStatus::Pending)]);
        store.state.current_task = Some(task("1", "Old", TaskStatus::Pending));

        let patch = TaskPatch {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        let updated = store.update_task("1", patch).await.unwrap();

        assert_eq!(store.state().tasks, vec![updated.clone()]);
        assert_eq!(store.state().current_task, Some(updated));
        assert!(!store.state().is_updating);
    }

    #[tokio::test]
    async fn failed_update_restores_snapshot() {
        let mut api = MockTaskApi::new();
        api.expect_update_task()
            .returning(|_, _| Err(ApiError::Transport("offline".to_string())));
        api.expect_task_stats().never();

        let before = vec![
            task("1", "First", TaskStatus::Pending),
            task("2", "Second", TaskStatus::InProgress),
        ];
        let mut store = store_with(api, before.clone());
        let optimistic = Arc::new(Mutex::new(Vec::new()));
        let observed = optimistic.clone();
        store.subscribe(move |state| observed.lock().unwrap().push(state.tasks.clone()));

        let patch = TaskPatch {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        let result = store.update_task("2", patch).await;

        assert!(result.is_err());
        assert_eq!(store.state().tasks, before);
        assert_eq!(store.state().error.as_deref(), Some("offline"));
        // The patch was visible while the request was in flight
        assert_eq!(optimistic.lock().unwrap()[0][1].title, "Renamed");
    }

    #[tokio::test]
    async fn delete_removes_task_and_clears_current() {
        let mut api = MockTaskApi::new();
        api.expect_delete_task()
            .withf(|id: &str| id == "1")
            .times(1)
            .returning(|_| Ok(()));
        api.expect_task_stats().times(1).returning(|| Ok(stats(1)));

        let mut store = store_with(
            api,
            vec![
                task("1", "First", TaskStatus::Pending),
                task("2", "Second", TaskStatus::Pending),
            ],
        );
        store.state.current_task = Some(task("1", "First", TaskStatus::Pending));

        store.delete_task("1").await.unwrap();

        let ids: Vec<_> = store.state().tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["2"]);
        assert_eq!(store.state().current_task, None);
    }

    #[tokio::test]
    async fn failed_delete_restores_original_order() {
        let mut api = MockTaskApi::new();
        api.expect_delete_task()
            .returning(|_| Err(ApiError::Transport("offline".to_string())));
        api.expect_task_stats().never();

        let before = vec![
            task("1", "First", TaskStatus::Pending),
            task("2", "Second", TaskStatus::Pending),
            task("3", "Third", TaskStatus::Pending),
        ];
        let mut store = store_with(api, before.clone());

        let result = store.delete_task("2").await;

        assert_eq!(result, Err(ApiError::Transport("offline".to_string())));
        assert_eq!(store.state().tasks, before);
        assert!(store.state().error.is_some());
        assert!(!store.state().is_deleting);
    }

    #[tokio::test]
    async fn failed_delete_of_only_task_reverts_list() {
        let mut api = MockTaskApi::new();
        api.expect_delete_task()
            .returning(|_| Err(ApiError::Transport("offline".to_string())));

        let task_x = task("x", "TaskX", TaskStatus::Pending);
        let mut store = store_with(api, vec![task_x.clone()]);

        assert!(store.delete_task("x").await.is_err());
        assert_eq!(store.state().tasks, vec![task_x]);
        assert!(store.state().error.is_some());
    }

    #[tokio::test]
    async fn status_filter_refetches_with_criteria() {
        let mut api = MockTaskApi::new();
        api.expect_list_tasks()
            .withf(|query: &TaskQuery| query.status == Some(TaskStatus::Completed))
            .times(1)
            .returning(|_| Ok(vec![task("2", "Done", TaskStatus::Completed)]));
        api.expect_list_tasks()
            .withf(|query: &TaskQuery| query.status.is_none())
            .times(1)
            .returning(|_| {
                Ok(vec![
                    task("1", "Open", TaskStatus::Pending),
                    task("2", "Done", TaskStatus::Completed),
                ])
            });

        let mut store = store_with(api, Vec::new());

        store.set_status_filter(Some(TaskStatus::Completed)).await;
        assert!(
            store
                .state()
                .tasks
                .iter()
                .all(|task| task.status == TaskStatus::Completed)
        );

        store.set_status_filter(None).await;
        assert_eq!(store.state().tasks.len(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_empties_list() {
        let mut api = MockTaskApi::new();
        api.expect_list_tasks()
            .returning(|_| Err(ApiError::Transport("offline".to_string())));

        let mut store = store_with(api, vec![task("1", "Stale", TaskStatus::Pending)]);
        store.fetch_tasks().await;

        assert!(store.state().tasks.is_empty());
        assert_eq!(store.state().error.as_deref(), Some("offline"));
        assert!(!store.state().is_loading);
    }

    #[tokio::test]
    async fn failed_stats_keep_previous_counts() {
        let mut api = MockTaskApi::new();
        api.expect_task_stats()
            .returning(|| Err(ApiError::Transport("offline".to_string())));

        let mut store = store_with(api, Vec::new());
        store.state.task_stats = stats(7);
        store.fetch_task_stats().await;

        assert_eq!(store.state().task_stats, stats(7));
        assert!(store.state().error.is_some());
    }

    #[tokio::test]
    async fn fetch_task_sets_current_or_error() {
        let mut api = MockTaskApi::new();
        api.expect_get_task()
            .withf(|id: &str| id == "1")
            .returning(|_| Ok(task("1", "Found", TaskStatus::Pending)));
        api.expect_get_task()
            .withf(|id: &str| id == "missing")
            .returning(|_| Err(ApiError::NotFound("Task not found".to_string())));

        let mut store = store_with(api, Vec::new());

        store.fetch_task("1").await;
        assert_eq!(
            store.state().current_task.as_ref().map(|t| t.title.as_str()),
            Some("Found")
        );

        store.fetch_task("missing").await;
        assert_eq!(store.state().current_task, None);
        assert_eq!(store.state().error.as_deref(), Some("Task not found"));
    }

    #[tokio::test]
    async fn search_term_does_not_fetch_and_filters_locally() {
        let mut api = MockTaskApi::new();
        api.expect_list_tasks().never();

        let mut store = store_with(
            api,
            vec![
                task("1", "Write report", TaskStatus::Pending),
                task("2", "Plan sprint", TaskStatus::Pending),
            ],
        );
        store.set_search_term("REPORT");

        let titles: Vec<_> = store
            .filtered_tasks()
            .iter()
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(titles, ["Write report"]);
        assert_eq!(store.task_by_id("2").map(|t| t.title.as_str()), Some("Plan sprint"));
    }

    #[tokio::test]
    async fn padded_search_keeps_tasks_the_server_returned() {
        let mut api = MockTaskApi::new();
        api.expect_list_tasks()
            .withf(|query: &TaskQuery| query.search_term == " report ")
            .returning(|_| Ok(vec![task("1", "Reporting", TaskStatus::Pending)]));

        let mut store = store_with(api, Vec::new());
        store.set_search_term(" report ");
        store.fetch_tasks().await;

        let titles: Vec<_> = store
            .filtered_tasks()
            .iter()
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(titles, ["Reporting"]);

        store.set_search_term("   ");
        assert_eq!(store.filtered_tasks().len(), 1);
    }

    #[tokio::test]
    async fn preferences_persist_across_stores() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut api = MockTaskApi::new();
        api.expect_list_tasks().returning(|_| Ok(Vec::new()));

        let mut store = TaskStore::new(api, storage.clone());
        store.set_search_term("report");
        store.set_sorting(SortField::Deadline, SortOrder::Asc).await;

        let restored = TaskStore::new(MockTaskApi::new(), storage);
        assert_eq!(
            restored.state().preferences(),
            TaskPreferences {
                search_term: "report".to_string(),
                status_filter: None,
                sort_by: SortField::Deadline,
                sort_order: SortOrder::Asc,
            }
        );
        assert!(restored.state().tasks.is_empty());
    }

    #[test]
    fn preferences_are_stored_with_camel_case_keys() {
        let preferences = TaskPreferences {
            search_term: "report".to_string(),
            status_filter: Some(TaskStatus::InProgress),
            sort_by: SortField::Deadline,
            sort_order: SortOrder::Asc,
        };
        insta::assert_json_snapshot!(preferences, @r#"
        {
          "searchTerm": "report",
          "statusFilter": "in-progress",
          "sortBy": "deadline",
          "sortOrder": "asc"
        }
        "#);
    }

    #[test]
    fn clear_error_resets_message() {
        let mut store = store_with(MockTaskApi::new(), Vec::new());
        store.state.error = Some("boom".to_string());

        store.clear_error();

        assert_eq!(store.state().error, None);
    }
}
