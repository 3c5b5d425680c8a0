use std::fmt::Write;

use chrono::{Days, NaiveDate};
use taskboard_core::{Task, TaskStats, TaskStatus};

use super::views;
use crate::api::TaskApi;
use crate::store::TaskStore;

const OVERDUE_SHOWN: usize = 3;
const RECENT_SHOWN: usize = 5;

/// Figures shown on the dashboard, derived from the cached tasks and the server counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard<'a> {
    pub stats: TaskStats,
    pub due_today: usize,
    pub due_this_week: usize,
    /// Share of completed tasks, rounded to a whole percent.
    pub completion_rate: u64,
    pub overdue: Vec<&'a Task>,
    pub recent: Vec<&'a Task>,
}

impl<'a> Dashboard<'a> {
    pub fn build(tasks: &'a [Task], stats: TaskStats, today: NaiveDate) -> Self {
        let open = || {
            tasks
                .iter()
                .filter(|task| task.status != TaskStatus::Completed)
        };
        let week_end = today.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX);

        let due_today = open().filter(|task| task.deadline == today).count();
        let due_this_week = open()
            .filter(|task| task.deadline >= today && task.deadline <= week_end)
            .count();

        let completion_rate = if stats.total == 0 {
            0
        } else {
            (stats.completed * 100 + stats.total / 2) / stats.total
        };

        let overdue = tasks.iter().filter(|task| task.is_overdue(today)).collect();

        let mut recent: Vec<&Task> = tasks.iter().collect();
        recent.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        recent.truncate(RECENT_SHOWN);

        Self {
            stats,
            due_today,
            due_this_week,
            completion_rate,
            overdue,
            recent,
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", views::stats_summary(&self.stats));
        let _ = writeln!(
            out,
            "Due today: {}  Due this week: {}  Completion: {}%",
            self.due_today, self.due_this_week, self.completion_rate
        );

        if !self.overdue.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Overdue:");
            for task in self.overdue.iter().take(OVERDUE_SHOWN) {
                let _ = writeln!(out, "  {} (due {})", task.title, task.deadline);
            }
            if self.overdue.len() > OVERDUE_SHOWN {
                let _ = writeln!(out, "  +{} more", self.overdue.len() - OVERDUE_SHOWN);
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Recent tasks:");
        if self.recent.is_empty() {
            let _ = writeln!(out, "  none yet");
        }
        for task in &self.recent {
            let _ = writeln!(out, "  [{}] {}", task.status, task.title);
        }
        out
    }
}

/// Dashboard text plus a problem worth mentioning that did not stop rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub warning: Option<String>,
}

/// Loads the tasks and the counts, then renders the dashboard.
///
/// Failing to load the tasks is an error. Failing to load the counts is not: the last
/// known counts are shown and the failure comes back as a warning.
pub async fn load<A: TaskApi>(
    store: &mut TaskStore<A>,
    today: NaiveDate,
) -> anyhow::Result<Rendered> {
    store.fetch_tasks().await;
    if let Some(error) = &store.state().error {
        anyhow::bail!("{}", error);
    }

    store.fetch_task_stats().await;
    let state = store.state();
    Ok(Rendered {
        text: Dashboard::build(&state.tasks, state.task_stats, today).render(),
        warning: state.error.clone(),
    })
}
