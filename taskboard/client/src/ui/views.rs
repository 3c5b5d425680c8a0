use std::fmt::Write;

use taskboard_core::{Task, TaskStats};

const TITLE_WIDTH: usize = 32;

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut shortened: String = text.chars().take(width - 3).collect();
    shortened.push_str("...");
    shortened
}

/// Renders tasks as an aligned table, one row per task.
pub fn task_table(tasks: &[&Task]) -> String {
    if tasks.is_empty() {
        return "No tasks found.\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<36}  {:<TITLE_WIDTH$}  {:<11}  {:<8}  {:<10}  ASSIGNEE",
        "ID", "TITLE", "STATUS", "PRIORITY", "DEADLINE"
    );
    for task in tasks {
        let _ = writeln!(
            out,
            "{:<36}  {:<TITLE_WIDTH$}  {:<11}  {:<8}  {:<10}  {}",
            task.id,
            truncate(&task.title, TITLE_WIDTH),
            task.status.as_str(),
            task.priority.as_str(),
            task.deadline.to_string(),
            task.assigned_to
        );
    }
    out
}

pub fn task_detail(task: &Task) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", task.title);
    let _ = writeln!(out, "  id:          {}", task.id);
    let _ = writeln!(out, "  status:      {}", task.status);
    let _ = writeln!(out, "  priority:    {}", task.priority);
    let _ = writeln!(out, "  deadline:    {}", task.deadline);
    if !task.assigned_to.is_empty() {
        let _ = writeln!(out, "  assigned to: {}", task.assigned_to);
    }
    let _ = writeln!(out, "  created:     {}", task.created_at.format("%Y-%m-%d %H:%M"));
    let _ = writeln!(out, "  updated:     {}", task.updated_at.format("%Y-%m-%d %H:%M"));
    if !task.description.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", task.description);
    }
    out
}

pub fn stats_summary(stats: &TaskStats) -> String {
    format!(
        "Total: {}  Pending: {}  In progress: {}  Completed: {}  Overdue: {}",
        stats.total, stats.pending, stats.in_progress, stats.completed, stats.overdue
    )
}
