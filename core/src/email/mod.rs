//! Notification emails rendered to subject + HTML.
//!
//! # Design
//! The branching (urgency wording, completion rate, badge colours, list
//! truncation) lives in plain functions here so it can be tested without
//! parsing HTML. Markup lives in Tera templates compiled into the binary;
//! they use the `.html` extension so every interpolated value is escaped.
//! Delivery is the caller's business.

use chrono::Datelike;
use serde::Serialize;
use tera::{Context, Tera};
use thiserror::Error;

/// Todos listed per weekly report section before "... and N more".
pub const REPORT_LIST_LIMIT: usize = 5;

const BASE: &str = "base.html";
const DUE_DATE_REMINDER: &str = "due_date_reminder.html";
const OVERDUE_NOTIFICATION: &str = "overdue_notification.html";
const WEEKLY_REPORT: &str = "weekly_report.html";
const WELCOME: &str = "welcome.html";

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("failed to load email templates: {0}")]
    Templates(#[source] tera::Error),
    #[error("failed to render {template}: {source}")]
    Render {
        template: &'static str,
        #[source]
        source: tera::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

// ---------------------------------------------------------------------------
// Inputs
// ---------------------------------------------------------------------------

/// Dates are pre-formatted by the caller for the recipient's locale.
#[derive(Debug, Clone)]
pub struct DueDateReminder {
    pub todo_title: String,
    pub todo_id: String,
    pub due_date: String,
    pub days_until_due: i64,
}

#[derive(Debug, Clone)]
pub struct OverdueNotification {
    pub todo_title: String,
    pub todo_id: String,
    pub due_date: String,
    pub days_overdue: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportTodo {
    pub id: String,
    pub title: String,
    pub priority: String,
    pub due_date: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WeeklyReport {
    pub week_start: String,
    pub week_end: String,
    pub completed_count: u64,
    pub active_count: u64,
    pub overdue_count: u64,
    pub completed_todos: Vec<ReportTodo>,
    pub overdue_todos: Vec<ReportTodo>,
}

#[derive(Debug, Clone)]
pub struct Welcome {
    pub user_first_name: String,
}

// ---------------------------------------------------------------------------
// Branch logic
// ---------------------------------------------------------------------------

pub fn urgency_message(days_until_due: i64) -> String {
    if days_until_due <= 1 {
        "due tomorrow".to_string()
    } else {
        format!("due in {days_until_due} days")
    }
}

pub fn urgency_color(days_until_due: i64) -> &'static str {
    if days_until_due <= 1 {
        "#dc2626"
    } else {
        "#ea580c"
    }
}

pub fn overdue_message(days_overdue: i64) -> String {
    if days_overdue == 1 {
        "1 day overdue".to_string()
    } else {
        format!("{days_overdue} days overdue")
    }
}

/// Percentage of completed todos, rounded half away from zero. Zero when
/// there is nothing to count.
pub fn completion_rate(completed: u64, active: u64, overdue: u64) -> u64 {
    let total = completed + active + overdue;
    if total == 0 {
        return 0;
    }
    (completed as f64 / total as f64 * 100.0).round() as u64
}

pub fn motivational_message(rate: u64) -> &'static str {
    match rate {
        80.. => "🌟 Outstanding work this week!",
        60.. => "👍 Great progress this week!",
        40.. => "💪 Keep pushing forward!",
        _ => "🎯 Let's focus on the priorities ahead!",
    }
}

fn progress_color(rate: u64) -> &'static str {
    match rate {
        80.. => "#22c55e",
        60.. => "#3b82f6",
        40.. => "#eab308",
        _ => "#ef4444",
    }
}

fn productivity_tip(rate: u64, overdue: u64) -> &'static str {
    if rate >= 80 {
        "You're on fire! Keep up this momentum by planning next week's priorities."
    } else if rate >= 60 {
        "Good progress! Try time-blocking your most important tasks for better focus."
    } else if overdue > 0 {
        "Focus on clearing overdue items first, then plan realistic due dates for new tasks."
    } else {
        "Start your week by identifying 3 key priorities and tackle them first."
    }
}

/// Background and text colour of a priority badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BadgeColors {
    pub background: &'static str,
    pub text: &'static str,
}

pub fn priority_badge(priority: &str) -> BadgeColors {
    let (background, text) = match priority.to_ascii_lowercase().as_str() {
        "high" => ("#fee2e2", "#991b1b"),
        "medium" => ("#fef9c3", "#854d0e"),
        "low" => ("#dcfce7", "#166534"),
        _ => ("#f3f4f6", "#1f2937"),
    };
    BadgeColors { background, text }
}

#[derive(Debug, Serialize)]
struct ReportRow<'a> {
    title: &'a str,
    priority: &'a str,
    due_date: Option<&'a str>,
    badge_background: &'static str,
    badge_text: &'static str,
}

/// First `REPORT_LIST_LIMIT` rows plus the count left out.
fn truncate(todos: &[ReportTodo]) -> (Vec<ReportRow<'_>>, usize) {
    let rows = todos
        .iter()
        .take(REPORT_LIST_LIMIT)
        .map(|todo| {
            let badge = priority_badge(&todo.priority);
            ReportRow {
                title: &todo.title,
                priority: &todo.priority,
                due_date: todo.due_date.as_deref(),
                badge_background: badge.background,
                badge_text: badge.text,
            }
        })
        .collect();
    (rows, todos.len().saturating_sub(REPORT_LIST_LIMIT))
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Compiled templates plus the app URL used for links and the logo.
pub struct EmailRenderer {
    tera: Tera,
    app_url: String,
}

impl EmailRenderer {
    pub fn new(app_url: &str) -> Result<Self, EmailError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (BASE, include_str!("templates/base.html")),
            (DUE_DATE_REMINDER, include_str!("templates/due_date_reminder.html")),
            (OVERDUE_NOTIFICATION, include_str!("templates/overdue_notification.html")),
            (WEEKLY_REPORT, include_str!("templates/weekly_report.html")),
            (WELCOME, include_str!("templates/welcome.html")),
        ])
        .map_err(EmailError::Templates)?;
        Ok(Self {
            tera,
            app_url: app_url.trim_end_matches('/').to_string(),
        })
    }

    fn context(&self) -> Context {
        let mut context = Context::new();
        context.insert("app_url", &self.app_url);
        context.insert("year", &chrono::Utc::now().year());
        context
    }

    fn render(&self, template: &'static str, context: &Context) -> Result<String, EmailError> {
        self.tera
            .render(template, context)
            .map_err(|source| EmailError::Render { template, source })
    }

    pub fn due_date_reminder(&self, input: &DueDateReminder) -> Result<RenderedEmail, EmailError> {
        let urgency = urgency_message(input.days_until_due);
        let mut context = self.context();
        context.insert("todo_title", &input.todo_title);
        context.insert("todo_id", &input.todo_id);
        context.insert("due_date", &input.due_date);
        context.insert("urgency_message", &urgency);
        context.insert("urgency_color", urgency_color(input.days_until_due));

        Ok(RenderedEmail {
            subject: format!("Reminder: \"{}\" is {urgency}", input.todo_title),
            html: self.render(DUE_DATE_REMINDER, &context)?,
        })
    }

    pub fn overdue_notification(
        &self,
        input: &OverdueNotification,
    ) -> Result<RenderedEmail, EmailError> {
        let mut context = self.context();
        context.insert("todo_title", &input.todo_title);
        context.insert("todo_id", &input.todo_id);
        context.insert("due_date", &input.due_date);
        context.insert("overdue_message", &overdue_message(input.days_overdue));

        Ok(RenderedEmail {
            subject: format!("Overdue: \"{}\" needs your attention", input.todo_title),
            html: self.render(OVERDUE_NOTIFICATION, &context)?,
        })
    }

    pub fn weekly_report(&self, input: &WeeklyReport) -> Result<RenderedEmail, EmailError> {
        let rate = completion_rate(input.completed_count, input.active_count, input.overdue_count);
        let (completed, completed_more) = truncate(&input.completed_todos);
        let (overdue, overdue_more) = truncate(&input.overdue_todos);

        let mut context = self.context();
        context.insert("week_start", &input.week_start);
        context.insert("week_end", &input.week_end);
        context.insert("completed_count", &input.completed_count);
        context.insert("active_count", &input.active_count);
        context.insert("overdue_count", &input.overdue_count);
        context.insert("completion_rate", &rate);
        context.insert("motivational_message", motivational_message(rate));
        context.insert("progress_color", progress_color(rate));
        context.insert("tip", productivity_tip(rate, input.overdue_count));
        context.insert("has_completed", &!completed.is_empty());
        context.insert("has_overdue", &!overdue.is_empty());
        context.insert("completed", &completed);
        context.insert("completed_more", &completed_more);
        context.insert("overdue", &overdue);
        context.insert("overdue_more", &overdue_more);

        Ok(RenderedEmail {
            subject: format!(
                "Your Weekly Productivity Report ({} - {})",
                input.week_start, input.week_end
            ),
            html: self.render(WEEKLY_REPORT, &context)?,
        })
    }

    pub fn welcome(&self, input: &Welcome) -> Result<RenderedEmail, EmailError> {
        let mut context = self.context();
        context.insert("user_first_name", &input.user_first_name);
        Ok(RenderedEmail {
            subject: "Welcome to Tasker".to_string(),
            html: self.render(WELCOME, &context)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> EmailRenderer {
        EmailRenderer::new("https://app.tasker.dev/").unwrap()
    }

    fn report_todo(n: usize, priority: &str) -> ReportTodo {
        ReportTodo {
            id: n.to_string(),
            title: format!("Task {n}"),
            priority: priority.to_string(),
            due_date: None,
        }
    }

    #[test]
    fn urgency_wording() {
        assert_eq!(urgency_message(0), "due tomorrow");
        assert_eq!(urgency_message(1), "due tomorrow");
        assert_eq!(urgency_message(3), "due in 3 days");
        assert_ne!(urgency_color(1), urgency_color(2));
    }

    #[test]
    fn overdue_wording() {
        assert_eq!(overdue_message(1), "1 day overdue");
        assert_eq!(overdue_message(4), "4 days overdue");
    }

    #[test]
    fn completion_rate_rounds() {
        assert_eq!(completion_rate(0, 0, 0), 0);
        assert_eq!(completion_rate(8, 12, 3), 35);
        assert_eq!(completion_rate(1, 1, 0), 50);
        assert_eq!(completion_rate(2, 1, 0), 67);
        assert_eq!(completion_rate(5, 0, 0), 100);
    }

    #[test]
    fn motivational_thresholds() {
        assert_eq!(motivational_message(80), "🌟 Outstanding work this week!");
        assert_eq!(motivational_message(79), "👍 Great progress this week!");
        assert_eq!(motivational_message(60), "👍 Great progress this week!");
        assert_eq!(motivational_message(40), "💪 Keep pushing forward!");
        assert_eq!(motivational_message(39), "🎯 Let's focus on the priorities ahead!");
    }

    #[test]
    fn badge_colors_by_priority() {
        assert_eq!(priority_badge("HIGH"), priority_badge("high"));
        assert_ne!(priority_badge("high"), priority_badge("low"));
        assert_eq!(priority_badge("urgent").background, "#f3f4f6");
    }

    #[test]
    fn renders_due_date_reminder() {
        let email = renderer()
            .due_date_reminder(&DueDateReminder {
                todo_title: "Quarterly report".to_string(),
                todo_id: "abc".to_string(),
                due_date: "Monday, January 15, 2025".to_string(),
                days_until_due: 1,
            })
            .unwrap();
        assert_eq!(email.subject, "Reminder: \"Quarterly report\" is due tomorrow");
        assert!(email.html.contains("Due Date: Monday, January 15, 2025"));
        assert!(email.html.contains("https://app.tasker.dev/todos?id=abc"));
        assert!(email.html.contains("#dc2626"));
    }

    #[test]
    fn renders_overdue_notification() {
        let email = renderer()
            .overdue_notification(&OverdueNotification {
                todo_title: "Budget".to_string(),
                todo_id: "xyz".to_string(),
                due_date: "Friday".to_string(),
                days_overdue: 3,
            })
            .unwrap();
        assert_eq!(email.subject, "Overdue: \"Budget\" needs your attention");
        assert!(email.html.contains("3 days overdue"));
        assert!(email.html.contains("Was due: Friday"));
    }

    #[test]
    fn weekly_report_truncates_lists() {
        let email = renderer()
            .weekly_report(&WeeklyReport {
                week_start: "January 8, 2025".to_string(),
                week_end: "January 14, 2025".to_string(),
                completed_count: 7,
                active_count: 1,
                overdue_count: 0,
                completed_todos: (1..=7).map(|n| report_todo(n, "high")).collect(),
                overdue_todos: Vec::new(),
            })
            .unwrap();
        assert_eq!(
            email.subject,
            "Your Weekly Productivity Report (January 8, 2025 - January 14, 2025)"
        );
        assert!(email.html.contains("Weekly Completion Rate: 88%"));
        assert!(email.html.contains("Outstanding work this week!"));
        assert!(email.html.contains("Task 5"));
        assert!(!email.html.contains("Task 6"));
        assert!(email.html.contains("... and 2 more completed todos"));
        assert!(!email.html.contains("Needs Attention"));
        assert!(!email.html.contains("Review Overdue"));
    }

    #[test]
    fn weekly_report_lists_overdue_with_due_dates() {
        let mut overdue = report_todo(1, "medium");
        overdue.due_date = Some("January 10, 2025".to_string());
        let email = renderer()
            .weekly_report(&WeeklyReport {
                week_start: "a".to_string(),
                week_end: "b".to_string(),
                completed_count: 0,
                active_count: 2,
                overdue_count: 1,
                completed_todos: Vec::new(),
                overdue_todos: vec![overdue],
            })
            .unwrap();
        assert!(email.html.contains("Needs Attention (1 overdue)"));
        assert!(email.html.contains("Due: January 10, 2025"));
        assert!(email.html.contains("Focus on clearing overdue items first"));
        assert!(!email.html.contains("more overdue todos"));
    }

    #[test]
    fn interpolated_values_are_escaped() {
        let email = renderer()
            .welcome(&Welcome {
                user_first_name: "<script>alert(1)</script>".to_string(),
            })
            .unwrap();
        assert!(!email.html.contains("<script>"));
        assert!(email.html.contains("&lt;script&gt;"));
        assert_eq!(email.subject, "Welcome to Tasker");
    }
}
