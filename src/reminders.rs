use std::str::FromStr;

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::models::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ReminderCategory {
    Overdue,
    Today,
    ThisWeek,
}

impl FromStr for ReminderCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "overdue" => Ok(ReminderCategory::Overdue),
            "today" => Ok(ReminderCategory::Today),
            "thisWeek" => Ok(ReminderCategory::ThisWeek),
            other => Err(format!("Unknown reminder category: {}", other)),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminders {
    pub overdue: Vec<Task>,
    pub today: Vec<Task>,
    pub this_week: Vec<Task>,
}

pub fn evaluate(tasks: &[Task], today: NaiveDate) -> Reminders {
    let horizon = today.checked_add_days(Days::new(7)).unwrap_or(NaiveDate::MAX);
    let mut reminders = Reminders::default();

    for task in tasks.iter().filter(|t| !t.completed) {
        let Some(due) = task.due_date else { continue };
        if due < today {
            reminders.overdue.push(task.clone());
        } else if due == today {
            reminders.today.push(task.clone());
        } else if due <= horizon {
            reminders.this_week.push(task.clone());
        }
    }
    reminders
}

// Rebuilt from scratch on every list change; a dismissed alert comes back if
// its tasks are still pending.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderAlerts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overdue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub today: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub this_week: Option<String>,
}

impl ReminderAlerts {
    pub fn dismiss(&mut self, category: ReminderCategory) {
        match category {
            ReminderCategory::Overdue => self.overdue = None,
            ReminderCategory::Today => self.today = None,
            ReminderCategory::ThisWeek => self.this_week = None,
        }
    }
}

impl From<&Reminders> for ReminderAlerts {
    fn from(r: &Reminders) -> Self {
        Self {
            overdue: alert(&r.overdue, "overdue task(s)", true),
            today: alert(&r.today, "task(s) due today", false),
            this_week: alert(&r.this_week, "task(s) due this week", true),
        }
    }
}

fn alert(tasks: &[Task], heading: &str, with_date: bool) -> Option<String> {
    if tasks.is_empty() {
        return None;
    }
    let mut message = format!("You have {} {}:", tasks.len(), heading);
    for task in tasks {
        match task.due_date.filter(|_| with_date) {
            Some(due) => message.push_str(&format!("\n- {} (Due: {})", task.text, due)),
            None => message.push_str(&format!("\n- {}", task.text)),
        }
    }
    Some(message)
}
