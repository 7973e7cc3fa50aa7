use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use crate::models::task::Task;

/// One cell of the month grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    /// 0 = Sunday, matching the grid header.
    pub weekday: u32,
    pub task_count: usize,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    /// e.g. "June 2024"
    pub title: String,
    pub days: Vec<CalendarDay>,
}

impl MonthView {
    pub fn first_day(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn next(&self) -> Option<(i32, u32)> {
        let next = self.first_day()?.checked_add_months(Months::new(1))?;
        Some((next.year(), next.month()))
    }

    pub fn previous(&self) -> Option<(i32, u32)> {
        let prev = self.first_day()?.checked_sub_months(Months::new(1))?;
        Some((prev.year(), prev.month()))
    }
}

/// Groups tasks by due day for `year`/`month`. Returns `None` for an
/// impossible month.
pub fn month_view(tasks: &[Task], year: i32, month: u32) -> Option<MonthView> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;

    let days = first
        .iter_days()
        .take_while(|d| d.month() == month)
        .map(|date| {
            let due: Vec<Task> = tasks
                .iter()
                .filter(|t| t.due_date == Some(date))
                .cloned()
                .collect();
            CalendarDay {
                date,
                weekday: date.weekday().num_days_from_sunday(),
                task_count: due.len(),
                tasks: due,
            }
        })
        .collect();

    Some(MonthView {
        year,
        month,
        title: first.format("%B %Y").to_string(),
        days,
    })
}
