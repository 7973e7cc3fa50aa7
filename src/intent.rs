use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::models::task::{Task, TaskPosition};
use crate::task_store::{TaskCommand, TaskStore};

pub const NO_TASKS: &str = "You have no tasks.";
pub const MISSING_DESCRIPTION: &str = "Please provide a task description.";
pub const INVALID_COMPLETE: &str = "Please specify a valid task number to complete.";
pub const INVALID_DELETE: &str = "Please specify a valid task number to delete.";
pub const UPDATE_UNSUPPORTED: &str = "Task updating is not implemented yet.";
pub const QUESTION_REPLY: &str =
    "I'm sorry, I don't have enough information to answer that question accurately.";
pub const UNKNOWN_REPLY: &str =
    "I'm not sure how to help with that. Can you try rephrasing your request?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AddTask,
    ListTasks,
    CompleteTask,
    DeleteTask,
    UpdateTask,
    Question,
    Unknown,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::AddTask => "add_task",
            Intent::ListTasks => "list_tasks",
            Intent::CompleteTask => "complete_task",
            Intent::DeleteTask => "delete_task",
            Intent::UpdateTask => "update_task",
            Intent::Question => "question",
            Intent::Unknown => "unknown",
        }
    }
}

// Checked in order; earlier rules shadow later ones.
const CONTAINS_RULES: &[(&[&str], Intent)] = &[
    (&["add task", "create task"], Intent::AddTask),
    (&["list tasks", "show tasks"], Intent::ListTasks),
    (&["complete task", "finish task"], Intent::CompleteTask),
    (&["delete task", "remove task"], Intent::DeleteTask),
    (&["update task", "change task"], Intent::UpdateTask),
];

const QUESTION_PREFIXES: &[&str] = &["what", "how", "why"];

pub fn recognize_intent(input: &str) -> Intent {
    let lowered = input.to_lowercase();

    for (phrases, intent) in CONTAINS_RULES {
        if phrases.iter().any(|p| lowered.contains(p)) {
            return *intent;
        }
    }
    if QUESTION_PREFIXES.iter().any(|p| lowered.starts_with(p)) {
        return Intent::Question;
    }
    Intent::Unknown
}

/// Reply text and the store change it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub command: Option<TaskCommand>,
    pub reply: String,
}

impl Dispatch {
    fn reply(reply: impl Into<String>) -> Self {
        Self {
            command: None,
            reply: reply.into(),
        }
    }
}

pub fn plan(intent: Intent, input: &str, tasks: &[Task]) -> Dispatch {
    match intent {
        Intent::AddTask => {
            let text = strip_add_prefix(input).trim();
            if text.is_empty() {
                return Dispatch::reply(MISSING_DESCRIPTION);
            }
            Dispatch {
                command: Some(TaskCommand::Add {
                    text: text.to_string(),
                    due_date: None,
                }),
                reply: format!("Task added: {}", text),
            }
        }
        Intent::ListTasks => Dispatch::reply(list_tasks(tasks)),
        Intent::CompleteTask => match task_at(tasks, input) {
            Some(task) => Dispatch {
                command: Some(TaskCommand::Toggle(task.id)),
                reply: format!("Marked task as complete: {}", task.text),
            },
            None => Dispatch::reply(INVALID_COMPLETE),
        },
        Intent::DeleteTask => match task_at(tasks, input) {
            Some(task) => Dispatch {
                command: Some(TaskCommand::Delete(task.id)),
                reply: format!("Deleted task: {}", task.text),
            },
            None => Dispatch::reply(INVALID_DELETE),
        },
        Intent::UpdateTask => Dispatch::reply(UPDATE_UNSUPPORTED),
        Intent::Question => Dispatch::reply(QUESTION_REPLY),
        Intent::Unknown => Dispatch::reply(UNKNOWN_REPLY),
    }
}

pub fn dispatch(input: &str, store: &mut TaskStore) -> (Intent, String) {
    let intent = recognize_intent(input);
    let Dispatch { command, reply } = plan(intent, input, store.tasks());
    if let Some(command) = command {
        store.apply(command);
    }
    (intent, reply)
}

pub fn list_tasks(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return NO_TASKS.to_string();
    }
    let lines: Vec<String> = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| {
            let mark = if task.completed { 'x' } else { ' ' };
            match task.due_date {
                Some(due) => format!("{}. [{}] {} (Due: {})", i + 1, mark, task.text, due),
                None => format!("{}. [{}] {}", i + 1, mark, task.text),
            }
        })
        .collect();
    format!("Your tasks:\n{}", lines.join("\n"))
}

/// First run of ASCII digits anywhere in `input`, read as a display position.
pub fn extract_position(input: &str) -> Option<TaskPosition> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    let digits = DIGITS.get_or_init(|| Regex::new(r"[0-9]+").expect("valid digit pattern"));
    digits
        .find(input)
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .map(TaskPosition)
}

fn task_at<'a>(tasks: &'a [Task], input: &str) -> Option<&'a Task> {
    extract_position(input)
        .and_then(TaskPosition::index)
        .and_then(|i| tasks.get(i))
}

fn strip_add_prefix(input: &str) -> &str {
    static PREFIX: OnceLock<Regex> = OnceLock::new();
    let prefix = PREFIX.get_or_init(|| {
        Regex::new(r"(?i)^(add|create)\s+task:?\s*").expect("valid add-task pattern")
    });
    match prefix.find(input) {
        Some(m) => &input[m.end()..],
        None => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::task::TaskId;
    use chrono::NaiveDate;

    fn task(id: i64, text: &str, completed: bool, due: Option<&str>) -> Task {
        Task {
            id: TaskId(id),
            text: text.to_string(),
            completed,
            due_date: due.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
        }
    }

    fn three() -> Vec<Task> {
        vec![
            task(10, "Buy milk", false, None),
            task(20, "Call mom", false, None),
            task(30, "File taxes", false, Some("2024-04-15")),
        ]
    }

    fn store_of(tasks: Vec<Task>) -> TaskStore {
        let mut store = TaskStore::new();
        store.restore("u1", Some(&serde_json::to_string(&tasks).unwrap()));
        store
    }

    #[test]
    fn classification_follows_priority() {
        assert_eq!(
            recognize_intent("please add task: buy milk, then list tasks"),
            Intent::AddTask
        );
        assert_eq!(recognize_intent("Show tasks"), Intent::ListTasks);
        assert_eq!(recognize_intent("Complete task 2"), Intent::CompleteTask);
        assert_eq!(recognize_intent("FINISH TASK 1"), Intent::CompleteTask);
        assert_eq!(recognize_intent("remove task 3"), Intent::DeleteTask);
        assert_eq!(recognize_intent("change task 1 to tomorrow"), Intent::UpdateTask);
        assert_eq!(recognize_intent("What is on my plate?"), Intent::Question);
        assert_eq!(recognize_intent("why not"), Intent::Question);
        assert_eq!(recognize_intent("tell me a joke"), Intent::Unknown);
        // a question that names a command is still the command
        assert_eq!(recognize_intent("how do I delete task 2"), Intent::DeleteTask);
        // question words only count at the start
        assert_eq!(recognize_intent("so what"), Intent::Unknown);
    }

    #[test]
    fn intent_labels() {
        assert_eq!(Intent::CompleteTask.as_str(), "complete_task");
        assert_eq!(
            serde_json::to_value(Intent::ListTasks).unwrap(),
            serde_json::json!("list_tasks")
        );
    }

    #[test]
    fn add_strips_prefix_and_keeps_case() {
        let mut store = store_of(vec![]);
        let (intent, reply) = dispatch("Add task: Water the Plants ", &mut store);
        assert_eq!(intent, Intent::AddTask);
        assert_eq!(reply, "Task added: Water the Plants");
        assert_eq!(store.tasks()[0].text, "Water the Plants");
        assert!(!store.tasks()[0].completed);

        let (_, reply) = dispatch("CREATE TASK pick up parcel", &mut store);
        assert_eq!(reply, "Task added: pick up parcel");
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn add_without_leading_prefix_keeps_whole_input() {
        let mut store = store_of(vec![]);
        let (_, reply) = dispatch("please add task: buy milk", &mut store);
        assert_eq!(reply, "Task added: please add task: buy milk");
    }

    #[test]
    fn add_with_blank_description() {
        let mut store = store_of(vec![]);
        let (_, reply) = dispatch("add task:   ", &mut store);
        assert_eq!(reply, MISSING_DESCRIPTION);
        assert!(store.is_empty());
        assert!(!store.is_dirty());
    }

    #[test]
    fn listing_formats() {
        assert_eq!(list_tasks(&[]), "You have no tasks.");
        let tasks = vec![
            task(1, "A", false, None),
            task(2, "B", true, Some("2024-01-01")),
        ];
        assert_eq!(
            list_tasks(&tasks),
            "Your tasks:\n1. [ ] A\n2. [x] B (Due: 2024-01-01)"
        );
    }

    #[test]
    fn complete_resolves_position_to_id() {
        let tasks = three();
        let planned = plan(Intent::CompleteTask, "Complete task 2", &tasks);
        assert_eq!(planned.command, Some(TaskCommand::Toggle(TaskId(20))));
        assert_eq!(planned.reply, "Marked task as complete: Call mom");

        let mut store = store_of(three());
        let (_, reply) = dispatch("Complete task 2", &mut store);
        assert_eq!(reply, "Marked task as complete: Call mom");
        assert!(store.tasks()[1].completed);
        assert!(!store.tasks()[0].completed);
    }

    #[test]
    fn delete_out_of_range_leaves_list() {
        let mut store = store_of(three());
        let (_, reply) = dispatch("Delete task 99", &mut store);
        assert_eq!(reply, "Please specify a valid task number to delete.");
        assert_eq!(store.len(), 3);

        let (_, reply) = dispatch("delete task 0", &mut store);
        assert_eq!(reply, INVALID_DELETE);
        let (_, reply) = dispatch("finish task", &mut store);
        assert_eq!(reply, INVALID_COMPLETE);
    }

    #[test]
    fn delete_reports_text_of_removed_task() {
        let mut store = store_of(three());
        let (_, reply) = dispatch("remove task 3 please", &mut store);
        assert_eq!(reply, "Deleted task: File taxes");
        let texts: Vec<_> = store.tasks().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, ["Buy milk", "Call mom"]);
    }

    #[test]
    fn first_digit_run_wins() {
        assert_eq!(extract_position("complete task 12 and 3"), Some(TaskPosition(12)));
        assert_eq!(extract_position("task#7x"), Some(TaskPosition(7)));
        assert_eq!(extract_position("no digits"), None);
        // non-ASCII digits are not positions
        assert_eq!(extract_position("complete task ٣"), None);
        assert_eq!(extract_position("complete task 99999999999999999999999"), None);
    }

    #[test]
    fn fixed_replies_do_not_mutate() {
        let mut store = store_of(three());
        let before = store.tasks().to_vec();
        for (input, expected) in [
            ("update task 1", UPDATE_UNSUPPORTED),
            ("What time is it", QUESTION_REPLY),
            ("hello there", UNKNOWN_REPLY),
        ] {
            let (_, reply) = dispatch(input, &mut store);
            assert_eq!(reply, expected);
        }
        assert_eq!(store.tasks(), before.as_slice());
        assert!(!store.is_dirty());
    }
}
