//! User-facing reply texts.

use crate::error::ValidationError;
use crate::task::{Task, TaskId};

pub const GREETING: &str =
    "Hi! I help plan family tasks. Commands: /addtask, /tasks, /done <task id>, /cancel";
pub const ASK_DESCRIPTION: &str = "Enter the task description:";
pub const ASK_ASSIGNEE: &str = "Enter the assignee's name:";
pub const ASK_DEADLINE: &str = "Enter the deadline as DD:MM:YYYY:";
pub const ASK_REMINDER_TIME: &str = "Enter the reminder time as HH:MM (24-hour):";
pub const CANCELLED: &str = "Action cancelled.";
pub const NOTHING_TO_CANCEL: &str = "Nothing to cancel.";
pub const NO_PENDING_TASKS: &str = "No active tasks.";
pub const TASK_NOT_FOUND: &str = "Task not found.";
pub const DONE_USAGE: &str = "Please give a task ID, for example: /done <task id>";
pub const SESSION_ACTIVE: &str =
    "A task is already being created. Finish it or send /cancel first.";
pub const NO_SESSION: &str = "Send /addtask to create a task.";
pub const STORE_FAILURE: &str = "Could not save the task right now. Please try again.";
pub const STORE_READ_FAILURE: &str = "Could not load the task list right now. Please try again.";
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

pub fn unknown_command(name: &str) -> String {
    format!("Unknown command /{name}. {GREETING}")
}

pub fn task_created(id: &TaskId) -> String {
    format!("Task added! Task ID: {id}")
}

pub fn task_completed(id: &TaskId) -> String {
    format!("Task \"{id}\" is done!")
}

/// Re-prompt after a rejected field.
pub fn invalid_input(error: &ValidationError) -> String {
    match error {
        ValidationError::Empty { field } => format!("The {field} cannot be empty. Try again."),
        ValidationError::Deadline(_) => {
            "Wrong deadline format. Please enter the deadline as DD:MM:YYYY.".to_owned()
        }
        ValidationError::ReminderTime(_) => {
            "Wrong time. Please enter the time as HH:MM (24-hour format).".to_owned()
        }
    }
}

/// One block of the `/tasks` listing.
pub fn task_summary(task: &Task) -> String {
    let deadline = task
        .deadline
        .map_or_else(|| "none".to_owned(), |d| d.to_string());
    format!(
        "Task ID: {}\nTask: {}\nAssignee: {}\nDeadline: {}\nReminder: {}",
        task.id, task.description, task.assignee, deadline, task.reminder_time
    )
}

/// Reminder text delivered to the task's conversation.
pub fn reminder(description: &str, assignee: &str) -> String {
    format!("Reminder! Task: {description}, Assignee: {assignee}")
}
