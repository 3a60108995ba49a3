//! Fixtures shared by the repository tests.

use chrono::NaiveDate;
use notaria_core::{MatterInput, MatterStatus, NewUser, NewWorkflowStep, Role, StepStatus, User};

use crate::Store;

pub fn matter_input(title: &str) -> MatterInput {
    MatterInput {
        title: title.into(),
        description: None,
        status: MatterStatus::Open,
        start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
        due_date: None,
        completion_date: None,
        notes: None,
        client_ids: Vec::new(),
        assigned_user_ids: Vec::new(),
    }
}

pub fn manual_step(name: &str, order: i32) -> NewWorkflowStep {
    NewWorkflowStep {
        step_template_id: None,
        name: name.into(),
        description: None,
        order,
        status: StepStatus::NotStarted,
        assigned_to: None,
        due_date: None,
        notes: None,
    }
}

pub fn user(store: &Store, username: &str, role: Role) -> User {
    store
        .create_user(&NewUser::new(username, &format!("{username}@example.com"), "password1", role))
        .unwrap()
}
