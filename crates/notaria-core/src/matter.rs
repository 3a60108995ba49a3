//! Matters, workflow templates, workflows and their steps.
//!
//! A matter owns at most one workflow. A workflow instantiated from a
//! template gets one step per step template, in template order, each linked
//! back to the step template it was copied from ([`plan_steps`]). Steps are
//! then edited together through the step formset ([`parse_step_formset`])
//! and the workflow status follows the steps ([`derive_workflow_status`]).

use std::collections::HashSet;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::forms::{self, FormData, FormErrors};

string_enum! {
    pub enum MatterStatus {
        Open => ("open", "Open"),
        InProgress => ("in_progress", "In Progress"),
        OnHold => ("on_hold", "On Hold"),
        Closed => ("closed", "Closed"),
        Cancelled => ("cancelled", "Cancelled"),
    }
}

string_enum! {
    pub enum WorkflowStatus {
        NotStarted => ("not_started", "Not Started"),
        InProgress => ("in_progress", "In Progress"),
        Completed => ("completed", "Completed"),
        Cancelled => ("cancelled", "Cancelled"),
    }
}

string_enum! {
    pub enum StepStatus {
        NotStarted => ("not_started", "Not Started"),
        Pending => ("pending", "Pending"),
        InProgress => ("in_progress", "In Progress"),
        Completed => ("completed", "Completed"),
        Skipped => ("skipped", "Skipped"),
        Blocked => ("blocked", "Blocked"),
    }
}

// ── Matters ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matter {
    pub id: i64,
    pub protocol_number: String,
    pub title: String,
    pub description: Option<String>,
    pub status: MatterStatus,
    pub start_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub client_ids: Vec<i64>,
    pub assigned_user_ids: Vec<i64>,
    pub created_by: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Matter {
    /// Append a line to the notes (used by the meeting action).
    pub fn append_note(&mut self, line: &str) {
        self.notes = Some(match self.notes.take() {
            Some(existing) if !existing.trim().is_empty() => format!("{existing}\n{line}"),
            _ => line.to_string(),
        });
    }
}

/// Validated matter form. The protocol number is never part of it.
#[derive(Debug, Clone, PartialEq)]
pub struct MatterInput {
    pub title: String,
    pub description: Option<String>,
    pub status: MatterStatus,
    pub start_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub completion_date: Option<NaiveDate>,
    pub notes: Option<String>,
    pub client_ids: Vec<i64>,
    pub assigned_user_ids: Vec<i64>,
}

impl MatterInput {
    pub fn from_form(form: &FormData) -> Result<Self, FormErrors> {
        let mut errors = FormErrors::new();
        let title = forms::required_text(form, "title", "This field is required.", &mut errors);
        let status = forms::choice(form, "status", MatterStatus::Open, &mut errors);
        let start_date = match form.text("start_date") {
            None => {
                errors.add("start_date", "This field is required.");
                None
            }
            Some(_) => forms::optional_date(form, "start_date", &mut errors),
        };
        let due_date = forms::optional_date(form, "due_date", &mut errors);
        let completion_date = forms::optional_date(form, "completion_date", &mut errors);

        if let (Some(start), Some(due)) = (start_date, due_date)
            && due < start
        {
            errors.add("due_date", "Due date cannot be before the start date.");
        }
        if let Some(done) = completion_date {
            if start_date.is_some_and(|start| done < start) {
                errors.add("completion_date", "Completion date cannot be before the start date.");
            }
            if due_date.is_some_and(|due| done < due) {
                errors.add("completion_date", "Completion date cannot be before the due date.");
            }
        }
        if matches!(status, MatterStatus::Closed | MatterStatus::Cancelled)
            && completion_date.is_none()
        {
            errors.add(
                "completion_date",
                "Completion date is required when the matter is closed or cancelled.",
            );
        }

        let client_ids = forms::id_list(form, "clients", &mut errors);
        let assigned_user_ids = forms::id_list(form, "assigned_users", &mut errors);

        let input = Self {
            title,
            description: form.text("description"),
            status,
            // MIN is only used when errors is non-empty.
            start_date: start_date.unwrap_or(NaiveDate::MIN),
            due_date,
            completion_date,
            notes: form.text("notes"),
            client_ids,
            assigned_user_ids,
        };
        errors.into_result(input)
    }

    /// Reject client/user ids that do not exist.
    pub fn check_references(
        &self,
        known_clients: &[i64],
        known_users: &[i64],
    ) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        for id in self.client_ids.iter().filter(|id| !known_clients.contains(id)) {
            errors.add("clients", format!("Select a valid choice. {id} is not one of the available choices."));
        }
        for id in self.assigned_user_ids.iter().filter(|id| !known_users.contains(id)) {
            errors.add(
                "assigned_users",
                format!("Select a valid choice. {id} is not one of the available choices."),
            );
        }
        errors.into_result(())
    }
}

// ── Templates ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowTemplate {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTemplate {
    pub id: i64,
    pub template_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub order: i32,
    pub is_required: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl TemplateInput {
    pub fn from_form(form: &FormData) -> Result<Self, FormErrors> {
        let mut errors = FormErrors::new();
        let input = Self {
            name: forms::required_text(form, "name", "This field is required.", &mut errors),
            description: form.text("description"),
        };
        errors.into_result(input)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StepTemplateInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub order: i32,
    #[serde(default = "default_true")]
    pub is_required: bool,
}

fn default_true() -> bool {
    true
}

impl StepTemplateInput {
    pub fn from_form(form: &FormData) -> Result<Self, FormErrors> {
        let mut errors = FormErrors::new();
        let input = Self {
            name: forms::required_text(form, "name", "This field is required.", &mut errors),
            description: form.text("description"),
            order: forms::non_negative_int(form, "order", 0, &mut errors),
            is_required: form.flag("is_required"),
        };
        errors.into_result(input)
    }
}

// ── Workflows ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: i64,
    pub matter_id: i64,
    pub template_id: Option<i64>,
    pub status: WorkflowStatus,
    pub initiated_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub ai_generated_steps: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: i64,
    pub workflow_id: i64,
    pub step_template_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub order: i32,
    pub status: StepStatus,
    pub assigned_to: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub completed_at: Option<NaiveDateTime>,
    pub notes: Option<String>,
}

/// Insert/update payload for a step.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWorkflowStep {
    pub step_template_id: Option<i64>,
    pub name: String,
    pub description: Option<String>,
    pub order: i32,
    pub status: StepStatus,
    pub assigned_to: Option<i64>,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Copy step templates into not-started steps, in template order.
pub fn plan_steps(templates: &[StepTemplate]) -> Vec<NewWorkflowStep> {
    let mut ordered: Vec<&StepTemplate> = templates.iter().collect();
    ordered.sort_by_key(|t| t.order);
    ordered
        .into_iter()
        .map(|t| NewWorkflowStep {
            step_template_id: Some(t.id),
            name: t.name.clone(),
            description: t.description.clone(),
            order: t.order,
            status: StepStatus::NotStarted,
            assigned_to: None,
            due_date: None,
            notes: None,
        })
        .collect()
}

/// Workflow status implied by its steps. Cancelled sticks.
pub fn derive_workflow_status(current: WorkflowStatus, steps: &[StepStatus]) -> WorkflowStatus {
    if current == WorkflowStatus::Cancelled {
        return current;
    }
    if !steps.is_empty()
        && steps
            .iter()
            .all(|s| matches!(s, StepStatus::Completed | StepStatus::Skipped))
    {
        WorkflowStatus::Completed
    } else if steps
        .iter()
        .any(|s| matches!(s, StepStatus::InProgress | StepStatus::Completed))
    {
        WorkflowStatus::InProgress
    } else {
        WorkflowStatus::NotStarted
    }
}

/// `completed_at` after a status change: stamped on entering completed,
/// kept while completed, cleared otherwise.
pub fn completion_stamp(
    status: StepStatus,
    previous: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    match status {
        StepStatus::Completed => Some(previous.unwrap_or(now)),
        _ => None,
    }
}

// ── Step formset ──
//
// Fields follow the management-form convention:
//   steps-TOTAL_FORMS
//   steps-<i>-id, -name, -description, -order, -status, -assigned_to,
//   -due_date, -notes, -step_template, -DELETE

pub const FORMSET_PREFIX: &str = "steps";

#[derive(Debug, Clone, PartialEq)]
pub enum StepChange {
    Create(NewWorkflowStep),
    Update { id: i64, step: NewWorkflowStep },
    Delete(i64),
}

/// Parse the submitted step formset against the workflow's existing step ids.
pub fn parse_step_formset(form: &FormData, existing: &[i64]) -> Result<Vec<StepChange>, FormErrors> {
    let mut errors = FormErrors::new();
    let total = form
        .text(&format!("{FORMSET_PREFIX}-TOTAL_FORMS"))
        .and_then(|v| v.parse::<usize>().ok());
    let Some(total) = total else {
        errors.add(FORMSET_PREFIX, "ManagementForm data is missing or has been tampered with.");
        return Err(errors);
    };

    let mut changes = Vec::new();
    let mut orders = HashSet::new();
    for i in 0..total {
        let field = |name: &str| format!("{FORMSET_PREFIX}-{i}-{name}");
        let id = form.text(&field("id")).and_then(|v| v.parse::<i64>().ok());
        if let Some(id) = id
            && !existing.contains(&id)
        {
            errors.add(&field("id"), "Select a valid choice. That step is not part of this workflow.");
            continue;
        }

        if form.flag(&field("DELETE")) {
            if let Some(id) = id {
                changes.push(StepChange::Delete(id));
            }
            continue;
        }

        // Untouched extra rows are ignored.
        let name = form.text(&field("name"));
        if id.is_none() && name.is_none() {
            continue;
        }

        let mut row_errors = FormErrors::new();
        let name = match name {
            Some(n) => n,
            None => {
                row_errors.add(&field("name"), "This field is required.");
                String::new()
            }
        };
        let order = forms::non_negative_int(form, &field("order"), 0, &mut row_errors);
        if !row_errors.has(&field("order")) && !orders.insert(order) {
            row_errors.add(&field("order"), "Step order must be unique within a workflow.");
        }
        let step = NewWorkflowStep {
            step_template_id: forms::optional_id(form, &field("step_template"), &mut row_errors),
            name,
            description: form.text(&field("description")),
            order,
            status: forms::choice(form, &field("status"), StepStatus::NotStarted, &mut row_errors),
            assigned_to: forms::optional_id(form, &field("assigned_to"), &mut row_errors),
            due_date: forms::optional_date(form, &field("due_date"), &mut row_errors),
            notes: form.text(&field("notes")),
        };
        if !row_errors.is_empty() {
            errors.merge(row_errors);
            continue;
        }
        changes.push(match id {
            Some(id) => StepChange::Update { id, step },
            None => StepChange::Create(step),
        });
    }
    errors.into_result(changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(id: i64, order: i32, name: &str) -> StepTemplate {
        StepTemplate {
            id,
            template_id: 1,
            name: name.into(),
            description: None,
            order,
            is_required: true,
        }
    }

    #[test]
    fn plan_preserves_template_order_and_links() {
        let templates = vec![template(11, 2, "Sign"), template(10, 1, "Draft"), template(12, 3, "File")];
        let steps = plan_steps(&templates);
        assert_eq!(steps.len(), 3);
        let names: Vec<_> = steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Draft", "Sign", "File"]);
        assert_eq!(steps[0].step_template_id, Some(10));
        assert!(steps.iter().all(|s| s.status == StepStatus::NotStarted));
    }

    #[test]
    fn plan_of_no_templates_is_empty() {
        assert!(plan_steps(&[]).is_empty());
    }

    #[test]
    fn workflow_status_derivation() {
        use StepStatus::*;
        let cur = WorkflowStatus::NotStarted;
        assert_eq!(derive_workflow_status(cur, &[]), WorkflowStatus::NotStarted);
        assert_eq!(derive_workflow_status(cur, &[NotStarted, Pending]), WorkflowStatus::NotStarted);
        assert_eq!(derive_workflow_status(cur, &[Completed, Pending]), WorkflowStatus::InProgress);
        assert_eq!(derive_workflow_status(cur, &[Completed, Skipped]), WorkflowStatus::Completed);
        assert_eq!(
            derive_workflow_status(WorkflowStatus::Cancelled, &[Completed]),
            WorkflowStatus::Cancelled
        );
    }

    #[test]
    fn completion_stamp_rules() {
        let t0 = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(9, 0, 0).unwrap();
        let t1 = NaiveDate::from_ymd_opt(2024, 5, 2).unwrap().and_hms_opt(9, 0, 0).unwrap();
        assert_eq!(completion_stamp(StepStatus::Completed, None, t1), Some(t1));
        assert_eq!(completion_stamp(StepStatus::Completed, Some(t0), t1), Some(t0));
        assert_eq!(completion_stamp(StepStatus::InProgress, Some(t0), t1), None);
    }

    fn matter_form(extra: &[(&str, &str)]) -> FormData {
        let mut form = FormData::from_slice(&[("title", "Sale of 1 High St"), ("start_date", "2024-03-01")]);
        for (k, v) in extra {
            form.push(*k, *v);
        }
        form
    }

    #[test]
    fn matter_form_minimal() {
        let input = MatterInput::from_form(&matter_form(&[])).unwrap();
        assert_eq!(input.status, MatterStatus::Open);
        assert_eq!(input.start_date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
    }

    #[test]
    fn matter_form_date_ordering() {
        let errors = MatterInput::from_form(&matter_form(&[
            ("due_date", "2024-02-01"),
            ("completion_date", "2024-01-01"),
        ]))
        .unwrap_err();
        assert!(errors.has("due_date"));
        assert_eq!(errors.get("completion_date").len(), 2);
    }

    #[test]
    fn closed_matter_needs_completion_date() {
        let errors = MatterInput::from_form(&matter_form(&[("status", "closed")])).unwrap_err();
        assert!(errors.has("completion_date"));
        assert!(MatterInput::from_form(&matter_form(&[
            ("status", "closed"),
            ("completion_date", "2024-04-01"),
        ]))
        .is_ok());
    }

    #[test]
    fn matter_form_requires_title_and_start() {
        let errors = MatterInput::from_form(&FormData::default()).unwrap_err();
        assert!(errors.has("title"));
        assert!(errors.has("start_date"));
    }

    #[test]
    fn unknown_references_rejected() {
        let input = MatterInput::from_form(&matter_form(&[("clients", "1"), ("clients", "9")])).unwrap();
        let errors = input.check_references(&[1], &[]).unwrap_err();
        assert_eq!(errors.get("clients").len(), 1);
    }

    #[test]
    fn formset_create_update_delete() {
        let form = FormData::from_slice(&[
            ("steps-TOTAL_FORMS", "4"),
            ("steps-0-id", "5"),
            ("steps-0-name", "Draft deed"),
            ("steps-0-order", "1"),
            ("steps-0-status", "completed"),
            ("steps-1-id", "6"),
            ("steps-1-name", "Old"),
            ("steps-1-order", "2"),
            ("steps-1-DELETE", "on"),
            ("steps-2-name", "Witness"),
            ("steps-2-order", "3"),
            ("steps-3-name", ""),
        ]);
        let changes = parse_step_formset(&form, &[5, 6]).unwrap();
        assert_eq!(changes.len(), 3);
        assert!(matches!(&changes[0], StepChange::Update { id: 5, step } if step.status == StepStatus::Completed));
        assert_eq!(changes[1], StepChange::Delete(6));
        assert!(matches!(&changes[2], StepChange::Create(step) if step.name == "Witness" && step.order == 3));
    }

    #[test]
    fn formset_rejects_duplicate_orders_and_foreign_ids() {
        let form = FormData::from_slice(&[
            ("steps-TOTAL_FORMS", "3"),
            ("steps-0-name", "A"),
            ("steps-0-order", "1"),
            ("steps-1-name", "B"),
            ("steps-1-order", "1"),
            ("steps-2-id", "99"),
            ("steps-2-name", "C"),
        ]);
        let errors = parse_step_formset(&form, &[5]).unwrap_err();
        assert!(errors.has("steps-1-order"));
        assert!(errors.has("steps-2-id"));
    }

    #[test]
    fn formset_requires_management_form() {
        assert!(parse_step_formset(&FormData::default(), &[]).is_err());
    }

    #[test]
    fn append_note() {
        let mut m = crate::testing::sample_matter(1);
        m.notes = None;
        m.append_note("Zoom meeting: https://zoom.us/j/1");
        m.append_note("second");
        assert_eq!(m.notes.as_deref(), Some("Zoom meeting: https://zoom.us/j/1\nsecond"));
    }
}
