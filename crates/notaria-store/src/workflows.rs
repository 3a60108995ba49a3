//! Workflow templates, workflow instantiation and the step formset save.

use std::collections::{HashMap, HashSet};

use duckdb::{OptionalExt, Row, ToSql, Transaction, params};
use notaria_core::matter::{
    StepTemplateInput, TemplateInput, completion_stamp, derive_workflow_status, plan_steps,
};
use notaria_core::{
    NewWorkflowStep, StepChange, StepStatus, StepTemplate, Workflow, WorkflowStatus, WorkflowStep,
    WorkflowTemplate,
};
use tracing::{debug, info};

use crate::error::ConstraintExt;
use crate::store::{fmt_list, fmt_opt_date, fmt_opt_ts, fmt_ts, list, opt_date, opt_ts, parsed, ts};
use crate::{Store, StoreError};

pub const DUPLICATE_WORKFLOW: &str = "A workflow already exists for this matter.";
pub const DUPLICATE_STEP_ORDER: &str = "Step order must be unique within a workflow.";
pub const DUPLICATE_TEMPLATE_ORDER: &str = "A step with this order already exists in the template.";
pub const DUPLICATE_TEMPLATE_NAME: &str = "A workflow template with this name already exists.";

const TEMPLATE_COLUMNS: &str = "id, name, description, created_at";
const STEP_TEMPLATE_COLUMNS: &str = "id, template_id, name, description, step_order, is_required";
const WORKFLOW_COLUMNS: &str =
    "id, matter_id, template_id, status, initiated_at, completed_at, ai_generated_steps";
const STEP_COLUMNS: &str = "id, workflow_id, step_template_id, name, description, step_order, status, \
                            assigned_to, due_date, completed_at, notes";

fn read_template(row: &Row<'_>) -> duckdb::Result<WorkflowTemplate> {
    Ok(WorkflowTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: ts(row, 3)?,
    })
}

fn read_step_template(row: &Row<'_>) -> duckdb::Result<StepTemplate> {
    Ok(StepTemplate {
        id: row.get(0)?,
        template_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        order: row.get(4)?,
        is_required: row.get(5)?,
    })
}

fn read_workflow(row: &Row<'_>) -> duckdb::Result<Workflow> {
    Ok(Workflow {
        id: row.get(0)?,
        matter_id: row.get(1)?,
        template_id: row.get(2)?,
        status: parsed(row, 3)?,
        initiated_at: ts(row, 4)?,
        completed_at: opt_ts(row, 5)?,
        ai_generated_steps: list(row, 6)?,
    })
}

fn read_step(row: &Row<'_>) -> duckdb::Result<WorkflowStep> {
    Ok(WorkflowStep {
        id: row.get(0)?,
        workflow_id: row.get(1)?,
        step_template_id: row.get(2)?,
        name: row.get(3)?,
        description: row.get(4)?,
        order: row.get(5)?,
        status: parsed(row, 6)?,
        assigned_to: row.get(7)?,
        due_date: opt_date(row, 8)?,
        completed_at: opt_ts(row, 9)?,
        notes: row.get(10)?,
    })
}

fn insert_step(tx: &Transaction<'_>, workflow_id: i64, step: &NewWorkflowStep) -> Result<i64, StoreError> {
    let completed_at = completion_stamp(step.status, None, notaria_core::now());
    tx.query_row(
        "INSERT INTO workflow_steps (workflow_id, step_template_id, name, description, step_order, \
         status, assigned_to, due_date, completed_at, notes) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING id",
        params![
            workflow_id,
            step.step_template_id,
            step.name,
            step.description,
            step.order,
            step.status.as_str(),
            step.assigned_to,
            fmt_opt_date(step.due_date),
            fmt_opt_ts(completed_at),
            step.notes,
        ],
        |row| row.get(0),
    )
    .on_conflict(DUPLICATE_STEP_ORDER)
}

/// Write one edited step. `step_order` is only part of the statement when
/// the order moved, since an update of an indexed column is a delete and
/// re-insert of its key.
fn update_step(tx: &Transaction<'_>, previous: &WorkflowStep, step: &NewWorkflowStep) -> Result<(), StoreError> {
    let completed_at = fmt_opt_ts(completion_stamp(step.status, previous.completed_at, notaria_core::now()));
    let status = step.status.as_str().to_string();
    let due_date = fmt_opt_date(step.due_date);
    let moved = previous.order != step.order;

    let mut values: Vec<&dyn ToSql> = vec![
        &step.step_template_id,
        &step.name,
        &step.description,
        &status,
        &step.assigned_to,
        &due_date,
        &completed_at,
        &step.notes,
    ];
    if moved {
        values.push(&step.order);
    }
    values.push(&previous.id);
    let sql = format!(
        "UPDATE workflow_steps SET step_template_id = ?, name = ?, description = ?, status = ?, \
         assigned_to = ?, due_date = ?, completed_at = ?, notes = ?{} WHERE id = ?",
        if moved { ", step_order = ?" } else { "" }
    );
    tx.execute(&sql, values.as_slice()).on_conflict(DUPLICATE_STEP_ORDER)?;
    Ok(())
}

/// Fail with [`DUPLICATE_STEP_ORDER`] when `changes` would leave two steps
/// sharing an order. Updates must name steps of this workflow.
fn check_final_orders(current: &HashMap<i64, WorkflowStep>, changes: &[StepChange]) -> Result<(), StoreError> {
    let mut orders: HashMap<i64, i32> = current.values().map(|s| (s.id, s.order)).collect();
    let mut created = Vec::new();
    for change in changes {
        match change {
            StepChange::Delete(id) => {
                orders.remove(id);
            }
            StepChange::Update { id, step } => {
                if !current.contains_key(id) {
                    return Err(StoreError::not_found("workflow step", *id));
                }
                orders.insert(*id, step.order);
            }
            StepChange::Create(step) => created.push(step.order),
        }
    }
    let mut seen = HashSet::new();
    if orders.into_values().chain(created).all(|order| seen.insert(order)) {
        Ok(())
    } else {
        Err(StoreError::Conflict(DUPLICATE_STEP_ORDER.to_string()))
    }
}

/// Recompute the workflow status from its steps.
fn refresh_status(tx: &Transaction<'_>, workflow_id: i64) -> Result<WorkflowStatus, StoreError> {
    let (current, completed_at): (String, Option<String>) = tx.query_row(
        "SELECT status, completed_at FROM workflows WHERE id = ?",
        [workflow_id],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let current: WorkflowStatus = current
        .parse()
        .map_err(|e: notaria_core::CoreError| StoreError::InvalidValue(e.to_string()))?;
    let statuses: Vec<StepStatus> = {
        let mut stmt = tx.prepare("SELECT status FROM workflow_steps WHERE workflow_id = ?")?;
        let rows = stmt.query_map([workflow_id], |row| parsed(row, 0))?;
        rows.collect::<Result<_, _>>()?
    };
    let status = derive_workflow_status(current, &statuses);
    let completed_at = match status {
        WorkflowStatus::Completed => completed_at.or_else(|| Some(fmt_ts(notaria_core::now()))),
        _ => None,
    };
    tx.execute(
        "UPDATE workflows SET status = ?, completed_at = ? WHERE id = ?",
        params![status.as_str(), completed_at, workflow_id],
    )?;
    Ok(status)
}

impl Store {
    // ── Templates ──

    pub fn create_workflow_template(&self, input: &TemplateInput) -> Result<WorkflowTemplate, StoreError> {
        let id: i64 = self
            .conn
            .query_row(
                "INSERT INTO workflow_templates (name, description, created_at) VALUES (?, ?, ?) RETURNING id",
                params![input.name, input.description, fmt_ts(notaria_core::now())],
                |row| row.get(0),
            )
            .on_conflict(DUPLICATE_TEMPLATE_NAME)?;
        info!(template_id = id, name = %input.name, "created workflow template");
        self.get_workflow_template(id)
    }

    pub fn get_workflow_template(&self, id: i64) -> Result<WorkflowTemplate, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM workflow_templates WHERE id = ?"),
                [id],
                read_template,
            )
            .optional()?
            .ok_or(StoreError::not_found("workflow template", id))
    }

    pub fn find_workflow_template(&self, name: &str) -> Result<Option<WorkflowTemplate>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM workflow_templates WHERE name = ?"),
                [name],
                read_template,
            )
            .optional()?)
    }

    pub fn list_workflow_templates(&self) -> Result<Vec<WorkflowTemplate>, StoreError> {
        self.query_list(
            &format!("SELECT {TEMPLATE_COLUMNS} FROM workflow_templates ORDER BY name"),
            &[],
            read_template,
        )
    }

    pub fn add_step_template(&self, template_id: i64, input: &StepTemplateInput) -> Result<StepTemplate, StoreError> {
        self.get_workflow_template(template_id)?;
        let id: i64 = self
            .conn
            .query_row(
                "INSERT INTO step_templates (template_id, name, description, step_order, is_required) \
                 VALUES (?, ?, ?, ?, ?) RETURNING id",
                params![template_id, input.name, input.description, input.order, input.is_required],
                |row| row.get(0),
            )
            .on_conflict(DUPLICATE_TEMPLATE_ORDER)?;
        debug!(template_id, step_template_id = id, order = input.order, "added step template");
        Ok(StepTemplate {
            id,
            template_id,
            name: input.name.clone(),
            description: input.description.clone(),
            order: input.order,
            is_required: input.is_required,
        })
    }

    /// Step templates in template order.
    pub fn step_templates(&self, template_id: i64) -> Result<Vec<StepTemplate>, StoreError> {
        self.query_list(
            &format!(
                "SELECT {STEP_TEMPLATE_COLUMNS} FROM step_templates WHERE template_id = ? ORDER BY step_order"
            ),
            &[&template_id],
            read_step_template,
        )
    }

    /// Delete a template and its step templates. Workflows made from it keep
    /// their steps, detached from the template.
    pub fn delete_workflow_template(&mut self, id: i64) -> Result<(), StoreError> {
        self.get_workflow_template(id)?;
        let tx = self.conn.transaction()?;
        tx.execute(
            "UPDATE workflow_steps SET step_template_id = NULL \
             WHERE step_template_id IN (SELECT id FROM step_templates WHERE template_id = ?)",
            [id],
        )?;
        tx.execute("UPDATE workflows SET template_id = NULL WHERE template_id = ?", [id])?;
        tx.execute("DELETE FROM step_templates WHERE template_id = ?", [id])?;
        tx.execute("DELETE FROM workflow_templates WHERE id = ?", [id])?;
        tx.commit()?;
        info!(template_id = id, "deleted workflow template");
        Ok(())
    }

    // ── Workflows ──

    /// Create the matter's workflow, copying the template's steps when a
    /// template is given. A second workflow for the same matter is a
    /// [`StoreError::Conflict`] and leaves the first untouched.
    pub fn instantiate_workflow(&mut self, matter_id: i64, template_id: Option<i64>) -> Result<Workflow, StoreError> {
        self.get_matter(matter_id)?;
        let plan = match template_id {
            Some(tid) => {
                self.get_workflow_template(tid)?;
                plan_steps(&self.step_templates(tid)?)
            }
            None => Vec::new(),
        };

        let tx = self.conn.transaction()?;
        let workflow_id: i64 = tx
            .query_row(
                "INSERT INTO workflows (matter_id, template_id, status, initiated_at) \
                 VALUES (?, ?, ?, ?) RETURNING id",
                params![
                    matter_id,
                    template_id,
                    WorkflowStatus::NotStarted.as_str(),
                    fmt_ts(notaria_core::now()),
                ],
                |row| row.get(0),
            )
            .on_conflict(DUPLICATE_WORKFLOW)?;
        for step in &plan {
            insert_step(&tx, workflow_id, step)?;
        }
        tx.commit()?;

        info!(matter_id, workflow_id, ?template_id, steps = plan.len(), "instantiated workflow");
        self.get_workflow(workflow_id)
    }

    pub fn get_workflow(&self, id: i64) -> Result<Workflow, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE id = ?"),
                [id],
                read_workflow,
            )
            .optional()?
            .ok_or(StoreError::not_found("workflow", id))
    }

    pub fn workflow_for_matter(&self, matter_id: i64) -> Result<Option<Workflow>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {WORKFLOW_COLUMNS} FROM workflows WHERE matter_id = ?"),
                [matter_id],
                read_workflow,
            )
            .optional()?)
    }

    /// Steps in workflow order.
    pub fn workflow_steps(&self, workflow_id: i64) -> Result<Vec<WorkflowStep>, StoreError> {
        self.query_list(
            &format!("SELECT {STEP_COLUMNS} FROM workflow_steps WHERE workflow_id = ? ORDER BY step_order"),
            &[&workflow_id],
            read_step,
        )
    }

    /// Add one step by hand.
    pub fn add_step(&mut self, workflow_id: i64, step: &NewWorkflowStep) -> Result<WorkflowStep, StoreError> {
        self.get_workflow(workflow_id)?;
        let tx = self.conn.transaction()?;
        let id = insert_step(&tx, workflow_id, step)?;
        refresh_status(&tx, workflow_id)?;
        tx.commit()?;
        self.conn
            .query_row(
                &format!("SELECT {STEP_COLUMNS} FROM workflow_steps WHERE id = ?"),
                [id],
                read_step,
            )
            .optional()?
            .ok_or(StoreError::not_found("workflow step", id))
    }

    /// Apply a parsed step formset and refresh the workflow status.
    ///
    /// The resulting orders are checked before anything is written. DuckDB
    /// keeps a unique key claimed until the transaction that released it
    /// commits, so deleted steps and steps whose order moves are cleared out
    /// of the way in a first transaction; the final values, new steps and
    /// status land in a second.
    pub fn save_steps(&mut self, workflow_id: i64, changes: &[StepChange]) -> Result<Workflow, StoreError> {
        self.get_workflow(workflow_id)?;
        let current: HashMap<i64, WorkflowStep> = self
            .workflow_steps(workflow_id)?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();
        check_final_orders(&current, changes)?;

        let deleted: Vec<i64> = changes
            .iter()
            .filter_map(|c| match c {
                StepChange::Delete(id) => Some(*id),
                _ => None,
            })
            .collect();
        let moved: Vec<i64> = changes
            .iter()
            .filter_map(|c| match c {
                StepChange::Update { id, step } if current.get(id).is_some_and(|prev| prev.order != step.order) => {
                    Some(*id)
                }
                _ => None,
            })
            .collect();
        if !deleted.is_empty() || !moved.is_empty() {
            let tx = self.conn.transaction()?;
            for id in &deleted {
                tx.execute(
                    "DELETE FROM workflow_steps WHERE id = ? AND workflow_id = ?",
                    [*id, workflow_id],
                )?;
            }
            // Parked below every real order until the second pass.
            for (parked, id) in (1..).map(|n: i32| -n).zip(&moved) {
                tx.execute(
                    "UPDATE workflow_steps SET step_order = ? WHERE id = ?",
                    params![parked, id],
                )?;
            }
            tx.commit()?;
            debug!(workflow_id, deleted = deleted.len(), moved = moved.len(), "cleared step orders");
        }

        let tx = self.conn.transaction()?;
        for change in changes {
            match change {
                StepChange::Update { id, step } => {
                    let previous = current.get(id).ok_or(StoreError::not_found("workflow step", *id))?;
                    update_step(&tx, previous, step)?;
                }
                StepChange::Create(step) => {
                    insert_step(&tx, workflow_id, step)?;
                }
                StepChange::Delete(_) => {}
            }
        }
        let status = refresh_status(&tx, workflow_id)?;
        tx.commit()?;
        info!(workflow_id, changes = changes.len(), status = %status, "saved workflow steps");
        self.get_workflow(workflow_id)
    }

    pub fn set_ai_generated_steps(&self, workflow_id: i64, steps: &[String]) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE workflows SET ai_generated_steps = ? WHERE id = ?",
            params![fmt_list(steps), workflow_id],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("workflow", workflow_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{manual_step, matter_input};

    fn template_with_steps(store: &Store, name: &str, steps: &[(&str, i32)]) -> WorkflowTemplate {
        let t = store
            .create_workflow_template(&TemplateInput {
                name: name.into(),
                description: None,
            })
            .unwrap();
        for (step, order) in steps {
            store
                .add_step_template(
                    t.id,
                    &StepTemplateInput {
                        name: (*step).into(),
                        description: None,
                        order: *order,
                        is_required: true,
                    },
                )
                .unwrap();
        }
        t
    }

    #[test]
    fn instantiation_copies_template_steps_in_order() {
        let mut store = Store::open().unwrap();
        let t = template_with_steps(&store, "Conveyancing", &[("Exchange", 2), ("Searches", 1), ("Completion", 3)]);
        let m = store.create_matter(&matter_input("Sale"), Some(1)).unwrap();

        let wf = store.instantiate_workflow(m.id, Some(t.id)).unwrap();
        assert_eq!(wf.template_id, Some(t.id));
        assert_eq!(wf.status, WorkflowStatus::NotStarted);

        let steps = store.workflow_steps(wf.id).unwrap();
        let templates = store.step_templates(t.id).unwrap();
        assert_eq!(steps.len(), templates.len());
        for (step, tmpl) in steps.iter().zip(&templates) {
            assert_eq!(step.name, tmpl.name);
            assert_eq!(step.order, tmpl.order);
            assert_eq!(step.step_template_id, Some(tmpl.id));
            assert_eq!(step.status, StepStatus::NotStarted);
        }
        assert_eq!(steps[0].name, "Searches");
    }

    #[test]
    fn second_workflow_is_rejected_and_first_survives() {
        let mut store = Store::open().unwrap();
        let t = template_with_steps(&store, "Probate", &[("Grant", 1)]);
        let m = store.create_matter(&matter_input("Estate"), Some(1)).unwrap();
        let first = store.instantiate_workflow(m.id, Some(t.id)).unwrap();

        let err = store.instantiate_workflow(m.id, None).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref msg) if msg == DUPLICATE_WORKFLOW));

        let still = store.workflow_for_matter(m.id).unwrap().unwrap();
        assert_eq!(still.id, first.id);
        assert_eq!(store.workflow_steps(first.id).unwrap().len(), 1);
    }

    #[test]
    fn manual_workflow_has_no_steps() {
        let mut store = Store::open().unwrap();
        let m = store.create_matter(&matter_input("Misc"), None).unwrap();
        let wf = store.instantiate_workflow(m.id, None).unwrap();
        assert_eq!(wf.template_id, None);
        assert!(store.workflow_steps(wf.id).unwrap().is_empty());
    }

    #[test]
    fn duplicate_step_order_fails() {
        let mut store = Store::open().unwrap();
        let m = store.create_matter(&matter_input("Misc"), None).unwrap();
        let wf = store.instantiate_workflow(m.id, None).unwrap();
        store.add_step(wf.id, &manual_step("Call client", 1)).unwrap();
        let err = store.add_step(wf.id, &manual_step("Send letter", 1)).unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref msg) if msg == DUPLICATE_STEP_ORDER));
        assert_eq!(store.workflow_steps(wf.id).unwrap().len(), 1);
    }

    #[test]
    fn duplicate_template_order_fails() {
        let store = Store::open().unwrap();
        let t = template_with_steps(&store, "Lease", &[("Draft", 1)]);
        let err = store
            .add_step_template(
                t.id,
                &StepTemplateInput {
                    name: "Again".into(),
                    description: None,
                    order: 1,
                    is_required: false,
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[test]
    fn formset_save_stamps_completion_and_derives_status() {
        let mut store = Store::open().unwrap();
        let m = store.create_matter(&matter_input("Misc"), None).unwrap();
        let wf = store.instantiate_workflow(m.id, None).unwrap();
        let a = store.add_step(wf.id, &manual_step("A", 1)).unwrap();
        let b = store.add_step(wf.id, &manual_step("B", 2)).unwrap();

        let mut done = manual_step("A", 1);
        done.status = StepStatus::Completed;
        let wf = store
            .save_steps(wf.id, &[StepChange::Update { id: a.id, step: done.clone() }])
            .unwrap();
        assert_eq!(wf.status, WorkflowStatus::InProgress);
        let steps = store.workflow_steps(wf.id).unwrap();
        let stamped = steps[0].completed_at.unwrap();

        let mut skipped = manual_step("B", 2);
        skipped.status = StepStatus::Skipped;
        let wf = store
            .save_steps(
                wf.id,
                &[
                    StepChange::Update { id: a.id, step: done },
                    StepChange::Update { id: b.id, step: skipped },
                ],
            )
            .unwrap();
        assert_eq!(wf.status, WorkflowStatus::Completed);
        assert!(wf.completed_at.is_some());
        assert_eq!(store.workflow_steps(wf.id).unwrap()[0].completed_at, Some(stamped));

        let wf = store
            .save_steps(
                wf.id,
                &[StepChange::Delete(b.id), StepChange::Create(manual_step("C", 3))],
            )
            .unwrap();
        assert_eq!(wf.status, WorkflowStatus::InProgress);
        assert!(wf.completed_at.is_none());
        let names: Vec<_> = store.workflow_steps(wf.id).unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["A", "C"]);
    }

    #[test]
    fn formset_reuses_orders_it_frees() {
        let mut store = Store::open().unwrap();
        let m = store.create_matter(&matter_input("Misc"), None).unwrap();
        let wf = store.instantiate_workflow(m.id, None).unwrap();
        let a = store.add_step(wf.id, &manual_step("A", 1)).unwrap();
        let b = store.add_step(wf.id, &manual_step("B", 2)).unwrap();
        let c = store.add_step(wf.id, &manual_step("C", 3)).unwrap();

        // Delete B and add D in its place; swap A and C.
        let mut renamed = manual_step("A, renamed", 3);
        renamed.status = StepStatus::InProgress;
        store
            .save_steps(
                wf.id,
                &[
                    StepChange::Update { id: a.id, step: renamed },
                    StepChange::Delete(b.id),
                    StepChange::Update { id: c.id, step: manual_step("C", 1) },
                    StepChange::Create(manual_step("D", 2)),
                ],
            )
            .unwrap();
        let steps: Vec<_> = store
            .workflow_steps(wf.id)
            .unwrap()
            .into_iter()
            .map(|s| (s.name, s.order))
            .collect();
        assert_eq!(steps, [("C".to_string(), 1), ("D".to_string(), 2), ("A, renamed".to_string(), 3)]);

        // Saving again with the same orders touches no keys.
        let wf = store
            .save_steps(wf.id, &[StepChange::Update { id: c.id, step: manual_step("C", 1) }])
            .unwrap();
        assert_eq!(wf.status, WorkflowStatus::InProgress);
    }

    #[test]
    fn formset_rejects_clashing_orders_before_writing() {
        let mut store = Store::open().unwrap();
        let m = store.create_matter(&matter_input("Misc"), None).unwrap();
        let wf = store.instantiate_workflow(m.id, None).unwrap();
        let a = store.add_step(wf.id, &manual_step("A", 1)).unwrap();
        let b = store.add_step(wf.id, &manual_step("B", 2)).unwrap();

        let err = store
            .save_steps(
                wf.id,
                &[
                    StepChange::Delete(a.id),
                    StepChange::Create(manual_step("C", 2)),
                ],
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(ref msg) if msg == DUPLICATE_STEP_ORDER));
        let names: Vec<_> = store.workflow_steps(wf.id).unwrap().into_iter().map(|s| s.name).collect();
        assert_eq!(names, ["A", "B"]);

        let err = store
            .save_steps(wf.id, &[StepChange::Update { id: b.id + 100, step: manual_step("X", 9) }])
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn deleting_template_detaches_workflows() {
        let mut store = Store::open().unwrap();
        let t = template_with_steps(&store, "Will", &[("Draft", 1)]);
        let m = store.create_matter(&matter_input("Will"), None).unwrap();
        let wf = store.instantiate_workflow(m.id, Some(t.id)).unwrap();
        store.delete_workflow_template(t.id).unwrap();

        let wf = store.get_workflow(wf.id).unwrap();
        assert_eq!(wf.template_id, None);
        let steps = store.workflow_steps(wf.id).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step_template_id, None);
    }

    #[test]
    fn ai_steps_round_trip() {
        let mut store = Store::open().unwrap();
        let m = store.create_matter(&matter_input("Misc"), None).unwrap();
        let wf = store.instantiate_workflow(m.id, None).unwrap();
        store
            .set_ai_generated_steps(wf.id, &["Verify identity".into(), "Draft deed".into()])
            .unwrap();
        assert_eq!(store.get_workflow(wf.id).unwrap().ai_generated_steps.len(), 2);
    }
}
