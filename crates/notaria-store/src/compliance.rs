//! Compliance templates, questions, checks and answers.

use chrono::NaiveDateTime;
use duckdb::{OptionalExt, Row, params};
use notaria_core::compliance::{QuestionInput, missing_required, status_after_answers};
use notaria_core::matter::TemplateInput;
use notaria_core::{
    AnswerInput, CheckInput, ComplianceAnswer, ComplianceCheck, ComplianceQuestion, ComplianceStatus,
    ComplianceTemplate, ServiceName,
};
use serde_json::Value;
use tracing::info;

use crate::error::ConstraintExt;
use crate::store::{fmt_json, fmt_opt_date, fmt_opt_ts, fmt_ts, opt_date, opt_json, opt_ts, parsed, ts};
use crate::{Scope, Store, StoreError};

const TEMPLATE_COLUMNS: &str = "id, name, description, created_at, updated_at";
const QUESTION_COLUMNS: &str = "q.id, q.question_text, q.answer_type, q.choice_options, q.is_required";
const CHECK_COLUMNS: &str = "id, client_id, matter_id, template_id, initiated_by, initiated_at, \
                             completed_at, status, credas_check_id, credas_result, \
                             peps_sanctions_check_id, peps_sanctions_result, notes";
const ANSWER_COLUMNS: &str = "id, check_id, question_id, answer_text, answer_boolean, answer_choice, \
                              answer_date, answer_file, answered_by, answered_at";

fn read_template(row: &Row<'_>) -> duckdb::Result<ComplianceTemplate> {
    Ok(ComplianceTemplate {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        created_at: ts(row, 3)?,
        updated_at: ts(row, 4)?,
    })
}

fn read_question(row: &Row<'_>) -> duckdb::Result<ComplianceQuestion> {
    Ok(ComplianceQuestion {
        id: row.get(0)?,
        question_text: row.get(1)?,
        answer_type: parsed(row, 2)?,
        choice_options: row.get(3)?,
        is_required: row.get(4)?,
    })
}

fn read_check(row: &Row<'_>) -> duckdb::Result<ComplianceCheck> {
    Ok(ComplianceCheck {
        id: row.get(0)?,
        client_id: row.get(1)?,
        matter_id: row.get(2)?,
        template_id: row.get(3)?,
        initiated_by: row.get(4)?,
        initiated_at: ts(row, 5)?,
        completed_at: opt_ts(row, 6)?,
        status: parsed(row, 7)?,
        credas_check_id: row.get(8)?,
        credas_result: opt_json(row, 9)?,
        peps_sanctions_check_id: row.get(10)?,
        peps_sanctions_result: opt_json(row, 11)?,
        notes: row.get(12)?,
    })
}

fn read_answer(row: &Row<'_>) -> duckdb::Result<ComplianceAnswer> {
    Ok(ComplianceAnswer {
        id: row.get(0)?,
        check_id: row.get(1)?,
        question_id: row.get(2)?,
        answer_text: row.get(3)?,
        answer_boolean: row.get(4)?,
        answer_choice: row.get(5)?,
        answer_date: opt_date(row, 6)?,
        answer_file: row.get(7)?,
        answered_by: row.get(8)?,
        answered_at: ts(row, 9)?,
    })
}

/// Reference and result columns for a verification provider.
fn provider_columns(service: ServiceName) -> Result<(&'static str, &'static str), StoreError> {
    match service {
        ServiceName::Credas => Ok(("credas_check_id", "credas_result")),
        ServiceName::PepsSanctions => Ok(("peps_sanctions_check_id", "peps_sanctions_result")),
        other => Err(StoreError::InvalidValue(format!("{other} is not a verification provider"))),
    }
}

impl Store {
    // ── Templates and questions ──

    pub fn create_compliance_template(&self, input: &TemplateInput) -> Result<ComplianceTemplate, StoreError> {
        let now = fmt_ts(notaria_core::now());
        let id: i64 = self
            .conn
            .query_row(
                "INSERT INTO compliance_templates (name, description, created_at, updated_at) \
                 VALUES (?, ?, ?, ?) RETURNING id",
                params![input.name, input.description, now, now],
                |row| row.get(0),
            )
            .on_conflict("A compliance template with this name already exists.")?;
        info!(template_id = id, name = %input.name, "created compliance template");
        self.get_compliance_template(id)
    }

    pub fn get_compliance_template(&self, id: i64) -> Result<ComplianceTemplate, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM compliance_templates WHERE id = ?"),
                [id],
                read_template,
            )
            .optional()?
            .ok_or(StoreError::not_found("compliance template", id))
    }

    pub fn find_compliance_template(&self, name: &str) -> Result<Option<ComplianceTemplate>, StoreError> {
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {TEMPLATE_COLUMNS} FROM compliance_templates WHERE name = ?"),
                [name],
                read_template,
            )
            .optional()?)
    }

    pub fn list_compliance_templates(&self) -> Result<Vec<ComplianceTemplate>, StoreError> {
        self.query_list(
            &format!("SELECT {TEMPLATE_COLUMNS} FROM compliance_templates ORDER BY name"),
            &[],
            read_template,
        )
    }

    pub fn create_question(&self, input: &QuestionInput) -> Result<ComplianceQuestion, StoreError> {
        let id: i64 = self.conn.query_row(
            "INSERT INTO compliance_questions (question_text, answer_type, choice_options, is_required) \
             VALUES (?, ?, ?, ?) RETURNING id",
            params![
                input.question_text,
                input.answer_type.as_str(),
                input.choice_options,
                input.is_required,
            ],
            |row| row.get(0),
        )?;
        Ok(ComplianceQuestion {
            id,
            question_text: input.question_text.clone(),
            answer_type: input.answer_type,
            choice_options: input.choice_options.clone(),
            is_required: input.is_required,
        })
    }

    pub fn attach_question(&self, template_id: i64, question_id: i64, order: i32) -> Result<(), StoreError> {
        self.conn
            .execute(
                "INSERT INTO compliance_template_questions (template_id, question_id, question_order) \
                 VALUES (?, ?, ?)",
                params![template_id, question_id, order],
            )
            .on_conflict("This question is already part of the template.")?;
        Ok(())
    }

    /// Questions of a template in template order.
    pub fn template_questions(&self, template_id: i64) -> Result<Vec<ComplianceQuestion>, StoreError> {
        self.query_list(
            &format!(
                "SELECT {QUESTION_COLUMNS} FROM compliance_questions q \
                 JOIN compliance_template_questions tq ON tq.question_id = q.id \
                 WHERE tq.template_id = ? ORDER BY tq.question_order, q.id"
            ),
            &[&template_id],
            read_question,
        )
    }

    /// Questions to show for a check: its template's, or none.
    pub fn check_questions(&self, check: &ComplianceCheck) -> Result<Vec<ComplianceQuestion>, StoreError> {
        match check.template_id {
            Some(tid) => self.template_questions(tid),
            None => Ok(Vec::new()),
        }
    }

    // ── Checks ──

    /// Create a pending check with a blank answer row per template question.
    pub fn initiate_check(&mut self, input: &CheckInput, initiated_by: Option<i64>) -> Result<ComplianceCheck, StoreError> {
        if let Some(cid) = input.client_id {
            self.get_client(cid)?;
        }
        if let Some(mid) = input.matter_id {
            self.get_matter(mid)?;
        }
        let questions = match input.template_id {
            Some(tid) => {
                self.get_compliance_template(tid)?;
                self.template_questions(tid)?
            }
            None => Vec::new(),
        };

        let now = fmt_ts(notaria_core::now());
        let tx = self.conn.transaction()?;
        let id: i64 = tx.query_row(
            "INSERT INTO compliance_checks (client_id, matter_id, template_id, initiated_by, \
             initiated_at, status, notes) VALUES (?, ?, ?, ?, ?, ?, ?) RETURNING id",
            params![
                input.client_id,
                input.matter_id,
                input.template_id,
                initiated_by,
                now,
                ComplianceStatus::Pending.as_str(),
                input.notes,
            ],
            |row| row.get(0),
        )?;
        for q in &questions {
            tx.execute(
                "INSERT INTO compliance_answers (check_id, question_id, answered_at) VALUES (?, ?, ?)",
                params![id, q.id, now],
            )?;
        }
        tx.commit()?;
        info!(check_id = id, questions = questions.len(), "initiated compliance check");
        self.get_check(id)
    }

    pub fn get_check(&self, id: i64) -> Result<ComplianceCheck, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {CHECK_COLUMNS} FROM compliance_checks WHERE id = ?"),
                [id],
                read_check,
            )
            .optional()?
            .ok_or(StoreError::not_found("compliance check", id))
    }

    pub fn list_checks(&self, scope: Scope) -> Result<Vec<ComplianceCheck>, StoreError> {
        match scope {
            Scope::All => self.query_list(
                &format!("SELECT {CHECK_COLUMNS} FROM compliance_checks ORDER BY initiated_at DESC, id DESC"),
                &[],
                read_check,
            ),
            Scope::Owner(uid) => self.query_list(
                &format!(
                    "SELECT {CHECK_COLUMNS} FROM compliance_checks WHERE initiated_by = ? \
                     ORDER BY initiated_at DESC, id DESC"
                ),
                &[&uid],
                read_check,
            ),
        }
    }

    pub fn answers(&self, check_id: i64) -> Result<Vec<ComplianceAnswer>, StoreError> {
        self.query_list(
            &format!("SELECT {ANSWER_COLUMNS} FROM compliance_answers WHERE check_id = ? ORDER BY id"),
            &[&check_id],
            read_answer,
        )
    }

    /// Save the answer formset in one transaction, then advance the status:
    /// pending becomes in progress, and once every required question is
    /// answered the check waits for review.
    pub fn save_answers(
        &mut self,
        check_id: i64,
        answers: &[AnswerInput],
        answered_by: Option<i64>,
    ) -> Result<ComplianceCheck, StoreError> {
        let check = self.get_check(check_id)?;
        let questions = self.check_questions(&check)?;
        let now = fmt_ts(notaria_core::now());

        let tx = self.conn.transaction()?;
        for a in answers {
            let existing: Option<i64> = tx
                .query_row(
                    "SELECT id FROM compliance_answers WHERE check_id = ? AND question_id = ?",
                    [check_id, a.question_id],
                    |row| row.get(0),
                )
                .optional()?;
            match existing {
                Some(answer_id) => {
                    tx.execute(
                        "UPDATE compliance_answers SET answer_text = ?, answer_boolean = ?, \
                         answer_choice = ?, answer_date = ?, answer_file = ?, answered_by = ?, \
                         answered_at = ? WHERE id = ?",
                        params![
                            a.text,
                            a.boolean,
                            a.choice,
                            fmt_opt_date(a.date),
                            a.file,
                            answered_by,
                            now,
                            answer_id,
                        ],
                    )?;
                }
                None => {
                    tx.execute(
                        "INSERT INTO compliance_answers (check_id, question_id, answer_text, \
                         answer_boolean, answer_choice, answer_date, answer_file, answered_by, \
                         answered_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                        params![
                            check_id,
                            a.question_id,
                            a.text,
                            a.boolean,
                            a.choice,
                            fmt_opt_date(a.date),
                            a.file,
                            answered_by,
                            now,
                        ],
                    )
                    .on_conflict("This question already has an answer for this check.")?;
                }
            }
        }
        tx.commit()?;

        let saved = self.answers(check_id)?;
        let complete = missing_required(&questions, &saved).is_empty();
        let status = status_after_answers(check.status, complete);
        if status != check.status {
            self.set_check_status(check_id, status, check.completed_at)?;
        }
        info!(check_id, answers = answers.len(), status = %status, "saved compliance answers");
        self.get_check(check_id)
    }

    pub fn set_check_status(
        &self,
        id: i64,
        status: ComplianceStatus,
        completed_at: Option<NaiveDateTime>,
    ) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE compliance_checks SET status = ?, completed_at = ? WHERE id = ?",
            params![status.as_str(), fmt_opt_ts(completed_at), id],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("compliance check", id));
        }
        Ok(())
    }

    /// Remember the provider's reference for a submitted verification.
    pub fn record_provider_reference(
        &self,
        id: i64,
        service: ServiceName,
        reference: &str,
        status: ComplianceStatus,
    ) -> Result<(), StoreError> {
        let (ref_col, _) = provider_columns(service)?;
        let changed = self.conn.execute(
            &format!("UPDATE compliance_checks SET {ref_col} = ?, status = ? WHERE id = ?"),
            params![reference, status.as_str(), id],
        )?;
        if changed == 0 {
            return Err(StoreError::not_found("compliance check", id));
        }
        Ok(())
    }

    /// Check submitted to `service` under the provider's `reference`.
    pub fn check_by_reference(
        &self,
        service: ServiceName,
        reference: &str,
    ) -> Result<Option<ComplianceCheck>, StoreError> {
        let (ref_col, _) = provider_columns(service)?;
        Ok(self
            .conn
            .query_row(
                &format!("SELECT {CHECK_COLUMNS} FROM compliance_checks WHERE {ref_col} = ? ORDER BY id LIMIT 1"),
                [reference],
                read_check,
            )
            .optional()?)
    }

    /// Store a provider result, optionally moving the status.
    pub fn record_provider_result(
        &self,
        id: i64,
        service: ServiceName,
        result: &Value,
        status: Option<ComplianceStatus>,
    ) -> Result<ComplianceCheck, StoreError> {
        let (_, result_col) = provider_columns(service)?;
        let check = self.get_check(id)?;
        let status = status.unwrap_or(check.status);
        self.conn.execute(
            &format!("UPDATE compliance_checks SET {result_col} = ?, status = ? WHERE id = ?"),
            params![fmt_json(result), status.as_str(), id],
        )?;
        info!(check_id = id, service = %service, status = %status, "stored provider result");
        self.get_check(id)
    }
}
