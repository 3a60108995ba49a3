//! Compliance (KYC/AML) checks, their question templates and answers.
//!
//! Status transitions:
//!
//! ```text
//! pending ──answers saved──▶ in_progress ──all required answered──▶ requires_review
//!    │                                                                   │
//!    └──provider triggered──▶ in_progress      reviewer decision ──▶ passed | failed
//!
//! webhook "completed" ──▶ requires_review     webhook "failed" ──▶ failed
//! provider call error ──▶ error
//! ```

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::forms::{self, FormData, FormErrors};

string_enum! {
    pub enum ComplianceStatus {
        Pending => ("pending", "Pending"),
        InProgress => ("in_progress", "In Progress"),
        RequiresReview => ("requires_review", "Requires Review"),
        Passed => ("passed", "Passed"),
        Failed => ("failed", "Failed"),
        Cancelled => ("cancelled", "Cancelled"),
        Error => ("error", "Error"),
    }
}

impl ComplianceStatus {
    /// Still awaiting work or review.
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            ComplianceStatus::Pending | ComplianceStatus::InProgress | ComplianceStatus::RequiresReview
        )
    }
}

string_enum! {
    pub enum AnswerType {
        Text => ("text", "Text"),
        Boolean => ("boolean", "Yes/No"),
        Choice => ("choice", "Multiple Choice"),
        Date => ("date", "Date"),
        File => ("file", "File Upload"),
    }
}

string_enum! {
    /// Final decisions a reviewer can record.
    pub enum EvaluationDecision {
        Passed => ("passed", "Passed"),
        Failed => ("failed", "Failed"),
        RequiresReview => ("requires_review", "Requires Review"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceTemplate {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceQuestion {
    pub id: i64,
    pub question_text: String,
    pub answer_type: AnswerType,
    /// Comma separated, only for choice questions.
    pub choice_options: Option<String>,
    pub is_required: bool,
}

impl ComplianceQuestion {
    pub fn choices(&self) -> Vec<String> {
        self.choice_options
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Question definition as loaded from a seed file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QuestionInput {
    pub question_text: String,
    pub answer_type: AnswerType,
    #[serde(default)]
    pub choice_options: Option<String>,
    #[serde(default)]
    pub is_required: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceCheck {
    pub id: i64,
    pub client_id: Option<i64>,
    pub matter_id: Option<i64>,
    pub template_id: Option<i64>,
    pub initiated_by: Option<i64>,
    pub initiated_at: NaiveDateTime,
    pub completed_at: Option<NaiveDateTime>,
    pub status: ComplianceStatus,
    pub credas_check_id: Option<String>,
    pub credas_result: Option<Value>,
    pub peps_sanctions_check_id: Option<String>,
    pub peps_sanctions_result: Option<Value>,
    pub notes: Option<String>,
}

/// Initiation form: everything optional, references checked by the caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckInput {
    pub client_id: Option<i64>,
    pub matter_id: Option<i64>,
    pub template_id: Option<i64>,
    pub notes: Option<String>,
}

impl CheckInput {
    pub fn from_form(form: &FormData) -> Result<Self, FormErrors> {
        let mut errors = FormErrors::new();
        let input = Self {
            client_id: forms::optional_id(form, "client", &mut errors),
            matter_id: forms::optional_id(form, "matter", &mut errors),
            template_id: forms::optional_id(form, "template", &mut errors),
            notes: form.text("notes"),
        };
        errors.into_result(input)
    }
}

// ── Answers ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceAnswer {
    pub id: i64,
    pub check_id: i64,
    pub question_id: i64,
    pub answer_text: Option<String>,
    pub answer_boolean: Option<bool>,
    pub answer_choice: Option<String>,
    pub answer_date: Option<NaiveDate>,
    pub answer_file: Option<String>,
    pub answered_by: Option<i64>,
    pub answered_at: NaiveDateTime,
}

impl ComplianceAnswer {
    pub fn is_answered(&self) -> bool {
        self.answer_text.as_deref().is_some_and(|t| !t.trim().is_empty())
            || self.answer_boolean.is_some()
            || self.answer_choice.is_some()
            || self.answer_date.is_some()
            || self.answer_file.is_some()
    }

    /// Rendered value for reports.
    pub fn display_value(&self) -> String {
        if let Some(b) = self.answer_boolean {
            return if b { "Yes" } else { "No" }.to_string();
        }
        if let Some(d) = self.answer_date {
            return d.format("%Y-%m-%d").to_string();
        }
        self.answer_text
            .clone()
            .or_else(|| self.answer_choice.clone())
            .or_else(|| self.answer_file.clone())
            .unwrap_or_default()
    }
}

/// One submitted answer, typed per question.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnswerInput {
    pub question_id: i64,
    pub text: Option<String>,
    pub boolean: Option<bool>,
    pub choice: Option<String>,
    pub date: Option<NaiveDate>,
    pub file: Option<String>,
}

impl AnswerInput {
    pub fn is_answered(&self) -> bool {
        self.text.is_some()
            || self.boolean.is_some()
            || self.choice.is_some()
            || self.date.is_some()
            || self.file.is_some()
    }
}

/// Form field for an answer: `answer-<question id>-<answer type>`.
pub fn answer_field(question: &ComplianceQuestion) -> String {
    format!("answer-{}-{}", question.id, question.answer_type.as_str())
}

fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "on" | "1" => Some(true),
        "no" | "false" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Parse the answer formset for `questions`. Blank answers are allowed here;
/// required questions are enforced at evaluation time.
pub fn parse_answers(
    form: &FormData,
    questions: &[ComplianceQuestion],
) -> Result<Vec<AnswerInput>, FormErrors> {
    let mut errors = FormErrors::new();
    let mut answers = Vec::with_capacity(questions.len());
    for q in questions {
        let field = answer_field(q);
        let mut answer = AnswerInput {
            question_id: q.id,
            ..AnswerInput::default()
        };
        if let Some(raw) = form.text(&field) {
            match q.answer_type {
                AnswerType::Text => answer.text = Some(raw),
                AnswerType::File => answer.file = Some(raw),
                AnswerType::Boolean => match parse_boolean(&raw) {
                    Some(b) => answer.boolean = Some(b),
                    None => errors.add(&field, "Answer yes or no."),
                },
                AnswerType::Choice => {
                    if q.choices().contains(&raw) {
                        answer.choice = Some(raw);
                    } else {
                        errors.add(
                            &field,
                            format!("Select a valid choice. {raw} is not one of the available choices."),
                        );
                    }
                }
                AnswerType::Date => answer.date = forms::optional_date(form, &field, &mut errors),
            }
        }
        answers.push(answer);
    }
    errors.into_result(answers)
}

/// Required questions without an answer.
pub fn missing_required<'a>(
    questions: &'a [ComplianceQuestion],
    answers: &[ComplianceAnswer],
) -> Vec<&'a ComplianceQuestion> {
    questions
        .iter()
        .filter(|q| q.is_required)
        .filter(|q| {
            !answers
                .iter()
                .any(|a| a.question_id == q.id && a.is_answered())
        })
        .collect()
}

// ── Transitions ──

/// Status after an answer save.
pub fn status_after_answers(current: ComplianceStatus, all_required_answered: bool) -> ComplianceStatus {
    match current {
        ComplianceStatus::Pending | ComplianceStatus::InProgress if all_required_answered => {
            ComplianceStatus::RequiresReview
        }
        ComplianceStatus::Pending => ComplianceStatus::InProgress,
        other => other,
    }
}

/// Status after a provider accepted a verification request.
pub fn status_after_trigger(current: ComplianceStatus) -> ComplianceStatus {
    match current {
        ComplianceStatus::InProgress | ComplianceStatus::RequiresReview => current,
        _ => ComplianceStatus::InProgress,
    }
}

/// Status and completion stamp after a reviewer decision.
pub fn evaluate(
    decision: EvaluationDecision,
    missing_required: usize,
    now: NaiveDateTime,
) -> Result<(ComplianceStatus, Option<NaiveDateTime>), String> {
    match decision {
        EvaluationDecision::Passed if missing_required > 0 => Err(format!(
            "{missing_required} required question(s) are unanswered; the check cannot pass."
        )),
        EvaluationDecision::Passed => Ok((ComplianceStatus::Passed, Some(now))),
        EvaluationDecision::Failed => Ok((ComplianceStatus::Failed, Some(now))),
        EvaluationDecision::RequiresReview => Ok((ComplianceStatus::RequiresReview, None)),
    }
}

// ── Provider webhooks ──

/// Body posted by Credas and the sanctions provider. `check_id` is the
/// provider's own reference, as stored when the check was submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookPayload {
    pub check_id: String,
    pub status: Option<String>,
    pub result: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookRejection {
    InvalidJson,
    MissingCheckId,
}

impl WebhookRejection {
    pub fn message(&self) -> &'static str {
        match self {
            WebhookRejection::InvalidJson => "Invalid JSON payload",
            WebhookRejection::MissingCheckId => "Missing check_id",
        }
    }
}

impl WebhookPayload {
    /// Accepts `check_id` as a string or a number.
    pub fn parse(body: &[u8]) -> Result<Self, WebhookRejection> {
        let value: Value = serde_json::from_slice(body).map_err(|_| WebhookRejection::InvalidJson)?;
        let Value::Object(map) = value else {
            return Err(WebhookRejection::InvalidJson);
        };
        let check_id = match map.get("check_id") {
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
        .ok_or(WebhookRejection::MissingCheckId)?;
        Ok(Self {
            check_id,
            status: map.get("status").and_then(Value::as_str).map(str::to_string),
            result: map.get("result").cloned().unwrap_or(Value::Null),
        })
    }

    /// Check status implied by the provider status, if any.
    pub fn outcome(&self) -> Option<ComplianceStatus> {
        match self.status.as_deref() {
            Some("completed") => Some(ComplianceStatus::RequiresReview),
            Some("failed") => Some(ComplianceStatus::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: i64, answer_type: AnswerType, required: bool) -> ComplianceQuestion {
        ComplianceQuestion {
            id,
            question_text: format!("Q{id}"),
            answer_type,
            choice_options: Some("Low, Medium, High".into()),
            is_required: required,
        }
    }

    fn answered(question_id: i64, text: Option<&str>) -> ComplianceAnswer {
        ComplianceAnswer {
            id: question_id * 10,
            check_id: 1,
            question_id,
            answer_text: text.map(str::to_string),
            answer_boolean: None,
            answer_choice: None,
            answer_date: None,
            answer_file: None,
            answered_by: Some(1),
            answered_at: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn parse_typed_answers() {
        let qs = vec![
            question(1, AnswerType::Boolean, true),
            question(2, AnswerType::Choice, false),
            question(3, AnswerType::Date, false),
            question(4, AnswerType::Text, false),
        ];
        let form = FormData::from_slice(&[
            ("answer-1-boolean", "Yes"),
            ("answer-2-choice", "Medium"),
            ("answer-3-date", "2024-06-30"),
        ]);
        let answers = parse_answers(&form, &qs).unwrap();
        assert_eq!(answers[0].boolean, Some(true));
        assert_eq!(answers[1].choice.as_deref(), Some("Medium"));
        assert_eq!(answers[2].date, NaiveDate::from_ymd_opt(2024, 6, 30));
        assert!(!answers[3].is_answered());
    }

    #[test]
    fn invalid_choice_and_boolean() {
        let qs = vec![question(1, AnswerType::Boolean, true), question(2, AnswerType::Choice, false)];
        let form = FormData::from_slice(&[("answer-1-boolean", "maybe"), ("answer-2-choice", "Extreme")]);
        let errors = parse_answers(&form, &qs).unwrap_err();
        assert!(errors.has("answer-1-boolean"));
        assert!(errors.has("answer-2-choice"));
    }

    #[test]
    fn missing_required_ignores_blank_text() {
        let qs = vec![question(1, AnswerType::Text, true), question(2, AnswerType::Text, false)];
        let answers = vec![answered(1, Some("  "))];
        assert_eq!(missing_required(&qs, &answers).len(), 1);
        let answers = vec![answered(1, Some("done"))];
        assert!(missing_required(&qs, &answers).is_empty());
    }

    #[test]
    fn answer_transitions() {
        use ComplianceStatus::*;
        assert_eq!(status_after_answers(Pending, false), InProgress);
        assert_eq!(status_after_answers(Pending, true), RequiresReview);
        assert_eq!(status_after_answers(InProgress, true), RequiresReview);
        assert_eq!(status_after_answers(Passed, true), Passed);
    }

    #[test]
    fn trigger_transitions() {
        use ComplianceStatus::*;
        assert_eq!(status_after_trigger(Pending), InProgress);
        assert_eq!(status_after_trigger(Error), InProgress);
        assert_eq!(status_after_trigger(RequiresReview), RequiresReview);
    }

    #[test]
    fn pass_requires_answers() {
        let now = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert!(evaluate(EvaluationDecision::Passed, 2, now).is_err());
        assert_eq!(
            evaluate(EvaluationDecision::Passed, 0, now).unwrap(),
            (ComplianceStatus::Passed, Some(now))
        );
        assert_eq!(
            evaluate(EvaluationDecision::Failed, 3, now).unwrap(),
            (ComplianceStatus::Failed, Some(now))
        );
    }

    #[test]
    fn webhook_parsing() {
        let p = WebhookPayload::parse(br#"{"check_id": "12", "status": "completed", "result": {"score": 9}}"#).unwrap();
        assert_eq!(p.check_id, "12");
        assert_eq!(p.outcome(), Some(ComplianceStatus::RequiresReview));

        let p = WebhookPayload::parse(br#"{"check_id": 3, "status": "processing"}"#).unwrap();
        assert_eq!(p.check_id, "3");
        assert_eq!(p.outcome(), None);
        assert_eq!(p.result, Value::Null);

        assert_eq!(WebhookPayload::parse(b"not json"), Err(WebhookRejection::InvalidJson));
        assert_eq!(WebhookPayload::parse(b"[1]"), Err(WebhookRejection::InvalidJson));
        assert_eq!(
            WebhookPayload::parse(br#"{"status": "failed"}"#),
            Err(WebhookRejection::MissingCheckId)
        );
        assert_eq!(
            WebhookPayload::parse(br#"{"check_id": "  "}"#),
            Err(WebhookRejection::MissingCheckId)
        );
    }
}
