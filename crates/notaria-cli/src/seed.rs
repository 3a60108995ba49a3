//! Template seeding from a JSON file.
//!
//! ```json
//! {
//!   "workflow_templates": [
//!     {"name": "Property sale", "steps": [{"name": "ID check", "order": 1}]}
//!   ],
//!   "compliance_templates": [
//!     {"name": "Standard KYC", "questions": [
//!       {"question_text": "Is the client a PEP?", "answer_type": "boolean", "is_required": true}
//!     ]}
//!   ]
//! }
//! ```
//!
//! Templates are matched by name; existing ones are left alone.

use anyhow::Context;
use notaria_core::compliance::QuestionInput;
use notaria_core::matter::{StepTemplateInput, TemplateInput};
use notaria_store::Store;
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub workflow_templates: Vec<WorkflowSeed>,
    #[serde(default)]
    pub compliance_templates: Vec<ComplianceSeed>,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowSeed {
    #[serde(flatten)]
    pub template: TemplateInput,
    #[serde(default)]
    pub steps: Vec<StepTemplateInput>,
}

#[derive(Debug, Deserialize)]
pub struct ComplianceSeed {
    #[serde(flatten)]
    pub template: TemplateInput,
    #[serde(default)]
    pub questions: Vec<QuestionInput>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub workflow_templates: usize,
    pub compliance_templates: usize,
    pub skipped: usize,
}

pub fn apply(store: &Store, seed: &SeedFile) -> anyhow::Result<SeedReport> {
    let mut report = SeedReport::default();

    for wf in &seed.workflow_templates {
        if store.find_workflow_template(&wf.template.name)?.is_some() {
            report.skipped += 1;
            continue;
        }
        let template = store.create_workflow_template(&wf.template)?;
        for step in &wf.steps {
            store
                .add_step_template(template.id, step)
                .with_context(|| format!("step {:?} of workflow template {:?}", step.name, template.name))?;
        }
        info!(template = %template.name, steps = wf.steps.len(), "seeded workflow template");
        report.workflow_templates += 1;
    }

    for ct in &seed.compliance_templates {
        if store.find_compliance_template(&ct.template.name)?.is_some() {
            report.skipped += 1;
            continue;
        }
        let template = store.create_compliance_template(&ct.template)?;
        for (i, q) in ct.questions.iter().enumerate() {
            let question = store.create_question(q)?;
            store.attach_question(template.id, question.id, i as i32 + 1)?;
        }
        info!(template = %template.name, questions = ct.questions.len(), "seeded compliance template");
        report.compliance_templates += 1;
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notaria_core::AnswerType;
    use tempfile::TempDir;

    const SEED: &str = r#"{
        "workflow_templates": [
            {"name": "Property sale", "description": "Residential conveyancing",
             "steps": [
                {"name": "Identity check", "order": 1},
                {"name": "Draft deed", "order": 2, "is_required": false}
             ]}
        ],
        "compliance_templates": [
            {"name": "Standard KYC", "questions": [
                {"question_text": "Is the client a PEP?", "answer_type": "boolean", "is_required": true},
                {"question_text": "Risk level", "answer_type": "choice", "choice_options": "Low, High"}
            ]}
        ]
    }"#;

    #[test]
    fn seeds_once() {
        let dir = TempDir::new().unwrap();
        let store = Store::open_persistent(&dir.path().join("seed.duckdb")).unwrap();
        let seed: SeedFile = serde_json::from_str(SEED).unwrap();

        let report = apply(&store, &seed).unwrap();
        assert_eq!(report.workflow_templates, 1);
        assert_eq!(report.compliance_templates, 1);

        let wf = store.find_workflow_template("Property sale").unwrap().unwrap();
        let steps = store.step_templates(wf.id).unwrap();
        assert_eq!(steps.len(), 2);
        assert!(steps[0].is_required);
        assert!(!steps[1].is_required);

        let ct = store.find_compliance_template("Standard KYC").unwrap().unwrap();
        let questions = store.template_questions(ct.id).unwrap();
        assert_eq!(questions[1].answer_type, AnswerType::Choice);
        assert_eq!(questions[1].choices(), vec!["Low", "High"]);

        let again = apply(&store, &seed).unwrap();
        assert_eq!(again, SeedReport { skipped: 2, ..SeedReport::default() });
    }
}
