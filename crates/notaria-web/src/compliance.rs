//! Compliance check pages: initiate, answer, provider verification,
//! reviewer decision and the printable report.

use axum::Router;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use notaria_core::access::Action;
use notaria_core::compliance::{self, answer_field, missing_required, parse_answers, status_after_trigger};
use notaria_core::integration::LogLevel;
use notaria_core::{
    AnswerType, CheckInput, ComplianceAnswer, ComplianceCheck, ComplianceQuestion, ComplianceStatus,
    EvaluationDecision, FormData, FormErrors, ServiceName,
};
use notaria_integrations::Subject;
use notaria_store::Scope;
use serde_json::Value;
use tracing::{info, warn};

use crate::forms::{Posted, flash_errors};
use crate::gate::require;
use crate::outbound;
use crate::render::{self, choices, definition_list, escape, input, link, select, table, text, textarea};
use crate::session::CurrentUser;
use crate::{AppError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/compliance/", get(check_list))
        .route("/compliance/initiate/", get(initiate_page).post(initiate))
        .route("/compliance/:id/", get(check_detail))
        .route("/compliance/:id/answer/", get(answer_page).post(answer))
        .route("/compliance/:id/trigger-credas/", post(trigger_credas))
        .route("/compliance/:id/trigger-peps-sanctions/", post(trigger_peps_sanctions))
        .route("/compliance/:id/evaluate/", get(evaluate_page).post(evaluate))
        .route("/compliance/:id/report/", get(report))
}

const CHECK_LIST: &str = "/compliance/";

fn check_url(id: i64) -> String {
    format!("/compliance/{id}/")
}

/// Names for the check's client, matter and template, where linked.
struct Links {
    client: Option<String>,
    matter: Option<String>,
    template: Option<String>,
}

fn links(app: &AppState, check: &ComplianceCheck) -> Result<Links, AppError> {
    let store = app.db()?;
    Ok(Links {
        client: check.client_id.map(|id| store.get_client(id)).transpose()?.map(|c| c.display_name()),
        matter: check.matter_id.map(|id| store.get_matter(id)).transpose()?.map(|m| m.protocol_number),
        template: check.template_id.map(|id| store.get_compliance_template(id)).transpose()?.map(|t| t.name),
    })
}

async fn check_list(State(app): State<AppState>, me: CurrentUser) -> Result<Response, AppError> {
    let checks = app.db()?.list_checks(Scope::for_user(&me.user))?;
    let mut rows = Vec::with_capacity(checks.len());
    for check in &checks {
        let names = links(&app, check)?;
        rows.push(vec![
            link(&check_url(check.id), &format!("Check #{}", check.id)),
            text(names.client.as_deref()),
            text(names.template.as_deref()),
            check.status.label().into(),
            render::timestamp(Some(check.initiated_at)),
        ]);
    }
    let body = format!(
        "<p>{}</p>{}",
        link("/compliance/initiate/", "Initiate check"),
        table(&["Check", "Client", "Template", "Status", "Initiated"], rows, "No compliance checks yet.")
    );
    Ok(me.render("Compliance Checks", &body))
}

// ── Initiate ──

fn initiate_form(app: &AppState, me: &CurrentUser, values: &FormData) -> Result<String, AppError> {
    let store = app.db()?;
    let scope = Scope::for_user(&me.user);
    let clients: Vec<(String, String)> = store
        .list_clients(scope)?
        .iter()
        .map(|c| (c.id.to_string(), c.display_name()))
        .collect();
    let matters: Vec<(String, String)> = store
        .list_matters(scope)?
        .into_iter()
        .map(|m| (m.id.to_string(), format!("{} {}", m.protocol_number, m.title)))
        .collect();
    let templates: Vec<(String, String)> = store
        .list_compliance_templates()?
        .into_iter()
        .map(|t| (t.id.to_string(), t.name))
        .collect();
    let fields = [
        select(values, "client", "Client", &clients, true),
        select(values, "matter", "Matter", &matters, true),
        select(values, "template", "Question template", &templates, true),
        textarea(values, "notes", "Notes"),
    ]
    .concat();
    Ok(render::form("/compliance/initiate/", &fields, "Initiate"))
}

async fn initiate_page(State(app): State<AppState>, me: CurrentUser) -> Result<Response, AppError> {
    let form = initiate_form(&app, &me, &FormData::default())?;
    Ok(me.render("Initiate Compliance Check", &form))
}

/// Reject references to rows that do not exist.
fn check_references(app: &AppState, input: &CheckInput) -> Result<FormErrors, AppError> {
    let store = app.db()?;
    let mut errors = FormErrors::new();
    let invalid = "Select a valid choice. That choice is not one of the available choices.";
    let missing = |r: Result<(), notaria_store::StoreError>| -> Result<bool, AppError> {
        match r {
            Ok(()) => Ok(false),
            Err(e) if e.is_not_found() => Ok(true),
            Err(e) => Err(e.into()),
        }
    };
    if let Some(id) = input.client_id
        && missing(store.get_client(id).map(drop))?
    {
        errors.add("client", invalid);
    }
    if let Some(id) = input.matter_id
        && missing(store.get_matter(id).map(drop))?
    {
        errors.add("matter", invalid);
    }
    if let Some(id) = input.template_id
        && missing(store.get_compliance_template(id).map(drop))?
    {
        errors.add("template", invalid);
    }
    Ok(errors)
}

async fn initiate(State(app): State<AppState>, me: CurrentUser, Posted(form): Posted) -> Result<Response, AppError> {
    let parsed = CheckInput::from_form(&form);
    let errors = match &parsed {
        Ok(input) => check_references(&app, input)?,
        Err(errors) => errors.clone(),
    };
    let input = match parsed {
        Ok(input) if errors.is_empty() => input,
        _ => {
            flash_errors(&me.session, &errors);
            let page = initiate_form(&app, &me, &form)?;
            return Ok(me.render("Initiate Compliance Check", &page));
        }
    };
    let check = app.db()?.initiate_check(&input, Some(me.id()))?;
    me.session.success(format!("Compliance check #{} initiated.", check.id));
    Ok(render::redirect(&check_url(check.id)))
}

// ── Detail ──

fn answers_table(questions: &[ComplianceQuestion], answers: &[ComplianceAnswer]) -> String {
    let rows = questions
        .iter()
        .map(|q| {
            let answer = answers
                .iter()
                .find(|a| a.question_id == q.id && a.is_answered())
                .map(|a| escape(&a.display_value()))
                .unwrap_or_else(|| "-".into());
            let required = if q.is_required { " *" } else { "" };
            vec![format!("{}{required}", escape(&q.question_text)), answer]
        })
        .collect();
    table(&["Question", "Answer"], rows, "This check has no questions.")
}

fn provider_result(value: Option<&Value>) -> String {
    match value {
        Some(v) => format!(
            "<pre>{}</pre>",
            escape(&serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string()))
        ),
        None => "-".into(),
    }
}

type CheckView = (ComplianceCheck, Vec<ComplianceQuestion>, Vec<ComplianceAnswer>);

/// Load a check with its questions and answers, gated for `action`.
fn load_check(app: &AppState, me: &CurrentUser, id: i64, action: Action) -> Result<CheckView, AppError> {
    let store = app.db()?;
    let back = if action == Action::View { CHECK_LIST.to_string() } else { check_url(id) };
    let check = require(me, store.get_check(id)?, action, back)?;
    let questions = store.check_questions(&check)?;
    let answers = store.answers(id)?;
    Ok((check, questions, answers))
}

async fn check_detail(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let (check, questions, answers) = load_check(&app, &me, id, Action::View)?;
    let names = links(&app, &check)?;
    let client = match (check.client_id, names.client) {
        (Some(cid), Some(name)) => link(&format!("/clients/{cid}/"), &name),
        _ => "-".into(),
    };
    let matter = match (check.matter_id, names.matter) {
        (Some(mid), Some(protocol)) => link(&format!("/workflows/matters/{mid}/"), &protocol),
        _ => "-".into(),
    };
    let details = definition_list(&[
        ("Status", check.status.label().into()),
        ("Client", client),
        ("Matter", matter),
        ("Template", text(names.template.as_deref())),
        ("Initiated", render::timestamp(Some(check.initiated_at))),
        ("Completed", render::timestamp(check.completed_at)),
        ("Credas reference", text(check.credas_check_id.as_deref())),
        ("PEPs & sanctions reference", text(check.peps_sanctions_check_id.as_deref())),
        ("Notes", text(check.notes.as_deref())),
    ]);
    let body = format!(
        "{details}<h2>Answers</h2>{}<p>{} {} {} {}</p><p>{} {}</p>",
        answers_table(&questions, &answers),
        link(&format!("/compliance/{id}/answer/"), "Answer questions"),
        link(&format!("/compliance/{id}/evaluate/"), "Evaluate"),
        link(&format!("/compliance/{id}/report/"), "Report"),
        link(CHECK_LIST, "Back to checks"),
        render::action(&format!("/compliance/{id}/trigger-credas/"), "Run Credas verification"),
        render::action(&format!("/compliance/{id}/trigger-peps-sanctions/"), "Run PEPs & sanctions screening"),
    );
    Ok(me.render(&format!("Compliance Check #{id}"), &body))
}

// ── Answers ──

fn answer_values(questions: &[ComplianceQuestion], answers: &[ComplianceAnswer]) -> FormData {
    let mut values = FormData::default();
    for q in questions {
        let Some(a) = answers.iter().find(|a| a.question_id == q.id) else {
            continue;
        };
        let value = match q.answer_type {
            AnswerType::Boolean => a.answer_boolean.map(|b| if b { "yes" } else { "no" }.to_string()),
            AnswerType::Date => a.answer_date.map(|d| d.to_string()),
            AnswerType::Choice => a.answer_choice.clone(),
            AnswerType::File => a.answer_file.clone(),
            AnswerType::Text => a.answer_text.clone(),
        };
        if let Some(v) = value {
            values.push(answer_field(q), v);
        }
    }
    values
}

fn answer_form(id: i64, questions: &[ComplianceQuestion], values: &FormData) -> String {
    let yes_no = vec![("yes".to_string(), "Yes".to_string()), ("no".to_string(), "No".to_string())];
    let fields: String = questions
        .iter()
        .map(|q| {
            let name = answer_field(q);
            let label = if q.is_required { format!("{} *", q.question_text) } else { q.question_text.clone() };
            match q.answer_type {
                AnswerType::Text => textarea(values, &name, &label),
                AnswerType::Boolean => select(values, &name, &label, &yes_no, true),
                AnswerType::Choice => {
                    let options: Vec<(String, String)> = q.choices().into_iter().map(|c| (c.clone(), c)).collect();
                    select(values, &name, &label, &options, true)
                }
                AnswerType::Date => input(values, &name, &label, "date"),
                AnswerType::File => input(values, &name, &label, "text"),
            }
        })
        .collect();
    render::form(&format!("/compliance/{id}/answer/"), &fields, "Save answers")
}

async fn answer_page(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let (_, questions, answers) = load_check(&app, &me, id, Action::Edit)?;
    if questions.is_empty() {
        me.session.info("This check has no question template.");
        return Ok(render::redirect(&check_url(id)));
    }
    let form = answer_form(id, &questions, &answer_values(&questions, &answers));
    Ok(me.render(&format!("Answer Compliance Check #{id}"), &form))
}

async fn answer(
    State(app): State<AppState>,
    me: CurrentUser,
    Path(id): Path<i64>,
    Posted(form): Posted,
) -> Result<Response, AppError> {
    let (_, questions, _) = load_check(&app, &me, id, Action::Edit)?;
    let answers = match parse_answers(&form, &questions) {
        Ok(answers) => answers,
        Err(errors) => {
            flash_errors(&me.session, &errors);
            return Ok(me.render(&format!("Answer Compliance Check #{id}"), &answer_form(id, &questions, &form)));
        }
    };
    let check = app.db()?.save_answers(id, &answers, Some(me.id()))?;
    me.session
        .success(format!("Answers saved. Check status: {}.", check.status.label()));
    Ok(render::redirect(&check_url(id)))
}

// ── Provider verification ──

async fn trigger_credas(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    trigger(app, me, id, ServiceName::Credas).await
}

async fn trigger_peps_sanctions(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    trigger(app, me, id, ServiceName::PepsSanctions).await
}

/// Submit the check's client to a provider and remember its reference.
/// A provider failure puts the check in error.
async fn trigger(app: AppState, me: CurrentUser, id: i64, service: ServiceName) -> Result<Response, AppError> {
    let (check, client) = {
        let store = app.db()?;
        let check = require(&me, store.get_check(id)?, Action::Edit, check_url(id))?;
        let client = check.client_id.map(|cid| store.get_client(cid)).transpose()?;
        (check, client)
    };
    let Some(client) = client else {
        me.session
            .warning(format!("Link a client to this check before running {}.", service.label()));
        return Ok(render::redirect(&check_url(id)));
    };

    let subject = Subject::from(&client);
    match outbound::submit_verification(&app, service, &subject).await {
        Ok(reference) => {
            app.db()?
                .record_provider_reference(id, service, &reference, status_after_trigger(check.status))?;
            outbound::log_event(
                &app,
                service,
                LogLevel::Info,
                format!("Submitted client {} as {reference}", client.id),
                Some(("ComplianceCheck", id)),
            )?;
            info!(check_id = id, service = %service, reference = %reference, "verification submitted");
            me.session
                .success(format!("{} check initiated (reference {reference}).", service.label()));
        }
        Err(AppError::Integration(e)) => {
            warn!(check_id = id, service = %service, error = %e, "verification failed");
            app.db()?.set_check_status(id, ComplianceStatus::Error, check.completed_at)?;
            outbound::log_event(
                &app,
                service,
                LogLevel::Error,
                format!("Verification failed: {e}"),
                Some(("ComplianceCheck", id)),
            )?;
            me.session.error(format!("{} check failed: {e}", service.label()));
        }
        Err(e) => return Err(e),
    }
    Ok(render::redirect(&check_url(id)))
}

// ── Evaluation ──

fn evaluate_form(id: i64, missing: usize) -> String {
    let decisions = choices(EvaluationDecision::ALL, EvaluationDecision::as_str, EvaluationDecision::label);
    let warning = if missing > 0 {
        format!("<p class=\"warning\">{missing} required question(s) are still unanswered.</p>")
    } else {
        String::new()
    };
    let select = select(&FormData::default(), "decision", "Decision", &decisions, true);
    format!("{warning}{}", render::form(&format!("/compliance/{id}/evaluate/"), &select, "Record decision"))
}

async fn evaluate_page(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let (_, questions, answers) = load_check(&app, &me, id, Action::Edit)?;
    let missing = missing_required(&questions, &answers).len();
    Ok(me.render(&format!("Evaluate Compliance Check #{id}"), &evaluate_form(id, missing)))
}

async fn evaluate(
    State(app): State<AppState>,
    me: CurrentUser,
    Path(id): Path<i64>,
    Posted(form): Posted,
) -> Result<Response, AppError> {
    let (_, questions, answers) = load_check(&app, &me, id, Action::Edit)?;
    let decision = match form.text("decision").map(|d| d.parse::<EvaluationDecision>()) {
        Some(Ok(d)) => d,
        _ => {
            me.session.error("Error in decision: Select a valid choice.");
            return Ok(render::redirect(&format!("/compliance/{id}/evaluate/")));
        }
    };
    let missing = missing_required(&questions, &answers).len();
    match compliance::evaluate(decision, missing, notaria_core::now()) {
        Ok((status, completed_at)) => {
            app.db()?.set_check_status(id, status, completed_at)?;
            info!(check_id = id, status = %status, "compliance check evaluated");
            me.session
                .success(format!("Compliance check marked as {}.", status.label()));
            Ok(render::redirect(&check_url(id)))
        }
        Err(message) => {
            me.session.error(message);
            Ok(render::redirect(&format!("/compliance/{id}/evaluate/")))
        }
    }
}

// ── Report ──

async fn report(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let (check, questions, answers) = load_check(&app, &me, id, Action::View)?;
    let names = links(&app, &check)?;
    let summary = definition_list(&[
        ("Client", text(names.client.as_deref())),
        ("Matter", text(names.matter.as_deref())),
        ("Template", text(names.template.as_deref())),
        ("Status", check.status.label().into()),
        ("Initiated", render::timestamp(Some(check.initiated_at))),
        ("Completed", render::timestamp(check.completed_at)),
        ("Notes", text(check.notes.as_deref())),
    ]);
    let body = format!(
        "{summary}<h2>Answers</h2>{}<h2>Credas</h2><p>Reference: {}</p>{}\
         <h2>PEPs &amp; sanctions</h2><p>Reference: {}</p>{}<p>Generated {}</p>",
        answers_table(&questions, &answers),
        text(check.credas_check_id.as_deref()),
        provider_result(check.credas_result.as_ref()),
        text(check.peps_sanctions_check_id.as_deref()),
        provider_result(check.peps_sanctions_result.as_ref()),
        render::timestamp(Some(notaria_core::now())),
    );
    Ok(me.render(&format!("Compliance Report: Check #{id}"), &body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestApp;
    use notaria_core::compliance::QuestionInput;
    use notaria_core::matter::TemplateInput;
    use notaria_core::{ClientInput, IntegrationInput, Role};

    /// A template with one required yes/no question and one optional text question.
    fn seed_template(app: &TestApp) -> (i64, i64, i64) {
        let store = app.state.db().unwrap();
        let t = store
            .create_compliance_template(&TemplateInput {
                name: "Standard KYC".into(),
                description: None,
            })
            .unwrap();
        let pep = store
            .create_question(&QuestionInput {
                question_text: "Is the client a PEP?".into(),
                answer_type: AnswerType::Boolean,
                choice_options: None,
                is_required: true,
            })
            .unwrap();
        let note = store
            .create_question(&QuestionInput {
                question_text: "Source of funds".into(),
                answer_type: AnswerType::Text,
                choice_options: None,
                is_required: false,
            })
            .unwrap();
        store.attach_question(t.id, pep.id, 1).unwrap();
        store.attach_question(t.id, note.id, 2).unwrap();
        (t.id, pep.id, note.id)
    }

    fn client(app: &TestApp, owner: i64) -> i64 {
        app.state
            .db()
            .unwrap()
            .create_client(
                &ClientInput {
                    first_name: Some("Jane".into()),
                    last_name: Some("Doe".into()),
                    ..ClientInput::default()
                },
                Some(owner),
            )
            .unwrap()
            .id
    }

    async fn initiate_check(browser: &crate::testing::Browser, fields: &[(&str, &str)]) -> i64 {
        let resp = browser.post_form("/compliance/initiate/", fields).await;
        let to = TestApp::location(&resp);
        to.trim_start_matches("/compliance/").trim_end_matches('/').parse().unwrap()
    }

    #[tokio::test]
    async fn answers_move_check_to_review_then_pass() {
        let app = TestApp::spawn().await;
        let ann = app.user("ann", Role::Notary);
        let (template, pep, note) = seed_template(&app);
        let client = client(&app, ann.id);
        let browser = app.login("ann").await;
        let id = initiate_check(&browser, &[("client", &client.to_string()), ("template", &template.to_string())]).await;
        assert_eq!(app.state.db().unwrap().answers(id).unwrap().len(), 2);

        let page = browser
            .post_and_follow(&format!("/compliance/{id}/evaluate/"), &[("decision", "passed")])
            .await;
        assert!(page.contains("1 required question(s) are unanswered"));

        let note_field = format!("answer-{note}-text");
        let page = browser
            .post_and_follow(&format!("/compliance/{id}/answer/"), &[(note_field.as_str(), "Salary")])
            .await;
        assert!(page.contains("Check status: In Progress."));

        let pep_field = format!("answer-{pep}-boolean");
        let page = browser
            .post_and_follow(&format!("/compliance/{id}/answer/"), &[(pep_field.as_str(), "no"), (note_field.as_str(), "Salary")])
            .await;
        assert!(page.contains("Check status: Requires Review."));

        let page = browser
            .post_and_follow(&format!("/compliance/{id}/evaluate/"), &[("decision", "passed")])
            .await;
        assert!(page.contains("Compliance check marked as Passed."));
        let check = app.state.db().unwrap().get_check(id).unwrap();
        assert_eq!(check.status, ComplianceStatus::Passed);
        assert!(check.completed_at.is_some());

        let report = browser.page(&format!("/compliance/{id}/report/")).await;
        assert!(report.contains("Is the client a PEP? *"));
        assert!(report.contains("<td>No</td>"));
    }

    #[tokio::test]
    async fn invalid_answer_is_reported() {
        let app = TestApp::spawn().await;
        app.user("ann", Role::Notary);
        let (template, pep, _) = seed_template(&app);
        let browser = app.login("ann").await;
        let id = initiate_check(&browser, &[("template", &template.to_string())]).await;
        let field = format!("answer-{pep}-boolean");
        let page = browser
            .post_form(&format!("/compliance/{id}/answer/"), &[(field.as_str(), "perhaps")])
            .await
            .text()
            .await
            .unwrap();
        assert!(page.contains("Answer yes or no."));
    }

    #[tokio::test]
    async fn unknown_references_are_rejected() {
        let app = TestApp::spawn().await;
        app.user("ann", Role::Notary);
        let browser = app.login("ann").await;
        let page = browser
            .post_form("/compliance/initiate/", &[("client", "404")])
            .await
            .text()
            .await
            .unwrap();
        assert!(page.contains("Error in client: Select a valid choice."));
    }

    #[tokio::test]
    async fn trigger_without_client_warns() {
        let app = TestApp::spawn().await;
        app.user("ann", Role::Notary);
        let browser = app.login("ann").await;
        let id = initiate_check(&browser, &[("notes", "walk-in")]).await;
        let page = browser.post_and_follow(&format!("/compliance/{id}/trigger-credas/"), &[]).await;
        assert!(page.contains("Link a client to this check before running Credas."));
        assert_eq!(app.state.db().unwrap().get_check(id).unwrap().status, ComplianceStatus::Pending);
    }

    #[tokio::test]
    async fn provider_failure_sets_error_status() {
        let app = TestApp::spawn().await;
        let ann = app.user("ann", Role::Notary);
        let client = client(&app, ann.id);
        let browser = app.login("ann").await;
        let id = initiate_check(&browser, &[("client", &client.to_string())]).await;
        let page = browser
            .post_and_follow(&format!("/compliance/{id}/trigger-peps-sanctions/"), &[])
            .await;
        assert!(page.contains("PEPs &amp; Sanctions check failed"));
        assert_eq!(app.state.db().unwrap().get_check(id).unwrap().status, ComplianceStatus::Error);
    }

    #[tokio::test]
    async fn credas_reference_is_stored() {
        let credas = axum::Router::new().route(
            "/v1/checks",
            axum::routing::post(|| async { axum::Json(serde_json::json!({"check_id": "CR-9", "status": "submitted"})) }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, credas).await.unwrap() });

        let app = TestApp::spawn_with(|s| s.credas.base_url = format!("http://{addr}")).await;
        app.state
            .db()
            .unwrap()
            .create_integration(&IntegrationInput {
                service_name: ServiceName::Credas,
                is_enabled: true,
                api_key: Some("key".into()),
                api_secret: None,
            })
            .unwrap();
        let ann = app.user("ann", Role::Notary);
        let client = client(&app, ann.id);
        let browser = app.login("ann").await;
        let id = initiate_check(&browser, &[("client", &client.to_string())]).await;
        let page = browser.post_and_follow(&format!("/compliance/{id}/trigger-credas/"), &[]).await;
        assert!(page.contains("Credas check initiated (reference CR-9)."));
        let check = app.state.db().unwrap().get_check(id).unwrap();
        assert_eq!(check.credas_check_id.as_deref(), Some("CR-9"));
        assert_eq!(check.status, ComplianceStatus::InProgress);
    }

    #[tokio::test]
    async fn checks_are_private_to_their_initiator() {
        let app = TestApp::spawn().await;
        app.user("ann", Role::Notary);
        app.user("bob", Role::Notary);
        let ann = app.login("ann").await;
        let id = initiate_check(&ann, &[]).await;
        let bob = app.login("bob").await;
        let resp = bob.get(&check_url(id)).await;
        assert_eq!(TestApp::location(&resp), CHECK_LIST);
        assert!(!bob.page(CHECK_LIST).await.contains(&format!("Check #{id}<")));
    }
}
