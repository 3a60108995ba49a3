//! Matters, their workflow and step formset, workflow templates, and the
//! matter actions that call out to Gmail and Zoom.

use axum::Router;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use chrono::NaiveDateTime;
use notaria_ai::tasks;
use notaria_core::access::{Action, can_upload_to_matter};
use notaria_core::forms;
use notaria_core::integration::LogLevel;
use notaria_core::matter::{FORMSET_PREFIX, StepTemplateInput, TemplateInput, parse_step_formset};
use notaria_core::{
    FormData, FormErrors, Matter, MatterInput, MatterStatus, ServiceName, StepStatus, Workflow, WorkflowStep,
};
use notaria_integrations::zoom::MeetingRequest;
use notaria_store::{Scope, StoreError};
use tracing::{info, warn};

use crate::forms::{Posted, flash_errors};
use crate::gate::require;
use crate::outbound;
use crate::render::{
    self, action, checkbox, choices, definition_list, escape, input, link, multi_select, select, table, text, textarea,
};
use crate::session::{AdminUser, CurrentUser};
use crate::{AppError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/workflows/matters/", get(matter_list))
        .route("/workflows/matters/create/", get(matter_create_page).post(matter_create))
        .route("/workflows/matters/:id/", get(matter_detail))
        .route("/workflows/matters/:id/edit/", get(matter_edit_page).post(matter_edit))
        .route("/workflows/matters/:id/delete/", get(matter_delete_page).post(matter_delete))
        .route("/workflows/matters/:id/workflow/", get(workflow_page).post(workflow_save))
        .route("/workflows/matters/:id/workflow/create/", get(workflow_create_page).post(workflow_create))
        .route("/workflows/matters/:id/email/", post(matter_email))
        .route("/workflows/matters/:id/meeting/", post(matter_meeting))
        .route("/workflows/workflows/:id/trigger-ai-steps/", post(trigger_ai_steps))
        .route("/workflows/templates/", get(template_list))
        .route("/workflows/templates/create/", get(template_create_page).post(template_create))
        .route("/workflows/templates/:id/", get(template_detail))
        .route("/workflows/templates/:id/steps/", post(template_add_step))
        .route("/workflows/templates/:id/delete/", post(template_delete))
}

const MATTER_LIST: &str = "/workflows/matters/";

fn matter_url(id: i64) -> String {
    format!("/workflows/matters/{id}/")
}

fn workflow_url(matter_id: i64) -> String {
    format!("/workflows/matters/{matter_id}/workflow/")
}

fn template_url(id: i64) -> String {
    format!("/workflows/templates/{id}/")
}

// ── Matters ──

async fn matter_list(State(app): State<AppState>, me: CurrentUser) -> Result<Response, AppError> {
    let matters = app.db()?.list_matters(Scope::for_user(&me.user))?;
    let rows = matters
        .iter()
        .map(|m| {
            vec![
                link(&matter_url(m.id), &m.protocol_number),
                escape(&m.title),
                m.status.label().into(),
                render::date(Some(m.start_date)),
                render::date(m.due_date),
            ]
        })
        .collect();
    let body = format!(
        "<p>{}</p>{}",
        link("/workflows/matters/create/", "New matter"),
        table(&["Protocol", "Title", "Status", "Start", "Due"], rows, "No matters yet.")
    );
    Ok(me.render("Matters", &body))
}

fn matter_values(m: &Matter) -> FormData {
    let mut values = FormData::default();
    values.push("title", m.title.as_str());
    values.push("status", m.status.as_str());
    values.push("start_date", m.start_date.to_string());
    for (name, value) in [
        ("description", m.description.clone()),
        ("due_date", m.due_date.map(|d| d.to_string())),
        ("completion_date", m.completion_date.map(|d| d.to_string())),
        ("notes", m.notes.clone()),
    ] {
        if let Some(v) = value {
            values.push(name, v);
        }
    }
    for id in &m.client_ids {
        values.push("clients", id.to_string());
    }
    for id in &m.assigned_user_ids {
        values.push("assigned_users", id.to_string());
    }
    values
}

/// Client and user options for the matter form. Clients are the ones the
/// user can see plus any already linked to the matter.
fn matter_options(app: &AppState, me: &CurrentUser, linked: &[i64]) -> Result<(Vec<(String, String)>, Vec<(String, String)>), AppError> {
    let store = app.db()?;
    let mut clients = store.list_clients(Scope::for_user(&me.user))?;
    for id in linked {
        if !clients.iter().any(|c| c.id == *id) {
            clients.push(store.get_client(*id)?);
        }
    }
    let clients = clients.iter().map(|c| (c.id.to_string(), c.display_name())).collect();
    let users = store
        .list_users()?
        .into_iter()
        .map(|u| (u.id.to_string(), u.username))
        .collect();
    Ok((clients, users))
}

fn matter_form(
    action_url: &str,
    values: &FormData,
    options: &(Vec<(String, String)>, Vec<(String, String)>),
    submit: &str,
) -> String {
    let fields = [
        input(values, "title", "Title", "text"),
        textarea(values, "description", "Description"),
        select(values, "status", "Status", &choices(MatterStatus::ALL, MatterStatus::as_str, MatterStatus::label), false),
        input(values, "start_date", "Start date", "date"),
        input(values, "due_date", "Due date", "date"),
        input(values, "completion_date", "Completion date", "date"),
        multi_select(values, "clients", "Clients", &options.0),
        multi_select(values, "assigned_users", "Assigned users", &options.1),
        textarea(values, "notes", "Notes"),
    ]
    .concat();
    render::form(action_url, &fields, submit)
}

/// Validate the form and its client/user references.
fn matter_input(app: &AppState, form: &FormData) -> Result<Result<MatterInput, FormErrors>, AppError> {
    let input = match MatterInput::from_form(form) {
        Ok(input) => input,
        Err(errors) => return Ok(Err(errors)),
    };
    let (clients, users) = {
        let store = app.db()?;
        (store.client_ids()?, store.user_ids()?)
    };
    Ok(input.check_references(&clients, &users).map(|()| input))
}

async fn matter_create_page(State(app): State<AppState>, me: CurrentUser) -> Result<Response, AppError> {
    let mut values = FormData::default();
    values.push("start_date", notaria_core::now().date().to_string());
    values.push("status", MatterStatus::Open.as_str());
    let options = matter_options(&app, &me, &[])?;
    Ok(me.render("Create New Matter", &matter_form("/workflows/matters/create/", &values, &options, "Create")))
}

async fn matter_create(State(app): State<AppState>, me: CurrentUser, Posted(form): Posted) -> Result<Response, AppError> {
    let rerender = |me: &CurrentUser| -> Result<Response, AppError> {
        let options = matter_options(&app, me, &[])?;
        Ok(me.render("Create New Matter", &matter_form("/workflows/matters/create/", &form, &options, "Create")))
    };
    let input = match matter_input(&app, &form)? {
        Ok(input) => input,
        Err(errors) => {
            flash_errors(&me.session, &errors);
            return rerender(&me);
        }
    };
    let created = app.db()?.create_matter(&input, Some(me.id()));
    match created {
        Ok(matter) => {
            me.session.success(format!("Matter \"{}\" created successfully!", matter.protocol_number));
            Ok(render::redirect(&matter_url(matter.id)))
        }
        Err(StoreError::Conflict(msg)) => {
            me.session.error(msg);
            rerender(&me)
        }
        Err(e) => Err(e.into()),
    }
}

fn step_row(step: &WorkflowStep) -> Vec<String> {
    vec![
        step.order.to_string(),
        escape(&step.name),
        step.status.label().into(),
        render::date(step.due_date),
        render::timestamp(step.completed_at),
    ]
}

async fn matter_detail(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let (matter, clients, users, workflow, steps, documents) = {
        let store = app.db()?;
        let matter = require(&me, store.get_matter(id)?, Action::View, MATTER_LIST)?;
        let clients = store.matter_clients(&matter)?;
        let users: Vec<String> = matter
            .assigned_user_ids
            .iter()
            .map(|uid| store.get_user(*uid).map(|u| u.username))
            .collect::<Result<_, _>>()?;
        let workflow = store.workflow_for_matter(id)?;
        let steps = match &workflow {
            Some(wf) => store.workflow_steps(wf.id)?,
            None => Vec::new(),
        };
        let documents = store.list_documents(Scope::All, Some(id))?;
        (matter, clients, users, workflow, steps, documents)
    };

    let client_links: Vec<String> = clients
        .iter()
        .map(|c| link(&format!("/clients/{}/", c.id), &c.display_name()))
        .collect();
    let details = definition_list(&[
        ("Protocol number", escape(&matter.protocol_number)),
        ("Status", matter.status.label().into()),
        ("Description", text(matter.description.as_deref())),
        ("Start date", render::date(Some(matter.start_date))),
        ("Due date", render::date(matter.due_date)),
        ("Completion date", render::date(matter.completion_date)),
        ("Clients", if client_links.is_empty() { "-".into() } else { client_links.join(", ") }),
        ("Assigned users", if users.is_empty() { "-".into() } else { escape(&users.join(", ")) }),
        ("Notes", text(matter.notes.as_deref()).replace('\n', "<br>")),
    ]);

    let workflow_section = match &workflow {
        Some(wf) => format!(
            "<p>Status: {}. {}</p>{}",
            wf.status.label(),
            link(&workflow_url(id), "Manage workflow"),
            table(&["Order", "Step", "Status", "Due", "Completed"], steps.iter().map(step_row).collect(), "No steps yet.")
        ),
        None => format!(
            "<p>No workflow yet. {}</p>",
            link(&format!("/workflows/matters/{id}/workflow/create/"), "Create workflow")
        ),
    };

    let doc_rows = documents
        .iter()
        .map(|d| vec![link(&format!("/documents/{}/", d.id), &d.name), d.status.label().into()])
        .collect();
    let mut documents_section = table(&["Document", "Status"], doc_rows, "No documents linked.");
    if can_upload_to_matter(&me.user, &matter) {
        documents_section.push_str(&format!(
            "<p>{}</p>",
            link(&format!("/documents/matters/{id}/upload/"), "Upload document")
        ));
    }

    let blank = FormData::default();
    let mut meeting_values = FormData::default();
    meeting_values.push("topic", matter.title.as_str());
    meeting_values.push("duration", "60");
    let email_form = render::form(
        &format!("/workflows/matters/{id}/email/"),
        &[input(&blank, "subject", "Subject", "text"), textarea(&blank, "message", "Message")].concat(),
        "Email clients",
    );
    let meeting_form = render::form(
        &format!("/workflows/matters/{id}/meeting/"),
        &[
            input(&meeting_values, "topic", "Topic", "text"),
            input(&blank, "start_time", "Start (UTC, blank for now)", "datetime-local"),
            input(&meeting_values, "duration", "Duration (minutes)", "number"),
        ]
        .concat(),
        "Schedule Zoom meeting",
    );

    let body = format!(
        "{details}<p>{} {} {}</p><h2>Workflow</h2>{workflow_section}<h2>Documents</h2>{documents_section}\
         <h2>Email clients</h2>{email_form}<h2>Meeting</h2>{meeting_form}",
        link(&format!("/workflows/matters/{id}/edit/"), "Edit"),
        link(&format!("/workflows/matters/{id}/delete/"), "Delete"),
        link(MATTER_LIST, "Back to matters"),
    );
    Ok(me.render(&format!("{}: {}", matter.protocol_number, matter.title), &body))
}

async fn matter_edit_page(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let matter = app.db()?.get_matter(id)?;
    let matter = require(&me, matter, Action::Edit, matter_url(id))?;
    let options = matter_options(&app, &me, &matter.client_ids)?;
    let form = matter_form(&format!("/workflows/matters/{id}/edit/"), &matter_values(&matter), &options, "Save");
    Ok(me.render(&format!("Edit Matter: {}", matter.protocol_number), &form))
}

async fn matter_edit(
    State(app): State<AppState>,
    me: CurrentUser,
    Path(id): Path<i64>,
    Posted(form): Posted,
) -> Result<Response, AppError> {
    let matter = app.db()?.get_matter(id)?;
    let matter = require(&me, matter, Action::Edit, matter_url(id))?;
    let input = match matter_input(&app, &form)? {
        Ok(input) => input,
        Err(errors) => {
            flash_errors(&me.session, &errors);
            let options = matter_options(&app, &me, &matter.client_ids)?;
            let page = matter_form(&format!("/workflows/matters/{id}/edit/"), &form, &options, "Save");
            return Ok(me.render(&format!("Edit Matter: {}", matter.protocol_number), &page));
        }
    };
    let matter = app.db()?.update_matter(id, &input)?;
    me.session.success(format!("Matter \"{}\" updated successfully!", matter.protocol_number));
    Ok(render::redirect(&matter_url(id)))
}

async fn matter_delete_page(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let matter = app.db()?.get_matter(id)?;
    let matter = require(&me, matter, Action::Delete, matter_url(id))?;
    let body = format!(
        "<p>Delete matter {} \"{}\" together with its workflow?</p>{} {}",
        escape(&matter.protocol_number),
        escape(&matter.title),
        action(&format!("/workflows/matters/{id}/delete/"), "Yes, delete"),
        link(&matter_url(id), "Cancel"),
    );
    Ok(me.render("Delete Matter", &body))
}

async fn matter_delete(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let protocol = {
        let mut store = app.db()?;
        let matter = require(&me, store.get_matter(id)?, Action::Delete, matter_url(id))?;
        store.delete_matter(id)?;
        matter.protocol_number
    };
    me.session.success(format!("Matter \"{protocol}\" deleted successfully."));
    Ok(render::redirect(MATTER_LIST))
}

// ── Matter actions ──

/// Email every client of the matter that has an address.
async fn matter_email(
    State(app): State<AppState>,
    me: CurrentUser,
    Path(id): Path<i64>,
    Posted(form): Posted,
) -> Result<Response, AppError> {
    let (matter, recipients) = {
        let store = app.db()?;
        let matter = require(&me, store.get_matter(id)?, Action::Edit, matter_url(id))?;
        let recipients: Vec<String> = store
            .matter_clients(&matter)?
            .into_iter()
            .filter_map(|c| c.email)
            .collect();
        (matter, recipients)
    };
    if recipients.is_empty() {
        me.session.warning("None of this matter's clients has an email address.");
        return Ok(render::redirect(&matter_url(id)));
    }
    let subject = form
        .text("subject")
        .unwrap_or_else(|| format!("Update on matter {}", matter.protocol_number));
    let message = form.text("message").unwrap_or_default();
    let html = format!("<p>{}</p>", escape(&message).replace('\n', "<br>"));

    match outbound::send_email(&app, &recipients, &subject, &html).await {
        Ok(message_id) => {
            outbound::log_event(
                &app,
                ServiceName::Gmail,
                LogLevel::Info,
                format!("Sent email {message_id} to {} recipient(s)", recipients.len()),
                Some(("Matter", id)),
            )?;
            me.session.success(format!("Email sent to {} recipient(s).", recipients.len()));
        }
        Err(AppError::Integration(e)) => {
            warn!(matter_id = id, error = %e, "email to clients failed");
            outbound::log_event(&app, ServiceName::Gmail, LogLevel::Error, format!("Email failed: {e}"), Some(("Matter", id)))?;
            me.session.error(format!("Could not send email: {e}"));
        }
        Err(e) => return Err(e),
    }
    Ok(render::redirect(&matter_url(id)))
}

fn meeting_request(form: &FormData, matter: &Matter) -> Result<MeetingRequest, FormErrors> {
    let mut errors = FormErrors::new();
    let start_time = match form.text("start_time") {
        None => None,
        Some(raw) => match NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M") {
            Ok(t) => Some(t),
            Err(_) => {
                errors.add("start_time", "Enter a valid date/time.");
                None
            }
        },
    };
    let duration = forms::non_negative_int(form, "duration", 60, &mut errors);
    let request = MeetingRequest {
        topic: form.text("topic").unwrap_or_else(|| matter.title.clone()),
        start_time,
        duration_minutes: u32::try_from(duration).unwrap_or(60).max(1),
        agenda: Some(format!("Matter {}", matter.protocol_number)),
    };
    errors.into_result(request)
}

/// Create a Zoom meeting and append its join URL to the matter notes.
async fn matter_meeting(
    State(app): State<AppState>,
    me: CurrentUser,
    Path(id): Path<i64>,
    Posted(form): Posted,
) -> Result<Response, AppError> {
    let matter = app.db()?.get_matter(id)?;
    let mut matter = require(&me, matter, Action::Edit, matter_url(id))?;
    let request = match meeting_request(&form, &matter) {
        Ok(r) => r,
        Err(errors) => {
            flash_errors(&me.session, &errors);
            return Ok(render::redirect(&matter_url(id)));
        }
    };
    match outbound::schedule_meeting(&app, &request).await {
        Ok(meeting) => {
            matter.append_note(&format!("Zoom meeting \"{}\": {}", request.topic, meeting.join_url));
            app.db()?.set_matter_notes(id, matter.notes.as_deref())?;
            outbound::log_event(
                &app,
                ServiceName::Zoom,
                LogLevel::Info,
                format!("Created meeting {}", meeting.id),
                Some(("Matter", id)),
            )?;
            info!(matter_id = id, meeting_id = %meeting.id, "scheduled meeting");
            me.session.success(format!("Zoom meeting created: {}", meeting.join_url));
        }
        Err(AppError::Integration(e)) => {
            warn!(matter_id = id, error = %e, "meeting creation failed");
            outbound::log_event(&app, ServiceName::Zoom, LogLevel::Error, format!("Meeting failed: {e}"), Some(("Matter", id)))?;
            me.session.error(format!("Could not create the Zoom meeting: {e}"));
        }
        Err(e) => return Err(e),
    }
    Ok(render::redirect(&matter_url(id)))
}

// ── Workflow ──

/// Current steps as formset values, with one blank row for a new step.
fn formset_values(steps: &[WorkflowStep]) -> FormData {
    let mut values = FormData::default();
    values.push(format!("{FORMSET_PREFIX}-TOTAL_FORMS"), (steps.len() + 1).to_string());
    for (i, step) in steps.iter().enumerate() {
        let field = |name: &str| format!("{FORMSET_PREFIX}-{i}-{name}");
        values.push(field("id"), step.id.to_string());
        values.push(field("name"), step.name.as_str());
        values.push(field("order"), step.order.to_string());
        values.push(field("status"), step.status.as_str());
        if let Some(t) = step.step_template_id {
            values.push(field("step_template"), t.to_string());
        }
        if let Some(d) = &step.description {
            values.push(field("description"), d.as_str());
        }
        if let Some(u) = step.assigned_to {
            values.push(field("assigned_to"), u.to_string());
        }
        if let Some(d) = step.due_date {
            values.push(field("due_date"), d.to_string());
        }
        if let Some(n) = &step.notes {
            values.push(field("notes"), n.as_str());
        }
    }
    let next_order = steps.iter().map(|s| s.order + 1).max().unwrap_or(1);
    values.push(format!("{FORMSET_PREFIX}-{}-order", steps.len()), next_order.to_string());
    values
}

fn hidden(values: &FormData, name: &str) -> String {
    format!(
        "<input type=\"hidden\" name=\"{name}\" value=\"{}\">",
        escape(values.raw(name).unwrap_or_default())
    )
}

fn formset(matter_id: i64, values: &FormData, users: &[(String, String)]) -> String {
    let total_name = format!("{FORMSET_PREFIX}-TOTAL_FORMS");
    let total: usize = values.raw(&total_name).and_then(|v| v.parse().ok()).unwrap_or(0);
    let statuses = choices(StepStatus::ALL, StepStatus::as_str, StepStatus::label);
    let mut rows = String::new();
    for i in 0..total {
        let field = |name: &str| format!("{FORMSET_PREFIX}-{i}-{name}");
        rows.push_str(&format!(
            "<fieldset>{}{}{}{}{}{}{}{}{}{}</fieldset>",
            hidden(values, &field("id")),
            hidden(values, &field("step_template")),
            input(values, &field("name"), "Name", "text"),
            input(values, &field("order"), "Order", "number"),
            select(values, &field("status"), "Status", &statuses, false),
            select(values, &field("assigned_to"), "Assigned to", users, true),
            input(values, &field("due_date"), "Due date", "date"),
            textarea(values, &field("description"), "Description"),
            textarea(values, &field("notes"), "Notes"),
            checkbox(values, &field("DELETE"), "Delete"),
        ));
    }
    let fields = format!("{}{rows}", hidden(values, &total_name));
    render::form(&workflow_url(matter_id), &fields, "Save steps")
}

fn workflow_body(matter: &Matter, workflow: &Workflow, form: &str) -> String {
    let suggestions = if workflow.ai_generated_steps.is_empty() {
        String::new()
    } else {
        let items: String = workflow
            .ai_generated_steps
            .iter()
            .map(|s| format!("<li>{}</li>", escape(s)))
            .collect();
        format!("<h2>AI suggested steps</h2><ol>{items}</ol>")
    };
    format!(
        "<p>Matter {}. Status: {}.</p>{form}{suggestions}<p>{} {}</p>",
        link(&matter_url(matter.id), &matter.protocol_number),
        workflow.status.label(),
        action(&format!("/workflows/workflows/{}/trigger-ai-steps/", workflow.id), "Suggest steps with AI"),
        link(&matter_url(matter.id), "Back to matter"),
    )
}

fn user_choices(app: &AppState) -> Result<Vec<(String, String)>, AppError> {
    Ok(app
        .db()?
        .list_users()?
        .into_iter()
        .map(|u| (u.id.to_string(), u.username))
        .collect())
}

async fn workflow_page(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let (matter, workflow, steps) = {
        let store = app.db()?;
        let matter = require(&me, store.get_matter(id)?, Action::Edit, matter_url(id))?;
        let workflow = store.workflow_for_matter(id)?;
        let steps = match &workflow {
            Some(wf) => store.workflow_steps(wf.id)?,
            None => Vec::new(),
        };
        (matter, workflow, steps)
    };
    let Some(workflow) = workflow else {
        me.session.info("No workflow exists for this matter. You can create one.");
        return Ok(render::redirect(&format!("/workflows/matters/{id}/workflow/create/")));
    };
    let form = formset(id, &formset_values(&steps), &user_choices(&app)?);
    Ok(me.render(&format!("Workflow for {}", matter.protocol_number), &workflow_body(&matter, &workflow, &form)))
}

async fn workflow_save(
    State(app): State<AppState>,
    me: CurrentUser,
    Path(id): Path<i64>,
    Posted(form): Posted,
) -> Result<Response, AppError> {
    let (matter, workflow, step_ids) = {
        let store = app.db()?;
        let matter = require(&me, store.get_matter(id)?, Action::Edit, matter_url(id))?;
        let Some(workflow) = store.workflow_for_matter(id)? else {
            return Ok(render::redirect(&format!("/workflows/matters/{id}/workflow/create/")));
        };
        let step_ids: Vec<i64> = store.workflow_steps(workflow.id)?.iter().map(|s| s.id).collect();
        (matter, workflow, step_ids)
    };
    let failed = |errors: Option<&FormErrors>, message: Option<String>| -> Result<Response, AppError> {
        me.session.error("Please correct the errors below.");
        if let Some(errors) = errors {
            flash_errors(&me.session, errors);
        }
        if let Some(message) = message {
            me.session.error(message);
        }
        let page = formset(id, &form, &user_choices(&app)?);
        Ok(me.render(&format!("Workflow for {}", matter.protocol_number), &workflow_body(&matter, &workflow, &page)))
    };
    let changes = match parse_step_formset(&form, &step_ids) {
        Ok(changes) => changes,
        Err(errors) => return failed(Some(&errors), None),
    };
    let saved = app.db()?.save_steps(workflow.id, &changes);
    match saved {
        Ok(_) => {
            me.session.success("Workflow steps updated successfully.");
            Ok(render::redirect(&workflow_url(id)))
        }
        Err(StoreError::Conflict(msg)) => failed(None, Some(msg)),
        Err(e) => Err(e.into()),
    }
}

async fn workflow_create_page(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let (matter, existing, templates) = {
        let store = app.db()?;
        let matter = require(&me, store.get_matter(id)?, Action::Edit, matter_url(id))?;
        (matter, store.workflow_for_matter(id)?, store.list_workflow_templates()?)
    };
    if existing.is_some() {
        me.session.warning("A workflow already exists for this matter.");
        return Ok(render::redirect(&workflow_url(id)));
    }
    let options: Vec<(String, String)> = templates.iter().map(|t| (t.id.to_string(), t.name.clone())).collect();
    let fields = format!(
        "{}<p>Leave the template blank for a custom workflow.</p>",
        select(&FormData::default(), "template", "Template", &options, true)
    );
    let body = render::form(&format!("/workflows/matters/{id}/workflow/create/"), &fields, "Create workflow");
    Ok(me.render(&format!("Create Workflow for {}", matter.protocol_number), &body))
}

async fn workflow_create(
    State(app): State<AppState>,
    me: CurrentUser,
    Path(id): Path<i64>,
    Posted(form): Posted,
) -> Result<Response, AppError> {
    let mut errors = FormErrors::new();
    let template_id = forms::optional_id(&form, "template", &mut errors);
    if !errors.is_empty() {
        flash_errors(&me.session, &errors);
        return Ok(render::redirect(&format!("/workflows/matters/{id}/workflow/create/")));
    }
    let created = {
        let mut store = app.db()?;
        require(&me, store.get_matter(id)?, Action::Edit, matter_url(id))?;
        if store.workflow_for_matter(id)?.is_some() {
            me.session.warning("A workflow already exists for this matter.");
            return Ok(render::redirect(&workflow_url(id)));
        }
        let template = match template_id {
            Some(tid) => match store.get_workflow_template(tid) {
                Ok(t) => Some(t),
                Err(e) if e.is_not_found() => {
                    me.session.error("Error in template: Select a valid choice. That choice is not one of the available choices.");
                    return Ok(render::redirect(&format!("/workflows/matters/{id}/workflow/create/")));
                }
                Err(e) => return Err(e.into()),
            },
            None => None,
        };
        store.instantiate_workflow(id, template_id).map(|_| template)
    };
    match created {
        Ok(Some(template)) => me
            .session
            .success(format!("Workflow created from template '{}'. Steps added.", template.name)),
        Ok(None) => me.session.success("Custom workflow created. Add steps below."),
        Err(StoreError::Conflict(_)) => me.session.warning("A workflow already exists for this matter."),
        Err(e) => return Err(e.into()),
    }
    Ok(render::redirect(&workflow_url(id)))
}

/// Ask the AI provider for step suggestions and keep them on the workflow.
async fn trigger_ai_steps(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let (workflow, matter) = {
        let store = app.db()?;
        let workflow = store.get_workflow(id)?;
        let matter = store.get_matter(workflow.matter_id)?;
        let back = workflow_url(matter.id);
        (workflow, require(&me, matter, Action::Edit, back)?)
    };
    let gemini = app.gemini()?;
    match tasks::workflow_steps(&gemini, &matter.title, matter.description.as_deref()).await {
        Ok(steps) if !steps.is_empty() => {
            app.db()?.set_ai_generated_steps(workflow.id, &steps)?;
            info!(workflow_id = workflow.id, steps = steps.len(), "stored ai step suggestions");
            me.session.success("AI suggested steps have been generated. Review them below.");
        }
        Ok(_) => me.session.warning("AI failed to generate steps."),
        Err(e) => {
            warn!(workflow_id = workflow.id, error = %e, "ai step suggestion failed");
            me.session.warning(format!("AI failed to generate steps: {e}"));
        }
    }
    Ok(render::redirect(&workflow_url(matter.id)))
}

// ── Templates (admin) ──

async fn template_list(State(app): State<AppState>, AdminUser(me): AdminUser) -> Result<Response, AppError> {
    let templates = app.db()?.list_workflow_templates()?;
    let rows = templates
        .iter()
        .map(|t| vec![link(&template_url(t.id), &t.name), text(t.description.as_deref())])
        .collect();
    let body = format!(
        "<p>{}</p>{}",
        link("/workflows/templates/create/", "New template"),
        table(&["Name", "Description"], rows, "No workflow templates yet.")
    );
    Ok(me.render("Workflow Templates", &body))
}

fn template_form(values: &FormData) -> String {
    let fields = [input(values, "name", "Name", "text"), textarea(values, "description", "Description")].concat();
    render::form("/workflows/templates/create/", &fields, "Create")
}

async fn template_create_page(AdminUser(me): AdminUser) -> Response {
    me.render("Create Workflow Template", &template_form(&FormData::default()))
}

async fn template_create(State(app): State<AppState>, AdminUser(me): AdminUser, Posted(form): Posted) -> Result<Response, AppError> {
    let input = match TemplateInput::from_form(&form) {
        Ok(input) => input,
        Err(errors) => {
            flash_errors(&me.session, &errors);
            return Ok(me.render("Create Workflow Template", &template_form(&form)));
        }
    };
    let created = app.db()?.create_workflow_template(&input);
    match created {
        Ok(template) => {
            me.session.success(format!("Workflow template \"{}\" created.", template.name));
            Ok(render::redirect(&template_url(template.id)))
        }
        Err(StoreError::Conflict(msg)) => {
            me.session.error(format!("Error in name: {msg}"));
            Ok(me.render("Create Workflow Template", &template_form(&form)))
        }
        Err(e) => Err(e.into()),
    }
}

fn step_template_form(template_id: i64, values: &FormData) -> String {
    let fields = [
        input(values, "name", "Name", "text"),
        textarea(values, "description", "Description"),
        input(values, "order", "Order", "number"),
        checkbox(values, "is_required", "Required"),
    ]
    .concat();
    render::form(&format!("/workflows/templates/{template_id}/steps/"), &fields, "Add step")
}

async fn template_detail(State(app): State<AppState>, AdminUser(me): AdminUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let (template, steps) = {
        let store = app.db()?;
        (store.get_workflow_template(id)?, store.step_templates(id)?)
    };
    let rows = steps
        .iter()
        .map(|s| {
            vec![
                s.order.to_string(),
                escape(&s.name),
                text(s.description.as_deref()),
                if s.is_required { "Yes" } else { "No" }.into(),
            ]
        })
        .collect();
    let mut values = FormData::default();
    values.push("order", steps.iter().map(|s| s.order + 1).max().unwrap_or(1).to_string());
    values.push("is_required", "on");
    let body = format!(
        "<p>{}</p>{}<h2>Add a step</h2>{}<p>{} {}</p>",
        text(template.description.as_deref()),
        table(&["Order", "Step", "Description", "Required"], rows, "No steps yet."),
        step_template_form(id, &values),
        action(&format!("/workflows/templates/{id}/delete/"), "Delete template"),
        link("/workflows/templates/", "Back to templates"),
    );
    Ok(me.render(&template.name, &body))
}

async fn template_add_step(
    State(app): State<AppState>,
    AdminUser(me): AdminUser,
    Path(id): Path<i64>,
    Posted(form): Posted,
) -> Result<Response, AppError> {
    let input = match StepTemplateInput::from_form(&form) {
        Ok(input) => input,
        Err(errors) => {
            flash_errors(&me.session, &errors);
            return Ok(render::redirect(&template_url(id)));
        }
    };
    let added = app.db()?.add_step_template(id, &input);
    match added {
        Ok(step) => me.session.success(format!("Step \"{}\" added.", step.name)),
        Err(StoreError::Conflict(msg)) => me.session.error(format!("Error in order: {msg}")),
        Err(e) => return Err(e.into()),
    }
    Ok(render::redirect(&template_url(id)))
}

/// Workflows already created from the template keep their steps.
async fn template_delete(State(app): State<AppState>, AdminUser(me): AdminUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let name = {
        let mut store = app.db()?;
        let template = store.get_workflow_template(id)?;
        store.delete_workflow_template(id)?;
        template.name
    };
    info!(template_id = id, "deleted workflow template");
    me.session.success(format!("Workflow template \"{name}\" deleted."));
    Ok(render::redirect("/workflows/templates/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestApp, fake_gemini};
    use notaria_core::{ClientInput, IntegrationInput, Role, WorkflowStatus};

    fn matter_form_fields<'a>(title: &'a str, start: &'a str) -> Vec<(&'a str, &'a str)> {
        vec![("title", title), ("status", "open"), ("start_date", start)]
    }

    fn seed_template(app: &TestApp, steps: &[(&str, i32)]) -> i64 {
        let store = app.state.db().unwrap();
        let t = store
            .create_workflow_template(&TemplateInput {
                name: "Property sale".into(),
                description: None,
            })
            .unwrap();
        for (name, order) in steps {
            store
                .add_step_template(
                    t.id,
                    &StepTemplateInput {
                        name: (*name).into(),
                        description: None,
                        order: *order,
                        is_required: true,
                    },
                )
                .unwrap();
        }
        t.id
    }

    async fn create_matter(browser: &crate::testing::Browser, title: &str) -> i64 {
        let resp = browser
            .post_form("/workflows/matters/create/", &matter_form_fields(title, "2024-03-01"))
            .await;
        let to = TestApp::location(&resp);
        to.trim_start_matches("/workflows/matters/")
            .trim_end_matches('/')
            .parse()
            .unwrap_or_else(|_| panic!("unexpected redirect {to:?}"))
    }

    #[test]
    fn meeting_form_parsing() {
        let matter = notaria_store::Store::open()
            .and_then(|mut s| s.create_matter(&MatterInput::from_form(&FormData::from_slice(&[("title", "Sale"), ("start_date", "2024-01-01")])).unwrap(), None))
            .unwrap();
        let req = meeting_request(&FormData::from_slice(&[("start_time", "2024-05-01T09:30"), ("duration", "45")]), &matter).unwrap();
        assert_eq!(req.topic, "Sale");
        assert_eq!(req.duration_minutes, 45);
        assert_eq!(req.start_time.map(|t| t.to_string()).as_deref(), Some("2024-05-01 09:30:00"));
        assert!(meeting_request(&FormData::from_slice(&[("start_time", "tomorrow")]), &matter).is_err());
        assert_eq!(meeting_request(&FormData::default(), &matter).unwrap().start_time, None);
    }

    #[tokio::test]
    async fn create_matter_assigns_sequential_protocols() {
        let app = TestApp::spawn().await;
        app.user("ann", Role::Notary);
        let browser = app.login("ann").await;
        let first = create_matter(&browser, "Sale of 1 High St").await;
        let page = browser.page(&matter_url(first)).await;
        assert!(page.contains("Matter &quot;MAT-000001&quot; created successfully!"));
        let second = create_matter(&browser, "Probate").await;
        assert_eq!(app.state.db().unwrap().get_matter(second).unwrap().protocol_number, "MAT-000002");
    }

    #[tokio::test]
    async fn invalid_matter_dates_are_reported() {
        let app = TestApp::spawn().await;
        app.user("ann", Role::Notary);
        let browser = app.login("ann").await;
        let page = browser
            .post_form(
                "/workflows/matters/create/",
                &[("title", "Sale"), ("start_date", "2024-03-01"), ("due_date", "2024-02-01"), ("clients", "77")],
            )
            .await
            .text()
            .await
            .unwrap();
        assert!(page.contains("Error in due_date: Due date cannot be before the start date."));
        assert!(app.state.db().unwrap().list_matters(Scope::All).unwrap().is_empty());

        let page = browser
            .post_form("/workflows/matters/create/", &[("title", "Sale"), ("start_date", "2024-03-01"), ("clients", "77")])
            .await
            .text()
            .await
            .unwrap();
        assert!(page.contains("Error in clients: Select a valid choice. 77"));
    }

    #[tokio::test]
    async fn assignee_can_edit_but_not_delete() {
        let app = TestApp::spawn().await;
        let ann = app.user("ann", Role::Notary);
        let bob = app.user("bob", Role::Solicitor);
        let id = {
            let mut store = app.state.db().unwrap();
            let mut input = MatterInput::from_form(&FormData::from_slice(&[("title", "Lease"), ("start_date", "2024-01-01")])).unwrap();
            input.assigned_user_ids = vec![bob.id];
            store.create_matter(&input, Some(ann.id)).unwrap().id
        };
        let browser = app.login("bob").await;
        assert!(browser.page("/workflows/matters/").await.contains("MAT-000001"));
        let page = browser
            .post_and_follow(
                &format!("/workflows/matters/{id}/edit/"),
                &[("title", "Lease renewal"), ("status", "in_progress"), ("start_date", "2024-01-01"), ("assigned_users", &bob.id.to_string())],
            )
            .await;
        assert!(page.contains("Lease renewal"));

        let resp = browser.post_form(&format!("/workflows/matters/{id}/delete/"), &[]).await;
        assert_eq!(TestApp::location(&resp), matter_url(id));
        assert!(browser.page(&matter_url(id)).await.contains("You do not have permission to delete this matter."));

        let owner = app.login("ann").await;
        let page = owner.post_and_follow(&format!("/workflows/matters/{id}/delete/"), &[]).await;
        assert!(page.contains("deleted successfully"));
        assert!(app.state.db().unwrap().get_matter(id).unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn workflow_from_template_then_formset() {
        let app = TestApp::spawn().await;
        app.user("ann", Role::Notary);
        let template = seed_template(&app, &[("Collect ID", 1), ("Draft deed", 2)]);
        let browser = app.login("ann").await;
        let id = create_matter(&browser, "Sale").await;

        let resp = browser.get(&workflow_url(id)).await;
        assert_eq!(TestApp::location(&resp), format!("/workflows/matters/{id}/workflow/create/"));

        let page = browser
            .post_and_follow(&format!("/workflows/matters/{id}/workflow/create/"), &[("template", &template.to_string())])
            .await;
        assert!(page.contains("Workflow created from template &#x27;Property sale&#x27;. Steps added."));
        assert!(page.contains("value=\"Collect ID\""));

        let page = browser
            .post_and_follow(&format!("/workflows/matters/{id}/workflow/create/"), &[("template", "")])
            .await;
        assert!(page.contains("A workflow already exists for this matter."));

        let (wf, steps) = {
            let store = app.state.db().unwrap();
            let wf = store.workflow_for_matter(id).unwrap().unwrap();
            let steps = store.workflow_steps(wf.id).unwrap();
            (wf, steps)
        };
        assert_eq!(steps.len(), 2);
        let first = steps[0].id.to_string();
        let second = steps[1].id.to_string();
        let page = browser
            .post_and_follow(
                &workflow_url(id),
                &[
                    ("steps-TOTAL_FORMS", "3"),
                    ("steps-0-id", &first),
                    ("steps-0-name", "Collect ID"),
                    ("steps-0-order", "1"),
                    ("steps-0-status", "completed"),
                    ("steps-1-id", &second),
                    ("steps-1-name", "Draft deed"),
                    ("steps-1-order", "2"),
                    ("steps-1-status", "in_progress"),
                    ("steps-2-name", "Sign"),
                    ("steps-2-order", "3"),
                ],
            )
            .await;
        assert!(page.contains("Workflow steps updated successfully."));
        let store = app.state.db().unwrap();
        let steps = store.workflow_steps(wf.id).unwrap();
        assert_eq!(steps.len(), 3);
        assert!(steps[0].completed_at.is_some());
        assert_eq!(store.get_workflow(wf.id).unwrap().status, WorkflowStatus::InProgress);
    }

    #[tokio::test]
    async fn duplicate_step_orders_are_rejected() {
        let app = TestApp::spawn().await;
        app.user("ann", Role::Notary);
        let browser = app.login("ann").await;
        let id = create_matter(&browser, "Sale").await;
        let page = browser
            .post_and_follow(&format!("/workflows/matters/{id}/workflow/create/"), &[("template", "")])
            .await;
        assert!(page.contains("Custom workflow created. Add steps below."));
        let resp = browser
            .post_form(
                &workflow_url(id),
                &[
                    ("steps-TOTAL_FORMS", "2"),
                    ("steps-0-name", "One"),
                    ("steps-0-order", "1"),
                    ("steps-1-name", "Two"),
                    ("steps-1-order", "1"),
                ],
            )
            .await;
        let page = resp.text().await.unwrap();
        assert!(page.contains("Please correct the errors below."));
        assert!(page.contains("Step order must be unique within a workflow."));
        let store = app.state.db().unwrap();
        let wf = store.workflow_for_matter(id).unwrap().unwrap();
        assert!(store.workflow_steps(wf.id).unwrap().is_empty());
    }

    #[tokio::test]
    async fn ai_step_suggestions_are_stored() {
        let url = fake_gemini(r#"["Verify identity", "Draft deed", "Sign"]"#).await;
        let app = TestApp::spawn_with(|s| {
            s.gemini.base_url = url;
            s.gemini.api_key = Some("k".into());
        })
        .await;
        app.user("ann", Role::Notary);
        let browser = app.login("ann").await;
        let id = create_matter(&browser, "Sale").await;
        browser
            .post_form(&format!("/workflows/matters/{id}/workflow/create/"), &[("template", "")])
            .await;
        let wf = app.state.db().unwrap().workflow_for_matter(id).unwrap().unwrap();
        let page = browser
            .post_and_follow(&format!("/workflows/workflows/{}/trigger-ai-steps/", wf.id), &[])
            .await;
        assert!(page.contains("AI suggested steps have been generated."));
        assert!(page.contains("<li>Verify identity</li>"));
    }

    #[tokio::test]
    async fn email_without_gmail_link_reports_error() {
        let app = TestApp::spawn().await;
        let ann = app.user("ann", Role::Notary);
        let id = {
            let mut store = app.state.db().unwrap();
            let client = store
                .create_client(
                    &ClientInput {
                        email: Some("client@example.com".into()),
                        ..ClientInput::default()
                    },
                    Some(ann.id),
                )
                .unwrap();
            let mut input = MatterInput::from_form(&FormData::from_slice(&[("title", "Lease"), ("start_date", "2024-01-01")])).unwrap();
            input.client_ids = vec![client.id];
            store.create_matter(&input, Some(ann.id)).unwrap().id
        };
        let browser = app.login("ann").await;
        let page = browser
            .post_and_follow(&format!("/workflows/matters/{id}/email/"), &[("subject", "Hello"), ("message", "Hi")])
            .await;
        assert!(page.contains("Could not send email"));
        let logs = app.state.db().unwrap().recent_logs(5).unwrap();
        assert_eq!(logs[0].level, LogLevel::Error);
    }

    #[tokio::test]
    async fn meeting_link_is_appended_to_notes() {
        let zoom = axum::Router::new()
            .route("/oauth/token", axum::routing::post(|| async { axum::Json(serde_json::json!({"access_token": "zt"})) }))
            .route(
                "/v2/users/me/meetings",
                axum::routing::post(|| async {
                    axum::Json(serde_json::json!({"id": 8812, "join_url": "https://zoom.example/j/8812"}))
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, zoom).await.unwrap() });

        let app = TestApp::spawn_with(|s| {
            s.zoom.base_url = format!("http://{addr}");
            s.zoom.oauth_base_url = format!("http://{addr}");
            s.zoom.account_id = Some("acct".into());
        })
        .await;
        app.state
            .db()
            .unwrap()
            .create_integration(&IntegrationInput {
                service_name: ServiceName::Zoom,
                is_enabled: true,
                api_key: Some("id".into()),
                api_secret: Some("secret".into()),
            })
            .unwrap();
        app.user("ann", Role::Notary);
        let browser = app.login("ann").await;
        let id = create_matter(&browser, "Sale").await;
        let page = browser
            .post_and_follow(&format!("/workflows/matters/{id}/meeting/"), &[("topic", "Signing"), ("duration", "30")])
            .await;
        assert!(page.contains("Zoom meeting created: https://zoom.example/j/8812"));
        let notes = app.state.db().unwrap().get_matter(id).unwrap().notes.unwrap();
        assert!(notes.contains("https://zoom.example/j/8812"));
    }

    #[tokio::test]
    async fn templates_are_admin_only() {
        let app = TestApp::spawn().await;
        app.user("ann", Role::Notary);
        app.admin("root");
        let ann = app.login("ann").await;
        let resp = ann.get("/workflows/templates/").await;
        assert_eq!(TestApp::location(&resp), "/dashboard/");

        let root = app.login("root").await;
        let resp = root
            .post_form("/workflows/templates/create/", &[("name", "Probate"), ("description", "Estate work")])
            .await;
        let to = TestApp::location(&resp);
        let page = root.post_and_follow(&format!("{to}steps/"), &[("name", "Obtain grant"), ("order", "1"), ("is_required", "on")]).await;
        assert!(page.contains("Step &quot;Obtain grant&quot; added."));
        let page = root.post_and_follow(&format!("{to}steps/"), &[("name", "Again"), ("order", "1")]).await;
        assert!(page.contains("Error in order:"));

        let resp = ann.post_form(&format!("{to}delete/"), &[]).await;
        assert_eq!(TestApp::location(&resp), "/dashboard/");
        let page = root.post_and_follow(&format!("{to}delete/"), &[]).await;
        assert!(page.contains("Workflow template &quot;Probate&quot; deleted."));
        assert!(app.state.db().unwrap().list_workflow_templates().unwrap().is_empty());
    }
}
