//! Client and lead pages, plus AI segmentation tagging.

use axum::Router;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use notaria_ai::tasks;
use notaria_core::access::Action;
use notaria_core::{Client, ClientInput, ClientStatus, ClientType, FormData, Lead, LeadInput, LeadStatus};
use notaria_store::{Scope, StoreError};
use serde::Deserialize;
use tracing::{info, warn};

use crate::forms::{Posted, flash_errors};
use crate::gate::require;
use crate::render::{self, action, choices, definition_list, escape, input, link, select, table, text, textarea};
use crate::session::CurrentUser;
use crate::{AppError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/clients/", get(client_list))
        .route("/clients/create/", get(client_create_page).post(client_create))
        .route("/clients/:id/", get(client_detail))
        .route("/clients/:id/edit/", get(client_edit_page).post(client_edit))
        .route("/clients/:id/delete/", get(client_delete_page).post(client_delete))
        .route("/clients/:id/tag/", post(client_tag))
        .route("/clients/leads/", get(lead_list))
        .route("/clients/leads/create/", get(lead_create_page).post(lead_create))
        .route("/clients/leads/:id/", get(lead_detail))
        .route("/clients/leads/:id/edit/", get(lead_edit_page).post(lead_edit))
        .route("/clients/leads/:id/convert/", get(lead_convert_page).post(lead_convert))
}

const CLIENT_LIST: &str = "/clients/";
const LEAD_LIST: &str = "/clients/leads/";

fn client_url(id: i64) -> String {
    format!("/clients/{id}/")
}

fn lead_url(id: i64) -> String {
    format!("/clients/leads/{id}/")
}

// ── Clients ──

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    q: Option<String>,
}

/// Case-insensitive match on names, contact details and notes.
fn matches_search(client: &Client, needle: &str) -> bool {
    let needle = needle.to_lowercase();
    [
        &client.first_name,
        &client.last_name,
        &client.business_name,
        &client.email,
        &client.phone_number,
        &client.notes,
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(&needle))
}

async fn client_list(State(app): State<AppState>, me: CurrentUser, Query(q): Query<SearchQuery>) -> Result<Response, AppError> {
    let mut clients = app.db()?.list_clients(Scope::for_user(&me.user))?;
    let search = q.q.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    if let Some(needle) = &search {
        clients.retain(|c| matches_search(c, needle));
    }
    let rows = clients
        .iter()
        .map(|c| {
            vec![
                link(&client_url(c.id), &c.display_name()),
                c.client_type.label().into(),
                c.status.label().into(),
                text(c.email.as_deref()),
                text(c.phone_number.as_deref()),
            ]
        })
        .collect();
    let body = format!(
        "<form method=\"get\" action=\"/clients/\"><input type=\"search\" name=\"q\" value=\"{}\"> \
         <button>Search</button></form><p>{}</p>{}",
        escape(search.as_deref().unwrap_or_default()),
        link("/clients/create/", "New client"),
        table(&["Name", "Type", "Status", "Email", "Phone"], rows, "No clients found.")
    );
    Ok(me.render("Clients", &body))
}

fn client_values(c: &Client) -> FormData {
    let mut values = FormData::default();
    values.push("client_type", c.client_type.as_str());
    values.push("status", c.status.as_str());
    let optional = [
        ("first_name", c.first_name.clone()),
        ("last_name", c.last_name.clone()),
        ("date_of_birth", c.date_of_birth.map(|d| d.to_string())),
        ("business_name", c.business_name.clone()),
        ("registration_number", c.registration_number.clone()),
        ("email", c.email.clone()),
        ("phone_number", c.phone_number.clone()),
        ("address", c.address.clone()),
        ("notes", c.notes.clone()),
    ];
    for (name, value) in optional {
        if let Some(v) = value {
            values.push(name, v);
        }
    }
    values
}

fn client_form(action_url: &str, values: &FormData, submit: &str) -> String {
    let fields = [
        select(values, "client_type", "Client type", &choices(ClientType::ALL, ClientType::as_str, ClientType::label), false),
        input(values, "first_name", "First name", "text"),
        input(values, "last_name", "Last name", "text"),
        input(values, "date_of_birth", "Date of birth", "date"),
        input(values, "business_name", "Business name", "text"),
        input(values, "registration_number", "Registration number", "text"),
        input(values, "email", "Email", "email"),
        input(values, "phone_number", "Phone number", "text"),
        textarea(values, "address", "Address"),
        select(values, "status", "Status", &choices(ClientStatus::ALL, ClientStatus::as_str, ClientStatus::label), false),
        textarea(values, "notes", "Notes"),
    ]
    .concat();
    render::form(action_url, &fields, submit)
}

async fn client_create_page(me: CurrentUser) -> Response {
    me.render("Create New Client", &client_form("/clients/create/", &FormData::default(), "Create"))
}

async fn client_create(State(app): State<AppState>, me: CurrentUser, Posted(form): Posted) -> Result<Response, AppError> {
    let input = match ClientInput::from_form(&form) {
        Ok(input) => input,
        Err(errors) => {
            flash_errors(&me.session, &errors);
            return Ok(me.render("Create New Client", &client_form("/clients/create/", &form, "Create")));
        }
    };
    let client = app.db()?.create_client(&input, Some(me.id()))?;
    me.session.success(format!("Client \"{}\" created successfully!", client.display_name()));
    Ok(render::redirect(&client_url(client.id)))
}

async fn client_detail(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let client = app.db()?.get_client(id)?;
    let client = require(&me, client, Action::View, CLIENT_LIST)?;
    let tags = if client.segmentation_tags.is_empty() {
        "-".to_string()
    } else {
        escape(&client.segmentation_tags.join(", "))
    };
    let details = definition_list(&[
        ("Type", client.client_type.label().into()),
        ("Status", client.status.label().into()),
        ("First name", text(client.first_name.as_deref())),
        ("Last name", text(client.last_name.as_deref())),
        ("Date of birth", render::date(client.date_of_birth)),
        ("Business name", text(client.business_name.as_deref())),
        ("Registration number", text(client.registration_number.as_deref())),
        ("Email", text(client.email.as_deref())),
        ("Phone", text(client.phone_number.as_deref())),
        ("Address", text(client.address.as_deref())),
        ("Notes", text(client.notes.as_deref())),
        ("Segmentation tags", tags),
        ("Created", render::timestamp(Some(client.created_at))),
    ]);
    let body = format!(
        "{details}<p>{} {} {} {}</p>",
        link(&format!("/clients/{id}/edit/"), "Edit"),
        link(&format!("/clients/{id}/delete/"), "Delete"),
        action(&format!("/clients/{id}/tag/"), "Generate AI tags"),
        link(CLIENT_LIST, "Back to clients"),
    );
    Ok(me.render(&client.display_name(), &body))
}

async fn client_edit_page(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let client = app.db()?.get_client(id)?;
    let client = require(&me, client, Action::Edit, client_url(id))?;
    let form = client_form(&format!("/clients/{id}/edit/"), &client_values(&client), "Save");
    Ok(me.render(&format!("Edit Client: {}", client.display_name()), &form))
}

async fn client_edit(
    State(app): State<AppState>,
    me: CurrentUser,
    Path(id): Path<i64>,
    Posted(form): Posted,
) -> Result<Response, AppError> {
    let client = app.db()?.get_client(id)?;
    let client = require(&me, client, Action::Edit, client_url(id))?;
    let input = match ClientInput::from_form(&form) {
        Ok(input) => input,
        Err(errors) => {
            flash_errors(&me.session, &errors);
            let page = client_form(&format!("/clients/{id}/edit/"), &form, "Save");
            return Ok(me.render(&format!("Edit Client: {}", client.display_name()), &page));
        }
    };
    let client = app.db()?.update_client(id, &input)?;
    me.session.success(format!("Client \"{}\" updated successfully!", client.display_name()));
    Ok(render::redirect(&client_url(id)))
}

async fn client_delete_page(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let client = app.db()?.get_client(id)?;
    let client = require(&me, client, Action::Delete, client_url(id))?;
    let body = format!(
        "<p>Are you sure you want to delete \"{}\"?</p>{} {}",
        escape(&client.display_name()),
        action(&format!("/clients/{id}/delete/"), "Yes, delete"),
        link(&client_url(id), "Cancel"),
    );
    Ok(me.render("Delete Client", &body))
}

async fn client_delete(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let name = {
        let mut store = app.db()?;
        let client = require(&me, store.get_client(id)?, Action::Delete, client_url(id))?;
        store.delete_client(id)?;
        client.display_name()
    };
    me.session.success(format!("Client \"{name}\" deleted successfully."));
    Ok(render::redirect(CLIENT_LIST))
}

/// Ask the AI provider for segmentation tags and store them on the client.
async fn client_tag(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let client = app.db()?.get_client(id)?;
    let client = require(&me, client, Action::Edit, client_url(id))?;
    let gemini = app.gemini()?;
    match tasks::segmentation_tags(&gemini, &client).await {
        Ok(tags) => {
            app.db()?.set_segmentation_tags(id, &tags)?;
            info!(client_id = id, tags = tags.len(), "generated segmentation tags");
            me.session.success(format!("Segmentation tags updated: {}", tags.join(", ")));
        }
        Err(e) => {
            warn!(client_id = id, error = %e, "segmentation tagging failed");
            me.session.warning(format!("Could not generate segmentation tags: {e}"));
        }
    }
    Ok(render::redirect(&client_url(id)))
}

// ── Leads ──

async fn lead_list(State(app): State<AppState>, me: CurrentUser) -> Result<Response, AppError> {
    let leads = app.db()?.list_leads(Scope::for_user(&me.user))?;
    let rows = leads
        .iter()
        .map(|l| {
            vec![
                link(&lead_url(l.id), &l.name),
                l.status.label().into(),
                text(l.source.as_deref()),
                text(l.email.as_deref()),
                render::timestamp(Some(l.created_at)),
            ]
        })
        .collect();
    let body = format!(
        "<p>{}</p>{}",
        link("/clients/leads/create/", "New lead"),
        table(&["Name", "Status", "Source", "Email", "Created"], rows, "No leads yet.")
    );
    Ok(me.render("Leads", &body))
}

fn lead_values(l: &Lead) -> FormData {
    let mut values = FormData::default();
    values.push("name", l.name.as_str());
    values.push("status", l.status.as_str());
    for (name, value) in [
        ("email", &l.email),
        ("phone_number", &l.phone_number),
        ("source", &l.source),
        ("notes", &l.notes),
    ] {
        if let Some(v) = value {
            values.push(name, v.as_str());
        }
    }
    values
}

fn lead_form(action_url: &str, values: &FormData, submit: &str) -> String {
    let fields = [
        input(values, "name", "Name", "text"),
        input(values, "email", "Email", "email"),
        input(values, "phone_number", "Phone number", "text"),
        input(values, "source", "Source", "text"),
        select(values, "status", "Status", &choices(LeadStatus::ALL, LeadStatus::as_str, LeadStatus::label), false),
        textarea(values, "notes", "Notes"),
    ]
    .concat();
    render::form(action_url, &fields, submit)
}

async fn lead_create_page(me: CurrentUser) -> Response {
    me.render("Create New Lead", &lead_form("/clients/leads/create/", &FormData::default(), "Create"))
}

async fn lead_create(State(app): State<AppState>, me: CurrentUser, Posted(form): Posted) -> Result<Response, AppError> {
    let mut input = match LeadInput::from_form(&form) {
        Ok(input) => input,
        Err(errors) => {
            flash_errors(&me.session, &errors);
            return Ok(me.render("Create New Lead", &lead_form("/clients/leads/create/", &form, "Create")));
        }
    };
    input.assigned_to = Some(me.id());
    let lead = app.db()?.create_lead(&input)?;
    me.session.success(format!("Lead \"{}\" created.", lead.name));
    Ok(render::redirect(LEAD_LIST))
}

async fn lead_detail(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let lead = app.db()?.get_lead(id)?;
    let lead = require(&me, lead, Action::View, LEAD_LIST)?;
    let details = definition_list(&[
        ("Status", lead.status.label().into()),
        ("Email", text(lead.email.as_deref())),
        ("Phone", text(lead.phone_number.as_deref())),
        ("Source", text(lead.source.as_deref())),
        ("Notes", text(lead.notes.as_deref())),
        ("Created", render::timestamp(Some(lead.created_at))),
    ]);
    let convert = if lead.status == LeadStatus::Converted {
        String::new()
    } else {
        link(&format!("/clients/leads/{id}/convert/"), "Convert to client")
    };
    let body = format!(
        "{details}<p>{} {convert} {}</p>",
        link(&format!("/clients/leads/{id}/edit/"), "Edit"),
        link(LEAD_LIST, "Back to leads"),
    );
    Ok(me.render(&lead.name, &body))
}

async fn lead_edit_page(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let lead = app.db()?.get_lead(id)?;
    let lead = require(&me, lead, Action::Edit, lead_url(id))?;
    let form = lead_form(&format!("/clients/leads/{id}/edit/"), &lead_values(&lead), "Save");
    Ok(me.render(&format!("Edit Lead: {}", lead.name), &form))
}

async fn lead_edit(
    State(app): State<AppState>,
    me: CurrentUser,
    Path(id): Path<i64>,
    Posted(form): Posted,
) -> Result<Response, AppError> {
    let lead = app.db()?.get_lead(id)?;
    let lead = require(&me, lead, Action::Edit, lead_url(id))?;
    let mut input = match LeadInput::from_form(&form) {
        Ok(input) => input,
        Err(errors) => {
            flash_errors(&me.session, &errors);
            let page = lead_form(&format!("/clients/leads/{id}/edit/"), &form, "Save");
            return Ok(me.render(&format!("Edit Lead: {}", lead.name), &page));
        }
    };
    // Reassignment is not offered on this form.
    input.assigned_to = lead.assigned_to;
    let lead = app.db()?.update_lead(id, &input)?;
    me.session.success(format!("Lead \"{}\" updated.", lead.name));
    Ok(render::redirect(&lead_url(id)))
}

async fn lead_convert_page(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let lead = app.db()?.get_lead(id)?;
    let lead = require(&me, lead, Action::Edit, lead_url(id))?;
    let body = format!(
        "<p>Convert \"{}\" into a client?</p>{} {}",
        escape(&lead.name),
        action(&format!("/clients/leads/{id}/convert/"), "Convert"),
        link(&lead_url(id), "Cancel"),
    );
    Ok(me.render("Convert Lead", &body))
}

async fn lead_convert(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let converted = {
        let mut store = app.db()?;
        let lead = require(&me, store.get_lead(id)?, Action::Edit, lead_url(id))?;
        store.convert_lead(id, Some(me.id())).map(|client| (lead, client))
    };
    match converted {
        Ok((lead, client)) => {
            me.session.success(format!("Lead \"{}\" converted to client.", lead.name));
            Ok(render::redirect(&client_url(client.id)))
        }
        Err(StoreError::Conflict(msg)) => {
            me.session.error(msg);
            Ok(render::redirect(&lead_url(id)))
        }
        Err(e) => Err(e.into()),
    }
}
