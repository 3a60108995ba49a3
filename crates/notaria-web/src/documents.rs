//! Document pages: upload, metadata edits, download and the AI summary and
//! segmentation actions.

use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use notaria_ai::{AiError, extract, tasks};
use notaria_core::access::{Action, can_upload_to_matter};
use notaria_core::document::{UploadFields, resolve_file_type};
use notaria_core::{Document, DocumentEdit, DocumentStatus, FormData, FormErrors, NewDocument};
use notaria_store::Scope;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::forms::{Posted, flash_errors};
use crate::gate::{query_id, require};
use crate::render::{self, choices, definition_list, escape, input, link, select, table, text};
use crate::session::CurrentUser;
use crate::{AppError, AppState};

/// Uploads larger than this are rejected before the handler runs.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/documents/", get(document_list))
        .route("/documents/upload/", get(upload_page).post(upload))
        .route(
            "/documents/matters/:id/upload/",
            get(matter_upload_page).post(matter_upload),
        )
        .route("/documents/:id/", get(document_detail))
        .route("/documents/:id/edit/", get(edit_page).post(edit))
        .route("/documents/:id/delete/", get(delete_page).post(delete))
        .route("/documents/:id/download/", get(download))
        .route("/documents/:id/summarize/", post(summarize))
        .route("/documents/:id/segment/", post(segment))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}

const DOCUMENT_LIST: &str = "/documents/";

fn document_url(id: i64) -> String {
    format!("/documents/{id}/")
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    matter: Option<String>,
}

async fn document_list(
    State(app): State<AppState>,
    me: CurrentUser,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppError> {
    let matter = query_id(query.matter.as_deref());
    let documents = app.db()?.list_documents(Scope::for_user(&me.user), matter)?;
    let rows = documents
        .iter()
        .map(|d| {
            vec![
                link(&document_url(d.id), &d.name),
                escape(&d.file_type),
                d.file_size.to_string(),
                d.status.label().into(),
                render::timestamp(Some(d.upload_date)),
            ]
        })
        .collect();
    let body = format!(
        "<p>{}</p>{}",
        link("/documents/upload/", "Upload document"),
        table(&["Name", "Type", "Size", "Status", "Uploaded"], rows, "No documents yet.")
    );
    Ok(me.render("Documents", &body))
}

// ── Upload ──

/// A received file part plus the other fields of the form.
struct Upload {
    fields: FormData,
    file: Option<(String, Option<String>, Vec<u8>)>,
}

async fn read_multipart(mut multipart: Multipart) -> Result<Upload, AppError> {
    let bad = |e: axum::extract::multipart::MultipartError| AppError::BadRequest(format!("Malformed upload: {e}"));
    let mut fields = FormData::default();
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(bad)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(bad)?;
            if !file_name.is_empty() && !bytes.is_empty() {
                file = Some((file_name, content_type, bytes.to_vec()));
            }
        } else {
            let value = field.text().await.map_err(bad)?;
            fields.push(name, value);
        }
    }
    Ok(Upload { fields, file })
}

fn upload_form(
    app: &AppState,
    me: &CurrentUser,
    action: &str,
    values: &FormData,
    pick_matter: bool,
) -> Result<String, AppError> {
    let store = app.db()?;
    let scope = Scope::for_user(&me.user);
    let clients: Vec<(String, String)> = store
        .list_clients(scope)?
        .iter()
        .map(|c| (c.id.to_string(), c.display_name()))
        .collect();
    let mut fields = format!(
        "<label for=\"file\">File</label><input type=\"file\" id=\"file\" name=\"file\">{}{}",
        input(values, "name", "Name (defaults to the file name)", "text"),
        select(values, "client", "Client", &clients, true),
    );
    if pick_matter {
        let matters: Vec<(String, String)> = store
            .list_matters(scope)?
            .into_iter()
            .map(|m| (m.id.to_string(), format!("{} {}", m.protocol_number, m.title)))
            .collect();
        fields.push_str(&select(values, "matter", "Matter", &matters, true));
    }
    Ok(render::multipart_form(action, &fields, "Upload"))
}

async fn upload_page(State(app): State<AppState>, me: CurrentUser) -> Result<Response, AppError> {
    let form = upload_form(&app, &me, "/documents/upload/", &FormData::default(), true)?;
    Ok(me.render("Upload Document", &form))
}

async fn upload(State(app): State<AppState>, me: CurrentUser, multipart: Multipart) -> Result<Response, AppError> {
    let received = read_multipart(multipart).await?;
    match store_upload(&app, &me, received, None)? {
        Ok(doc) => Ok(render::redirect(&document_url(doc.id))),
        Err(values) => {
            let form = upload_form(&app, &me, "/documents/upload/", &values, true)?;
            Ok(me.render("Upload Document", &form))
        }
    }
}

async fn matter_upload_page(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let matter = app.db()?.get_matter(id)?;
    if !can_upload_to_matter(&me.user, &matter) {
        me.session
            .error("You do not have permission to upload documents to this matter.");
        return Ok(render::redirect(&format!("/workflows/matters/{id}/")));
    }
    let action = format!("/documents/matters/{id}/upload/");
    let form = upload_form(&app, &me, &action, &FormData::default(), false)?;
    Ok(me.render(&format!("Upload Document to {}", matter.protocol_number), &form))
}

async fn matter_upload(
    State(app): State<AppState>,
    me: CurrentUser,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let matter = app.db()?.get_matter(id)?;
    let matter_url = format!("/workflows/matters/{id}/");
    if !can_upload_to_matter(&me.user, &matter) {
        me.session
            .error("You do not have permission to upload documents to this matter.");
        return Ok(render::redirect(&matter_url));
    }
    let received = read_multipart(multipart).await?;
    match store_upload(&app, &me, received, Some(id))? {
        Ok(_) => Ok(render::redirect(&matter_url)),
        Err(values) => {
            let action = format!("/documents/matters/{id}/upload/");
            let form = upload_form(&app, &me, &action, &values, false)?;
            Ok(me.render(&format!("Upload Document to {}", matter.protocol_number), &form))
        }
    }
}

/// Validate and persist an upload. The inner `Err` carries the submitted
/// values back for re-rendering after the errors were flashed.
fn store_upload(
    app: &AppState,
    me: &CurrentUser,
    received: Upload,
    matter_id: Option<i64>,
) -> Result<Result<Document, FormData>, AppError> {
    let Upload { fields, file } = received;
    let mut errors = FormErrors::new();
    let meta = match UploadFields::from_form(&fields) {
        Ok(meta) => Some(meta),
        Err(e) => {
            errors.merge(e);
            None
        }
    };
    if file.is_none() {
        errors.add("file", "No file was submitted.");
    }
    if let Some(meta) = &meta {
        let store = app.db()?;
        if let Some(cid) = meta.client_id
            && !store.client_ids()?.contains(&cid)
        {
            errors.add("client", "Select a valid choice. That choice is not one of the available choices.");
        }
        if matter_id.is_none()
            && let Some(mid) = meta.matter_id
            && let Err(e) = store.get_matter(mid)
        {
            if !e.is_not_found() {
                return Err(e.into());
            }
            errors.add("matter", "Select a valid choice. That choice is not one of the available choices.");
        }
    }
    let (Some(meta), Some((file_name, content_type, bytes)), true) = (meta, file, errors.is_empty()) else {
        flash_errors(&me.session, &errors);
        return Ok(Err(fields));
    };

    let (path, size) = app
        .media
        .save_document(&file_name, &bytes, notaria_core::now().date())?;
    let new = NewDocument {
        uploaded_by: me.id(),
        file: path,
        name: meta.name.unwrap_or_else(|| file_name.clone()),
        file_type: resolve_file_type(content_type.as_deref(), &file_name),
        file_size: size,
        client_id: meta.client_id,
        matter_id: matter_id.or(meta.matter_id),
    };
    let doc = app.db()?.create_document(&new)?;
    info!(document_id = doc.id, file = %doc.file, size, "document uploaded");
    me.session
        .success(format!("Document \"{}\" uploaded successfully!", doc.name));
    Ok(Ok(doc))
}

// ── Detail, edit, delete ──

fn load(app: &AppState, me: &CurrentUser, id: i64, action: Action) -> Result<Document, AppError> {
    let back = if action == Action::View { DOCUMENT_LIST.to_string() } else { document_url(id) };
    let doc = app.db()?.get_document(id)?;
    require(me, doc, action, back)
}

fn segmentation_view(result: Option<&Value>) -> String {
    let Some(result) = result else {
        return "-".into();
    };
    match result.get("segments").and_then(Value::as_object) {
        Some(segments) if !segments.is_empty() => {
            let items: Vec<(&str, String)> = segments
                .iter()
                .map(|(section, body)| {
                    let body = body.as_str().map(str::to_string).unwrap_or_else(|| body.to_string());
                    (section.as_str(), escape(&body))
                })
                .collect();
            definition_list(&items)
        }
        _ => format!(
            "<pre>{}</pre>",
            escape(result.get("text").and_then(Value::as_str).unwrap_or_default())
        ),
    }
}

async fn document_detail(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let doc = load(&app, &me, id, Action::View)?;
    let (client, matter) = {
        let store = app.db()?;
        let client = doc.client_id.map(|cid| store.get_client(cid)).transpose()?;
        let matter = doc.matter_id.map(|mid| store.get_matter(mid)).transpose()?;
        (client, matter)
    };
    let client = client
        .map(|c| link(&format!("/clients/{}/", c.id), &c.display_name()))
        .unwrap_or_else(|| "-".into());
    let matter = matter
        .map(|m| link(&format!("/workflows/matters/{}/", m.id), &m.protocol_number))
        .unwrap_or_else(|| "-".into());
    let details = definition_list(&[
        ("File", escape(doc.file_name())),
        ("Type", escape(&doc.file_type)),
        ("Size", format!("{} bytes", doc.file_size)),
        ("Uploaded", render::timestamp(Some(doc.upload_date))),
        ("Status", doc.status.label().into()),
        ("Client", client),
        ("Matter", matter),
    ]);
    let body = format!(
        "{details}<h2>Summary</h2><p>{}</p><h2>Segmentation</h2>{}<p>{} {} {} {}</p><p>{} {}</p>",
        text(doc.summary.as_deref()),
        segmentation_view(doc.segmentation_result.as_ref()),
        link(&format!("/documents/{id}/download/"), "Download"),
        link(&format!("/documents/{id}/edit/"), "Edit"),
        link(&format!("/documents/{id}/delete/"), "Delete"),
        link(DOCUMENT_LIST, "Back to documents"),
        render::action(&format!("/documents/{id}/summarize/"), "Summarize with AI"),
        render::action(&format!("/documents/{id}/segment/"), "Segment with AI"),
    );
    Ok(me.render(&doc.name, &body))
}

fn edit_values(doc: &Document) -> FormData {
    let mut values = FormData::default();
    values.push("name", doc.name.clone());
    values.push("status", doc.status.as_str());
    if let Some(cid) = doc.client_id {
        values.push("client", cid.to_string());
    }
    if let Some(mid) = doc.matter_id {
        values.push("matter", mid.to_string());
    }
    values
}

fn edit_form(app: &AppState, me: &CurrentUser, id: i64, values: &FormData) -> Result<String, AppError> {
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
    let statuses = choices(DocumentStatus::ALL, DocumentStatus::as_str, DocumentStatus::label);
    let fields = [
        input(values, "name", "Name", "text"),
        select(values, "client", "Client", &clients, true),
        select(values, "matter", "Matter", &matters, true),
        select(values, "status", "Status", &statuses, false),
    ]
    .concat();
    Ok(render::form(&format!("/documents/{id}/edit/"), &fields, "Save"))
}

async fn edit_page(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let doc = load(&app, &me, id, Action::Edit)?;
    let form = edit_form(&app, &me, id, &edit_values(&doc))?;
    Ok(me.render(&format!("Edit {}", doc.name), &form))
}

async fn edit(
    State(app): State<AppState>,
    me: CurrentUser,
    Path(id): Path<i64>,
    Posted(form): Posted,
) -> Result<Response, AppError> {
    let doc = load(&app, &me, id, Action::Edit)?;
    match DocumentEdit::from_form(&form, &doc) {
        Ok(input) => {
            let updated = app.db()?.update_document(id, &input)?;
            me.session
                .success(format!("Document \"{}\" updated successfully!", updated.name));
            Ok(render::redirect(&document_url(id)))
        }
        Err(errors) => {
            flash_errors(&me.session, &errors);
            let page = edit_form(&app, &me, id, &form)?;
            Ok(me.render(&format!("Edit {}", doc.name), &page))
        }
    }
}

async fn delete_page(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let doc = load(&app, &me, id, Action::Delete)?;
    let body = format!(
        "<p>Delete \"{}\" and its stored file?</p>{} {}",
        escape(&doc.name),
        render::action(&format!("/documents/{id}/delete/"), "Yes, delete"),
        link(&document_url(id), "Cancel")
    );
    Ok(me.render("Delete Document", &body))
}

async fn delete(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let doc = load(&app, &me, id, Action::Delete)?;
    app.db()?.delete_document(id, &app.media)?;
    me.session
        .success(format!("Document \"{}\" deleted successfully.", doc.name));
    Ok(render::redirect(DOCUMENT_LIST))
}

async fn download(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let doc = load(&app, &me, id, Action::View)?;
    if !app.media.exists(&doc.file) {
        warn!(document_id = id, file = %doc.file, "stored file is missing");
        me.session.error("The file for this document is missing.");
        return Ok(render::redirect(&document_url(id)));
    }
    let bytes = app.media.read(&doc.file)?;
    let disposition = format!("attachment; filename=\"{}\"", doc.file_name().replace('"', ""));
    Ok((
        [
            (header::CONTENT_TYPE, doc.file_type.clone()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}

// ── AI processing ──

/// Text content of the stored file. When there is none to process the
/// document is marked `error` and `None` is returned.
fn document_text(app: &AppState, me: &CurrentUser, doc: &Document) -> Result<Option<String>, AppError> {
    if !app.media.exists(&doc.file) {
        warn!(document_id = doc.id, file = %doc.file, "stored file is missing");
        app.db()?.set_document_status(doc.id, DocumentStatus::Error)?;
        me.session.error("The file for this document is missing.");
        return Ok(None);
    }
    let bytes = app.media.read(&doc.file)?;
    match extract::extract_text(&bytes, &doc.file_type) {
        Ok(text) => Ok(Some(text)),
        Err(e @ AiError::UnsupportedContent(_)) => {
            app.db()?.set_document_status(doc.id, DocumentStatus::Error)?;
            me.session.warning(format!("Could not read this document: {e}."));
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

async fn summarize(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let doc = load(&app, &me, id, Action::Edit)?;
    let Some(content) = document_text(&app, &me, &doc)? else {
        return Ok(render::redirect(&document_url(id)));
    };
    app.db()?.set_document_status(id, DocumentStatus::Processing)?;
    let gemini = app.gemini()?;
    match tasks::summarize(&gemini, &content).await {
        Ok(summary) => {
            app.db()?.set_document_summary(id, &summary)?;
            me.session.success("Document summarized.");
        }
        Err(e) => {
            warn!(document_id = id, error = %e, "summary failed");
            app.db()?.set_document_status(id, DocumentStatus::Error)?;
            me.session.error(format!("Could not summarize document: {e}"));
        }
    }
    Ok(render::redirect(&document_url(id)))
}

async fn segment(State(app): State<AppState>, me: CurrentUser, Path(id): Path<i64>) -> Result<Response, AppError> {
    let doc = load(&app, &me, id, Action::Edit)?;
    let Some(content) = document_text(&app, &me, &doc)? else {
        return Ok(render::redirect(&document_url(id)));
    };
    app.db()?.set_document_status(id, DocumentStatus::Processing)?;
    let gemini = app.gemini()?;
    match tasks::segment(&gemini, &content).await {
        Ok(result) => {
            app.db()?.set_document_segmentation(id, &result)?;
            me.session.success("Document segmented.");
        }
        Err(e) => {
            warn!(document_id = id, error = %e, "segmentation failed");
            app.db()?.set_document_status(id, DocumentStatus::Error)?;
            me.session.error(format!("Could not segment document: {e}"));
        }
    }
    Ok(render::redirect(&document_url(id)))
}
