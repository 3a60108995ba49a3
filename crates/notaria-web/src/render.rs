//! HTML rendering: the page shell, form widgets and small formatting helpers.
//!
//! Pages are assembled with `format!`; every value that came from a user or
//! the database goes through [`escape`].

use std::fmt::Display;

use axum::response::{Html, IntoResponse, Redirect, Response};
use chrono::{NaiveDate, NaiveDateTime};
use notaria_core::{FormData, User};

use crate::session::{CurrentUser, Flash};

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// 303 to `to`, so a POST is followed by a GET.
pub fn redirect(to: &str) -> Response {
    Redirect::to(to).into_response()
}

const STYLE: &str = "body{font-family:sans-serif;margin:0}nav{background:#233;padding:.6em}\
nav a{color:#fff;margin-right:1em}main{padding:1em 2em}table{border-collapse:collapse}\
td,th{border:1px solid #ccc;padding:.3em .6em}.flash{padding:.5em;margin:.3em 0}\
.success{background:#dfd}.info{background:#def}.warning{background:#ffd}.error{background:#fdd}\
label{display:block;margin-top:.6em}form.inline{display:inline}";

pub fn page(title: &str, user: Option<&User>, flashes: &[Flash], body: &str) -> Html<String> {
    let nav = match user {
        Some(u) => {
            let mut links = vec![
                ("/dashboard/", "Dashboard"),
                ("/clients/", "Clients"),
                ("/clients/leads/", "Leads"),
                ("/workflows/matters/", "Matters"),
                ("/compliance/", "Compliance"),
                ("/documents/", "Documents"),
            ];
            if u.is_privileged() {
                links.push(("/workflows/templates/", "Templates"));
                links.push(("/integrations/", "Integrations"));
            }
            let links: String = links
                .into_iter()
                .map(|(href, text)| format!("<a href=\"{href}\">{text}</a>"))
                .collect();
            format!(
                "{links}<form class=\"inline\" method=\"post\" action=\"/accounts/logout/\">\
                 <button>Log out {}</button></form>",
                escape(&u.username)
            )
        }
        None => "<a href=\"/accounts/login/\">Log in</a><a href=\"/accounts/register/\">Register</a>".into(),
    };
    let flashes: String = flashes
        .iter()
        .map(|f| format!("<div class=\"flash {}\">{}</div>", f.level.css_class(), escape(&f.text)))
        .collect();
    Html(format!(
        "<!DOCTYPE html><html><head><meta charset=\"utf-8\"><title>{title} | Notaria</title>\
         <style>{STYLE}</style></head><body><nav>{nav}</nav><main>{flashes}<h1>{title}</h1>{body}</main></body></html>",
        title = escape(title),
    ))
}

impl CurrentUser {
    /// Render a page for this user, draining pending flash messages.
    pub fn render(&self, title: &str, body: &str) -> Response {
        let flashes = self.session.take_flashes();
        page(title, Some(&self.user), &flashes, body).into_response()
    }
}

// ── Values ──

pub fn text<T: Display>(value: Option<T>) -> String {
    value.map(|v| escape(&v.to_string())).unwrap_or_else(|| "-".into())
}

pub fn date(value: Option<NaiveDate>) -> String {
    value.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_else(|| "-".into())
}

pub fn timestamp(value: Option<NaiveDateTime>) -> String {
    value
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".into())
}

pub fn link(href: &str, label: &str) -> String {
    format!("<a href=\"{}\">{}</a>", escape(href), escape(label))
}

/// A POST-only action rendered as a button.
pub fn action(href: &str, label: &str) -> String {
    format!(
        "<form class=\"inline\" method=\"post\" action=\"{}\"><button>{}</button></form>",
        escape(href),
        escape(label)
    )
}

/// Cells are HTML already.
pub fn table(headers: &[&str], rows: Vec<Vec<String>>, empty: &str) -> String {
    if rows.is_empty() {
        return format!("<p>{}</p>", escape(empty));
    }
    let head: String = headers.iter().map(|h| format!("<th>{}</th>", escape(h))).collect();
    let body: String = rows
        .into_iter()
        .map(|cells| format!("<tr>{}</tr>", cells.into_iter().map(|c| format!("<td>{c}</td>")).collect::<String>()))
        .collect();
    format!("<table><thead><tr>{head}</tr></thead><tbody>{body}</tbody></table>")
}

pub fn definition_list(items: &[(&str, String)]) -> String {
    let rows: String = items
        .iter()
        .map(|(k, v)| format!("<dt>{}</dt><dd>{v}</dd>", escape(k)))
        .collect();
    format!("<dl>{rows}</dl>")
}

// ── Form widgets ──
//
// Widgets read their current value from a FormData, which is either the
// submitted form (re-rendered after a validation error) or built from the
// record being edited.

pub fn form(action: &str, fields: &str, submit: &str) -> String {
    format!(
        "<form method=\"post\" action=\"{}\">{fields}<p><button type=\"submit\">{}</button></p></form>",
        escape(action),
        escape(submit)
    )
}

pub fn multipart_form(action: &str, fields: &str, submit: &str) -> String {
    format!(
        "<form method=\"post\" enctype=\"multipart/form-data\" action=\"{}\">{fields}\
         <p><button type=\"submit\">{}</button></p></form>",
        escape(action),
        escape(submit)
    )
}

pub fn input(values: &FormData, name: &str, label: &str, kind: &str) -> String {
    let value = if kind == "password" { "" } else { values.raw(name).unwrap_or_default() };
    format!(
        "<label for=\"{name}\">{}</label><input type=\"{kind}\" id=\"{name}\" name=\"{name}\" value=\"{}\">",
        escape(label),
        escape(value)
    )
}

pub fn textarea(values: &FormData, name: &str, label: &str) -> String {
    format!(
        "<label for=\"{name}\">{}</label><textarea id=\"{name}\" name=\"{name}\" rows=\"4\" cols=\"60\">{}</textarea>",
        escape(label),
        escape(values.raw(name).unwrap_or_default())
    )
}

pub fn checkbox(values: &FormData, name: &str, label: &str) -> String {
    let checked = if values.flag(name) { " checked" } else { "" };
    format!(
        "<label><input type=\"checkbox\" name=\"{name}\" value=\"on\"{checked}> {}</label>",
        escape(label)
    )
}

/// Single select. `options` are `(value, label)`; a blank option is added
/// when `blank` is set.
pub fn select(values: &FormData, name: &str, label: &str, options: &[(String, String)], blank: bool) -> String {
    let current = values.raw(name).unwrap_or_default();
    let mut opts = String::new();
    if blank {
        opts.push_str("<option value=\"\">---------</option>");
    }
    for (value, text) in options {
        let selected = if value == current { " selected" } else { "" };
        opts.push_str(&format!(
            "<option value=\"{}\"{selected}>{}</option>",
            escape(value),
            escape(text)
        ));
    }
    format!(
        "<label for=\"{name}\">{}</label><select id=\"{name}\" name=\"{name}\">{opts}</select>",
        escape(label)
    )
}

pub fn multi_select(values: &FormData, name: &str, label: &str, options: &[(String, String)]) -> String {
    let current = values.all(name);
    let opts: String = options
        .iter()
        .map(|(value, text)| {
            let selected = if current.contains(&value.as_str()) { " selected" } else { "" };
            format!("<option value=\"{}\"{selected}>{}</option>", escape(value), escape(text))
        })
        .collect();
    format!(
        "<label for=\"{name}\">{}</label><select id=\"{name}\" name=\"{name}\" multiple size=\"5\">{opts}</select>",
        escape(label)
    )
}

/// `(value, label)` pairs for a string enum.
pub fn choices<T: Copy>(all: &[T], value: fn(&T) -> &'static str, label: fn(&T) -> &'static str) -> Vec<(String, String)> {
    all.iter().map(|v| (value(v).to_string(), label(v).to_string())).collect()
}
