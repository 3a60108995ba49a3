use axum::Router;
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use notaria_store::Scope;

use crate::render::{self, escape, link};
use crate::session::CurrentUser;
use crate::{AppError, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/dashboard/", get(dashboard))
}

async fn home() -> Response {
    render::redirect("/dashboard/")
}

async fn dashboard(State(app): State<AppState>, me: CurrentUser) -> Result<Response, AppError> {
    let counts = app.db()?.dashboard_counts(Scope::for_user(&me.user))?;
    let tiles = [
        ("Clients", counts.clients, "/clients/"),
        ("Matters", counts.matters, "/workflows/matters/"),
        ("Open compliance checks", counts.open_checks, "/compliance/"),
        ("Documents", counts.documents, "/documents/"),
    ];
    let items: String = tiles
        .iter()
        .map(|(label, n, href)| format!("<li>{}: <strong>{n}</strong></li>", link(href, label)))
        .collect();
    let body = format!(
        "<p>Welcome, {} ({})</p><ul>{items}</ul>",
        escape(&me.user.username),
        me.user.role.label()
    );
    Ok(me.render("Dashboard", &body))
}

#[cfg(test)]
mod tests {
    use crate::testing::TestApp;
    use notaria_core::{ClientInput, Role};

    #[tokio::test]
    async fn root_redirects_and_counts_are_scoped() {
        let app = TestApp::spawn().await;
        let ann = app.user("ann", Role::Notary);
        let bob = app.user("bob", Role::Notary);
        {
            let store = app.state.db().unwrap();
            store.create_client(&ClientInput::default(), Some(ann.id)).unwrap();
            store.create_client(&ClientInput::default(), Some(ann.id)).unwrap();
            store.create_client(&ClientInput::default(), Some(bob.id)).unwrap();
        }
        let browser = app.login("ann").await;
        let resp = browser.get("/").await;
        assert_eq!(TestApp::location(&resp), "/dashboard/");
        let page = browser.page("/dashboard/").await;
        assert!(page.contains("Clients</a>: <strong>2</strong>"));

        app.admin("root");
        let page = app.login("root").await.page("/dashboard/").await;
        assert!(page.contains("Clients</a>: <strong>3</strong>"));
    }
}
