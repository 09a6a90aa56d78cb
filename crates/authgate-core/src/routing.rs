//! Route guard: maps a session and a path to the view the router shows.

use serde::Serialize;

use crate::session::Session;

pub const ROOT_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const DASHBOARD_PATH: &str = "/dashboard";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum View {
    Login,
    Dashboard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "kind", content = "target", rename_all = "camelCase")]
pub enum Destination {
    /// The first auth check has not finished.
    Loading,
    Render(View),
    Redirect(&'static str),
}

/// Strip the query string, fragment and trailing slashes from a path.
fn normalize(path: &str) -> &str {
    let path = path.split(['?', '#']).next().unwrap_or("");
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        ROOT_PATH
    } else {
        trimmed
    }
}

pub fn guard(session: Session, path: &str) -> Destination {
    if !session.auth_checked {
        return Destination::Loading;
    }

    match (normalize(path), session.logged_in) {
        (ROOT_PATH | LOGIN_PATH, true) => Destination::Redirect(DASHBOARD_PATH),
        (ROOT_PATH | LOGIN_PATH, false) => Destination::Render(View::Login),
        (DASHBOARD_PATH, true) => Destination::Render(View::Dashboard),
        (DASHBOARD_PATH, false) => Destination::Redirect(LOGIN_PATH),
        _ => Destination::Redirect(ROOT_PATH),
    }
}
