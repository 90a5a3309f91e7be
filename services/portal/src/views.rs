//! HTML pages
//!
//! Rendering is pure: every page is a function of its inputs.

use rolegate_auth_core::AuthError;
use rolegate_types::{Principal, RoleSet};

use crate::gate::{GateDecision, View};

const TITLE: &str = "Azure Authenticated App";

/// Escape text for HTML element and attribute content
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
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

fn layout(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{TITLE}</title>\n</head>\n<body>\n<main>\n{body}\n</main>\n</body>\n</html>\n"
    )
}

fn logout_form() -> &'static str {
    "<form method=\"post\" action=\"/auth/logout\"><button type=\"submit\">Log out</button></form>"
}

fn refresh_form() -> &'static str {
    "<form method=\"post\" action=\"/roles/refresh\"><button type=\"submit\">Refresh Roles</button></form>"
}

/// Signed-out landing page
pub fn login_page() -> String {
    layout(
        "<h2>Please log in.</h2>\n\
         <a class=\"button\" href=\"/auth/login\">Login with Microsoft</a>",
    )
}

/// Shown when a sign-in attempt fails
pub fn login_error_page(error: &AuthError) -> String {
    layout(&format!(
        "<h2>Sign-in failed</h2>\n<p class=\"error\">{}</p>\n\
         <a class=\"button\" href=\"/auth/login\">Try again</a>",
        escape(&error.user_message())
    ))
}

fn view_content(view: View) -> &'static str {
    match view {
        View::Admin => {
            "<div class=\"success\">Admin Panel Access</div>\n\
             <p>You have administrator privileges!</p>"
        }
        View::Member => {
            "<div class=\"info\">Member Access</div>\n\
             <p>You have member access!</p>"
        }
        View::Limited => {
            "<div class=\"warning\">No specific role assigned</div>\n\
             <p>You have limited access to this application.</p>\n\
             <p>Please contact your administrator for role assignment.</p>"
        }
    }
}

/// Signed-in page for a gate decision
pub fn content_page(principal: &Principal, roles: &RoleSet, decision: GateDecision, refreshed: bool) -> String {
    let notice = if refreshed {
        "<div class=\"success\">Cache cleared! Fetching fresh roles...</div>\n"
    } else {
        ""
    };

    let body = match decision {
        GateDecision::Denied => format!(
            "{notice}<div class=\"warning\">You do not have any assigned roles. \
             Please contact your administrator.</div>\n{}\n{}",
            refresh_form(),
            logout_form()
        ),
        GateDecision::Granted(view) => format!(
            "<h1>Welcome, {}!</h1>\n{notice}{}\n<p class=\"roles\">Roles: {}</p>\n\
             <div class=\"actions\">\n{}\n{}\n</div>",
            escape(principal.greeting_name()),
            view_content(view),
            escape(&roles.as_slice().join(", ")),
            logout_form(),
            refresh_form()
        ),
    };
    layout(&body)
}
