use spin_sdk::http::{Request, Response};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::core::form::{cookie_value, FormData};
use crate::core::helpers::{html_response, verify_password};
use crate::core::session;
use crate::core::store::KvStore;
use crate::handlers::Ctx;
use crate::models::models::User;
use crate::templates;
use crate::users::{find_by_email, find_by_id};

/// The signed-in user, loaded fresh from the store. A missing, forged or
/// expired cookie, or one naming a deleted user, reads as anonymous.
pub fn current_user(store: &dyn KvStore, config: &Config, req: &Request) -> Option<User> {
    let cookie = cookie_value(req, &config.session_name)?;
    let data = match session::decode(config, &cookie) {
        Some(data) => data,
        None => {
            warn!("ignoring invalid session cookie");
            return None;
        }
    };
    match find_by_id(store, &data.user_id) {
        Ok(user) => user,
        Err(e) => {
            error!(user_id = %data.user_id, "session lookup failed: {}", e);
            None
        }
    }
}

fn login_failed() -> anyhow::Result<Response> {
    Ok(Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .body(serde_json::to_vec(&serde_json::json!({ "success": false }))?)
        .build())
}

pub fn login_page(ctx: &Ctx) -> anyhow::Result<Response> {
    let html = templates::render("login.html", "Login", ctx.user.as_ref(), &[])?;
    Ok(html_response(html))
}

pub fn login_user(ctx: &Ctx, req: &Request) -> anyhow::Result<Response> {
    let form = match FormData::from_request(req) {
        Ok(form) => form,
        Err(err) => return Ok(err.into()),
    };
    let email = form.get("email").trim();
    let password = form.get("password");

    let user = match find_by_email(ctx.store, email) {
        Ok(Some(user)) => user,
        Ok(None) => return login_failed(),
        Err(e) => {
            error!("login lookup failed: {}", e);
            return login_failed();
        }
    };
    if !verify_password(password, &user.password) {
        return login_failed();
    }

    let cookie = session::establish_cookie(ctx.config, &user.id)?;
    info!(user_id = %user.id, "logged in");
    Ok(Response::builder()
        .status(200)
        .header("content-type", "application/json")
        .header("set-cookie", cookie)
        .body(serde_json::to_vec(&serde_json::json!({
            "success": true,
            "username": user.username
        }))?)
        .build())
}

pub fn logout_user(ctx: &Ctx) -> anyhow::Result<Response> {
    if let Some(user) = &ctx.user {
        info!(user_id = %user.id, "logged out");
    }
    Ok(Response::builder()
        .status(303)
        .header("location", "/login")
        .header("set-cookie", session::clear_cookie(ctx.config))
        .body(Vec::new())
        .build())
}
