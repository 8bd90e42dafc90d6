use spin_sdk::http::{Method, Request, Response};
use tracing::{debug, error};

use crate::auth::{current_user, login_page, login_user, logout_user};
use crate::comments::create_comment;
use crate::config::Config;
use crate::core::errors::ApiError;
use crate::core::store::KvStore;
use crate::follow::handle_follow;
use crate::models::models::User;
use crate::posts::{create_post, create_post_page, home_page, post_page};
use crate::users::{
    create_user, edit_profile_page, profile_page, register_page, update_profile, users_page,
};

/// Everything a handler may touch for one request.
pub struct Ctx<'a> {
    pub store: &'a dyn KvStore,
    pub config: &'a Config,
    /// Live record of the signed-in user, if any.
    pub user: Option<User>,
}

fn method_name(method: &Method) -> &'static str {
    match method {
        Method::Get => "GET",
        Method::Post => "POST",
        Method::Put => "PUT",
        Method::Delete => "DELETE",
        Method::Head => "HEAD",
        Method::Patch => "PATCH",
        Method::Options => "OPTIONS",
        _ => "OTHER",
    }
}

pub fn route(store: &dyn KvStore, config: &Config, req: &Request) -> Response {
    let method = method_name(req.method());
    let path = req.path().to_string();
    let ctx = Ctx {
        store,
        config,
        user: current_user(store, config, req),
    };
    debug!(%method, %path, signed_in = ctx.user.is_some(), "request");

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let result = match (method, segments.as_slice()) {
        ("GET", []) => home_page(&ctx),
        ("GET", ["register"]) => register_page(&ctx),
        ("GET", ["login"]) => login_page(&ctx),
        ("GET", ["logout"]) => logout_user(&ctx),
        ("GET", ["users"]) => users_page(&ctx),
        ("GET", ["posts", "create"]) => create_post_page(&ctx),
        ("GET", ["posts", id]) => post_page(&ctx, id),
        ("GET", ["profile", username]) => profile_page(&ctx, username),
        ("GET", ["profile", username, "edit"]) => edit_profile_page(&ctx, username),
        ("POST", ["register"]) => create_user(&ctx, req),
        ("POST", ["login"]) => login_user(&ctx, req),
        ("POST", ["follow"]) => handle_follow(&ctx, req),
        ("POST", ["posts", "create"]) => create_post(&ctx, req),
        ("POST", ["posts", id, "comments", "create"]) => create_comment(&ctx, req, id),
        ("POST", ["profile", username, "edit"]) => update_profile(&ctx, req, username),
        _ => Ok(ApiError::NotFound("No route found".to_string()).into()),
    };

    match result {
        Ok(resp) => resp,
        Err(e) => {
            error!(%method, %path, "request failed: {:#}", e);
            ApiError::InternalError(e.to_string()).into()
        }
    }
}
