use spin_sdk::http::{Request, Response};
use tracing::{error, info, warn};

use crate::core::errors::ApiError;
use crate::core::form::FormData;
use crate::core::helpers::{json_response, validate_uuid};
use crate::core::store::{user_key, KvStore, KvStoreExt};
use crate::handlers::Ctx;
use crate::models::models::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowAction {
    Follow,
    Unfollow,
}

impl FollowAction {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "follow" => Some(FollowAction::Follow),
            "unfollow" => Some(FollowAction::Unfollow),
            _ => None,
        }
    }
}

fn load(store: &dyn KvStore, id: &str) -> anyhow::Result<User> {
    store
        .get_json(&user_key(id))?
        .ok_or_else(|| anyhow::anyhow!("user {} not found", id))
}

/// Add the edge on both sides. Repeating a follow leaves both sets unchanged.
pub fn follow_user(store: &dyn KvStore, follower_id: &str, following_id: &str) -> anyhow::Result<()> {
    let mut follower = load(store, follower_id)?;
    let mut following = load(store, following_id)?;

    if !follower.following.iter().any(|id| id == following_id) {
        follower.following.push(following_id.to_string());
        store.set_json(&user_key(follower_id), &follower)?;
    }
    if !following.followers.iter().any(|id| id == follower_id) {
        following.followers.push(follower_id.to_string());
        store.set_json(&user_key(following_id), &following)?;
    }
    Ok(())
}

pub fn unfollow_user(store: &dyn KvStore, follower_id: &str, following_id: &str) -> anyhow::Result<()> {
    let mut follower = load(store, follower_id)?;
    let mut following = load(store, following_id)?;

    follower.following.retain(|id| id != following_id);
    following.followers.retain(|id| id != follower_id);
    store.set_json(&user_key(follower_id), &follower)?;
    store.set_json(&user_key(following_id), &following)?;
    Ok(())
}

pub fn handle_follow(ctx: &Ctx, req: &Request) -> anyhow::Result<Response> {
    let viewer = match ctx.user.as_ref() {
        Some(user) => user,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let form = match FormData::from_request(req) {
        Ok(form) => form,
        Err(err) => return Ok(err.into()),
    };
    let follower_id = form.get("follower");
    let following_id = form.get("following");

    if follower_id != viewer.id {
        warn!(viewer = %viewer.id, follower = %follower_id, "rejected follow on behalf of another user");
        return Ok(ApiError::Forbidden.into());
    }
    if !validate_uuid(following_id) || following_id == follower_id {
        return Ok(ApiError::BadRequest("Invalid target user".to_string()).into());
    }

    let action = match FollowAction::parse(form.get("action")) {
        Some(action) => action,
        None => return json_response(200, &serde_json::json!({ "done": true })),
    };

    match ctx.store.exists(&user_key(following_id)) {
        Ok(true) => {}
        Ok(false) => return Ok(ApiError::NotFound("Target user not found".to_string()).into()),
        Err(e) => {
            error!("follow lookup failed: {}", e);
            return json_response(200, &serde_json::json!({ "done": false }));
        }
    }

    let result = match action {
        FollowAction::Follow => follow_user(ctx.store, follower_id, following_id),
        FollowAction::Unfollow => unfollow_user(ctx.store, follower_id, following_id),
    };
    match result {
        Ok(()) => {
            info!(follower = %follower_id, following = %following_id, ?action, "updated follow edge");
            json_response(200, &serde_json::json!({ "done": true }))
        }
        Err(e) => {
            error!("follow update failed: {}", e);
            json_response(200, &serde_json::json!({ "done": false }))
        }
    }
}
