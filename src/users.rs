use chrono::Utc;
use spin_sdk::http::{Request, Response};
use tracing::{error, info, warn};

use crate::config::MAX_DESCRIPTION_LENGTH;
use crate::core::errors::{ApiError, ValidationErrors};
use crate::core::form::FormData;
use crate::core::helpers::{
    hash_password, html_response, is_alphanumeric, is_email, json_response, new_id, redirect,
    sanitize_text,
};
use crate::core::store::{
    email_key, user_key, username_key, KvStore, KvStoreExt, USERS_LIST_KEY,
};
use crate::core::upload::Upload;
use crate::handlers::Ctx;
use crate::models::models::{Post, User};
use crate::posts::load_posts;
use crate::templates;

pub struct Registration {
    pub name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub password_confirmation: String,
}

impl Registration {
    pub fn from_form(form: &FormData) -> Self {
        Self {
            name: sanitize_text(form.get("name")),
            email: form.get("email").trim().to_string(),
            username: form.get("username").trim().to_string(),
            password: form.get("password").to_string(),
            password_confirmation: form.get("password_confirmation").to_string(),
        }
    }
}

pub fn find_by_id(store: &dyn KvStore, id: &str) -> anyhow::Result<Option<User>> {
    store.get_json(&user_key(id))
}

pub fn find_by_username(store: &dyn KvStore, username: &str) -> anyhow::Result<Option<User>> {
    match store.get_json::<String>(&username_key(username))? {
        Some(id) => find_by_id(store, &id),
        None => Ok(None),
    }
}

pub fn find_by_email(store: &dyn KvStore, email: &str) -> anyhow::Result<Option<User>> {
    match store.get_json::<String>(&email_key(email))? {
        Some(id) => find_by_id(store, &id),
        None => Ok(None),
    }
}

pub fn save_user(store: &dyn KvStore, user: &User) -> anyhow::Result<()> {
    store.set_json(&user_key(&user.id), user)
}

/// Every failed rule is reported, not just the first.
pub fn validate_registration(
    store: &dyn KvStore,
    input: &Registration,
) -> anyhow::Result<ValidationErrors> {
    let mut errors = ValidationErrors::new();
    errors.check(!input.name.is_empty(), "name", "Name is a required field.");
    errors.check(is_email(&input.email), "email", "Invalid e-mail address.");
    errors.check(is_alphanumeric(&input.username), "username", "Invalid username.");
    errors.check(!input.password.is_empty(), "password", "Password is a required field.");
    errors.check(
        input.password == input.password_confirmation,
        "password_confirmation",
        "Passwords do not match.",
    );

    // Advisory only; the index claim in `create_account` decides.
    if !input.username.is_empty() && store.exists(&username_key(&input.username))? {
        errors.push("username", "Username already taken.");
    }
    if !input.email.is_empty() && store.exists(&email_key(&input.email))? {
        errors.push("email", "This e-mail address already has an account.");
    }
    Ok(errors)
}

/// Point `key` at `id` unless another record owns it. Reads back after the
/// write so a concurrent claimant that landed last is detected.
fn claim(store: &dyn KvStore, key: &str, id: &str) -> anyhow::Result<bool> {
    if let Some(owner) = store.get_json::<String>(key)? {
        if owner != id {
            return Ok(false);
        }
    }
    store.set_json(key, &id)?;
    Ok(store.get_json::<String>(key)?.as_deref() == Some(id))
}

fn release(store: &dyn KvStore, key: &str, id: &str) -> anyhow::Result<()> {
    if store.get_json::<String>(key)?.as_deref() == Some(id) {
        store.delete(key)?;
    }
    Ok(())
}

pub fn create_account(
    store: &dyn KvStore,
    input: &Registration,
) -> anyhow::Result<Result<User, ValidationErrors>> {
    let errors = validate_registration(store, input)?;
    if !errors.is_empty() {
        return Ok(Err(errors));
    }

    let user = User {
        id: new_id(),
        name: input.name.clone(),
        email: input.email.clone(),
        username: input.username.clone(),
        password: hash_password(&input.password)?,
        image: None,
        url: None,
        description: None,
        posts: Vec::new(),
        followers: Vec::new(),
        following: Vec::new(),
        created_at: Utc::now(),
    };

    match register_indexed(store, &user) {
        Ok(Ok(())) => Ok(Ok(user)),
        Ok(Err(errors)) => {
            discard_account(store, &user);
            Ok(Err(errors))
        }
        Err(e) => {
            error!(user_id = %user.id, "rolling back registration: {}", e);
            discard_account(store, &user);
            Err(e)
        }
    }
}

/// Claim both index keys, then write the user and append it to the listing.
fn register_indexed(
    store: &dyn KvStore,
    user: &User,
) -> anyhow::Result<Result<(), ValidationErrors>> {
    let mut errors = ValidationErrors::new();
    if !claim(store, &username_key(&user.username), &user.id)? {
        errors.push("username", "Username already taken.");
    }
    if !claim(store, &email_key(&user.email), &user.id)? {
        errors.push("email", "This e-mail address already has an account.");
    }
    if !errors.is_empty() {
        return Ok(Err(errors));
    }

    save_user(store, user)?;
    let mut users: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    users.push(user.id.clone());
    store.set_json(USERS_LIST_KEY, &users)?;
    Ok(Ok(()))
}

/// Undo a partial registration: drop the user record and any index key this
/// user still owns.
fn discard_account(store: &dyn KvStore, user: &User) {
    let steps = [
        release(store, &username_key(&user.username), &user.id),
        release(store, &email_key(&user.email), &user.id),
        store.delete(&user_key(&user.id)),
    ];
    for step in steps {
        if let Err(e) = step {
            warn!(user_id = %user.id, "cleanup after failed registration: {}", e);
        }
    }
}

pub fn register_page(ctx: &Ctx) -> anyhow::Result<Response> {
    let html = templates::render("register.html", "Register", ctx.user.as_ref(), &[])?;
    Ok(html_response(html))
}

pub fn create_user(ctx: &Ctx, req: &Request) -> anyhow::Result<Response> {
    let form = match FormData::from_request(req) {
        Ok(form) => form,
        Err(err) => return Ok(err.into()),
    };
    let input = Registration::from_form(&form);

    match create_account(ctx.store, &input)? {
        Ok(user) => {
            info!(user_id = %user.id, username = %user.username, "registered user");
            json_response(200, &serde_json::json!({ "success": true }))
        }
        Err(errors) => Ok(errors.into_response()),
    }
}

/// All users, newest first.
pub fn list_users(store: &dyn KvStore) -> anyhow::Result<Vec<User>> {
    let ids: Vec<String> = store.get_json(USERS_LIST_KEY)?.unwrap_or_default();
    let mut users = Vec::with_capacity(ids.len());
    for id in ids.iter().rev() {
        if let Some(user) = find_by_id(store, id)? {
            users.push(user);
        }
    }
    users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(users)
}

pub fn users_page(ctx: &Ctx) -> anyhow::Result<Response> {
    let rows: Vec<String> = list_users(ctx.store)?
        .iter()
        .map(templates::user_row)
        .collect();
    let html = templates::render(
        "users.html",
        "Profiles",
        ctx.user.as_ref(),
        &[("users", rows.join("\n"))],
    )?;
    Ok(html_response(html))
}

fn follow_button(viewer: &User, target: &User) -> String {
    if viewer.id == target.id {
        return format!(
            r#"<a class="button" href="/profile/{}/edit">Edit profile</a>"#,
            templates::attr(&target.username)
        );
    }
    let following = viewer.following.iter().any(|id| id == &target.id);
    let action = if following { "unfollow" } else { "follow" };
    format!(
        r#"<form class="js-form follow" method="post" action="/follow">
        <input type="hidden" name="follower" value="{}">
        <input type="hidden" name="following" value="{}">
        <input type="hidden" name="action" value="{action}">
        <button type="submit">{label}</button>
      </form>"#,
        templates::attr(&viewer.id),
        templates::attr(&target.id),
        action = action,
        label = if following { "Unfollow" } else { "Follow" },
    )
}

pub fn profile_page(ctx: &Ctx, username: &str) -> anyhow::Result<Response> {
    let user = match find_by_username(ctx.store, username)? {
        Some(user) => user,
        None => return Ok(ApiError::NotFound("User not found".to_string()).into()),
    };
    let posts: Vec<Post> = load_posts(ctx.store, &user.posts)?;

    let url = user
        .url
        .as_deref()
        .map(|u| {
            format!(
                r#"<a href="{}" rel="noopener noreferrer">{}</a>"#,
                templates::attr(u),
                templates::escape(u)
            )
        })
        .unwrap_or_default();
    let actions = ctx
        .user
        .as_ref()
        .map(|viewer| follow_button(viewer, &user))
        .unwrap_or_default();
    let thumbs: Vec<String> = posts.iter().map(templates::post_thumb).collect();

    let html = templates::render(
        "profile.html",
        &format!("{} | Profile", user.username),
        ctx.user.as_ref(),
        &[
            ("user_id", templates::attr(&user.id)),
            ("avatar", templates::avatar(&user)),
            ("name", templates::escape(&user.name)),
            ("username", templates::escape(&user.username)),
            ("description", templates::escape(user.description.as_deref().unwrap_or_default())),
            ("url", url),
            ("post_count", user.posts.len().to_string()),
            ("follower_count", user.followers.len().to_string()),
            ("following_count", user.following.len().to_string()),
            ("actions", actions),
            ("posts", thumbs.join("\n")),
        ],
    )?;
    Ok(html_response(html))
}

/// Signed-in owner of `username`, or the response that refuses the request.
fn owner_of<'a>(ctx: &'a Ctx, username: &str) -> anyhow::Result<Result<&'a User, Response>> {
    let viewer = match ctx.user.as_ref() {
        Some(viewer) => viewer,
        None => return Ok(Err(ApiError::Unauthorized.into())),
    };
    if find_by_username(ctx.store, username)?.is_none() {
        return Ok(Err(ApiError::NotFound("User not found".to_string()).into()));
    }
    if viewer.username != username {
        warn!(viewer = %viewer.username, target = %username, "rejected profile edit");
        return Ok(Err(ApiError::Forbidden.into()));
    }
    Ok(Ok(viewer))
}

pub fn edit_profile_page(ctx: &Ctx, username: &str) -> anyhow::Result<Response> {
    if ctx.user.is_none() {
        return Ok(redirect("/login"));
    }
    let user = match owner_of(ctx, username)? {
        Ok(user) => user,
        Err(resp) => return Ok(resp),
    };

    let html = templates::render(
        "edit.html",
        &format!("{} | Profile Update", user.username),
        ctx.user.as_ref(),
        &[
            ("username", templates::attr(&user.username)),
            ("url", templates::attr(user.url.as_deref().unwrap_or_default())),
            ("description", templates::escape(user.description.as_deref().unwrap_or_default())),
        ],
    )?;
    Ok(html_response(html))
}

fn is_web_url(value: &str) -> bool {
    (value.starts_with("http://") || value.starts_with("https://"))
        && value.len() > "https://".len()
        && !value.chars().any(char::is_whitespace)
}

pub fn update_profile(ctx: &Ctx, req: &Request, username: &str) -> anyhow::Result<Response> {
    let mut user = match owner_of(ctx, username)? {
        Ok(user) => user.clone(),
        Err(resp) => return Ok(resp),
    };

    let destination = ctx.config.profiles_upload_dir();
    let upload = Upload::new("image", &destination, ctx.config.max_upload_bytes);
    let uploaded = match upload.save(req) {
        Ok(uploaded) => uploaded,
        Err(err) => return Ok(err.into()),
    };

    let mut errors = ValidationErrors::new();
    let url = uploaded.body.get_opt("url").map(str::trim);
    if let Some(url) = url {
        errors.check(url.is_empty() || is_web_url(url), "url", "Invalid URL.");
    }
    let description = uploaded.body.get_opt("description").map(sanitize_text);
    if let Some(description) = &description {
        errors.check(
            description.len() <= MAX_DESCRIPTION_LENGTH,
            "description",
            "Description is too long.",
        );
    }
    if !errors.is_empty() {
        uploaded.discard();
        return Ok(errors.into_response());
    }

    if let Some(url) = url {
        user.url = (!url.is_empty()).then(|| url.to_string());
    }
    if let Some(description) = description {
        user.description = (!description.is_empty()).then_some(description);
    }
    let replaced = match &uploaded.file {
        Some(file) => user.image.replace(file.filename.clone()),
        None => None,
    };

    if let Err(e) = save_user(ctx.store, &user) {
        uploaded.discard();
        return Err(e);
    }
    if let Some(old) = replaced {
        let path = destination.join(old);
        if let Err(e) = std::fs::remove_file(&path) {
            warn!(path = %path.display(), "failed to remove old profile image: {}", e);
        }
    }

    info!(username = %user.username, "updated profile");
    json_response(
        200,
        &serde_json::json!({ "updated": true, "username": user.username }),
    )
}
