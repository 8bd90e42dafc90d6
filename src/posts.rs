use chrono::Utc;
use spin_sdk::http::{Request, Response};
use tracing::{error, info, warn};

use crate::comments::load_comments;
use crate::config::MAX_DESCRIPTION_LENGTH;
use crate::core::errors::{ApiError, ValidationErrors};
use crate::core::helpers::{html_response, json_response, new_id, redirect, sanitize_text, validate_uuid};
use crate::core::store::{post_key, user_key, KvStore, KvStoreExt, FEED_KEY};
use crate::core::upload::Upload;
use crate::handlers::Ctx;
use crate::models::models::{Post, User};
use crate::templates;
use crate::users::find_by_username;

pub fn find_post(store: &dyn KvStore, id: &str) -> anyhow::Result<Option<Post>> {
    if !validate_uuid(id) {
        return Ok(None);
    }
    store.get_json(&post_key(id))
}

/// Load the posts behind `ids`, newest first. Ids that no longer resolve are
/// skipped.
pub fn load_posts(store: &dyn KvStore, ids: &[String]) -> anyhow::Result<Vec<Post>> {
    let mut posts = Vec::with_capacity(ids.len());
    for id in ids.iter().rev() {
        if let Some(post) = store.get_json::<Post>(&post_key(id))? {
            posts.push(post);
        }
    }
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(posts)
}

/// Write a new post, then append it to its author's list and the global feed.
/// If either append fails the post is removed again, along with any link
/// already made.
pub fn insert_post(store: &dyn KvStore, author: &User, description: &str, image: &str) -> anyhow::Result<Post> {
    let post = Post {
        id: new_id(),
        description: description.to_string(),
        image: image.to_string(),
        user: author.username.clone(),
        comments: Vec::new(),
        created_at: Utc::now(),
    };
    let key = post_key(&post.id);
    store.set_json(&key, &post)?;

    if let Err(e) = link_post(store, &author.id, &post.id) {
        error!(post_id = %post.id, "rolling back post: {}", e);
        store.delete(&key)?;
        return Err(e);
    }
    Ok(post)
}

fn link_post(store: &dyn KvStore, author_id: &str, post_id: &str) -> anyhow::Result<()> {
    let mut owner: User = store
        .get_json(&user_key(author_id))?
        .ok_or_else(|| anyhow::anyhow!("author {} vanished", author_id))?;
    owner.posts.push(post_id.to_string());
    store.set_json(&user_key(author_id), &owner)?;

    let appended = (|| -> anyhow::Result<()> {
        let mut feed: Vec<String> = store.get_json(FEED_KEY)?.unwrap_or_default();
        feed.push(post_id.to_string());
        store.set_json(FEED_KEY, &feed)
    })();
    if appended.is_err() {
        if let Err(e) = unlink_post(store, author_id, post_id) {
            warn!(post_id = %post_id, "failed to unlink post from author: {}", e);
        }
    }
    appended
}

fn unlink_post(store: &dyn KvStore, author_id: &str, post_id: &str) -> anyhow::Result<()> {
    if let Some(mut owner) = store.get_json::<User>(&user_key(author_id))? {
        owner.posts.retain(|id| id != post_id);
        store.set_json(&user_key(author_id), &owner)?;
    }
    Ok(())
}

pub fn create_post_page(ctx: &Ctx) -> anyhow::Result<Response> {
    if ctx.user.is_none() {
        return Ok(redirect("/login"));
    }
    let html = templates::render("create.html", "New Post", ctx.user.as_ref(), &[])?;
    Ok(html_response(html))
}

pub fn create_post(ctx: &Ctx, req: &Request) -> anyhow::Result<Response> {
    let author = match ctx.user.as_ref() {
        Some(user) => user,
        None => return Ok(ApiError::Unauthorized.into()),
    };

    let destination = ctx.config.posts_upload_dir();
    let upload = Upload::new("image", &destination, ctx.config.max_upload_bytes);
    let uploaded = match upload.save(req) {
        Ok(uploaded) => uploaded,
        Err(err) => return Ok(err.into()),
    };

    let description = sanitize_text(uploaded.body.get("description"));
    let mut errors = ValidationErrors::new();
    errors.check(!description.is_empty(), "description", "Description is a required field.");
    errors.check(
        description.len() <= MAX_DESCRIPTION_LENGTH,
        "description",
        "Description is too long.",
    );
    errors.check(uploaded.file.is_some(), "image", "Image is a required field.");

    let file = match &uploaded.file {
        Some(file) if errors.is_empty() => file,
        _ => {
            uploaded.discard();
            return Ok(errors.into_response());
        }
    };

    let post = match insert_post(ctx.store, author, &description, &file.filename) {
        Ok(post) => post,
        Err(e) => {
            uploaded.discard();
            return Err(e);
        }
    };

    info!(post_id = %post.id, user = %post.user, "created post");
    json_response(200, &serde_json::json!({ "created": true, "postid": post.id }))
}

pub fn home_page(ctx: &Ctx) -> anyhow::Result<Response> {
    let feed: Vec<String> = ctx.store.get_json(FEED_KEY)?.unwrap_or_default();
    let posts = load_posts(ctx.store, &feed)?;

    let mut cards = Vec::with_capacity(posts.len());
    for post in &posts {
        let author = find_by_username(ctx.store, &post.user)?;
        cards.push(templates::post_card(post, author.as_ref()));
    }

    let html = templates::render(
        "index.html",
        "Home Page",
        ctx.user.as_ref(),
        &[("posts", cards.join("\n"))],
    )?;
    Ok(html_response(html))
}

fn comment_form(post: &Post) -> String {
    format!(
        r#"<form class="js-form" method="post" action="/posts/{}/comments/create">
      <input name="comment" placeholder="Add a comment" required>
      <button type="submit">Post</button>
    </form>"#,
        templates::attr(&post.id)
    )
}

pub fn post_page(ctx: &Ctx, id: &str) -> anyhow::Result<Response> {
    let post = match find_post(ctx.store, id)? {
        Some(post) => post,
        None => return Ok(ApiError::NotFound("Post not found".to_string()).into()),
    };
    let author = find_by_username(ctx.store, &post.user)?;
    let comments = load_comments(ctx.store, &post.comments)?;
    let items: Vec<String> = comments.iter().map(templates::comment_item).collect();

    let author_html = match &author {
        Some(user) => templates::user_link(user),
        None => format!("@{}", templates::escape(&post.user)),
    };
    let form = if ctx.user.is_some() {
        comment_form(&post)
    } else {
        r#"<p><a href="/login">Log in</a> to comment.</p>"#.to_string()
    };

    let html = templates::render(
        "post.html",
        &format!("{} | Post", post.user),
        ctx.user.as_ref(),
        &[
            ("post_id", templates::attr(&post.id)),
            ("author", author_html),
            ("date", post.created_at.format("%Y-%m-%d").to_string()),
            ("image", templates::attr(&post.image)),
            ("description", templates::escape(&post.description)),
            ("comment_form", form),
            ("comments", items.join("\n")),
        ],
    )?;
    Ok(html_response(html))
}
