use chrono::Utc;
use spin_sdk::http::{Request, Response};
use tracing::{error, info};

use crate::config::MAX_COMMENT_LENGTH;
use crate::core::errors::{ApiError, ValidationErrors};
use crate::core::form::FormData;
use crate::core::helpers::{json_response, new_id, sanitize_text};
use crate::core::store::{comment_key, post_key, KvStore, KvStoreExt};
use crate::handlers::Ctx;
use crate::models::models::{Comment, Post, User};
use crate::posts::find_post;

/// Comments behind `ids`, newest first.
pub fn load_comments(store: &dyn KvStore, ids: &[String]) -> anyhow::Result<Vec<Comment>> {
    let mut comments = Vec::with_capacity(ids.len());
    for id in ids.iter().rev() {
        if let Some(comment) = store.get_json::<Comment>(&comment_key(id))? {
            comments.push(comment);
        }
    }
    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(comments)
}

/// Write the comment, then append its id to the post. The comment is removed
/// again if the post update fails.
pub fn insert_comment(
    store: &dyn KvStore,
    post: &Post,
    author: &User,
    text: &str,
) -> anyhow::Result<Comment> {
    let comment = Comment {
        id: new_id(),
        description: text.to_string(),
        user: author.username.clone(),
        created_at: Utc::now(),
    };
    let key = comment_key(&comment.id);
    store.set_json(&key, &comment)?;

    let linked = (|| -> anyhow::Result<()> {
        let mut target: Post = store
            .get_json(&post_key(&post.id))?
            .ok_or_else(|| anyhow::anyhow!("post {} vanished", post.id))?;
        target.comments.push(comment.id.clone());
        store.set_json(&post_key(&target.id), &target)
    })();
    if let Err(e) = linked {
        error!(comment_id = %comment.id, "rolling back comment: {}", e);
        store.delete(&key)?;
        return Err(e);
    }

    Ok(comment)
}

pub fn create_comment(ctx: &Ctx, req: &Request, post_id: &str) -> anyhow::Result<Response> {
    let author = match ctx.user.as_ref() {
        Some(user) => user,
        None => return Ok(ApiError::Unauthorized.into()),
    };
    let post = match find_post(ctx.store, post_id)? {
        Some(post) => post,
        None => return Ok(ApiError::NotFound("Post not found".to_string()).into()),
    };

    let form = match FormData::from_request(req) {
        Ok(form) => form,
        Err(err) => return Ok(err.into()),
    };
    let text = sanitize_text(form.get("comment"));
    let mut errors = ValidationErrors::new();
    errors.check(!text.is_empty(), "comment", "Comment is a required field.");
    errors.check(text.len() <= MAX_COMMENT_LENGTH, "comment", "Comment is too long.");
    if !errors.is_empty() {
        return Ok(errors.into_response());
    }

    let comment = insert_comment(ctx.store, &post, author, &text)?;
    info!(comment_id = %comment.id, post_id = %post.id, "created comment");
    json_response(200, &serde_json::json!({ "created": true, "postid": post.id }))
}
