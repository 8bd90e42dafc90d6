//! Page rendering from embedded templates.
//!
//! Templates carry `{{name}}` placeholders. Substitution is a single pass, so
//! text inserted for one placeholder is never scanned for another.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::{Captures, Regex};
use rust_embed::RustEmbed;

use crate::models::models::{Comment, Post, User};

#[derive(RustEmbed)]
#[folder = "static"]
struct Assets;

fn placeholder_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("Regex should compile"))
}

fn load(name: &str) -> anyhow::Result<String> {
    let file = Assets::get(name).ok_or_else(|| anyhow::anyhow!("Template {} not found", name))?;
    Ok(String::from_utf8(file.data.to_vec())?)
}

fn fill(template: &str, vars: &HashMap<&str, String>) -> String {
    placeholder_regex()
        .replace_all(template, |caps: &Captures| {
            vars.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Render `template` inside the layout. Values in `vars` are inserted as-is;
/// callers escape or build them with the helpers below.
pub fn render(
    template: &str,
    title: &str,
    viewer: Option<&User>,
    vars: &[(&str, String)],
) -> anyhow::Result<String> {
    let vars: HashMap<&str, String> = vars.iter().cloned().collect();
    let body = fill(&load(template)?, &vars);

    let layout_vars = HashMap::from([
        ("title", escape(title)),
        ("nav", nav(viewer)),
        ("body", body),
    ]);
    Ok(fill(&load("layout.html")?, &layout_vars))
}

pub fn escape(text: &str) -> String {
    html_escape::encode_text(text).to_string()
}

pub fn attr(text: &str) -> String {
    html_escape::encode_double_quoted_attribute(text).to_string()
}

fn nav(viewer: Option<&User>) -> String {
    match viewer {
        Some(user) => format!(
            r#"<a href="/posts/create">New post</a>
    <a href="/profile/{u}">@{u}</a>
    <a href="/logout">Log out</a>"#,
            u = attr(&user.username)
        ),
        None => r#"<a href="/login">Log in</a>
    <a href="/register">Register</a>"#
            .to_string(),
    }
}

pub fn avatar(user: &User) -> String {
    match &user.image {
        Some(image) => format!(
            r#"<img class="avatar" src="/images/profiles/{}" alt="">"#,
            attr(image)
        ),
        None => r#"<span class="avatar avatar-empty"></span>"#.to_string(),
    }
}

pub fn user_link(user: &User) -> String {
    format!(
        r#"<a class="user" href="/profile/{u}">{avatar}@{u}</a>"#,
        u = attr(&user.username),
        avatar = avatar(user)
    )
}

/// Feed card. `author` is absent when the post's author record is gone.
pub fn post_card(post: &Post, author: Option<&User>) -> String {
    let author = match author {
        Some(user) => user_link(user),
        None => format!("@{}", escape(&post.user)),
    };
    format!(
        r#"<article class="card">
  <header>{author} <time>{date}</time></header>
  <a href="/posts/{id}"><img src="/images/posts/{image}" alt=""></a>
  <p>{description}</p>
</article>"#,
        author = author,
        date = post.created_at.format("%Y-%m-%d"),
        id = attr(&post.id),
        image = attr(&post.image),
        description = escape(&post.description),
    )
}

pub fn post_thumb(post: &Post) -> String {
    format!(
        r#"<a class="thumb" href="/posts/{}"><img src="/images/posts/{}" alt=""></a>"#,
        attr(&post.id),
        attr(&post.image)
    )
}

pub fn comment_item(comment: &Comment) -> String {
    format!(
        r#"<li><a href="/profile/{u}">@{u}</a> {text} <time>{date}</time></li>"#,
        u = attr(&comment.user),
        text = escape(&comment.description),
        date = comment.created_at.format("%Y-%m-%d %H:%M"),
    )
}

pub fn user_row(user: &User) -> String {
    let summary = user.summary();
    format!(
        r#"<li>{link} {name} <span>{posts} posts · {followers} followers · {following} following</span></li>"#,
        link = user_link(user),
        name = escape(&summary.name),
        posts = summary.posts,
        followers = summary.followers,
        following = summary.following,
    )
}
