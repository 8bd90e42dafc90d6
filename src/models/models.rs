use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub posts: Vec<String>,
    #[serde(default)]
    pub followers: Vec<String>,
    #[serde(default)]
    pub following: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Public projection used by JSON responses and page fragments.
    pub fn summary(&self) -> UserSummary {
        UserSummary {
            name: self.name.clone(),
            username: self.username.clone(),
            image: self.image.clone(),
            url: self.url.clone(),
            description: self.description.clone(),
            posts: self.posts.len(),
            followers: self.followers.len(),
            following: self.following.len(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UserSummary {
    pub name: String,
    pub username: String,
    pub image: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub posts: usize,
    pub followers: usize,
    pub following: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Post {
    pub id: String,
    pub description: String,
    pub image: String,
    /// Author username.
    pub user: String,
    #[serde(default)]
    pub comments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Comment {
    pub id: String,
    pub description: String,
    /// Author username.
    pub user: String,
    pub created_at: DateTime<Utc>,
}

/// Payload carried inside the signed session cookie.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SessionData {
    pub user_id: String,
    pub issued_at: DateTime<Utc>,
}

/// A single field-scoped validation failure.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FieldError {
    pub param: String,
    pub msg: String,
}

impl FieldError {
    pub fn new(param: &str, msg: &str) -> Self {
        Self {
            param: param.to_string(),
            msg: msg.to_string(),
        }
    }
}
