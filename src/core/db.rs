use tracing::info;

use crate::core::store::KvStore;
use crate::follow::follow_user;
use crate::models::models::User;
use crate::posts::insert_post;
use crate::users::{create_account, find_by_username, Registration};

const DEMO_USERS: &[(&str, &str, &str)] = &[
    ("Test User", "test", "test@example.com"),
    ("Alice", "alice", "alice@example.com"),
    ("Bob", "bob", "bob@example.com"),
];

fn ensure_user(store: &dyn KvStore, name: &str, username: &str, email: &str) -> anyhow::Result<(User, bool)> {
    if let Some(user) = find_by_username(store, username)? {
        return Ok((user, false));
    }
    let input = Registration {
        name: name.to_string(),
        email: email.to_string(),
        username: username.to_string(),
        password: username.to_string(),
        password_confirmation: username.to_string(),
    };
    match create_account(store, &input)? {
        Ok(user) => Ok((user, true)),
        Err(errors) => Err(anyhow::anyhow!(
            "seeding {} failed: {:?}",
            username,
            errors.into_vec()
        )),
    }
}

/// Create the demo accounts (password = username), one post each for new
/// accounts, and a test → bob follow. Safe to run repeatedly.
pub fn seed_demo_data(store: &dyn KvStore) -> anyhow::Result<()> {
    let mut users = Vec::with_capacity(DEMO_USERS.len());
    for (name, username, email) in DEMO_USERS {
        let (user, created) = ensure_user(store, name, username, email)?;
        if created {
            insert_post(
                store,
                &user,
                &format!("Hello from {}!", user.name),
                "demo.jpg",
            )?;
            info!(username = %user.username, "seeded demo user");
        }
        users.push(user);
    }

    let test = &users[0];
    let bob = &users[2];
    follow_user(store, &test.id, &bob.id)?;
    Ok(())
}
