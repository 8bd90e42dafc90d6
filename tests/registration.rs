mod common;

use common::*;
use serde_json::json;

fn params(body: &serde_json::Value) -> Vec<String> {
    body["errors"]
        .as_array()
        .expect("errors list")
        .iter()
        .map(|e| e["param"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn valid_registration_creates_the_user() {
    let t = test_app();
    let resp = t.app.handle(&post_json(
        "/register",
        registration("Ann Lee", "ann", "ann@example.com", "pw"),
        None,
    ));
    assert_eq!(status(&resp), 200);
    assert_eq!(body_json(&resp), json!({ "success": true }));

    let user = user_record(&t.app, "ann");
    assert_eq!(user.name, "Ann Lee");
    assert_eq!(user.email, "ann@example.com");
    assert_ne!(user.password, "pw", "password must not be stored in clear");
    assert!(user.password.starts_with("$argon2"));
    assert!(user.posts.is_empty() && user.followers.is_empty() && user.following.is_empty());
}

#[test]
fn every_violated_rule_is_reported_at_once() {
    let t = test_app();
    let resp = t.app.handle(&post_json(
        "/register",
        json!({
            "name": "",
            "email": "not-an-email",
            "username": "bad name!",
            "password": "",
            "password_confirmation": "different",
        }),
        None,
    ));
    let body = body_json(&resp);
    assert_eq!(
        params(&body),
        vec!["name", "email", "username", "password", "password_confirmation"]
    );
    assert!(pixbord::users::find_by_username(t.app.store(), "bad name!")
        .unwrap()
        .is_none());
}

#[test]
fn duplicate_username_and_email_are_both_reported() {
    let t = test_app();
    register(&t.app, "ann");

    let resp = t.app.handle(&post_json(
        "/register",
        registration("Other Ann", "ann", "ann@example.com", "pw"),
        None,
    ));
    let body = body_json(&resp);
    let errors = body["errors"].as_array().unwrap();
    assert_eq!(params(&body), vec!["username", "email"]);
    assert_eq!(errors[0]["msg"], "Username already taken.");

    let users = pixbord::users::list_users(t.app.store()).unwrap();
    assert_eq!(users.len(), 1);
}

#[test]
fn email_uniqueness_ignores_case() {
    let t = test_app();
    register(&t.app, "ann");
    let resp = t.app.handle(&post_json(
        "/register",
        registration("Ann", "ann2", "ANN@example.com", "pw"),
        None,
    ));
    assert_eq!(params(&body_json(&resp)), vec!["email"]);
}

#[test]
fn urlencoded_registration_is_accepted() {
    let t = test_app();
    let resp = t.app.handle(&post_form(
        "/register",
        "name=Bo+Diddley&email=bo%40example.com&username=bo&password=x&password_confirmation=x",
        None,
    ));
    assert_eq!(body_json(&resp), json!({ "success": true }));
    assert_eq!(user_record(&t.app, "bo").name, "Bo Diddley");
}

#[test]
fn markup_in_names_is_stripped() {
    let t = test_app();
    t.app.handle(&post_json(
        "/register",
        registration("<b>Eve</b><script>alert(1)</script>", "eve", "eve@example.com", "pw"),
        None,
    ));
    assert_eq!(user_record(&t.app, "eve").name, "Eve");
}

#[test]
fn names_made_only_of_markup_are_missing() {
    let t = test_app();
    let resp = t.app.handle(&post_json(
        "/register",
        registration("<script>alert(1)</script>", "mal", "mal@example.com", "pw"),
        None,
    ));
    assert_eq!(params(&body_json(&resp)), vec!["name"]);
}
