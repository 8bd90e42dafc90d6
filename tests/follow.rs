mod common;

use common::*;
use serde_json::json;

fn follow_request(follower: &str, following: &str, action: &str, cookie: &str) -> spin_sdk::http::Request {
    post_json(
        "/follow",
        json!({ "follower": follower, "following": following, "action": action }),
        Some(cookie),
    )
}

#[test]
fn follow_then_unfollow_updates_both_sides() {
    let t = test_app();
    let ann_cookie = register_and_login(&t.app, "ann");
    register(&t.app, "bob");
    let ann = user_record(&t.app, "ann");
    let bob = user_record(&t.app, "bob");

    let resp = t.app.handle(&follow_request(&ann.id, &bob.id, "follow", &ann_cookie));
    assert_eq!(body_json(&resp), json!({ "done": true }));
    assert_eq!(user_record(&t.app, "ann").following, vec![bob.id.clone()]);
    assert_eq!(user_record(&t.app, "bob").followers, vec![ann.id.clone()]);

    let resp = t.app.handle(&follow_request(&ann.id, &bob.id, "unfollow", &ann_cookie));
    assert_eq!(body_json(&resp), json!({ "done": true }));
    assert!(user_record(&t.app, "ann").following.is_empty());
    assert!(user_record(&t.app, "bob").followers.is_empty());
}

#[test]
fn repeated_follows_do_not_duplicate_edges() {
    let t = test_app();
    let ann_cookie = register_and_login(&t.app, "ann");
    register(&t.app, "bob");
    let ann = user_record(&t.app, "ann");
    let bob = user_record(&t.app, "bob");

    for _ in 0..3 {
        t.app.handle(&follow_request(&ann.id, &bob.id, "follow", &ann_cookie));
    }
    assert_eq!(user_record(&t.app, "ann").following.len(), 1);
    assert_eq!(user_record(&t.app, "bob").followers.len(), 1);
}

#[test]
fn unknown_actions_are_a_successful_no_op() {
    let t = test_app();
    let ann_cookie = register_and_login(&t.app, "ann");
    register(&t.app, "bob");
    let ann = user_record(&t.app, "ann");
    let bob = user_record(&t.app, "bob");

    let resp = t.app.handle(&follow_request(&ann.id, &bob.id, "poke", &ann_cookie));
    assert_eq!(body_json(&resp), json!({ "done": true }));
    assert!(user_record(&t.app, "ann").following.is_empty());
}

#[test]
fn follows_are_made_only_by_the_signed_in_user() {
    let t = test_app();
    let ann_cookie = register_and_login(&t.app, "ann");
    register(&t.app, "bob");
    register(&t.app, "cat");
    let ann = user_record(&t.app, "ann");
    let bob = user_record(&t.app, "bob");
    let cat = user_record(&t.app, "cat");

    let resp = t.app.handle(&post_json(
        "/follow",
        json!({ "follower": bob.id, "following": ann.id, "action": "follow" }),
        None,
    ));
    assert_eq!(status(&resp), 401);

    let resp = t.app.handle(&follow_request(&bob.id, &cat.id, "follow", &ann_cookie));
    assert_eq!(status(&resp), 403);
    assert!(user_record(&t.app, "bob").following.is_empty());
}

#[test]
fn invalid_targets_are_rejected() {
    let t = test_app();
    let ann_cookie = register_and_login(&t.app, "ann");
    let ann = user_record(&t.app, "ann");

    let resp = t.app.handle(&follow_request(&ann.id, &ann.id, "follow", &ann_cookie));
    assert_eq!(status(&resp), 400);

    let resp = t.app.handle(&follow_request(&ann.id, "not-a-uuid", "follow", &ann_cookie));
    assert_eq!(status(&resp), 400);

    let ghost = uuid::Uuid::new_v4().to_string();
    let resp = t.app.handle(&follow_request(&ann.id, &ghost, "follow", &ann_cookie));
    assert_eq!(status(&resp), 404);
    assert!(user_record(&t.app, "ann").following.is_empty());
}
