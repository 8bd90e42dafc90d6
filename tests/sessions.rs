mod common;

use common::*;
use serde_json::json;

#[test]
fn login_returns_username_and_a_session_cookie() {
    let t = test_app();
    register(&t.app, "ann");

    let resp = t.app.handle(&post_json(
        "/login",
        json!({ "email": "ann@example.com", "password": "secret" }),
        None,
    ));
    assert_eq!(body_json(&resp), json!({ "success": true, "username": "ann" }));
    let cookie = header(&resp, "set-cookie").unwrap();
    assert!(cookie.starts_with("session="));
    assert!(cookie.contains("HttpOnly"));
}

#[test]
fn every_mismatch_gets_the_same_failure() {
    let t = test_app();
    register(&t.app, "ann");

    let attempts = [
        json!({ "email": "nobody@example.com", "password": "secret" }),
        json!({ "email": "ann@example.com", "password": "wrong" }),
        json!({ "email": "nobody@example.com", "password": "wrong" }),
        json!({}),
    ];
    for attempt in attempts {
        let resp = t.app.handle(&post_json("/login", attempt, None));
        assert_eq!(status(&resp), 200);
        assert_eq!(body_json(&resp), json!({ "success": false }));
        assert!(header(&resp, "set-cookie").is_none());
    }
}

#[test]
fn guarded_pages_redirect_anonymous_visitors() {
    let t = test_app();
    register(&t.app, "ann");

    for path in ["/posts/create", "/profile/ann/edit"] {
        let resp = t.app.handle(&get(path, None));
        assert_eq!(status(&resp), 303, "{}", path);
        assert_eq!(header(&resp, "location").as_deref(), Some("/login"));
    }
}

#[test]
fn forged_cookies_are_anonymous() {
    let t = test_app();
    let cookie = register_and_login(&t.app, "ann");
    let forged = format!("{}00", cookie);

    let resp = t.app.handle(&get("/posts/create", Some(&forged)));
    assert_eq!(status(&resp), 303);

    let resp = t.app.handle(&get("/posts/create", Some(&cookie)));
    assert_eq!(status(&resp), 200);
    assert!(body_text(&resp).contains("@ann"));

    let resp = t.app.handle(&get("/", Some("session=garbage")));
    assert_eq!(status(&resp), 200);
    assert!(body_text(&resp).contains(r#"href="/login""#));
}

#[test]
fn logout_clears_the_cookie() {
    let t = test_app();
    let cookie = register_and_login(&t.app, "ann");

    let resp = t.app.handle(&get("/logout", Some(&cookie)));
    assert_eq!(status(&resp), 303);
    assert_eq!(header(&resp, "location").as_deref(), Some("/login"));
    assert!(header(&resp, "set-cookie").unwrap().contains("Max-Age=0"));
}

#[test]
fn session_sees_profile_edits_without_relogin() {
    let t = test_app();
    let cookie = register_and_login(&t.app, "ann");

    let resp = t.app.handle(&post_multipart(
        "/profile/ann/edit",
        &[("description", "Fresh bio"), ("url", "https://ann.example.com")],
        None,
        Some(&cookie),
    ));
    assert_eq!(body_json(&resp), json!({ "updated": true, "username": "ann" }));

    let resp = t.app.handle(&get("/profile/ann/edit", Some(&cookie)));
    let html = body_text(&resp);
    assert!(html.contains("Fresh bio"));
    assert!(html.contains("https://ann.example.com"));
}
