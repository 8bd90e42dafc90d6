#![allow(dead_code)]

use std::collections::BTreeSet;
use std::sync::Mutex;

use pixbord::{App, Config, KvStore, MemoryStore};
use serde_json::{json, Value};
use spin_sdk::http::{Method, Request, Response};
use tempfile::TempDir;

pub const BOUNDARY: &str = "pixbordTESTboundary";

pub struct TestApp<S: KvStore = MemoryStore> {
    pub app: App<S>,
    pub uploads: TempDir,
}

fn build_app<S: KvStore>(store: S) -> TestApp<S> {
    let uploads = tempfile::tempdir().expect("tempdir");
    let config = Config {
        session_keys: vec!["test-signing-key".to_string()],
        upload_dir: uploads.path().to_path_buf(),
        ..Config::default()
    };
    TestApp {
        app: App::new(store, config),
        uploads,
    }
}

pub fn test_app() -> TestApp {
    build_app(MemoryStore::new())
}

pub fn faulty_app() -> TestApp<FaultyStore> {
    build_app(FaultyStore::default())
}

/// Memory store whose writes can be made to fail, or to be overwritten by a
/// competing writer, for keys starting with a given prefix.
#[derive(Default)]
pub struct FaultyStore {
    inner: MemoryStore,
    failing: Mutex<Vec<String>>,
    hijacked: Mutex<Vec<(String, Vec<u8>)>>,
    written: Mutex<BTreeSet<String>>,
}

impl FaultyStore {
    /// Writes and deletes of keys under `prefix` fail from now on.
    pub fn fail_writes(&self, prefix: &str) {
        self.failing.lock().unwrap().push(prefix.to_string());
    }

    /// Writes under `prefix` succeed but another writer lands `value` last.
    pub fn hijack_writes(&self, prefix: &str, value: &Value) {
        self.hijacked
            .lock()
            .unwrap()
            .push((prefix.to_string(), value.to_string().into_bytes()));
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
        self.hijacked.lock().unwrap().clear();
    }

    /// Keys under `prefix` that were ever written and still exist.
    pub fn live_keys(&self, prefix: &str) -> Vec<String> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .filter(|k| k.starts_with(prefix))
            .filter(|k| self.inner.exists(k).unwrap())
            .cloned()
            .collect()
    }

    fn check(&self, key: &str) -> anyhow::Result<()> {
        if self.failing.lock().unwrap().iter().any(|p| key.starts_with(p.as_str())) {
            anyhow::bail!("injected failure writing {}", key);
        }
        Ok(())
    }
}

impl KvStore for FaultyStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> anyhow::Result<()> {
        self.check(key)?;
        self.written.lock().unwrap().insert(key.to_string());
        let hijack = self
            .hijacked
            .lock()
            .unwrap()
            .iter()
            .find(|(p, _)| key.starts_with(p.as_str()))
            .map(|(_, v)| v.clone());
        self.inner.set(key, hijack.as_deref().unwrap_or(value))
    }

    fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.check(key)?;
        self.inner.delete(key)
    }
}

pub fn get(path: &str, cookie: Option<&str>) -> Request {
    let mut builder = Request::builder();
    builder.method(Method::Get).uri(path);
    if let Some(cookie) = cookie {
        builder.header("cookie", cookie);
    }
    builder.build()
}

pub fn post_json(path: &str, body: Value, cookie: Option<&str>) -> Request {
    let mut builder = Request::builder();
    builder
        .method(Method::Post)
        .uri(path)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder.header("cookie", cookie);
    }
    builder.body(body.to_string().into_bytes()).build()
}

pub fn post_form(path: &str, body: &str, cookie: Option<&str>) -> Request {
    let mut builder = Request::builder();
    builder
        .method(Method::Post)
        .uri(path)
        .header("content-type", "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder.header("cookie", cookie);
    }
    builder.body(body.as_bytes().to_vec()).build()
}

/// Multipart body with text `fields` and an optional `(filename, bytes)` under `image`.
pub fn post_multipart(
    path: &str,
    fields: &[(&str, &str)],
    image: Option<(&str, &[u8])>,
    cookie: Option<&str>,
) -> Request {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    if let Some((filename, data)) = image {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                BOUNDARY, filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder();
    builder.method(Method::Post).uri(path).header(
        "content-type",
        format!("multipart/form-data; boundary={}", BOUNDARY),
    );
    if let Some(cookie) = cookie {
        builder.header("cookie", cookie);
    }
    builder.body(body).build()
}

pub fn status(resp: &Response) -> u16 {
    *resp.status()
}

pub fn header(resp: &Response, name: &str) -> Option<String> {
    resp.header(name)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

pub fn body_json(resp: &Response) -> Value {
    serde_json::from_slice(resp.body()).expect("JSON body")
}

pub fn body_text(resp: &Response) -> String {
    String::from_utf8_lossy(resp.body()).into_owned()
}

pub fn registration(name: &str, username: &str, email: &str, password: &str) -> Value {
    json!({
        "name": name,
        "email": email,
        "username": username,
        "password": password,
        "password_confirmation": password,
    })
}

pub fn register<S: KvStore>(app: &App<S>, username: &str) {
    let resp = app.handle(&post_json(
        "/register",
        registration(username, username, &format!("{}@example.com", username), "secret"),
        None,
    ));
    assert_eq!(body_json(&resp), json!({ "success": true }), "register {}", username);
}

/// Log in and return the `name=value` pair to send back as a `cookie` header.
pub fn login<S: KvStore>(app: &App<S>, username: &str) -> String {
    let resp = app.handle(&post_json(
        "/login",
        json!({ "email": format!("{}@example.com", username), "password": "secret" }),
        None,
    ));
    assert_eq!(body_json(&resp)["success"], true);
    let set_cookie = header(&resp, "set-cookie").expect("session cookie");
    set_cookie
        .split(';')
        .next()
        .expect("cookie pair")
        .to_string()
}

pub fn register_and_login<S: KvStore>(app: &App<S>, username: &str) -> String {
    register(app, username);
    login(app, username)
}

pub fn user_record<S: KvStore>(app: &App<S>, username: &str) -> pixbord::models::models::User {
    pixbord::users::find_by_username(app.store(), username)
        .expect("store")
        .expect("user exists")
}

pub fn create_post<S: KvStore>(app: &App<S>, cookie: &str, description: &str) -> String {
    let resp = app.handle(&post_image(cookie, description));
    let body = body_json(&resp);
    assert_eq!(body["created"], true, "create post: {}", body);
    body["postid"].as_str().expect("post id").to_string()
}

pub fn post_image(cookie: &str, description: &str) -> Request {
    post_multipart(
        "/posts/create",
        &[("description", description)],
        Some(("photo.jpg", &b"\xff\xd8\xff fake jpeg"[..])),
        Some(cookie),
    )
}

/// Number of files stored under `<uploads>/<kind>`.
pub fn stored_files<S: KvStore>(t: &TestApp<S>, kind: &str) -> usize {
    std::fs::read_dir(t.uploads.path().join(kind))
        .map(|dir| dir.count())
        .unwrap_or(0)
}
