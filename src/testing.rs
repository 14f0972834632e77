//! Helpers for driving the full router in handler tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use bytes::Bytes;
use serde_json::Value;
use tower::ServiceExt;

use crate::{
    app::build_app,
    auth::{password::hash_password, JwtKeys, TokenClaims},
    db::{memory::MemoryStore, NewProduct, NewUser, Product, User},
    state::AppState,
    storage::StorageClient,
};

const BOUNDARY: &str = "bakery-test-boundary";

/// Storage that keeps nothing but remembers which keys were written and removed.
#[derive(Default)]
pub struct RecordingStorage {
    pub puts: Mutex<Vec<String>>,
    pub deletes: Mutex<Vec<String>>,
}

#[async_trait]
impl StorageClient for RecordingStorage {
    async fn put_object(&self, key: &str, _body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        self.puts.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.deletes.lock().unwrap().push(key.to_string());
        Ok(())
    }

    fn public_path(&self, key: &str) -> String {
        format!("/static/{key}")
    }

    fn key_for(&self, public_path: &str) -> Option<String> {
        public_path.strip_prefix("/static/").map(str::to_string)
    }
}

impl RecordingStorage {
    pub fn deleted(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }

    pub fn stored(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub memory: Arc<MemoryStore>,
    pub storage: Arc<RecordingStorage>,
    router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let memory = Arc::new(MemoryStore::new());
        let storage = Arc::new(RecordingStorage::default());
        let state = AppState::fake_with(memory.clone(), storage.clone());
        Self {
            router: build_app(state.clone()),
            state,
            memory,
            storage,
        }
    }

    pub async fn send(&self, req: Request<Body>) -> (StatusCode, Value) {
        let res = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("router is infallible");
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("read body");
        let body = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, body)
    }

    /// Token carrying only the admin password.
    pub fn admin_token(&self) -> String {
        self.sign(None)
    }

    /// Token that also identifies `email`/`password` as the acting user.
    pub fn user_token(&self, email: &str, password: &str) -> String {
        self.sign(Some((email, password)))
    }

    fn sign(&self, user: Option<(&str, &str)>) -> String {
        JwtKeys::new(&self.state.config.auth)
            .sign(&TokenClaims {
                admin_password: self.state.config.auth.api_pass.clone(),
                email: user.map(|(e, _)| e.to_string()),
                password: user.map(|(_, p)| p.to_string()),
                exp: None,
            })
            .expect("sign token")
    }

    pub async fn seed_user(&self, email: &str, password: &str) -> User {
        self.state
            .store
            .create_user(NewUser {
                email: email.into(),
                password_hash: hash_password(password).expect("hash"),
                first_name: "Anna".into(),
                last_name: "Baker".into(),
                address: Some("1 Flour St".into()),
            })
            .await
            .expect("create user")
            .expect("email is free")
    }

    pub async fn seed_product(&self, name: &str, price: f64) -> Product {
        self.state
            .store
            .create_product(NewProduct {
                name: name.into(),
                price,
                description: None,
                image_url: None,
            })
            .await
            .expect("create product")
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request(Method::GET, uri, token)
        .body(Body::empty())
        .expect("request")
}

pub fn empty(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    request(method, uri, token)
        .body(Body::empty())
        .expect("request")
}

/// `application/x-www-form-urlencoded` request.
pub fn form(method: Method, uri: &str, token: Option<&str>, pairs: &[(&str, &str)]) -> Request<Body> {
    let body = pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&");
    request(method, uri, token)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .expect("request")
}

/// `multipart/form-data` request with an optional `image` file part.
pub fn multipart(
    method: Method,
    uri: &str,
    token: Option<&str>,
    pairs: &[(&str, &str)],
    image: Option<(&str, &[u8])>,
) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in pairs {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    if let Some((filename, bytes)) = image {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    request(method, uri, token)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request")
}

fn request(method: Method, uri: &str, token: Option<&str>) -> axum::http::request::Builder {
    let builder = Request::builder().method(method).uri(uri);
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}
