//! `/api/auth`: registration, login and the bearer-protected profile.

mod common;

use common::{Script, TestServer};
use serde_json::json;

fn login_token(server: &TestServer) -> String {
    let res = server.post_json(
        "/api/auth/login",
        &json!({"username": "admin", "password": "hashedpassword123"}),
    );
    assert_eq!(res.status, 200);
    res.json()["token"].as_str().unwrap().to_string()
}

#[test]
fn register_then_login_by_email() {
    let server = TestServer::start(Script::Pairing);
    let res = server.post_json(
        "/api/auth/register",
        &json!({"username": "maya", "email": "maya@example.com", "password": "s3cret"}),
    );
    assert_eq!(res.status, 201);
    let body = res.json();
    assert_eq!(body["message"], "User registered successfully");
    assert_eq!(body["data"]["id"], 2);
    assert_eq!(body["data"]["role"], "user");
    assert!(body["data"].get("password").is_none());

    let res = server.post_json(
        "/api/auth/login",
        &json!({"username": "maya@example.com", "password": "s3cret"}),
    );
    assert_eq!(res.status, 200);
    let body = res.json();
    assert_eq!(body["message"], "Login successful");
    assert_eq!(body["data"]["username"], "maya");
    assert!(body["token"].as_str().unwrap().starts_with("mock-jwt-token-"));
}

#[test]
fn register_rejects_duplicates_and_gaps() {
    let server = TestServer::start(Script::Pairing);
    let dup = server.post_json(
        "/api/auth/register",
        &json!({"username": "other", "email": "admin@computerstore.com", "password": "x"}),
    );
    assert_eq!(dup.status, 400);
    assert_eq!(dup.json()["error"], "Username or email already exists");

    let gap = server.post_json("/api/auth/register", &json!({"username": "solo"}));
    assert_eq!(gap.status, 400);
    assert_eq!(
        gap.json()["error"],
        "Please provide username, email, and password"
    );
}

#[test]
fn login_failures() {
    let server = TestServer::start(Script::Pairing);
    let missing = server.post_json("/api/auth/login", &json!({"username": "admin"}));
    assert_eq!(missing.status, 400);
    assert_eq!(missing.json()["error"], "Please provide username and password");

    let wrong = server.post_json(
        "/api/auth/login",
        &json!({"username": "admin", "password": "nope"}),
    );
    assert_eq!(wrong.status, 401);
    assert_eq!(
        wrong.json(),
        json!({"success": false, "error": "Invalid credentials"})
    );
}

#[test]
fn profile_requires_a_token() {
    let server = TestServer::start(Script::Pairing);
    let res = server.get("/api/auth/profile");
    assert_eq!(res.status, 401);
    assert_eq!(
        res.json(),
        json!({"success": false, "error": "Access token required"})
    );

    let res = server.request(
        "GET",
        "/api/auth/profile",
        &[("Authorization", "Bearer not-a-mock-token")],
        None,
    );
    assert_eq!(res.status, 403);
    assert_eq!(res.json(), json!({"success": false, "error": "Invalid token"}));
}

#[test]
fn profile_read_and_update() {
    let server = TestServer::start(Script::Pairing);
    let token = login_token(&server);
    let auth = format!("Bearer {token}");

    let res = server.request("GET", "/api/auth/profile", &[("Authorization", &auth)], None);
    assert_eq!(res.status, 200);
    assert_eq!(res.json()["data"]["username"], "admin");

    let res = server.request(
        "PUT",
        "/api/auth/profile",
        &[("Authorization", &auth)],
        Some(json!({"username": "root", "email": ""}).to_string()),
    );
    assert_eq!(res.status, 200);
    let body = res.json();
    assert_eq!(body["message"], "Profile updated successfully");
    assert_eq!(body["data"]["username"], "root");
    assert_eq!(body["data"]["email"], "admin@computerstore.com");
    assert!(body["data"]["updatedAt"].is_string());
}
