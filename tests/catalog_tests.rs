//! `/api/computer-items` over HTTP

mod common;

use common::{Script, TestServer};
use serde_json::json;

#[test]
fn lists_seeded_items() {
    let server = TestServer::start(Script::Pairing);
    let res = server.get("/api/computer-items");
    assert_eq!(res.status, 200);
    let body = res.json();
    assert_eq!(body["success"], true);
    assert_eq!(body["count"], 2);
    assert_eq!(body["data"][0]["name"], "Gaming Laptop");
    assert_eq!(body["data"][1]["brand"], "Logitech");
    assert_eq!(body["data"][0]["inStock"], true);
}

#[test]
fn filters_combine() {
    let server = TestServer::start(Script::Pairing);

    let laptops = server.get("/api/computer-items?category=laptop").json();
    assert_eq!(laptops["count"], 1);
    assert_eq!(laptops["data"][0]["id"], 1);

    let cheap = server.get("/api/computer-items?maxPrice=100&brand=logi").json();
    assert_eq!(cheap["count"], 1);
    assert_eq!(cheap["data"][0]["name"], "Wireless Mouse");

    let garbage = server.get("/api/computer-items?minPrice=abc").json();
    assert_eq!(garbage["count"], 0);

    let out_of_stock = server.get("/api/computer-items?inStock=false").json();
    assert_eq!(out_of_stock["count"], 0);
}

#[test]
fn get_by_id() {
    let server = TestServer::start(Script::Pairing);
    let res = server.get("/api/computer-items/2");
    assert_eq!(res.status, 200);
    assert_eq!(res.json()["data"]["price"], 49.99);

    for missing in ["/api/computer-items/42", "/api/computer-items/abc"] {
        let res = server.get(missing);
        assert_eq!(res.status, 404);
        assert_eq!(
            res.json(),
            json!({"success": false, "error": "Computer item not found"})
        );
    }
}

#[test]
fn id_segment_is_read_up_to_the_first_non_digit() {
    let server = TestServer::start(Script::Pairing);
    for path in ["/api/computer-items/2abc", "/api/computer-items/2.9"] {
        let res = server.get(path);
        assert_eq!(res.status, 200, "{path}");
        assert_eq!(res.json()["data"]["name"], "Wireless Mouse");
    }

    let res = server.put_json("/api/computer-items/1x", &json!({"brand": "MSI"}));
    assert_eq!(res.status, 200);
    assert_eq!(res.json()["data"]["id"], 1);
    assert_eq!(res.json()["data"]["brand"], "MSI");

    let res = server.delete("/api/computer-items/2-old");
    assert_eq!(res.status, 200);
    assert_eq!(server.get("/api/computer-items/2").status, 404);
}

#[test]
fn create_update_delete() {
    let server = TestServer::start(Script::Pairing);

    let created = server.post_json(
        "/api/computer-items",
        &json!({
            "name": "Mechanical Keyboard",
            "category": "Accessories",
            "price": "89.50",
            "brand": "Keychron",
            "color": "grey"
        }),
    );
    assert_eq!(created.status, 201);
    let body = created.json();
    assert_eq!(body["message"], "Computer item created successfully");
    assert_eq!(body["data"]["id"], 3);
    assert_eq!(body["data"]["price"], 89.5);
    assert_eq!(body["data"]["specs"], json!({}));
    assert_eq!(body["data"]["inStock"], true);

    let updated = server.put_json(
        "/api/computer-items/3",
        &json!({"id": 99, "inStock": false, "price": 79.0}),
    );
    assert_eq!(updated.status, 200);
    let body = updated.json();
    assert_eq!(body["message"], "Computer item updated successfully");
    assert_eq!(body["data"]["id"], 3);
    assert_eq!(body["data"]["inStock"], false);
    assert!(body["data"]["updatedAt"].is_string());

    let deleted = server.delete("/api/computer-items/3");
    assert_eq!(deleted.status, 200);
    assert_eq!(deleted.json()["data"]["name"], "Mechanical Keyboard");
    assert_eq!(server.get("/api/computer-items/3").status, 404);
    assert_eq!(server.delete("/api/computer-items/3").status, 404);
}

#[test]
fn create_requires_fields() {
    let server = TestServer::start(Script::Pairing);
    let res = server.post_json(
        "/api/computer-items",
        &json!({"name": "Monitor", "category": "Display", "price": 0}),
    );
    assert_eq!(res.status, 400);
    assert_eq!(
        res.json(),
        json!({"success": false, "error": "Please provide name, category, price, and brand"})
    );
}

#[test]
fn update_rejects_ill_typed_merge() {
    let server = TestServer::start(Script::Pairing);
    let res = server.put_json("/api/computer-items/1", &json!({"price": "cheap"}));
    assert_eq!(res.status, 400);
    assert!(res.json()["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid computer item"));

    let res = server.put_json("/api/computer-items/9", &json!({"price": 1}));
    assert_eq!(res.status, 404);
}

#[test]
fn urlencoded_bodies_are_accepted() {
    let server = TestServer::start(Script::Pairing);
    let res = server.request(
        "POST",
        "/api/computer-items",
        &[("Content-Type", "application/x-www-form-urlencoded")],
        Some("name=SSD&category=Storage&price=120&brand=Samsung".to_string()),
    );
    assert_eq!(res.status, 201);
    assert_eq!(res.json()["data"]["price"], 120.0);
}
