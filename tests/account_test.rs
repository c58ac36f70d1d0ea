mod common;

use axum::http::{header, StatusCode};
use serde_json::json;

use common::TestApp;
use linkfolio::db::models::Role;

#[tokio::test]
async fn test_plans_are_public() {
    let app = TestApp::new();
    let (status, body) = app.json("GET", "/plans", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let slugs: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap())
        .collect();
    assert_eq!(slugs, ["free", "premium", "business"]);
}

#[tokio::test]
async fn test_subscribe_switches_plan_and_cancel_returns_to_free() {
    let app = TestApp::new();
    let token = app.register("Ada", "ada@example.com").await;

    let (status, _) = app.post("/subscriptions", &token, json!({ "plan": "platinum" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = app.post("/subscriptions", &token, json!({ "plan": "free" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, first) = app.post("/subscriptions", &token, json!({ "plan": "premium" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["status"], "active");
    assert_eq!(first["plan_details"]["name"], "Premium");
    let (_, me) = app.get("/user", &token).await;
    assert_eq!(me["role"], "premium");

    // Switching plans cancels the previous subscription
    let (status, second) = app.post("/subscriptions", &token, json!({ "plan": "business" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, list) = app.get("/subscriptions", &token).await;
    let active: Vec<_> = list
        .as_array()
        .unwrap()
        .iter()
        .filter(|s| s["status"] == "active")
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], second["id"]);

    let uri = format!("/subscriptions/{}", second["id"].as_str().unwrap());
    let (status, body) = app.json("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "cancelled");
    let (_, me) = app.get("/user", &token).await;
    assert_eq!(me["role"], "free");

    let (status, _) = app.json("DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_subscriptions_cannot_be_cancelled_by_others() {
    let app = TestApp::new();
    let owner = app.register("Ada", "ada@example.com").await;
    let intruder = app.register("Eve", "eve@example.com").await;
    let (_, sub) = app.post("/subscriptions", &owner, json!({ "plan": "premium" })).await;

    let uri = format!("/subscriptions/{}", sub["id"].as_str().unwrap());
    assert_eq!(app.delete(&uri, &intruder).await, StatusCode::FORBIDDEN);
    let (_, me) = app.get("/user", &owner).await;
    assert_eq!(me["role"], "premium");
}

#[tokio::test]
async fn test_admin_routes_require_admin() {
    let app = TestApp::new();
    let admin = app.register("Root", "root@example.com").await;
    let user = app.register("Ada", "ada@example.com").await;
    app.set_role("root@example.com", Role::Admin);

    assert_eq!(app.get("/admin/users", &user).await.0, StatusCode::FORBIDDEN);
    assert_eq!(app.get("/admin/stats", &user).await.0, StatusCode::FORBIDDEN);

    let (status, page) = app.get("/admin/users?per_page=1", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 2);
    assert_eq!(page["data"].as_array().unwrap().len(), 1);

    let (_, me) = app.get("/user", &user).await;
    let user_id = me["id"].as_str().unwrap().to_string();
    let (status, body) = app
        .put(&format!("/admin/users/{}/role", user_id), &admin, json!({ "role": "business" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "business");
    // Limits come from the subscription, not the role
    assert_eq!(body["plan"]["slug"], "free");

    let (_, root) = app.get("/user", &admin).await;
    let (status, _) = app
        .put(
            &format!("/admin/users/{}/role", root["id"].as_str().unwrap()),
            &admin,
            json!({ "role": "free" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, stats) = app.get("/admin/stats", &admin).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["users"], 2);
}

#[tokio::test]
async fn test_plan_follows_subscription_not_role() {
    let app = TestApp::new();
    let admin = app.register("Root", "root@example.com").await;
    app.set_role("root@example.com", Role::Admin);
    let user = app.register("Ada", "ada@example.com").await;
    let (_, me) = app.get("/user", &user).await;
    let role_uri = format!("/admin/users/{}/role", me["id"].as_str().unwrap());

    // A role bump without paying grants nothing
    app.put(&role_uri, &admin, json!({ "role": "premium" })).await;
    let (_, me) = app.get("/user", &user).await;
    assert_eq!(me["role"], "premium");
    assert_eq!(me["plan"]["slug"], "free");
    let (status, _) = app
        .post("/cards", &user, json!({ "name": "Ada", "password": "open sesame" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // And a role drop does not take away a paid plan
    app.subscribe(&user, "premium").await;
    app.put(&role_uri, &admin, json!({ "role": "free" })).await;
    let (_, me) = app.get("/user", &user).await;
    assert_eq!(me["plan"]["slug"], "premium");
    let (status, body) = app
        .post("/cards", &user, json!({ "name": "Ada", "password": "open sesame" }))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
}

#[tokio::test]
async fn test_admin_delete_removes_user_and_files() {
    let app = TestApp::new();
    let admin = app.register("Root", "root@example.com").await;
    app.set_role("root@example.com", Role::Admin);
    let user = app.register("Ada", "ada@example.com").await;

    let (_, card) = app.post("/cards", &user, json!({ "name": "Ada" })).await;
    let (status, card) = app
        .upload(
            &format!("/cards/{}/photo", card["id"].as_str().unwrap()),
            &user,
            "photo",
            "ada.png",
            "image/png",
            b"\x89PNG",
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", card);
    let photo = card["photo_path"].as_str().unwrap().to_string();
    assert!(app.stored(&photo));

    let (_, me) = app.get("/user", &user).await;
    let uri = format!("/admin/users/{}", me["id"].as_str().unwrap());
    assert_eq!(app.delete(&uri, &admin).await, StatusCode::NO_CONTENT);

    assert!(!app.stored(&photo));
    assert_eq!(app.count("SELECT COUNT(*) FROM cards"), 0);
    assert_eq!(app.get("/user", &user).await.0, StatusCode::UNAUTHORIZED);
    assert_eq!(app.delete(&uri, &admin).await, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_templates_are_managed_by_admins_only() {
    let app = TestApp::new();
    let admin = app.register("Root", "root@example.com").await;
    app.set_role("root@example.com", Role::Admin);
    let user = app.register("Ada", "ada@example.com").await;

    let (status, list) = app.get("/card-templates", &user).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 4);

    let body = json!({ "name": "Bold", "layout": "bold", "color_scheme": { "primary": "#000000" } });
    let (status, _) = app.post("/card-templates", &user, body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, created) = app.post("/card-templates", &admin, body.clone()).await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    let (status, _) = app.post("/card-templates", &admin, body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Hidden templates disappear for regular users
    let uri = format!("/card-templates/{}", created["id"].as_str().unwrap());
    let (status, _) = app.put(&uri, &admin, json!({ "is_active": false })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.get(&uri, &user).await.0, StatusCode::NOT_FOUND);
    assert_eq!(app.get(&uri, &admin).await.0, StatusCode::OK);

    assert_eq!(app.delete(&uri, &user).await, StatusCode::FORBIDDEN);
    assert_eq!(app.delete(&uri, &admin).await, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_visitor_booking_reaches_card_owner() {
    let app = TestApp::new();
    let token = app.register("Ada", "ada@example.com").await;
    app.post("/cards", &token, json!({ "name": "Ada" })).await;

    let response = app
        .submit(
            "/card/ada/appointments",
            "name=Charles&email=charles%40example.com&scheduled_at=2999-01-02T10%3A30&notes=Engines",
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/card/ada?booked=1");

    let response = app
        .submit(
            "/card/ada/appointments",
            "name=Charles&email=charles%40example.com&scheduled_at=2000-01-01T10%3A30",
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let (status, list) = app.get("/appointments?status=pending", &token).await;
    assert_eq!(status, StatusCode::OK);
    let list = list.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["scheduled_at"], "2999-01-02 10:30:00");
    assert_eq!(list[0]["phone"], serde_json::Value::Null);

    let uri = format!("/appointments/{}", list[0]["id"].as_str().unwrap());
    let intruder = app.register("Eve", "eve@example.com").await;
    assert_eq!(app.get(&uri, &intruder).await.0, StatusCode::FORBIDDEN);

    let (status, body) = app.put(&uri, &token, json!({ "status": "confirmed" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");
    let (status, _) = app.put(&uri, &token, json!({ "status": "pending" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(app.delete(&uri, &token).await, StatusCode::NO_CONTENT);
}
