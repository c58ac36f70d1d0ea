mod common;

use axum::http::{header, StatusCode};
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn test_register_returns_token_and_plan() {
    let app = TestApp::new();
    let (status, body) = app
        .json(
            "POST",
            "/register",
            None,
            Some(json!({
                "name": "Ada Lovelace",
                "email": "Ada@Example.com",
                "password": "correct horse",
                "password_confirmation": "correct horse",
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "ada@example.com");
    assert_eq!(body["user"]["role"], "free");
    assert_eq!(body["user"]["plan"]["slug"], "free");
    assert!(body["user"].get("password_hash").is_none(), "hash must never be serialized");
    assert_eq!(body["token"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_register_rejects_duplicate_email_and_bad_confirmation() {
    let app = TestApp::new();
    app.register("Ada", "ada@example.com").await;

    let (status, body) = app
        .json(
            "POST",
            "/register",
            None,
            Some(json!({
                "name": "Imposter",
                "email": "ADA@example.com",
                "password": "correct horse",
                "password_confirmation": "correct horse",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["email"][0], "The email has already been taken.");

    let (status, body) = app
        .json(
            "POST",
            "/register",
            None,
            Some(json!({
                "name": "Bob",
                "email": "bob@example.com",
                "password": "correct horse",
                "password_confirmation": "battery staple",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["password"].is_array());
}

#[tokio::test]
async fn test_login_with_wrong_password_is_422_on_email() {
    let app = TestApp::new();
    app.register("Ada", "ada@example.com").await;

    let (status, body) = app
        .json(
            "POST",
            "/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "wrong password" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["email"][0], "These credentials do not match our records.");

    let (status, body) = app
        .json(
            "POST",
            "/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "correct horse" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn test_me_requires_session_and_logout_revokes_it() {
    let app = TestApp::new();
    let (status, _) = app.json("GET", "/user", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let token = app.register("Ada", "ada@example.com").await;
    let (status, body) = app.get("/user", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Ada");
    assert!(body["permissions"].is_array());

    // Same resource under the /api prefix
    let (status, _) = app.get("/api/user", &token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.post("/logout", &token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.get("/user", &token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_password_change_signs_out_other_sessions() {
    let app = TestApp::new();
    let first = app.register("Ada", "ada@example.com").await;
    let (_, login) = app
        .json(
            "POST",
            "/login",
            None,
            Some(json!({ "email": "ada@example.com", "password": "correct horse" })),
        )
        .await;
    let second = login["token"].as_str().unwrap().to_string();

    let (status, body) = app
        .put(
            "/profile/password",
            &first,
            json!({
                "current_password": "wrong",
                "password": "new password!",
                "password_confirmation": "new password!",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["current_password"].is_array());

    let (status, _) = app
        .put(
            "/profile/password",
            &first,
            json!({
                "current_password": "correct horse",
                "password": "new password!",
                "password_confirmation": "new password!",
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.get("/user", &first).await.0, StatusCode::OK);
    assert_eq!(app.get("/user", &second).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_photo_replacement_removes_old_file() {
    let app = TestApp::new();
    let token = app.register("Ada", "ada@example.com").await;

    let (status, body) = app
        .upload("/profile/photo", &token, "photo", "me.png", "image/png", b"\x89PNG first")
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let first = body["photo_path"].as_str().unwrap().to_string();
    assert!(app.stored(&first));
    assert!(body["photo_url"].as_str().unwrap().ends_with(&first));

    let (status, body) = app
        .upload("/profile/photo", &token, "photo", "me.jpg", "image/jpeg", b"\xff\xd8 second")
        .await;
    assert_eq!(status, StatusCode::OK);
    let second = body["photo_path"].as_str().unwrap().to_string();
    assert_ne!(first, second);
    assert!(app.stored(&second));
    assert!(!app.stored(&first), "old photo should be deleted");

    let (status, body) = app
        .upload("/profile/photo", &token, "photo", "notes.txt", "text/plain", b"hello")
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["photo"].is_array());
}

#[tokio::test]
async fn test_uploaded_photo_is_never_served_as_markup() {
    let app = TestApp::new();
    let token = app.register("Ada", "ada@example.com").await;

    let (status, body) = app
        .upload(
            "/profile/photo",
            &token,
            "photo",
            "x.html",
            "image/png",
            b"<script>alert(document.cookie)</script>",
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let path = body["photo_path"].as_str().unwrap().to_string();
    assert!(path.ends_with(".png"), "{}", path);

    let response = app.visit(&format!("/storage/{}", path), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "image/png");
    assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert!(response.headers()[header::CONTENT_SECURITY_POLICY]
        .to_str()
        .unwrap()
        .starts_with("sandbox"));
}
