//! Same HTTP surface, backed by a fresh Postgres database per test.

mod common;

use chrono::{Duration, Utc};
use common::{body, spawn_pg_app, token, PASSWORD};
use gita_auth::error::{AppError, DatabaseError};

#[tokio::test]
async fn pg_register_login_refresh_logout() {
    let app = spawn_pg_app().await;

    let response = app.register("Jane", "jane@x.com", PASSWORD).await;
    assert_eq!(201, response.status().as_u16());
    let registered = body(response).await;

    let response = app.login("JANE@x.com", PASSWORD).await;
    assert_eq!(200, response.status().as_u16());
    let logged_in = body(response).await;
    let access_token = token(&logged_in, "accessToken");
    let refresh_token = token(&logged_in, "refreshToken");

    assert_eq!(401, app.login("jane@x.com", "WrongPassword1!").await.status().as_u16());

    let response = app.get("/auth/me", Some(&access_token)).send().await.unwrap();
    assert_eq!(200, response.status().as_u16());
    assert_eq!(body(response).await["data"]["email"], "jane@x.com");

    let response = app.refresh(&refresh_token).await;
    assert_eq!(200, response.status().as_u16());
    let rotated = token(&body(response).await, "refreshToken");
    assert_eq!(401, app.refresh(&refresh_token).await.status().as_u16());

    let response = app.logout(&access_token, &rotated).await;
    assert_eq!(200, response.status().as_u16());
    assert_eq!(401, app.refresh(&rotated).await.status().as_u16());

    // The session from registration is untouched by the other login's logout
    assert_eq!(
        200,
        app.refresh(&token(&registered, "refreshToken")).await.status().as_u16()
    );
}

#[tokio::test]
async fn pg_concurrent_registration_conflicts_once() {
    let app = spawn_pg_app().await;

    let (first, second) = tokio::join!(
        app.register("Jane", "jane@x.com", PASSWORD),
        app.register("Other Jane", "JANE@X.COM", PASSWORD),
    );
    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, vec![201, 409]);

    let loser = if first.status().as_u16() == 409 { first } else { second };
    let payload = body(loser).await;
    assert_eq!(payload["error"]["code"], "DUPLICATE_ENTRY");
    assert_eq!(payload["message"], "User with this email already exists");

    assert_eq!(app.stores.users.counts().await.unwrap().total_users, 1);
}

#[tokio::test]
async fn pg_rotated_refresh_token_is_single_use() {
    let app = spawn_pg_app().await;
    let registered = app.register_user("Jane", "jane@x.com").await;
    let original = token(&registered, "refreshToken");

    let (first, second) = tokio::join!(app.refresh(&original), app.refresh(&original));
    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
    statuses.sort_unstable();
    assert_eq!(statuses, vec![200, 401]);

    assert_eq!(401, app.refresh(&original).await.status().as_u16());
    let user = app.user_by_email("jane@x.com").await;
    assert_eq!(app.stores.sessions.count_for_user(user.id).await.unwrap(), 1);
}

#[tokio::test]
async fn pg_rotate_rolls_back_for_foreign_session() {
    let app = spawn_pg_app().await;
    app.register_user("Jane", "jane@x.com").await;
    let jane = app.user_by_email("jane@x.com").await;
    let sessions = &app.stores.sessions;
    let expires = Utc::now() + Duration::days(1);

    sessions.create(jane.id, "jane-token", expires).await.unwrap();
    let rotated = sessions
        .rotate(uuid::Uuid::new_v4(), "jane-token", "stolen-token", expires)
        .await
        .unwrap();

    assert!(!rotated);
    assert!(sessions.find_by_token("jane-token").await.unwrap().is_some());
    assert!(sessions.find_by_token("stolen-token").await.unwrap().is_none());
}

#[tokio::test]
async fn pg_duplicate_session_token_is_a_generic_conflict() {
    let app = spawn_pg_app().await;
    app.register_user("Jane", "jane@x.com").await;
    let jane = app.user_by_email("jane@x.com").await;
    let expires = Utc::now() + Duration::days(1);

    app.stores.sessions.create(jane.id, "same", expires).await.unwrap();
    match app.stores.sessions.create(jane.id, "same", expires).await {
        Err(AppError::Database(DatabaseError::UniqueConstraintViolation(msg))) => {
            assert_eq!(msg, "Resource already exists")
        }
        other => panic!("Expected conflict, got {:?}", other.map(|s| s.id)),
    }
}

#[tokio::test]
async fn pg_deleting_a_user_cascades_to_sessions() {
    let app = spawn_pg_app().await;
    let registered = app.register_user("Jane", "jane@x.com").await;
    let jane = app.user_by_email("jane@x.com").await;
    let refresh_token = token(&registered, "refreshToken");

    assert!(app.stores.users.delete(jane.id).await.unwrap());

    assert!(app
        .stores
        .sessions
        .find_by_token(&refresh_token)
        .await
        .unwrap()
        .is_none());
    assert_eq!(app.stores.sessions.count_for_user(jane.id).await.unwrap(), 0);
    assert!(!app.stores.users.delete(jane.id).await.unwrap());
}

#[tokio::test]
async fn pg_admin_views_and_stats() {
    let app = spawn_pg_app().await;
    let admin = app.admin_token("admin@x.com").await;
    for name in ["Arjuna", "Bhima"] {
        app.register_user(name, &format!("{}@x.com", name.to_lowercase()))
            .await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    let arjuna = app.user_by_email("arjuna@x.com").await;
    let bhima = app.user_by_email("bhima@x.com").await;

    app.stores.users.set_active(arjuna.id, false).await.unwrap();
    let response = app
        .put(&format!("/admin/users/{}/grant-premium", bhima.id), Some(&admin))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let response = app.get("/admin/stats", Some(&admin)).send().await.unwrap();
    let stats = body(response).await["data"].clone();
    assert_eq!(stats["totalUsers"], 3);
    assert_eq!(stats["activeUsers"], 2);
    assert_eq!(stats["premiumUsers"], 1);

    let response = app
        .get("/admin/users?page=1&limit=2", Some(&admin))
        .send()
        .await
        .unwrap();
    let data = body(response).await["data"].clone();
    assert_eq!(data["total"], 3);
    assert_eq!(data["users"][0]["name"], "Bhima");
    assert_eq!(data["users"][1]["name"], "Arjuna");

    let response = app
        .get(&format!("/admin/users/{}", bhima.id), Some(&admin))
        .send()
        .await
        .unwrap();
    let user = body(response).await["data"].clone();
    assert_eq!(user["isPremium"], true);
    assert_eq!(user["sessionCount"], 1);
}
