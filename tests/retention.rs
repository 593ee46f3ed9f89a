//! Retention Sweep Tests

mod common;

use axum::http::StatusCode;
use common::app;
use perpetua::jobs::retention::sweep_inactive_users;
use serde_json::json;
use tokio::sync::Mutex;
use uuid::Uuid;

// A sweep removes every stale user in the shared database, so tests that
// backdate users and sweep take turns.
static SWEEPS: Mutex<()> = Mutex::const_new(());

async fn backdate_last_used(user_id: Uuid, days: i32) {
    sqlx::query("UPDATE users SET last_used = now() - make_interval(days => $2) WHERE id = $1")
        .bind(user_id)
        .bind(days)
        .execute(app().await.pool())
        .await
        .unwrap();
}

#[tokio::test]
async fn sweep_removes_inactive_users_and_backs_out_their_boost() {
    let _turn = SWEEPS.lock().await;
    let app = app().await;
    let author = app.create_user("ret_author", 30).await;
    let active = app.create_user("ret_active", 30).await;
    let idle = app.create_user("ret_idle", 30).await;

    let post_id = app.insert_post(author.id, "keeps going", &["misc"], 1).await;
    let idle_post = app.insert_post(idle.id, "goes away", &["misc"], 1).await;
    app.insert_perpetuate(post_id, active.id, 1.5, 0).await;
    app.insert_perpetuate(post_id, idle.id, 4.0, 0).await;
    app.insert_perpetuate(idle_post, active.id, 2.0, 0).await;

    backdate_last_used(idle.id, 10).await;

    let report = sweep_inactive_users(&app.state.db, 3).await.unwrap();

    assert_eq!(report.users_removed, 1);
    assert_eq!(report.posts_adjusted, 1);

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = $1")
        .bind(idle.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(remaining, 0);

    let idle_posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE id = $1")
        .bind(idle_post)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert_eq!(idle_posts, 0);

    let boost = app.boost_of(post_id).await;
    assert!((boost - 1.5).abs() < 1e-9);
    assert!((boost - app.trust_sum_of(post_id).await).abs() < 1e-9);
}

#[tokio::test]
async fn sweep_with_no_inactive_users_is_a_no_op() {
    let app = app().await;
    let user = app.create_user("ret_recent", 30).await;

    let report = sweep_inactive_users(&app.state.db, 3650).await.unwrap();

    assert_eq!(report.users_removed, 0);
    let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(user.id)
        .fetch_one(app.pool())
        .await
        .unwrap();
    assert!(exists);
}

#[tokio::test]
async fn sweep_and_reendorse_race_keeps_boost_consistent() {
    let _turn = SWEEPS.lock().await;
    let app = app().await;
    let author = app.create_user("ret_race_author", 30).await;

    for round in 0..5 {
        let stale = app.create_trusted_user(&format!("ret_race_{}", round)).await;
        let post_id = app.insert_post(author.id, "contested", &["misc"], 1).await;
        app.insert_perpetuate(post_id, stale.id, 1.0, 0).await;
        backdate_last_used(stale.id, 10).await;

        let path = format!("/v1/posts/{}/perpetuate", post_id);
        let (resp, swept) = tokio::join!(
            app.post_json(&path, json!({ "value": 2.0 }), Some(&stale.access_token)),
            sweep_inactive_users(&app.state.db, 3),
        );

        swept.expect("sweep should not abort");
        assert!(
            matches!(
                resp.status,
                StatusCode::OK | StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND
            ),
            "unexpected status {}",
            resp.status
        );
        let boost = app.boost_of(post_id).await;
        assert!((boost - app.trust_sum_of(post_id).await).abs() < 1e-9);
    }
}
