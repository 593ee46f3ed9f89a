//! Posting Eligibility Tests
//!
//! Walks an account through the gate's unlock, age, and engagement checks.

mod common;

use axum::http::StatusCode;
use common::app;

#[tokio::test]
async fn new_account_is_locked() {
    let app = app().await;
    let user = app.create_user("elig_new", 0).await;

    let resp = app.get("/v1/account/eligibility", Some(&user.access_token)).await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["ok"], false);
    assert_eq!(body["reason"], "Posting locked. Comment more or wait 3 days.");
    assert_eq!(body["account_age_days"], 0);
    assert_eq!(body["engagement_score"], 0.0);
}

#[tokio::test]
async fn comments_unlock_after_minimum_age() {
    let app = app().await;
    let author = app.create_user("elig_author", 30).await;
    let post_id = app.insert_post(author.id, "talk", &["misc"], 1).await;

    let fresh = app.create_user("elig_fresh", 0).await;
    for _ in 0..3 {
        app.insert_comment(post_id, fresh.id, 0).await;
    }
    let body = app
        .get("/v1/account/eligibility", Some(&fresh.access_token))
        .await
        .json();
    assert_eq!(body["ok"], false);
    assert_eq!(body["reason"], "Account must be at least 1 day(s) old.");

    let day_old = app.create_user("elig_day_old", 1).await;
    for _ in 0..3 {
        app.insert_comment(post_id, day_old.id, 0).await;
    }
    let body = app
        .get("/v1/account/eligibility", Some(&day_old.access_token))
        .await
        .json();
    assert_eq!(body["ok"], true);
    assert!(body.get("reason").is_none());
    assert_eq!(body["engagement_score"], 3.0);
}

#[tokio::test]
async fn low_engagement_blocks_old_account() {
    let app = app().await;
    let author = app.create_user("elig_low_author", 30).await;
    let post_id = app.insert_post(author.id, "meh", &["misc"], 1).await;
    let user = app.create_user("elig_low", 5).await;
    app.insert_like(post_id, user.id, 0).await;

    let body = app
        .get("/v1/account/eligibility", Some(&user.access_token))
        .await
        .json();
    assert_eq!(body["ok"], false);
    assert_eq!(body["reason"], "Insufficient engagement score (2).");
    assert_eq!(body["engagement_score"], 0.5);
    assert_eq!(body["account_age_days"], 5);
}

#[tokio::test]
async fn engagement_outside_window_does_not_count() {
    let app = app().await;
    let author = app.create_user("elig_stale_author", 60).await;
    let post_id = app.insert_post(author.id, "old thread", &["misc"], 1000).await;
    let user = app.create_user("elig_stale", 60).await;
    for _ in 0..4 {
        app.insert_comment(post_id, user.id, 45).await;
    }

    let body = app
        .get("/v1/account/eligibility", Some(&user.access_token))
        .await
        .json();
    assert_eq!(body["ok"], false);
    assert_eq!(body["engagement_score"], 0.0);
}
