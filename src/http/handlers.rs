use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::eligibility::{Eligibility, EligibilityService};
use crate::app::engagement::{EngagementService, DEFAULT_COMMENT_PAGE};
use crate::app::feed::{clamp_feed_page, FeedService};
use crate::app::perpetuate::PerpetuateService;
use crate::app::posts::{PostDraft, PostService};
use crate::domain::engagement::{Comment, CommentWithAuthor, EngagementCounts, PerpetuateOutcome};
use crate::domain::feed::FeedPage;
use crate::domain::post::{Post, PostDetail};
use crate::http::{AppError, AuthUser};
use crate::AppState;

const POSTING_BYPASS_HEADER: HeaderName = HeaderName::from_static("x-posting-bypass");

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

fn post_service(state: &AppState) -> PostService {
    PostService::new(state.db.clone())
}

fn engagement_service(state: &AppState) -> EngagementService {
    EngagementService::new(state.db.clone(), state.tunables.engagement)
}

/// The request-side override flag. Only honored outside production.
fn bypass_requested(headers: &HeaderMap) -> bool {
    headers
        .get(POSTING_BYPASS_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes"
            )
        })
        .unwrap_or(false)
}

async fn require_post(state: &AppState, post_id: Uuid) -> Result<(), AppError> {
    post_service(state)
        .ensure_exists(post_id)
        .await
        .map_err(|err| AppError::from_core(err, "failed to load post"))
}

#[derive(Deserialize)]
pub struct CreatePostRequest {
    pub content: String,
    pub media_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Serialize)]
pub struct CreatePostResponse {
    pub post: Post,
    pub tag_ids: Vec<Uuid>,
    pub tags: Vec<String>,
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreatePostRequest>,
) -> Result<Response, AppError> {
    let draft = PostDraft::new(
        &payload.content,
        payload.media_url,
        &payload.tags,
        state.tunables.tags,
    )?;

    let gate = EligibilityService::new(
        state.db.clone(),
        state.tunables.eligibility,
        state.tunables.bypass.clone(),
        state.tunables.engagement,
    );
    let bypassed = gate
        .require_posting(auth.user_id, auth.account_created_at, bypass_requested(&headers))
        .await
        .map_err(|err| AppError::from_core(err, "failed to check posting eligibility"))?;

    let tags = draft.tags.clone();
    let created = post_service(&state)
        .create_post(auth.user_id, draft)
        .await
        .map_err(|err| AppError::from_core(err, "failed to create post"))?;

    let mut response_headers = HeaderMap::new();
    if bypassed {
        response_headers.insert(POSTING_BYPASS_HEADER, HeaderValue::from_static("true"));
    }

    let body = CreatePostResponse {
        post: created.post,
        tag_ids: created.tag_ids,
        tags,
    };
    Ok((StatusCode::CREATED, response_headers, Json(body)).into_response())
}

pub async fn get_post(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<PostDetail>, AppError> {
    let post = post_service(&state)
        .get_post(id)
        .await
        .map_err(|err| AppError::from_core(err, "failed to fetch post"))?;

    match post {
        Some(post) => Ok(Json(post)),
        None => Err(AppError::not_found("post not found")),
    }
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub created: bool,
}

pub async fn like_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<LikeResponse>, AppError> {
    require_post(&state, id).await?;
    let created = engagement_service(&state)
        .like_post(auth.user_id, id)
        .await
        .map_err(|err| AppError::from_core(err, "failed to like post"))?;

    Ok(Json(LikeResponse { created }))
}

#[derive(Serialize)]
pub struct UnlikeResponse {
    pub removed: bool,
}

pub async fn unlike_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UnlikeResponse>, AppError> {
    require_post(&state, id).await?;
    let removed = engagement_service(&state)
        .unlike_post(auth.user_id, id)
        .await
        .map_err(|err| AppError::from_core(err, "failed to unlike post"))?;

    Ok(Json(UnlikeResponse { removed }))
}

#[derive(Deserialize)]
pub struct CommentRequest {
    pub content: String,
}

pub async fn add_comment(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    require_post(&state, id).await?;
    let comment = engagement_service(&state)
        .add_comment(id, auth.user_id, &payload.content)
        .await
        .map_err(|err| AppError::from_core(err, "failed to add comment"))?;

    Ok((StatusCode::CREATED, Json(comment)))
}

#[derive(Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize)]
pub struct CommentsResponse {
    pub items: Vec<CommentWithAuthor>,
}

pub async fn list_comments(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<CommentsResponse>, AppError> {
    require_post(&state, id).await?;
    let items = engagement_service(&state)
        .list_comments(
            id,
            query.limit.unwrap_or(DEFAULT_COMMENT_PAGE),
            query.offset.unwrap_or(0),
        )
        .await
        .map_err(|err| AppError::from_core(err, "failed to list comments"))?;

    Ok(Json(CommentsResponse { items }))
}

#[derive(Deserialize)]
pub struct PerpetuateRequest {
    pub value: f64,
}

pub async fn perpetuate_post(
    Path(id): Path<Uuid>,
    auth: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<PerpetuateRequest>,
) -> Result<Json<PerpetuateOutcome>, AppError> {
    require_post(&state, id).await?;
    let service = PerpetuateService::new(
        state.db.clone(),
        state.tunables.perpetuate,
        state.tunables.engagement,
    );
    let outcome = service
        .perpetuate(id, auth.user_id, payload.value, auth.account_created_at)
        .await
        .map_err(|err| AppError::from_core(err, "failed to perpetuate post"))?;

    Ok(Json(outcome))
}

pub async fn my_feed(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<FeedPage>, AppError> {
    let (limit, offset) = clamp_feed_page(query.limit, query.offset);
    let page = FeedService::new(state.db.clone(), state.tunables.ranking)
        .get_feed_for(auth.user_id, limit, offset)
        .await
        .map_err(|err| AppError::from_core(err, "failed to load feed"))?;

    Ok(Json(page))
}

pub async fn trending_feed(
    auth: Option<AuthUser>,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<FeedPage>, AppError> {
    let (limit, offset) = clamp_feed_page(query.limit, query.offset);
    let page = FeedService::new(state.db.clone(), state.tunables.ranking)
        .get_trending(auth.map(|user| user.user_id), limit, offset)
        .await
        .map_err(|err| AppError::from_core(err, "failed to load trending feed"))?;

    Ok(Json(page))
}

pub async fn get_eligibility(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Eligibility>, AppError> {
    let gate = EligibilityService::new(
        state.db.clone(),
        state.tunables.eligibility,
        state.tunables.bypass.clone(),
        state.tunables.engagement,
    );
    let eligibility = gate
        .can_user_post(auth.user_id, auth.account_created_at)
        .await
        .map_err(|err| AppError::from_core(err, "failed to check posting eligibility"))?;

    Ok(Json(eligibility))
}

#[derive(Serialize)]
pub struct EngagementResponse {
    pub window_days: i64,
    pub counts: EngagementCounts,
    pub engagement_score: f64,
    pub max_perpetuate: f64,
}

pub async fn get_engagement(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<EngagementResponse>, AppError> {
    let counts = engagement_service(&state)
        .engagement_counts(auth.user_id)
        .await
        .map_err(|err| AppError::from_core(err, "failed to load engagement"))?;

    let max_perpetuate = PerpetuateService::new(
        state.db.clone(),
        state.tunables.perpetuate,
        state.tunables.engagement,
    )
    .max_allowed(auth.user_id, auth.account_created_at)
    .await
    .map_err(|err| AppError::from_core(err, "failed to load engagement"))?;

    Ok(Json(EngagementResponse {
        window_days: state.tunables.engagement.window_days,
        counts,
        engagement_score: crate::app::scoring::engagement_score(counts),
        max_perpetuate,
    }))
}
