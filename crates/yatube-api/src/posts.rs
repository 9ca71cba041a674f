use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::header,
    response::{IntoResponse, Redirect, Response},
};
use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info};
use validator::Validate;

use yatube_db::format_timestamp;
use yatube_db::models::NewPost;
use yatube_db::Database;
use yatube_types::api::{
    Claims, CommentFormSpec, FeedResponse, GroupFeedResponse, PostDetailResponse, PostForm,
    PostFormPage, ProfileResponse,
};

use crate::auth::AppState;
use crate::cache;
use crate::error::AppError;
use crate::extract::PostId;
use crate::feeds;
use crate::middleware::Viewer;
use crate::pagination::PageQuery;
use crate::views;
use crate::with_db;

const INDEX_TITLE: &str = "Latest updates";

pub fn post_url(post_id: i64) -> String {
    format!("/posts/{post_id}/")
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{username}/")
}

/// GET /. Anonymous visitors get the cached rendering when there is one.
pub async fn index(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<PageQuery>,
) -> Result<Response, AppError> {
    let body = if viewer.is_anonymous() {
        let key = cache::index_key(query.page.as_deref());
        let ttl = state.config.index_cache_ttl;
        cache::get_or_compute(state.cache.as_ref(), &key, ttl, || render_index(&state, query.page))
            .await?
    } else {
        render_index(&state, query.page).await?
    };

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

async fn render_index(state: &AppState, page: Option<String>) -> Result<Bytes, AppError> {
    let page = with_db(state, move |db| feeds::global_feed(db, page.as_deref())).await?;

    let body = FeedResponse {
        title: INDEX_TITLE.into(),
        page: page.meta(),
        posts: page.items,
    };
    let rendered = serde_json::to_vec(&body).map_err(anyhow::Error::from)?;
    Ok(Bytes::from(rendered))
}

/// GET /group/{slug}/
pub async fn group_posts(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Query(query): Query<PageQuery>,
) -> Result<Json<GroupFeedResponse>, AppError> {
    let feed = with_db(&state, move |db| feeds::group_feed(db, &slug, query.page.as_deref())).await?;

    Ok(Json(GroupFeedResponse {
        title: format!("Posts of group {}", feed.group),
        page: feed.page.meta(),
        posts: feed.page.items,
        group: feed.group,
    }))
}

/// GET /profile/{username}/
pub async fn profile(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(viewer): Extension<Viewer>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ProfileResponse>, AppError> {
    let feed = with_db(&state, move |db| {
        feeds::author_feed(db, &username, viewer.claims(), query.page.as_deref())
    })
    .await?;

    Ok(Json(ProfileResponse {
        author: feed.author,
        post_count: feed.post_count,
        following: feed.following,
        page: feed.page.meta(),
        posts: feed.page.items,
    }))
}

/// GET /posts/{post_id}/
pub async fn post_detail(
    State(state): State<AppState>,
    PostId(post_id): PostId,
) -> Result<Json<PostDetailResponse>, AppError> {
    let (post, comments) = with_db(&state, move |db| {
        let post = db.get_post(post_id)?.ok_or(AppError::NotFound)?;
        let comments = db.list_comments(post_id)?;
        Ok((post, comments))
    })
    .await?;

    let post = views::post(post);
    Ok(Json(PostDetailResponse {
        title: views::post_title(&post.text),
        post,
        comments: comments.into_iter().map(views::comment).collect(),
        comment_form: CommentFormSpec::default(),
    }))
}

/// GET /create/
pub async fn post_create_form(State(state): State<AppState>) -> Result<Json<PostFormPage>, AppError> {
    let groups = with_db(&state, |db| Ok(db.list_groups()?)).await?;

    Ok(Json(PostFormPage {
        is_edit: false,
        form: PostForm::default(),
        groups: groups.into_iter().map(views::group).collect(),
        post_id: None,
    }))
}

/// POST /create/. On success, redirect to the author's profile.
pub async fn post_create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<PostForm>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(form) = payload?;
    let author_id = claims.sub.to_string();
    let post_id = with_db(&state, move |db| {
        check_post_form(db, &form)?;

        let created_at = format_timestamp(Utc::now());
        Ok(db.insert_post(&NewPost {
            text: &form.text,
            author_id: &author_id,
            group_id: form.group,
            image: form.image.as_deref(),
            created_at: &created_at,
        })?)
    })
    .await?;

    info!("Post {} created by {}", post_id, claims.username);
    Ok(Redirect::to(&profile_url(&claims.username)).into_response())
}

/// GET /posts/{post_id}/edit/. Non-authors are sent to the post instead.
pub async fn post_edit_form(
    State(state): State<AppState>,
    PostId(post_id): PostId,
    Extension(claims): Extension<Claims>,
) -> Result<Response, AppError> {
    let (post, groups) = with_db(&state, move |db| {
        let post = db.get_post(post_id)?.ok_or(AppError::NotFound)?;
        let groups = db.list_groups()?;
        Ok((post, groups))
    })
    .await?;

    if post.author_id != claims.sub.to_string() {
        debug!("{} may not edit post {}", claims.username, post_id);
        return Ok(Redirect::to(&post_url(post_id)).into_response());
    }

    Ok(Json(PostFormPage {
        is_edit: true,
        form: PostForm {
            group: post.group.as_ref().map(|g| g.id),
            text: post.text,
            image: post.image,
        },
        groups: groups.into_iter().map(views::group).collect(),
        post_id: Some(post_id),
    })
    .into_response())
}

/// POST /posts/{post_id}/edit/. Authorship is checked before the body is
/// looked at, so non-authors are redirected whatever they sent.
pub async fn post_edit(
    State(state): State<AppState>,
    PostId(post_id): PostId,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<PostForm>, JsonRejection>,
) -> Result<Response, AppError> {
    let editor_id = claims.sub.to_string();
    let form = payload.map(|Json(form)| form).map_err(AppError::from);
    let updated = with_db(&state, move |db| {
        let post = db.get_post(post_id)?.ok_or(AppError::NotFound)?;
        if post.author_id != editor_id {
            return Ok(false);
        }

        let form = form?;
        check_post_form(db, &form)?;
        db.update_post(post_id, &form.text, form.group, form.image.as_deref())?;
        Ok(true)
    })
    .await?;

    if updated {
        info!("Post {} edited by {}", post_id, claims.username);
    } else {
        debug!("{} may not edit post {}", claims.username, post_id);
    }
    Ok(Redirect::to(&post_url(post_id)).into_response())
}

/// Field rules plus the group reference, which only the store can check.
fn check_post_form(db: &Database, form: &PostForm) -> Result<(), AppError> {
    let mut errors = match form.validate() {
        Ok(()) => validator::ValidationErrors::new(),
        Err(errors) => errors,
    };

    if let Some(group_id) = form.group {
        if db.get_group_by_id(group_id)?.is_none() {
            errors.add(
                "group",
                validator::ValidationError::new("unknown_group")
                    .with_message("Select a valid group".into()),
            );
        }
    }

    if errors.errors().is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(form, &errors))
    }
}
