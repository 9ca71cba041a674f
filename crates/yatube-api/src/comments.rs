use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    response::Redirect,
};
use chrono::Utc;
use tracing::info;
use validator::Validate;

use yatube_db::{Database, format_timestamp};
use yatube_types::api::{Claims, CommentForm};

use crate::auth::AppState;
use crate::error::AppError;
use crate::extract::PostId;
use crate::posts::post_url;
use crate::with_db;

/// Validates `form` and attaches it to `post_id` as a comment by `author_id`.
pub fn submit_comment(
    db: &Database,
    post_id: i64,
    author_id: &str,
    form: &CommentForm,
) -> Result<i64, AppError> {
    db.get_post(post_id)?.ok_or(AppError::NotFound)?;

    form.validate().map_err(|errors| AppError::validation(form, &errors))?;

    let created_at = format_timestamp(Utc::now());
    Ok(db.insert_comment(post_id, author_id, &form.text, &created_at)?)
}

/// POST /posts/{post_id}/comment/. Redirects back to the post.
pub async fn add_comment(
    State(state): State<AppState>,
    PostId(post_id): PostId,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<CommentForm>, JsonRejection>,
) -> Result<Redirect, AppError> {
    let Json(form) = payload?;
    let author_id = claims.sub.to_string();
    let comment_id =
        with_db(&state, move |db| submit_comment(db, post_id, &author_id, &form)).await?;

    info!("Comment {} on post {} by {}", comment_id, post_id, claims.username);
    Ok(Redirect::to(&post_url(post_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use yatube_db::models::NewPost;

    fn setup() -> (Database, String, i64) {
        let db = Database::open_in_memory().unwrap();
        let author = Uuid::new_v4().to_string();
        db.create_user(&author, "alice", "hash").unwrap();
        let post_id = db
            .insert_post(&NewPost {
                text: "hello",
                author_id: &author,
                group_id: None,
                image: None,
                created_at: &format_timestamp(Utc::now()),
            })
            .unwrap();
        (db, author, post_id)
    }

    #[test]
    fn valid_comment_is_stored() {
        let (db, author, post_id) = setup();
        let form = CommentForm { text: "nice post".into() };

        submit_comment(&db, post_id, &author, &form).unwrap();

        let comments = db.list_comments(post_id).unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "nice post");
        assert_eq!(comments[0].author_id, author);
    }

    #[test]
    fn invalid_comment_is_not_stored() {
        let (db, author, post_id) = setup();

        let too_long = "x".repeat(201);
        for text in ["", "   ", too_long.as_str()] {
            let form = CommentForm { text: text.to_string() };
            let err = submit_comment(&db, post_id, &author, &form).unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert_eq!(db.count_comments().unwrap(), 0);
    }

    #[test]
    fn comment_on_missing_post_is_not_found() {
        let (db, author, _) = setup();
        let form = CommentForm { text: "hello".into() };
        let err = submit_comment(&db, 9999, &author, &form).unwrap_err();
        assert!(matches!(err, AppError::NotFound));
    }
}
