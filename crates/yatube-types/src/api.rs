use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::{Author, Comment, Group, Post};

/// Upper bound on comment length, in characters.
pub const COMMENT_MAX_CHARS: u64 = 200;

// -- JWT Claims --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    #[validate(
        length(min = 3, max = 32, message = "Username must be 3 to 32 characters"),
        custom(
            function = "username_chars",
            message = "Letters, digits and @/./+/-/_ only"
        )
    )]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

/// Body of the authentication entry point that guarded routes redirect to.
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginPage {
    pub fields: Vec<String>,
    pub next: Option<String>,
}

// -- Forms --

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PostForm {
    #[serde(default)]
    #[validate(custom(function = "non_blank", message = "Post text must not be empty"))]
    pub text: String,
    #[serde(default)]
    pub group: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 100, message = "Image reference is too long"))]
    pub image: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(default)]
    #[validate(
        custom(function = "non_blank", message = "Comment text must not be empty"),
        length(max = 200, message = "Comment must be at most 200 characters")
    )]
    pub text: String,
}

fn non_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn username_chars(value: &str) -> Result<(), ValidationError> {
    let allowed = |c: char| c.is_alphanumeric() || "@.+-_".contains(c);
    if !value.chars().all(allowed) {
        return Err(ValidationError::new("username_chars"));
    }
    Ok(())
}

fn slug_chars(value: &str) -> Result<(), ValidationError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_';
    if !value.chars().all(allowed) {
        return Err(ValidationError::new("slug_chars"));
    }
    Ok(())
}

/// Field name -> human readable messages.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Returned when a submitted form is rejected; echoes the input back.
#[derive(Debug, Serialize, Deserialize)]
pub struct FormErrorResponse {
    pub form: serde_json::Value,
    pub errors: FieldErrors,
}

/// Description of the post form for create/edit pages.
#[derive(Debug, Serialize, Deserialize)]
pub struct PostFormPage {
    pub is_edit: bool,
    pub form: PostForm,
    pub groups: Vec<Group>,
    pub post_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CommentFormSpec {
    pub fields: Vec<String>,
    pub max_length: u64,
}

impl Default for CommentFormSpec {
    fn default() -> Self {
        Self {
            fields: vec!["text".into()],
            max_length: COMMENT_MAX_CHARS,
        }
    }
}

// -- Feeds --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub number: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedResponse {
    pub title: String,
    pub page: PageMeta,
    pub posts: Vec<Post>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GroupFeedResponse {
    pub title: String,
    pub group: Group,
    pub page: PageMeta,
    pub posts: Vec<Post>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub author: Author,
    pub post_count: usize,
    pub following: bool,
    pub page: PageMeta,
    pub posts: Vec<Post>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PostDetailResponse {
    pub title: String,
    pub post: Post,
    pub comments: Vec<Comment>,
    pub comment_form: CommentFormSpec,
}

// -- Admin --

#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct CreateGroupRequest {
    #[validate(
        custom(function = "non_blank", message = "Title must not be empty"),
        length(max = 200, message = "Title must be at most 200 characters")
    )]
    pub title: String,
    #[validate(
        length(min = 1, max = 50, message = "Slug must be 1 to 50 characters"),
        custom(function = "slug_chars", message = "Letters, digits, hyphens and underscores only")
    )]
    pub slug: String,
    #[serde(default)]
    pub description: String,
}
