//! Database row types. These map directly to SQLite rows and are kept
//! separate from the yatube-types API models.

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRow {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct PostRow {
    pub id: i64,
    pub text: String,
    pub created_at: String,
    pub author_id: String,
    pub author_username: String,
    pub image: Option<String>,
    pub group: Option<GroupRow>,
}

#[derive(Debug, Clone)]
pub struct CommentRow {
    pub id: i64,
    pub post_id: i64,
    pub author_id: String,
    pub author_username: String,
    pub text: String,
    pub created_at: String,
}

/// Values for a post insert. The timestamp is assigned by the caller.
pub struct NewPost<'a> {
    pub text: &'a str,
    pub author_id: &'a str,
    pub group_id: Option<i64>,
    pub image: Option<&'a str>,
    pub created_at: &'a str,
}

/// Which posts a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostScope<'a> {
    All,
    Group(i64),
    Author(&'a str),
    /// Posts by every author this user follows.
    FollowedBy(&'a str),
}
