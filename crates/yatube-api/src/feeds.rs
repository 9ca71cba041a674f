//! Post listings for the home, group, profile and following feeds.
//!
//! Every feed counts its posts, resolves the requested page against that
//! count with `POSTS_PER_PAGE`, then fetches just that page newest-first.
//! All functions here are read-only.

use yatube_db::Database;
use yatube_db::models::PostScope;
use yatube_types::api::Claims;
use yatube_types::models::{Author, Group, Post};

use crate::config::POSTS_PER_PAGE;
use crate::error::AppError;
use crate::pagination::{Page, PageWindow};
use crate::views;

pub struct GroupFeed {
    pub group: Group,
    pub page: Page<Post>,
}

pub struct AuthorFeed {
    pub author: Author,
    pub post_count: usize,
    /// Whether the viewer follows `author`. Always false for anonymous viewers.
    pub following: bool,
    pub page: Page<Post>,
}

fn scoped_page(db: &Database, scope: PostScope<'_>, page: Option<&str>) -> Result<Page<Post>, AppError> {
    let window = PageWindow::resolve(db.count_posts(scope)?, POSTS_PER_PAGE, page);
    let rows = db.list_posts(scope, window.limit, window.offset)?;
    Ok(window.page(rows).map(views::post))
}

/// Every post.
pub fn global_feed(db: &Database, page: Option<&str>) -> Result<Page<Post>, AppError> {
    scoped_page(db, PostScope::All, page)
}

/// Posts of the group with `slug`.
pub fn group_feed(db: &Database, slug: &str, page: Option<&str>) -> Result<GroupFeed, AppError> {
    let group = db.get_group_by_slug(slug)?.ok_or(AppError::NotFound)?;
    let page = scoped_page(db, PostScope::Group(group.id), page)?;

    Ok(GroupFeed {
        group: views::group(group),
        page,
    })
}

/// Posts written by `username`.
pub fn author_feed(
    db: &Database,
    username: &str,
    viewer: Option<&Claims>,
    page: Option<&str>,
) -> Result<AuthorFeed, AppError> {
    let author = db.get_user_by_username(username)?.ok_or(AppError::NotFound)?;
    let page = scoped_page(db, PostScope::Author(&author.id), page)?;

    let following = match viewer {
        Some(claims) => db.is_following(&claims.sub.to_string(), &author.id)?,
        None => false,
    };

    Ok(AuthorFeed {
        post_count: page.count,
        following,
        page,
        author: views::author(&author.id, author.username),
    })
}

/// Posts by the authors `viewer` follows.
pub fn following_feed(db: &Database, viewer: &Claims, page: Option<&str>) -> Result<Page<Post>, AppError> {
    scoped_page(db, PostScope::FollowedBy(&viewer.sub.to_string()), page)
}
