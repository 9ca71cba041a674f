use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    response::Redirect,
};
use tracing::{debug, info};

use yatube_db::Database;
use yatube_types::api::{Claims, FeedResponse};
use yatube_types::models::FollowEdge;

use crate::auth::AppState;
use crate::error::AppError;
use crate::feeds;
use crate::pagination::PageQuery;
use crate::posts::profile_url;
use crate::with_db;

const FOLLOW_TITLE: &str = "Posts from authors you follow";

/// Adds the `follower_id -> author_id` edge.
///
/// Following yourself or following twice is a no-op. The store's
/// constraints decide both cases, so concurrent calls end with one edge.
/// Returns whether an edge was created.
pub fn follow(db: &Database, follower_id: &str, author_id: &str) -> anyhow::Result<bool> {
    let created = db.create_follow(follower_id, author_id)?;
    if !created {
        debug!("Follow {} -> {} left unchanged", follower_id, author_id);
    }
    Ok(created)
}

/// Removes the edge if present. Returns whether one was removed.
pub fn unfollow(db: &Database, follower_id: &str, author_id: &str) -> anyhow::Result<bool> {
    db.delete_follow(follower_id, author_id)
}

/// GET /follow/
pub async fn follow_index(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<PageQuery>,
) -> Result<Json<FeedResponse>, AppError> {
    let page = with_db(&state, move |db| {
        feeds::following_feed(db, &claims, query.page.as_deref())
    })
    .await?;

    Ok(Json(FeedResponse {
        title: FOLLOW_TITLE.into(),
        page: page.meta(),
        posts: page.items,
    }))
}

/// GET|POST /profile/{username}/follow/
pub async fn profile_follow(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Redirect, AppError> {
    let follower_id = claims.sub.to_string();
    let target = username.clone();
    let created = with_db(&state, move |db| {
        let author = db.get_user_by_username(&target)?.ok_or(AppError::NotFound)?;
        Ok(follow(db, &follower_id, &author.id)?)
    })
    .await?;

    if created {
        info!("New edge: {}", edge(&claims, &username));
    }
    Ok(Redirect::to(&profile_url(&username)))
}

/// GET|POST /profile/{username}/unfollow/
pub async fn profile_unfollow(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Extension(claims): Extension<Claims>,
) -> Result<Redirect, AppError> {
    let follower_id = claims.sub.to_string();
    let target = username.clone();
    let removed = with_db(&state, move |db| {
        let author = db.get_user_by_username(&target)?.ok_or(AppError::NotFound)?;
        Ok(unfollow(db, &follower_id, &author.id)?)
    })
    .await?;

    if removed {
        info!("Removed edge: {}", edge(&claims, &username));
    }
    Ok(Redirect::to(&profile_url(&username)))
}

fn edge(follower: &Claims, author: &str) -> FollowEdge {
    FollowEdge {
        follower: follower.username.clone(),
        author: author.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn user(db: &Database, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        db.create_user(&id, name, "hash").unwrap();
        id
    }

    #[test]
    fn edge_renders_both_usernames() {
        let bob = Claims { sub: Uuid::new_v4(), username: "bob".into(), exp: 0 };
        assert_eq!(edge(&bob, "alice").to_string(), "bob follows alice");
    }

    #[test]
    fn self_follow_is_a_silent_no_op() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");

        assert!(!follow(&db, &alice, &alice).unwrap());
        assert_eq!(db.count_follows().unwrap(), 0);
    }

    #[test]
    fn follow_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");

        assert!(follow(&db, &bob, &alice).unwrap());
        assert!(!follow(&db, &bob, &alice).unwrap());
        assert_eq!(db.count_follows().unwrap(), 1);
    }

    #[test]
    fn unfollow_without_edge_changes_nothing() {
        let db = Database::open_in_memory().unwrap();
        let alice = user(&db, "alice");
        let bob = user(&db, "bob");
        let carol = user(&db, "carol");
        follow(&db, &carol, &alice).unwrap();

        assert!(!unfollow(&db, &bob, &alice).unwrap());
        assert_eq!(db.count_follows().unwrap(), 1);

        assert!(unfollow(&db, &carol, &alice).unwrap());
        assert_eq!(db.count_follows().unwrap(), 0);
    }
}
