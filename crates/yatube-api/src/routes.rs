use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::{require_admin, require_auth, resolve_viewer};
use crate::{admin, comments, follows, posts};

/// The full HTTP surface. Callers add transport layers (CORS, tracing).
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(posts::index))
        .route("/group/{slug}/", get(posts::group_posts))
        .route("/profile/{username}/", get(posts::profile))
        .route("/posts/{post_id}/", get(posts::post_detail))
        .route("/auth/register/", post(auth::register))
        .route("/auth/login/", get(auth::login_page).post(auth::login));

    let protected_routes = Router::new()
        .route("/create/", get(posts::post_create_form).post(posts::post_create))
        .route(
            "/posts/{post_id}/edit/",
            get(posts::post_edit_form).post(posts::post_edit),
        )
        .route("/posts/{post_id}/comment/", post(comments::add_comment))
        .route("/follow/", get(follows::follow_index))
        .route(
            "/profile/{username}/follow/",
            get(follows::profile_follow).post(follows::profile_follow),
        )
        .route(
            "/profile/{username}/unfollow/",
            get(follows::profile_unfollow).post(follows::profile_unfollow),
        )
        .route_layer(middleware::from_fn(require_auth));

    let admin_routes = Router::new()
        .route("/admin/cache", delete(admin::clear_cache))
        .route("/admin/groups", post(admin::create_group))
        .route("/admin/groups/{slug}", delete(admin::delete_group))
        .route("/admin/posts/{post_id}", delete(admin::delete_post))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn_with_state(state.clone(), resolve_viewer))
        .with_state(state)
}
