pub mod admin;
pub mod auth;
pub mod comments;
pub mod config;
pub mod documents;
pub mod email;
pub mod error;
pub mod links;
pub mod messages;
pub mod middleware;
pub mod portfolio;
pub mod profile;
pub mod resources;
pub mod session;
pub mod state;
pub mod storage;
pub mod ucat;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
};
use tower_http::limit::RequestBodyLimitLayer;

pub use state::{AppState, AppStateInner};

/// Every portal route. Cross-cutting layers (CORS, tracing) are added by the
/// server binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/inquiries/partnership", post(email::partnership_inquiry))
        .route("/inquiries/suitability", post(email::suitability_inquiry))
        .route("/health", get(health));

    let protected_routes = Router::new()
        // Holding screen
        .route("/me", get(profile::me))
        .route("/me/profile", patch(profile::update_profile))
        .route("/me/onboarding", post(profile::complete_onboarding))
        // Identity
        .route("/me/subject", get(profile::subject))
        .route("/me/students", get(profile::my_students))
        // Messaging
        .route("/messages", get(messages::list_messages).post(messages::send_message))
        .route("/messages/unread", get(messages::unread_count))
        .route("/threads/{thread_id}/read", post(messages::mark_thread_read))
        .route("/students/{student_id}/recipients", get(messages::recipients))
        // Mentor comments
        .route(
            "/students/{student_id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/comments/{comment_id}",
            patch(comments::update_comment).delete(comments::delete_comment),
        )
        // Scores and portfolio
        .route(
            "/students/{student_id}/ucat",
            get(ucat::list_mocks).post(ucat::create_mock).put(ucat::save_all_mocks),
        )
        .route(
            "/students/{student_id}/portfolio",
            get(portfolio::list_activities).post(portfolio::create_activity),
        )
        .route("/portfolio/{activity_id}", delete(portfolio::delete_activity))
        .route("/students/{student_id}/dashboard", get(portfolio::dashboard))
        // Documents and resources
        .merge(document_upload_routes())
        .route(
            "/documents/{document_id}",
            get(documents::download_document).delete(documents::delete_document),
        )
        .route("/resources", get(resources::list_resources).post(resources::create_resource))
        .route("/resources/{resource_id}", delete(resources::delete_resource))
        // Admin
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/{user_id}", patch(admin::update_user))
        .route("/admin/links/{kind}", post(links::create_link).delete(links::delete_link))
        .route("/students/{student_id}/guardians", get(links::guardians))
        .route("/students/{student_id}/mentors", get(links::mentors))
        .route("/admin/grants", post(admin::create_grant))
        .route("/admin/email", post(admin::send_email))
        .layer(from_fn_with_state(state.clone(), middleware::require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Raw-body uploads get their own limit instead of axum's 2 MB default.
fn document_upload_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/students/{student_id}/documents",
            get(documents::list_documents).post(documents::upload_document),
        )
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(documents::MAX_DOCUMENT_SIZE))
}

async fn health() -> &'static str {
    "ok"
}
