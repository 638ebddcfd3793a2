/// API routes and handlers
pub mod auth;
pub mod middleware;

use crate::context::AppContext;
use axum::Router;

/// Build API routes, mounted under `/api/auth`
pub fn routes() -> Router<AppContext> {
    Router::new().merge(auth::routes())
}
