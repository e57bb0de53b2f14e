//! Axum HTTP server: routing, shared state, and request handlers.
//!
//! Handlers render HTML forms and redirect on success; recoverable form
//! errors re-render the page with a message. Store failures keep their
//! classes: missing records are 404, ownership violations 403, and datastore
//! unavailability is a logged 500 — never a silent "not found".

mod pages;

use crate::auth::CredentialHasher;
use crate::config::Config;
use crate::session::{Cookies, Sessions, VISITS_COOKIE};
use crate::store::{BlogStore, StoreError, User};
use crate::token::TokenSigner;
use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB) — prevents memory exhaustion.
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s) — prevents slow-loris abuse.
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
/// Posts shown on the front page.
const FRONT_PAGE_POSTS: u32 = 10;

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<BlogStore>,
    pub hasher: CredentialHasher,
    pub sessions: Sessions,
    /// Visit-counter signer — deliberately distinct from the session signer.
    pub visit_tokens: TokenSigner,
}

/// Run the HTTP server until shutdown.
pub async fn run(config: Config) -> Result<()> {
    let store = Arc::new(BlogStore::open(&config.database.path)?);
    tracing::info!("Blog store opened at {}", config.database.path.display());

    let state = AppState {
        store,
        hasher: CredentialHasher::new(config.secrets.session.clone()),
        sessions: Sessions::new(TokenSigner::new(config.secrets.session)),
        visit_tokens: TokenSigner::new(config.secrets.visits),
    };

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handle_home))
        .route("/health", get(handle_health))
        .route("/blog", get(handle_front))
        .route(
            "/blog/newpost",
            get(handle_newpost_page).post(handle_newpost_submit),
        )
        .route("/blog/{id}", get(handle_post_page))
        .route(
            "/blog/{id}/edit",
            get(handle_edit_page).post(handle_edit_submit),
        )
        .route("/blog/{id}/delete", post(handle_post_delete))
        .route("/blog/{id}/like", post(handle_like))
        .route("/blog/{id}/unlike", post(handle_unlike))
        .route("/blog/{id}/comment", post(handle_comment))
        .route("/comment/{id}/delete", post(handle_comment_delete))
        .route("/signup", get(handle_signup_page).post(handle_signup_submit))
        .route("/login", get(handle_login_page).post(handle_login_submit))
        .route("/logout", get(handle_logout))
        .route("/dashboard", get(handle_dashboard))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

// ── Shared helpers ──────────────────────────────────────────────────

/// Resolve the request's user. Missing/invalid cookies and deleted users are
/// anonymous; datastore failures still surface.
fn current_user(state: &AppState, headers: &HeaderMap) -> Result<Option<User>, StoreError> {
    match state.sessions.current_user_id(headers) {
        Some(id) => state.store.user_by_id(id),
        None => Ok(None),
    }
}

/// Resolve the request's user or produce the response that ends the request:
/// a redirect to the login page for anonymous visitors.
fn require_login(state: &AppState, headers: &HeaderMap) -> Result<User, Response> {
    match current_user(state, headers) {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(Redirect::to("/login").into_response()),
        Err(e) => Err(store_error_response(e)),
    }
}

/// Map a store failure onto a user-visible response.
fn store_error_response(err: StoreError) -> Response {
    match err {
        StoreError::NotFound => (
            StatusCode::NOT_FOUND,
            Html(pages::render_message(
                "Not found",
                "That page doesn't exist.",
            )),
        )
            .into_response(),
        StoreError::Forbidden => (
            StatusCode::FORBIDDEN,
            Html(pages::render_message(
                "Not allowed",
                "You can't do that to someone else's content.",
            )),
        )
            .into_response(),
        StoreError::Duplicate(name) => (
            StatusCode::CONFLICT,
            Html(pages::render_message(
                "Conflict",
                &format!("Username '{name}' is already taken."),
            )),
        )
            .into_response(),
        StoreError::Database(e) => {
            tracing::error!("Datastore failure: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(pages::render_message(
                    "Server error",
                    "Something went wrong on our end. Please try again.",
                )),
            )
                .into_response()
        }
    }
}

/// Next visit count given the raw cookie value, falling back to 0 on any
/// missing or invalid token.
fn next_visit_count(signer: &TokenSigner, cookie: Option<String>) -> u64 {
    cookie
        .and_then(|token| signer.verify(&token))
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0)
        + 1
}

/// Render the permalink page for a post, optionally with a form error.
fn post_page(
    state: &AppState,
    viewer: Option<&User>,
    post_id: i64,
    error: Option<&str>,
) -> Response {
    let post = match state.store.post_by_id(post_id) {
        Ok(p) => p,
        Err(e) => return store_error_response(e),
    };
    let comments = match state.store.comments_for_post(post_id) {
        Ok(c) => c,
        Err(e) => return store_error_response(e),
    };
    let like_count = match state.store.like_count(post_id) {
        Ok(n) => n,
        Err(e) => return store_error_response(e),
    };
    let viewer_liked = match viewer {
        Some(user) => match state.store.user_likes(post_id, user.id) {
            Ok(liked) => liked,
            Err(e) => return store_error_response(e),
        },
        None => false,
    };
    Html(pages::render_post(
        viewer,
        &post,
        &comments,
        like_count,
        viewer_liked,
        error,
    ))
    .into_response()
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET / — signed visit counter; any invalid cookie falls back to 0.
async fn handle_home(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let visits = next_visit_count(&state.visit_tokens, headers.cookie(VISITS_COOKIE));
    let cookie = format!(
        "{VISITS_COOKIE}={}; Path=/",
        state.visit_tokens.sign(&visits.to_string())
    );
    (
        [(header::SET_COOKIE, cookie)],
        format!("You've been here {visits} times"),
    )
}

/// GET /health — always public.
async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /blog — front page, newest posts first.
async fn handle_front(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let viewer = match current_user(&state, &headers) {
        Ok(v) => v,
        Err(e) => return store_error_response(e),
    };
    match state.store.recent_posts(FRONT_PAGE_POSTS) {
        Ok(posts) => Html(pages::render_front(viewer.as_ref(), &posts)).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// GET /blog/{id} — permalink with comments and likes.
async fn handle_post_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let viewer = match current_user(&state, &headers) {
        Ok(v) => v,
        Err(e) => return store_error_response(e),
    };
    post_page(&state, viewer.as_ref(), id, None)
}

#[derive(Debug, Deserialize)]
struct PostForm {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    content: String,
}

/// GET /blog/newpost — new-post form (login required).
async fn handle_newpost_page(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match require_login(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    Html(pages::render_post_form(
        &user,
        "New post",
        "/blog/newpost",
        "",
        "",
        None,
    ))
    .into_response()
}

/// POST /blog/newpost — create a post; missing fields re-render the form.
async fn handle_newpost_submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(form): Form<PostForm>,
) -> Response {
    let user = match require_login(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let subject = form.subject.trim();
    let content = form.content.trim();
    if subject.is_empty() || content.is_empty() {
        return Html(pages::render_post_form(
            &user,
            "New post",
            "/blog/newpost",
            subject,
            content,
            Some("We need both a subject and some content!"),
        ))
        .into_response();
    }

    match state.store.create_post(user.id, subject, content) {
        Ok(id) => {
            tracing::info!(author = user.id, post = id, "Post created");
            Redirect::to(&format!("/blog/{id}")).into_response()
        }
        Err(e) => store_error_response(e),
    }
}

/// GET /blog/{id}/edit — edit form, author only.
async fn handle_edit_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let user = match require_login(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let post = match state.store.post_by_id(id) {
        Ok(p) => p,
        Err(e) => return store_error_response(e),
    };
    if post.author_id != user.id {
        return store_error_response(StoreError::Forbidden);
    }
    Html(pages::render_post_form(
        &user,
        "Edit post",
        &format!("/blog/{id}/edit"),
        &post.subject,
        &post.content,
        None,
    ))
    .into_response()
}

/// POST /blog/{id}/edit — save an edit, author only.
async fn handle_edit_submit(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Form(form): Form<PostForm>,
) -> Response {
    let user = match require_login(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let subject = form.subject.trim();
    let content = form.content.trim();
    if subject.is_empty() || content.is_empty() {
        return Html(pages::render_post_form(
            &user,
            "Edit post",
            &format!("/blog/{id}/edit"),
            subject,
            content,
            Some("We need both a subject and some content!"),
        ))
        .into_response();
    }

    match state.store.update_post(id, user.id, subject, content) {
        Ok(()) => Redirect::to(&format!("/blog/{id}")).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// POST /blog/{id}/delete — author only.
async fn handle_post_delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let user = match require_login(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.store.delete_post(id, user.id) {
        Ok(()) => {
            tracing::info!(author = user.id, post = id, "Post deleted");
            Redirect::to("/blog").into_response()
        }
        Err(e) => store_error_response(e),
    }
}

/// POST /blog/{id}/like — login required, not on your own post.
async fn handle_like(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let user = match require_login(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.store.like_post(id, user.id) {
        Ok(()) => Redirect::to(&format!("/blog/{id}")).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// POST /blog/{id}/unlike
async fn handle_unlike(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let user = match require_login(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.store.unlike_post(id, user.id) {
        Ok(()) => Redirect::to(&format!("/blog/{id}")).into_response(),
        Err(e) => store_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct CommentForm {
    #[serde(default)]
    content: String,
}

/// POST /blog/{id}/comment — empty comments re-render the post with an error.
async fn handle_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    Form(form): Form<CommentForm>,
) -> Response {
    let user = match require_login(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };

    let content = form.content.trim();
    if content.is_empty() {
        return post_page(&state, Some(&user), id, Some("A comment needs some content."));
    }

    match state.store.add_comment(id, user.id, content) {
        Ok(_) => Redirect::to(&format!("/blog/{id}")).into_response(),
        Err(e) => store_error_response(e),
    }
}

/// POST /comment/{id}/delete — comment author only.
async fn handle_comment_delete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> Response {
    let user = match require_login(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.store.delete_comment(id, user.id) {
        Ok(post_id) => Redirect::to(&format!("/blog/{post_id}")).into_response(),
        Err(e) => store_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct SignupForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
    #[serde(default)]
    verify: String,
    #[serde(default)]
    email: String,
}

/// GET /signup
async fn handle_signup_page() -> Html<String> {
    Html(pages::render_signup("", "", None))
}

/// POST /signup — validate, hash, create, log in.
async fn handle_signup_submit(
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> Response {
    let username = form.username.trim();
    let email = form.email.trim();

    if username.is_empty() || form.password.is_empty() {
        return Html(pages::render_signup(
            username,
            email,
            Some("Please complete the required fields."),
        ))
        .into_response();
    }
    if form.password != form.verify {
        return Html(pages::render_signup(
            username,
            email,
            Some("Passwords did not match."),
        ))
        .into_response();
    }

    let digest = state.hasher.hash(username, &form.password);
    let email = (!email.is_empty()).then_some(email);

    match state.store.create_user(username, &digest, email) {
        Ok(user_id) => {
            tracing::info!(user = user_id, "User registered");
            (
                [(header::SET_COOKIE, state.sessions.login_cookie(user_id))],
                Redirect::to("/dashboard"),
            )
                .into_response()
        }
        Err(StoreError::Duplicate(name)) => Html(pages::render_signup(
            username,
            form.email.trim(),
            Some(&format!("Username '{name}' is already taken.")),
        ))
        .into_response(),
        Err(e) => store_error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// GET /login
async fn handle_login_page() -> Html<String> {
    Html(pages::render_login(None))
}

/// POST /login — verify against the stored digest, set the session cookie.
async fn handle_login_submit(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Response {
    let username = form.username.trim();
    let user = match state.store.user_by_name(username) {
        Ok(Some(user)) => user,
        Ok(None) => {
            // Dummy hash to prevent a timing side-channel on unknown names.
            let _ = state
                .hasher
                .hash_with_salt(username, &form.password, "00000000");
            return Html(pages::render_login(Some("Invalid username or password.")))
                .into_response();
        }
        Err(e) => return store_error_response(e),
    };

    if !state.hasher.verify(username, &form.password, &user.digest) {
        return Html(pages::render_login(Some("Invalid username or password."))).into_response();
    }

    tracing::info!(user = user.id, "User logged in");
    (
        [(header::SET_COOKIE, state.sessions.login_cookie(user.id))],
        Redirect::to("/dashboard"),
    )
        .into_response()
}

/// GET /logout — overwrite the session cookie with an empty value.
async fn handle_logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, state.sessions.logout_cookie())],
        Redirect::to("/blog"),
    )
}

/// GET /dashboard — the user's own posts.
async fn handle_dashboard(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let user = match require_login(&state, &headers) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match state.store.posts_by_author(user.id) {
        Ok(posts) => Html(pages::render_dashboard(&user, &posts)).into_response(),
        Err(e) => store_error_response(e),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
