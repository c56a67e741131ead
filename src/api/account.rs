/// Account lifecycle endpoints
///
/// Registration, activation, login, logout, and password reset. Handlers
/// accept form-encoded POSTs and render HTML pages; successful state
/// transitions redirect to /login or / with a `notice` query parameter.
///
/// Uid path segments are the URL-safe base64 encoding of the account UUID.
/// A uid that fails to decode, an unknown account, and a bad token all
/// render the same failure page, so responses never reveal whether an
/// account exists.
use crate::{
    account::NewAccount,
    auth::{CurrentSession, OptionalSession, SESSION_COOKIE},
    context::AppContext,
    error::{AppError, AppResult},
    pages,
    token::TokenPurpose,
    validation::{self, FieldError},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use uuid::Uuid;

/// Build account lifecycle routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(home))
        .route("/register", get(register_form).post(register))
        .route("/login", get(login_form).post(login))
        .route("/activate/:uid/:token", get(activate))
        .route("/logout", post(logout))
        .route(
            "/request-reset-email",
            get(request_reset_form).post(request_reset),
        )
        .route(
            "/set-new-password/:uid/:token",
            get(set_new_password_form).post(set_new_password),
        )
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetRequestForm {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct NewPasswordForm {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub password2: String,
}

#[derive(Debug, Deserialize)]
struct NoticeParams {
    notice: Option<String>,
}

/// Encode an account id for use in activation/reset URLs
fn encode_uid(id: Uuid) -> String {
    URL_SAFE_NO_PAD.encode(id.to_string())
}

/// Decode a uid path segment back to an account id
fn decode_uid(uid: &str) -> Option<Uuid> {
    let bytes = URL_SAFE_NO_PAD.decode(uid).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    Uuid::parse_str(&text).ok()
}

/// Resolve a uid/token pair to the account it is bound to
///
/// Any failure along the way (undecodable uid, unknown account, bad token)
/// collapses to `None`; callers render one uniform invalid-link response.
async fn resolve_token_target(
    ctx: &AppContext,
    uid: &str,
    token: &str,
    purpose: TokenPurpose,
) -> AppResult<Option<crate::db::account::Account>> {
    let Some(id) = decode_uid(uid) else {
        return Ok(None);
    };

    let Some(account) = ctx.accounts.find_by_id(id).await? else {
        return Ok(None);
    };

    if !ctx.tokens.verify(token, &account, purpose) {
        return Ok(None);
    }

    Ok(Some(account))
}

/// GET / - home page, session-aware
async fn home(session: OptionalSession) -> Html<String> {
    let username = session.0.as_ref().map(|s| s.account.username.as_str());
    Html(pages::home_page(username))
}

/// GET /register - registration form
async fn register_form() -> Html<String> {
    Html(pages::register_page(&[], "", "", ""))
}

/// POST /register - create an inactive account and send the activation link
async fn register(State(ctx): State<AppContext>, Form(form): Form<RegisterForm>) -> AppResult<Response> {
    let errors = validation::validate_registration(
        &ctx.accounts,
        &form.email,
        &form.username,
        &form.name,
        &form.password,
        &form.password2,
    )
    .await?;

    if !errors.is_empty() {
        return Ok(render_register_errors(&form, errors));
    }

    let account = match ctx
        .accounts
        .create_account(NewAccount {
            username: form.username.clone(),
            email: form.email.clone(),
            full_name: form.name.clone(),
            password: form.password.clone(),
        })
        .await
    {
        Ok(account) => account,
        // Lost a race against a concurrent registration; report it like any
        // other validation failure
        Err(AppError::Conflict(message)) => {
            let errors = vec![FieldError {
                field: "username",
                message,
            }];
            return Ok(render_register_errors(&form, errors));
        }
        Err(e) => return Err(e),
    };

    let token = ctx.tokens.issue(&account, TokenPurpose::Activate)?;
    let activation_url = format!(
        "{}/activate/{}/{}",
        ctx.base_url(),
        encode_uid(account.id),
        token
    );
    ctx.mailer
        .send_activation_email(&account.email, &account.username, &activation_url);

    tracing::info!(username = %account.username, "account registered, activation email dispatched");

    Ok(Redirect::to("/login?notice=registered").into_response())
}

fn render_register_errors(form: &RegisterForm, errors: Vec<FieldError>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Html(pages::register_page(
            &errors,
            &form.email,
            &form.username,
            &form.name,
        )),
    )
        .into_response()
}

/// GET /login - login form
async fn login_form(Query(params): Query<NoticeParams>) -> Html<String> {
    Html(pages::login_page(&[], "", params.notice.as_deref()))
}

/// POST /login - verify credentials and establish a session
async fn login(
    State(ctx): State<AppContext>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let mut errors = validation::validate_login(&form.username, &form.password);

    let account = if errors.is_empty() {
        ctx.accounts
            .authenticate(&form.username, &form.password)
            .await?
    } else {
        None
    };

    let Some(account) = account else {
        // One message for unknown usernames, wrong passwords, and inactive
        // accounts alike
        if errors.is_empty() {
            errors.push(FieldError {
                field: "username",
                message: "Invalid login".to_string(),
            });
        }
        return Ok((
            StatusCode::UNAUTHORIZED,
            Html(pages::login_page(&errors, &form.username, None)),
        )
            .into_response());
    };

    ctx.accounts.touch_last_login(account.id).await?;
    let session = ctx.accounts.create_session(account.id).await?;

    tracing::info!(username = %account.username, "login successful");

    let cookie = Cookie::build((SESSION_COOKIE, session.token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    Ok((jar.add(cookie), Redirect::to("/")).into_response())
}

/// GET /activate/{uid}/{token} - flip the account to active
async fn activate(
    State(ctx): State<AppContext>,
    Path((uid, token)): Path<(String, String)>,
) -> AppResult<Response> {
    let Some(account) = resolve_token_target(&ctx, &uid, &token, TokenPurpose::Activate).await?
    else {
        return Ok((
            StatusCode::UNAUTHORIZED,
            Html(pages::activation_failed_page()),
        )
            .into_response());
    };

    ctx.accounts.activate(account.id).await?;

    Ok(Redirect::to("/login?notice=activated").into_response())
}

/// POST /logout - destroy the session
async fn logout(
    State(ctx): State<AppContext>,
    session: CurrentSession,
    jar: CookieJar,
) -> AppResult<Response> {
    ctx.accounts.delete_session(&session.token).await?;

    tracing::info!(username = %session.account.username, "logout successful");

    let removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    Ok((jar.remove(removal), Redirect::to("/login?notice=logged-out")).into_response())
}

/// GET /request-reset-email - reset request form
async fn request_reset_form() -> Html<String> {
    Html(pages::request_reset_page(None))
}

/// POST /request-reset-email - send a reset link if the email is known
///
/// The response is identical whether or not the email matches an account.
async fn request_reset(
    State(ctx): State<AppContext>,
    Form(form): Form<ResetRequestForm>,
) -> AppResult<Response> {
    use validator::ValidateEmail;

    if !form.email.validate_email() {
        return Ok(Html(pages::request_reset_page(Some("Please enter a valid email"))).into_response());
    }

    if let Some(account) = ctx.accounts.find_by_email(&form.email).await? {
        let token = ctx.tokens.issue(&account, TokenPurpose::ResetPassword)?;
        let reset_url = format!(
            "{}/set-new-password/{}/{}",
            ctx.base_url(),
            encode_uid(account.id),
            token
        );
        ctx.mailer
            .send_password_reset_email(&account.email, &account.username, &reset_url);

        tracing::info!(username = %account.username, "password reset email dispatched");
    }

    Ok(Html(pages::reset_email_sent_page()).into_response())
}

/// GET /set-new-password/{uid}/{token} - new password form
///
/// Pre-verifies the link so a stale one steers the user straight back to
/// requesting a new reset email.
async fn set_new_password_form(
    State(ctx): State<AppContext>,
    Path((uid, token)): Path<(String, String)>,
) -> AppResult<Response> {
    if resolve_token_target(&ctx, &uid, &token, TokenPurpose::ResetPassword)
        .await?
        .is_none()
    {
        return Ok((
            StatusCode::UNAUTHORIZED,
            Html(pages::reset_link_invalid_page()),
        )
            .into_response());
    }

    Ok(Html(pages::set_new_password_page(&uid, &token, &[])).into_response())
}

/// POST /set-new-password/{uid}/{token} - replace the password
async fn set_new_password(
    State(ctx): State<AppContext>,
    Path((uid, token)): Path<(String, String)>,
    Form(form): Form<NewPasswordForm>,
) -> AppResult<Response> {
    // Password rules run before any store access
    let errors = validation::validate_new_password(&form.password, &form.password2);
    if !errors.is_empty() {
        return Ok(Html(pages::set_new_password_page(&uid, &token, &errors)).into_response());
    }

    let Some(account) =
        resolve_token_target(&ctx, &uid, &token, TokenPurpose::ResetPassword).await?
    else {
        return Ok((
            StatusCode::UNAUTHORIZED,
            Html(pages::reset_link_invalid_page()),
        )
            .into_response());
    };

    ctx.accounts
        .update_password(account.id, &form.password)
        .await?;

    tracing::info!(username = %account.username, "password reset successful");

    Ok(Redirect::to("/login?notice=password-reset").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{test_context, AppContext};
    use crate::server;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use tower::util::ServiceExt;

    async fn app() -> (axum::Router, AppContext) {
        let ctx = test_context().await;
        (server::build_router(ctx.clone()), ctx)
    }

    fn form_post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn location(response: &axum::response::Response) -> String {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    const ALICE: &str = "email=a%40x.com&username=alice&name=Alice&password=secret1&password2=secret1";

    async fn register_alice(router: &axum::Router) {
        let response = router
            .clone()
            .oneshot(form_post("/register", ALICE))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
    }

    #[tokio::test]
    async fn test_register_form_renders() {
        let (router, _ctx) = app().await;

        let response = router.oneshot(get("/register")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_string(response).await;
        assert!(body.contains(r#"<form method="post" action="/register">"#));
    }

    #[tokio::test]
    async fn test_register_creates_inactive_account() {
        let (router, ctx) = app().await;

        let response = router.oneshot(form_post("/register", ALICE)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?notice=registered");

        let account = ctx.accounts.find_by_username("alice").await.unwrap().unwrap();
        assert!(!account.active);
        assert_eq!(account.email, "a@x.com");
        assert_eq!(account.full_name, "Alice");
    }

    #[tokio::test]
    async fn test_register_collects_all_errors() {
        let (router, ctx) = app().await;

        let response = router
            .oneshot(form_post(
                "/register",
                "email=bad&username=&name=&password=abc&password2=abcd",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_string(response).await;
        assert!(body.contains("Please provide a valid email"));
        assert!(body.contains("Username must be provided"));
        assert!(body.contains("Full name must be provided"));
        assert!(body.contains("Password must be at least 6 characters long"));
        assert!(body.contains("Passwords do not match"));

        assert!(!ctx.accounts.email_exists("bad").await.unwrap());
    }

    #[tokio::test]
    async fn test_register_duplicate_rejected() {
        let (router, ctx) = app().await;
        register_alice(&router).await;

        // Same username, different email
        let response = router
            .clone()
            .oneshot(form_post(
                "/register",
                "email=b%40x.com&username=alice&name=Alice&password=secret1&password2=secret1",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_string(response).await;
        assert!(body.contains("Username is taken"));
        assert!(!ctx.accounts.email_exists("b@x.com").await.unwrap());

        // Same email, different username
        let response = router
            .oneshot(form_post(
                "/register",
                "email=a%40x.com&username=bob&name=Bob&password=secret1&password2=secret1",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_string(response).await;
        assert!(body.contains("Email is taken"));
        assert!(!ctx.accounts.username_exists("bob").await.unwrap());
    }

    #[tokio::test]
    async fn test_register_echoes_submitted_values() {
        let (router, _ctx) = app().await;

        let response = router
            .oneshot(form_post(
                "/register",
                "email=a%40x.com&username=alice&name=&password=secret1&password2=secret1",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_string(response).await;
        assert!(body.contains(r#"value="a@x.com""#));
        assert!(body.contains(r#"value="alice""#));
    }

    #[tokio::test]
    async fn test_activation_flow() {
        let (router, ctx) = app().await;
        register_alice(&router).await;

        let account = ctx.accounts.find_by_username("alice").await.unwrap().unwrap();
        let token = ctx.tokens.issue(&account, TokenPurpose::Activate).unwrap();
        let uid = encode_uid(account.id);

        let response = router
            .clone()
            .oneshot(get(&format!("/activate/{}/{}", uid, token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?notice=activated");

        let account = ctx.accounts.find_by_id(account.id).await.unwrap().unwrap();
        assert!(account.active);

        // The flipped active flag invalidates the token; the account simply
        // stays active
        let response = router
            .oneshot(get(&format!("/activate/{}/{}", uid, token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let account = ctx.accounts.find_by_id(account.id).await.unwrap().unwrap();
        assert!(account.active);
    }

    #[tokio::test]
    async fn test_activation_with_bad_link_fails() {
        let (router, ctx) = app().await;
        register_alice(&router).await;

        // Undecodable uid
        let response = router
            .clone()
            .oneshot(get("/activate/%21%21%21/whatever"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("invalid or has expired"));

        // Valid uid, garbage token
        let account = ctx.accounts.find_by_username("alice").await.unwrap().unwrap();
        let response = router
            .oneshot(get(&format!("/activate/{}/garbage", encode_uid(account.id))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let account = ctx.accounts.find_by_id(account.id).await.unwrap().unwrap();
        assert!(!account.active);
    }

    #[tokio::test]
    async fn test_login_and_logout() {
        let (router, ctx) = app().await;
        register_alice(&router).await;

        let account = ctx.accounts.find_by_username("alice").await.unwrap().unwrap();
        ctx.accounts.activate(account.id).await.unwrap();

        let response = router
            .clone()
            .oneshot(form_post("/login", "username=alice&password=secret1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with(SESSION_COOKIE));
        assert!(cookie.contains("HttpOnly"));

        let session_pair = cookie.split(';').next().unwrap().to_string();

        // Home page reflects the session
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::GET)
                    .uri("/")
                    .header(header::COOKIE, &session_pair)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert!(body_string(response).await.contains("Welcome, alice"));

        // last_login was recorded
        let account = ctx.accounts.find_by_id(account.id).await.unwrap().unwrap();
        assert!(account.last_login.is_some());

        // Logout destroys the session
        let response = router
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/logout")
                    .header(header::COOKIE, &session_pair)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?notice=logged-out");

        let token = session_pair.split('=').nth(1).unwrap();
        assert!(ctx.accounts.find_session(token).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (router, ctx) = app().await;
        register_alice(&router).await;

        // Inactive account, correct password
        let response = router
            .clone()
            .oneshot(form_post("/login", "username=alice&password=secret1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let inactive_body = body_string(response).await;
        assert!(inactive_body.contains("Invalid login"));

        // Active account, wrong password
        let account = ctx.accounts.find_by_username("alice").await.unwrap().unwrap();
        ctx.accounts.activate(account.id).await.unwrap();

        let response = router
            .oneshot(form_post("/login", "username=alice&password=wrong00"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let wrong_password_body = body_string(response).await;

        assert_eq!(inactive_body, wrong_password_body);
    }

    #[tokio::test]
    async fn test_login_requires_fields() {
        let (router, _ctx) = app().await;

        let response = router
            .oneshot(form_post("/login", "username=&password="))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_string(response).await;
        assert!(body.contains("Username is required"));
        assert!(body.contains("Password is required"));
        assert!(!body.contains("Invalid login"));
    }

    #[tokio::test]
    async fn test_reset_request_does_not_reveal_accounts() {
        let (router, _ctx) = app().await;
        register_alice(&router).await;

        let known = router
            .clone()
            .oneshot(form_post("/request-reset-email", "email=a%40x.com"))
            .await
            .unwrap();
        assert_eq!(known.status(), StatusCode::OK);
        let known_body = body_string(known).await;

        let unknown = router
            .oneshot(form_post("/request-reset-email", "email=nobody%40x.com"))
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::OK);
        let unknown_body = body_string(unknown).await;

        assert_eq!(known_body, unknown_body);
        assert!(known_body.contains("We have sent you an email"));
    }

    #[tokio::test]
    async fn test_reset_request_rejects_malformed_email() {
        let (router, _ctx) = app().await;

        let response = router
            .oneshot(form_post("/request-reset-email", "email=not-an-email"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("Please enter a valid email"));
    }

    #[tokio::test]
    async fn test_set_new_password_flow() {
        let (router, ctx) = app().await;
        register_alice(&router).await;

        let account = ctx.accounts.find_by_username("alice").await.unwrap().unwrap();
        ctx.accounts.activate(account.id).await.unwrap();
        let account = ctx.accounts.find_by_id(account.id).await.unwrap().unwrap();

        let token = ctx.tokens.issue(&account, TokenPurpose::ResetPassword).unwrap();
        let uid = encode_uid(account.id);
        let uri = format!("/set-new-password/{}/{}", uid, token);

        // Form renders for a valid link
        let response = router.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // Short password is rejected before the store is touched
        let response = router
            .clone()
            .oneshot(form_post(&uri, "password=abc&password2=abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("at least 6 characters"));
        assert!(ctx.accounts.authenticate("alice", "secret1").await.unwrap().is_some());

        // Mismatched confirmation likewise
        let response = router
            .clone()
            .oneshot(form_post(&uri, "password=newsecret&password2=different"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(body_string(response).await.contains("Passwords do not match"));
        assert!(ctx.accounts.authenticate("alice", "secret1").await.unwrap().is_some());

        // Valid submission replaces the password
        let response = router
            .clone()
            .oneshot(form_post(&uri, "password=newsecret&password2=newsecret"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?notice=password-reset");

        assert!(ctx.accounts.authenticate("alice", "secret1").await.unwrap().is_none());
        assert!(ctx.accounts.authenticate("alice", "newsecret").await.unwrap().is_some());

        // The changed hash invalidates the token, so the link is single-use
        let response = router
            .oneshot(form_post(&uri, "password=another1&password2=another1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(ctx.accounts.authenticate("alice", "newsecret").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_set_new_password_rejects_bad_link() {
        let (router, _ctx) = app().await;

        let response = router
            .clone()
            .oneshot(get("/set-new-password/%21%21%21/whatever"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("request a new one"));

        let response = router
            .oneshot(form_post(
                "/set-new-password/bogus/whatever",
                "password=newsecret&password2=newsecret",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_login_invalidates_outstanding_reset_token() {
        let (router, ctx) = app().await;
        register_alice(&router).await;

        let account = ctx.accounts.find_by_username("alice").await.unwrap().unwrap();
        ctx.accounts.activate(account.id).await.unwrap();
        let account = ctx.accounts.find_by_id(account.id).await.unwrap().unwrap();

        let token = ctx.tokens.issue(&account, TokenPurpose::ResetPassword).unwrap();
        let uri = format!("/set-new-password/{}/{}", encode_uid(account.id), token);

        // Logging in moves last_login, which is part of the token fingerprint
        let response = router
            .clone()
            .oneshot(form_post("/login", "username=alice&password=secret1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let response = router
            .oneshot(form_post(&uri, "password=newsecret&password2=newsecret"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_end_to_end_lifecycle() {
        let (router, ctx) = app().await;

        // register("a@x.com", "alice", "Alice", "secret1", "secret1")
        register_alice(&router).await;
        let account = ctx.accounts.find_by_username("alice").await.unwrap().unwrap();
        assert!(!account.active);

        // activate with the correct token
        let token = ctx.tokens.issue(&account, TokenPurpose::Activate).unwrap();
        let response = router
            .clone()
            .oneshot(get(&format!("/activate/{}/{}", encode_uid(account.id), token)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert!(ctx.accounts.find_by_id(account.id).await.unwrap().unwrap().active);

        // login("alice", "secret1") establishes a session
        let response = router
            .oneshot(form_post("/login", "username=alice&password=secret1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        let token = cookie
            .split(';')
            .next()
            .unwrap()
            .split('=')
            .nth(1)
            .unwrap();
        let (_session, account) = ctx.accounts.find_session(token).await.unwrap().unwrap();
        assert_eq!(account.username, "alice");
    }
}
