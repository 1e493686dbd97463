//! Signed-link unsubscribe.
//!
//! ## Endpoints
//!
//! - POST /unsubscribe?token=... - One-click (RFC 8058). Mail clients post
//!   `List-Unsubscribe=One-Click` as a form body; success is 204 with no body.
//! - GET /unsubscribe?token=... - Recipient clicked the link. Success redirects
//!   to the configured confirmation page, or renders one inline.
//!
//! Both verify the token before anything is written. A bad token gets 400 and
//! a short reason. Once the token is good the request succeeds even if the
//! suppression write fails (see `stores::record_suppression`). Every response
//! is marked `Cache-Control: no-store`.

use axum::{
    Form, Router, debug_handler,
    extract::{
        Query, State,
        rejection::{FormRejection, QueryRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::{
    error::AppError,
    models::Source,
    state::AppState,
    stores::record_suppression,
    token::{Claim, VerifyError},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(browser_unsubscribe).post(one_click_unsubscribe))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}

#[derive(Debug, Default, Deserialize)]
struct TokenParams {
    token: Option<String>,
}

/// An unparsable query string (e.g. a repeated `token`) is a bad token.
fn token_params(
    query: Result<Query<TokenParams>, QueryRejection>,
) -> Result<TokenParams, AppError> {
    query
        .map(|Query(params)| params)
        .map_err(|_| AppError::rejected(VerifyError::MalformedToken))
}

/// Verify the token, then record the suppression under `source`.
async fn unsubscribe(
    state: &AppState,
    token: Option<&str>,
    source: Source,
) -> Result<Claim, AppError> {
    let claim = state
        .verifier
        .verify(token.unwrap_or_default(), Utc::now())
        .map_err(AppError::rejected)?;

    record_suppression(state.stores.suppressions.as_ref(), &claim.email, source).await;

    tracing::info!(
        email = %mask_email(&claim.email),
        source = source.as_str(),
        exp = claim.exp,
        "unsubscribed"
    );

    Ok(claim)
}

#[debug_handler]
async fn one_click_unsubscribe(
    State(state): State<AppState>,
    query: Result<Query<TokenParams>, QueryRejection>,
    form: Result<Form<TokenParams>, FormRejection>,
) -> Result<impl IntoResponse, AppError> {
    // Query string wins; the body is a fallback for clients that post the token.
    let token = token_params(query)?
        .token
        .or_else(|| form.ok().and_then(|Form(body)| body.token));

    unsubscribe(&state, token.as_deref(), Source::OneClick).await?;

    Ok(StatusCode::NO_CONTENT)
}

#[debug_handler]
async fn browser_unsubscribe(
    State(state): State<AppState>,
    query: Result<Query<TokenParams>, QueryRejection>,
) -> Result<Response, AppError> {
    let params = token_params(query)?;
    let claim = unsubscribe(&state, params.token.as_deref(), Source::Web).await?;
    let masked = mask_email(&claim.email);

    match &state.redirect {
        Some(target) => {
            let mut url = target.clone();
            url.query_pairs_mut().append_pair("email", &masked);
            Ok(Redirect::to(url.as_str()).into_response())
        }
        None => Ok(Html(confirmation_page(&masked)).into_response()),
    }
}

/// Hide most of the local part for display: `jane@x.org` → `ja***@x.org`.
/// Input without `@` is returned unchanged.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return email.to_string();
    };
    let keep = if local.chars().count() <= 2 { 1 } else { 2 };
    let visible: String = local.chars().take(keep).collect();
    format!("{}***@{}", visible, domain)
}

fn confirmation_page(masked_email: &str) -> String {
    format!(
        r#"<!doctype html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<meta name="robots" content="noindex">
<title>Unsubscribed</title>
</head>
<body>
<main>
<h1>You have been unsubscribed</h1>
<p><strong>{}</strong> will no longer receive these emails.</p>
</main>
</body>
</html>
"#,
        escape_html(masked_email)
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}
