use std::sync::Arc;

use axum::{
    Form, Router,
    body::Body,
    extract::{Query, State},
    http::{
        HeaderValue, StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    middleware,
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use bytes::Bytes;
use serde::Deserialize;

use crate::application::{
    error::HttpError,
    newsletter::{CONFIRM_PATH, ConfirmOutcome, NewsletterService},
    sitemap::SitemapService,
    social_image::SocialImageService,
};

use super::middleware::{log_responses, set_request_context};

pub const SUBSCRIBE_PATH: &str = "/newsletter/subscribe";
pub const SOCIAL_IMAGE_PATH: &str = "/og";

/// Where the browser lands after each newsletter step.
#[derive(Debug, Clone)]
pub struct NewsletterPages {
    pub confirmed_path: String,
    pub pending_path: String,
}

#[derive(Clone)]
pub struct HttpState {
    pub newsletter: Arc<NewsletterService>,
    pub social_image: Arc<SocialImageService>,
    pub sitemap: Arc<SitemapService>,
    pub pages: NewsletterPages,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route(CONFIRM_PATH, get(confirm_subscription))
        .route(SUBSCRIBE_PATH, post(subscribe))
        .route(SOCIAL_IMAGE_PATH, get(social_image))
        .route("/sitemap.xml", get(sitemap))
        .route("/robots.txt", get(robots_txt))
        .route("/_health", get(health))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfirmQuery {
    token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SubscribeForm {
    email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SocialImageQuery {
    title: Option<String>,
    description: Option<String>,
}

async fn confirm_subscription(
    State(state): State<HttpState>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Redirect, HttpError> {
    let outcome = state.newsletter.confirm(query.token.as_deref()).await?;
    let target = match outcome {
        ConfirmOutcome::Confirmed => state.pages.confirmed_path.clone(),
        ConfirmOutcome::AlreadySubscribed => {
            format!("{}?alreadySubscribed=true", state.pages.confirmed_path)
        }
    };
    Ok(Redirect::to(&target))
}

async fn subscribe(
    State(state): State<HttpState>,
    Form(form): Form<SubscribeForm>,
) -> Result<Redirect, HttpError> {
    state.newsletter.subscribe(&form.email).await?;
    Ok(Redirect::to(&state.pages.pending_path))
}

async fn social_image(
    State(state): State<HttpState>,
    Query(query): Query<SocialImageQuery>,
) -> Result<Response, HttpError> {
    let png = state
        .social_image
        .render(query.title.as_deref(), query.description.as_deref())
        .await?;
    Ok(png_response(png))
}

async fn sitemap(State(state): State<HttpState>) -> Result<Response, HttpError> {
    let body = state.sitemap.sitemap_xml().await?;
    Ok(text_response(body, "application/xml"))
}

async fn robots_txt(State(state): State<HttpState>) -> Response {
    text_response(state.sitemap.robots_txt(), "text/plain; charset=utf-8")
}

async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn png_response(png: Bytes) -> Response {
    let mut response = Response::new(Body::from(png));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );
    response
}

fn text_response(body: String, content_type: &str) -> Response {
    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .body(Body::from(body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
