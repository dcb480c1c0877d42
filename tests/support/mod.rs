#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{HeaderMap, Request, StatusCode},
};
use bytes::Bytes;
use time::Duration;
use tokio::sync::Mutex;
use tower::ServiceExt;
use url::Url;

use folio::application::contacts::{
    ConfirmationEmail, ConfirmationMailer, ContactStore, ContactStoreError, MailerError,
};
use folio::application::newsletter::NewsletterService;
use folio::application::sitemap::{SeoSettings, SitemapService};
use folio::application::social_image::{ImageRenderer, RenderError, SocialImageService};
use folio::application::token::TokenSigner;
use folio::domain::newsletter::{AudienceId, Contact, SubscriberEmail};
use folio::domain::social::SocialCard;
use folio::infra::content::DirectoryContentIndex;
use folio::infra::http::{HttpState, NewsletterPages, build_router};

pub const SECRET: &[u8] = b"integration-test-signing-secret-0123456789";
pub const PUBLIC_URL: &str = "https://blog.example.com";
pub const AUDIENCE: &str = "aud_test";
pub const FAKE_PNG: &[u8] = b"\x89PNG\r\n\x1a\nfake";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    None,
    Lookup,
    Create,
}

/// Contact store keeping addresses in memory and counting calls.
pub struct FakeContacts {
    existing: Mutex<HashSet<String>>,
    pub get_calls: Mutex<usize>,
    pub created: Mutex<Vec<String>>,
    failure: Failure,
}

impl FakeContacts {
    pub fn empty() -> Self {
        Self::with(&[], Failure::None)
    }

    pub fn with(existing: &[&str], failure: Failure) -> Self {
        Self {
            existing: Mutex::new(existing.iter().map(|e| e.to_string()).collect()),
            get_calls: Mutex::new(0),
            created: Mutex::new(Vec::new()),
            failure,
        }
    }
}

#[async_trait]
impl ContactStore for FakeContacts {
    async fn get(
        &self,
        email: &SubscriberEmail,
        _audience: &AudienceId,
    ) -> Result<Option<Contact>, ContactStoreError> {
        *self.get_calls.lock().await += 1;
        if self.failure == Failure::Lookup {
            return Err(ContactStoreError::Transport(
                "connection reset by provider".to_string(),
            ));
        }
        let existing = self.existing.lock().await;
        Ok(existing.contains(email.as_str()).then(|| Contact {
            id: "c_existing".to_string(),
            email: email.to_string(),
            unsubscribed: false,
        }))
    }

    async fn create(
        &self,
        email: &SubscriberEmail,
        _audience: &AudienceId,
    ) -> Result<Contact, ContactStoreError> {
        self.created.lock().await.push(email.to_string());
        if self.failure == Failure::Create {
            return Err(ContactStoreError::Api {
                status: 422,
                body: "audience quota exceeded".to_string(),
            });
        }
        self.existing.lock().await.insert(email.to_string());
        Ok(Contact {
            id: "c_new".to_string(),
            email: email.to_string(),
            unsubscribed: false,
        })
    }
}

#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<ConfirmationEmail>>,
    fail: bool,
}

impl FakeMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }
}

#[async_trait]
impl ConfirmationMailer for FakeMailer {
    async fn send(&self, email: ConfirmationEmail) -> Result<(), MailerError> {
        if self.fail {
            return Err(MailerError::Api {
                status: 403,
                body: "domain not verified".to_string(),
            });
        }
        self.sent.lock().await.push(email);
        Ok(())
    }
}

/// Renderer recording the cards it was asked to draw.
#[derive(Default)]
pub struct FakeRenderer {
    pub cards: Mutex<Vec<SocialCard>>,
}

#[async_trait]
impl ImageRenderer for FakeRenderer {
    async fn render(&self, card: &SocialCard) -> Result<Bytes, RenderError> {
        self.cards.lock().await.push(card.clone());
        Ok(Bytes::from_static(FAKE_PNG))
    }
}

pub fn signer() -> TokenSigner {
    TokenSigner::new(SECRET, Duration::hours(24)).expect("valid signer")
}

pub struct Harness {
    pub contacts: Arc<FakeContacts>,
    pub mailer: Arc<FakeMailer>,
    pub router: Router,
}

pub fn harness(contacts: FakeContacts, mailer: FakeMailer) -> Harness {
    harness_with_renderer(contacts, mailer, Arc::new(FakeRenderer::default()))
}

pub fn harness_with_renderer(
    contacts: FakeContacts,
    mailer: FakeMailer,
    renderer: Arc<dyn ImageRenderer>,
) -> Harness {
    build(
        contacts,
        mailer,
        renderer,
        Path::new("/nonexistent/folio/content"),
    )
}

pub fn harness_with_content(content_root: &Path) -> Harness {
    build(
        FakeContacts::empty(),
        FakeMailer::default(),
        Arc::new(FakeRenderer::default()),
        content_root,
    )
}

fn build(
    contacts: FakeContacts,
    mailer: FakeMailer,
    renderer: Arc<dyn ImageRenderer>,
    content_root: &Path,
) -> Harness {
    let contacts = Arc::new(contacts);
    let mailer = Arc::new(mailer);

    let newsletter = NewsletterService::new(
        signer(),
        contacts.clone(),
        mailer.clone(),
        AudienceId::new(AUDIENCE).expect("audience"),
        Url::parse(PUBLIC_URL).expect("url"),
        "Example Blog",
    );
    let social_image = SocialImageService::new(renderer, "blog.example.com");
    let sitemap = SitemapService::new(
        Arc::new(DirectoryContentIndex::new(content_root)),
        SeoSettings {
            public_url: PUBLIC_URL.to_string(),
            static_paths: vec!["/".to_string(), "/about".to_string()],
            disallow: vec!["/newsletter/confirm".to_string()],
        },
    );

    let router = build_router(HttpState {
        newsletter: Arc::new(newsletter),
        social_image: Arc::new(social_image),
        sitemap: Arc::new(sitemap),
        pages: NewsletterPages {
            confirmed_path: "/newsletter/confirmed".to_string(),
            pending_path: "/newsletter/pending".to_string(),
        },
    });

    Harness {
        contacts,
        mailer,
        router,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn location(&self) -> Option<&str> {
        self.headers
            .get("location")
            .and_then(|value| value.to_str().ok())
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("router is infallible");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(router: &Router, uri: &str) -> TestResponse {
    let request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request");
    send(router, request).await
}
