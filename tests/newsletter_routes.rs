mod support;

use axum::{
    body::Body,
    http::{Request, StatusCode, header::CONTENT_TYPE},
};
use time::OffsetDateTime;
use url::Url;

use support::{Failure, FakeContacts, FakeMailer, get, harness, send, signer};

fn confirm_uri(email: &str) -> String {
    let token = signer()
        .sign(email, OffsetDateTime::now_utc())
        .expect("sign token");
    format!("/newsletter/confirm?token={token}")
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let h = harness(FakeContacts::empty(), FakeMailer::default());

    let response = get(&h.router, "/newsletter/confirm").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "no token provided");

    let response = get(&h.router, "/newsletter/confirm?token=").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "no token provided");

    assert_eq!(*h.contacts.get_calls.lock().await, 0);
}

#[tokio::test]
async fn unverifiable_token_is_rejected() {
    let h = harness(FakeContacts::empty(), FakeMailer::default());

    let response = get(&h.router, "/newsletter/confirm?token=not-a-token").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "wrong token");
    assert_eq!(*h.contacts.get_calls.lock().await, 0);
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let h = harness(FakeContacts::empty(), FakeMailer::default());
    let issued = OffsetDateTime::now_utc() - time::Duration::days(2);
    let token = signer()
        .sign("reader@example.com", issued)
        .expect("sign token");

    let response = get(&h.router, &format!("/newsletter/confirm?token={token}")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "wrong token");
}

#[tokio::test]
async fn new_address_is_created_once_and_redirected() {
    let h = harness(FakeContacts::empty(), FakeMailer::default());

    let response = get(&h.router, &confirm_uri("reader@example.com")).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/newsletter/confirmed"));

    let created = h.contacts.created.lock().await;
    assert_eq!(created.as_slice(), ["reader@example.com"]);
}

#[tokio::test]
async fn known_address_is_not_created_again() {
    let h = harness(
        FakeContacts::with(&["reader@example.com"], Failure::None),
        FakeMailer::default(),
    );

    let response = get(&h.router, &confirm_uri("reader@example.com")).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(
        response.location(),
        Some("/newsletter/confirmed?alreadySubscribed=true")
    );
    assert!(h.contacts.created.lock().await.is_empty());
    assert_eq!(*h.contacts.get_calls.lock().await, 1);
}

#[tokio::test]
async fn confirming_twice_reports_already_subscribed() {
    let h = harness(FakeContacts::empty(), FakeMailer::default());
    let uri = confirm_uri("reader@example.com");

    let first = get(&h.router, &uri).await;
    assert_eq!(first.location(), Some("/newsletter/confirmed"));

    let second = get(&h.router, &uri).await;
    assert_eq!(
        second.location(),
        Some("/newsletter/confirmed?alreadySubscribed=true")
    );
    assert_eq!(h.contacts.created.lock().await.len(), 1);
}

#[tokio::test]
async fn lookup_failure_answers_generic_error() {
    let h = harness(
        FakeContacts::with(&[], Failure::Lookup),
        FakeMailer::default(),
    );

    let response = get(&h.router, &confirm_uri("reader@example.com")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "error verifying token");
    assert!(h.contacts.created.lock().await.is_empty());
}

#[tokio::test]
async fn create_failure_answers_generic_error() {
    let h = harness(
        FakeContacts::with(&[], Failure::Create),
        FakeMailer::default(),
    );

    let response = get(&h.router, &confirm_uri("reader@example.com")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "error verifying token");
    assert!(!response.text().contains("quota"));
}

fn subscribe_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/newsletter/subscribe")
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn subscribe_sends_link_that_confirms_the_address() {
    let h = harness(FakeContacts::empty(), FakeMailer::default());

    let response = send(&h.router, subscribe_request("email=Reader%40Example.COM")).await;
    assert_eq!(response.status, StatusCode::SEE_OTHER);
    assert_eq!(response.location(), Some("/newsletter/pending"));

    let sent = h.mailer.sent.lock().await;
    assert_eq!(sent.len(), 1);
    let email = &sent[0];
    assert_eq!(email.to.as_str(), "Reader@example.com");

    let link = email
        .text
        .lines()
        .find(|line| line.starts_with("https://"))
        .expect("link in text body");
    assert!(email.html.contains("/newsletter/confirm?token="));

    let link = Url::parse(link).expect("absolute link");
    assert_eq!(link.path(), "/newsletter/confirm");
    let token = link
        .query_pairs()
        .find(|(key, _)| key == "token")
        .map(|(_, value)| value.into_owned())
        .expect("token parameter");
    assert_eq!(
        signer().verify(&token, OffsetDateTime::now_utc()).as_deref(),
        Some("Reader@example.com")
    );
    drop(sent);

    let confirmed = get(&h.router, &format!("{}?{}", link.path(), link.query().unwrap_or(""))).await;
    assert_eq!(confirmed.location(), Some("/newsletter/confirmed"));
}

#[tokio::test]
async fn subscribe_rejects_invalid_address() {
    let h = harness(FakeContacts::empty(), FakeMailer::default());

    let response = send(&h.router, subscribe_request("email=not-an-address")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.text(), "invalid email address");
    assert!(h.mailer.sent.lock().await.is_empty());

    let response = send(&h.router, subscribe_request("")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn subscribe_reports_mail_failures() {
    let h = harness(FakeContacts::empty(), FakeMailer::failing());

    let response = send(&h.router, subscribe_request("email=reader%40example.com")).await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.text(), "error sending confirmation email");
}

#[tokio::test]
async fn health_check_answers_no_content() {
    let h = harness(FakeContacts::empty(), FakeMailer::default());
    let response = get(&h.router, "/_health").await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let request_id = response
        .headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .expect("request id header");
    assert_eq!(request_id.len(), 36);
}
