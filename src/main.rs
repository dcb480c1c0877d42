use std::{process, sync::Arc};

use folio::{
    application::error::AppError,
    application::{
        contacts::{ConfirmationMailer, ContactStore},
        newsletter::{NewsletterService, confirmation_url},
        sitemap::{SeoSettings, SitemapService},
        social_image::SocialImageService,
        token::TokenSigner,
    },
    config,
    domain::newsletter::{AudienceId, SubscriberEmail},
    infra::{
        content::DirectoryContentIndex,
        error::InfraError,
        http::{self, HttpState, NewsletterPages},
        og_image::{FontSet, ResvgRenderer},
        resend::ResendClient,
        telemetry,
    },
};
use time::OffsetDateTime;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::ConfirmLink(args) => run_confirm_link(&settings, &args),
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let state = build_http_state(&settings).await?;
    serve_http(&settings, state).await
}

fn run_confirm_link(
    settings: &config::Settings,
    args: &config::ConfirmLinkArgs,
) -> Result<(), AppError> {
    let signer = build_token_signer(&settings.newsletter)?;
    let email = SubscriberEmail::parse(&args.email)?;
    let token = signer
        .sign(email.as_str(), OffsetDateTime::now_utc())
        .map_err(|err| AppError::unexpected(format!("failed to sign token: {err}")))?;
    println!("{}", confirmation_url(&settings.site.public_url, &token));
    Ok(())
}

fn build_token_signer(newsletter: &config::NewsletterSettings) -> Result<TokenSigner, AppError> {
    let secret = newsletter
        .signing_secret
        .as_ref()
        .ok_or_else(|| AppError::validation("newsletter.signing_secret is not configured"))?;
    let ttl_secs = i64::try_from(newsletter.token_ttl.get())
        .map_err(|_| AppError::validation("newsletter.token_ttl_seconds is too large"))?;

    TokenSigner::new(secret.as_bytes(), time::Duration::seconds(ttl_secs))
        .map_err(|err| AppError::validation(format!("invalid newsletter signing settings: {err}")))
}

async fn build_http_state(settings: &config::Settings) -> Result<HttpState, AppError> {
    let newsletter = &settings.newsletter;

    let signer = build_token_signer(newsletter)?;
    let api_key = newsletter
        .api_key
        .as_ref()
        .ok_or_else(|| AppError::validation("newsletter.api_key is not configured"))?;
    let audience_id = newsletter
        .audience_id
        .as_ref()
        .ok_or_else(|| AppError::validation("newsletter.audience_id is not configured"))?;
    let audience = AudienceId::new(audience_id.clone())?;
    let from_address = newsletter
        .from_address
        .clone()
        .unwrap_or_else(|| format!("{} <newsletter@{}>", settings.site.name, mail_domain(settings)));

    let resend = Arc::new(ResendClient::new(
        newsletter.api_base_url.clone(),
        api_key.clone(),
        from_address,
        newsletter.request_timeout,
    )?);
    let contacts: Arc<dyn ContactStore> = resend.clone();
    let mailer: Arc<dyn ConfirmationMailer> = resend;

    let newsletter_service = Arc::new(NewsletterService::new(
        signer,
        contacts,
        mailer,
        audience,
        settings.site.public_url.clone(),
        settings.site.name.clone(),
    ));

    let social = &settings.social_image;
    let fonts = FontSet::load(
        social.font_family.clone(),
        &social.regular_font,
        &social.bold_font,
    )
    .await
    .map_err(|err| {
        AppError::from(InfraError::configuration(format!(
            "failed to read social image fonts: {err}"
        )))
    })?;
    let social_image_service = Arc::new(SocialImageService::new(
        Arc::new(ResvgRenderer::new(fonts)),
        settings.site.origin_label(),
    ));

    let content = Arc::new(DirectoryContentIndex::new(
        settings.content.directory.clone(),
    ));
    let sitemap_service = Arc::new(SitemapService::new(
        content,
        SeoSettings {
            public_url: settings.site.public_url.to_string(),
            static_paths: settings.site.static_paths.clone(),
            disallow: settings.site.disallow.clone(),
        },
    ));

    Ok(HttpState {
        newsletter: newsletter_service,
        social_image: social_image_service,
        sitemap: sitemap_service,
        pages: NewsletterPages {
            confirmed_path: newsletter.confirmed_path.clone(),
            pending_path: newsletter.pending_path.clone(),
        },
    })
}

fn mail_domain(settings: &config::Settings) -> String {
    settings
        .site
        .public_url
        .host_str()
        .unwrap_or("localhost")
        .to_string()
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "folio::serve",
        addr = %settings.server.addr,
        public_url = %settings.site.public_url,
        "listening"
    );

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(target = "folio::serve", "shutdown signal received");
}
