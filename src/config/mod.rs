//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroU64,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folio";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PUBLIC_URL: &str = "http://localhost:3000";
const DEFAULT_SITE_NAME: &str = "folio";
const DEFAULT_STATIC_PATHS: [&str; 4] = ["/", "/blog", "/about", "/newsletter"];
const DEFAULT_DISALLOW: [&str; 1] = ["/newsletter/confirm"];
const DEFAULT_RESEND_API_BASE: &str = crate::infra::resend::DEFAULT_API_BASE;
const DEFAULT_TOKEN_TTL_SECS: u64 = 24 * 60 * 60;
const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CONFIRMED_PATH: &str = "/newsletter/confirmed";
const DEFAULT_PENDING_PATH: &str = "/newsletter/pending";
const DEFAULT_FONT_FAMILY: &str = "DejaVu Sans";
const DEFAULT_REGULAR_FONT: &str = "assets/fonts/DejaVuSans.ttf";
const DEFAULT_BOLD_FONT: &str = "assets/fonts/DejaVuSans-Bold.ttf";
const DEFAULT_CONTENT_DIR: &str = "content/blog";

/// Command-line arguments for the folio binary.
#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Blog resource routes server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Print a newsletter confirmation link for an address without sending mail.
    #[command(name = "confirm-link")]
    ConfirmLink(ConfirmLinkArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the public site URL used in links, sitemaps and images.
    #[arg(long = "public-url", value_name = "URL")]
    pub public_url: Option<String>,

    /// Override the directory scanned for articles.
    #[arg(long = "content-directory", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub content_directory: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ConfirmLinkArgs {
    /// Override the public site URL the link points at.
    #[arg(long = "public-url", value_name = "URL")]
    pub public_url: Option<String>,

    /// Address the link confirms.
    #[arg(value_name = "EMAIL")]
    pub email: String,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub site: SiteSettings,
    pub newsletter: NewsletterSettings,
    pub social_image: SocialImageSettings,
    pub content: ContentSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct SiteSettings {
    pub public_url: Url,
    pub name: String,
    pub static_paths: Vec<String>,
    pub disallow: Vec<String>,
}

impl SiteSettings {
    /// Host (and non-default port) shown on social cards.
    pub fn origin_label(&self) -> String {
        match (self.public_url.host_str(), self.public_url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => self.public_url.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct NewsletterSettings {
    pub audience_id: Option<String>,
    pub api_key: Option<String>,
    pub signing_secret: Option<String>,
    pub from_address: Option<String>,
    pub api_base_url: Url,
    pub token_ttl: NonZeroU64,
    pub request_timeout: Duration,
    pub confirmed_path: String,
    pub pending_path: String,
}

impl std::fmt::Debug for NewsletterSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NewsletterSettings")
            .field("audience_id", &self.audience_id)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field(
                "signing_secret",
                &self.signing_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("from_address", &self.from_address)
            .field("api_base_url", &self.api_base_url.as_str())
            .field("token_ttl", &self.token_ttl)
            .field("request_timeout", &self.request_timeout)
            .field("confirmed_path", &self.confirmed_path)
            .field("pending_path", &self.pending_path)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SocialImageSettings {
    pub font_family: String,
    pub regular_font: PathBuf,
    pub bold_font: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub directory: PathBuf,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("FOLIO")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("site.static_paths")
            .with_list_parse_key("site.disallow")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::ConfirmLink(args)) => {
            if let Some(url) = args.public_url.as_ref() {
                raw.site.public_url = Some(url.clone());
            }
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    site: RawSiteSettings,
    newsletter: RawNewsletterSettings,
    social_image: RawSocialImageSettings,
    content: RawContentSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.public_url.as_ref() {
            self.site.public_url = Some(url.clone());
        }
        if let Some(directory) = overrides.content_directory.as_ref() {
            self.content.directory = Some(directory.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            site,
            newsletter,
            social_image,
            content,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            site: build_site_settings(site)?,
            newsletter: build_newsletter_settings(newsletter)?,
            social_image: build_social_image_settings(social_image)?,
            content: build_content_settings(content)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_site_settings(site: RawSiteSettings) -> Result<SiteSettings, LoadError> {
    let public_url = parse_http_url(
        site.public_url.as_deref().unwrap_or(DEFAULT_PUBLIC_URL),
        "site.public_url",
    )?;

    let name = non_blank(site.name).unwrap_or_else(|| DEFAULT_SITE_NAME.to_string());

    let static_paths = site
        .static_paths
        .unwrap_or_else(|| DEFAULT_STATIC_PATHS.map(String::from).to_vec());
    for path in &static_paths {
        validate_path(path, "site.static_paths")?;
    }

    let disallow = site
        .disallow
        .unwrap_or_else(|| DEFAULT_DISALLOW.map(String::from).to_vec());
    for path in &disallow {
        validate_path(path, "site.disallow")?;
    }

    Ok(SiteSettings {
        public_url,
        name,
        static_paths,
        disallow,
    })
}

fn build_newsletter_settings(
    newsletter: RawNewsletterSettings,
) -> Result<NewsletterSettings, LoadError> {
    let api_base_url = parse_http_url(
        newsletter
            .api_base_url
            .as_deref()
            .unwrap_or(DEFAULT_RESEND_API_BASE),
        "newsletter.api_base_url",
    )?;

    let token_ttl = NonZeroU64::new(
        newsletter
            .token_ttl_seconds
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS),
    )
    .ok_or_else(|| LoadError::invalid("newsletter.token_ttl_seconds", "must be greater than zero"))?;
    if token_ttl.get() > MAX_TOKEN_TTL_SECS {
        return Err(LoadError::invalid(
            "newsletter.token_ttl_seconds",
            format!("must be at most {MAX_TOKEN_TTL_SECS} (365 days)"),
        ));
    }

    let timeout_secs = newsletter
        .request_timeout_seconds
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "newsletter.request_timeout_seconds",
            "must be greater than zero",
        ));
    }

    let confirmed_path = newsletter
        .confirmed_path
        .unwrap_or_else(|| DEFAULT_CONFIRMED_PATH.to_string());
    validate_path(&confirmed_path, "newsletter.confirmed_path")?;
    let pending_path = newsletter
        .pending_path
        .unwrap_or_else(|| DEFAULT_PENDING_PATH.to_string());
    validate_path(&pending_path, "newsletter.pending_path")?;

    Ok(NewsletterSettings {
        audience_id: non_blank(newsletter.audience_id),
        api_key: non_blank(newsletter.api_key),
        signing_secret: non_blank(newsletter.signing_secret),
        from_address: non_blank(newsletter.from_address),
        api_base_url,
        token_ttl,
        request_timeout: Duration::from_secs(timeout_secs),
        confirmed_path,
        pending_path,
    })
}

fn build_social_image_settings(
    social_image: RawSocialImageSettings,
) -> Result<SocialImageSettings, LoadError> {
    let font_family =
        non_blank(social_image.font_family).unwrap_or_else(|| DEFAULT_FONT_FAMILY.to_string());

    let regular_font = social_image
        .regular_font_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REGULAR_FONT));
    if regular_font.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "social_image.regular_font_path",
            "path must not be empty",
        ));
    }

    let bold_font = social_image
        .bold_font_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_BOLD_FONT));
    if bold_font.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "social_image.bold_font_path",
            "path must not be empty",
        ));
    }

    Ok(SocialImageSettings {
        font_family,
        regular_font,
        bold_font,
    })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let directory = content
        .directory
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_DIR));
    if directory.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "content.directory",
            "path must not be empty",
        ));
    }
    Ok(ContentSettings { directory })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSiteSettings {
    public_url: Option<String>,
    name: Option<String>,
    static_paths: Option<Vec<String>>,
    disallow: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawNewsletterSettings {
    audience_id: Option<String>,
    api_key: Option<String>,
    signing_secret: Option<String>,
    from_address: Option<String>,
    api_base_url: Option<String>,
    token_ttl_seconds: Option<u64>,
    request_timeout_seconds: Option<u64>,
    confirmed_path: Option<String>,
    pending_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSocialImageSettings {
    font_family: Option<String>,
    regular_font_path: Option<PathBuf>,
    bold_font_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    directory: Option<PathBuf>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_http_url(raw: &str, key: &'static str) -> Result<Url, LoadError> {
    let url = Url::parse(raw.trim())
        .map_err(|err| LoadError::invalid(key, format!("invalid url `{raw}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(key, "url scheme must be http or https"));
    }
    Ok(url)
}

fn validate_path(path: &str, key: &'static str) -> Result<(), LoadError> {
    if !path.starts_with('/') {
        return Err(LoadError::invalid(
            key,
            format!("`{path}` must start with `/`"),
        ));
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
