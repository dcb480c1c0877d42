//! Sitemap service for sitemap.xml and robots.txt generation.
//!
//! Static routes come from configuration; articles come from the content
//! index so a new post shows up without touching the server.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use url::Url;

use crate::util::markup::escape_markup;

pub const ARTICLE_PREFIX: &str = "/blog";

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("failed to read content directory: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("failed to list articles: {0}")]
    Content(#[from] ContentError),
}

/// An article known to the site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    pub slug: String,
    pub updated_at: Option<OffsetDateTime>,
}

#[async_trait]
pub trait ContentIndex: Send + Sync {
    async fn list_entries(&self) -> Result<Vec<ContentEntry>, ContentError>;
}

#[derive(Debug, Clone)]
pub struct SeoSettings {
    pub public_url: String,
    pub static_paths: Vec<String>,
    pub disallow: Vec<String>,
}

/// Service for generating sitemap.xml and robots.txt.
#[derive(Clone)]
pub struct SitemapService {
    content: Arc<dyn ContentIndex>,
    settings: SeoSettings,
}

impl SitemapService {
    pub fn new(content: Arc<dyn ContentIndex>, settings: SeoSettings) -> Self {
        Self { content, settings }
    }

    /// Generate sitemap.xml content.
    pub async fn sitemap_xml(&self) -> Result<String, SitemapError> {
        let base = normalize_public_site_url(&self.settings.public_url);
        let mut entries = Vec::new();

        for path in &self.settings.static_paths {
            entries.push(sitemap_entry(&base, path, None));
        }

        for article in self.content.list_entries().await? {
            let loc = article_url(&base, &article.slug);
            entries.push(url_element(&loc, article.updated_at));
        }

        let mut xml = String::from(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
        );
        for entry in entries {
            xml.push_str(&entry);
        }
        xml.push_str("</urlset>\n");
        Ok(xml)
    }

    /// Generate robots.txt content.
    pub fn robots_txt(&self) -> String {
        let base = normalize_public_site_url(&self.settings.public_url);
        let mut body = String::from("User-agent: *\nAllow: /\n");
        for prefix in &self.settings.disallow {
            body.push_str(&format!("Disallow: {prefix}\n"));
        }
        body.push_str(&format!("Sitemap: {base}sitemap.xml\n"));
        body
    }
}

fn normalize_public_site_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    format!("{trimmed}/")
}

fn sitemap_entry(base: &str, path: &str, lastmod: Option<OffsetDateTime>) -> String {
    url_element(&canonical_url(base, path), lastmod)
}

fn url_element(loc: &str, lastmod: Option<OffsetDateTime>) -> String {
    let loc = escape_markup(loc);
    let lastmod_str = lastmod
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_default();
    if lastmod_str.is_empty() {
        format!("  <url><loc>{loc}</loc></url>\n")
    } else {
        format!("  <url><loc>{loc}</loc><lastmod>{lastmod_str}</lastmod></url>\n")
    }
}

fn canonical_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    if path == "/" || path.is_empty() {
        base.to_string()
    } else if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

/// Absolute article URL with the slug percent-encoded as one path segment.
fn article_url(base: &str, slug: &str) -> String {
    let prefix = ARTICLE_PREFIX.trim_start_matches('/');
    match Url::parse(base) {
        Ok(mut url) => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().push(prefix).push(slug);
            }
            url.into()
        }
        Err(_) => canonical_url(base, &format!("{ARTICLE_PREFIX}/{slug}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    struct FixedIndex(Vec<ContentEntry>);

    #[async_trait]
    impl ContentIndex for FixedIndex {
        async fn list_entries(&self) -> Result<Vec<ContentEntry>, ContentError> {
            Ok(self.0.clone())
        }
    }

    fn service(entries: Vec<ContentEntry>) -> SitemapService {
        SitemapService::new(
            Arc::new(FixedIndex(entries)),
            SeoSettings {
                public_url: "https://blog.example.com/".to_string(),
                static_paths: vec!["/".to_string(), "/about".to_string()],
                disallow: vec!["/newsletter/confirm".to_string()],
            },
        )
    }

    #[tokio::test]
    async fn sitemap_lists_static_paths_and_articles() {
        let xml = service(vec![ContentEntry {
            slug: "rust-&-friends".to_string(),
            updated_at: Some(datetime!(2024-03-01 08:30 UTC)),
        }])
        .sitemap_xml()
        .await
        .expect("sitemap");

        assert!(xml.contains("<url><loc>https://blog.example.com</loc></url>"));
        assert!(xml.contains("<url><loc>https://blog.example.com/about</loc></url>"));
        assert!(xml.contains(
            "<url><loc>https://blog.example.com/blog/rust-&amp;-friends</loc><lastmod>2024-03-01T08:30:00Z</lastmod></url>"
        ));
        assert!(xml.ends_with("</urlset>\n"));
    }

    #[test]
    fn robots_points_at_sitemap() {
        insta::assert_snapshot!(service(Vec::new()).robots_txt(), @r"
        User-agent: *
        Allow: /
        Disallow: /newsletter/confirm
        Sitemap: https://blog.example.com/sitemap.xml
        ");
    }

    #[test]
    fn article_slugs_are_percent_encoded() {
        assert_eq!(
            article_url("https://blog.example.com/", "my post"),
            "https://blog.example.com/blog/my%20post"
        );
        assert_eq!(
            article_url("https://blog.example.com/", "why?#1"),
            "https://blog.example.com/blog/why%3F%231"
        );
        assert_eq!(
            article_url("https://example.com/site/", "a/b"),
            "https://example.com/site/blog/a%2Fb"
        );
    }

    #[test]
    fn canonical_url_joins_relative_paths() {
        assert_eq!(canonical_url("https://a.io/", "b"), "https://a.io/b");
        assert_eq!(canonical_url("https://a.io/", "/"), "https://a.io");
    }
}
