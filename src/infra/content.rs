//! Filesystem index of published articles.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::fs;

use crate::application::sitemap::{ContentEntry, ContentError, ContentIndex};

const ARTICLE_EXTENSIONS: [&str; 2] = ["md", "mdx"];

/// Lists `*.md` / `*.mdx` files of one directory as articles.
#[derive(Debug, Clone)]
pub struct DirectoryContentIndex {
    root: PathBuf,
}

impl DirectoryContentIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl ContentIndex for DirectoryContentIndex {
    async fn list_entries(&self) -> Result<Vec<ContentEntry>, ContentError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut entries = Vec::new();
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            let Some(slug) = article_slug(&path) else {
                continue;
            };
            let metadata = item.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let updated_at = metadata.modified().ok().map(OffsetDateTime::from);
            entries.push(ContentEntry { slug, updated_at });
        }

        entries.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(entries)
    }
}

fn article_slug(path: &Path) -> Option<String> {
    let extension = path.extension()?.to_str()?;
    if !ARTICLE_EXTENSIONS.contains(&extension) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || stem.starts_with('_') || stem.starts_with('.') {
        return None;
    }
    Some(stem.to_string())
}
