//! Rasterizes social preview cards with `resvg`.
//!
//! The card is described as SVG markup and rendered with two font weights
//! supplied as raw font data. Rendering happens on the blocking pool.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use resvg::{tiny_skia, usvg};

use crate::application::social_image::{ImageRenderer, RenderError};
use crate::domain::social::SocialCard;
use crate::util::markup::escape_markup;

pub const CARD_WIDTH: u32 = 1200;
pub const CARD_HEIGHT: u32 = 630;

const TITLE_LINE_CHARS: usize = 26;
const TITLE_MAX_LINES: usize = 3;
const DESCRIPTION_LINE_CHARS: usize = 56;
const DESCRIPTION_MAX_LINES: usize = 4;

/// Raw font files for the regular and bold faces.
#[derive(Clone)]
pub struct FontSet {
    pub family: String,
    pub regular: Arc<[u8]>,
    pub bold: Arc<[u8]>,
}

impl std::fmt::Debug for FontSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontSet")
            .field("family", &self.family)
            .field("regular_bytes", &self.regular.len())
            .field("bold_bytes", &self.bold.len())
            .finish()
    }
}

impl FontSet {
    pub async fn load(
        family: impl Into<String>,
        regular: &Path,
        bold: &Path,
    ) -> Result<Self, std::io::Error> {
        let regular = tokio::fs::read(regular).await?;
        let bold = tokio::fs::read(bold).await?;
        Ok(Self {
            family: family.into(),
            regular: regular.into(),
            bold: bold.into(),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ResvgRenderer {
    fonts: FontSet,
}

impl ResvgRenderer {
    pub fn new(fonts: FontSet) -> Self {
        Self { fonts }
    }
}

#[async_trait]
impl ImageRenderer for ResvgRenderer {
    async fn render(&self, card: &SocialCard) -> Result<Bytes, RenderError> {
        let fonts = self.fonts.clone();
        let markup = card_markup(card, &fonts.family);
        tokio::task::spawn_blocking(move || rasterize(&markup, &fonts))
            .await
            .map_err(|err| RenderError::Task(err.to_string()))?
    }
}

fn rasterize(markup: &str, fonts: &FontSet) -> Result<Bytes, RenderError> {
    let mut options = usvg::Options {
        font_family: fonts.family.clone(),
        ..usvg::Options::default()
    };

    let fontdb = options.fontdb_mut();
    for (weight, data) in [("regular", &fonts.regular), ("bold", &fonts.bold)] {
        let before = fontdb.len();
        fontdb.load_font_data(data.to_vec());
        if fontdb.len() == before {
            return Err(RenderError::Font(format!(
                "{weight} font data contains no usable face"
            )));
        }
    }

    let tree = usvg::Tree::from_str(markup, &options)
        .map_err(|err| RenderError::Markup(err.to_string()))?;

    let mut pixmap =
        tiny_skia::Pixmap::new(CARD_WIDTH, CARD_HEIGHT).ok_or(RenderError::Canvas {
            width: CARD_WIDTH,
            height: CARD_HEIGHT,
        })?;
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map(Bytes::from)
        .map_err(|err| RenderError::Encode(err.to_string()))
}

/// SVG description of the card: origin at the top, title, then description.
pub fn card_markup(card: &SocialCard, family: &str) -> String {
    let family = escape_markup(family);
    let title = text_block(
        card.title(),
        TITLE_LINE_CHARS,
        TITLE_MAX_LINES,
        80,
        230,
        76,
    );
    let description = text_block(
        card.description(),
        DESCRIPTION_LINE_CHARS,
        DESCRIPTION_MAX_LINES,
        80,
        470,
        40,
    );

    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{CARD_WIDTH}" height="{CARD_HEIGHT}" viewBox="0 0 {CARD_WIDTH} {CARD_HEIGHT}">
  <rect width="100%" height="100%" fill="#0f172a"/>
  <rect x="0" y="0" width="16" height="{CARD_HEIGHT}" fill="#38bdf8"/>
  <text x="80" y="110" font-family="{family}" font-weight="400" font-size="32" fill="#94a3b8">{origin}</text>
  <text font-family="{family}" font-weight="700" font-size="64" fill="#f8fafc">{title}</text>
  <text font-family="{family}" font-weight="400" font-size="32" fill="#cbd5e1">{description}</text>
</svg>
"##,
        origin = escape_markup(card.origin()),
    )
}

fn text_block(
    text: &str,
    line_chars: usize,
    max_lines: usize,
    x: u32,
    y: u32,
    line_height: u32,
) -> String {
    wrap_words(text, line_chars, max_lines)
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let line_y = y + line_height * index as u32;
            format!(
                "<tspan x=\"{x}\" y=\"{line_y}\">{}</tspan>",
                escape_markup(line)
            )
        })
        .collect()
}

/// Greedy word wrap by character budget; the last kept line gets an
/// ellipsis when text had to be dropped.
fn wrap_words(text: &str, line_chars: usize, max_lines: usize) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word.to_string();
        // Words longer than a line are hard-split.
        while word.chars().count() > line_chars {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            let split = word
                .char_indices()
                .nth(line_chars)
                .map(|(idx, _)| idx)
                .unwrap_or(word.len());
            lines.push(word[..split].to_string());
            word = word[split..].to_string();
        }

        let separator = usize::from(!current.is_empty());
        let needed = current.chars().count() + separator + word.chars().count();
        if needed > line_chars && !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }
        if !word.is_empty() {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    if lines.len() > max_lines {
        lines.truncate(max_lines);
        if let Some(last) = lines.last_mut() {
            while last.chars().count() + 1 > line_chars {
                last.pop();
            }
            last.push('…');
        }
    }
    lines
}
