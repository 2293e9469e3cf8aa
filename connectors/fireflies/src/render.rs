use async_trait::async_trait;
use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_DOCUMENT_PREFIX;
use crate::error::RenderError;
use crate::models::{GeneratedDocument, RenderRequest};

pub const SYSTEM_NAME: &str = "CatNotes";
pub const DEFAULT_TITLE_LABEL: &str = "meeting";
pub const DOCUMENT_EXTENSION: &str = "pdf";

const PAGE_WIDTH_MM: f32 = 210.0;
const PAGE_HEIGHT_MM: f32 = 297.0;
const MARGIN_MM: f32 = 20.0;
const PT_TO_MM: f32 = 0.3528;
const LINE_SPACING: f32 = 1.4;
// Helvetica averages roughly half an em per glyph.
const AVG_GLYPH_EM: f32 = 0.5;

const HEADER_SIZE: f32 = 20.0;
const TITLE_SIZE: f32 = 16.0;
const BODY_SIZE: f32 = 11.0;
const STAMP_SIZE: f32 = 12.0;

const MAX_NAME_SUFFIX: u32 = 1000;

/// Stands in for characters the built-in fonts cannot encode.
pub const UNENCODABLE_PLACEHOLDER: char = '?';

// WinAnsi code points above Latin-1's printable ASCII that are not in 0xA0..=0xFF.
const WINANSI_EXTRAS: [char; 27] = [
    '\u{20AC}', '\u{201A}', '\u{0192}', '\u{201E}', '\u{2026}', '\u{2020}', '\u{2021}',
    '\u{02C6}', '\u{2030}', '\u{0160}', '\u{2039}', '\u{0152}', '\u{017D}', '\u{2018}',
    '\u{2019}', '\u{201C}', '\u{201D}', '\u{2022}', '\u{2013}', '\u{2014}', '\u{02DC}',
    '\u{2122}', '\u{0161}', '\u{203A}', '\u{0153}', '\u{017E}', '\u{0178}',
];

#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    async fn render(&self, request: &RenderRequest) -> Result<GeneratedDocument, RenderError>;
}

/// Writes A4 PDFs into `output_dir`.
#[derive(Debug, Clone)]
pub struct PdfRenderer {
    output_dir: PathBuf,
    prefix: String,
}

impl PdfRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            prefix: DEFAULT_DOCUMENT_PREFIX.to_string(),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

#[async_trait]
impl DocumentRenderer for PdfRenderer {
    async fn render(&self, request: &RenderRequest) -> Result<GeneratedDocument, RenderError> {
        fs::create_dir_all(&self.output_dir).await?;

        let created_at = Utc::now();
        let bytes = build_pdf(request, created_at)?;

        let stem = document_stem(&self.prefix, &request.title, created_at);
        let (path, mut file) = create_unique(&self.output_dir, &stem, DOCUMENT_EXTENSION).await?;

        file.write_all(&bytes).await?;
        file.flush().await?;
        file.sync_all().await?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        info!("Rendered {} ({} bytes)", path.display(), bytes.len());

        Ok(GeneratedDocument {
            path,
            file_name,
            created_at,
        })
    }
}

/// Keeps `[A-Za-z0-9 _-]`, then turns runs of spaces into single hyphens.
pub fn sanitize_title(title: &str) -> String {
    let kept: String = title
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();

    let joined = kept.split_whitespace().collect::<Vec<_>>().join("-");
    if joined.is_empty() {
        DEFAULT_TITLE_LABEL.to_string()
    } else {
        joined
    }
}

pub fn document_stem(prefix: &str, title: &str, at: DateTime<Utc>) -> String {
    format!(
        "{}-{}-{}",
        prefix,
        sanitize_title(title),
        at.format("%Y-%m-%dT%H-%M-%S-%3fZ")
    )
}

async fn create_unique(dir: &Path, stem: &str, ext: &str) -> Result<(PathBuf, File), RenderError> {
    for suffix in 0..MAX_NAME_SUFFIX {
        let name = if suffix == 0 {
            format!("{}.{}", stem, ext)
        } else {
            format!("{}-{}.{}", stem, suffix, ext)
        };
        let path = dir.join(name);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("{} already exists, trying next suffix", path.display());
                continue;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(RenderError::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free file name for {}", stem),
    )))
}

fn is_winansi(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\t' | ' '..='~' | '\u{A0}'..='\u{FF}') || WINANSI_EXTRAS.contains(&c)
}

/// The built-in fonts drop anything outside WinAnsi without complaint, which
/// also throws off line wrapping. Returns the text with those characters
/// replaced and how many were replaced.
pub fn to_winansi(text: &str) -> (String, usize) {
    let mut replaced = 0;
    let mapped: String = text
        .chars()
        .map(|c| {
            if is_winansi(c) {
                c
            } else {
                replaced += 1;
                UNENCODABLE_PLACEHOLDER
            }
        })
        .collect();
    (mapped, replaced)
}

fn pdf_err(e: impl std::fmt::Display) -> RenderError {
    RenderError::Pdf(e.to_string())
}

fn text_width_mm(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_GLYPH_EM * PT_TO_MM
}

fn line_height_mm(size: f32) -> f32 {
    size * PT_TO_MM * LINE_SPACING
}

fn body_chars_per_line() -> usize {
    let usable = PAGE_WIDTH_MM - 2.0 * MARGIN_MM;
    (usable / (BODY_SIZE * AVG_GLYPH_EM * PT_TO_MM)).floor() as usize
}

/// Splits the body into printable lines, wrapping on word boundaries.
pub fn layout_lines(body: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();

    for raw in body.lines() {
        if raw.trim().is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current = String::new();
        for word in raw.split_whitespace() {
            let mut word: String = word.to_string();

            // Hard-split words that cannot fit on any line.
            while word.chars().count() > max_chars {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let head: String = word.chars().take(max_chars).collect();
                word = word.chars().skip(max_chars).collect();
                lines.push(head);
            }

            let needed = if current.is_empty() {
                word.chars().count()
            } else {
                current.chars().count() + 1 + word.chars().count()
            };

            if needed > max_chars && !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&word);
        }
        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}

struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    layer: PdfLayerReference,
    y: f32,
}

impl<'a> PageWriter<'a> {
    fn line(&mut self, text: &str, size: f32, x: f32, font: &IndirectFontRef) {
        let height = line_height_mm(size);
        if self.y - height < MARGIN_MM {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH_MM), Mm(PAGE_HEIGHT_MM), "Layer 1");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = PAGE_HEIGHT_MM - MARGIN_MM;
        }
        self.y -= height;
        if !text.is_empty() {
            self.layer.use_text(text, size, Mm(x), Mm(self.y), font);
        }
    }

    fn centered(&mut self, text: &str, size: f32, font: &IndirectFontRef) {
        let x = ((PAGE_WIDTH_MM - text_width_mm(text, size)) / 2.0).max(MARGIN_MM);
        self.line(text, size, x, font);
    }

    fn right_aligned(&mut self, text: &str, size: f32, font: &IndirectFontRef) {
        let x = (PAGE_WIDTH_MM - MARGIN_MM - text_width_mm(text, size)).max(MARGIN_MM);
        self.line(text, size, x, font);
    }

    fn gap(&mut self, size: f32) {
        self.y -= line_height_mm(size);
    }
}

fn build_pdf(request: &RenderRequest, generated_at: DateTime<Utc>) -> Result<Vec<u8>, RenderError> {
    let heading = if request.title.trim().is_empty() {
        "Meeting Transcript"
    } else {
        request.title.as_str()
    };

    let (printable_heading, heading_replaced) = to_winansi(heading);
    let (printable_body, body_replaced) = to_winansi(&request.body);
    if heading_replaced + body_replaced > 0 {
        warn!(
            "\"{}\": {} character(s) cannot be encoded by the built-in PDF font and were replaced with '{}'",
            heading,
            heading_replaced + body_replaced,
            UNENCODABLE_PLACEHOLDER
        );
    }

    let (doc, page, layer) = PdfDocument::new(
        heading.to_string(),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Layer 1",
    );
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(pdf_err)?;
    let regular = doc.add_builtin_font(BuiltinFont::Helvetica).map_err(pdf_err)?;

    {
        let mut writer = PageWriter {
            doc: &doc,
            layer: doc.get_page(page).get_layer(layer),
            y: PAGE_HEIGHT_MM - MARGIN_MM,
        };

        writer.centered(SYSTEM_NAME, HEADER_SIZE, &bold);
        writer.centered(&printable_heading, TITLE_SIZE, &bold);
        writer.gap(BODY_SIZE);
        let stamp = format!("Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        writer.right_aligned(&stamp, STAMP_SIZE, &regular);
        writer.gap(BODY_SIZE);

        for line in layout_lines(&printable_body, body_chars_per_line()) {
            writer.line(&line, BODY_SIZE, MARGIN_MM, &regular);
        }
    }

    doc.save_to_bytes().map_err(pdf_err)
}
