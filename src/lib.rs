//! # sitereport
//!
//! Lays out construction daily reports onto fixed-size pages and writes
//! them as PDF.
//!
//! Every page is composed by direct drawing calls: a header band with the
//! organization logo, a project information table, bulleted activity,
//! equipment and obstacle lists, a labor table, and photo pages. Content
//! flows *into* pages: before anything is drawn, the page is asked whether
//! it fits, and a new page (with the section header repeated) begins when
//! it does not.
//!
//! ## Architecture
//!
//! ```text
//! Input (JSON/API)
//!       ↓
//!   [model]        ReportDocument, photo templates and entries
//!       ↓
//!   [text]         BiDi marks, line breaking, autosize
//!       ↓
//!   [layout]       tables, paragraphs, photo grids, page state
//!       ↓
//!   [canvas]       Canvas / PageSink / LinkAnnotator
//!       ↓
//!   [pdf]          PDF bytes            [canvas::raster]  PNG pages
//! ```

pub mod canvas;
pub mod config;
pub mod error;
pub mod font;
pub mod geometry;
pub mod image_loader;
pub mod layout;
pub mod model;
pub mod pdf;
pub mod style;
pub mod text;

#[cfg(feature = "wasm")]
pub mod wasm;

use canvas::PageSink;
use config::RenderConfig;
use error::{ReportError, Result};
use font::FontContext;
use image_loader::{ImageFetcher, LocalImageLoader};
use layout::Paginator;
use model::{InfoKey, ReportDocument};
use pdf::{DocumentInfo, PdfSink};

/// Render a report to PDF bytes.
///
/// This is the primary entry point. Images that cannot be fetched become
/// placeholders; only unusable fonts, impossible templates and write
/// failures are errors.
pub fn render(doc: &ReportDocument, config: &RenderConfig, fetcher: &dyn ImageFetcher) -> Result<Vec<u8>> {
    let fonts = FontContext::with_entries(&config.fonts.custom)?;
    let mut sink = PdfSink::new(&fonts).with_info(document_info(doc, config));
    let summary = Paginator::new(&fonts, config, fetcher).paginate(doc, &mut sink)?;
    let mut out = Vec::new();
    sink.write_document(&mut out)?;
    tracing::debug!(
        pages = summary.pages,
        photo_pages = summary.photo_pages,
        bytes = out.len(),
        "rendered report"
    );
    Ok(out)
}

/// Parse a report from JSON.
pub fn parse_report(json: &str) -> Result<ReportDocument> {
    serde_json::from_str(json).map_err(|e| ReportError::parse("report", e))
}

/// Render a report described as JSON with the default configuration.
/// Local paths resolve against the working directory.
pub fn render_json(json: &str) -> Result<Vec<u8>> {
    let doc = parse_report(json)?;
    render(&doc, &RenderConfig::default(), &LocalImageLoader::new())
}

fn document_info(doc: &ReportDocument, config: &RenderConfig) -> DocumentInfo {
    let title = match doc.field(InfoKey::ReportNumber).map(str::trim) {
        Some(number) if !number.is_empty() => format!("{} {}", config.header.title, number),
        _ => config.header.title.clone(),
    };
    let non_blank = |v: Option<&str>| v.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string);
    DocumentInfo {
        title: Some(title),
        author: non_blank(doc.field(InfoKey::CreatedBy)),
        subject: non_blank(doc.field(InfoKey::Project)),
    }
}
