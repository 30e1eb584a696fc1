//! # PDF Page Sink
//!
//! A from-scratch PDF 1.7 writer behind the [`PageSink`] interface. Drawing
//! calls are recorded per page; `write_document` turns the recordings into
//! content streams, font and image objects, and link annotations.
//!
//! ## PDF Structure (simplified)
//!
//! ```text
//! %PDF-1.7            <- header
//! 1 0 obj ... endobj  <- objects (fonts, pages, content streams, etc.)
//! 2 0 obj ... endobj
//! ...
//! xref                <- cross-reference table (byte offsets of each object)
//! trailer             <- points to the root object
//! %%EOF
//! ```
//!
//! ## Fonts
//!
//! Helvetica faces are written as Type1 references with WinAnsiEncoding.
//! Custom TrueType fonts are embedded in full as CIDFontType2 with
//! Identity-H encoding. Runs in a custom font are shaped with rustybuzz, so
//! the content stream carries real glyph IDs and Arabic gets its contextual
//! forms.
//!
//! ## Images
//!
//! Pixels are split into RGB and alpha and deflated when `draw_image` is
//! called. Only the compressed bytes are kept.
//!
//! ## Page numbers
//!
//! `{{pageNumber}}` and `{{totalPages}}` in drawn text are replaced when the
//! document is written, once the page count is known.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write as FmtWrite; // for write! on String
use std::io::Write as IoWrite; // for write! on Vec<u8>
use std::sync::Arc;

use miniz_oxide::deflate::compress_to_vec_zlib;

use crate::canvas::{
    round_rect_path, Bitmap, Canvas, DrawCommand, LinkAnnotator, PageHandle, PageSink, Paint,
    PathSeg, Stroke,
};
use crate::error::{ReportError, Result};
use crate::font::{FontContext, FontData, StandardFont};
use crate::geometry::{Point, Rect};
use crate::style::Color;
use crate::text::{shaping, TextBlock, TextRun};

const PAGE_NUMBER_TOKEN: &str = "{{pageNumber}}";
const TOTAL_PAGES_TOKEN: &str = "{{totalPages}}";

/// Document information dictionary entries.
#[derive(Debug, Clone, Default)]
pub struct DocumentInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
}

/// A page as recorded by the sink.
#[derive(Debug, Clone)]
pub struct RecordedPage {
    pub width: f64,
    pub height: f64,
    pub commands: Vec<DrawCommand>,
    pub links: Vec<(Rect, String)>,
}

impl RecordedPage {
    /// Text of every text command, in drawing order.
    pub fn texts(&self) -> Vec<String> {
        self.commands.iter().filter_map(DrawCommand::text).collect()
    }
}

/// Image pixels ready to be written as XObjects.
struct EncodedImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

/// Records pages and writes them as a PDF document.
pub struct PdfSink<'f> {
    fonts: &'f FontContext,
    info: DocumentInfo,
    pages: Vec<RecordedPage>,
    open: Option<usize>,
    images: Vec<EncodedImage>,
}

impl<'f> PdfSink<'f> {
    pub fn new(fonts: &'f FontContext) -> Self {
        Self {
            fonts,
            info: DocumentInfo::default(),
            pages: Vec::new(),
            open: None,
            images: Vec::new(),
        }
    }

    pub fn with_info(mut self, info: DocumentInfo) -> Self {
        self.info = info;
        self
    }

    pub fn pages(&self) -> &[RecordedPage] {
        &self.pages
    }

    fn record(&mut self, command: DrawCommand) {
        match self.open.and_then(|i| self.pages.get_mut(i)) {
            Some(page) => page.commands.push(command),
            None => tracing::warn!("draw call outside an open page dropped"),
        }
    }

    /// Serialize all recorded pages.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut builder = PdfBuilder::new();
        let mut fonts = FontTable::new(self.fonts);
        let total_pages = self.pages.len();

        // Content first: it decides which fonts and glyphs are needed.
        let contents: Vec<String> = self
            .pages
            .iter()
            .enumerate()
            .map(|(i, page)| {
                let mut stream = String::new();
                for command in &page.commands {
                    write_command(&mut stream, command, page.height, &mut fonts, i + 1, total_pages);
                }
                stream
            })
            .collect();

        let font_ids = fonts.write_objects(&mut builder)?;
        let image_ids: Vec<usize> = self
            .images
            .iter()
            .map(|img| write_image_xobject(&mut builder, img))
            .collect();

        let font_resources: String = font_ids
            .iter()
            .enumerate()
            .map(|(i, id)| format!("/F{} {} 0 R", i, id))
            .collect::<Vec<_>>()
            .join(" ");

        let mut page_obj_ids = Vec::with_capacity(self.pages.len());
        for (page, content) in self.pages.iter().zip(&contents) {
            let compressed = compress_to_vec_zlib(content.as_bytes(), 6);
            let mut content_data: Vec<u8> = Vec::new();
            let _ = write!(
                content_data,
                "<< /Length {} /Filter /FlateDecode >>\nstream\n",
                compressed.len()
            );
            content_data.extend_from_slice(&compressed);
            content_data.extend_from_slice(b"\nendstream");
            let content_obj_id = builder.push(content_data);

            let annot_ids: Vec<usize> = page
                .links
                .iter()
                .map(|(rect, url)| {
                    let x1 = rect.x;
                    let y1 = page.height - rect.bottom();
                    let dict = format!(
                        "<< /Type /Annot /Subtype /Link /Rect [{:.2} {:.2} {:.2} {:.2}] \
                         /Border [0 0 0] /A << /Type /Action /S /URI /URI ({}) >> >>",
                        x1,
                        y1,
                        x1 + rect.width,
                        y1 + rect.height,
                        escape_pdf_string(url)
                    );
                    builder.push(dict.into_bytes())
                })
                .collect();

            let mut used_images: Vec<usize> = page
                .commands
                .iter()
                .filter_map(|c| match c {
                    DrawCommand::Image { image, .. } => Some(*image),
                    _ => None,
                })
                .collect();
            used_images.sort_unstable();
            used_images.dedup();

            let mut resources = format!("/Font << {} >>", font_resources);
            if !used_images.is_empty() {
                let xobjects = used_images
                    .iter()
                    .map(|&i| format!("/Im{} {} 0 R", i, image_ids[i]))
                    .collect::<Vec<_>>()
                    .join(" ");
                let _ = write!(resources, " /XObject << {} >>", xobjects);
            }
            let annots = if annot_ids.is_empty() {
                String::new()
            } else {
                format!(
                    " /Annots [{}]",
                    annot_ids
                        .iter()
                        .map(|id| format!("{} 0 R", id))
                        .collect::<Vec<_>>()
                        .join(" ")
                )
            };
            let page_dict = format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
                 /Contents {} 0 R /Resources << {} >>{} >>",
                page.width, page.height, content_obj_id, resources, annots
            );
            page_obj_ids.push(builder.push(page_dict.into_bytes()));
        }

        builder.objects[1] = b"<< /Type /Catalog /Pages 2 0 R >>".to_vec();
        let kids: String = page_obj_ids
            .iter()
            .map(|id| format!("{} 0 R", id))
            .collect::<Vec<_>>()
            .join(" ");
        builder.objects[2] = format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids,
            page_obj_ids.len()
        )
        .into_bytes();

        let mut info = String::from("<< ");
        if let Some(ref title) = self.info.title {
            let _ = write!(info, "/Title ({}) ", escape_pdf_string(title));
        }
        if let Some(ref author) = self.info.author {
            let _ = write!(info, "/Author ({}) ", escape_pdf_string(author));
        }
        if let Some(ref subject) = self.info.subject {
            let _ = write!(info, "/Subject ({}) ", escape_pdf_string(subject));
        }
        info.push_str("/Producer (sitereport) /Creator (sitereport) >>");
        let info_id = builder.push(info.into_bytes());

        Ok(builder.serialize(info_id))
    }
}

impl Canvas for PdfSink<'_> {
    fn draw_rect(&mut self, rect: Rect, paint: &Paint) {
        self.record(DrawCommand::Rect {
            rect,
            paint: *paint,
        });
    }

    fn draw_round_rect(&mut self, rect: Rect, radius: f64, paint: &Paint) {
        self.record(DrawCommand::RoundRect {
            rect,
            radius,
            paint: *paint,
        });
    }

    fn draw_line(&mut self, from: Point, to: Point, stroke: &Stroke) {
        self.record(DrawCommand::Line {
            from,
            to,
            stroke: *stroke,
        });
    }

    fn draw_text(&mut self, block: &TextBlock, origin: Point, color: Color) {
        if block.lines.is_empty() {
            return;
        }
        self.record(DrawCommand::Text {
            block: block.clone(),
            origin,
            color,
        });
    }

    fn draw_image(&mut self, image: &Bitmap, dest: Rect) {
        if self.open.is_none() {
            tracing::warn!("image drawn outside an open page dropped");
            return;
        }
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return;
        }
        let index = self.images.len();
        self.images.push(encode_image(image));
        self.record(DrawCommand::Image {
            dest,
            image: index,
            pixel_size: (width, height),
        });
    }

    fn push_clip(&mut self, rect: Rect) {
        self.record(DrawCommand::PushClip(rect));
    }

    fn pop_clip(&mut self) {
        self.record(DrawCommand::PopClip);
    }
}

impl PageSink for PdfSink<'_> {
    fn start_page(&mut self, width: f64, height: f64) -> PageHandle {
        if let Some(open) = self.open {
            tracing::warn!(page = open, "starting a page while another is open");
        }
        self.pages.push(RecordedPage {
            width,
            height,
            commands: Vec::new(),
            links: Vec::new(),
        });
        let index = self.pages.len() - 1;
        self.open = Some(index);
        PageHandle(index)
    }

    fn finish_page(&mut self, page: PageHandle) {
        if self.open == Some(page.0) {
            self.open = None;
        }
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn write_document(&mut self, out: &mut dyn IoWrite) -> Result<()> {
        let bytes = self.to_bytes()?;
        out.write_all(&bytes)?;
        out.flush()?;
        Ok(())
    }
}

impl LinkAnnotator for PdfSink<'_> {
    fn add_link(&mut self, page: PageHandle, rect: Rect, url: &str) {
        if let Some(p) = self.pages.get_mut(page.0) {
            p.links.push((rect, url.to_string()));
        }
    }
}

/// Tracks allocated PDF objects during writing.
struct PdfBuilder {
    /// Index is the object number. 0 is the free-list head, 1 the Catalog,
    /// 2 the Pages tree.
    objects: Vec<Vec<u8>>,
}

impl PdfBuilder {
    fn new() -> Self {
        Self {
            objects: vec![Vec::new(), Vec::new(), Vec::new()],
        }
    }

    fn push(&mut self, data: Vec<u8>) -> usize {
        self.objects.push(data);
        self.objects.len() - 1
    }

    /// Serialize all objects into the final PDF byte stream.
    fn serialize(&self, info_obj_id: usize) -> Vec<u8> {
        let mut output: Vec<u8> = Vec::new();
        let mut offsets: Vec<usize> = vec![0; self.objects.len()];

        output.extend_from_slice(b"%PDF-1.7\n");
        output.extend_from_slice(b"%\xe2\xe3\xcf\xd3\n");

        for (i, obj) in self.objects.iter().enumerate().skip(1) {
            offsets[i] = output.len();
            let _ = write!(output, "{} 0 obj\n", i);
            output.extend_from_slice(obj);
            output.extend_from_slice(b"\nendobj\n\n");
        }

        let xref_offset = output.len();
        let _ = write!(output, "xref\n0 {}\n", self.objects.len());
        let _ = write!(output, "0000000000 65535 f \n");
        for offset in offsets.iter().skip(1) {
            let _ = write!(output, "{:010} 00000 n \n", offset);
        }
        let _ = write!(
            output,
            "trailer\n<< /Size {} /Root 1 0 R /Info {} 0 R >>\nstartxref\n{}\n%%EOF\n",
            self.objects.len(),
            info_obj_id,
            xref_offset
        );
        output
    }
}

/// Identity of a resolved face. Custom faces are told apart by their data.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum FaceId {
    Standard(&'static str),
    Custom(usize),
}

enum FaceKind {
    Standard(StandardFont),
    Custom {
        name: String,
        data: Arc<Vec<u8>>,
        /// Glyph ID to the text it was shaped from.
        to_unicode: BTreeMap<u16, String>,
    },
}

/// Fonts referenced by content streams, in `/F{n}` order.
struct FontTable<'f> {
    fonts: &'f FontContext,
    faces: Vec<FaceKind>,
    index: HashMap<FaceId, usize>,
}

impl<'f> FontTable<'f> {
    fn new(fonts: &'f FontContext) -> Self {
        Self {
            fonts,
            faces: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Resource index for the face a block draws with.
    fn resource(&mut self, block: &TextBlock) -> usize {
        let (id, kind) = match self.fonts.resolve(&block.font) {
            FontData::Standard(sf) => (FaceId::Standard(sf.pdf_name()), FaceKind::Standard(*sf)),
            FontData::Custom { data, .. } => (
                FaceId::Custom(Arc::as_ptr(data) as usize),
                FaceKind::Custom {
                    name: sanitize_font_name(&block.font.family, block.font.weight),
                    data: Arc::clone(data),
                    to_unicode: BTreeMap::new(),
                },
            ),
        };
        if let Some(&i) = self.index.get(&id) {
            return i;
        }
        self.faces.push(kind);
        self.index.insert(id, self.faces.len() - 1);
        self.faces.len() - 1
    }

    /// Write every face and return their object IDs in resource order.
    fn write_objects(&self, builder: &mut PdfBuilder) -> Result<Vec<usize>> {
        self.faces
            .iter()
            .map(|face| match face {
                FaceKind::Standard(sf) => Ok(builder.push(
                    format!(
                        "<< /Type /Font /Subtype /Type1 /BaseFont /{} /Encoding /WinAnsiEncoding >>",
                        sf.pdf_name()
                    )
                    .into_bytes(),
                )),
                FaceKind::Custom {
                    name,
                    data,
                    to_unicode,
                } => write_custom_font_objects(builder, name, data, to_unicode),
            })
            .collect()
    }
}

fn write_color(stream: &mut String, color: Color, op: &str) {
    let _ = writeln!(stream, "{:.3} {:.3} {:.3} {}", color.r, color.g, color.b, op);
}

fn write_path(stream: &mut String, segs: &[PathSeg], page_height: f64) {
    for seg in segs {
        match *seg {
            PathSeg::MoveTo(x, y) => {
                let _ = writeln!(stream, "{:.2} {:.2} m", x, page_height - y);
            }
            PathSeg::LineTo(x, y) => {
                let _ = writeln!(stream, "{:.2} {:.2} l", x, page_height - y);
            }
            PathSeg::CubicTo(x1, y1, x2, y2, x, y) => {
                let _ = writeln!(
                    stream,
                    "{:.2} {:.2} {:.2} {:.2} {:.2} {:.2} c",
                    x1,
                    page_height - y1,
                    x2,
                    page_height - y2,
                    x,
                    page_height - y
                );
            }
            PathSeg::Close => stream.push_str("h\n"),
        }
    }
}

fn write_stroke_style(stream: &mut String, stroke: &Stroke) {
    write_color(stream, stroke.color, "RG");
    let _ = writeln!(stream, "{:.2} w", stroke.width);
    if let Some([on, off]) = stroke.dash {
        let _ = writeln!(stream, "[{:.2} {:.2}] 0 d", on, off);
    }
}

/// Fill and/or stroke the path built by `path`.
fn write_painted(stream: &mut String, paint: &Paint, path: impl Fn(&mut String)) {
    let fill = paint.fill.filter(Color::is_visible);
    let stroke = paint.stroke.filter(|s| s.width > 0.0 && s.color.is_visible());
    let op = match (fill.is_some(), stroke.is_some()) {
        (true, true) => "B",
        (true, false) => "f",
        (false, true) => "S",
        (false, false) => return,
    };
    stream.push_str("q\n");
    if let Some(fill) = fill {
        write_color(stream, fill, "rg");
    }
    if let Some(stroke) = stroke {
        write_stroke_style(stream, &stroke);
    }
    path(stream);
    let _ = writeln!(stream, "{}\nQ", op);
}

/// Write one recorded command as PDF operators.
fn write_command(
    stream: &mut String,
    command: &DrawCommand,
    page_height: f64,
    fonts: &mut FontTable,
    page_number: usize,
    total_pages: usize,
) {
    match command {
        DrawCommand::Rect { rect, paint } => {
            write_painted(stream, paint, |s| {
                let _ = writeln!(
                    s,
                    "{:.2} {:.2} {:.2} {:.2} re",
                    rect.x,
                    page_height - rect.bottom(),
                    rect.width,
                    rect.height
                );
            });
        }
        DrawCommand::RoundRect {
            rect,
            radius,
            paint,
        } => {
            let segs = round_rect_path(*rect, *radius);
            write_painted(stream, paint, |s| write_path(s, &segs, page_height));
        }
        DrawCommand::Line { from, to, stroke } => {
            if stroke.width <= 0.0 || !stroke.color.is_visible() {
                return;
            }
            stream.push_str("q\n");
            write_stroke_style(stream, stroke);
            let _ = writeln!(
                stream,
                "{:.2} {:.2} m\n{:.2} {:.2} l\nS\nQ",
                from.x,
                page_height - from.y,
                to.x,
                page_height - to.y
            );
        }
        DrawCommand::Text {
            block,
            origin,
            color,
        } => {
            let font = fonts.resource(block);
            stream.push_str("BT\n");
            write_color(stream, *color, "rg");
            let _ = writeln!(stream, "/F{} {:.2} Tf", font, block.font_size);
            for line in &block.lines {
                let y = page_height - (origin.y + line.baseline);
                for run in &line.runs {
                    let text = run
                        .text
                        .replace(PAGE_NUMBER_TOKEN, &page_number.to_string())
                        .replace(TOTAL_PAGES_TOKEN, &total_pages.to_string());
                    let _ = writeln!(stream, "1 0 0 1 {:.2} {:.2} Tm", origin.x + run.x, y);
                    write_run(stream, &text, run, block, &mut fonts.faces[font]);
                }
            }
            stream.push_str("ET\n");
        }
        DrawCommand::Image { dest, image, .. } => {
            let _ = writeln!(
                stream,
                "q\n{:.4} 0 0 {:.4} {:.2} {:.2} cm\n/Im{} Do\nQ",
                dest.width,
                dest.height,
                dest.x,
                page_height - dest.bottom(),
                image
            );
        }
        DrawCommand::PushClip(rect) => {
            let _ = writeln!(
                stream,
                "q\n{:.2} {:.2} {:.2} {:.2} re\nW n",
                rect.x,
                page_height - rect.bottom(),
                rect.width,
                rect.height
            );
        }
        DrawCommand::PopClip => stream.push_str("Q\n"),
    }
}

/// Show one directional run. `text` is the run text after page-number
/// substitution.
fn write_run(stream: &mut String, text: &str, run: &TextRun, block: &TextBlock, face: &mut FaceKind) {
    match face {
        FaceKind::Standard(_) => {
            // Standard fonts have no shaping; RTL runs go out reversed.
            let visual: String = if run.rtl {
                text.chars().rev().collect()
            } else {
                text.to_string()
            };
            let _ = writeln!(stream, "({}) Tj", encode_winansi(&visual));
        }
        FaceKind::Custom {
            data, to_unicode, ..
        } => {
            let Some(glyphs) = shaping::shape_run(text, data, run.rtl) else {
                stream.push_str("<> Tj\n");
                return;
            };
            let Ok(face) = ttf_parser::Face::parse(data, 0) else {
                stream.push_str("<> Tj\n");
                return;
            };
            let upem = face.units_per_em().max(1);
            let shaped = shaping::shaped_width(&glyphs, upem, block.font_size);
            // Stretch to the measured run width so layout and output agree.
            let tz = if shaped > 0.0 && run.width > 0.0 && text == run.text {
                100.0 * run.width / shaped
            } else {
                100.0
            };
            record_clusters(text, &glyphs, to_unicode);

            let mut tj = String::from("[");
            for g in &glyphs {
                let _ = write!(tj, "<{:04X}>", g.glyph_id);
                let default = face
                    .glyph_hor_advance(ttf_parser::GlyphId(g.glyph_id))
                    .unwrap_or(0) as i32;
                let adjust = (default - g.x_advance) as f64 * 1000.0 / upem as f64;
                if adjust.abs() > 0.01 {
                    let _ = write!(tj, " {:.1} ", adjust);
                }
            }
            tj.push(']');
            let _ = writeln!(stream, "{:.2} Tz\n{} TJ\n100 Tz", tz, tj);
        }
    }
}

/// Remember which text each glyph came from for the ToUnicode CMap.
fn record_clusters(text: &str, glyphs: &[shaping::ShapedGlyph], to_unicode: &mut BTreeMap<u16, String>) {
    let mut starts: Vec<usize> = glyphs.iter().map(|g| g.cluster as usize).collect();
    starts.sort_unstable();
    starts.dedup();
    for g in glyphs {
        if to_unicode.contains_key(&g.glyph_id) {
            continue;
        }
        let start = g.cluster as usize;
        let end = starts
            .iter()
            .copied()
            .find(|&s| s > start)
            .unwrap_or(text.len());
        if let Some(slice) = text.get(start..end) {
            if !slice.is_empty() {
                to_unicode.insert(g.glyph_id, slice.to_string());
            }
        }
    }
}

fn encode_image(image: &Bitmap) -> EncodedImage {
    let (width, height) = image.dimensions();
    let pixel_count = (width as usize) * (height as usize);
    let mut rgb = Vec::with_capacity(pixel_count * 3);
    let mut alpha = Vec::with_capacity(pixel_count);
    let mut has_transparency = false;
    for pixel in image.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel[3]);
        if pixel[3] != 255 {
            has_transparency = true;
        }
    }
    EncodedImage {
        width,
        height,
        rgb: compress_to_vec_zlib(&rgb, 6),
        alpha: has_transparency.then(|| compress_to_vec_zlib(&alpha, 6)),
    }
}

/// Write an image as one or two XObjects. Returns the main XObject ID.
fn write_image_xobject(builder: &mut PdfBuilder, image: &EncodedImage) -> usize {
    let smask_id = image.alpha.as_ref().map(|alpha| {
        let mut data: Vec<u8> = Vec::new();
        let _ = write!(
            data,
            "<< /Type /XObject /Subtype /Image \
             /Width {} /Height {} \
             /ColorSpace /DeviceGray \
             /BitsPerComponent 8 \
             /Filter /FlateDecode \
             /Length {} >>\nstream\n",
            image.width,
            image.height,
            alpha.len()
        );
        data.extend_from_slice(alpha);
        data.extend_from_slice(b"\nendstream");
        builder.push(data)
    });

    let smask_ref = smask_id
        .map(|id| format!(" /SMask {} 0 R", id))
        .unwrap_or_default();
    let mut data: Vec<u8> = Vec::new();
    let _ = write!(
        data,
        "<< /Type /XObject /Subtype /Image \
         /Width {} /Height {} \
         /ColorSpace /DeviceRGB \
         /BitsPerComponent 8 \
         /Filter /FlateDecode \
         /Length {}{} >>\nstream\n",
        image.width,
        image.height,
        image.rgb.len(),
        smask_ref
    );
    data.extend_from_slice(&image.rgb);
    data.extend_from_slice(b"\nendstream");
    builder.push(data)
}

/// Write the 5 CIDFont objects for a custom TrueType font.
/// Returns the object ID of the Type0 root font dictionary.
fn write_custom_font_objects(
    builder: &mut PdfBuilder,
    pdf_font_name: &str,
    ttf_data: &[u8],
    to_unicode: &BTreeMap<u16, String>,
) -> Result<usize> {
    let face = ttf_parser::Face::parse(ttf_data, 0).map_err(|e| {
        ReportError::Font(format!(
            "failed to parse TTF data for font '{}': {}",
            pdf_font_name, e
        ))
    })?;
    let units_per_em = face.units_per_em();
    let ascender = face.ascender();
    let descender = face.descender();

    // 1. FontFile2 stream
    let compressed_ttf = compress_to_vec_zlib(ttf_data, 6);
    let mut fontfile2: Vec<u8> = Vec::new();
    let _ = write!(
        fontfile2,
        "<< /Length {} /Length1 {} /Filter /FlateDecode >>\nstream\n",
        compressed_ttf.len(),
        ttf_data.len()
    );
    fontfile2.extend_from_slice(&compressed_ttf);
    fontfile2.extend_from_slice(b"\nendstream");
    let fontfile2_id = builder.push(fontfile2);

    // 2. FontDescriptor
    let bbox = face.global_bounding_box();
    let scale = 1000.0 / units_per_em as f64;
    let cap_height = face.capital_height().unwrap_or(ascender) as f64 * scale;
    let stem_v = if pdf_font_name.ends_with("-Bold") { 120 } else { 80 };
    let descriptor = format!(
        "<< /Type /FontDescriptor /FontName /{} /Flags 4 \
         /FontBBox [{} {} {} {}] /ItalicAngle 0 \
         /Ascent {} /Descent {} /CapHeight {} /StemV {} \
         /FontFile2 {} 0 R >>",
        pdf_font_name,
        (bbox.x_min as f64 * scale) as i32,
        (bbox.y_min as f64 * scale) as i32,
        (bbox.x_max as f64 * scale) as i32,
        (bbox.y_max as f64 * scale) as i32,
        (ascender as f64 * scale) as i32,
        (descender as f64 * scale) as i32,
        cap_height as i32,
        stem_v,
        fontfile2_id,
    );
    let descriptor_id = builder.push(descriptor.into_bytes());

    // 3. CIDFont dictionary
    let gids: HashSet<u16> = to_unicode.keys().copied().collect();
    let default_width = face
        .glyph_hor_advance(ttf_parser::GlyphId(0))
        .map(|adv| (adv as f64 * scale) as u32)
        .unwrap_or(1000);
    let cidfont = format!(
        "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /{} \
         /CIDSystemInfo << /Registry (Adobe) /Ordering (Identity) /Supplement 0 >> \
         /FontDescriptor {} 0 R /DW {} /W {} \
         /CIDToGIDMap /Identity >>",
        pdf_font_name,
        descriptor_id,
        default_width,
        build_w_array(&gids, &face),
    );
    let cidfont_id = builder.push(cidfont.into_bytes());

    // 4. ToUnicode CMap
    let cmap = build_tounicode_cmap(to_unicode, pdf_font_name);
    let compressed_cmap = compress_to_vec_zlib(cmap.as_bytes(), 6);
    let mut tounicode: Vec<u8> = Vec::new();
    let _ = write!(
        tounicode,
        "<< /Length {} /Filter /FlateDecode >>\nstream\n",
        compressed_cmap.len()
    );
    tounicode.extend_from_slice(&compressed_cmap);
    tounicode.extend_from_slice(b"\nendstream");
    let tounicode_id = builder.push(tounicode);

    // 5. Type0 root
    let type0 = format!(
        "<< /Type /Font /Subtype /Type0 /BaseFont /{} \
         /Encoding /Identity-H \
         /DescendantFonts [{} 0 R] \
         /ToUnicode {} 0 R >>",
        pdf_font_name, cidfont_id, tounicode_id,
    );
    Ok(builder.push(type0.into_bytes()))
}

/// Per-glyph widths for the CIDFont: `[gid [width] gid [width] ...]`.
fn build_w_array(gids: &HashSet<u16>, face: &ttf_parser::Face) -> String {
    let scale = 1000.0 / face.units_per_em() as f64;
    let mut entries: Vec<(u16, u32)> = gids
        .iter()
        .map(|&gid| {
            let advance = face
                .glyph_hor_advance(ttf_parser::GlyphId(gid))
                .unwrap_or(0);
            (gid, (advance as f64 * scale) as u32)
        })
        .collect();
    entries.sort_by_key(|(gid, _)| *gid);

    let mut result = String::from("[");
    for (gid, width) in &entries {
        let _ = write!(result, " {} [{}]", gid, width);
    }
    result.push_str(" ]");
    result
}

/// ToUnicode CMap so text can be extracted and copied.
fn build_tounicode_cmap(to_unicode: &BTreeMap<u16, String>, font_name: &str) -> String {
    let mut cmap = String::new();
    cmap.push_str("/CIDInit /ProcSet findresource begin\n");
    cmap.push_str("12 dict begin\n");
    cmap.push_str("begincmap\n");
    cmap.push_str("/CIDSystemInfo\n");
    cmap.push_str("<< /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
    let _ = writeln!(cmap, "/CMapName /{}-UTF16 def", font_name);
    cmap.push_str("/CMapType 2 def\n");
    cmap.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

    let entries: Vec<(&u16, &String)> = to_unicode.iter().collect();
    // At most 100 entries per bfchar block
    for chunk in entries.chunks(100) {
        let _ = writeln!(cmap, "{} beginbfchar", chunk.len());
        for (gid, text) in chunk {
            let utf16: String = text
                .encode_utf16()
                .map(|unit| format!("{:04X}", unit))
                .collect();
            let _ = writeln!(cmap, "<{:04X}> <{}>", gid, utf16);
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str("endcmap\n");
    cmap.push_str("CMapName currentdict /CMap defineresource pop\n");
    cmap.push_str("end\nend\n");
    cmap
}

/// A PDF name for an embedded face.
fn sanitize_font_name(family: &str, weight: u32) -> String {
    let mut name: String = family
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if name.is_empty() {
        name = "CustomFont".to_string();
    }
    if weight >= 600 {
        name.push_str("-Bold");
    }
    name
}

/// Escape special characters in a PDF literal string.
fn escape_pdf_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('(', "\\(")
        .replace(')', "\\)")
}

/// Encode text for a WinAnsi literal string, escaping as needed.
fn encode_winansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if crate::font::is_zero_width(ch) {
            continue;
        }
        let b = unicode_to_winansi(ch).unwrap_or(b'?');
        match b {
            b'\\' => out.push_str("\\\\"),
            b'(' => out.push_str("\\("),
            b')' => out.push_str("\\)"),
            0x20..=0x7E => out.push(b as char),
            _ => {
                let _ = write!(out, "\\{:03o}", b);
            }
        }
    }
    out
}

/// Map a Unicode codepoint to a WinAnsiEncoding byte value.
///
/// WinAnsiEncoding is based on Windows-1252. Most codepoints in
/// 0x20..=0x7E and 0xA0..=0xFF map directly. The 0x80..=0x9F range
/// contains special mappings for smart quotes, bullets, dashes, etc.
fn unicode_to_winansi(ch: char) -> Option<u8> {
    let cp = ch as u32;
    if (0x20..=0x7E).contains(&cp) || (0xA0..=0xFF).contains(&cp) {
        return Some(cp as u8);
    }
    match cp {
        0x20AC => Some(0x80), // Euro sign
        0x201A => Some(0x82), // Single low-9 quotation mark
        0x0192 => Some(0x83), // Latin small letter f with hook
        0x201E => Some(0x84), // Double low-9 quotation mark
        0x2026 => Some(0x85), // Horizontal ellipsis
        0x2020 => Some(0x86), // Dagger
        0x2021 => Some(0x87), // Double dagger
        0x02C6 => Some(0x88), // Modifier letter circumflex accent
        0x2030 => Some(0x89), // Per mille sign
        0x0160 => Some(0x8A), // Latin capital letter S with caron
        0x2039 => Some(0x8B), // Single left-pointing angle quotation
        0x0152 => Some(0x8C), // Latin capital ligature OE
        0x017D => Some(0x8E), // Latin capital letter Z with caron
        0x2018 => Some(0x91), // Left single quotation mark
        0x2019 => Some(0x92), // Right single quotation mark
        0x201C => Some(0x93), // Left double quotation mark
        0x201D => Some(0x94), // Right double quotation mark
        0x2022 => Some(0x95), // Bullet
        0x2013 => Some(0x96), // En dash
        0x2014 => Some(0x97), // Em dash
        0x02DC => Some(0x98), // Small tilde
        0x2122 => Some(0x99), // Trade mark sign
        0x0161 => Some(0x9A), // Latin small letter s with caron
        0x203A => Some(0x9B), // Single right-pointing angle quotation
        0x0153 => Some(0x9C), // Latin small ligature oe
        0x017E => Some(0x9E), // Latin small letter z with caron
        0x0178 => Some(0x9F), // Latin capital letter Y with diaeresis
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{Direction, FontSpec, TextAlign};
    use crate::text::ParagraphLayout;

    fn text_block(fonts: &FontContext, text: &str) -> TextBlock {
        ParagraphLayout::new(fonts).layout(
            text,
            &FontSpec::regular(),
            10.0,
            300.0,
            Direction::Ltr,
            TextAlign::Start,
            None,
            1.2,
        )
    }

    #[test]
    fn test_escape_pdf_string() {
        assert_eq!(escape_pdf_string("a(b)c\\"), "a\\(b\\)c\\\\");
    }

    #[test]
    fn test_encode_winansi() {
        assert_eq!(encode_winansi("Hi (x)"), "Hi \\(x\\)");
        assert_eq!(encode_winansi("\u{2014}"), "\\227");
        assert_eq!(encode_winansi("a\u{200E}b"), "ab");
        assert_eq!(encode_winansi("\u{0645}"), "?");
    }

    #[test]
    fn test_empty_document_produces_valid_pdf() {
        let fonts = FontContext::new();
        let sink = PdfSink::new(&fonts);
        let bytes = sink.to_bytes().unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.7"));
        assert!(text.contains("/Count 0"));
        assert!(text.trim_end().ends_with("%%EOF"));
    }

    #[test]
    fn test_pages_and_text() {
        let fonts = FontContext::new();
        let mut sink = PdfSink::new(&fonts);
        for _ in 0..2 {
            let page = sink.start_page(595.28, 841.89);
            sink.draw_text(
                &text_block(&fonts, "Page {{pageNumber}} of {{totalPages}}"),
                Point::new(36.0, 800.0),
                Color::BLACK,
            );
            sink.finish_page(page);
        }
        assert_eq!(sink.page_count(), 2);
        let mut out = Vec::new();
        sink.write_document(&mut out).unwrap();
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("/Count 2"));
        assert!(text.contains("/BaseFont /Helvetica"));
        // Page tokens survive in the recording and are replaced on write
        assert!(sink.pages()[0].texts()[0].contains("{{pageNumber}}"));
    }

    #[test]
    fn test_page_number_substitution() {
        let fonts = FontContext::new();
        let mut table = FontTable::new(&fonts);
        let block = text_block(&fonts, "Page {{pageNumber}} of {{totalPages}}");
        let mut stream = String::new();
        write_command(
            &mut stream,
            &DrawCommand::Text {
                block,
                origin: Point::new(0.0, 0.0),
                color: Color::BLACK,
            },
            100.0,
            &mut table,
            3,
            7,
        );
        assert!(stream.contains("(Page 3 of 7) Tj"));
    }

    #[test]
    fn test_link_annotation_written() {
        let fonts = FontContext::new();
        let mut sink = PdfSink::new(&fonts);
        let page = sink.start_page(200.0, 200.0);
        sink.add_link(page, Rect::new(10.0, 20.0, 50.0, 10.0), "https://maps.example.com/?q=(1)");
        sink.finish_page(page);
        let text = String::from_utf8_lossy(&sink.to_bytes().unwrap()).to_string();
        assert!(text.contains("/Subtype /Link"));
        assert!(text.contains("/URI (https://maps.example.com/?q=\\(1\\))"));
        // y is flipped: 200 - 30 = 170
        assert!(text.contains("/Rect [10.00 170.00 60.00 180.00]"));
    }

    #[test]
    fn test_image_is_deflated_with_smask_only_when_needed() {
        let fonts = FontContext::new();
        let mut sink = PdfSink::new(&fonts);
        let page = sink.start_page(100.0, 100.0);
        let opaque = Bitmap::from_pixel(2, 2, image::Rgba([1, 2, 3, 255]));
        let translucent = Bitmap::from_pixel(2, 2, image::Rgba([1, 2, 3, 128]));
        sink.draw_image(&opaque, Rect::new(0.0, 0.0, 10.0, 10.0));
        sink.draw_image(&translucent, Rect::new(0.0, 0.0, 10.0, 10.0));
        sink.finish_page(page);
        assert!(sink.images[0].alpha.is_none());
        assert!(sink.images[1].alpha.is_some());
        let text = String::from_utf8_lossy(&sink.to_bytes().unwrap()).to_string();
        assert!(text.contains("/Im0"));
        assert!(text.contains("/Im1"));
        assert!(text.contains("/SMask"));
    }

    #[test]
    fn test_draw_outside_page_is_dropped() {
        let fonts = FontContext::new();
        let mut sink = PdfSink::new(&fonts);
        sink.draw_rect(Rect::new(0.0, 0.0, 1.0, 1.0), &Paint::fill(Color::BLACK));
        assert!(sink.pages().is_empty());
    }

    #[test]
    fn test_clip_and_dash_operators() {
        let fonts = FontContext::new();
        let mut table = FontTable::new(&fonts);
        let mut stream = String::new();
        write_command(
            &mut stream,
            &DrawCommand::PushClip(Rect::new(0.0, 0.0, 10.0, 10.0)),
            100.0,
            &mut table,
            1,
            1,
        );
        write_command(
            &mut stream,
            &DrawCommand::Rect {
                rect: Rect::new(0.0, 0.0, 10.0, 10.0),
                paint: Paint::stroke(Stroke::dashed(Color::BLACK, 1.0, [4.0, 3.0])),
            },
            100.0,
            &mut table,
            1,
            1,
        );
        write_command(&mut stream, &DrawCommand::PopClip, 100.0, &mut table, 1, 1);
        assert!(stream.contains("0.00 90.00 10.00 10.00 re\nW n"));
        assert!(stream.contains("[4.00 3.00] 0 d"));
        assert_eq!(stream.matches("q\n").count(), stream.matches("Q\n").count());
    }

    #[test]
    fn test_sanitize_font_name() {
        assert_eq!(sanitize_font_name("Noto Naskh Arabic", 400), "NotoNaskhArabic");
        assert_eq!(sanitize_font_name("Noto Sans", 700), "NotoSans-Bold");
        assert_eq!(sanitize_font_name("!!!", 400), "CustomFont");
    }

    #[test]
    fn test_tounicode_cmap_format() {
        let mut map = BTreeMap::new();
        map.insert(3u16, "A".to_string());
        map.insert(7u16, "\u{0644}\u{0627}".to_string());
        let cmap = build_tounicode_cmap(&map, "Test");
        assert!(cmap.contains("2 beginbfchar"));
        assert!(cmap.contains("<0003> <0041>"));
        assert!(cmap.contains("<0007> <06440627>"));
    }
}
