//! # Font Management
//!
//! Measurement and drawing handles for report text.
//!
//! Helvetica and Helvetica-Bold are always available as standard PDF fonts
//! and need no embedding. Custom TrueType fonts (for Arabic and other
//! scripts outside WinAnsi) are registered from configuration and parsed
//! with ttf-parser. Any family that is not registered falls back to
//! Helvetica.
//!
//! Raster output needs real outlines, which the standard fonts do not
//! ship. [`FontContext::outline_data`] returns the registered font data or a
//! sans-serif face found in the system font directories.

pub mod metrics;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::config::FontEntry;
use crate::error::{ReportError, Result};
use crate::style::FontSpec;
pub use metrics::StandardFontMetrics;

/// Invisible characters that take no horizontal space.
pub fn is_zero_width(ch: char) -> bool {
    matches!(
        ch,
        '\u{00AD}' | '\u{200B}'..='\u{200F}' | '\u{202A}'..='\u{202E}' | '\u{2060}'..='\u{2069}' | '\u{FEFF}'
    )
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct FontKey {
    pub family: String,
    /// Snapped to 400 or 700.
    pub weight: u32,
}

impl FontKey {
    pub fn new(family: &str, weight: u32) -> Self {
        Self {
            family: family.to_string(),
            weight: snap_weight(weight),
        }
    }

    pub fn from_spec(spec: &FontSpec) -> Self {
        Self::new(&spec.family, spec.weight)
    }
}

fn snap_weight(weight: u32) -> u32 {
    if weight >= 600 {
        700
    } else {
        400
    }
}

/// The standard faces the report draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StandardFont {
    Helvetica,
    HelveticaBold,
}

impl StandardFont {
    /// The PDF name for this font.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::HelveticaBold => "Helvetica-Bold",
        }
    }

    pub fn metrics(&self) -> &'static StandardFontMetrics {
        match self {
            Self::Helvetica => &metrics::HELVETICA,
            Self::HelveticaBold => &metrics::HELVETICA_BOLD,
        }
    }

    pub fn is_bold(&self) -> bool {
        matches!(self, Self::HelveticaBold)
    }
}

/// Parsed metrics from a TrueType/OpenType font via ttf-parser.
#[derive(Debug, Clone)]
pub struct CustomFontMetrics {
    pub units_per_em: u16,
    pub advance_widths: HashMap<char, u16>,
    pub default_advance: u16,
    pub ascender: i16,
    pub descender: i16,
    /// Maps characters to their glyph IDs in the font.
    pub glyph_ids: HashMap<char, u16>,
}

impl CustomFontMetrics {
    /// Get the advance width of a character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        if is_zero_width(ch) {
            return 0.0;
        }
        let w = self
            .advance_widths
            .get(&ch)
            .copied()
            .unwrap_or(self.default_advance);
        (w as f64 / self.units_per_em as f64) * font_size
    }

    /// Parse metrics from font data. Walks the Unicode cmap subtables so
    /// only mapped code points are visited.
    pub fn from_font_data(data: &[u8]) -> Option<Self> {
        let face = ttf_parser::Face::parse(data, 0).ok()?;
        let units_per_em = face.units_per_em();

        let mut advance_widths = HashMap::new();
        let mut glyph_ids = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|code| {
                    let Some(ch) = char::from_u32(code) else {
                        return;
                    };
                    if let Some(gid) = subtable.glyph_index(code) {
                        advance_widths
                            .entry(ch)
                            .or_insert_with(|| face.glyph_hor_advance(gid).unwrap_or(0));
                        glyph_ids.entry(ch).or_insert(gid.0);
                    }
                });
            }
        }

        let default_advance = advance_widths
            .get(&' ')
            .copied()
            .filter(|&w| w > 0)
            .unwrap_or(units_per_em / 2);

        Some(CustomFontMetrics {
            units_per_em,
            advance_widths,
            default_advance,
            ascender: face.ascender(),
            descender: face.descender(),
            glyph_ids,
        })
    }
}

#[derive(Debug, Clone)]
pub enum FontData {
    /// One of the standard PDF fonts. No embedding needed.
    Standard(StandardFont),
    /// A TrueType/OpenType font that is embedded in full.
    Custom {
        data: Arc<Vec<u8>>,
        metrics: CustomFontMetrics,
    },
}

/// A font registry that maps family + weight to font data.
pub struct FontRegistry {
    fonts: HashMap<FontKey, FontData>,
}

impl Default for FontRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        let mut fonts = HashMap::new();
        fonts.insert(
            FontKey::new("Helvetica", 400),
            FontData::Standard(StandardFont::Helvetica),
        );
        fonts.insert(
            FontKey::new("Helvetica", 700),
            FontData::Standard(StandardFont::HelveticaBold),
        );
        Self { fonts }
    }

    /// Look up a font, falling back to Helvetica of the same weight.
    pub fn resolve(&self, family: &str, weight: u32) -> &FontData {
        let key = FontKey::new(family, weight);
        if let Some(font) = self.fonts.get(&key) {
            return font;
        }
        // A regular custom face beats Helvetica for a missing bold variant
        if let Some(font) = self.fonts.get(&FontKey::new(family, 400)) {
            return font;
        }
        if key.weight >= 700 {
            &HELVETICA_BOLD_DATA
        } else {
            &HELVETICA_DATA
        }
    }

    /// Register a custom font. Fails when the data is not a parsable font.
    pub fn register(&mut self, family: &str, weight: u32, data: Vec<u8>) -> Result<()> {
        let metrics = CustomFontMetrics::from_font_data(&data).ok_or_else(|| {
            ReportError::Font(format!("'{}' is not a valid TrueType/OpenType font", family))
        })?;
        debug!(family, weight, glyphs = metrics.glyph_ids.len(), "registered custom font");
        self.fonts.insert(
            FontKey::new(family, weight),
            FontData::Custom {
                data: Arc::new(data),
                metrics,
            },
        );
        Ok(())
    }

    /// Iterate over all registered fonts.
    pub fn iter(&self) -> impl Iterator<Item = (&FontKey, &FontData)> {
        self.fonts.iter()
    }
}

static HELVETICA_DATA: FontData = FontData::Standard(StandardFont::Helvetica);
static HELVETICA_BOLD_DATA: FontData = FontData::Standard(StandardFont::HelveticaBold);

/// Shared font context used by layout, the raster canvas and PDF output.
pub struct FontContext {
    registry: FontRegistry,
}

impl Default for FontContext {
    fn default() -> Self {
        Self::new()
    }
}

impl FontContext {
    pub fn new() -> Self {
        Self {
            registry: FontRegistry::new(),
        }
    }

    /// Build a context with the configured custom fonts registered.
    pub fn with_entries(entries: &[FontEntry]) -> Result<Self> {
        let mut ctx = Self::new();
        for entry in entries {
            ctx.register_entry(entry)?;
        }
        Ok(ctx)
    }

    pub fn register(&mut self, family: &str, weight: u32, data: Vec<u8>) -> Result<()> {
        self.registry.register(family, weight, data)
    }

    /// Load a configured font from a path, data URI or base64 payload.
    pub fn register_entry(&mut self, entry: &FontEntry) -> Result<()> {
        let data = read_font_source(&entry.src).map_err(|e| {
            ReportError::Font(format!("could not load font '{}': {}", entry.family, e))
        })?;
        self.register(&entry.family, entry.weight, data)
    }

    /// Resolve a font spec to its font data.
    pub fn resolve(&self, spec: &FontSpec) -> &FontData {
        self.registry.resolve(&spec.family, spec.weight)
    }

    /// Get the advance width of a single character in points.
    pub fn char_width(&self, ch: char, spec: &FontSpec, font_size: f64) -> f64 {
        match self.resolve(spec) {
            FontData::Standard(std_font) => std_font.metrics().char_width(ch, font_size),
            FontData::Custom { metrics, .. } => metrics.char_width(ch, font_size),
        }
    }

    /// Measure the width of a string in points.
    pub fn measure(&self, text: &str, spec: &FontSpec, font_size: f64) -> f64 {
        match self.resolve(spec) {
            FontData::Standard(std_font) => std_font.metrics().measure_string(text, font_size),
            FontData::Custom { metrics, .. } => {
                text.chars().map(|c| metrics.char_width(c, font_size)).sum()
            }
        }
    }

    /// Distance from the top of a line box to the baseline, in points.
    pub fn ascent(&self, spec: &FontSpec, font_size: f64) -> f64 {
        match self.resolve(spec) {
            FontData::Standard(std_font) => {
                std_font.metrics().ascender as f64 / 1000.0 * font_size
            }
            FontData::Custom { metrics, .. } => {
                metrics.ascender as f64 / metrics.units_per_em as f64 * font_size
            }
        }
    }

    /// Depth below the baseline (positive), in points.
    pub fn descent(&self, spec: &FontSpec, font_size: f64) -> f64 {
        match self.resolve(spec) {
            FontData::Standard(std_font) => {
                -(std_font.metrics().descender as f64) / 1000.0 * font_size
            }
            FontData::Custom { metrics, .. } => {
                -(metrics.descender as f64) / metrics.units_per_em as f64 * font_size
            }
        }
    }

    /// Font bytes with outlines for raster drawing: the registered custom
    /// face, else a system sans-serif of the same weight.
    pub fn outline_data(&self, spec: &FontSpec) -> Option<Arc<Vec<u8>>> {
        match self.resolve(spec) {
            FontData::Custom { data, .. } => Some(Arc::clone(data)),
            FontData::Standard(std_font) => system_sans(std_font.is_bold()),
        }
    }

    /// Access the underlying font registry.
    pub fn registry(&self) -> &FontRegistry {
        &self.registry
    }
}

fn read_font_source(src: &str) -> std::result::Result<Vec<u8>, String> {
    use base64::Engine;
    let src = src.trim();
    if let Some(rest) = src.strip_prefix("data:") {
        let comma = rest.find(',').ok_or("invalid data URI: missing comma")?;
        return base64::engine::general_purpose::STANDARD
            .decode(&rest[comma + 1..])
            .map_err(|e| format!("base64 decode error: {}", e));
    }
    let lower = src.to_ascii_lowercase();
    if lower.ends_with(".ttf") || lower.ends_with(".otf") || Path::new(src).is_file() {
        return std::fs::read(src).map_err(|e| format!("failed to read '{}': {}", src, e));
    }
    base64::engine::general_purpose::STANDARD
        .decode(src)
        .map_err(|e| format!("base64 decode error: {}", e))
}

const REGULAR_CANDIDATES: &[&str] = &[
    "DejaVuSans.ttf",
    "LiberationSans-Regular.ttf",
    "NotoSans-Regular.ttf",
    "Arial.ttf",
    "arial.ttf",
];

const BOLD_CANDIDATES: &[&str] = &[
    "DejaVuSans-Bold.ttf",
    "LiberationSans-Bold.ttf",
    "NotoSans-Bold.ttf",
    "Arial Bold.ttf",
    "arialbd.ttf",
];

static SYSTEM_REGULAR: OnceLock<Option<Arc<Vec<u8>>>> = OnceLock::new();
static SYSTEM_BOLD: OnceLock<Option<Arc<Vec<u8>>>> = OnceLock::new();

fn system_sans(bold: bool) -> Option<Arc<Vec<u8>>> {
    let (cell, candidates) = if bold {
        (&SYSTEM_BOLD, BOLD_CANDIDATES)
    } else {
        (&SYSTEM_REGULAR, REGULAR_CANDIDATES)
    };
    cell.get_or_init(|| {
        let found = find_system_font(candidates).or_else(|| {
            // Any weight beats no text at all
            if bold {
                find_system_font(REGULAR_CANDIDATES)
            } else {
                None
            }
        });
        if found.is_none() {
            warn!("no system sans-serif font found; raster captions will be blank");
        }
        found
    })
    .clone()
}

fn find_system_font(candidates: &[&str]) -> Option<Arc<Vec<u8>>> {
    for dir in system_font_dirs() {
        for name in candidates {
            if let Some(path) = find_file(&dir, name, 4) {
                let Ok(bytes) = std::fs::read(&path) else {
                    continue;
                };
                if ttf_parser::Face::parse(&bytes, 0).is_ok() {
                    debug!(path = %path.display(), "using system font for raster text");
                    return Some(Arc::new(bytes));
                }
            }
        }
    }
    None
}

fn find_file(dir: &Path, name: &str, depth: usize) -> Option<PathBuf> {
    let direct = dir.join(name);
    if direct.is_file() {
        return Some(direct);
    }
    if depth == 0 {
        return None;
    }
    let entries = std::fs::read_dir(dir).ok()?;
    let mut subdirs: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    subdirs.sort();
    subdirs
        .iter()
        .find_map(|sub| find_file(sub, name, depth - 1))
}

fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(extra) = std::env::var("SITEREPORT_FONT_DIR") {
        dirs.push(PathBuf::from(extra));
    }

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
        if let Ok(windir) = std::env::var("WINDIR") {
            dirs.push(PathBuf::from(windir).join("Fonts"));
        }
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join("Library/Fonts"));
        }
    }

    dirs
}
