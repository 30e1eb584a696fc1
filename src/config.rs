//! # Render Configuration
//!
//! Every dimension, label and color the engine uses, with defaults that
//! produce an A4 daily report. Loaded from JSON; any field may be omitted.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};
use crate::model::InfoKey;
use crate::style::{Color, Edges, FontSpec};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderConfig {
    pub page: PageConfig,
    pub header: HeaderConfig,
    pub footer: FooterConfig,
    pub fonts: FontsConfig,
    pub body: BodyConfig,
    pub section: SectionConfig,
    pub table: TableConfig,
    pub photos: PhotoConfig,
    pub labels: Labels,
    pub colors: Palette,
}

impl RenderConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: RenderConfig =
            serde_json::from_str(json).map_err(|e| ReportError::parse("config", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Reject settings no layout could honor.
    pub fn validate(&self) -> Result<()> {
        let (w, h) = self.page.size.dimensions();
        if w <= self.page.margin.horizontal() || h <= self.page.margin.vertical() {
            return Err(ReportError::Config(format!(
                "margins {:?} leave no content area on a {:.0}x{:.0} page",
                self.page.margin, w, h
            )));
        }
        let t = &self.table;
        if !(0.0 < t.label_min_ratio && t.label_min_ratio <= t.label_max_ratio && t.label_max_ratio < 1.0)
        {
            return Err(ReportError::Config(format!(
                "table label ratios must satisfy 0 < min <= max < 1, got {} and {}",
                t.label_min_ratio, t.label_max_ratio
            )));
        }
        for (name, sizing) in [
            ("table", &self.table.sizing),
            ("caption", &self.photos.caption_sizing),
        ] {
            if sizing.step <= 0.0 || sizing.min <= 0.0 || sizing.min > sizing.max {
                return Err(ReportError::Config(format!(
                    "{} font sizing needs 0 < min <= max and a positive step",
                    name
                )));
            }
        }
        if self.photos.legacy_columns == 0 {
            return Err(ReportError::Config("legacy photo grid needs at least one column".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageConfig {
    pub size: PageSize,
    /// Page margins in points (1/72 inch).
    pub margin: Edges,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            size: PageSize::A4,
            margin: Edges::uniform(36.0),
        }
    }
}

/// Standard page sizes in points.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    A5,
    Letter,
    Custom {
        width: f64,
        height: f64,
    },
}

impl PageSize {
    /// Returns (width, height) in points.
    pub fn dimensions(&self) -> (f64, f64) {
        match self {
            PageSize::A4 => (595.28, 841.89),
            PageSize::A5 => (419.53, 595.28),
            PageSize::Letter => (612.0, 792.0),
            PageSize::Custom { width, height } => (*width, *height),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeaderConfig {
    /// Height of the band holding the logo and title.
    pub height: f64,
    pub title: String,
    pub title_font_size: f64,
    pub logo_max_width: f64,
    /// Space between the header band and the first content.
    pub gap_after: f64,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            height: 56.0,
            title: "Daily Site Report".to_string(),
            title_font_size: 18.0,
            logo_max_width: 96.0,
            gap_after: 12.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FooterConfig {
    /// Space reserved above the bottom margin.
    pub height: f64,
    pub font_size: f64,
    /// Left-aligned label. `{{pageNumber}}` and `{{totalPages}}` are
    /// substituted when the document is written.
    pub page_label: String,
    /// Right-aligned text. Falls back to the organization name.
    pub text: Option<String>,
}

impl Default for FooterConfig {
    fn default() -> Self {
        Self {
            height: 24.0,
            font_size: 8.0,
            page_label: "Page {{pageNumber}} of {{totalPages}}".to_string(),
            text: None,
        }
    }
}

/// A custom TrueType font to register before layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontEntry {
    /// Font family name (e.g. "NotoNaskhArabic").
    pub family: String,
    /// File path, base64-encoded font data, or a data URI.
    pub src: String,
    /// Font weight (100-900). Defaults to 400.
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    400
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FontsConfig {
    pub regular: FontSpec,
    pub bold: FontSpec,
    pub custom: Vec<FontEntry>,
}

impl Default for FontsConfig {
    fn default() -> Self {
        Self {
            regular: FontSpec::regular(),
            bold: FontSpec::bold(),
            custom: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BodyConfig {
    pub font_size: f64,
    pub line_spacing: f64,
    pub bullet: String,
    /// Indent of paragraph text past the bullet.
    pub bullet_indent: f64,
    pub paragraph_spacing: f64,
    pub min_orphan_lines: usize,
    pub min_widow_lines: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            font_size: 10.0,
            line_spacing: 1.3,
            bullet: "\u{2022}".to_string(),
            bullet_indent: 14.0,
            paragraph_spacing: 4.0,
            min_orphan_lines: 2,
            min_widow_lines: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionConfig {
    pub font_size: f64,
    /// Height of a section header row.
    pub height: f64,
    pub spacing_after: f64,
    /// Space around the divider drawn when a section ends.
    pub divider_gap: f64,
}

impl Default for SectionConfig {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            height: 22.0,
            spacing_after: 4.0,
            divider_gap: 8.0,
        }
    }
}

/// Autosize bounds: start at `max`, step down by `step`, stop at `min`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontSizing {
    pub max: f64,
    pub min: f64,
    pub step: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableConfig {
    pub label_min_ratio: f64,
    pub label_max_ratio: f64,
    pub padding_vertical: f64,
    pub padding_horizontal: f64,
    pub label_max_lines: usize,
    pub value_max_lines: usize,
    pub sizing: FontSizing,
    pub line_spacing: f64,
    pub border_width: f64,
    /// Gap left below a finished table.
    pub spacing_after: f64,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            label_min_ratio: 0.35,
            label_max_ratio: 0.40,
            padding_vertical: 5.0,
            padding_horizontal: 6.0,
            label_max_lines: 2,
            value_max_lines: 6,
            sizing: FontSizing {
                max: 10.0,
                min: 6.0,
                step: 1.0,
            },
            line_spacing: 1.2,
            border_width: 0.75,
            spacing_after: 6.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PhotoConfig {
    pub gutter: f64,
    pub caption_height: f64,
    pub caption_spacing: f64,
    /// Image height as a fraction of slot width.
    pub image_aspect: f64,
    pub caption_sizing: FontSizing,
    pub caption_max_lines: usize,
    pub caption_padding: f64,
    /// Longest edge requested from the image fetcher.
    pub max_image_dimension: u32,
    /// Columns in the legacy center-crop grid.
    pub legacy_columns: u32,
    /// Legacy cell height as a fraction of cell width (16:9).
    pub legacy_aspect: f64,
    pub legacy_gutter: f64,
    /// Bitmap pixels per point when composing standalone photo pages.
    pub compose_scale: f64,
    pub placeholder_dash: [f64; 2],
}

impl Default for PhotoConfig {
    fn default() -> Self {
        Self {
            gutter: 8.0,
            caption_height: 26.0,
            caption_spacing: 4.0,
            image_aspect: 0.75,
            caption_sizing: FontSizing {
                max: 9.0,
                min: 5.0,
                step: 1.0,
            },
            caption_max_lines: 2,
            caption_padding: 3.0,
            max_image_dimension: 1600,
            legacy_columns: 2,
            legacy_aspect: 9.0 / 16.0,
            legacy_gutter: 8.0,
            compose_scale: 2.0,
            placeholder_dash: [4.0, 3.0],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Labels {
    pub sections: SectionLabels,
    pub info: InfoLabels,
    pub labor: LaborLabels,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SectionLabels {
    pub info: String,
    pub activities: String,
    pub equipment: String,
    pub obstacles: String,
    pub labor: String,
    pub photos: String,
}

impl Default for SectionLabels {
    fn default() -> Self {
        Self {
            info: "Project Information".to_string(),
            activities: "Activities".to_string(),
            equipment: "Equipment".to_string(),
            obstacles: "Obstacles".to_string(),
            labor: "Labor".to_string(),
            photos: "Photos".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InfoLabels {
    pub project: String,
    pub owner: String,
    pub contractor: String,
    pub consultant: String,
    pub report_number: String,
    pub date: String,
    pub temperature: String,
    pub weather: String,
    pub location: String,
    pub created_by: String,
}

impl InfoLabels {
    pub fn label(&self, key: InfoKey) -> &str {
        match key {
            InfoKey::Project => &self.project,
            InfoKey::Owner => &self.owner,
            InfoKey::Contractor => &self.contractor,
            InfoKey::Consultant => &self.consultant,
            InfoKey::ReportNumber => &self.report_number,
            InfoKey::Date => &self.date,
            InfoKey::Temperature => &self.temperature,
            InfoKey::Weather => &self.weather,
            InfoKey::Location => &self.location,
            InfoKey::CreatedBy => &self.created_by,
        }
    }
}

impl Default for InfoLabels {
    fn default() -> Self {
        Self {
            project: "Project".to_string(),
            owner: "Owner".to_string(),
            contractor: "Contractor".to_string(),
            consultant: "Consultant".to_string(),
            report_number: "Report No.".to_string(),
            date: "Date".to_string(),
            temperature: "Temperature".to_string(),
            weather: "Weather".to_string(),
            location: "Location".to_string(),
            created_by: "Created By".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LaborLabels {
    pub skilled: String,
    pub unskilled: String,
    pub total: String,
}

impl Default for LaborLabels {
    fn default() -> Self {
        Self {
            skilled: "Skilled".to_string(),
            unskilled: "Unskilled".to_string(),
            total: "Total".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Palette {
    pub text: Color,
    pub muted: Color,
    pub title: Color,
    pub border: Color,
    pub divider: Color,
    pub row_tint: Color,
    pub label_text: Color,
    pub link: Color,
    pub placeholder_fill: Color,
    pub placeholder_border: Color,
    pub empty_slot: Color,
    pub caption_fill: Color,
    pub caption_border: Color,
    pub page_background: Color,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            text: Color::hex("#1F2328"),
            muted: Color::hex("#6B7280"),
            title: Color::hex("#0F3D5E"),
            border: Color::hex("#9CA3AF"),
            divider: Color::hex("#D1D5DB"),
            row_tint: Color::hex("#F3F4F6"),
            label_text: Color::hex("#374151"),
            link: Color::hex("#1D4ED8"),
            placeholder_fill: Color::hex("#D9D9D9"),
            placeholder_border: Color::hex("#8C8C8C"),
            empty_slot: Color::hex("#B0B0B0"),
            caption_fill: Color::hex("#F5F5F5"),
            caption_border: Color::hex("#C8C8C8"),
            page_background: Color::WHITE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = RenderConfig::default();
        cfg.validate().unwrap();
        let (w, h) = cfg.page.size.dimensions();
        assert!((w - 595.28).abs() < 0.01 && (h - 841.89).abs() < 0.01);
    }

    #[test]
    fn test_partial_json_keeps_other_defaults() {
        let cfg = RenderConfig::from_json(
            r#"{"header": {"title": "Rapport"}, "table": {"labelMaxRatio": 0.38}}"#,
        )
        .unwrap();
        assert_eq!(cfg.header.title, "Rapport");
        assert_eq!(cfg.header.title_font_size, 18.0);
        assert_eq!(cfg.table.label_max_ratio, 0.38);
        assert_eq!(cfg.table.label_min_ratio, 0.35);
    }

    #[test]
    fn test_custom_page_size() {
        let cfg = RenderConfig::from_json(
            r#"{"page": {"size": {"Custom": {"width": 300, "height": 400}}}}"#,
        )
        .unwrap();
        assert_eq!(cfg.page.size.dimensions(), (300.0, 400.0));
    }

    #[test]
    fn test_rejects_inverted_ratios() {
        let err = RenderConfig::from_json(
            r#"{"table": {"labelMinRatio": 0.5, "labelMaxRatio": 0.4}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ReportError::Config(_)));
    }

    #[test]
    fn test_rejects_margins_wider_than_page() {
        let err = RenderConfig::from_json(
            r#"{"page": {"size": "A5", "margin": {"top": 10, "right": 300, "bottom": 10, "left": 300}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no content area"));
    }

    #[test]
    fn test_bad_json_is_parse_error() {
        let err = RenderConfig::from_json("{").unwrap_err();
        assert!(matches!(err, ReportError::Parse { what: "config", .. }));
    }
}
