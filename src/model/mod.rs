//! # Report Model
//!
//! The input data handed to the paginator, plus the typed mapping from
//! header fields to info-table rows. Everything here deserializes from
//! camelCase JSON with every field optional.

use serde::{Deserialize, Serialize};

use crate::config::InfoLabels;

/// Glyph shown for any header field that was left blank.
pub const PLACEHOLDER: &str = "\u{2014}";

/// Longest caption kept on a photo entry, in characters.
pub const MAX_CAPTION_CHARS: usize = 100;

/// A complete daily report. Immutable once handed to the paginator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportDocument {
    pub organization: Option<String>,
    pub project: Option<String>,
    pub owner: Option<String>,
    pub contractor: Option<String>,
    pub consultant: Option<String>,
    pub report_number: Option<String>,
    pub date: Option<String>,
    pub temperature: Option<String>,
    pub weather: Option<String>,
    pub created_by: Option<String>,
    pub location: Option<String>,
    pub map_link: Option<String>,
    /// Organization logo drawn in the header band of every page.
    pub logo: Option<ImageRef>,

    pub activities: Vec<String>,
    pub equipment: Vec<String>,
    pub obstacles: Vec<String>,
    pub labor: LaborSummary,

    pub photos: PhotoSource,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LaborSummary {
    pub skilled: Option<String>,
    pub unskilled: Option<String>,
    pub total: Option<String>,
}

impl LaborSummary {
    pub fn is_empty(&self) -> bool {
        [&self.skilled, &self.unskilled, &self.total]
            .iter()
            .all(|v| is_blank(v.as_deref()))
    }
}

/// Where the photo pages of a report come from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum PhotoSource {
    #[default]
    None,
    /// Pre-composed full-page images, one document page each.
    SitePages { pages: Vec<ImageRef> },
    /// Flat photo list laid out as a center-cropped thumbnail grid.
    Legacy { photos: Vec<ImageRef> },
    /// Template slots composed live onto document pages.
    #[serde(rename_all = "camelCase")]
    Template {
        template: Option<Template>,
        #[serde(default)]
        entries: Vec<PhotoEntry>,
    },
}

/// A reference to an image that the fetcher resolves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ImageRef {
    /// A path on the local filesystem.
    Local(String),
    /// An http(s) URL.
    Remote(String),
    /// A data URI or raw base64 payload.
    Inline(String),
}

impl ImageRef {
    /// Classify a source string. Data URIs and strings made only of base64
    /// characters are inline payloads; anything with a path separator, a
    /// file extension or other non-base64 characters is a local path.
    pub fn parse(src: &str) -> Self {
        let src = src.trim();
        if is_http_url(src) {
            ImageRef::Remote(src.to_string())
        } else if src.starts_with("data:") || looks_like_base64(src) {
            ImageRef::Inline(src.to_string())
        } else {
            ImageRef::Local(src.trim_start_matches("file://").to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ImageRef::Local(s) | ImageRef::Remote(s) | ImageRef::Inline(s) => s,
        }
    }
}

/// Shortest raw base64 string that can hold an encoded image.
const MIN_INLINE_CHARS: usize = 64;

fn looks_like_base64(src: &str) -> bool {
    if src.is_empty() || src.starts_with('/') || src.starts_with("file://") {
        return false;
    }
    let alphabet_only = src
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=') || c.is_whitespace());
    // Short alphanumeric strings with a slash are relative paths such as
    // `photos/IMG0012`.
    alphabet_only && !(src.contains('/') && src.len() < MIN_INLINE_CHARS)
}

impl From<String> for ImageRef {
    fn from(s: String) -> Self {
        ImageRef::parse(&s)
    }
}

impl From<&str> for ImageRef {
    fn from(s: &str) -> Self {
        ImageRef::parse(s)
    }
}

impl From<ImageRef> for String {
    fn from(r: ImageRef) -> Self {
        match r {
            ImageRef::Local(s) | ImageRef::Remote(s) | ImageRef::Inline(s) => s,
        }
    }
}

/// Typed identity of an info-table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InfoKey {
    Project,
    Owner,
    Contractor,
    Consultant,
    ReportNumber,
    Date,
    Temperature,
    Weather,
    Location,
    CreatedBy,
}

impl InfoKey {
    /// Table order.
    pub const ALL: [InfoKey; 10] = [
        InfoKey::Project,
        InfoKey::Owner,
        InfoKey::Contractor,
        InfoKey::Consultant,
        InfoKey::ReportNumber,
        InfoKey::Date,
        InfoKey::Temperature,
        InfoKey::Weather,
        InfoKey::Location,
        InfoKey::CreatedBy,
    ];
}

/// One row of the info table. Deserialized rows go through
/// [`ReportInfoEntry::new`], so blank values and unusable links are
/// normalized the same way as mapped ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawInfoEntry")]
pub struct ReportInfoEntry {
    #[serde(default)]
    pub key: Option<InfoKey>,
    pub label: String,
    pub value: String,
    #[serde(default)]
    pub link_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawInfoEntry {
    #[serde(default)]
    key: Option<InfoKey>,
    #[serde(default)]
    label: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    link_url: Option<String>,
}

impl From<RawInfoEntry> for ReportInfoEntry {
    fn from(raw: RawInfoEntry) -> Self {
        let entry = ReportInfoEntry::new(&raw.label, raw.value.as_deref(), raw.link_url.as_deref());
        match raw.key {
            Some(key) => entry.with_key(key),
            None => entry,
        }
    }
}

impl ReportInfoEntry {
    /// Build a row, substituting the placeholder for blank values and
    /// dropping links that are unusable or point at nothing.
    pub fn new(label: &str, value: Option<&str>, link_url: Option<&str>) -> Self {
        let value = match value.map(str::trim) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => PLACEHOLDER.to_string(),
        };
        let link_url = link_url
            .map(str::trim)
            .filter(|_| value != PLACEHOLDER)
            .filter(|url| is_http_url(url))
            .map(str::to_string);
        Self {
            key: None,
            label: label.to_string(),
            value,
            link_url,
        }
    }

    pub fn with_key(mut self, key: InfoKey) -> Self {
        self.key = Some(key);
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.value == PLACEHOLDER
    }
}

impl ReportDocument {
    /// Raw header value for a key.
    pub fn field(&self, key: InfoKey) -> Option<&str> {
        let v = match key {
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
        };
        v.as_deref()
    }

    /// Map the header fields onto info-table rows, in table order.
    pub fn info_entries(&self, labels: &InfoLabels) -> Vec<ReportInfoEntry> {
        InfoKey::ALL
            .iter()
            .map(|&key| {
                let link = match key {
                    InfoKey::Location => self.map_link.as_deref(),
                    _ => None,
                };
                ReportInfoEntry::new(labels.label(key), self.field(key), link).with_key(key)
            })
            .collect()
    }

    /// Labor rows, or nothing when every count is blank.
    pub fn labor_entries(&self, labels: &crate::config::LaborLabels) -> Vec<ReportInfoEntry> {
        if self.labor.is_empty() {
            return Vec::new();
        }
        vec![
            ReportInfoEntry::new(&labels.skilled, self.labor.skilled.as_deref(), None),
            ReportInfoEntry::new(&labels.unskilled, self.labor.unskilled.as_deref(), None),
            ReportInfoEntry::new(&labels.total, self.labor.total.as_deref(), None),
        ]
    }
}

/// A photo page layout: a grid of `columns` by `rows` with placed slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub columns: u32,
    pub rows: u32,
    #[serde(default)]
    pub slots: Vec<SlotSpec>,
}

/// Where one slot sits in the template grid. Its slot index is its
/// position in `Template::slots`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSpec {
    pub row: u32,
    pub col: u32,
    #[serde(default = "default_span")]
    pub col_span: u32,
}

fn default_span() -> u32 {
    1
}

impl SlotSpec {
    pub fn new(row: u32, col: u32, col_span: u32) -> Self {
        Self { row, col, col_span }
    }
}

/// Structural problems found by [`Template::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateIssue {
    ZeroColumns,
    ZeroRows,
    ColumnOutOfRange { slot: usize, col: u32 },
    SpanOverflow { slot: usize, col_span: u32 },
    RowOutOfRange { slot: usize, row: u32 },
    Overlap { first: usize, second: usize },
}

impl Template {
    /// A uniform grid with one slot per cell.
    pub fn uniform(id: &str, columns: u32, rows: u32) -> Self {
        let slots = (0..rows)
            .flat_map(|r| (0..columns).map(move |c| SlotSpec::new(r, c, 1)))
            .collect();
        Self {
            id: id.to_string(),
            columns,
            rows,
            slots,
        }
    }

    /// Report structural issues. Layout clamps these instead of failing,
    /// except for zero columns.
    pub fn validate(&self) -> Vec<TemplateIssue> {
        let mut issues = Vec::new();
        if self.columns == 0 {
            issues.push(TemplateIssue::ZeroColumns);
        }
        if self.rows == 0 {
            issues.push(TemplateIssue::ZeroRows);
        }
        for (i, slot) in self.slots.iter().enumerate() {
            if self.columns > 0 && slot.col >= self.columns {
                issues.push(TemplateIssue::ColumnOutOfRange {
                    slot: i,
                    col: slot.col,
                });
            } else if slot.col_span == 0 || slot.col + slot.col_span > self.columns {
                issues.push(TemplateIssue::SpanOverflow {
                    slot: i,
                    col_span: slot.col_span,
                });
            }
            if slot.row >= self.rows.max(1) {
                issues.push(TemplateIssue::RowOutOfRange {
                    slot: i,
                    row: slot.row,
                });
            }
        }
        for (i, a) in self.slots.iter().enumerate() {
            for (j, b) in self.slots.iter().enumerate().skip(i + 1) {
                let a_end = a.col + a.col_span.max(1);
                let b_end = b.col + b.col_span.max(1);
                if a.row == b.row && a.col < b_end && b.col < a_end {
                    issues.push(TemplateIssue::Overlap {
                        first: i,
                        second: j,
                    });
                }
            }
        }
        issues
    }
}

/// A photo placed in one template slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoEntry {
    #[serde(default)]
    pub template_id: String,
    #[serde(default)]
    pub page_index: u32,
    pub slot_index: u32,
    #[serde(rename = "imageRef")]
    pub image: ImageRef,
    #[serde(default, deserialize_with = "deserialize_caption")]
    pub caption: Option<String>,
}

impl PhotoEntry {
    pub fn new(
        template_id: &str,
        page_index: u32,
        slot_index: u32,
        image: ImageRef,
        caption: Option<&str>,
    ) -> Self {
        Self {
            template_id: template_id.to_string(),
            page_index,
            slot_index,
            image,
            caption: normalize_caption(caption),
        }
    }
}

/// Trim, cap at [`MAX_CAPTION_CHARS`] and drop blank captions.
pub fn normalize_caption(caption: Option<&str>) -> Option<String> {
    let trimmed = caption?.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(
        trimmed
            .chars()
            .take(MAX_CAPTION_CHARS)
            .collect::<String>()
            .trim_end()
            .to_string(),
    )
}

fn deserialize_caption<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(normalize_caption(raw.as_deref()))
}

pub fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

/// Absolute http or https URL with a host.
pub fn is_http_url(url: &str) -> bool {
    let rest = if let Some(r) = strip_prefix_ci(url, "https://") {
        r
    } else if let Some(r) = strip_prefix_ci(url, "http://") {
        r
    } else {
        return false;
    };
    let host = rest.split(['/', '?', '#']).next().unwrap_or("");
    !host.is_empty() && !host.contains(char::is_whitespace)
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len()
        && s.is_char_boundary(prefix.len())
        && s[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;

    #[test]
    fn test_blank_value_becomes_placeholder_and_drops_link() {
        let e = ReportInfoEntry::new("Location", Some("   "), Some("https://maps.example.com/x"));
        assert_eq!(e.value, PLACEHOLDER);
        assert!(e.link_url.is_none());
        let e = ReportInfoEntry::new("Location", None, Some("https://maps.example.com/x"));
        assert!(e.is_placeholder());
        assert!(e.link_url.is_none());
    }

    #[test]
    fn test_link_kept_only_for_http_urls() {
        let ok = ReportInfoEntry::new("Location", Some("Site A"), Some("https://maps.example.com/?q=1"));
        assert_eq!(ok.link_url.as_deref(), Some("https://maps.example.com/?q=1"));
        let rel = ReportInfoEntry::new("Location", Some("Site A"), Some("/maps/1"));
        assert!(rel.link_url.is_none());
        let js = ReportInfoEntry::new("Location", Some("Site A"), Some("javascript:alert(1)"));
        assert!(js.link_url.is_none());
        let bare = ReportInfoEntry::new("Location", Some("Site A"), Some("https://"));
        assert!(bare.link_url.is_none());
    }

    #[test]
    fn test_info_entries_follow_key_order() {
        let doc = ReportDocument {
            project: Some("Bridge 7".into()),
            date: Some("2024-05-01".into()),
            location: Some("North bank".into()),
            map_link: Some("https://maps.example.com/n".into()),
            ..Default::default()
        };
        let cfg = RenderConfig::default();
        let entries = doc.info_entries(&cfg.labels.info);
        assert_eq!(entries.len(), InfoKey::ALL.len());
        assert_eq!(entries[0].key, Some(InfoKey::Project));
        assert_eq!(entries[0].value, "Bridge 7");
        assert_eq!(entries[1].value, PLACEHOLDER);
        let loc = entries.iter().find(|e| e.key == Some(InfoKey::Location)).unwrap();
        assert!(loc.link_url.is_some());
        assert_eq!(doc.field(InfoKey::Date), Some("2024-05-01"));
    }

    #[test]
    fn test_caption_is_trimmed_and_capped() {
        assert_eq!(normalize_caption(Some("  hello  ")).as_deref(), Some("hello"));
        assert_eq!(normalize_caption(Some("   ")), None);
        let long = "x".repeat(250);
        assert_eq!(normalize_caption(Some(&long)).unwrap().chars().count(), MAX_CAPTION_CHARS);
    }

    #[test]
    fn test_image_ref_parsing() {
        assert!(matches!(ImageRef::parse("https://cdn.example.com/a.jpg"), ImageRef::Remote(_)));
        assert!(matches!(ImageRef::parse("/tmp/a.jpg"), ImageRef::Local(_)));
        assert!(matches!(ImageRef::parse("photos/a.png"), ImageRef::Local(_)));
        assert!(matches!(ImageRef::parse("data:image/png;base64,AAAA"), ImageRef::Inline(_)));
        assert!(matches!(ImageRef::parse("iVBORw0KGgo="), ImageRef::Inline(_)));
    }

    #[test]
    fn test_deserialized_entry_keeps_placeholder_and_link_rules() {
        let blank: ReportInfoEntry =
            serde_json::from_str(r#"{"label": "Owner", "value": "  ", "linkUrl": "https://example.com"}"#).unwrap();
        assert_eq!(blank.value, PLACEHOLDER);
        assert_eq!(blank.link_url, None);

        let unsafe_link: ReportInfoEntry =
            serde_json::from_str(r#"{"label": "Location", "value": "Site 4", "linkUrl": "javascript:alert(1)"}"#)
                .unwrap();
        assert_eq!(unsafe_link.value, "Site 4");
        assert_eq!(unsafe_link.link_url, None);

        let keyed: ReportInfoEntry = serde_json::from_str(
            r#"{"key": "location", "label": "Location", "value": "Site 4", "linkUrl": "https://maps.example.com/4"}"#,
        )
        .unwrap();
        assert_eq!(keyed.key, Some(InfoKey::Location));
        assert_eq!(keyed.link_url.as_deref(), Some("https://maps.example.com/4"));
    }

    #[test]
    fn test_extensionless_and_unknown_paths_are_local() {
        for src in ["photos/IMG_0012", "photos/IMG0012", "a.heic", "site\\day3\\north", "./scan"] {
            assert!(matches!(ImageRef::parse(src), ImageRef::Local(_)), "{src}");
        }
        // Long base64 payloads keep their slashes
        let payload = format!("iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJ/{}", "A".repeat(40));
        assert!(matches!(ImageRef::parse(&payload), ImageRef::Inline(_)));
    }

    #[test]
    fn test_validate_reports_overlap_and_range() {
        let t = Template {
            id: "t".into(),
            columns: 2,
            rows: 1,
            slots: vec![SlotSpec::new(0, 0, 2), SlotSpec::new(0, 1, 1), SlotSpec::new(0, 5, 1)],
        };
        let issues = t.validate();
        assert!(issues.contains(&TemplateIssue::Overlap { first: 0, second: 1 }));
        assert!(issues.contains(&TemplateIssue::ColumnOutOfRange { slot: 2, col: 5 }));
        assert!(Template::uniform("u", 2, 3).validate().is_empty());
    }

    #[test]
    fn test_document_from_json() {
        let json = r#"{
            "project": "Tower",
            "activities": ["Poured slab"],
            "photos": {"kind": "template",
                       "template": {"id": "t2", "columns": 2, "rows": 1,
                                    "slots": [{"row": 0, "col": 0}, {"row": 0, "col": 1}]},
                       "entries": [{"slotIndex": 1, "imageRef": "./a.jpg", "caption": "  east  "}]}
        }"#;
        let doc: ReportDocument = serde_json::from_str(json).unwrap();
        assert_eq!(doc.project.as_deref(), Some("Tower"));
        match doc.photos {
            PhotoSource::Template { template, entries } => {
                assert_eq!(template.unwrap().slots[0].col_span, 1);
                assert_eq!(entries[0].caption.as_deref(), Some("east"));
                assert_eq!(entries[0].image, ImageRef::Local("./a.jpg".into()));
            }
            other => panic!("unexpected photo source: {:?}", other),
        }
    }
}
