//! # OpenType Shaping
//!
//! Wraps rustybuzz to turn a directional run into positioned glyphs. Used
//! whenever a run is drawn with real font data: custom fonts in PDF output
//! and every run on the raster canvas. Arabic needs this for contextual
//! forms.
//!
//! Standard PDF fonts bypass shaping entirely.

/// A single glyph produced by OpenType shaping.
#[derive(Debug, Clone)]
pub struct ShapedGlyph {
    /// Real glyph ID from GSUB (not a Unicode codepoint).
    pub glyph_id: u16,
    /// Byte offset of the first character in the run that maps to this
    /// glyph.
    pub cluster: u32,
    /// Horizontal advance in font units.
    pub x_advance: i32,
    /// Horizontal offset from GPOS (kerning, mark positioning).
    pub x_offset: i32,
    /// Vertical offset from GPOS.
    pub y_offset: i32,
}

/// Shape a run with explicit direction.
///
/// RTL runs come back in visual order (leftmost glyph first) with
/// contextual forms applied. Returns `None` if the font data can't be
/// parsed.
pub fn shape_run(text: &str, font_data: &[u8], is_rtl: bool) -> Option<Vec<ShapedGlyph>> {
    let face = rustybuzz::Face::from_slice(font_data, 0)?;
    let mut buffer = rustybuzz::UnicodeBuffer::new();
    buffer.push_str(text);
    buffer.set_direction(if is_rtl {
        rustybuzz::Direction::RightToLeft
    } else {
        rustybuzz::Direction::LeftToRight
    });

    let output = rustybuzz::shape(&face, &[], buffer);
    let glyphs = output
        .glyph_infos()
        .iter()
        .zip(output.glyph_positions().iter())
        .map(|(info, pos)| ShapedGlyph {
            glyph_id: info.glyph_id as u16,
            cluster: info.cluster,
            x_advance: pos.x_advance,
            x_offset: pos.x_offset,
            y_offset: pos.y_offset,
        })
        .collect();
    Some(glyphs)
}

/// Compute the total advance width of shaped glyphs in points.
pub fn shaped_width(glyphs: &[ShapedGlyph], units_per_em: u16, font_size: f64) -> f64 {
    let scale = font_size / units_per_em as f64;
    glyphs.iter().map(|g| g.x_advance as f64 * scale).sum()
}

/// Units per em of a font, or `None` if it does not parse.
pub fn units_per_em(font_data: &[u8]) -> Option<u16> {
    ttf_parser::Face::parse(font_data, 0)
        .ok()
        .map(|f| f.units_per_em())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_invalid_font_returns_none() {
        assert!(shape_run("Hello", &[0, 1, 2, 3], false).is_none());
        assert!(units_per_em(&[]).is_none());
    }

    #[test]
    fn test_shaped_width() {
        let glyphs = vec![
            ShapedGlyph {
                glyph_id: 1,
                cluster: 0,
                x_advance: 500,
                x_offset: 0,
                y_offset: 0,
            },
            ShapedGlyph {
                glyph_id: 2,
                cluster: 1,
                x_advance: 250,
                x_offset: 0,
                y_offset: 0,
            },
        ];
        // 750 units at 1000 upem, 12pt = 9pt
        assert!((shaped_width(&glyphs, 1000, 12.0) - 9.0).abs() < 1e-9);
    }
}
