//! Glyph advance widths for the standard Helvetica faces, in 1/1000 em,
//! taken from the Adobe AFM files. Only the faces the report uses are here.

/// Widths for U+0020..=U+007E.
const HELVETICA_ASCII: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // space../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

const HELVETICA_BOLD_ASCII: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // space../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0..?
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // P.._
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // `..o
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // p..~
];

/// Metrics for one standard face.
#[derive(Debug)]
pub struct StandardFontMetrics {
    ascii: &'static [u16; 95],
    bold: bool,
    /// Ascender in 1/1000 em.
    pub ascender: i16,
    /// Descender in 1/1000 em (negative).
    pub descender: i16,
}

pub static HELVETICA: StandardFontMetrics = StandardFontMetrics {
    ascii: &HELVETICA_ASCII,
    bold: false,
    ascender: 718,
    descender: -207,
};

pub static HELVETICA_BOLD: StandardFontMetrics = StandardFontMetrics {
    ascii: &HELVETICA_BOLD_ASCII,
    bold: true,
    ascender: 718,
    descender: -207,
};

impl StandardFontMetrics {
    /// Advance width in 1/1000 em.
    pub fn advance(&self, ch: char) -> u16 {
        let cp = ch as u32;
        if (0x20..=0x7E).contains(&cp) {
            return self.ascii[(cp - 0x20) as usize];
        }
        if super::is_zero_width(ch) {
            return 0;
        }
        match ch {
            '\u{00A0}' => 278,
            '\u{2022}' => 350,
            '\u{2013}' | '\u{20AC}' => 556,
            '\u{2014}' | '\u{2026}' | '\u{2030}' => 1000,
            '\u{2018}' | '\u{2019}' | '\u{201A}' => {
                if self.bold {
                    278
                } else {
                    222
                }
            }
            '\u{201C}' | '\u{201D}' | '\u{201E}' => {
                if self.bold {
                    500
                } else {
                    333
                }
            }
            '\u{00B0}' => 400,
            '\u{00B7}' => 278,
            '\u{00D7}' | '\u{00F7}' | '\u{00B1}' => 584,
            '\u{00B2}' | '\u{00B3}' | '\u{00B9}' => 333,
            '\u{00A9}' | '\u{00AE}' => 737,
            _ => self.latin1_fallback(ch),
        }
    }

    /// Accented Latin-1 letters take the width of their base letter.
    fn latin1_fallback(&self, ch: char) -> u16 {
        let base = match ch {
            'À'..='Å' => 'A',
            'Æ' => return 1000,
            'Ç' => 'C',
            'È'..='Ë' => 'E',
            'Ì'..='Ï' => 'I',
            'Ñ' => 'N',
            'Ò'..='Ö' | 'Ø' => 'O',
            'Ù'..='Ü' => 'U',
            'Ý' => 'Y',
            'ß' => return 611,
            'à'..='å' => 'a',
            'æ' => return 889,
            'ç' => 'c',
            'è'..='ë' => 'e',
            'ì'..='ï' => return 278,
            'ñ' => 'n',
            'ò'..='ö' | 'ø' => 'o',
            'ù'..='ü' => 'u',
            'ý' | 'ÿ' => 'y',
            _ => return 556,
        };
        self.ascii[(base as u32 - 0x20) as usize]
    }

    /// Width of a character in points.
    pub fn char_width(&self, ch: char, font_size: f64) -> f64 {
        self.advance(ch) as f64 / 1000.0 * font_size
    }

    /// Width of a string in points.
    pub fn measure_string(&self, text: &str, font_size: f64) -> f64 {
        text.chars().map(|c| self.char_width(c, font_size)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_widths() {
        assert_eq!(HELVETICA.advance(' '), 278);
        assert_eq!(HELVETICA.advance('A'), 667);
        assert_eq!(HELVETICA.advance('~'), 584);
        assert_eq!(HELVETICA_BOLD.advance('A'), 722);
        assert_eq!(HELVETICA_BOLD.advance('b'), 611);
    }

    #[test]
    fn test_accented_letters_use_base_width() {
        assert_eq!(HELVETICA.advance('é'), HELVETICA.advance('e'));
        assert_eq!(HELVETICA_BOLD.advance('Ü'), HELVETICA_BOLD.advance('U'));
    }

    #[test]
    fn test_directional_marks_have_no_width() {
        assert_eq!(HELVETICA.advance('\u{200E}'), 0);
        assert_eq!(HELVETICA.advance('\u{200F}'), 0);
    }
}
