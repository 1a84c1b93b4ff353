//! Drawing attributes attached to a feature.
//!
//! Each feature carries its own [`Style`]; which parts are stored depends on
//! the feature type:
//!
//! | type                         | stored                               |
//! |------------------------------|--------------------------------------|
//! | Point, MultiPoint            | symbol                               |
//! | FontPoint                    | symbol, font                         |
//! | CustomPoint                  | symbol, font (bitmap file name)      |
//! | Polyline, Arc                | pen                                  |
//! | Region, Rectangle, Ellipse   | pen, brush                           |
//! | Text                         | pen (label line), font, text display |

use bitflags::bitflags;

use crate::errors::{MitabError, Result};

/// Colors are packed `0xRRGGBB`.
pub type Color = u32;

pub const BLACK: Color = 0x000000;
pub const WHITE: Color = 0xffffff;

/// Longest font or bitmap name a tool definition can hold.
pub const MAX_FONT_NAME: usize = 31;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Pen {
    /// Pixels (1-7).
    pub width: u8,
    /// Line pattern, 1 is none, 2 is solid.
    pub pattern: u8,
    pub style: u8,
    pub color: Color,
}

impl Default for Pen {
    fn default() -> Self {
        Pen {
            width: 1,
            pattern: 2,
            style: 0,
            color: BLACK,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Brush {
    /// Fill pattern, 1 is none, 2 is solid.
    pub pattern: u8,
    pub fg_color: Color,
    pub bg_color: Color,
    /// The background shows through the pattern.
    pub transparent: bool,
}

impl Default for Brush {
    fn default() -> Self {
        Brush {
            pattern: 2,
            fg_color: WHITE,
            bg_color: WHITE,
            transparent: false,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Symbol {
    /// Shape number; 32 to 67 for the standard MapInfo symbol set, a
    /// character code for font symbols.
    pub number: i16,
    /// Point size, 1 to 48.
    pub size: i16,
    pub color: Color,
}

impl Symbol {
    pub fn new(number: i16, size: i16, color: Color) -> Result<Symbol> {
        if !(32..=67).contains(&number) {
            return Err(MitabError::BadArgument(format!(
                "symbol number {number} is outside 32..=67"
            )));
        }
        if !(1..=48).contains(&size) {
            return Err(MitabError::BadArgument(format!(
                "symbol size {size} is outside 1..=48"
            )));
        }
        Ok(Symbol {
            number,
            size,
            color,
        })
    }
}

impl Default for Symbol {
    fn default() -> Self {
        Symbol {
            number: 35,
            size: 12,
            color: BLACK,
        }
    }
}

bitflags! {
    /// Font style bits, as used by MIF `Font` and `Symbol` clauses and the
    /// `.MAP` text and font symbol objects.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FontStyle: u16 {
        const BOLD = 0x0001;
        const ITALIC = 0x0002;
        const UNDERLINE = 0x0004;
        const STRIKEOUT = 0x0008;
        const OUTLINE = 0x0010;
        const SHADOW = 0x0020;
        const HALO = 0x0100;
        const ALL_CAPS = 0x0200;
        const EXPANDED = 0x0400;
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Font {
    name: String,
    pub style: FontStyle,
}

impl Font {
    pub fn new(name: &str, style: FontStyle) -> Result<Font> {
        if name.len() > MAX_FONT_NAME {
            return Err(MitabError::BadArgument(format!(
                "font name '{name}' is longer than {MAX_FONT_NAME} bytes"
            )));
        }
        Ok(Font {
            name: name.to_string(),
            style,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for Font {
    fn default() -> Self {
        Font {
            name: "Arial".to_string(),
            style: FontStyle::empty(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TextJustification {
    #[default]
    Left = 0,
    Center = 1,
    Right = 2,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TextSpacing {
    #[default]
    Single = 0,
    OneAndHalf = 1,
    Double = 2,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TextLineType {
    #[default]
    NoLine = 0,
    Simple = 1,
    Arrow = 2,
}

const ALIGN_CENTER: i16 = 0x0200;
const ALIGN_RIGHT: i16 = 0x0400;
const SPACING_ONE_AND_HALF: i16 = 0x0800;
const SPACING_DOUBLE: i16 = 0x1000;
const LINE_SIMPLE: i16 = 0x2000;
const LINE_ARROW: i16 = 0x4000;

/// Layout of a text label.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TextDisplay {
    /// Degrees counter-clockwise from the X axis.
    pub angle: f64,
    pub height: f64,
    pub width: f64,
    pub fg_color: Color,
    pub bg_color: Color,
    pub justification: TextJustification,
    pub spacing: TextSpacing,
    pub line_type: TextLineType,
}

impl Default for TextDisplay {
    fn default() -> Self {
        TextDisplay {
            angle: 0.0,
            height: 0.0,
            width: 0.0,
            fg_color: BLACK,
            bg_color: WHITE,
            justification: TextJustification::default(),
            spacing: TextSpacing::default(),
            line_type: TextLineType::default(),
        }
    }
}

impl TextDisplay {
    /// Packed justification/spacing/line bits of a `.MAP` text object.
    pub fn alignment_flags(&self) -> i16 {
        let mut flags = 0;
        flags |= match self.justification {
            TextJustification::Left => 0,
            TextJustification::Center => ALIGN_CENTER,
            TextJustification::Right => ALIGN_RIGHT,
        };
        flags |= match self.spacing {
            TextSpacing::Single => 0,
            TextSpacing::OneAndHalf => SPACING_ONE_AND_HALF,
            TextSpacing::Double => SPACING_DOUBLE,
        };
        flags |= match self.line_type {
            TextLineType::NoLine => 0,
            TextLineType::Simple => LINE_SIMPLE,
            TextLineType::Arrow => LINE_ARROW,
        };
        flags
    }

    pub fn set_alignment_flags(&mut self, flags: i16) {
        self.justification = if flags & ALIGN_CENTER != 0 {
            TextJustification::Center
        } else if flags & ALIGN_RIGHT != 0 {
            TextJustification::Right
        } else {
            TextJustification::Left
        };
        self.spacing = if flags & SPACING_ONE_AND_HALF != 0 {
            TextSpacing::OneAndHalf
        } else if flags & SPACING_DOUBLE != 0 {
            TextSpacing::Double
        } else {
            TextSpacing::Single
        };
        self.line_type = if flags & LINE_SIMPLE != 0 {
            TextLineType::Simple
        } else if flags & LINE_ARROW != 0 {
            TextLineType::Arrow
        } else {
            TextLineType::NoLine
        };
    }
}

/// Every drawing attribute a feature may carry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Style {
    pub pen: Pen,
    pub brush: Brush,
    pub symbol: Symbol,
    pub font: Font,
    pub text: TextDisplay,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_ranges() {
        assert!(Symbol::new(32, 1, BLACK).is_ok());
        assert!(Symbol::new(67, 48, BLACK).is_ok());
        assert!(Symbol::new(31, 12, BLACK).is_err());
        assert!(Symbol::new(35, 49, BLACK).is_err());
    }

    #[test]
    fn test_font_name_limit() {
        assert!(Font::new("Arial", FontStyle::BOLD).is_ok());
        assert!(Font::new(&"x".repeat(32), FontStyle::empty()).is_err());
    }

    #[test]
    fn test_alignment_flags() {
        let mut display = TextDisplay {
            justification: TextJustification::Right,
            spacing: TextSpacing::Double,
            line_type: TextLineType::Arrow,
            ..TextDisplay::default()
        };
        let flags = display.alignment_flags();
        assert_eq!(flags, 0x0400 | 0x1000 | 0x4000);

        display.set_alignment_flags(0x0200 | 0x0800 | 0x2000);
        assert_eq!(display.justification, TextJustification::Center);
        assert_eq!(display.spacing, TextSpacing::OneAndHalf);
        assert_eq!(display.line_type, TextLineType::Simple);

        display.set_alignment_flags(0);
        assert_eq!(display, TextDisplay::default());
    }
}
