//! Geometry bodies and style clauses of MIF features.

use geo_types::{coord, Coord};

use crate::errors::{MitabError, Result};
use crate::tab::map::object::estimated_text_width;
use crate::vector::{
    Brush, Font, FontStyle, Geometry, Pen, Style, Symbol, TextJustification, TextLineType,
    TextSpacing,
};

use super::lexer::{quote, Cursor, Token};

/// Parse one feature, from its geometry keyword up to the next feature.
pub fn parse_feature(lines: &[String], first_line_no: usize) -> Result<(Option<Geometry>, Style)> {
    let mut cursor = Cursor::new(lines, first_line_no);
    let mut style = Style::default();
    let Some(keyword) = cursor.token() else {
        return Ok((None, style));
    };
    let mut geometry = match keyword.text().to_ascii_lowercase().as_str() {
        "none" => None,
        "point" => Some(Geometry::Point(cursor.coord()?)),
        "line" => {
            let a = cursor.coord()?;
            let b = cursor.coord()?;
            Some(Geometry::polyline(vec![vec![a, b]]))
        }
        "pline" => {
            let multiple = matches!(cursor.peek(), Some(t) if t.is_word("multiple"));
            let parts = if multiple {
                cursor.token();
                let k = cursor.count()?;
                let mut parts = Vec::with_capacity(k);
                for _ in 0..k {
                    let n = cursor.count()?;
                    parts.push(cursor.coords(n)?);
                }
                parts
            } else {
                let n = cursor.count()?;
                vec![cursor.coords(n)?]
            };
            Some(Geometry::polyline(parts))
        }
        "region" => {
            let k = cursor.count()?;
            let mut rings = Vec::with_capacity(k);
            for _ in 0..k {
                let n = cursor.count()?;
                rings.push(cursor.coords(n)?);
            }
            Some(Geometry::region(rings))
        }
        "arc" => {
            let (center, x_radius, y_radius) = ellipse_in(cursor.coord()?, cursor.coord()?);
            let start_angle = cursor.number()?;
            let end_angle = cursor.number()?;
            Some(Geometry::arc(
                center,
                x_radius,
                y_radius,
                start_angle,
                end_angle,
            ))
        }
        "text" => {
            let text = match cursor.token() {
                Some(Token::Str(s)) => unescape(&s),
                _ => return Err(cursor.error("Text without a quoted string")),
            };
            let a = cursor.coord()?;
            let b = cursor.coord()?;
            style.text.width = (b.x - a.x).abs();
            style.text.height = (b.y - a.y).abs();
            let origin = coord! { x: a.x.min(b.x), y: a.y.min(b.y) };
            Some(Geometry::text(origin, &text))
        }
        "rect" => Some(Geometry::rectangle(cursor.coord()?, cursor.coord()?)),
        "roundrect" => {
            let mut rect = Geometry::rectangle(cursor.coord()?, cursor.coord()?);
            let radius = cursor.number()? / 2.0;
            if let Geometry::Rectangle { corner_radius, .. } = &mut rect {
                *corner_radius = Some((radius, radius));
            }
            Some(rect)
        }
        "ellipse" => {
            let (center, x_radius, y_radius) = ellipse_in(cursor.coord()?, cursor.coord()?);
            Some(Geometry::ellipse(center, x_radius, y_radius))
        }
        "multipoint" => {
            let n = cursor.count()?;
            Some(Geometry::MultiPoint(cursor.coords(n)?))
        }
        other => return Err(cursor.error(format!("unknown geometry keyword '{other}'"))),
    };

    while let Some(tokens) = cursor.next_line() {
        let Some(Token::Word(keyword)) = tokens.first() else {
            continue;
        };
        let mut clause = Clause {
            tokens: &tokens[1..],
            pos: 0,
            line: cursor.line_no(),
        };
        match keyword.to_ascii_lowercase().as_str() {
            "pen" => {
                style.pen = Pen {
                    width: clause.int()?,
                    pattern: clause.int()?,
                    color: clause.int()?,
                    ..Pen::default()
                }
            }
            "brush" => {
                let pattern = clause.int()?;
                let fg_color = clause.int()?;
                let bg_color = clause.optional_int()?;
                style.brush = Brush {
                    pattern,
                    fg_color,
                    bg_color: bg_color.unwrap_or(fg_color),
                    transparent: bg_color.is_none(),
                };
            }
            "symbol" => parse_symbol(&mut clause, &mut style, &mut geometry)?,
            "font" => {
                let name = clause.string()?;
                let font_style = FontStyle::from_bits_truncate(clause.int()?);
                let _size: f64 = clause.number()?;
                style.font = clause.font(&name, font_style)?;
                style.text.fg_color = clause.int()?;
                if let Some(bg) = clause.optional_int()? {
                    style.text.bg_color = bg;
                }
            }
            "smooth" => {
                if let Some(Geometry::Polyline { smooth, .. }) = &mut geometry {
                    *smooth = true;
                }
            }
            "center" => {
                let c = coord! { x: clause.number()?, y: clause.number()? };
                if let Some(Geometry::Region { centroid, .. }) = &mut geometry {
                    *centroid = Some(c);
                }
            }
            "angle" => style.text.angle = clause.number()?,
            "justify" => {
                style.text.justification = match clause.word()?.to_ascii_lowercase().as_str() {
                    "center" => TextJustification::Center,
                    "right" => TextJustification::Right,
                    _ => TextJustification::Left,
                }
            }
            "spacing" => {
                let spacing = clause.number()?;
                style.text.spacing = if spacing >= 2.0 {
                    TextSpacing::Double
                } else if spacing >= 1.5 {
                    TextSpacing::OneAndHalf
                } else {
                    TextSpacing::Single
                };
            }
            "label" => {
                // Label Line Simple|Arrow x y
                clause.word()?;
                let line_type = match clause.word()?.to_ascii_lowercase().as_str() {
                    "arrow" => TextLineType::Arrow,
                    _ => TextLineType::Simple,
                };
                let end = coord! { x: clause.number()?, y: clause.number()? };
                style.text.line_type = line_type;
                if let Some(Geometry::Text { line_end, .. }) = &mut geometry {
                    *line_end = end;
                }
            }
            _ => log::warn!(
                "Ignoring unknown MIF clause '{keyword}' on line {}",
                clause.line
            ),
        }
    }
    Ok((geometry, style))
}

/// Point symbols come in three forms: `Symbol (shape,color,size)`,
/// `Symbol (shape,color,size,"font",style,angle)` and
/// `Symbol ("bitmap",color,size,style)`.
fn parse_symbol(
    clause: &mut Clause<'_>,
    style: &mut Style,
    geometry: &mut Option<Geometry>,
) -> Result<()> {
    let position = match geometry {
        Some(Geometry::Point(p)) => Some(*p),
        _ => None,
    };
    if let Some(Token::Str(name)) = clause.tokens.first() {
        let name = name.clone();
        clause.pos = 1;
        style.symbol.color = clause.int()?;
        style.symbol.size = clause.int()?;
        let custom_style = clause.optional_int()?.unwrap_or(0);
        style.font = clause.font(&name, FontStyle::empty())?;
        if let Some(position) = position {
            *geometry = Some(Geometry::CustomPoint {
                position,
                custom_style,
            });
        }
        return Ok(());
    }
    style.symbol = Symbol {
        number: clause.int()?,
        color: clause.int()?,
        size: clause.int()?,
    };
    if clause.pos < clause.tokens.len() {
        let name = clause.string()?;
        let font_style = FontStyle::from_bits_truncate(clause.int()?);
        let angle = clause.optional_number()?.unwrap_or(0.0);
        style.font = clause.font(&name, font_style)?;
        if let Some(position) = position {
            *geometry = Some(Geometry::FontPoint { position, angle });
        }
    }
    Ok(())
}

/// Arguments of a style clause.
struct Clause<'a> {
    tokens: &'a [Token],
    pos: usize,
    line: usize,
}

impl<'a> Clause<'a> {
    fn error(&self, msg: String) -> MitabError {
        MitabError::ParseError {
            line: self.line,
            msg,
        }
    }

    fn next(&mut self) -> Result<&'a Token> {
        let tokens = self.tokens;
        let token = tokens
            .get(self.pos)
            .ok_or_else(|| self.error("missing clause argument".to_string()))?;
        self.pos += 1;
        Ok(token)
    }

    fn word(&mut self) -> Result<String> {
        Ok(self.next()?.text().to_string())
    }

    fn string(&mut self) -> Result<String> {
        match self.next()? {
            Token::Str(s) => Ok(s.clone()),
            Token::Word(w) => Err(self.error(format!("expected a quoted string, got '{w}'"))),
        }
    }

    fn number(&mut self) -> Result<f64> {
        let text = self.next()?.text().to_string();
        text.parse()
            .map_err(|_| self.error(format!("expected a number, got '{text}'")))
    }

    fn optional_number(&mut self) -> Result<Option<f64>> {
        if self.pos >= self.tokens.len() {
            return Ok(None);
        }
        self.number().map(Some)
    }

    fn int<T: TryFrom<i64>>(&mut self) -> Result<T> {
        let v = self.number()?;
        T::try_from(v as i64).map_err(|_| self.error(format!("{v} is out of range")))
    }

    fn optional_int<T: TryFrom<i64>>(&mut self) -> Result<Option<T>> {
        if self.pos >= self.tokens.len() {
            return Ok(None);
        }
        self.int().map(Some)
    }

    fn font(&self, name: &str, style: FontStyle) -> Result<Font> {
        Font::new(name, style).map_err(|e| self.error(e.to_string()))
    }
}

/// Center and radii of the ellipse inscribed in the box `a`-`b`.
fn ellipse_in(a: Coord, b: Coord) -> (Coord, f64, f64) {
    (
        coord! { x: (a.x + b.x) / 2.0, y: (a.y + b.y) / 2.0 },
        (b.x - a.x).abs() / 2.0,
        (b.y - a.y).abs() / 2.0,
    )
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\n', "\\n")
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn push_coords(out: &mut String, coords: &[Coord]) {
    for c in coords {
        out.push_str(&format!("{} {}\n", c.x, c.y));
    }
}

fn push_pen(out: &mut String, pen: &Pen) {
    out.push_str(&format!(
        "    Pen ({},{},{})\n",
        pen.width, pen.pattern, pen.color
    ));
}

fn push_brush(out: &mut String, brush: &Brush) {
    if brush.transparent {
        out.push_str(&format!("    Brush ({},{})\n", brush.pattern, brush.fg_color));
    } else {
        out.push_str(&format!(
            "    Brush ({},{},{})\n",
            brush.pattern, brush.fg_color, brush.bg_color
        ));
    }
}

fn push_symbol(out: &mut String, symbol: &Symbol) {
    out.push_str(&format!(
        "    Symbol ({},{},{})\n",
        symbol.number, symbol.color, symbol.size
    ));
}

/// Append the MIF text of one feature to `out`.
pub fn write_feature(out: &mut String, geometry: Option<&Geometry>, style: &Style) {
    let Some(geometry) = geometry else {
        out.push_str("none\n");
        return;
    };
    match geometry {
        Geometry::Point(p) => {
            out.push_str(&format!("Point {} {}\n", p.x, p.y));
            push_symbol(out, &style.symbol);
        }
        Geometry::FontPoint { position, angle } => {
            out.push_str(&format!("Point {} {}\n", position.x, position.y));
            out.push_str(&format!(
                "    Symbol ({},{},{},{},{},{})\n",
                style.symbol.number,
                style.symbol.color,
                style.symbol.size,
                quote(style.font.name()),
                style.font.style.bits(),
                angle
            ));
        }
        Geometry::CustomPoint {
            position,
            custom_style,
        } => {
            out.push_str(&format!("Point {} {}\n", position.x, position.y));
            out.push_str(&format!(
                "    Symbol ({},{},{},{})\n",
                quote(style.font.name()),
                style.symbol.color,
                style.symbol.size,
                custom_style
            ));
        }
        Geometry::Polyline { parts, smooth } => {
            match parts.as_slice() {
                [part] if part.len() == 2 && !smooth => {
                    let (a, b) = (part[0], part[1]);
                    out.push_str(&format!("Line {} {} {} {}\n", a.x, a.y, b.x, b.y));
                }
                [part] => {
                    out.push_str(&format!("Pline {}\n", part.len()));
                    push_coords(out, part);
                }
                _ => {
                    out.push_str(&format!("Pline Multiple {}\n", parts.len()));
                    for part in parts {
                        out.push_str(&format!("  {}\n", part.len()));
                        push_coords(out, part);
                    }
                }
            }
            push_pen(out, &style.pen);
            if *smooth {
                out.push_str("    Smooth\n");
            }
        }
        Geometry::Arc {
            center,
            x_radius,
            y_radius,
            start_angle,
            end_angle,
        } => {
            out.push_str(&format!(
                "Arc {} {} {} {}\n  {} {}\n",
                center.x - x_radius,
                center.y - y_radius,
                center.x + x_radius,
                center.y + y_radius,
                start_angle,
                end_angle
            ));
            push_pen(out, &style.pen);
        }
        Geometry::Region { rings, centroid } => {
            out.push_str(&format!("Region {}\n", rings.len()));
            for ring in rings {
                out.push_str(&format!("  {}\n", ring.len()));
                push_coords(out, ring);
            }
            push_pen(out, &style.pen);
            push_brush(out, &style.brush);
            if let Some(c) = centroid {
                out.push_str(&format!("    Center {} {}\n", c.x, c.y));
            }
        }
        Geometry::Rectangle {
            min,
            max,
            corner_radius,
        } => {
            match corner_radius {
                Some((rx, _)) => out.push_str(&format!(
                    "Roundrect {} {} {} {}\n    {}\n",
                    min.x,
                    min.y,
                    max.x,
                    max.y,
                    rx * 2.0
                )),
                None => out.push_str(&format!("Rect {} {} {} {}\n", min.x, min.y, max.x, max.y)),
            }
            push_pen(out, &style.pen);
            push_brush(out, &style.brush);
        }
        Geometry::Ellipse {
            center,
            x_radius,
            y_radius,
        } => {
            out.push_str(&format!(
                "Ellipse {} {} {} {}\n",
                center.x - x_radius,
                center.y - y_radius,
                center.x + x_radius,
                center.y + y_radius
            ));
            push_pen(out, &style.pen);
            push_brush(out, &style.brush);
        }
        Geometry::Text {
            origin,
            text,
            line_end,
        } => {
            let display = &style.text;
            let width = if display.width > 0.0 {
                display.width
            } else {
                estimated_text_width(text.chars().count(), display.height)
            };
            out.push_str(&format!(
                "Text\n    {}\n    {} {} {} {}\n",
                quote(&escape(text)),
                origin.x,
                origin.y,
                origin.x + width,
                origin.y + display.height
            ));
            let mut font = format!(
                "    Font ({},{},0,{}",
                quote(style.font.name()),
                style.font.style.bits(),
                display.fg_color
            );
            if style.font.style.contains(FontStyle::HALO) {
                font.push_str(&format!(",{}", display.bg_color));
            }
            font.push_str(")\n");
            out.push_str(&font);
            if display.angle != 0.0 {
                out.push_str(&format!("    Angle {}\n", display.angle));
            }
            match display.justification {
                TextJustification::Left => {}
                TextJustification::Center => out.push_str("    Justify Center\n"),
                TextJustification::Right => out.push_str("    Justify Right\n"),
            }
            match display.spacing {
                TextSpacing::Single => {}
                TextSpacing::OneAndHalf => out.push_str("    Spacing 1.5\n"),
                TextSpacing::Double => out.push_str("    Spacing 2.0\n"),
            }
            let line = match display.line_type {
                TextLineType::NoLine => None,
                TextLineType::Simple => Some("Simple"),
                TextLineType::Arrow => Some("Arrow"),
            };
            if let Some(line) = line {
                out.push_str(&format!(
                    "    Label Line {line} {} {}\n",
                    line_end.x, line_end.y
                ));
            }
        }
        Geometry::MultiPoint(points) => {
            out.push_str(&format!("MultiPoint {}\n", points.len()));
            push_coords(out, points);
            push_symbol(out, &style.symbol);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{FeatureType, TextDisplay};

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    fn round_trip(geometry: &Geometry, style: &Style) -> (Option<Geometry>, Style) {
        let mut out = String::new();
        write_feature(&mut out, Some(geometry), style);
        parse_feature(&lines(&out), 1).unwrap()
    }

    #[test]
    fn test_parse_region_with_style() {
        let text = "Region  2\n  4\n0 0\n10 0\n10 10\n0 0\n  3\n2 2\n3 2\n2 3\n\
                    \x20   Pen (2,2,255)\n    Brush (2,16711680)\n    Center 5 5\n";
        let (geometry, style) = parse_feature(&lines(text), 20).unwrap();
        match geometry {
            Some(Geometry::Region { rings, centroid }) => {
                assert_eq!(rings.len(), 2);
                assert_eq!(rings[1].len(), 3);
                assert_eq!(centroid, Some(coord! { x: 5.0, y: 5.0 }));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(style.pen.width, 2);
        assert_eq!(style.pen.color, 255);
        assert!(style.brush.transparent);
        assert_eq!(style.brush.fg_color, 0xff0000);
    }

    #[test]
    fn test_symbol_forms() {
        let (g, style) =
            parse_feature(&lines("Point 1 2\n    Symbol (35,0,12)\n"), 1).unwrap();
        assert_eq!(g.unwrap().feature_type(), FeatureType::Point);
        assert_eq!(style.symbol.number, 35);

        let (g, style) = parse_feature(
            &lines("Point 1 2\n    Symbol (65,255,10,\"Wingdings\",1,30)\n"),
            1,
        )
        .unwrap();
        assert_eq!(
            g,
            Some(Geometry::FontPoint {
                position: coord! { x: 1.0, y: 2.0 },
                angle: 30.0
            })
        );
        assert_eq!(style.font.name(), "Wingdings");
        assert_eq!(style.font.style, FontStyle::BOLD);

        let (g, style) =
            parse_feature(&lines("Point 1 2\n    Symbol (\"pin.bmp\",0,24,3)\n"), 1).unwrap();
        assert_eq!(
            g,
            Some(Geometry::CustomPoint {
                position: coord! { x: 1.0, y: 2.0 },
                custom_style: 3
            })
        );
        assert_eq!(style.font.name(), "pin.bmp");
        assert_eq!(style.symbol.size, 24);
    }

    #[test]
    fn test_polyline_forms() {
        let line = Geometry::polyline(vec![vec![coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }]]);
        let mut out = String::new();
        write_feature(&mut out, Some(&line), &Style::default());
        assert!(out.starts_with("Line 0 0 1 1\n"));

        let multi = Geometry::Polyline {
            parts: vec![
                vec![coord! { x: 0.0, y: 0.0 }, coord! { x: 1.0, y: 1.0 }],
                vec![
                    coord! { x: 2.0, y: 2.0 },
                    coord! { x: 3.0, y: 2.0 },
                    coord! { x: 3.5, y: 4.25 },
                ],
            ],
            smooth: true,
        };
        let (back, _) = round_trip(&multi, &Style::default());
        assert_eq!(back, Some(multi));
    }

    #[test]
    fn test_text_round_trip() {
        let mut style = Style::default();
        style.font = Font::new("Times", FontStyle::ITALIC | FontStyle::HALO).unwrap();
        style.text = TextDisplay {
            angle: 45.0,
            height: 2.0,
            width: 12.0,
            bg_color: 0x00ff00,
            justification: TextJustification::Right,
            spacing: TextSpacing::Double,
            line_type: TextLineType::Arrow,
            ..TextDisplay::default()
        };
        let text = Geometry::Text {
            origin: coord! { x: 10.0, y: 20.0 },
            text: "Two \"quoted\"\nlines".to_string(),
            line_end: coord! { x: 15.0, y: 25.0 },
        };
        let (back, back_style) = round_trip(&text, &style);
        assert_eq!(back, Some(text));
        assert_eq!(back_style.font, style.font);
        assert_eq!(back_style.text, style.text);
    }

    #[test]
    fn test_shapes_round_trip() {
        let mut rounded = Geometry::rectangle(coord! { x: 0.0, y: 0.0 }, coord! { x: 8.0, y: 4.0 });
        if let Geometry::Rectangle { corner_radius, .. } = &mut rounded {
            *corner_radius = Some((1.5, 1.5));
        }
        let shapes = [
            rounded,
            Geometry::rectangle(coord! { x: 0.0, y: 0.0 }, coord! { x: 8.0, y: 4.0 }),
            Geometry::ellipse(coord! { x: 5.0, y: 5.0 }, 3.0, 2.0),
            Geometry::arc(coord! { x: 5.0, y: 5.0 }, 3.0, 2.0, 30.0, 300.0),
            Geometry::MultiPoint(vec![coord! { x: 1.0, y: 1.0 }, coord! { x: 2.0, y: 3.0 }]),
        ];
        let mut style = Style::default();
        style.brush.transparent = true;
        for shape in shapes {
            let (back, back_style) = round_trip(&shape, &style);
            assert_eq!(back.as_ref(), Some(&shape));
            assert_eq!(back_style.pen, style.pen);
        }
    }

    #[test]
    fn test_errors_carry_line_numbers() {
        let err = parse_feature(&lines("Pline 3\n0 0\n1 x\n"), 40).unwrap_err();
        assert!(matches!(err, MitabError::ParseError { line: 42, .. }));
        let err = parse_feature(&lines("Blob 1 2\n"), 7).unwrap_err();
        assert!(matches!(err, MitabError::ParseError { line: 7, .. }));
        let (g, _) = parse_feature(&lines("none\n"), 1).unwrap();
        assert!(g.is_none());
    }
}
