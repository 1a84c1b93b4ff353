//! Map objects: the per-feature records stored in object blocks.
//!
//! Every object starts with its type code (u8) and feature id (i32). Each
//! object type has two codes: the lower one marks the compressed variant,
//! where coordinates are i16 deltas from the object block center (or from
//! the compression origin stored in the object, for objects with
//! coordinate data). Objects written here are always uncompressed.

use geo_types::{coord, Coord};

use crate::errors::{MitabError, Result};
use crate::tab::map::coord_block::{
    decode_sections, decode_vertices, encode_sections, encode_vertices, read_coord_data,
    section_header_size, vertex_size,
};
use crate::tab::map::coord_codec::{CoordCodec, IntRect};
use crate::tab::map::raw_block::{block_at, BinReader, BinWriter, BLOCK_OBJECT, BLOCK_SIZE};
use crate::tab::map::tool_block::ToolTable;
use crate::utils::{latin1_to_string, string_to_latin1};
use crate::vector::{Font, FontStyle, Geometry, Style, Symbol, TextLineType};

/// Object block header: type, data size, center and coordinate block range.
pub const OBJECT_HEADER: usize = 0x14;

/// Estimated character width of text labels, relative to their height.
const TEXT_CHAR_WIDTH: f64 = 0.5;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectKind {
    Symbol,
    Line,
    Pline,
    Arc,
    Region,
    Text,
    Rect,
    RoundRect,
    Ellipse,
    MultiPline,
    FontSymbol,
    CustomSymbol,
    MultiPoint,
}

/// Header statistics bucket of an object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ObjectClass {
    Point,
    Line,
    Region,
    Text,
}

const ALL_KINDS: [ObjectKind; 13] = [
    ObjectKind::Symbol,
    ObjectKind::Line,
    ObjectKind::Pline,
    ObjectKind::Arc,
    ObjectKind::Region,
    ObjectKind::Text,
    ObjectKind::Rect,
    ObjectKind::RoundRect,
    ObjectKind::Ellipse,
    ObjectKind::MultiPline,
    ObjectKind::FontSymbol,
    ObjectKind::CustomSymbol,
    ObjectKind::MultiPoint,
];

impl ObjectKind {
    fn compressed_code(self) -> u8 {
        match self {
            ObjectKind::Symbol => 0x01,
            ObjectKind::Line => 0x04,
            ObjectKind::Pline => 0x07,
            ObjectKind::Arc => 0x0a,
            ObjectKind::Region => 0x0d,
            ObjectKind::Text => 0x10,
            ObjectKind::Rect => 0x13,
            ObjectKind::RoundRect => 0x16,
            ObjectKind::Ellipse => 0x19,
            ObjectKind::MultiPline => 0x25,
            ObjectKind::FontSymbol => 0x28,
            ObjectKind::CustomSymbol => 0x2b,
            ObjectKind::MultiPoint => 0x34,
        }
    }

    pub fn code(self, compressed: bool) -> u8 {
        if compressed {
            self.compressed_code()
        } else {
            self.compressed_code() + 1
        }
    }

    /// Kind and compression flag of a type code, `None` for unknown codes.
    pub fn from_code(code: u8) -> Option<(ObjectKind, bool)> {
        ALL_KINDS.into_iter().find_map(|kind| {
            if kind.code(true) == code {
                Some((kind, true))
            } else if kind.code(false) == code {
                Some((kind, false))
            } else {
                None
            }
        })
    }

    /// Size in bytes of the whole object, type code and id included.
    pub fn size(self, compressed: bool) -> u8 {
        let (full, short) = match self {
            ObjectKind::Symbol => (14, 10),
            ObjectKind::Line => (22, 14),
            ObjectKind::Pline => (38, 34),
            ObjectKind::Arc => (42, 26),
            ObjectKind::Region => (41, 37),
            ObjectKind::Text => (53, 39),
            ObjectKind::Rect => (23, 15),
            ObjectKind::RoundRect => (31, 19),
            ObjectKind::Ellipse => (23, 15),
            ObjectKind::MultiPline => (40, 36),
            ObjectKind::FontSymbol => (26, 22),
            ObjectKind::CustomSymbol => (17, 13),
            ObjectKind::MultiPoint => (38, 30),
        };
        if compressed {
            short
        } else {
            full
        }
    }

    /// `(code, size)` of every known object code, for the header table.
    pub fn length_table() -> Vec<(u8, u8)> {
        ALL_KINDS
            .into_iter()
            .flat_map(|kind| {
                [
                    (kind.code(true), kind.size(true)),
                    (kind.code(false), kind.size(false)),
                ]
            })
            .collect()
    }

    pub fn class(self) -> ObjectClass {
        match self {
            ObjectKind::Symbol
            | ObjectKind::FontSymbol
            | ObjectKind::CustomSymbol
            | ObjectKind::MultiPoint => ObjectClass::Point,
            ObjectKind::Line | ObjectKind::Pline | ObjectKind::MultiPline | ObjectKind::Arc => {
                ObjectClass::Line
            }
            ObjectKind::Region | ObjectKind::Rect | ObjectKind::RoundRect | ObjectKind::Ellipse => {
                ObjectClass::Region
            }
            ObjectKind::Text => ObjectClass::Text,
        }
    }

    /// Whether the object keeps vertices or a string in coordinate blocks.
    pub fn uses_coord_block(self) -> bool {
        matches!(
            self,
            ObjectKind::Pline
                | ObjectKind::MultiPline
                | ObjectKind::Region
                | ObjectKind::MultiPoint
                | ObjectKind::Text
        )
    }
}

/// Angle as stored for a file with the coordinate origin quadrant of
/// `codec`, in either direction.
fn mirror_angle(codec: &CoordCodec, mut angle: f64) -> f64 {
    if codec.mirror_x() {
        angle = 180.0 - angle;
    }
    if codec.mirror_y() {
        angle = -angle;
    }
    angle.rem_euclid(360.0)
}

fn angle_to_tenths(angle: f64) -> i16 {
    ((angle.rem_euclid(360.0) * 10.0).round() as i16) % 3600
}

/// Corners of the box of a text label anchored at its lower left corner.
pub fn text_box(origin: Coord, width: f64, height: f64, angle: f64) -> [Coord; 4] {
    let (sin, cos) = angle.to_radians().sin_cos();
    let at = |dx: f64, dy: f64| coord! {
        x: origin.x + dx * cos - dy * sin,
        y: origin.y + dx * sin + dy * cos,
    };
    [at(0.0, 0.0), at(width, 0.0), at(width, height), at(0.0, height)]
}

/// Width of a label of `chars` characters when the style leaves it unset.
pub fn estimated_text_width(chars: usize, height: f64) -> f64 {
    chars as f64 * height * TEXT_CHAR_WIDTH
}

/// Undo [`text_box`]: the anchor and width of a label from its bounding
/// box, height and angle.
fn text_origin_from_box(min: Coord, max: Coord, height: f64, angle: f64) -> (Coord, f64) {
    let (sin, cos) = angle.to_radians().sin_cos();
    let (w_box, h_box) = (max.x - min.x, max.y - min.y);
    let width = if cos.abs() >= sin.abs() {
        (w_box - height * sin.abs()) / cos.abs()
    } else {
        (h_box - height * cos.abs()) / sin.abs()
    };
    let width = width.max(0.0);
    let corners = text_box(coord! { x: 0.0, y: 0.0 }, width, height, angle);
    let dx = corners.iter().map(|c| c.x).fold(f64::INFINITY, f64::min);
    let dy = corners.iter().map(|c| c.y).fold(f64::INFINITY, f64::min);
    (coord! { x: min.x - dx, y: min.y - dy }, width)
}

/// A decoded object.
#[derive(Clone, Debug, PartialEq)]
pub struct MapObject {
    pub id: i32,
    pub geometry: Geometry,
    pub style: Style,
}

struct ObjectReader<'a> {
    r: BinReader<'a>,
    codec: &'a CoordCodec,
    compressed: bool,
    center: (i32, i32),
}

impl<'a> ObjectReader<'a> {
    fn int_coord_from(&mut self, origin: (i32, i32)) -> Result<(i32, i32)> {
        if self.compressed {
            let dx = self.r.read_i16()? as i32;
            let dy = self.r.read_i16()? as i32;
            Ok((origin.0.wrapping_add(dx), origin.1.wrapping_add(dy)))
        } else {
            Ok((self.r.read_i32()?, self.r.read_i32()?))
        }
    }

    fn coord(&mut self) -> Result<Coord> {
        let (x, y) = self.int_coord_from(self.center)?;
        Ok(self.external(x, y))
    }

    fn coord_from(&mut self, origin: (i32, i32)) -> Result<Coord> {
        let (x, y) = self.int_coord_from(origin)?;
        Ok(self.external(x, y))
    }

    fn external(&self, x: i32, y: i32) -> Coord {
        let (x, y) = self.codec.to_external(x, y);
        coord! { x: x, y: y }
    }

    /// Two opposite corners, as (min, max) in dataset coordinates.
    fn rect_from(&mut self, origin: (i32, i32)) -> Result<(Coord, Coord)> {
        let a = self.coord_from(origin)?;
        let b = self.coord_from(origin)?;
        Ok((
            coord! { x: a.x.min(b.x), y: a.y.min(b.y) },
            coord! { x: a.x.max(b.x), y: a.y.max(b.y) },
        ))
    }

    fn rect(&mut self) -> Result<(Coord, Coord)> {
        self.rect_from(self.center)
    }

    fn dist(&mut self) -> Result<i32> {
        if self.compressed {
            Ok(self.r.read_i16()? as i32)
        } else {
            self.r.read_i32()
        }
    }

    fn ptr(&mut self) -> Result<u32> {
        let ptr = self.r.read_i32()?;
        u32::try_from(ptr)
            .map_err(|_| MitabError::CorruptFormat(format!("negative coordinate pointer {ptr}")))
    }

    fn angle(&mut self) -> Result<f64> {
        Ok(mirror_angle(self.codec, self.r.read_i16()? as f64 / 10.0))
    }
}

fn font_named(name: Option<String>, style: FontStyle) -> Font {
    match name {
        Some(name) => Font::new(&name, style).unwrap_or_default(),
        None => {
            let mut font = Font::default();
            font.style = style;
            font
        }
    }
}

/// Decode the object at file offset `ptr` of the `.MAP` image `map`.
///
/// Returns `None` for the "no object" type code 0.
pub fn read_object(
    map: &[u8],
    ptr: u32,
    codec: &CoordCodec,
    tools: &ToolTable,
) -> Result<Option<MapObject>> {
    let addr = ptr - ptr % BLOCK_SIZE as u32;
    let block = block_at(map, addr, "object block")?;
    let mut header = BinReader::new(block, addr as u64, "object block");
    let block_type = header.read_i16()?;
    if block_type != BLOCK_OBJECT as i16 {
        return Err(MitabError::CorruptFormat(format!(
            "object pointer {ptr} leads to a block of type {block_type}"
        )));
    }
    header.read_i16()?;
    let center = (header.read_i32()?, header.read_i32()?);

    let offset = (ptr % BLOCK_SIZE as u32) as usize;
    if offset < OBJECT_HEADER {
        return Err(MitabError::CorruptFormat(format!(
            "object pointer {ptr} points into a block header"
        )));
    }
    let mut r = BinReader::new(block, addr as u64, "map object");
    r.goto(offset)?;
    let code = r.read_u8()?;
    if code == 0 {
        return Ok(None);
    }
    let (kind, compressed) = ObjectKind::from_code(code).ok_or_else(|| {
        MitabError::CorruptFormat(format!("unknown object type 0x{code:02x} at {ptr}"))
    })?;
    let id = r.read_i32()?;
    let mut o = ObjectReader {
        r,
        codec,
        compressed,
        center,
    };
    let mut style = Style::default();

    let geometry = match kind {
        ObjectKind::Symbol => {
            let position = o.coord()?;
            if let Some(symbol) = tools.symbol(o.r.read_u8()?) {
                style.symbol = symbol;
            }
            Geometry::Point(position)
        }
        ObjectKind::FontSymbol => {
            let number = o.r.read_u8()? as i16;
            let size = o.r.read_u8()? as i16;
            let font_style = FontStyle::from_bits_truncate(o.r.read_i16()? as u16);
            let color = o.r.read_rgb()?;
            o.r.read_bytes(3)?;
            let angle = o.angle()?;
            let position = o.coord()?;
            let font = tools.font(o.r.read_u8()?);
            style.symbol = Symbol {
                number,
                size,
                color,
            };
            style.font = font_named(font, font_style);
            Geometry::FontPoint { position, angle }
        }
        ObjectKind::CustomSymbol => {
            o.r.read_u8()?;
            let custom_style = o.r.read_u8()?;
            let position = o.coord()?;
            if let Some(symbol) = tools.symbol(o.r.read_u8()?) {
                style.symbol = symbol;
            }
            style.font = font_named(tools.font(o.r.read_u8()?), FontStyle::empty());
            Geometry::CustomPoint {
                position,
                custom_style,
            }
        }
        ObjectKind::Line => {
            let a = o.coord()?;
            let b = o.coord()?;
            if let Some(pen) = tools.pen(o.r.read_u8()?) {
                style.pen = pen;
            }
            Geometry::polyline(vec![vec![a, b]])
        }
        ObjectKind::Pline | ObjectKind::MultiPline | ObjectKind::Region => {
            let coord_ptr = o.ptr()?;
            let raw_size = o.r.read_i32()?;
            let smooth = raw_size < 0;
            let size = (raw_size & 0x7fff_ffff) as usize;
            let num_sections = match kind {
                ObjectKind::Pline => 1,
                _ => o.r.read_i16()?.max(0) as usize,
            };
            let (origin, label) = if compressed {
                let dx = o.r.read_i16()? as i32;
                let dy = o.r.read_i16()? as i32;
                let origin = (o.r.read_i32()?, o.r.read_i32()?);
                (origin, (origin.0.wrapping_add(dx), origin.1.wrapping_add(dy)))
            } else {
                ((0, 0), (o.r.read_i32()?, o.r.read_i32()?))
            };
            let label = Some(o.external(label.0, label.1));
            o.rect_from(origin)?;
            if let Some(pen) = tools.pen(o.r.read_u8()?) {
                style.pen = pen;
            }
            if kind == ObjectKind::Region {
                if let Some(brush) = tools.brush(o.r.read_u8()?) {
                    style.brush = brush;
                }
            }
            let data = read_coord_data(map, coord_ptr, size)?;
            let parts = if kind == ObjectKind::Pline {
                let count = size / vertex_size(compressed);
                vec![decode_vertices(&data, 0, count, compressed, origin)?]
            } else {
                if num_sections * section_header_size(compressed) > data.len() {
                    return Err(MitabError::CorruptFormat(format!(
                        "object {id} declares {num_sections} sections in {size} bytes"
                    )));
                }
                decode_sections(&data, num_sections, compressed, origin)?
            };
            let parts: Vec<Vec<Coord>> = parts
                .into_iter()
                .map(|p| p.into_iter().map(|(x, y)| o.external(x, y)).collect())
                .collect();
            if kind == ObjectKind::Region {
                Geometry::Region {
                    rings: parts,
                    centroid: label,
                }
            } else {
                Geometry::Polyline { parts, smooth }
            }
        }
        ObjectKind::Arc => {
            let a0 = o.angle()?;
            let a1 = o.angle()?;
            o.rect()?;
            let (min, max) = o.rect()?;
            if let Some(pen) = tools.pen(o.r.read_u8()?) {
                style.pen = pen;
            }
            let (start_angle, end_angle) = if codec.mirror_x() != codec.mirror_y() {
                (a1, a0)
            } else {
                (a0, a1)
            };
            Geometry::Arc {
                center: coord! { x: (min.x + max.x) / 2.0, y: (min.y + max.y) / 2.0 },
                x_radius: (max.x - min.x) / 2.0,
                y_radius: (max.y - min.y) / 2.0,
                start_angle,
                end_angle,
            }
        }
        ObjectKind::Rect | ObjectKind::RoundRect | ObjectKind::Ellipse => {
            let diameters = if kind == ObjectKind::RoundRect {
                Some((o.dist()?, o.dist()?))
            } else {
                None
            };
            let (min, max) = o.rect()?;
            if let Some(pen) = tools.pen(o.r.read_u8()?) {
                style.pen = pen;
            }
            if let Some(brush) = tools.brush(o.r.read_u8()?) {
                style.brush = brush;
            }
            match (kind, diameters) {
                (ObjectKind::Ellipse, _) => Geometry::Ellipse {
                    center: coord! { x: (min.x + max.x) / 2.0, y: (min.y + max.y) / 2.0 },
                    x_radius: (max.x - min.x) / 2.0,
                    y_radius: (max.y - min.y) / 2.0,
                },
                (_, Some((dx, dy))) => {
                    let (dx, dy) = codec.dist_to_external(dx, dy);
                    Geometry::Rectangle {
                        min,
                        max,
                        corner_radius: Some((dx.abs() / 2.0, dy.abs() / 2.0)),
                    }
                }
                _ => Geometry::rectangle(min, max),
            }
        }
        ObjectKind::Text => {
            let coord_ptr = o.ptr()?;
            let len = o.r.read_i16()?.max(0) as usize;
            style.text.set_alignment_flags(o.r.read_i16()?);
            let angle = o.angle()?;
            let font_style = FontStyle::from_bits_truncate(o.r.read_i16()? as u16);
            style.text.fg_color = o.r.read_rgb()?;
            style.text.bg_color = o.r.read_rgb()?;
            let line_end = o.coord()?;
            let height = o.dist()?;
            let font = tools.font(o.r.read_u8()?);
            let (min, max) = o.rect()?;
            if let Some(pen) = tools.pen(o.r.read_u8()?) {
                style.pen = pen;
            }
            let text = if len > 0 {
                latin1_to_string(&read_coord_data(map, coord_ptr, len)?)
            } else {
                String::new()
            };
            let height = codec.dist_to_external(0, height).1.abs();
            let (origin, width) = text_origin_from_box(min, max, height, angle);
            style.text.angle = angle;
            style.text.height = height;
            style.text.width = width;
            style.font = font_named(font, font_style);
            let line_end = if style.text.line_type == TextLineType::NoLine {
                origin
            } else {
                line_end
            };
            Geometry::Text {
                origin,
                text,
                line_end,
            }
        }
        ObjectKind::MultiPoint => {
            let coord_ptr = o.ptr()?;
            let num_points = o.r.read_i32()?;
            if num_points < 0 {
                return Err(MitabError::CorruptFormat(format!(
                    "object {id} has {num_points} points"
                )));
            }
            if let Some(symbol) = tools.symbol(o.r.read_u8()?) {
                style.symbol = symbol;
            }
            let origin = (o.r.read_i32()?, o.r.read_i32()?);
            o.rect_from(origin)?;
            let origin = if compressed { origin } else { (0, 0) };
            let count = num_points as usize;
            let data = read_coord_data(map, coord_ptr, count * vertex_size(compressed))?;
            let points = decode_vertices(&data, 0, count, compressed, origin)?
                .into_iter()
                .map(|(x, y)| o.external(x, y))
                .collect();
            Geometry::MultiPoint(points)
        }
    };
    Ok(Some(MapObject {
        id,
        geometry,
        style,
    }))
}

/// An object ready to be placed in an object block.
#[derive(Clone, Debug, PartialEq)]
pub struct EncodedObject {
    pub kind: ObjectKind,
    /// Everything after the type code and id. Objects with coordinate data
    /// start with a zero placeholder for the coordinate pointer.
    pub body: Vec<u8>,
    pub coord_data: Option<Vec<u8>>,
    pub mbr: IntRect,
}

impl EncodedObject {
    /// Bytes taken in the object block.
    pub fn len(&self) -> usize {
        5 + self.body.len()
    }

    pub fn write(&self, w: &mut BinWriter, id: i32, coord_ptr: u32) -> Result<()> {
        w.put_u8(self.kind.code(false))?;
        w.put_i32(id)?;
        if self.coord_data.is_some() && self.body.len() >= 4 {
            w.put_i32(coord_ptr as i32)?;
            w.put_bytes(&self.body[4..])
        } else {
            w.put_bytes(&self.body)
        }
    }
}

fn to_int(codec: &CoordCodec, c: Coord) -> Result<(i32, i32)> {
    codec.to_internal(c.x, c.y)
}

fn to_int_all(codec: &CoordCodec, points: &[Coord]) -> Result<Vec<(i32, i32)>> {
    points.iter().map(|c| to_int(codec, *c)).collect()
}

fn put_coord(w: &mut BinWriter, (x, y): (i32, i32)) -> Result<()> {
    w.put_i32(x)?;
    w.put_i32(y)
}

fn coord_size(data: &[u8]) -> Result<i32> {
    i32::try_from(data.len())
        .map_err(|_| MitabError::BadArgument(format!("{} bytes of coordinates", data.len())))
}

fn part_count(parts: usize) -> Result<i16> {
    i16::try_from(parts).map_err(|_| {
        MitabError::BadArgument(format!("{parts} parts exceed the {} part limit", i16::MAX))
    })
}

/// Encode `geom` with `style` as an uncompressed object.
///
/// Every coordinate is converted before any tool is registered, so an
/// `OutOfBounds` failure leaves `tools` untouched.
pub fn encode_object(
    geom: &Geometry,
    style: &Style,
    codec: &CoordCodec,
    tools: &mut ToolTable,
) -> Result<EncodedObject> {
    let mut w = BinWriter::growable();
    let (kind, coord_data, mbr) = match geom {
        Geometry::Point(p) => {
            let at = to_int(codec, *p)?;
            put_coord(&mut w, at)?;
            w.put_u8(tools.add_symbol(&style.symbol)?)?;
            (ObjectKind::Symbol, None, IntRect::of_points(&[at]))
        }
        Geometry::FontPoint { position, angle } => {
            let at = to_int(codec, *position)?;
            w.put_u8(style.symbol.number.clamp(0, 255) as u8)?;
            w.put_u8(style.symbol.size.clamp(0, 255) as u8)?;
            w.put_i16(style.font.style.bits() as i16)?;
            w.put_rgb(style.symbol.color)?;
            w.put_bytes(&[0, 0, 0])?;
            w.put_i16(angle_to_tenths(mirror_angle(codec, *angle)))?;
            put_coord(&mut w, at)?;
            w.put_u8(tools.add_font(style.font.name())?)?;
            (ObjectKind::FontSymbol, None, IntRect::of_points(&[at]))
        }
        Geometry::CustomPoint {
            position,
            custom_style,
        } => {
            let at = to_int(codec, *position)?;
            w.put_u8(0)?;
            w.put_u8(*custom_style)?;
            put_coord(&mut w, at)?;
            w.put_u8(tools.add_symbol(&style.symbol)?)?;
            w.put_u8(tools.add_font(style.font.name())?)?;
            (ObjectKind::CustomSymbol, None, IntRect::of_points(&[at]))
        }
        Geometry::Polyline { parts, smooth } => {
            let parts = parts
                .iter()
                .map(|p| to_int_all(codec, p))
                .collect::<Result<Vec<_>>>()?;
            let all: Vec<(i32, i32)> = parts.iter().flatten().copied().collect();
            let mbr = IntRect::of_points(&all);
            match parts.as_slice() {
                [line] if line.len() == 2 && !smooth => {
                    put_coord(&mut w, line[0])?;
                    put_coord(&mut w, line[1])?;
                    w.put_u8(tools.add_pen(&style.pen)?)?;
                    (ObjectKind::Line, None, mbr)
                }
                [single] => {
                    let data = encode_vertices(single)?;
                    let size = coord_size(&data)?;
                    w.put_i32(0)?;
                    w.put_i32(if *smooth { size | i32::MIN } else { size })?;
                    put_coord(&mut w, mbr.center())?;
                    w.put_int_rect(&mbr)?;
                    w.put_u8(tools.add_pen(&style.pen)?)?;
                    (ObjectKind::Pline, Some(data), mbr)
                }
                _ => {
                    let count = part_count(parts.len())?;
                    let data = encode_sections(&parts, &[])?;
                    let size = coord_size(&data)?;
                    w.put_i32(0)?;
                    w.put_i32(if *smooth { size | i32::MIN } else { size })?;
                    w.put_i16(count)?;
                    put_coord(&mut w, mbr.center())?;
                    w.put_int_rect(&mbr)?;
                    w.put_u8(tools.add_pen(&style.pen)?)?;
                    (ObjectKind::MultiPline, Some(data), mbr)
                }
            }
        }
        Geometry::Region { rings, .. } => {
            let count = part_count(rings.len())?;
            let label = geom
                .label_point()
                .map(|c| to_int(codec, c))
                .transpose()?;
            let parts = rings
                .iter()
                .map(|r| to_int_all(codec, r))
                .collect::<Result<Vec<_>>>()?;
            let mut holes = vec![0usize; parts.len()];
            for (outer, count) in geom.holes_per_polygon() {
                if let Some(slot) = holes.get_mut(outer) {
                    *slot = count;
                }
            }
            let all: Vec<(i32, i32)> = parts.iter().flatten().copied().collect();
            let mbr = IntRect::of_points(&all);
            let data = encode_sections(&parts, &holes)?;
            w.put_i32(0)?;
            w.put_i32(coord_size(&data)?)?;
            w.put_i16(count)?;
            put_coord(&mut w, label.unwrap_or_else(|| mbr.center()))?;
            w.put_int_rect(&mbr)?;
            w.put_u8(tools.add_pen(&style.pen)?)?;
            w.put_u8(tools.add_brush(&style.brush)?)?;
            (ObjectKind::Region, Some(data), mbr)
        }
        Geometry::Arc {
            center,
            x_radius,
            y_radius,
            start_angle,
            end_angle,
        } => {
            let vertices = geom.part(0).map(|p| p.into_owned()).unwrap_or_default();
            let arc_mbr = IntRect::of_points(&to_int_all(codec, &vertices)?);
            let a = to_int(codec, coord! { x: center.x - x_radius, y: center.y - y_radius })?;
            let b = to_int(codec, coord! { x: center.x + x_radius, y: center.y + y_radius })?;
            let ellipse_mbr = IntRect::of_points(&[a, b]);
            let (first, second) = if codec.mirror_x() != codec.mirror_y() {
                (*end_angle, *start_angle)
            } else {
                (*start_angle, *end_angle)
            };
            w.put_i16(angle_to_tenths(mirror_angle(codec, first)))?;
            w.put_i16(angle_to_tenths(mirror_angle(codec, second)))?;
            w.put_int_rect(&arc_mbr)?;
            w.put_int_rect(&ellipse_mbr)?;
            w.put_u8(tools.add_pen(&style.pen)?)?;
            (ObjectKind::Arc, None, arc_mbr)
        }
        Geometry::Rectangle {
            min,
            max,
            corner_radius,
        } => {
            let mbr = IntRect::of_points(&[to_int(codec, *min)?, to_int(codec, *max)?]);
            let kind = match corner_radius {
                Some((rx, ry)) => {
                    let (dx, dy) = codec.dist_to_internal(rx * 2.0, ry * 2.0)?;
                    w.put_i32(dx.abs())?;
                    w.put_i32(dy.abs())?;
                    ObjectKind::RoundRect
                }
                None => ObjectKind::Rect,
            };
            w.put_int_rect(&mbr)?;
            w.put_u8(tools.add_pen(&style.pen)?)?;
            w.put_u8(tools.add_brush(&style.brush)?)?;
            (kind, None, mbr)
        }
        Geometry::Ellipse {
            center,
            x_radius,
            y_radius,
        } => {
            let a = to_int(codec, coord! { x: center.x - x_radius, y: center.y - y_radius })?;
            let b = to_int(codec, coord! { x: center.x + x_radius, y: center.y + y_radius })?;
            let mbr = IntRect::of_points(&[a, b]);
            w.put_int_rect(&mbr)?;
            w.put_u8(tools.add_pen(&style.pen)?)?;
            w.put_u8(tools.add_brush(&style.brush)?)?;
            (ObjectKind::Ellipse, None, mbr)
        }
        Geometry::Text {
            origin,
            text,
            line_end,
        } => {
            let display = &style.text;
            let bytes = string_to_latin1(text);
            let len = i16::try_from(bytes.len()).map_err(|_| {
                MitabError::BadArgument(format!("text of {} bytes is too long", bytes.len()))
            })?;
            let width = if display.width > 0.0 {
                display.width
            } else {
                estimated_text_width(text.chars().count(), display.height)
            };
            let corners = to_int_all(
                codec,
                &text_box(*origin, width, display.height, display.angle),
            )?;
            let mbr = IntRect::of_points(&corners);
            let end = to_int(codec, *line_end)?;
            let (_, height) = codec.dist_to_internal(0.0, display.height)?;
            w.put_i32(0)?;
            w.put_i16(len)?;
            w.put_i16(display.alignment_flags())?;
            w.put_i16(angle_to_tenths(mirror_angle(codec, display.angle)))?;
            w.put_i16(style.font.style.bits() as i16)?;
            w.put_rgb(display.fg_color)?;
            w.put_rgb(display.bg_color)?;
            put_coord(&mut w, end)?;
            w.put_i32(height.abs())?;
            w.put_u8(tools.add_font(style.font.name())?)?;
            w.put_int_rect(&mbr)?;
            w.put_u8(tools.add_pen(&style.pen)?)?;
            (ObjectKind::Text, Some(bytes), mbr)
        }
        Geometry::MultiPoint(points) => {
            let points = to_int_all(codec, points)?;
            let mbr = IntRect::of_points(&points);
            let data = encode_vertices(&points)?;
            w.put_i32(0)?;
            w.put_i32(points.len() as i32)?;
            w.put_u8(tools.add_symbol(&style.symbol)?)?;
            put_coord(&mut w, mbr.center())?;
            w.put_int_rect(&mbr)?;
            (ObjectKind::MultiPoint, Some(data), mbr)
        }
    };
    Ok(EncodedObject {
        kind,
        body: w.into_inner(),
        coord_data,
        mbr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial_ref::Bounds;
    use crate::tab::map::raw_block::BLOCK_OBJECT;
    use crate::vector::{Pen, TextJustification};

    fn codec() -> CoordCodec {
        CoordCodec::from_bounds(&Bounds::new(-1000.0, -1000.0, 1000.0, 1000.0)).unwrap()
    }

    fn c(x: f64, y: f64) -> Coord {
        coord! { x: x, y: y }
    }

    /// Place a coordinate-free object in a one block image.
    fn object_image(encoded: &EncodedObject, center: (i32, i32)) -> Vec<u8> {
        let mut image = vec![0u8; BLOCK_SIZE];
        let mut w = BinWriter::block();
        w.put_i16(BLOCK_OBJECT as i16).unwrap();
        w.put_i16(encoded.len() as i16).unwrap();
        w.put_i32(center.0).unwrap();
        w.put_i32(center.1).unwrap();
        w.goto(OBJECT_HEADER);
        encoded.write(&mut w, 7, 0).unwrap();
        image.extend_from_slice(w.as_slice());
        image
    }

    #[test]
    fn test_codes() {
        assert_eq!(ObjectKind::from_code(0x02), Some((ObjectKind::Symbol, false)));
        assert_eq!(ObjectKind::from_code(0x0d), Some((ObjectKind::Region, true)));
        assert_eq!(ObjectKind::from_code(0x35), Some((ObjectKind::MultiPoint, false)));
        assert_eq!(ObjectKind::from_code(0x03), None);
        assert_eq!(ObjectKind::length_table().len(), 26);
    }

    #[test]
    fn test_encoded_sizes_match_table() {
        let codec = codec();
        let mut tools = ToolTable::new();
        let style = Style::default();
        let geometries = vec![
            Geometry::point(1.0, 2.0),
            Geometry::FontPoint {
                position: c(1.0, 2.0),
                angle: 30.0,
            },
            Geometry::CustomPoint {
                position: c(1.0, 2.0),
                custom_style: 1,
            },
            Geometry::polyline(vec![vec![c(0.0, 0.0), c(1.0, 1.0)]]),
            Geometry::polyline(vec![vec![c(0.0, 0.0), c(1.0, 1.0), c(2.0, 0.0)]]),
            Geometry::polyline(vec![
                vec![c(0.0, 0.0), c(1.0, 1.0)],
                vec![c(5.0, 5.0), c(6.0, 6.0)],
            ]),
            Geometry::region(vec![vec![c(0.0, 0.0), c(4.0, 0.0), c(4.0, 4.0)]]),
            Geometry::arc(c(0.0, 0.0), 10.0, 5.0, 0.0, 90.0),
            Geometry::rectangle(c(0.0, 0.0), c(3.0, 2.0)),
            Geometry::Rectangle {
                min: c(0.0, 0.0),
                max: c(3.0, 2.0),
                corner_radius: Some((0.5, 0.5)),
            },
            Geometry::ellipse(c(0.0, 0.0), 3.0, 2.0),
            Geometry::text(c(0.0, 0.0), "hello"),
            Geometry::MultiPoint(vec![c(0.0, 0.0), c(1.0, 1.0)]),
        ];
        let mut kinds = Vec::new();
        for geom in &geometries {
            let encoded = encode_object(geom, &style, &codec, &mut tools).unwrap();
            assert_eq!(encoded.len(), encoded.kind.size(false) as usize, "{:?}", encoded.kind);
            assert_eq!(encoded.coord_data.is_some(), encoded.kind.uses_coord_block());
            kinds.push(encoded.kind);
        }
        assert_eq!(kinds.len(), ALL_KINDS.len());
        for kind in ALL_KINDS {
            assert!(kinds.contains(&kind), "{kind:?} not produced");
        }
    }

    #[test]
    fn test_out_of_bounds_leaves_tools_alone() {
        let mut tools = ToolTable::new();
        let geom = Geometry::polyline(vec![vec![c(0.0, 0.0), c(5000.0, 0.0)]]);
        assert!(encode_object(&geom, &Style::default(), &codec(), &mut tools).is_err());
        assert!(tools.is_empty());
    }

    #[test]
    fn test_symbol_and_rect_objects() {
        let codec = codec();
        let mut tools = ToolTable::new();
        let mut style = Style::default();
        style.pen = Pen {
            width: 3,
            ..Pen::default()
        };
        let encoded = encode_object(&Geometry::point(12.5, -3.25), &style, &codec, &mut tools)
            .unwrap();
        let image = object_image(&encoded, (0, 0));
        let obj = read_object(&image, 512 + OBJECT_HEADER as u32, &codec, &tools)
            .unwrap()
            .unwrap();
        assert_eq!(obj.id, 7);
        assert_eq!(obj.geometry, Geometry::point(12.5, -3.25));

        let rect = Geometry::Rectangle {
            min: c(-10.0, -5.0),
            max: c(10.0, 5.0),
            corner_radius: Some((1.0, 2.0)),
        };
        let encoded = encode_object(&rect, &style, &codec, &mut tools).unwrap();
        let image = object_image(&encoded, (0, 0));
        let obj = read_object(&image, 512 + OBJECT_HEADER as u32, &codec, &tools)
            .unwrap()
            .unwrap();
        assert_eq!(obj.geometry, rect);
        assert_eq!(obj.style.pen.width, 3);
    }

    #[test]
    fn test_compressed_symbol() {
        let codec = codec();
        let center = codec.to_internal(100.0, 100.0).unwrap();
        let mut image = vec![0u8; BLOCK_SIZE];
        let mut w = BinWriter::block();
        w.put_i16(BLOCK_OBJECT as i16).unwrap();
        w.put_i16(10).unwrap();
        w.put_i32(center.0).unwrap();
        w.put_i32(center.1).unwrap();
        w.goto(OBJECT_HEADER);
        w.put_u8(ObjectKind::Symbol.code(true)).unwrap();
        w.put_i32(3).unwrap();
        w.put_i16(-1000).unwrap();
        w.put_i16(2000).unwrap();
        w.put_u8(0).unwrap();
        image.extend_from_slice(w.as_slice());

        let obj = read_object(&image, 512 + OBJECT_HEADER as u32, &codec, &ToolTable::new())
            .unwrap()
            .unwrap();
        let (x, y) = codec.to_external(center.0 - 1000, center.1 + 2000);
        assert_eq!(obj.geometry, Geometry::point(x, y));
        assert_eq!(obj.style.symbol, Symbol::default());
    }

    #[test]
    fn test_arc_angles_follow_quadrant() {
        let q1 = codec();
        let mut tools = ToolTable::new();
        let arc = Geometry::arc(c(0.0, 0.0), 10.0, 10.0, 30.0, 120.0);
        let encoded = encode_object(&arc, &Style::default(), &q1, &mut tools).unwrap();
        let image = object_image(&encoded, (0, 0));
        let ptr = 512 + OBJECT_HEADER as u32;
        match read_object(&image, ptr, &q1, &tools).unwrap().unwrap().geometry {
            Geometry::Arc {
                start_angle,
                end_angle,
                ..
            } => {
                crate::assert_almost_eq(start_angle, 30.0);
                crate::assert_almost_eq(end_angle, 120.0);
            }
            other => panic!("unexpected {other:?}"),
        }

        // Same bytes read with a mirrored X axis: the sweep runs the other way.
        let q2 = CoordCodec { quadrant: 2, ..q1 };
        match read_object(&image, ptr, &q2, &tools).unwrap().unwrap().geometry {
            Geometry::Arc {
                start_angle,
                end_angle,
                ..
            } => {
                crate::assert_almost_eq(start_angle, 60.0);
                crate::assert_almost_eq(end_angle, 150.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_text_box_recovery() {
        for angle in [0.0, 30.0, 90.0, 135.0, 200.0, 315.0] {
            let origin = c(5.0, -2.0);
            let corners = text_box(origin, 12.0, 3.0, angle);
            let env = crate::vector::Envelope::of(corners).unwrap();
            let (back, width) = text_origin_from_box(
                c(env.min_x, env.min_y),
                c(env.max_x, env.max_y),
                3.0,
                angle,
            );
            assert!((back.x - origin.x).abs() < 1e-9, "angle {angle}");
            assert!((back.y - origin.y).abs() < 1e-9, "angle {angle}");
            assert!((width - 12.0).abs() < 1e-9, "angle {angle}");
        }
    }

    #[test]
    fn test_text_style_bits() {
        let codec = codec();
        let mut tools = ToolTable::new();
        let mut style = Style::default();
        style.text.height = 2.0;
        style.text.angle = 45.0;
        style.text.justification = TextJustification::Center;
        style.font = Font::new("Courier", FontStyle::BOLD | FontStyle::HALO).unwrap();
        let encoded =
            encode_object(&Geometry::text(c(1.0, 1.0), "abc"), &style, &codec, &mut tools)
                .unwrap();
        assert_eq!(encoded.coord_data.as_deref(), Some(&b"abc"[..]));
        assert_eq!(&encoded.body[4..6], &3i16.to_le_bytes());
        assert_eq!(&encoded.body[8..10], &450i16.to_le_bytes());
        assert_eq!(tools.font(1).as_deref(), Some("Courier"));
    }

    #[test]
    fn test_part_limit() {
        let codec = codec();
        let mut tools = ToolTable::new();
        let segment = vec![c(0.0, 0.0), c(1.0, 1.0)];
        let ring = vec![c(0.0, 0.0), c(1.0, 0.0), c(1.0, 1.0), c(0.0, 0.0)];
        let limit = i16::MAX as usize;

        let lines = Geometry::polyline(vec![segment.clone(); limit + 1]);
        assert!(matches!(
            encode_object(&lines, &Style::default(), &codec, &mut tools),
            Err(MitabError::BadArgument(_))
        ));
        let rings = Geometry::region(vec![ring.clone(); limit + 1]);
        assert!(matches!(
            encode_object(&rings, &Style::default(), &codec, &mut tools),
            Err(MitabError::BadArgument(_))
        ));

        let lines = Geometry::polyline(vec![segment; limit]);
        let encoded = encode_object(&lines, &Style::default(), &codec, &mut tools).unwrap();
        assert_eq!(encoded.kind, ObjectKind::MultiPline);
    }
}
