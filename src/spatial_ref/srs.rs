use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::errors::{MitabError, Result};

/// Axis aligned extent of a dataset, in dataset units.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Bounds {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Bounds {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Bounds {
        Bounds {
            xmin: xmin.min(xmax),
            ymin: ymin.min(ymax),
            xmax: xmin.max(xmax),
            ymax: ymin.max(ymax),
        }
    }

    /// Build bounds from the north/south/east/west form used by the C API.
    pub fn from_nsew(north: f64, south: f64, east: f64, west: f64) -> Bounds {
        Bounds::new(west, south, east, north)
    }

    /// All four values zero: no bounds were supplied.
    pub fn is_unset(&self) -> bool {
        self.xmin == 0.0 && self.ymin == 0.0 && self.xmax == 0.0 && self.ymax == 0.0
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x <= self.xmax && y >= self.ymin && y <= self.ymax
    }
}

impl Display for Bounds {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Bounds ({}, {}) ({}, {})",
            self.xmin, self.ymin, self.xmax, self.ymax
        )
    }
}

const UNITS: &[(&str, u8)] = &[
    ("mi", 0),
    ("km", 1),
    ("in", 2),
    ("ft", 3),
    ("yd", 4),
    ("mm", 5),
    ("cm", 6),
    ("m", 7),
    ("survey ft", 8),
    ("nmi", 9),
    ("degree", 13),
    ("li", 30),
    ("ch", 31),
    ("rd", 32),
];

/// MapInfo numeric code of a distance unit name, e.g. `"m"` is 7.
pub fn units_code(name: &str) -> Option<u8> {
    UNITS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, code)| *code)
}

/// Inverse of [`units_code`].
pub fn units_name(code: u8) -> Option<&'static str> {
    UNITS.iter().find(|(_, c)| *c == code).map(|(n, _)| *n)
}

/// Ellipsoid ids for the handful of datums commonly found in `.MAP` headers.
const DATUM_ELLIPSOIDS: &[(i32, u8)] = &[(62, 7), (74, 0), (104, 28)];

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CoordSysKind {
    Earth,
    NonEarth,
}

/// A parsed MapInfo `CoordSys` clause.
#[derive(Clone, Debug, PartialEq)]
pub struct CoordSys {
    kind: CoordSysKind,
    projection: u8,
    datum: i32,
    datum_params: Vec<f64>,
    units: Option<String>,
    params: Vec<f64>,
    bounds: Option<Bounds>,
}

impl Default for CoordSys {
    /// Longitude/latitude on WGS 84.
    fn default() -> Self {
        CoordSys {
            kind: CoordSysKind::Earth,
            projection: 1,
            datum: 104,
            datum_params: Vec::new(),
            units: None,
            params: Vec::new(),
            bounds: None,
        }
    }
}

impl CoordSys {
    /// Parse a definition such as `Earth Projection 1, 104` or
    /// `CoordSys NonEarth Units "m" Bounds (0, 0) (100, 100)`.
    pub fn from_definition(definition: &str) -> Result<CoordSys> {
        let tokens = tokenize(definition)?;
        Parser { tokens, pos: 0 }.coordsys()
    }

    pub fn non_earth(units: &str, bounds: Option<Bounds>) -> CoordSys {
        CoordSys {
            kind: CoordSysKind::NonEarth,
            projection: 0,
            datum: 0,
            datum_params: Vec::new(),
            units: Some(units.to_string()),
            params: Vec::new(),
            bounds,
        }
    }

    /// Rebuild a definition from the fields a `.MAP` header stores.
    ///
    /// The header keeps no datum, so the result reports datum 0.
    pub fn from_map_header(projection: u8, units: u8, params: &[f64]) -> CoordSys {
        let units_name = units_name(units).unwrap_or("m").to_string();
        if projection == 0 {
            return CoordSys::non_earth(&units_name, None);
        }
        let mut params = params.to_vec();
        while params.last() == Some(&0.0) {
            params.pop();
        }
        CoordSys {
            kind: CoordSysKind::Earth,
            projection,
            datum: 0,
            datum_params: Vec::new(),
            units: if projection == 1 { None } else { Some(units_name) },
            params: if projection == 1 { Vec::new() } else { params },
            bounds: None,
        }
    }

    pub fn kind(&self) -> CoordSysKind {
        self.kind
    }

    /// MapInfo projection id, 0 for non-earth systems.
    pub fn projection(&self) -> u8 {
        self.projection
    }

    pub fn datum(&self) -> i32 {
        self.datum
    }

    pub fn units(&self) -> Option<&str> {
        self.units.as_deref()
    }

    /// Units code written to the `.MAP` header; lat/long systems use degrees.
    pub fn units_code(&self) -> u8 {
        match &self.units {
            Some(name) => units_code(name).unwrap_or(7),
            None => 13,
        }
    }

    pub fn ellipsoid_code(&self) -> u8 {
        DATUM_ELLIPSOIDS
            .iter()
            .find(|(datum, _)| *datum == self.datum)
            .map(|(_, ellipsoid)| *ellipsoid)
            .unwrap_or(0)
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn set_bounds(&mut self, bounds: Option<Bounds>) {
        self.bounds = bounds;
    }

    /// Same system, ignoring any `Bounds` clause.
    pub fn same_definition(&self, other: &CoordSys) -> bool {
        fn close(a: &[f64], b: &[f64]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-9)
        }
        let units_match = match (&self.units, &other.units) {
            (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
            (None, None) => true,
            _ => false,
        };
        self.kind == other.kind
            && self.projection == other.projection
            && self.datum == other.datum
            && units_match
            && close(&self.datum_params, &other.datum_params)
            && close(&self.params, &other.params)
    }
}

impl FromStr for CoordSys {
    type Err = MitabError;

    fn from_str(s: &str) -> Result<Self> {
        CoordSys::from_definition(s)
    }
}

impl Display for CoordSys {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            CoordSysKind::NonEarth => {
                write!(f, "NonEarth Units \"{}\"", self.units.as_deref().unwrap_or("m"))?;
            }
            CoordSysKind::Earth => {
                write!(f, "Earth Projection {}, {}", self.projection, self.datum)?;
                for p in &self.datum_params {
                    write!(f, ", {p}")?;
                }
                if let Some(units) = &self.units {
                    write!(f, ", \"{units}\"")?;
                }
                for p in &self.params {
                    write!(f, ", {p}")?;
                }
            }
        }
        if let Some(bounds) = &self.bounds {
            write!(f, " {bounds}")?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Word(String),
    Str(String),
    Num(f64),
    Comma,
    LParen,
    RParen,
}

fn bad(definition: &str, why: &str) -> MitabError {
    MitabError::BadArgument(format!("invalid CoordSys '{definition}': {why}"))
}

fn tokenize(definition: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = definition.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(ch) => text.push(ch),
                        None => return Err(bad(definition, "unterminated string")),
                    }
                }
                tokens.push(Token::Str(text));
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            c if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => {
                let mut text = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_ascii_digit() || matches!(ch, '-' | '+' | '.' | 'e' | 'E') {
                        text.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = text
                    .parse::<f64>()
                    .map_err(|_| bad(definition, &format!("bad number '{text}'")))?;
                tokens.push(Token::Num(value));
            }
            c if c.is_alphabetic() => {
                let mut text = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_alphanumeric() || ch == '_' {
                        text.push(ch);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Word(text));
            }
            other => return Err(bad(definition, &format!("unexpected '{other}'"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn text(&self) -> String {
        format!("{:?}", self.tokens)
    }

    fn keyword(&mut self, word: &str) -> bool {
        match self.peek() {
            Some(Token::Word(w)) if w.eq_ignore_ascii_case(word) => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect_keyword(&mut self, word: &str) -> Result<()> {
        if self.keyword(word) {
            Ok(())
        } else {
            Err(bad(&self.text(), &format!("expected '{word}'")))
        }
    }

    fn number(&mut self) -> Result<f64> {
        match self.next() {
            Some(Token::Num(n)) => Ok(n),
            _ => Err(bad(&self.text(), "expected a number")),
        }
    }

    fn expect(&mut self, token: Token) -> Result<()> {
        if self.next().as_ref() == Some(&token) {
            Ok(())
        } else {
            Err(bad(&self.text(), &format!("expected {token:?}")))
        }
    }

    fn point(&mut self) -> Result<(f64, f64)> {
        self.expect(Token::LParen)?;
        let x = self.number()?;
        self.expect(Token::Comma)?;
        let y = self.number()?;
        self.expect(Token::RParen)?;
        Ok((x, y))
    }

    fn bounds(&mut self) -> Result<Option<Bounds>> {
        if !self.keyword("Bounds") {
            return Ok(None);
        }
        let (x1, y1) = self.point()?;
        let (x2, y2) = self.point()?;
        Ok(Some(Bounds::new(x1, y1, x2, y2)))
    }

    fn coordsys(mut self) -> Result<CoordSys> {
        self.keyword("CoordSys");
        let coordsys = if self.keyword("NonEarth") {
            self.expect_keyword("Units")?;
            let units = match self.next() {
                Some(Token::Str(units)) => units,
                _ => return Err(bad(&self.text(), "expected a units string")),
            };
            let bounds = self.bounds()?;
            CoordSys::non_earth(&units, bounds)
        } else {
            self.expect_keyword("Earth")?;
            self.expect_keyword("Projection")?;
            let projection = self.number()?;
            if !(0.0..=255.0).contains(&projection) {
                return Err(bad(&self.text(), "projection id out of range"));
            }
            self.expect(Token::Comma)?;
            let datum = self.number()? as i32;
            let datum_param_count = match datum {
                999 => 4,
                9999 => 9,
                _ => 0,
            };
            let mut datum_params = Vec::new();
            let mut units = None;
            let mut params = Vec::new();
            while self.peek() == Some(&Token::Comma) {
                self.pos += 1;
                match self.next() {
                    Some(Token::Num(n)) if datum_params.len() < datum_param_count => {
                        datum_params.push(n)
                    }
                    Some(Token::Num(n)) => params.push(n),
                    Some(Token::Str(s)) if units.is_none() => units = Some(s),
                    _ => return Err(bad(&self.text(), "unexpected token in parameter list")),
                }
            }
            let bounds = self.bounds()?;
            CoordSys {
                kind: CoordSysKind::Earth,
                projection: projection as u8,
                datum,
                datum_params,
                units,
                params,
                bounds,
            }
        };
        if self.pos < self.tokens.len() {
            return Err(bad(&self.text(), "trailing tokens"));
        }
        Ok(coordsys)
    }
}
