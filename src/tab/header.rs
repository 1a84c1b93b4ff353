//! The `.TAB` text header: table type, field list and metadata.
//!
//! ```text
//! !table
//! !version 300
//! !charset WindowsLatin1
//!
//! Definition Table
//!   Type NATIVE Charset "WindowsLatin1"
//!   Fields 2
//!     Name Char (20) ;
//!     Price Decimal (10, 2) ;
//! begin_metadata
//! "\CoordSys" = "Earth Projection 1, 104"
//! "\Unique" = "Name"
//! end_metadata
//! ```
//!
//! `Index n` suffixes are understood on read but never written: they
//! promise a `.IND` attribute index, which this crate does not produce.

use std::fmt::Write as _;

use crate::errors::{MitabError, Result};
use crate::vector::{Defn, FieldDefn, FieldType};

pub const COORDSYS_KEY: &str = "\\CoordSys";
pub const UNIQUE_KEY: &str = "\\Unique";
pub const DEFAULT_CHARSET: &str = "WindowsLatin1";

#[derive(Clone, Debug, PartialEq)]
pub struct TabHeader {
    pub version: i32,
    pub charset: String,
    pub defn: Defn,
    /// Metadata entries other than the field list, in file order.
    pub metadata: Vec<(String, String)>,
}

impl TabHeader {
    pub fn new(defn: Defn, version: i32) -> TabHeader {
        TabHeader {
            version,
            charset: DEFAULT_CHARSET.to_string(),
            defn,
            metadata: Vec::new(),
        }
    }

    pub fn metadata_item(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn set_metadata_item(&mut self, key: &str, value: &str) {
        match self
            .metadata
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
        {
            Some(entry) => entry.1 = value.to_string(),
            None => self.metadata.push((key.to_string(), value.to_string())),
        }
    }

    pub fn coordsys(&self) -> Option<&str> {
        self.metadata_item(COORDSYS_KEY)
    }

    pub fn parse(text: &str) -> Result<TabHeader> {
        let lines: Vec<&str> = text.lines().collect();
        let mut header = TabHeader::new(Defn::new(), 300);
        let mut seen_table = false;
        let mut seen_fields = false;
        let mut in_definition = false;
        let mut i = 0;
        while i < lines.len() {
            let line_no = i + 1;
            let tokens = tokenize(lines[i]);
            i += 1;
            let Some(first) = tokens.first() else {
                continue;
            };
            let first = first.to_ascii_lowercase();
            match first.as_str() {
                "!table" => seen_table = true,
                "!version" => {
                    header.version = tokens
                        .get(1)
                        .and_then(|v| v.parse().ok())
                        .ok_or_else(|| parse_error(line_no, "bad !version"))?;
                }
                "!charset" => {
                    if let Some(charset) = tokens.get(1) {
                        header.charset = charset.clone();
                    }
                }
                "definition" if tokens.len() >= 2 => {
                    if !tokens[1].eq_ignore_ascii_case("table") {
                        return Err(MitabError::CorruptFormat(format!(
                            "'Definition {}' tables are not supported",
                            tokens[1]
                        )));
                    }
                    in_definition = true;
                }
                "type" if in_definition => {
                    let table_type = tokens.get(1).map(String::as_str).unwrap_or("");
                    if !table_type.eq_ignore_ascii_case("native") {
                        return Err(MitabError::CorruptFormat(format!(
                            "table type '{table_type}' is not supported, only NATIVE"
                        )));
                    }
                    if let (Some(kw), Some(charset)) = (tokens.get(2), tokens.get(3)) {
                        if kw.eq_ignore_ascii_case("charset") {
                            header.charset = charset.clone();
                        }
                    }
                }
                "fields" if in_definition => {
                    let count: usize = tokens
                        .get(1)
                        .and_then(|v| v.parse().ok())
                        .filter(|n| *n >= 1)
                        .ok_or_else(|| parse_error(line_no, "invalid number of fields"))?;
                    if i + count > lines.len() {
                        return Err(parse_error(
                            line_no,
                            &format!("{count} fields declared, file ends first"),
                        ));
                    }
                    for _ in 0..count {
                        let field = parse_field(&tokenize(lines[i]), i + 1)?;
                        header.defn.push(field).map_err(|e| parse_error(i + 1, &e.to_string()))?;
                        i += 1;
                    }
                    in_definition = false;
                    seen_fields = true;
                }
                "begin_metadata" => {
                    while i < lines.len() {
                        let line = lines[i].trim();
                        i += 1;
                        if line.eq_ignore_ascii_case("end_metadata") {
                            break;
                        }
                        if line.is_empty() {
                            continue;
                        }
                        let (key, value) = parse_metadata(line)
                            .ok_or_else(|| parse_error(i, "bad metadata entry"))?;
                        header.metadata.push((key, value));
                    }
                }
                _ => {}
            }
        }
        if !seen_table {
            return Err(MitabError::CorruptFormat(
                "missing '!table' signature".to_string(),
            ));
        }
        if !seen_fields {
            return Err(MitabError::CorruptFormat(
                "no field list in table definition".to_string(),
            ));
        }
        header.apply_unique();
        Ok(header)
    }

    fn apply_unique(&mut self) {
        let Some(unique) = self.metadata_item(UNIQUE_KEY).map(str::to_string) else {
            return;
        };
        let mut defn = Defn::new();
        for field in self.defn.fields() {
            let Some(def) = self.defn.field_defn(field.index()) else {
                continue;
            };
            let mut def = def.clone();
            if unique
                .split(',')
                .any(|name| name.trim().eq_ignore_ascii_case(def.name()))
            {
                def.set_unique(true);
            }
            if defn.push(def).is_err() {
                return;
            }
        }
        self.defn = defn;
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "!table");
        let _ = writeln!(out, "!version {}", self.version);
        let _ = writeln!(out, "!charset {}", self.charset);
        let _ = writeln!(out);
        let _ = writeln!(out, "Definition Table");
        let _ = writeln!(out, "  Type NATIVE Charset \"{}\"", self.charset);
        let _ = writeln!(out, "  Fields {}", self.defn.field_count());
        let mut unique = Vec::new();
        for field in self.defn.fields() {
            let _ = write!(out, "    {} {}", field.name(), field_type_decl(
                field.field_type(),
                field.width(),
                field.precision(),
            ));
            if field.is_indexed() {
                log::debug!("no .IND index is written for field '{}'", field.name());
            }
            let _ = writeln!(out, " ;");
            if field.is_unique() {
                unique.push(field.name());
            }
        }
        let mut metadata: Vec<(String, String)> = self
            .metadata
            .iter()
            .filter(|(k, _)| !k.eq_ignore_ascii_case(UNIQUE_KEY))
            .cloned()
            .collect();
        if !unique.is_empty() {
            metadata.push((UNIQUE_KEY.to_string(), unique.join(",")));
        }
        if !metadata.is_empty() {
            let _ = writeln!(out, "begin_metadata");
            for (key, value) in &metadata {
                let _ = writeln!(out, "{} = {}", quote(key), quote(value));
            }
            let _ = writeln!(out, "end_metadata");
        }
        out
    }
}

/// Type declaration as used in `.TAB` field lines and MIF `Columns`.
pub fn field_type_decl(field_type: FieldType, width: usize, precision: usize) -> String {
    match field_type {
        FieldType::Char => format!("Char ({width})"),
        FieldType::Decimal => format!("Decimal ({width}, {precision})"),
        other => other.keyword().to_string(),
    }
}

/// Parse `name type [(w[, p])] [Index n]` from its tokens.
pub fn parse_field(tokens: &[String], line: usize) -> Result<FieldDefn> {
    let (Some(name), Some(keyword)) = (tokens.first(), tokens.get(1)) else {
        return Err(parse_error(line, "incomplete field definition"));
    };
    let field_type = FieldType::from_keyword(keyword)
        .ok_or_else(|| parse_error(line, &format!("unknown field type '{keyword}'")))?;
    let mut field = FieldDefn::new(name, field_type).map_err(|e| parse_error(line, &e.to_string()))?;
    let mut rest = &tokens[2..];
    let number = |tok: Option<&String>, what: &str| -> Result<usize> {
        tok.and_then(|t| t.parse().ok())
            .ok_or_else(|| parse_error(line, &format!("missing {what} of field '{name}'")))
    };
    match field_type {
        FieldType::Char => {
            field.set_width(number(rest.first(), "width")?);
            rest = &rest[1..];
        }
        FieldType::Decimal => {
            field.set_width(number(rest.first(), "width")?);
            field.set_precision(number(rest.get(1), "precision")?);
            rest = &rest[2..];
        }
        _ => {}
    }
    if rest
        .first()
        .map(|t| t.eq_ignore_ascii_case("index"))
        .unwrap_or(false)
    {
        field.set_indexed(true);
    }
    field.validate().map_err(|e| parse_error(line, &e.to_string()))?;
    Ok(field)
}

fn parse_error(line: usize, msg: &str) -> MitabError {
    MitabError::ParseError {
        line,
        msg: msg.to_string(),
    }
}

/// Split on blanks, parentheses, commas and semicolons; double quoted
/// strings stay one token, without their quotes.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    let mut current = String::new();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                let mut s = String::new();
                while let Some(c) = chars.next() {
                    if c == '"' {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            s.push('"');
                            continue;
                        }
                        break;
                    }
                    s.push(c);
                }
                tokens.push(s);
            }
            ' ' | '\t' | '(' | ')' | ',' | ';' => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// `"key" = "value"`, quotes doubled inside either string.
fn parse_metadata(line: &str) -> Option<(String, String)> {
    let (key, rest) = take_quoted(line.trim())?;
    let rest = rest.trim_start().strip_prefix('=')?;
    let (value, _) = take_quoted(rest.trim_start())?;
    Some((key, value))
}

fn take_quoted(text: &str) -> Option<(String, &str)> {
    let body = text.strip_prefix('"')?;
    let mut out = String::new();
    let mut iter = body.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        if c == '"' {
            if matches!(iter.peek(), Some((_, '"'))) {
                iter.next();
                out.push('"');
                continue;
            }
            return Some((out, &body[i + 1..]));
        }
        out.push(c);
    }
    None
}
