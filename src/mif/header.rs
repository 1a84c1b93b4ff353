//! The MIF header: everything up to the `Data` line.

use std::fmt::Write as _;

use crate::errors::{MitabError, Result};
use crate::spatial_ref::CoordSys;
use crate::tab::header::{field_type_decl, parse_field, tokenize, DEFAULT_CHARSET};
use crate::vector::{Defn, Field};

use super::lexer::quote;

pub const MIF_VERSION: i32 = 300;
pub const DEFAULT_DELIMITER: char = '\t';

#[derive(Clone, Debug, PartialEq)]
pub struct MifHeader {
    pub version: i32,
    pub charset: String,
    pub delimiter: char,
    pub coordsys: Option<CoordSys>,
    pub defn: Defn,
}

impl MifHeader {
    pub fn new(defn: Defn, coordsys: Option<CoordSys>) -> MifHeader {
        MifHeader {
            version: MIF_VERSION,
            charset: DEFAULT_CHARSET.to_string(),
            delimiter: DEFAULT_DELIMITER,
            coordsys,
            defn,
        }
    }

    /// Parse the header lines and return it with the index of the line
    /// after `Data`.
    pub fn parse(lines: &[String]) -> Result<(MifHeader, usize)> {
        let mut header = MifHeader::new(Defn::new(), None);
        let mut unique = Vec::new();
        let mut indexed = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            let line_no = i + 1;
            let tokens = tokenize(&lines[i]);
            i += 1;
            let Some(keyword) = tokens.first() else {
                continue;
            };
            match keyword.to_ascii_lowercase().as_str() {
                "version" => {
                    header.version = tokens
                        .get(1)
                        .and_then(|v| v.parse().ok())
                        .ok_or_else(|| parse_error(line_no, "invalid Version clause"))?;
                }
                "charset" => {
                    if let Some(charset) = tokens.get(1) {
                        header.charset = charset.clone();
                    }
                }
                "delimiter" => {
                    header.delimiter = tokens
                        .get(1)
                        .and_then(|d| d.chars().next())
                        .ok_or_else(|| parse_error(line_no, "invalid Delimiter clause"))?;
                }
                "unique" => unique = column_list(&tokens[1..], line_no)?,
                "index" => indexed = column_list(&tokens[1..], line_no)?,
                "coordsys" => {
                    let cs = CoordSys::from_definition(&lines[i - 1])
                        .map_err(|e| parse_error(line_no, &e.to_string()))?;
                    header.coordsys = Some(cs);
                }
                "transform" => log::warn!("Ignoring MIF Transform clause on line {line_no}"),
                "columns" => {
                    let n: usize = tokens
                        .get(1)
                        .and_then(|n| n.parse().ok())
                        .ok_or_else(|| parse_error(line_no, "invalid Columns clause"))?;
                    for _ in 0..n {
                        let line = lines
                            .get(i)
                            .ok_or_else(|| parse_error(i + 1, "missing column definition"))?;
                        i += 1;
                        let field = parse_field(&tokenize(line), i)?;
                        header
                            .defn
                            .push(field)
                            .map_err(|e| parse_error(i, &e.to_string()))?;
                    }
                }
                "data" => {
                    header.apply_flags(&unique, &indexed)?;
                    return Ok((header, i));
                }
                _ => log::warn!("Ignoring unknown MIF header clause '{keyword}' on line {line_no}"),
            }
        }
        Err(MitabError::CorruptFormat(
            "MIF header has no Data line".to_string(),
        ))
    }

    fn apply_flags(&mut self, unique: &[usize], indexed: &[usize]) -> Result<()> {
        let mut defn = Defn::new();
        for (i, field) in self.defn.fields().enumerate() {
            let Some(field) = self.defn.field_defn(field.index()) else {
                continue;
            };
            let mut field = field.clone();
            let column = i + 1;
            if unique.contains(&column) {
                field.set_unique(true);
            }
            if indexed.contains(&column) {
                field.set_indexed(true);
            }
            defn.push(field)?;
        }
        self.defn = defn;
        Ok(())
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Version {}", self.version);
        let _ = writeln!(out, "Charset {}", quote(&self.charset));
        let _ = writeln!(out, "Delimiter {}", quote(&self.delimiter.to_string()));
        let flagged = |pick: fn(&Field<'_>) -> bool| -> Vec<String> {
            self.defn
                .fields()
                .enumerate()
                .filter(|(_, f)| pick(f))
                .map(|(i, _)| (i + 1).to_string())
                .collect()
        };
        let unique = flagged(|f| f.is_unique());
        if !unique.is_empty() {
            let _ = writeln!(out, "Unique {}", unique.join(","));
        }
        let indexed = flagged(|f| f.is_indexed());
        if !indexed.is_empty() {
            let _ = writeln!(out, "Index {}", indexed.join(","));
        }
        if let Some(cs) = &self.coordsys {
            let _ = writeln!(out, "CoordSys {cs}");
        }
        let _ = writeln!(out, "Columns {}", self.defn.field_count());
        for field in self.defn.fields() {
            let _ = writeln!(
                out,
                "  {} {}",
                field.name(),
                field_type_decl(field.field_type(), field.width(), field.precision())
            );
        }
        out.push_str("Data\n\n");
        out
    }
}

fn column_list(tokens: &[String], line: usize) -> Result<Vec<usize>> {
    tokens
        .iter()
        .map(|t| {
            t.parse()
                .map_err(|_| parse_error(line, &format!("invalid column number '{t}'")))
        })
        .collect()
}

fn parse_error(line: usize, msg: &str) -> MitabError {
    MitabError::ParseError {
        line,
        msg: msg.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{FieldDefn, FieldType};

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_header() {
        let text = "Version 300\n\
                    Charset \"WindowsLatin1\"\n\
                    Delimiter \",\"\n\
                    Unique 2\n\
                    Index 1,2\n\
                    CoordSys Earth Projection 1, 104\n\
                    Columns 3\n\
                    \x20 Name Char(20)\n\
                    \x20 Code Integer\n\
                    \x20 Area Decimal(12,3)\n\
                    Data\n\
                    \n\
                    Point 1 2\n";
        let (header, data) = MifHeader::parse(&lines(text)).unwrap();
        assert_eq!(data, 11);
        assert_eq!(header.delimiter, ',');
        assert_eq!(header.defn.field_count(), 3);
        let code = header.defn.field(1).unwrap();
        assert!(code.is_unique());
        assert!(code.is_indexed());
        assert!(!header.defn.field(2).unwrap().is_unique());
        assert_eq!(header.defn.field(2).unwrap().precision(), 3);
        assert_eq!(header.coordsys.unwrap().projection(), 1);
    }

    #[test]
    fn test_text_round_trip() {
        let mut defn = Defn::new();
        let mut name = FieldDefn::new("Name", FieldType::Char).unwrap();
        name.set_width(10);
        name.set_indexed(true);
        defn.push(name).unwrap();
        defn.push(FieldDefn::new("When", FieldType::Date).unwrap())
            .unwrap();
        let header = MifHeader::new(
            defn,
            Some(CoordSys::from_definition("NonEarth Units \"m\" Bounds (0, 0) (10, 10)").unwrap()),
        );
        let text = header.to_text();
        assert!(text.contains("Index 1\n"));
        assert!(text.contains("Delimiter \"\t\"\n"));
        let (back, _) = MifHeader::parse(&lines(&text)).unwrap();
        assert_eq!(back.defn, header.defn);
        assert!(back
            .coordsys
            .unwrap()
            .same_definition(header.coordsys.as_ref().unwrap()));
    }

    #[test]
    fn test_missing_data_line() {
        let err = MifHeader::parse(&lines("Version 300\nColumns 0\n")).unwrap_err();
        assert!(matches!(err, MitabError::CorruptFormat(_)));
        let err = MifHeader::parse(&lines("Columns 1\n  Name Blob\nData\n")).unwrap_err();
        assert!(matches!(err, MitabError::ParseError { line: 2, .. }));
    }
}
