//! MID attribute lines: one per feature, values separated by the header's
//! delimiter, strings in double quotes.

use crate::errors::{MitabError, Result};
use crate::vector::{format_value, parse_value, Defn, FieldType, FieldValue};

use super::lexer::quote;

/// Split a MID line into its values; the flag tells whether a value was
/// quoted.
pub fn split_line(line: &str, delimiter: char) -> Vec<(String, bool)> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                current.push(c);
            }
        } else if c == '"' {
            in_quotes = true;
            quoted = true;
        } else if c == delimiter {
            values.push((std::mem::take(&mut current), quoted));
            quoted = false;
        } else {
            current.push(c);
        }
    }
    values.push((current, quoted));
    values
}

pub fn parse_line(
    defn: &Defn,
    line: &str,
    delimiter: char,
    line_no: usize,
) -> Result<Vec<Option<FieldValue>>> {
    let raw = split_line(line, delimiter);
    if defn.field_count() > 0 && raw.len() < defn.field_count() {
        return Err(MitabError::ParseError {
            line: line_no,
            msg: format!(
                "expected {} values, found {}",
                defn.field_count(),
                raw.len()
            ),
        });
    }
    defn.fields()
        .zip(raw)
        .map(|(field, (text, quoted))| {
            if field.field_type() == FieldType::Char {
                if !quoted && text.trim().is_empty() {
                    return Ok(None);
                }
                let text = if quoted { text } else { text.trim().to_string() };
                return Ok(Some(FieldValue::StringValue(text)));
            }
            parse_value(field.field_type(), &text).map_err(|e| MitabError::ParseError {
                line: line_no,
                msg: format!("field '{}': {e}", field.name()),
            })
        })
        .collect()
}

/// A `.MID` record is one line, so line breaks inside a value become spaces.
fn single_line(s: &str) -> String {
    s.replace("\r\n", " ").replace(['\r', '\n'], " ")
}

pub fn format_line(defn: &Defn, values: &[Option<FieldValue>], delimiter: char) -> String {
    let mut out = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            out.push(delimiter);
        }
        let (Some(value), Some(field)) = (value, defn.field_defn(i)) else {
            continue;
        };
        match value {
            FieldValue::StringValue(s) => {
                let limit = if field.width() > 0 { field.width() } else { usize::MAX };
                let s: String = single_line(s).chars().take(limit).collect();
                out.push_str(&quote(&s));
            }
            v => out.push_str(&format_value(field, v)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::vector::FieldDefn;

    fn defn() -> Defn {
        let mut defn = Defn::new();
        for (name, ty) in [
            ("Name", FieldType::Char),
            ("Pop", FieldType::Integer),
            ("Founded", FieldType::Date),
            ("Capital", FieldType::Logical),
            ("Area", FieldType::Float),
        ] {
            defn.push(FieldDefn::new(name, ty).unwrap()).unwrap();
        }
        defn
    }

    #[test]
    fn test_split_respects_quotes() {
        let values = split_line("\"a,\"\"b\"\"\",12,,x", ',');
        assert_eq!(
            values,
            vec![
                ("a,\"b\"".to_string(), true),
                ("12".to_string(), false),
                (String::new(), false),
                ("x".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_format_then_parse() {
        let defn = defn();
        let values = vec![
            Some(FieldValue::StringValue("Saint \"Malo\"".to_string())),
            Some(FieldValue::IntegerValue(46000)),
            Some(FieldValue::DateValue(
                NaiveDate::from_ymd_opt(1590, 3, 1).unwrap(),
            )),
            Some(FieldValue::LogicalValue(false)),
            None,
        ];
        let line = format_line(&defn, &values, '\t');
        assert_eq!(line, "\"Saint \"\"Malo\"\"\"\t46000\t15900301\tF\t");
        assert_eq!(parse_line(&defn, &line, '\t', 1).unwrap(), values);
    }

    #[test]
    fn test_short_line() {
        let err = parse_line(&defn(), "\"x\",1", ',', 7).unwrap_err();
        assert!(matches!(err, MitabError::ParseError { line: 7, .. }));
        let err = parse_line(&defn(), "\"x\",y,,,", ',', 8).unwrap_err();
        assert!(matches!(err, MitabError::ParseError { line: 8, .. }));
    }

    #[test]
    fn test_line_breaks_in_values() {
        let values = vec![
            Some(FieldValue::StringValue("Pont\r\nNeuf\nsur\rSeine".to_string())),
            None,
            None,
            None,
            None,
        ];
        let line = format_line(&defn(), &values, ',');
        assert!(!line.contains(['\r', '\n']));
        let back = parse_line(&defn(), &line, ',', 1).unwrap();
        assert_eq!(
            back[0],
            Some(FieldValue::StringValue("Pont Neuf sur Seine".to_string()))
        );
    }
}
