use std::collections::VecDeque;

use geo_types::{coord, Coord};

use crate::errors::{MitabError, Result};

/// One token of a MIF line. Blanks, commas and parentheses separate
/// tokens; a double quoted string is a single token, `""` standing for a
/// quote inside it.
#[derive(Clone, Debug, PartialEq)]
pub enum Token {
    Word(String),
    Str(String),
}

impl Token {
    pub fn text(&self) -> &str {
        match self {
            Token::Word(s) | Token::Str(s) => s,
        }
    }

    pub fn is_word(&self, keyword: &str) -> bool {
        matches!(self, Token::Word(w) if w.eq_ignore_ascii_case(keyword))
    }
}

pub fn tokenize(line: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();
    let mut word = String::new();
    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if !word.is_empty() {
                    tokens.push(Token::Word(std::mem::take(&mut word)));
                }
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
                tokens.push(Token::Str(s));
            }
            c if c.is_whitespace() || c == ',' || c == '(' || c == ')' => {
                if !word.is_empty() {
                    tokens.push(Token::Word(std::mem::take(&mut word)));
                }
            }
            c => word.push(c),
        }
    }
    if !word.is_empty() {
        tokens.push(Token::Word(word));
    }
    tokens
}

/// Quote `text` for a MIF or MID file.
pub fn quote(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Token stream over the lines of one feature, crossing line ends where a
/// value may continue on the next line.
pub struct Cursor<'a> {
    lines: &'a [String],
    next_line: usize,
    pending: VecDeque<Token>,
    first_line_no: usize,
}

impl<'a> Cursor<'a> {
    /// `first_line_no` is the 1-based file line of `lines[0]`.
    pub fn new(lines: &'a [String], first_line_no: usize) -> Cursor<'a> {
        Cursor {
            lines,
            next_line: 0,
            pending: VecDeque::new(),
            first_line_no,
        }
    }

    /// 1-based file line of the tokens being read.
    pub fn line_no(&self) -> usize {
        self.first_line_no + self.next_line.saturating_sub(1)
    }

    pub fn error(&self, msg: impl Into<String>) -> MitabError {
        MitabError::ParseError {
            line: self.line_no(),
            msg: msg.into(),
        }
    }

    /// Tokens of the next line, dropping what is left of the current one.
    pub fn next_line(&mut self) -> Option<Vec<Token>> {
        self.pending.clear();
        let line = self.lines.get(self.next_line)?;
        self.next_line += 1;
        Some(tokenize(line))
    }

    pub fn token(&mut self) -> Option<Token> {
        self.peek()?;
        self.pending.pop_front()
    }

    pub fn peek(&mut self) -> Option<&Token> {
        while self.pending.is_empty() {
            let line = self.lines.get(self.next_line)?;
            self.next_line += 1;
            self.pending = tokenize(line).into();
        }
        self.pending.front()
    }

    pub fn number(&mut self) -> Result<f64> {
        match self.token() {
            Some(Token::Word(w)) => w
                .parse()
                .map_err(|_| self.error(format!("expected a number, got '{w}'"))),
            Some(Token::Str(s)) => Err(self.error(format!("expected a number, got \"{s}\""))),
            None => Err(self.error("unexpected end of feature")),
        }
    }

    pub fn count(&mut self) -> Result<usize> {
        let n = self.number()?;
        if n < 0.0 || n.fract() != 0.0 {
            return Err(self.error(format!("invalid count {n}")));
        }
        Ok(n as usize)
    }

    pub fn coord(&mut self) -> Result<Coord> {
        let x = self.number()?;
        let y = self.number()?;
        Ok(coord! { x: x, y: y })
    }

    pub fn coords(&mut self, n: usize) -> Result<Vec<Coord>> {
        (0..n).map(|_| self.coord()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize() {
        let tokens = tokenize("Symbol (35,0,12,\"Map \"\"Symbols\"\"\",1,0)");
        assert_eq!(tokens.len(), 7);
        assert!(tokens[0].is_word("SYMBOL"));
        assert_eq!(tokens[4], Token::Str("Map \"Symbols\"".to_string()));
        assert_eq!(tokenize("  \t ").len(), 0);
    }

    #[test]
    fn test_cursor_crosses_lines() {
        let lines: Vec<String> = ["Pline", "  3", "0 0", "1", "1 2 2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut cursor = Cursor::new(&lines, 10);
        assert!(cursor.token().unwrap().is_word("pline"));
        assert_eq!(cursor.count().unwrap(), 3);
        let pts = cursor.coords(3).unwrap();
        assert_eq!(pts[1], coord! { x: 1.0, y: 1.0 });
        assert_eq!(pts[2], coord! { x: 2.0, y: 2.0 });
        match cursor.number() {
            Err(MitabError::ParseError { line, .. }) => assert_eq!(line, 14),
            other => panic!("unexpected {other:?}"),
        }
    }
}
