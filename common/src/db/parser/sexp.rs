//! Minimal S-expression reader for KiCad files.
//!
//! Atoms keep their raw text. Quoted strings are unescaped and remember that
//! they were quoted so the writer can mirror the source style.

use super::BoardParseError;

#[derive(Clone, Debug, PartialEq)]
pub enum Sexp {
    Atom(String),
    Str(String),
    List(Vec<Sexp>),
}

impl Sexp {
    /// Head keyword of a list, e.g. `segment` for `(segment ...)`.
    pub fn head(&self) -> Option<&str> {
        match self {
            Sexp::List(items) => items.first().and_then(|s| s.as_str()),
            _ => None,
        }
    }

    pub fn is(&self, keyword: &str) -> bool {
        self.head() == Some(keyword)
    }

    /// Text of an atom or string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Sexp::Atom(s) | Sexp::Str(s) => Some(s),
            Sexp::List(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_str().and_then(|s| s.parse().ok())
    }

    pub fn items(&self) -> &[Sexp] {
        match self {
            Sexp::List(items) => items,
            _ => &[],
        }
    }

    /// Arguments after the head keyword.
    pub fn args(&self) -> &[Sexp] {
        self.items().get(1..).unwrap_or(&[])
    }

    pub fn arg_str(&self, i: usize) -> Option<&str> {
        self.args().get(i).and_then(|s| s.as_str())
    }

    pub fn arg_f64(&self, i: usize) -> Option<f64> {
        self.args().get(i).and_then(|s| s.as_f64())
    }

    /// First direct child list with the given head.
    pub fn child(&self, keyword: &str) -> Option<&Sexp> {
        self.args().iter().find(|c| c.is(keyword))
    }

    pub fn children<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a Sexp> + 'a {
        self.args().iter().filter(move |c| c.is(keyword))
    }
}

pub fn parse(text: &str) -> Result<Sexp, BoardParseError> {
    let mut parser = Parser {
        bytes: text.as_bytes(),
        text,
        pos: 0,
    };
    parser.skip_ws();
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos != parser.bytes.len() {
        return Err(parser.error("trailing data after root expression"));
    }
    Ok(value)
}

struct Parser<'a> {
    bytes: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, message: &str) -> BoardParseError {
        BoardParseError::Syntax {
            offset: self.pos,
            message: message.to_string(),
        }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn value(&mut self) -> Result<Sexp, BoardParseError> {
        match self.bytes.get(self.pos) {
            None => Err(self.error("unexpected end of input")),
            Some(b'(') => self.list(),
            Some(b')') => Err(self.error("unbalanced `)`")),
            Some(b'"') => self.string(),
            Some(_) => Ok(self.atom()),
        }
    }

    fn list(&mut self) -> Result<Sexp, BoardParseError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.bytes.get(self.pos) {
                None => return Err(self.error("unterminated list")),
                Some(b')') => {
                    self.pos += 1;
                    return Ok(Sexp::List(items));
                }
                Some(_) => items.push(self.value()?),
            }
        }
    }

    fn string(&mut self) -> Result<Sexp, BoardParseError> {
        self.pos += 1;
        let mut out = String::new();
        let mut start = self.pos;
        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b'"' => {
                    out.push_str(&self.text[start..self.pos]);
                    self.pos += 1;
                    return Ok(Sexp::Str(out));
                }
                b'\\' => {
                    out.push_str(&self.text[start..self.pos]);
                    let escaped = self
                        .bytes
                        .get(self.pos + 1)
                        .ok_or_else(|| self.error("dangling escape"))?;
                    out.push(match escaped {
                        b'n' => '\n',
                        b't' => '\t',
                        other => *other as char,
                    });
                    self.pos += 2;
                    start = self.pos;
                }
                _ => self.pos += 1,
            }
        }
        Err(self.error("unterminated string"))
    }

    fn atom(&mut self) -> Sexp {
        let start = self.pos;
        while let Some(&b) = self.bytes.get(self.pos) {
            if b.is_ascii_whitespace() || b == b'(' || b == b')' || b == b'"' {
                break;
            }
            self.pos += 1;
        }
        Sexp::Atom(self.text[start..self.pos].to_string())
    }
}

/// Quote a string for output when it needs it.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}
