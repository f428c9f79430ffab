pub mod kicad;
pub mod sexp;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoardParseError {
    #[error("failed to read board file: {0}")]
    Io(#[from] std::io::Error),
    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: usize, message: String },
    #[error("missing field `{field}` in ({context} ...)")]
    MissingField {
        context: &'static str,
        field: &'static str,
    },
    #[error("bad number `{value}` in ({context} ...)")]
    BadNumber {
        context: &'static str,
        value: String,
    },
    #[error("not a KiCad board: root element is `{0}`")]
    NotABoard(String),
}
