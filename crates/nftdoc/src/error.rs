use nftdoc_schema::UNSUPPORTED_EXPRESSION;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed JSON, or JSON that does not fit the document shape
    #[error("nftables JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An expression that is an array or `null` where an operand was expected
    #[error("unsupported expression type at line {line}, column {column}")]
    UnsupportedExpression { line: usize, column: usize },
}

impl Error {
    /// Classifies a decode failure, singling out unsupported expressions.
    pub(crate) fn decode(err: serde_json::Error) -> Self {
        if err.is_data() && err.to_string().contains(UNSUPPORTED_EXPRESSION) {
            Self::UnsupportedExpression {
                line: err.line(),
                column: err.column(),
            }
        } else {
            Self::Json(err)
        }
    }
}
