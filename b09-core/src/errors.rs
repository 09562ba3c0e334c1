use thiserror::Error;

pub type CoreResult<T> = Result<T, B09Error>;

/// The main error type of the conversion pipeline.
///
/// Conversion is all-or-nothing: the first piece of source text that cannot
/// be recognized aborts the run with the location where recognition stopped.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum B09Error {
    #[error("{line}:{column}: error: {message}")]
    Parser {
        line: u32,
        column: usize,
        message: String,
    },
}
