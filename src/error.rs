use std::path::PathBuf;

/// Errors of the report generation.
/// Everything but `Write` and `Io` is recovered per source.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("File '{}' not found", .0.display())]
    Missing(PathBuf),

    #[error("could not read table: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing column '{0}'")]
    MissingColumn(String),

    #[error("line {line}: could not parse date '{value}'")]
    InvalidDate { line: u64, value: String },

    #[error("line {line}: invalid count '{value}' in column '{column}'")]
    InvalidCount {
        line: u64,
        column: String,
        value: String,
    },

    #[error("empty table, no rows to plot")]
    EmptyTable,

    #[error("could not draw panel: {0}")]
    Render(String),

    #[error("could not write report to '{}': {message}", .path.display())]
    Write { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl<E: std::error::Error + Send + Sync> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for ReportError
{
    fn from(e: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        ReportError::Render(e.to_string())
    }
}
