use esdiag_bundle::DocumentKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalysisError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("{} ({}) not found in this bundle", .0, .0.file_name())]
    MissingDocument(DocumentKind),

    #[error("{kind} has an unexpected shape: {reason}")]
    UnexpectedShape { kind: DocumentKind, reason: String },
}

impl AnalysisError {
    pub fn shape(kind: DocumentKind, reason: impl ToString) -> Self {
        Self::UnexpectedShape {
            kind,
            reason: reason.to_string(),
        }
    }

    /// The document kind the failure is about
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::MissingDocument(kind) | Self::UnexpectedShape { kind, .. } => *kind,
        }
    }
}
