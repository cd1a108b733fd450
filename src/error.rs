//! Structured error types for the folio rendering pipeline.
//!
//! Every failure is fatal for the render it happens in. The document driver
//! wraps whatever bubbles out of a node in [`FolioError::Render`] so the
//! message names the node that failed, e.g. `pdf.page(2).div(1).p(3)`.

use thiserror::Error;

/// The unified error type returned by all public folio API functions.
#[derive(Debug, Error)]
pub enum FolioError {
    /// The markup could not be read as XML.
    #[error("Failed to parse markup: {0}")]
    Markup(String),

    /// The markup has no `<pdf>` root element.
    #[error("Document must be wrapped in a <pdf></pdf> tag")]
    MissingRoot,

    /// A style name (inline `style`, tag name or `extends` target) is not registered.
    #[error("Style not found for {0}")]
    StyleNotFound(String),

    /// The merged configuration tree does not fit the typed configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    /// A `<column>` was rendered with no enclosing `<row>`.
    #[error("<column> tag must be within a <row> tag")]
    ColumnOutsideRow,

    /// The canvas failed to draw, load a resource or serialize.
    #[error(transparent)]
    Canvas(#[from] CanvasError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Any of the above, annotated with the structural path of the node being rendered.
    #[error("{path}: {source}")]
    Render {
        path: String,
        #[source]
        source: Box<FolioError>,
    },
}

/// Failures raised by a [`Canvas`](crate::canvas::Canvas) implementation.
#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("Image error: {0}")]
    Image(String),

    #[error("Font error: {0}")]
    Font(String),

    /// Drawing was attempted before the first page was opened.
    #[error("No page has been added to the document")]
    NoPage,

    #[error("Output error: {0}")]
    Output(String),
}

/// Coarse classification of a [`FolioError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed markup or a document without a `<pdf>` root.
    Input,
    /// Unknown style names or an unusable configuration tree.
    Configuration,
    /// Tags used where the layout model does not allow them.
    Structural,
    /// The canvas, or I/O around it, failed.
    Collaborator,
}

impl FolioError {
    /// Classify this error, looking through path annotations.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FolioError::Markup(_) | FolioError::MissingRoot => ErrorKind::Input,
            FolioError::StyleNotFound(_) | FolioError::InvalidConfig(_) => {
                ErrorKind::Configuration
            }
            FolioError::ColumnOutsideRow => ErrorKind::Structural,
            FolioError::Canvas(_) | FolioError::Io(_) => ErrorKind::Collaborator,
            FolioError::Render { source, .. } => source.kind(),
        }
    }

    /// The structural path of the failing node, when the driver annotated one.
    pub fn path(&self) -> Option<&str> {
        match self {
            FolioError::Render { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Attach a structural path. Already-annotated errors keep their innermost path.
    pub fn at_path(self, path: &str) -> Self {
        match self {
            FolioError::Render { .. } => self,
            other => FolioError::Render {
                path: path.to_string(),
                source: Box::new(other),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_error_prefixes_path() {
        let err = FolioError::StyleNotFound("nope".to_string()).at_path("pdf.page(1).p(2)");
        assert_eq!(err.to_string(), "pdf.page(1).p(2): Style not found for nope");
        assert_eq!(err.path(), Some("pdf.page(1).p(2)"));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_at_path_keeps_innermost() {
        let err = FolioError::ColumnOutsideRow
            .at_path("pdf.page(1).column(1)")
            .at_path("pdf.page(1)");
        assert_eq!(err.path(), Some("pdf.page(1).column(1)"));
        assert_eq!(err.kind(), ErrorKind::Structural);
    }

    #[test]
    fn test_canvas_errors_are_collaborator_errors() {
        let err: FolioError = CanvasError::Image("missing.png".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::Collaborator);
    }
}
