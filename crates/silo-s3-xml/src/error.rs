//! XML codec errors.

/// Error produced while reading or writing S3 XML documents.
#[derive(Debug, thiserror::Error)]
pub enum XmlError {
    /// The underlying XML reader rejected the document.
    #[error("xml syntax error: {0}")]
    Syntax(#[from] quick_xml::Error),

    /// Writing the document failed.
    #[error("xml write error: {0}")]
    Write(#[from] std::io::Error),

    /// A required element was absent.
    #[error("missing element: {0}")]
    MissingElement(String),

    /// The document structure did not match the schema.
    #[error("unexpected element: {0}")]
    UnexpectedElement(String),

    /// Element text could not be decoded or parsed.
    #[error("parse error: {0}")]
    ParseError(String),
}
