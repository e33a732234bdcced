//! Common error types used throughout folio.
//!
//! One enum covers lookups that miss, identity collisions, bad input,
//! persistence and I/O failures, and embedded-metadata parse problems.

/// Common error type for folio.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested entity was not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// More than one row claims the same identity, or a resource is busy.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A database operation failed.
    #[error("Database error: {0}")]
    Database(String),

    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid input or configuration was provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A file name or embedded metadata payload could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An internal error occurred.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new NotFound error.
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new Conflict error.
    pub fn conflict<S: Into<String>>(msg: S) -> Self {
        Self::Conflict(msg.into())
    }

    /// Create a new Database error.
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a new InvalidInput error.
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a new Parse error.
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a new Internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error came from the persistence layer.
    pub fn is_database(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::not_found("series 42");
        assert_eq!(err.to_string(), "Not found: series 42");

        let err = Error::conflict("two series named Berserk");
        assert_eq!(err.to_string(), "Conflict: two series named Berserk");

        let err = Error::database("disk I/O error");
        assert_eq!(err.to_string(), "Database error: disk I/O error");

        let err = Error::invalid_input("bad glob");
        assert_eq!(err.to_string(), "Invalid input: bad glob");

        let err = Error::parse("unexpected end of ComicInfo.xml");
        assert_eq!(err.to_string(), "Parse error: unexpected end of ComicInfo.xml");

        let err = Error::internal("unexpected state");
        assert_eq!(err.to_string(), "Internal error: unexpected state");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::from(io_err);
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_database());
    }

    #[test]
    fn test_is_database() {
        assert!(Error::database("locked").is_database());
        assert!(!Error::conflict("dup").is_database());
    }
}
