/// Errors raised by the data access API and its providers.
///
/// The first four variants are the contract conditions every provider must
/// honour: they are raised synchronously by the operation that detects the
/// violation and are never retried inside this layer.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// Illegal construction or argument (empty composite, operand arity mismatch, bad page size).
    #[error("Illegal argument: {0}")]
    IllegalArgument(String),
    /// Navigation past the known boundary of a page.
    #[error("No such element: {0}")]
    NoSuchElement(String),
    /// The store cannot provide the requested capability.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// A scoped capability used outside its scope.
    #[error("Illegal state: {0}")]
    IllegalState(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Database error: {0}")]
    Database(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("Data error: {0}")]
    Other(String),
}

impl DataError {
    /// Construct a `Database` variant from any error type.
    ///
    /// Used by provider crates (e.g. `keel-data-sqlx`) to wrap driver-specific
    /// errors.
    pub fn database(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        DataError::Database(Box::new(err))
    }

    pub fn illegal_argument(msg: impl Into<String>) -> Self {
        DataError::IllegalArgument(msg.into())
    }

    pub fn no_such_element(msg: impl Into<String>) -> Self {
        DataError::NoSuchElement(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        DataError::UnsupportedOperation(msg.into())
    }

    pub fn illegal_state(msg: impl Into<String>) -> Self {
        DataError::IllegalState(msg.into())
    }
}

/// Convenience alias for data-layer results.
pub type DataResult<T> = Result<T, DataError>;
