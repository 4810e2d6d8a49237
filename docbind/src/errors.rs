use backtrace::Backtrace;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::result::Result;
use std::sync::Arc;

/// Error kinds reported by the document mapper.
///
/// The typed layer (`DocumentClass`, `Registry`, `ops`) never creates errors of
/// its own; every error a caller sees was produced here and propagated as-is.
///
/// # Examples
///
/// ```rust
/// use docbind::errors::{DocbindError, DocbindResult, ErrorKind};
///
/// fn example() -> DocbindResult<()> {
///     Err(DocbindError::new("model 'User' is not registered", ErrorKind::ModelNotFound))
/// }
///
/// assert_eq!(example().unwrap_err().kind(), &ErrorKind::ModelNotFound);
/// ```
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorKind {
    // Query shape errors
    /// The filter document is malformed or uses an unknown operator
    FilterError,
    /// The update document is malformed or uses an unknown operator
    InvalidUpdate,
    /// The projection mixes inclusion and exclusion or has invalid values
    InvalidProjection,

    // Identity errors
    /// The provided identifier cannot be used as a document id
    InvalidId,
    /// An update or replacement tried to change an immutable field such as `_id`
    ImmutableField,

    // Schema errors
    /// Generic document validation failure
    ValidationError,
    /// A required field is missing or null
    MissingRequiredField,
    /// A value could not be cast to the type declared by the schema
    CastError,

    // Store errors
    /// A document with the same `_id` already exists
    DuplicateKey,
    /// A document that was expected to exist is gone
    DocumentNotFound,

    // Model registry errors
    /// A model with the same name was already defined on the connection
    ModelAlreadyExists,
    /// No model with the requested name exists on the connection
    ModelNotFound,

    // Population errors
    /// A reference path cannot be resolved
    PopulateError,

    // Event errors
    /// Error while publishing or handling model events
    EventError,

    // Encoding errors
    /// Error converting between JSON values and documents
    ObjectMappingError,

    /// Internal error (usually indicates a bug)
    InternalError,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::FilterError => write!(f, "Filter error"),
            ErrorKind::InvalidUpdate => write!(f, "Invalid update"),
            ErrorKind::InvalidProjection => write!(f, "Invalid projection"),
            ErrorKind::InvalidId => write!(f, "Invalid ID"),
            ErrorKind::ImmutableField => write!(f, "Immutable field"),
            ErrorKind::ValidationError => write!(f, "Validation error"),
            ErrorKind::MissingRequiredField => write!(f, "Missing required field"),
            ErrorKind::CastError => write!(f, "Cast error"),
            ErrorKind::DuplicateKey => write!(f, "Duplicate key"),
            ErrorKind::DocumentNotFound => write!(f, "Document not found"),
            ErrorKind::ModelAlreadyExists => write!(f, "Model already exists"),
            ErrorKind::ModelNotFound => write!(f, "Model not found"),
            ErrorKind::PopulateError => write!(f, "Populate error"),
            ErrorKind::EventError => write!(f, "Event error"),
            ErrorKind::ObjectMappingError => write!(f, "Object mapping error"),
            ErrorKind::InternalError => write!(f, "Internal error"),
        }
    }
}

/// Error type for every fallible mapper operation.
///
/// Carries a message, an [ErrorKind], an optional cause and the backtrace
/// captured where the error was created.
///
/// ```rust
/// use docbind::errors::{DocbindError, ErrorKind};
///
/// let cause = DocbindError::new("bad value for 'age'", ErrorKind::CastError);
/// let err = DocbindError::new_with_cause("User validation failed", ErrorKind::ValidationError, cause);
/// assert!(format!("{:?}", err).contains("Caused by:"));
/// ```
#[derive(Clone)]
pub struct DocbindError {
    message: String,
    error_kind: ErrorKind,
    cause: Option<Box<DocbindError>>,
    backtrace: Arc<Backtrace>,
}

impl DocbindError {
    pub fn new(message: &str, error_kind: ErrorKind) -> Self {
        DocbindError {
            message: message.to_string(),
            error_kind,
            cause: None,
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn new_with_cause(message: &str, error_kind: ErrorKind, cause: DocbindError) -> Self {
        DocbindError {
            message: message.to_string(),
            error_kind,
            cause: Some(Box::new(cause)),
            backtrace: Arc::new(Backtrace::new()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.error_kind
    }

    pub fn cause(&self) -> Option<&DocbindError> {
        self.cause.as_deref()
    }
}

impl Display for DocbindError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Debug for DocbindError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.cause {
            Some(cause) => write!(f, "{}\nCaused by: {:?}", self.message, cause),
            None => write!(f, "{}\n{:?}", self.message, self.backtrace),
        }
    }
}

impl Error for DocbindError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match &self.cause {
            Some(cause) => Some(cause.as_ref()),
            None => None,
        }
    }
}

/// Shorthand for `Result<T, DocbindError>`.
pub type DocbindResult<T> = Result<T, DocbindError>;

impl From<serde_json::Error> for DocbindError {
    fn from(err: serde_json::Error) -> Self {
        DocbindError::new(
            &format!("JSON mapping error: {}", err),
            ErrorKind::ObjectMappingError,
        )
    }
}

impl From<regex::Error> for DocbindError {
    fn from(err: regex::Error) -> Self {
        DocbindError::new(&format!("Invalid $regex pattern: {}", err), ErrorKind::FilterError)
    }
}
