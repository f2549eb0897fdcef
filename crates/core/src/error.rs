//! Error types for appstruct
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! ## Taxonomy
//!
//! - Absence: `NameNotFound`, `IdNotFound`, `RecordNotFound`, `AppNotFound`
//! - Collisions: `UniqueViolation`, `IdSpaceExhausted`
//! - On-disk format: `Version`, `UnknownCodec`, `CorruptData`
//! - Caller input: `InvalidName`, `InvalidArgument`, `BatchTooLarge`, `Validation`
//! - Collaborators: `Storage`
//! - Programmer errors: `ContractViolation`
//!
//! Use [`Error::kind`] to branch on the category without matching messages.

use std::fmt;
use thiserror::Error;

/// Result type alias for appstruct operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for appstruct
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Qualified name, container name or singleton is not registered
    #[error("name not found: {0}")]
    NameNotFound(String),

    /// Numeric identifier is not registered
    #[error("id not found: {0}")]
    IdNotFound(String),

    /// Record required by an operation does not exist in storage
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// Unique constraint (singleton, record id, name mapping) violated
    #[error("unique violation: {0}")]
    UniqueViolation(String),

    /// No free identifier remains below the ceiling
    #[error("id space exhausted: {0}")]
    IdSpaceExhausted(String),

    /// Persisted system view uses an unknown (future) codec version
    #[error("unknown version {version} of {view}")]
    Version {
        /// System view name
        view: String,
        /// Version number found in storage
        version: u16,
    },

    /// Persisted row or event uses an unknown codec byte
    #[error("unknown codec {0:#04x}")]
    UnknownCodec(u8),

    /// Persisted data is malformed, truncated or fails its checksum
    #[error("corrupt data: {0}")]
    CorruptData(String),

    /// Identifier violates the identifier syntax
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// Caller passed an argument that can not be used
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Batch read requested more items than supported
    #[error("batch read {requested} items requested, but only {max} supported")]
    BatchTooLarge {
        /// Number of requested items
        requested: usize,
        /// Maximum number of items per batch
        max: usize,
    },

    /// One or more validation failures collected by an event build attempt
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// Error reported by the storage collaborator
    #[error("storage error in {context}: {message}")]
    Storage {
        /// Operation that was running when the storage failed
        context: String,
        /// Message reported by the storage
        message: String,
    },

    /// Application is not configured
    #[error("application not found: {0}")]
    AppNotFound(String),

    /// API contract violated by the caller; unreachable under correct use
    #[error("contract violation: {0}")]
    ContractViolation(String),
}

/// Coarse error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Name, id, record or application is absent
    NotFound,
    /// Unique constraint violated
    UniqueViolation,
    /// Identifier space is full
    IdSpaceExhausted,
    /// Unknown on-disk codec version
    Version,
    /// Persisted data is damaged
    CorruptData,
    /// Event build attempt failed validation
    Validation,
    /// Storage collaborator failed
    Storage,
    /// Caller input is malformed
    InvalidInput,
    /// Caller broke the API contract
    ContractViolation,
}

impl Error {
    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NameNotFound(_)
            | Error::IdNotFound(_)
            | Error::RecordNotFound(_)
            | Error::AppNotFound(_) => ErrorKind::NotFound,
            Error::UniqueViolation(_) => ErrorKind::UniqueViolation,
            Error::IdSpaceExhausted(_) => ErrorKind::IdSpaceExhausted,
            Error::Version { .. } => ErrorKind::Version,
            Error::UnknownCodec(_) | Error::CorruptData(_) => ErrorKind::CorruptData,
            Error::InvalidName(_) | Error::InvalidArgument(_) | Error::BatchTooLarge { .. } => {
                ErrorKind::InvalidInput
            }
            Error::Validation(_) => ErrorKind::Validation,
            Error::Storage { .. } => ErrorKind::Storage,
            Error::ContractViolation(_) => ErrorKind::ContractViolation,
        }
    }

    /// Storage error with operation context.
    pub fn storage(context: impl Into<String>, message: impl fmt::Display) -> Self {
        Error::Storage {
            context: context.into(),
            message: message.to_string(),
        }
    }

    /// Corrupt data error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Error::CorruptData(message.into())
    }

    /// Invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Contract violation error.
    pub fn contract(message: impl Into<String>) -> Self {
        Error::ContractViolation(message.into())
    }

    /// Prefixes the context of a storage error with the calling operation.
    ///
    /// Other variants pass through unchanged.
    pub fn in_context(self, operation: &str) -> Self {
        match self {
            Error::Storage { context, message } => Error::Storage {
                context: format!("{}: {}", operation, context),
                message,
            },
            other => other,
        }
    }

    /// Returns the validation codes carried by this error, if any.
    pub fn validation_codes(&self) -> Vec<ValidationCode> {
        match self {
            Error::Validation(errs) => errs.codes(),
            _ => Vec::new(),
        }
    }
}

/// Stable numeric codes of validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum ValidationCode {
    /// Type name is empty
    EmptyTypeName = 1,
    /// Type name is unknown or differs from the expected one
    InvalidTypeName = 2,
    /// Type kind is not allowed in this place
    InvalidTypeKind = 3,
    /// Required field is empty
    EmptyData = 4,
    /// Record id is not allowed (raw id required, unexpected raw id, duplicate id)
    InvalidRecordId = 5,
    /// Reference or parent id is unknown or refers to a wrong target
    InvalidRefRecordId = 6,
    /// Child element uses an unknown container name
    InvalidChildName = 7,
    /// Container has fewer children than required
    InvalidOccursMin = 8,
    /// Container has more children than allowed
    InvalidOccursMax = 9,
    /// `sys.CUD` command has no CUDs
    EmptyCuds = 10,
    /// Too many creates in one event
    TooManyCreates = 11,
    /// Too many updates in one event
    TooManyUpdates = 12,
    /// Field value kind differs from the declared data kind
    InvalidDataKind = 13,
    /// Field name is unknown for the type
    InvalidFieldName = 14,
    /// Verified field value is not a valid verification token
    InvalidVerifiedValue = 15,
}

impl ValidationCode {
    /// Numeric value of the code.
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for ValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.as_u16())
    }
}

/// Single validation failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Stable failure code
    pub code: ValidationCode,
    /// Human readable description
    pub message: String,
}

impl ValidationError {
    /// Creates a validation error.
    pub fn new(code: ValidationCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// All validation failures of one build attempt
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Adds a failure.
    pub fn push(&mut self, code: ValidationCode, message: impl Into<String>) {
        self.0.push(ValidationError::new(code, message));
    }

    /// Moves all failures of `other` into this collection.
    pub fn extend(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    /// Returns true if no failure was collected.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of collected failures.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates collected failures in collection order.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Codes of collected failures in collection order.
    pub fn codes(&self) -> Vec<ValidationCode> {
        self.0.iter().map(|e| e.code).collect()
    }

    /// Returns true if a failure with `code` was collected.
    pub fn contains(&self, code: ValidationCode) -> bool {
        self.0.iter().any(|e| e.code == code)
    }

    /// `Ok(())` if empty, otherwise `Error::Validation(self)`.
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(Error::Validation(self))
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", e)?;
        }
        Ok(())
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(e: ValidationError) -> Self {
        Self(vec![e])
    }
}
