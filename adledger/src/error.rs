//! Error types and result definitions for ledger operations.
//!
//! [`LedgerError`] carries a classification, a static description, optional dynamic detail and
//! source, and the call site that created it. Failures of many flush workers in one cycle are
//! folded into a single aggregated error.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for ledger operations using [`LedgerError`] as the error type.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Detailed payload stored for single [`LedgerError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for ledger operations.
#[derive(Debug, Clone)]
pub struct LedgerError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload holding rich metadata.
    Single(ErrorPayload),
    /// Multiple aggregated errors, mainly failures of several flush workers.
    Many {
        errors: Vec<LedgerError>,
        location: &'static Location<'static>,
    },
}

/// Categories of errors that can occur while recording and flushing counters.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Counter store errors
    CounterStoreConnectionFailed,
    CounterStoreCommandFailed,
    CounterStoreTimeout,

    // Aggregate store errors
    AggregateStoreConnectionFailed,
    AggregateStoreQueryFailed,
    AggregateStoreTransactionFailed,
    AggregateStoreLockTimeout,

    // Data errors
    InvalidCounterKey,
    InvalidData,
    ConversionError,
    ValidationError,

    // Configuration errors
    ConfigError,
    AuthenticationError,

    // Workflow errors
    InvalidState,
    FlushWorkerPanic,
    FlushWorkerTimeout,
    SchedulerPanic,

    Unknown,

    // Raised by fault injection in tests.
    #[cfg(feature = "failpoints")]
    FailpointTriggered,
}

impl LedgerError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error, flattening aggregates.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns the dynamic detail, or the first available one for aggregates.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the static description of a single error.
    pub fn description(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.description.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Number of errors held, `1` for a single error.
    pub fn len(&self) -> usize {
        match self.repr {
            ErrorRepr::Single(_) => 1,
            ErrorRepr::Many { ref errors, .. } => errors.len(),
        }
    }

    /// Returns `true` for an aggregate built from an empty list.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Attaches an originating error and returns the modified instance.
    ///
    /// Has no effect on aggregated errors, which forward their first error as source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        LedgerError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }

    #[track_caller]
    fn from_source<E>(kind: ErrorKind, description: &'static str, err: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        let detail = err.to_string();
        LedgerError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl PartialEq for LedgerError {
    fn eq(&self, other: &LedgerError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl Hash for LedgerError {
    /// Hashes only the kind and static description so repeated failures of the same
    /// category group together regardless of location or detail.
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.repr).hash(state);
        match &self.repr {
            ErrorRepr::Single(payload) => {
                payload.kind.hash(state);
                payload.description.hash(state);
            }
            ErrorRepr::Many { errors, .. } => {
                errors.len().hash(state);
                for error in errors {
                    error.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if let Some(detail) = payload.detail.as_deref() {
                    write!(f, "\n  Detail:")?;
                    write_indented(detail, f, "    ")?;
                }

                let backtrace = payload.backtrace.to_string();
                if !backtrace.trim().is_empty() {
                    write!(f, "\n  Backtrace:")?;
                    write_indented(&backtrace, f, "    ")?;
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if errors.is_empty() {
                    write!(f, "\n  (no inner errors provided)")?;
                }

                for (index, error) in errors.iter().enumerate() {
                    let rendered = error.to_string();
                    let mut lines = rendered.lines();
                    write!(f, "\n  {}. {}", index + 1, lines.next().unwrap_or_default())?;
                    for line in lines {
                        write!(f, "\n     {line}")?;
                    }
                }

                Ok(())
            }
        }
    }
}

fn write_indented(text: &str, f: &mut fmt::Formatter<'_>, indent: &str) -> fmt::Result {
    for line in text.lines() {
        if line.trim().is_empty() {
            write!(f, "\n{indent}")?;
        } else {
            write!(f, "\n{indent}{line}")?;
        }
    }

    Ok(())
}

impl error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Creates a [`LedgerError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for LedgerError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> LedgerError {
        LedgerError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`LedgerError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for LedgerError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> LedgerError {
        LedgerError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Aggregates a list of errors. A single-element list yields that error unchanged.
impl<E> From<Vec<E>> for LedgerError
where
    E: Into<LedgerError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> LedgerError {
        let location = Location::caller();

        let mut errors: Vec<LedgerError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1 {
            if let Some(error) = errors.pop() {
                return error;
            }
        }

        LedgerError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

impl From<std::num::ParseIntError> for LedgerError {
    #[track_caller]
    fn from(err: std::num::ParseIntError) -> LedgerError {
        LedgerError::from_source(ErrorKind::ConversionError, "Integer parsing failed", err)
    }
}

/// Converts [`sqlx::Error`] using the SQLSTATE class of database errors.
impl From<sqlx::Error> for LedgerError {
    #[track_caller]
    fn from(err: sqlx::Error) -> LedgerError {
        let (kind, description) = match &err {
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                // serialization_failure, deadlock_detected
                Some("40001") | Some("40P01") => (
                    ErrorKind::AggregateStoreTransactionFailed,
                    "PostgreSQL transaction failed",
                ),
                // lock_not_available
                Some("55P03") => (
                    ErrorKind::AggregateStoreLockTimeout,
                    "PostgreSQL lock not available",
                ),
                Some(code) if code.starts_with("08") || code.starts_with("57") => (
                    ErrorKind::AggregateStoreConnectionFailed,
                    "PostgreSQL connection failed",
                ),
                Some(code) if code.starts_with("28") => (
                    ErrorKind::AuthenticationError,
                    "PostgreSQL authentication failed",
                ),
                Some(code) if code.starts_with("23") => (
                    ErrorKind::ValidationError,
                    "PostgreSQL constraint violation",
                ),
                _ => (
                    ErrorKind::AggregateStoreQueryFailed,
                    "Database operation failed",
                ),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut => (
                ErrorKind::AggregateStoreConnectionFailed,
                "Database connection failed",
            ),
            sqlx::Error::Migrate(_) => (ErrorKind::InvalidState, "Database migration failed"),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => (
                ErrorKind::ConversionError,
                "Database value decoding failed",
            ),
            _ => (
                ErrorKind::AggregateStoreQueryFailed,
                "Database operation failed",
            ),
        };

        LedgerError::from_source(kind, description, err)
    }
}

/// Converts [`fred::error::Error`] raised by the Redis counter store.
impl From<fred::error::Error> for LedgerError {
    #[track_caller]
    fn from(err: fred::error::Error) -> LedgerError {
        use fred::error::ErrorKind as FredErrorKind;

        let (kind, description) = match err.kind() {
            FredErrorKind::IO | FredErrorKind::Canceled => (
                ErrorKind::CounterStoreConnectionFailed,
                "Redis connection failed",
            ),
            FredErrorKind::Timeout => (ErrorKind::CounterStoreTimeout, "Redis command timed out"),
            FredErrorKind::Auth => (
                ErrorKind::AuthenticationError,
                "Redis authentication failed",
            ),
            FredErrorKind::Config | FredErrorKind::Url => {
                (ErrorKind::ConfigError, "Redis client misconfigured")
            }
            FredErrorKind::Parse => (
                ErrorKind::ConversionError,
                "Redis response could not be parsed",
            ),
            _ => (ErrorKind::CounterStoreCommandFailed, "Redis command failed"),
        };

        LedgerError::from_source(kind, description, err)
    }
}
