//! Error types for merge sessions.
//!
//! Every failure inside a derive or apply session is fatal for the whole session. The first
//! error is stored in the shared state and handed to the thread that caused it, while the
//! counterpart thread receives a [`ErrorKind::SessionAborted`] error whose
//! [`error::Error::source`] is that first error.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::{Arc, PoisonError};

/// Result type of fallible mapdiff operations.
pub type MapDiffResult<T> = Result<T, MapDiffError>;

#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Error returned by merge sessions, sinks and pipeline drivers.
///
/// Cloning is cheap: the payload is shared, which allows the session to keep the first error
/// while also returning it to the caller.
#[derive(Debug, Clone)]
pub struct MapDiffError {
    repr: ErrorRepr,
}

#[derive(Debug, Clone)]
enum ErrorRepr {
    Single(Box<ErrorPayload>),
    /// Several independent failures, e.g. both producers of a session failing on their own.
    Many {
        errors: Vec<MapDiffError>,
        location: &'static Location<'static>,
    },
}

/// Categories of mapdiff errors.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Input errors
    /// A source delivered a position which does not strictly follow its previous one.
    OrderingViolation,
    /// A source delivered an entity of a kind that is not part of the session ordering.
    UnknownKind,
    /// A change carried an action that contradicts the base snapshot.
    InvalidChangeAction,

    // Lifecycle errors
    /// A source released before it completed.
    PrematureRelease,
    /// A source was used after it completed, or shared state was inconsistent.
    InvalidState,
    /// Waiting for the counterpart source failed.
    InterruptedWait,
    /// The counterpart source failed and the session was aborted.
    SessionAborted,
    /// A producer thread panicked.
    ProducerPanic,

    // Downstream errors
    SinkError,

    ConfigError,

    Unknown,

    /// Error injected through a fail point in tests.
    #[cfg(feature = "failpoints")]
    FailpointTriggered,
}

impl MapDiffError {
    /// Returns the [`ErrorKind`] of this error, or of the first aggregated error.
    pub fn kind(&self) -> ErrorKind {
        match &self.repr {
            ErrorRepr::Single(payload) => payload.kind,
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(MapDiffError::kind)
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns every [`ErrorKind`] contained in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match &self.repr {
            ErrorRepr::Single(payload) => vec![payload.kind],
            ErrorRepr::Many { errors, .. } => errors.iter().flat_map(|err| err.kinds()).collect(),
        }
    }

    /// Returns the static description of this error.
    pub fn description(&self) -> &str {
        match &self.repr {
            ErrorRepr::Single(payload) => &payload.description,
            ErrorRepr::Many { .. } => "multiple errors",
        }
    }

    /// Returns the dynamic detail, if any.
    pub fn detail(&self) -> Option<&str> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload.detail.as_deref(),
            ErrorRepr::Many { errors, .. } => errors.iter().find_map(|err| err.detail()),
        }
    }

    pub fn backtrace(&self) -> Option<&Backtrace> {
        match &self.repr {
            ErrorRepr::Single(payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the location where the error was created.
    pub fn location(&self) -> &'static Location<'static> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Attaches the error that caused this one. No effect on aggregated errors.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(payload) = &mut self.repr {
            payload.source = Some(Arc::new(source));
        }

        self
    }

    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
    ) -> Self {
        MapDiffError {
            repr: ErrorRepr::Single(Box::new(ErrorPayload {
                kind,
                description,
                detail,
                source: None,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            })),
        }
    }
}

/// Errors compare equal when their kinds match, which is what tests assert on.
impl PartialEq for MapDiffError {
    fn eq(&self, other: &MapDiffError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (ErrorRepr::Many { errors: a, .. }, ErrorRepr::Many { errors: b, .. }) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for MapDiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line()
                )?;

                if let Some(detail) = &payload.detail {
                    for (index, line) in detail.lines().enumerate() {
                        if index == 0 {
                            write!(f, "\n  Detail: {line}")?;
                        } else {
                            write!(f, "\n    {line}")?;
                        }
                    }
                }

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                write!(
                    f,
                    "[Many] {} errors aggregated @ {}:{}",
                    errors.len(),
                    location.file(),
                    location.line()
                )?;

                for (index, err) in errors.iter().enumerate() {
                    let rendered = err.to_string();
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

impl error::Error for MapDiffError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source.as_ref() as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|err| err as &(dyn error::Error + 'static)),
        }
    }
}

impl From<(ErrorKind, &'static str)> for MapDiffError {
    #[track_caller]
    fn from((kind, description): (ErrorKind, &'static str)) -> MapDiffError {
        MapDiffError::from_components(kind, Cow::Borrowed(description), None)
    }
}

impl<D> From<(ErrorKind, &'static str, D)> for MapDiffError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, description, detail): (ErrorKind, &'static str, D)) -> MapDiffError {
        MapDiffError::from_components(kind, Cow::Borrowed(description), Some(detail.into()))
    }
}

/// Aggregates errors. A single error is returned as is.
impl<E> From<Vec<E>> for MapDiffError
where
    E: Into<MapDiffError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> MapDiffError {
        let location = Location::caller();
        let mut errors: Vec<MapDiffError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(err) = errors.pop()
        {
            return err;
        }

        MapDiffError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// A poisoned mutex or condition variable means the counterpart panicked while holding the
/// session lock; waiting on it can not make progress any more.
impl<T> From<PoisonError<T>> for MapDiffError {
    #[track_caller]
    fn from(err: PoisonError<T>) -> MapDiffError {
        MapDiffError::from_components(
            ErrorKind::InterruptedWait,
            Cow::Borrowed("Merge session lock was poisoned"),
            Some(Cow::Owned(err.to_string())),
        )
    }
}

impl From<mapdiff_config::shared::ValidationError> for MapDiffError {
    #[track_caller]
    fn from(err: mapdiff_config::shared::ValidationError) -> MapDiffError {
        let detail = err.to_string();
        MapDiffError::from_components(
            ErrorKind::ConfigError,
            Cow::Borrowed("Invalid merge configuration"),
            Some(Cow::Owned(detail)),
        )
        .with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;
    use crate::mapdiff_error;

    #[test]
    fn source_is_preserved_across_clones() {
        let cause = mapdiff_error!(ErrorKind::OrderingViolation, "Out of order", "node 3 after 5");
        let aborted = mapdiff_error!(ErrorKind::SessionAborted, "Aborted", source: cause);

        let cloned = aborted.clone();
        let source = cloned
            .source()
            .and_then(|source| source.downcast_ref::<MapDiffError>())
            .unwrap();

        assert_eq!(cloned.kind(), ErrorKind::SessionAborted);
        assert_eq!(source.kind(), ErrorKind::OrderingViolation);
        assert_eq!(source.detail(), Some("node 3 after 5"));
    }

    #[test]
    fn single_error_is_not_aggregated() {
        let err = MapDiffError::from(vec![mapdiff_error!(ErrorKind::SinkError, "Sink failed")]);

        assert_eq!(err.kinds(), vec![ErrorKind::SinkError]);
        assert_eq!(err.description(), "Sink failed");
    }

    #[test]
    fn aggregated_errors_report_all_kinds() {
        let err = MapDiffError::from(vec![
            mapdiff_error!(ErrorKind::SinkError, "Sink failed"),
            mapdiff_error!(ErrorKind::OrderingViolation, "Out of order"),
        ]);

        assert_eq!(err.kind(), ErrorKind::SinkError);
        assert_eq!(
            err.kinds(),
            vec![ErrorKind::SinkError, ErrorKind::OrderingViolation]
        );
        assert!(err.to_string().starts_with("[Many] 2 errors aggregated"));
    }
}
