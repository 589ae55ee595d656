use thiserror::Error;

/// Errors returned when a loaded configuration is semantically invalid.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A merge session needs at least one entity kind.
    #[error("`merge.kinds` must contain at least one kind")]
    NoKinds,
    /// Kind names are used as identifiers and must not be blank.
    #[error("`merge.kinds[{0}]` is blank")]
    BlankKind(usize),
    /// Each kind may appear only once in the ordering.
    #[error("`merge.kinds` lists `{0}` more than once")]
    DuplicateKind(String),
    /// The ordering is addressed with 16 bit indices.
    #[error("`merge.kinds` has {0} entries, at most {max} are supported", max = u16::MAX)]
    TooManyKinds(usize),
}
