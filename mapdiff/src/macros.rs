//! Shorthands for building [`crate::error::MapDiffError`] values.

/// Creates a [`crate::error::MapDiffError`] from a kind, a static description and optionally a
/// dynamic detail and a source error.
#[macro_export]
macro_rules! mapdiff_error {
    ($kind:expr, $desc:expr) => {
        $crate::error::MapDiffError::from(($kind, $desc))
    };
    ($kind:expr, $desc:expr, source: $source:expr) => {
        $crate::error::MapDiffError::from(($kind, $desc)).with_source($source)
    };
    ($kind:expr, $desc:expr, detail = $detail:expr) => {
        $crate::error::MapDiffError::from(($kind, $desc, $detail))
    };
    ($kind:expr, $desc:expr, detail = $detail:expr, source: $source:expr) => {
        $crate::error::MapDiffError::from(($kind, $desc, $detail)).with_source($source)
    };
    ($kind:expr, $desc:expr, $detail:expr) => {
        $crate::error::MapDiffError::from(($kind, $desc, $detail.to_string()))
    };
    ($kind:expr, $desc:expr, $detail:expr, source: $source:expr) => {
        $crate::error::MapDiffError::from(($kind, $desc, $detail.to_string())).with_source($source)
    };
}

/// Returns early with a [`crate::error::MapDiffError`], accepting the same arguments as
/// [`mapdiff_error!`].
#[macro_export]
macro_rules! bail {
    ($($arg:tt)+) => {
        return ::core::result::Result::Err($crate::mapdiff_error!($($arg)+))
    };
}
