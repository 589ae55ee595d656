//! Metric names and labels emitted by merge sessions.
//!
//! Metrics go through the `metrics` facade and are dropped unless the embedding binary installs
//! a recorder.

/// Label for the session operation, `derive` or `apply`.
pub const OPERATION_LABEL: &str = "operation";

/// Label for the change action of an emitted change.
pub const ACTION_LABEL: &str = "action";

/// Label for the error kind that aborted a session.
pub const ERROR_KIND_LABEL: &str = "error_kind";

/// Counter for changes handed to a change sink by derive sessions.
pub const MAPDIFF_CHANGES_EMITTED_TOTAL: &str = "mapdiff_changes_emitted_total";

/// Counter for entities handed to an entity sink by apply sessions.
pub const MAPDIFF_ENTITIES_FORWARDED_TOTAL: &str = "mapdiff_entities_forwarded_total";

/// Counter for sessions aborted by an error.
pub const MAPDIFF_SESSIONS_ABORTED_TOTAL: &str = "mapdiff_sessions_aborted_total";
