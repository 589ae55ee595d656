//! Fail points used to inject errors into merge sessions in tests.
//!
//! They compile to nothing unless the `failpoints` feature is enabled.

use fail::fail_point;

use crate::error::MapDiffResult;

/// Evaluated on every pass of the merge loop, right before a thread waits for its counterpart.
pub const MERGE_BEFORE_WAIT: &str = "merge.before_wait";

/// Evaluated before an adapter hands an element to the sink.
pub const MERGE_BEFORE_SINK_CALL: &str = "merge.before_sink_call";

/// Returns an error if the fail point `name` is configured to return.
///
/// The fail point parameter selects the error kind: `interrupted_wait`, `sink_error`, or
/// anything else for a generic injected failure.
pub fn mapdiff_fail_point(name: &str) -> MapDiffResult<()> {
    fail_point!(name, |parameter| {
        use crate::bail;
        use crate::error::ErrorKind;

        let kind = match parameter.as_deref() {
            Some("interrupted_wait") => ErrorKind::InterruptedWait,
            Some("sink_error") => ErrorKind::SinkError,
            _ => ErrorKind::FailpointTriggered,
        };

        bail!(
            kind,
            "An error occurred in a fail point",
            format!("The fail point '{name}' returned an error")
        );
    });

    Ok(())
}
