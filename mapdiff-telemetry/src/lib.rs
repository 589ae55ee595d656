//! Telemetry setup shared by mapdiff binaries and tests.

pub mod tracing;
