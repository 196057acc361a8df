//! Telemetry initialization
//!
//! Structured `tracing` output, filtered by `RUST_LOG` and rendered either for
//! humans or as one JSON object per line.

mod init_basic;

pub use init_basic::{init_telemetry, shutdown_telemetry, LogFormat};
