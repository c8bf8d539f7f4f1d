//! Background sync daemon: a timer-driven pass loop, a Unix-socket control
//! channel and daemon log rotation.

mod error;
pub mod log_rotation;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{
    request_status, request_stop, request_sync, send_request, DaemonRequest, DaemonResponse,
};
pub use runtime::{run, start_blocking, PassReport, PassRunner, RuntimeStatus, Trigger};
