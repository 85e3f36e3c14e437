//! Background runtime for prwatch: update timer + Unix-socket server, plus
//! blocking in-process entrypoints for when no daemon is running.

mod error;
pub mod local;
pub mod lock;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use local::{plan_blocking, test_connection_blocking, update_blocking};
pub use lock::{run_locked_cycle, CycleLock};
pub use protocol::{
    request_status, request_stop, request_test_connection, request_update, send_request,
    DaemonRequest, DaemonResponse,
};
pub use runtime::{build_orchestrator, init_tracing, run, run_with, start_blocking};
