//! Route handlers

pub mod executions;
pub mod health;
pub mod profiles;
pub mod scripts;
pub mod stream;

pub use executions::{get_execution, list_executions, start_execution, stop_execution};
pub use health::health_check;
pub use profiles::{get_profile, list_profiles};
pub use scripts::preview_script;
pub use stream::execution_stream;

use loadrig_core::ExecutionId;

use crate::errors::{RestError, RestResult};

pub(crate) fn parse_execution_id(raw: &str) -> RestResult<ExecutionId> {
    raw.parse()
        .map_err(|_| RestError::bad_request(format!("Invalid execution ID '{}'", raw)))
}
