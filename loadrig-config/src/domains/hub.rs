//! Event hub configuration

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// Events a subscriber may fall behind before it is disconnected
    pub subscriber_buffer: usize,

    /// Finished executions whose terminal status stays available to late joiners
    pub finished_retention: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer: 1024,
            finished_retention: 256,
        }
    }
}

impl Validatable for HubConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.require_positive(self.subscriber_buffer, "subscriber_buffer")
    }

    fn domain_name(&self) -> &'static str {
        "hub"
    }
}
