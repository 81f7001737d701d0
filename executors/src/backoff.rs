use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Linear wait schedule: attempt `n` sleeps `initial + n * step`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinearBackoff {
    pub initial_delay_ms: u64,
    pub step_ms: u64,
}

impl Default for LinearBackoff {
    /// 1s, 2.5s, 4s, ...
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            step_ms: 1_500,
        }
    }
}

impl LinearBackoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        Duration::from_millis(
            self.initial_delay_ms
                .saturating_add(self.step_ms.saturating_mul(attempt as u64)),
        )
    }

    /// Total time slept by `attempts` consecutive waits
    pub fn total(&self, attempts: u32) -> Duration {
        (0..attempts).map(|attempt| self.delay(attempt)).sum()
    }
}
