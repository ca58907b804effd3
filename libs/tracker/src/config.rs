use std::time::Duration;

/// Configuration for a tracker instance.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Target average interval between processed items.
    pub processing_interval: Duration,
    /// Tolerance band around the target before the pacing delay is adjusted.
    pub pacing_fuzziness: Duration,
    /// Capacity of the item and change broadcast channels; slow subscribers
    /// past this depth observe a lag error, not backpressure.
    pub event_capacity: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            processing_interval: Duration::from_millis(100),
            pacing_fuzziness: Duration::from_millis(5),
            event_capacity: 1024,
        }
    }
}

impl TrackerConfig {
    pub fn with_processing_interval(mut self, interval: Duration) -> Self {
        self.processing_interval = interval;
        self
    }

    pub fn with_pacing_fuzziness(mut self, fuzziness: Duration) -> Self {
        self.pacing_fuzziness = fuzziness;
        self
    }

    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }
}
