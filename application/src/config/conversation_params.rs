//! Conversation runtime parameters

use crate::coordination::bus::DEFAULT_SUBSCRIBER_CAPACITY;
use parlor_domain::conversation::window::DEFAULT_WINDOW_CAPACITY;
use std::time::Duration;

/// Parameters that shape one conversation run
#[derive(Debug, Clone)]
pub struct ConversationParams {
    /// Non-system messages before the supervisor stops the run
    pub max_turns: u32,
    /// Period of each agent's decision timer
    pub tick_interval: Duration,
    /// Messages each agent remembers
    pub window_capacity: usize,
    /// Queue size of every bus subscription
    pub bus_capacity: usize,
    /// Upper bound of the random offset applied to each agent's first turn
    pub startup_jitter: Duration,
}

impl Default for ConversationParams {
    fn default() -> Self {
        Self {
            max_turns: 20,
            tick_interval: Duration::from_secs(1),
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            bus_capacity: DEFAULT_SUBSCRIBER_CAPACITY,
            startup_jitter: Duration::from_secs(5),
        }
    }
}

impl ConversationParams {
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_tick_interval(mut self, tick_interval: Duration) -> Self {
        self.tick_interval = tick_interval;
        self
    }

    pub fn with_startup_jitter(mut self, jitter: Duration) -> Self {
        self.startup_jitter = jitter;
        self
    }
}
