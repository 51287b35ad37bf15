use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Length of the chat phase in timer ticks.
    pub round_ticks: u32,
    /// Wall-clock length of one tick.
    pub tick_interval: Duration,
    /// Cosmetic pacing window applied before the matchmaking request; purely
    /// UI feel, zero by default.
    pub search_delay_min: Duration,
    pub search_delay_max: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            round_ticks: 60,
            tick_interval: Duration::from_secs(1),
            search_delay_min: Duration::ZERO,
            search_delay_max: Duration::ZERO,
        }
    }
}

impl ClientConfig {
    pub fn sample_search_delay(&self) -> Duration {
        use rand::Rng;
        let min = self.search_delay_min.min(self.search_delay_max);
        let span = self.search_delay_max.saturating_sub(min).as_millis() as u64;
        if span == 0 {
            return min;
        }
        min + Duration::from_millis(rand::thread_rng().gen_range(0..=span))
    }
}
