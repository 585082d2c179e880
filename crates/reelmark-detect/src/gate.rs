use std::time::Duration;

/// Default minimum spacing between two emissions.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(10);

/// Decides whether a detected title should be reported.
///
/// A title is emitted only when it differs from the last one reported and
/// the cooldown since the previous emission has elapsed. Time is an offset
/// from any monotonic origin chosen by the caller, so the gate works the same
/// under tokio and inside a browser host.
#[derive(Debug, Clone)]
pub struct EmissionGate {
    cooldown: Duration,
    last_title: Option<String>,
    last_emitted_at: Option<Duration>,
}

impl Default for EmissionGate {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}

impl EmissionGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_title: None,
            last_emitted_at: None,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn last_title(&self) -> Option<&str> {
        self.last_title.as_deref()
    }

    pub fn last_emitted_at(&self) -> Option<Duration> {
        self.last_emitted_at
    }

    /// Whether `title` detected at `now` should be emitted.
    pub fn should_emit(&self, title: &str, now: Duration) -> bool {
        if self.last_title.as_deref() == Some(title) {
            return false;
        }
        match self.last_emitted_at {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.cooldown,
        }
    }

    /// Note that `title` was emitted at `now`.
    pub fn record(&mut self, title: &str, now: Duration) {
        self.last_title = Some(title.to_string());
        self.last_emitted_at = Some(now);
    }

    /// Check and record in one step. Returns whether the title was emitted.
    pub fn try_emit(&mut self, title: &str, now: Duration) -> bool {
        if self.should_emit(title, now) {
            self.record(title, now);
            true
        } else {
            false
        }
    }

    /// Forget the last title (navigation). The cooldown keeps running.
    pub fn reset_title(&mut self) {
        self.last_title = None;
    }

    /// Forget the last title only if it is still `title`.
    ///
    /// Returns whether it was cleared.
    pub fn clear_if_current(&mut self, title: &str) -> bool {
        if self.last_title.as_deref() == Some(title) {
            self.last_title = None;
            true
        } else {
            false
        }
    }
}
