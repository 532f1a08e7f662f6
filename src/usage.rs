//! prompt usage meter: daily / weekly / monthly consumed-vs-limit counters.
//!
//! counters live for the process lifetime. there is no rollover.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Window {
    Daily,
    Weekly,
    Monthly,
}

impl Window {
    pub const ALL: [Window; 3] = [Window::Daily, Window::Weekly, Window::Monthly];

    pub fn label(self) -> &'static str {
        match self {
            Window::Daily => "daily",
            Window::Weekly => "weekly",
            Window::Monthly => "monthly",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct UsageWindow {
    pub consumed: u32,
    pub limit: u32,
}

impl UsageWindow {
    pub fn percentage(&self) -> f32 {
        if self.limit == 0 {
            return 0.0;
        }
        100.0 * self.consumed as f32 / self.limit as f32
    }
}

/// per-window limits, as found in `ChatConfig`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageLimits {
    pub daily: u32,
    pub weekly: u32,
    pub monthly: u32,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self { daily: 50, weekly: 250, monthly: 1000 }
    }
}

/// one progress-bar worth of data.
#[derive(Clone, Debug, PartialEq)]
pub struct UsageDisplay {
    pub window: Window,
    pub consumed_text: String,
    pub percentage: f32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UsageMeter {
    daily: UsageWindow,
    weekly: UsageWindow,
    monthly: UsageWindow,
}

impl Default for UsageMeter {
    fn default() -> Self {
        Self::new(UsageLimits::default())
    }
}

impl UsageMeter {
    pub fn new(limits: UsageLimits) -> Self {
        Self {
            daily: UsageWindow { consumed: 0, limit: limits.daily },
            weekly: UsageWindow { consumed: 0, limit: limits.weekly },
            monthly: UsageWindow { consumed: 0, limit: limits.monthly },
        }
    }

    pub fn window(&self, window: Window) -> UsageWindow {
        match window {
            Window::Daily => self.daily,
            Window::Weekly => self.weekly,
            Window::Monthly => self.monthly,
        }
    }

    /// one accepted send: every window moves together.
    pub fn record_use(&mut self) {
        for w in [&mut self.daily, &mut self.weekly, &mut self.monthly] {
            w.consumed = w.consumed.saturating_add(1);
        }
    }

    pub fn render_all(&self) -> [UsageDisplay; 3] {
        Window::ALL.map(|window| {
            let w = self.window(window);
            UsageDisplay {
                window,
                consumed_text: format!("{} / {}", w.consumed, w.limit),
                percentage: w.percentage(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn record_use_moves_all_windows() {
        let mut meter = UsageMeter::default();
        meter.record_use();
        meter.record_use();
        for w in Window::ALL {
            assert_eq!(meter.window(w).consumed, 2);
        }
    }

    #[test]
    fn render_all_formats_text_and_percentage() {
        let mut meter = UsageMeter::new(UsageLimits { daily: 4, weekly: 0, monthly: 1000 });
        meter.record_use();

        let [daily, weekly, monthly] = meter.render_all();
        assert_eq!(daily.window, Window::Daily);
        assert_eq!(daily.consumed_text, "1 / 4");
        assert_eq!(daily.percentage, 25.0);
        // zero limit never divides
        assert_eq!(weekly.consumed_text, "1 / 0");
        assert_eq!(weekly.percentage, 0.0);
        assert_eq!(monthly.percentage, 0.1);
    }
}
