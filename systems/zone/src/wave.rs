use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Shortest interval wave scaling may shrink a spawner to.
const MIN_WAVE_INTERVAL: Duration = Duration::from_secs(10);

/// Tunables of a wave-mode zone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveSettings {
    /// Waves to clear before the zone is held.
    pub total_waves: u32,
    /// Ticket budget of wave 1.
    pub base_tickets: u32,
    /// Extra tickets granted per wave level.
    pub tickets_per_wave: u32,
    /// Per-wave divisor applied to spawner intervals.
    pub frequency_multiplier: f32,
    /// Per-wave factor applied to spawner counts.
    pub count_multiplier: f32,
    /// Seconds between a cleared wave and the next preparation.
    pub transition_secs: u64,
    /// Supplies credited to the linked cache per cleared wave; negative disables it.
    pub supply_reward: i64,
}

impl Default for WaveSettings {
    fn default() -> Self {
        Self {
            total_waves: 5,
            base_tickets: 20,
            tickets_per_wave: 10,
            frequency_multiplier: 1.2,
            count_multiplier: 1.5,
            transition_secs: 15,
            supply_reward: -1,
        }
    }
}

impl WaveSettings {
    /// Delay between a cleared wave and the next preparation.
    #[must_use]
    pub fn transition(&self) -> Duration {
        Duration::from_secs(self.transition_secs)
    }

    /// Ticket budget granted to every active spawner for `wave`.
    #[must_use]
    pub fn tickets_for(&self, wave: u32) -> u32 {
        self.base_tickets
            .saturating_add(wave.saturating_sub(1).saturating_mul(self.tickets_per_wave))
    }

    /// Interval a spawner configured with `base` uses during `wave`.
    #[must_use]
    pub fn interval_for(&self, base: Duration, wave: u32) -> Duration {
        let scale = level_scale(self.frequency_multiplier, wave);
        if scale <= 0.0 || !scale.is_finite() {
            return base.max(MIN_WAVE_INTERVAL);
        }
        let secs = (base.as_secs_f32() / scale).floor();
        Duration::from_secs(secs as u64).max(MIN_WAVE_INTERVAL)
    }

    /// Groups per spawn a spawner configured with `base` uses during `wave`.
    #[must_use]
    pub fn spawn_count_for(&self, base: u32, wave: u32) -> u32 {
        let scale = level_scale(self.count_multiplier, wave);
        let count = (base as f32 * scale).ceil();
        (count as u32).max(1)
    }

    /// Supplies to credit once a wave is cleared.
    #[must_use]
    pub fn reward(&self) -> Option<u32> {
        u32::try_from(self.supply_reward).ok()
    }
}

fn level_scale(multiplier: f32, wave: u32) -> f32 {
    let exponent = i32::try_from(wave.saturating_sub(1)).unwrap_or(i32::MAX);
    multiplier.powi(exponent)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_grow_linearly() {
        let waves = WaveSettings::default();
        assert_eq!(waves.tickets_for(1), 20);
        assert_eq!(waves.tickets_for(2), 30);
        assert_eq!(waves.tickets_for(5), 60);
    }

    #[test]
    fn later_waves_are_never_easier() {
        let waves = WaveSettings::default();
        let base = Duration::from_secs(90);
        for wave in 1..12 {
            assert!(waves.interval_for(base, wave + 1) <= waves.interval_for(base, wave));
            assert!(waves.spawn_count_for(3, wave + 1) >= waves.spawn_count_for(3, wave));
        }
    }

    #[test]
    fn scaling_respects_floors() {
        let waves = WaveSettings {
            frequency_multiplier: 2.0,
            ..WaveSettings::default()
        };
        assert_eq!(waves.interval_for(Duration::from_secs(90), 1), Duration::from_secs(90));
        assert_eq!(waves.interval_for(Duration::from_secs(90), 2), Duration::from_secs(45));
        assert_eq!(waves.interval_for(Duration::from_secs(90), 3), Duration::from_secs(22));
        assert_eq!(waves.interval_for(Duration::from_secs(30), 3), MIN_WAVE_INTERVAL);
        assert_eq!(waves.spawn_count_for(5, 2), 8);
        assert_eq!(waves.spawn_count_for(0, 4), 1);
    }

    #[test]
    fn partial_tables_keep_remaining_defaults() {
        let waves: WaveSettings = toml::from_str(
            r#"
            total_waves = 3
            supply_reward = 120
            "#,
        )
        .expect("parse");
        assert_eq!(waves.total_waves, 3);
        assert_eq!(waves.reward(), Some(120));
        assert_eq!(waves.base_tickets, WaveSettings::default().base_tickets);
        assert_eq!(waves.transition(), Duration::from_secs(15));
    }

    #[test]
    fn negative_reward_is_disabled() {
        let mut waves = WaveSettings::default();
        assert_eq!(waves.reward(), None);
        waves.supply_reward = 250;
        assert_eq!(waves.reward(), Some(250));
    }
}
