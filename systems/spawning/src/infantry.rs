use std::time::Duration;

use defence_in_depth_core::{Battlefield, Timestamp};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::SpawnerCore;

/// Tunables of the infantry strategy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfantrySettings {
    /// Pick spawn points at random instead of cycling through them.
    pub random_spawn_points: bool,
    /// Pick waypoints at random instead of cycling through them.
    pub random_waypoints: bool,
    /// Lower bound of the per-wave interval multiplier.
    pub min_interval_multiplier: f32,
    /// Upper bound of the per-wave interval multiplier.
    pub max_interval_multiplier: f32,
}

impl Default for InfantrySettings {
    fn default() -> Self {
        Self {
            random_spawn_points: true,
            random_waypoints: true,
            min_interval_multiplier: 0.8,
            max_interval_multiplier: 1.2,
        }
    }
}

/// Spawns infantry squads on a jittered wave timer.
#[derive(Debug)]
pub struct InfantrySpawner {
    pub(crate) core: SpawnerCore,
    settings: InfantrySettings,
    next_spawn_point: usize,
    next_waypoint: usize,
    jittered: Option<Duration>,
}

impl InfantrySpawner {
    pub(crate) fn new(core: SpawnerCore, settings: InfantrySettings) -> Self {
        Self {
            core,
            settings,
            next_spawn_point: 0,
            next_waypoint: 0,
            jittered: None,
        }
    }

    /// Tunables of the strategy.
    #[must_use]
    pub fn settings(&self) -> &InfantrySettings {
        &self.settings
    }

    /// Interval the pending wave waits for, rolled once per wave.
    pub(crate) fn jittered_interval<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Duration {
        if let Some(interval) = self.jittered {
            return interval;
        }
        let low = self.settings.min_interval_multiplier.max(0.0);
        let high = self.settings.max_interval_multiplier.max(low);
        let multiplier = if high > low {
            rng.gen_range(low..=high)
        } else {
            low
        };
        let secs = (self.core.wave_interval.as_secs_f32() * multiplier).ceil();
        let interval = Duration::from_secs(secs as u64);
        self.jittered = Some(interval);
        interval
    }

    pub(crate) fn reset_jitter(&mut self) {
        self.jittered = None;
    }

    pub(crate) fn spawn_single_group<B, R>(
        &mut self,
        now: Timestamp,
        battlefield: &mut B,
        rng: &mut R,
    ) -> Option<usize>
    where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized,
    {
        let prefab = self.core.settings.prefabs.choose(rng)?.clone();

        let spawn_point = if self.settings.random_spawn_points {
            *self.core.spawn_points.choose(rng)?
        } else {
            let point = *self.core.spawn_points.get(self.next_spawn_point)?;
            self.next_spawn_point = (self.next_spawn_point + 1) % self.core.spawn_points.len();
            point
        };

        let waypoint = if self.settings.random_waypoints {
            *self.core.waypoints.choose(rng)?
        } else {
            let waypoint = *self.core.waypoints.get(self.next_waypoint)?;
            self.next_waypoint = (self.next_waypoint + 1) % self.core.waypoints.len();
            waypoint
        };

        self.core
            .spawn_group_at(&prefab, spawn_point, waypoint, now, battlefield)
    }
}
