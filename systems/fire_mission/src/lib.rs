#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Monte-Carlo target selection for indirect-fire units.
//!
//! [`MonteCarloTargeting`] draws uniform samples inside a zone boundary and
//! picks the spot that covers the most living defenders. [`FireMission`]
//! tracks one mortar's current order and swaps fire-control waypoints as new
//! targets are found.

use std::time::Duration;

use defence_in_depth_core::{
    ground, Battlefield, Bounds2, EntityId, FactionKey, GroupId, PlayerSnapshot, Timestamp, Vec2,
    Vec3, WaypointId, ZoneBoundary,
};
use rand::Rng;
use serde::{Deserialize, Serialize};

const TARGET: &str = "defence_in_depth::fire_mission";

/// Tunables for target sampling.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingSettings {
    /// Closest planar distance from the firer a target may lie at, in metres.
    pub min_distance: f32,
    /// Farthest planar distance from the firer a target may lie at, in metres.
    pub max_distance: f32,
    /// Radius around a sample within which defenders are counted, in metres.
    pub target_radius: f32,
    /// Number of samples drawn per targeting pass.
    pub samples: u32,
    /// Seconds between targeting passes once a mission is running.
    pub interval_secs: u64,
    /// Upper bound of the random shot count ordered per target.
    pub max_shots: u32,
}

impl Default for TargetingSettings {
    fn default() -> Self {
        Self {
            min_distance: 100.0,
            max_distance: 800.0,
            target_radius: 50.0,
            samples: 10,
            interval_secs: 30,
            max_shots: 6,
        }
    }
}

impl TargetingSettings {
    /// Time between two targeting passes.
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Ground position chosen by a targeting pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TargetSample {
    /// Ground-plane coordinates (`x`, `z`) of the sample.
    pub point: Vec2,
    /// Living defenders within the target radius of the sample.
    pub defenders: usize,
}

/// Monte-Carlo targeting that reuses scratch buffers between passes.
#[derive(Debug)]
pub struct MonteCarloTargeting {
    settings: TargetingSettings,
    bounds: Option<Bounds2>,
    defender_workspace: Vec<Vec2>,
}

impl MonteCarloTargeting {
    /// Creates a targeting system with the provided tunables.
    #[must_use]
    pub fn new(settings: TargetingSettings) -> Self {
        Self {
            settings,
            bounds: None,
            defender_workspace: Vec::new(),
        }
    }

    /// Tunables in use.
    #[must_use]
    pub fn settings(&self) -> &TargetingSettings {
        &self.settings
    }

    /// Draws samples inside `boundary` and returns the first one covering the
    /// strictly highest number of living defenders.
    ///
    /// Samples outside the polygon or outside the distance band around
    /// `firer` are rejected. Returns `None` when every sample is rejected.
    pub fn select_target<R: Rng + ?Sized>(
        &mut self,
        boundary: &ZoneBoundary,
        firer: Vec3,
        defenders: &[PlayerSnapshot],
        rng: &mut R,
    ) -> Option<TargetSample> {
        if boundary.is_degenerate() {
            return None;
        }
        let bounds = match self.bounds {
            Some(bounds) => bounds,
            None => {
                let bounds = boundary.bounds()?;
                self.bounds = Some(bounds);
                bounds
            }
        };

        self.prepare_defender_workspace(defenders);

        let origin = ground(firer);
        let min_sq = self.settings.min_distance * self.settings.min_distance;
        let max_sq = self.settings.max_distance * self.settings.max_distance;
        let radius_sq = self.settings.target_radius * self.settings.target_radius;

        let mut best: Option<TargetSample> = None;
        for _ in 0..self.settings.samples {
            let point = Vec2::new(
                rng.gen_range(bounds.min.x..=bounds.max.x),
                rng.gen_range(bounds.min.y..=bounds.max.y),
            );

            if !boundary.contains(point) {
                continue;
            }
            let distance_sq = origin.distance_squared(point);
            if distance_sq < min_sq || distance_sq > max_sq {
                continue;
            }

            let candidate = TargetSample {
                point,
                defenders: self
                    .defender_workspace
                    .iter()
                    .filter(|defender| defender.distance_squared(point) <= radius_sq)
                    .count(),
            };

            match &mut best {
                Some(existing) => {
                    if candidate.defenders > existing.defenders {
                        *existing = candidate;
                    }
                }
                None => best = Some(candidate),
            }
        }
        best
    }

    fn prepare_defender_workspace(&mut self, defenders: &[PlayerSnapshot]) {
        self.defender_workspace.clear();
        self.defender_workspace.extend(
            defenders
                .iter()
                .filter(|defender| defender.alive)
                .map(|defender| ground(defender.position)),
        );
    }
}

/// Current fire order of one mortar.
#[derive(Clone, Debug, PartialEq)]
pub struct FireMission {
    mortar: EntityId,
    crew: GroupId,
    origin: Vec3,
    target: Option<Vec3>,
    waypoint: Option<WaypointId>,
    last_pass: Option<Timestamp>,
    targeted_at: Option<Timestamp>,
    last_target_count: usize,
}

impl FireMission {
    /// Creates a mission for a freshly crewed mortar.
    #[must_use]
    pub const fn new(mortar: EntityId, crew: GroupId, origin: Vec3) -> Self {
        Self {
            mortar,
            crew,
            origin,
            target: None,
            waypoint: None,
            last_pass: None,
            targeted_at: None,
            last_target_count: 0,
        }
    }

    /// Mortar entity executing the mission.
    #[must_use]
    pub const fn mortar(&self) -> EntityId {
        self.mortar
    }

    /// Group crewing the mortar.
    #[must_use]
    pub const fn crew(&self) -> GroupId {
        self.crew
    }

    /// Position the mortar was spawned at.
    #[must_use]
    pub const fn origin(&self) -> Vec3 {
        self.origin
    }

    /// Position currently under fire.
    #[must_use]
    pub const fn target(&self) -> Option<Vec3> {
        self.target
    }

    /// Fire-control waypoint currently assigned to the crew.
    #[must_use]
    pub const fn waypoint(&self) -> Option<WaypointId> {
        self.waypoint
    }

    /// Time the current target was chosen.
    #[must_use]
    pub const fn targeted_at(&self) -> Option<Timestamp> {
        self.targeted_at
    }

    /// Defenders covered by the current target when it was chosen.
    #[must_use]
    pub const fn last_target_count(&self) -> usize {
        self.last_target_count
    }

    /// Reports whether a targeting pass should run at `now`.
    #[must_use]
    pub fn is_due(&self, now: Timestamp, interval: Duration) -> bool {
        self.last_pass
            .map_or(true, |last| now.saturating_duration_since(last) >= interval)
    }

    /// Runs a targeting pass and, on success, replaces the crew's fire order.
    ///
    /// The previous target is kept when no sample is accepted or the
    /// battlefield refuses to create the waypoint.
    pub fn retarget<B, R>(
        &mut self,
        targeting: &mut MonteCarloTargeting,
        boundary: &ZoneBoundary,
        defender: &FactionKey,
        battlefield: &mut B,
        rng: &mut R,
    ) -> Option<Vec3>
    where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized,
    {
        let now = battlefield.now();
        self.last_pass = Some(now);

        let defenders = battlefield.players_in_faction(defender);
        let Some(sample) = targeting.select_target(boundary, self.origin, &defenders, rng) else {
            tracing::debug!(
                target: TARGET,
                mortar = %self.mortar,
                "fire_mission.no_target"
            );
            return None;
        };

        let position = Vec3::new(
            sample.point.x,
            battlefield.surface_height(sample.point.x, sample.point.y),
            sample.point.y,
        );
        let shots = rng.gen_range(1..=targeting.settings().max_shots.max(1));
        let waypoint = match battlefield.create_fire_waypoint(position, shots) {
            Ok(waypoint) => waypoint,
            Err(error) => {
                tracing::warn!(
                    target: TARGET,
                    mortar = %self.mortar,
                    error = %error,
                    "fire_mission.waypoint_failed"
                );
                return None;
            }
        };

        self.release_waypoint(battlefield);
        battlefield.assign_waypoint(self.crew, waypoint);
        self.waypoint = Some(waypoint);
        self.target = Some(position);
        self.targeted_at = Some(now);
        self.last_target_count = sample.defenders;

        tracing::info!(
            target: TARGET,
            mortar = %self.mortar,
            x = position.x,
            z = position.z,
            defenders = sample.defenders,
            shots,
            "fire_mission.retargeted"
        );
        Some(position)
    }

    /// Destroys the current fire-control waypoint.
    pub fn teardown<B: Battlefield + ?Sized>(&mut self, battlefield: &mut B) {
        self.release_waypoint(battlefield);
        self.target = None;
    }

    fn release_waypoint<B: Battlefield + ?Sized>(&mut self, battlefield: &mut B) {
        if let Some(previous) = self.waypoint.take() {
            battlefield.remove_waypoint(self.crew, previous);
            battlefield.delete_waypoint(previous);
        }
    }
}
