use std::time::Duration;

use defence_in_depth_core::{Battlefield, CrewConfig, EntityId, PrefabId, Timestamp, ZoneIndex};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::{SpawnerCore, TARGET};

/// Tunables of the mechanized strategy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MechanizedSettings {
    /// Vehicle prefabs picked at random for every spawn.
    pub vehicle_prefabs: Vec<PrefabId>,
    /// Crew seated into every vehicle.
    pub crew: Option<CrewConfig>,
    /// Hold vehicles back until enough AI are already in the field.
    pub require_min_ai: bool,
    /// Zone-wide living AI required before vehicles commit.
    pub min_ai_threshold: usize,
    /// Factor applied to the wave interval at prepare time.
    pub delay_multiplier: f32,
    /// Send two or three vehicles at once from zone 3 onwards.
    pub coordinated_spawn: bool,
}

impl Default for MechanizedSettings {
    fn default() -> Self {
        Self {
            vehicle_prefabs: Vec::new(),
            crew: None,
            require_min_ai: true,
            min_ai_threshold: 10,
            delay_multiplier: 2.0,
            coordinated_spawn: true,
        }
    }
}

/// Spawns crewed vehicles once infantry has built up.
#[derive(Debug)]
pub struct MechanizedSpawner {
    pub(crate) core: SpawnerCore,
    pub(crate) settings: MechanizedSettings,
    vehicles: Vec<EntityId>,
}

impl MechanizedSpawner {
    pub(crate) fn new(core: SpawnerCore, settings: MechanizedSettings) -> Self {
        Self {
            core,
            settings,
            vehicles: Vec::new(),
        }
    }

    /// Vehicles currently owned by the spawner.
    #[must_use]
    pub fn vehicles(&self) -> &[EntityId] {
        &self.vehicles
    }

    pub(crate) fn prepare(&mut self) {
        let multiplier = self.settings.delay_multiplier.max(0.0);
        let delayed = (self.core.base_interval.as_secs_f32() * multiplier).ceil();
        self.core.base_interval = Duration::from_secs(delayed as u64);
        self.core.wave_interval = self.core.base_interval;
    }

    pub(crate) fn missing_requirement(&self) -> Option<&'static str> {
        if self.settings.vehicle_prefabs.is_empty() {
            Some("vehicle_prefabs")
        } else if self.core.spawn_points.is_empty() {
            Some("spawn_points")
        } else if self.core.waypoints.is_empty() {
            Some("waypoints")
        } else if self.settings.crew.is_none() {
            Some("crew")
        } else {
            None
        }
    }

    pub(crate) fn threshold_reached(&self, active_ai: usize) -> bool {
        !self.settings.require_min_ai || active_ai >= self.settings.min_ai_threshold
    }

    pub(crate) fn spawn_count<R: Rng + ?Sized>(&self, zone: ZoneIndex, rng: &mut R) -> u32 {
        if self.settings.coordinated_spawn && zone.get() >= 3 {
            rng.gen_range(2..=3)
        } else {
            1
        }
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
        let crew = self.settings.crew.as_ref()?;
        let prefab = self.settings.vehicle_prefabs.choose(rng)?;
        let spawn_point = *self.core.spawn_points.choose(rng)?;
        let waypoint = *self.core.waypoints.choose(rng)?;

        let vehicle = match battlefield.spawn_vehicle(prefab, spawn_point) {
            Ok(vehicle) => vehicle,
            Err(error) => {
                tracing::error!(
                    target: TARGET,
                    spawner = %self.core.name,
                    prefab = %prefab,
                    error = %error,
                    "spawning.vehicle_failed"
                );
                return None;
            }
        };
        self.vehicles.push(vehicle);

        match battlefield.crew_vehicle(vehicle, crew, Some(waypoint)) {
            Ok(group) => {
                let members = self.core.adopt(group, now, battlefield);
                tracing::debug!(
                    target: TARGET,
                    spawner = %self.core.name,
                    vehicle = %vehicle,
                    group = %group,
                    members,
                    "spawning.vehicle_spawned"
                );
                Some(members)
            }
            Err(error) => {
                tracing::error!(
                    target: TARGET,
                    spawner = %self.core.name,
                    vehicle = %vehicle,
                    error = %error,
                    "spawning.crew_failed"
                );
                None
            }
        }
    }

    pub(crate) fn remove_vehicles<B: Battlefield + ?Sized>(&mut self, battlefield: &mut B) {
        for vehicle in self.vehicles.drain(..) {
            battlefield.delete_entity(vehicle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SpawnerSettings;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn spawner(settings: MechanizedSettings) -> MechanizedSpawner {
        let core = SpawnerCore::new(
            "armour".to_owned(),
            SpawnerSettings {
                wave_interval_secs: 45,
                ..SpawnerSettings::default()
            },
            Vec::new(),
        );
        MechanizedSpawner::new(core, settings)
    }

    #[test]
    fn prepare_stretches_the_interval() {
        let mut armour = spawner(MechanizedSettings {
            delay_multiplier: 1.5,
            ..MechanizedSettings::default()
        });
        armour.prepare();
        assert_eq!(armour.core.wave_interval, Duration::from_secs(68));
        assert_eq!(armour.core.base_interval, Duration::from_secs(68));
    }

    #[test]
    fn coordinated_waves_start_at_zone_three() {
        let armour = spawner(MechanizedSettings::default());
        let mut rng = ChaCha8Rng::seed_from_u64(4);
        assert_eq!(armour.spawn_count(ZoneIndex::new(2), &mut rng), 1);
        for _ in 0..16 {
            let count = armour.spawn_count(ZoneIndex::new(3), &mut rng);
            assert!((2..=3).contains(&count));
        }

        let solo = spawner(MechanizedSettings {
            coordinated_spawn: false,
            ..MechanizedSettings::default()
        });
        assert_eq!(solo.spawn_count(ZoneIndex::new(5), &mut rng), 1);
    }

    #[test]
    fn threshold_gates_only_when_required() {
        let armour = spawner(MechanizedSettings::default());
        assert!(!armour.threshold_reached(9));
        assert!(armour.threshold_reached(10));

        let eager = spawner(MechanizedSettings {
            require_min_ai: false,
            ..MechanizedSettings::default()
        });
        assert!(eager.threshold_reached(0));
    }

    #[test]
    fn spawn_points_are_checked_before_crew() {
        let armour = spawner(MechanizedSettings {
            vehicle_prefabs: vec![PrefabId::new("btr70")],
            ..MechanizedSettings::default()
        });
        assert_eq!(armour.missing_requirement(), Some("spawn_points"));
    }
}
