use defence_in_depth_core::{Battlefield, CrewConfig, EntityId, PrefabId};
use defence_in_depth_system_fire_mission::{FireMission, MonteCarloTargeting, TargetingSettings};
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

use crate::{SpawnerCore, ZoneContext, TARGET};

/// Tunables of the mortar strategy.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MortarSettings {
    /// Mortar prefab to spawn.
    pub mortar_prefab: Option<PrefabId>,
    /// Crew seated into the mortar.
    pub crew: Option<CrewConfig>,
    /// Monte-Carlo targeting tunables.
    pub targeting: TargetingSettings,
}

/// Keeps one crewed mortar in play and steers its fire missions.
#[derive(Debug)]
pub struct MortarSpawner {
    pub(crate) core: SpawnerCore,
    settings: MortarSettings,
    targeting: MonteCarloTargeting,
    mortar: Option<EntityId>,
    mission: Option<FireMission>,
    misconfiguration_reported: bool,
}

impl MortarSpawner {
    pub(crate) fn new(core: SpawnerCore, settings: MortarSettings) -> Self {
        let targeting = MonteCarloTargeting::new(settings.targeting.clone());
        Self {
            core,
            settings,
            targeting,
            mortar: None,
            mission: None,
            misconfiguration_reported: false,
        }
    }

    /// Mortar currently in play.
    #[must_use]
    pub fn mortar(&self) -> Option<EntityId> {
        self.mortar
    }

    /// Fire mission of the mortar currently in play.
    #[must_use]
    pub fn mission(&self) -> Option<&FireMission> {
        self.mission.as_ref()
    }

    pub(crate) fn prepare(&mut self) {
        self.misconfiguration_reported = false;
    }

    pub(crate) fn missing_requirement(&self) -> Option<&'static str> {
        if self.settings.mortar_prefab.is_none() {
            Some("mortar_prefab")
        } else if self.core.spawn_points.is_empty() {
            Some("spawn_points")
        } else if self.settings.crew.is_none() {
            Some("crew")
        } else {
            None
        }
    }

    pub(crate) fn process<B, R>(
        &mut self,
        context: &mut ZoneContext<'_>,
        battlefield: &mut B,
        rng: &mut R,
    ) where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized,
    {
        let standing = self
            .mortar
            .map_or(false, |mortar| battlefield.entity_position(mortar).is_some());

        if standing {
            let interval = self.targeting.settings().interval();
            let due = self
                .mission
                .as_ref()
                .map_or(false, |mission| mission.is_due(context.now, interval));
            if due {
                self.run_fire_mission(context, battlefield, rng);
            }
            return;
        }

        if let Some(lost) = self.mortar {
            tracing::info!(
                target: TARGET,
                spawner = %self.core.name,
                mortar = %lost,
                "spawning.mortar_lost"
            );
            self.remove_mortar(battlefield);
        }

        if let Some(members) = self.spawn_single_group(context, battlefield, rng) {
            context.active_ai = context.active_ai.saturating_add(members);
        }
    }

    pub(crate) fn spawn_single_group<B, R>(
        &mut self,
        context: &ZoneContext<'_>,
        battlefield: &mut B,
        rng: &mut R,
    ) -> Option<usize>
    where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized,
    {
        if let Some(missing) = self.missing_requirement() {
            if !self.misconfiguration_reported {
                tracing::warn!(
                    target: TARGET,
                    spawner = %self.core.name,
                    missing,
                    "spawning.mortar_unconfigured"
                );
                self.misconfiguration_reported = true;
            }
            return None;
        }

        let prefab = self.settings.mortar_prefab.as_ref()?;
        let crew = self.settings.crew.as_ref()?;
        let spawn_point = *self.core.spawn_points.choose(rng)?;

        let mortar = match battlefield.spawn_vehicle(prefab, spawn_point) {
            Ok(mortar) => mortar,
            Err(error) => {
                tracing::error!(
                    target: TARGET,
                    spawner = %self.core.name,
                    prefab = %prefab,
                    error = %error,
                    "spawning.mortar_failed"
                );
                return None;
            }
        };

        let group = match battlefield.crew_vehicle(mortar, crew, None) {
            Ok(group) => group,
            Err(error) => {
                tracing::error!(
                    target: TARGET,
                    spawner = %self.core.name,
                    mortar = %mortar,
                    error = %error,
                    "spawning.crew_failed"
                );
                battlefield.delete_entity(mortar);
                return None;
            }
        };

        let members = self.core.adopt(group, context.now, battlefield);
        self.mortar = Some(mortar);
        self.mission = Some(FireMission::new(mortar, group, spawn_point.position));
        tracing::info!(
            target: TARGET,
            spawner = %self.core.name,
            mortar = %mortar,
            crew = %group,
            "spawning.mortar_spawned"
        );

        self.run_fire_mission(context, battlefield, rng);
        Some(members)
    }

    fn run_fire_mission<B, R>(
        &mut self,
        context: &ZoneContext<'_>,
        battlefield: &mut B,
        rng: &mut R,
    ) where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized,
    {
        let (Some(mission), Some(boundary)) = (self.mission.as_mut(), context.boundary) else {
            return;
        };
        let _ = mission.retarget(
            &mut self.targeting,
            boundary,
            context.defender,
            battlefield,
            rng,
        );
    }

    pub(crate) fn remove_mortar<B: Battlefield + ?Sized>(&mut self, battlefield: &mut B) {
        if let Some(mut mission) = self.mission.take() {
            mission.teardown(battlefield);
            self.core.release_group(mission.crew(), battlefield);
        }
        if let Some(mortar) = self.mortar.take() {
            battlefield.delete_entity(mortar);
        }
    }
}
