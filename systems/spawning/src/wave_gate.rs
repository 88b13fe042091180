use serde::{Deserialize, Serialize};

use crate::SpawnerCore;

/// Range of waves a wave-gated spawner takes part in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveGateSettings {
    /// First wave the spawner joins; any wave when absent.
    pub min_wave: Option<u32>,
    /// Last wave the spawner joins; every later wave when absent.
    pub max_wave: Option<u32>,
}

impl WaveGateSettings {
    /// Reports whether `wave` lies within the configured range.
    #[must_use]
    pub fn contains(&self, wave: u32) -> bool {
        self.min_wave.map_or(true, |min| wave >= min)
            && self.max_wave.map_or(true, |max| wave <= max)
    }
}

/// Ticket-budgeted squads that only act during a range of waves.
///
/// Tickets are always enabled; the owning wave zone refills them at the
/// start of every wave.
#[derive(Debug)]
pub struct WaveGatedSpawner {
    pub(crate) core: SpawnerCore,
    settings: WaveGateSettings,
}

impl WaveGatedSpawner {
    pub(crate) fn new(mut core: SpawnerCore, settings: WaveGateSettings) -> Self {
        core.settings.use_tickets = true;
        Self { core, settings }
    }

    /// Range of waves the spawner takes part in.
    #[must_use]
    pub fn settings(&self) -> &WaveGateSettings {
        &self.settings
    }

    /// Outside wave mode there is no wave, and the spawner stays idle.
    pub(crate) fn in_range(&self, wave: Option<u32>) -> bool {
        wave.map_or(false, |wave| self.settings.contains(wave))
    }
}
