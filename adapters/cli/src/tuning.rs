//! Optional TOML tuning file layered under the command-line flags.

use std::{fs, path::Path, path::PathBuf};

use defence_in_depth_core::{CrewConfig, PrefabId};
use defence_in_depth_system_fire_mission::TargetingSettings;
use defence_in_depth_system_sequencer::SequencerSettings;
use defence_in_depth_system_spawning::{
    InfantrySettings, MechanizedSettings, MortarSettings, SpawnerSettings, StrategySettings,
};
use defence_in_depth_system_zone::{WaveSettings, ZoneSettings};
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while loading a tuning file.
#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    /// The file could not be read.
    #[error("failed to read tuning file {path}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid tuning TOML.
    #[error("failed to parse tuning file {path}")]
    Parse {
        /// File that failed.
        path: PathBuf,
        /// Underlying parse failure.
        #[source]
        source: toml::de::Error,
    },
    /// The campaign would have nothing to play.
    #[error("a campaign needs at least one zone")]
    NoZones,
}

/// Spawner placed in every zone of the skirmish.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub(crate) struct SpawnerTuning {
    /// Name used in logs.
    pub(crate) name: String,
    /// Shared tunables.
    #[serde(default)]
    pub(crate) settings: SpawnerSettings,
    /// Strategy and its tunables.
    pub(crate) strategy: StrategySettings,
}

/// Every tunable of a headless skirmish.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct Tuning {
    pub(crate) zone: ZoneSettings,
    pub(crate) waves: WaveSettings,
    pub(crate) sequencer: SequencerSettings,
    pub(crate) spawners: Vec<SpawnerTuning>,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            zone: ZoneSettings {
                prepare_secs: 30,
                defence_secs: 180,
                ..ZoneSettings::default()
            },
            waves: WaveSettings::default(),
            sequencer: SequencerSettings::default(),
            spawners: default_spawners(),
        }
    }
}

impl Tuning {
    /// Reads a tuning file; fields it omits keep their defaults.
    pub(crate) fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse(text: &str) -> Result<Self, toml::de::Error> {
        let mut tuning: Self = toml::from_str(text)?;
        if tuning.spawners.is_empty() {
            tuning.spawners = default_spawners();
        }
        Ok(tuning)
    }
}

/// Drops mortar teams from wave play.
///
/// A mortar is replaced whenever it is lost, so a living crew would keep
/// every wave open.
pub(crate) fn without_mortars(spawners: &mut Vec<SpawnerTuning>) {
    spawners.retain(|spawner| !matches!(spawner.strategy, StrategySettings::Mortar(_)));
}

pub(crate) const RIFLE_SQUAD: &str = "rifle_squad";
pub(crate) const BTR: &str = "btr70";
pub(crate) const MORTAR: &str = "mortar_2b14";

fn default_spawners() -> Vec<SpawnerTuning> {
    vec![
        SpawnerTuning {
            name: "infantry".to_owned(),
            settings: SpawnerSettings {
                prefabs: vec![PrefabId::new(RIFLE_SQUAD)],
                wave_interval_secs: 45,
                spawn_count: 2,
                max_ai: 40,
                zone_level_multiplier: 0.5,
                ..SpawnerSettings::default()
            },
            strategy: StrategySettings::Infantry(InfantrySettings::default()),
        },
        SpawnerTuning {
            name: "armour".to_owned(),
            settings: SpawnerSettings {
                wave_interval_secs: 60,
                max_ai: 40,
                ..SpawnerSettings::default()
            },
            strategy: StrategySettings::Mechanized(MechanizedSettings {
                vehicle_prefabs: vec![PrefabId::new(BTR)],
                crew: Some(CrewConfig::default()),
                ..MechanizedSettings::default()
            }),
        },
        SpawnerTuning {
            name: "mortar".to_owned(),
            settings: SpawnerSettings::default(),
            strategy: StrategySettings::Mortar(MortarSettings {
                mortar_prefab: Some(PrefabId::new(MORTAR)),
                crew: Some(CrewConfig {
                    spawn_driver: false,
                    ..CrewConfig::default()
                }),
                targeting: TargetingSettings::default(),
            }),
        },
    ]
}
