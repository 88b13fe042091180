#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that plays a headless Defence in Depth campaign.

mod skirmish;
mod tuning;

use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use clap::Parser;
use defence_in_depth_system_zone::{WaveSettings, ZoneMode};
use tracing_subscriber::EnvFilter;

use crate::{
    skirmish::SkirmishConfig,
    tuning::{ConfigError, Tuning},
};

/// Plays a seeded campaign of zones and prints how it ended.
#[derive(Debug, Parser)]
#[command(name = "defence-in-depth", version)]
struct Args {
    /// Seed for every random roll of the campaign.
    #[arg(long, default_value_t = 0x5eed)]
    seed: u64,
    /// Number of zones to fall back through.
    #[arg(long, default_value_t = 3)]
    zones: u32,
    /// Play every zone as this many waves instead of a timed defence.
    #[arg(long)]
    waves: Option<u32>,
    /// Seconds of preparation before each zone's combat.
    #[arg(long)]
    prepare_secs: Option<u64>,
    /// Seconds defenders must hold a timed zone.
    #[arg(long)]
    defence_secs: Option<u64>,
    /// Number of defending players.
    #[arg(long, default_value_t = 4)]
    defenders: u32,
    /// Simulated seconds after which the campaign is abandoned.
    #[arg(long, default_value_t = 1_800)]
    max_secs: u64,
    /// Log filter used when `RUST_LOG` is not set.
    #[arg(long, default_value = "info")]
    log: String,
    /// TOML file with zone, wave, sequencer and spawner tuning.
    #[arg(long)]
    tuning: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<SkirmishConfig, ConfigError> {
        if self.zones == 0 {
            return Err(ConfigError::NoZones);
        }
        let tuning = match &self.tuning {
            Some(path) => Tuning::load(path)?,
            None => Tuning::default(),
        };

        let mut zone = tuning.zone;
        if let Some(secs) = self.prepare_secs {
            zone.prepare_secs = secs;
        }
        if let Some(secs) = self.defence_secs {
            zone.defence_secs = secs;
        }
        let mut spawners = tuning.spawners;
        let mode = match self.waves {
            Some(total_waves) => {
                tuning::without_mortars(&mut spawners);
                ZoneMode::Waves(WaveSettings {
                    total_waves,
                    ..tuning.waves
                })
            }
            None => ZoneMode::Timed,
        };

        Ok(SkirmishConfig {
            seed: self.seed,
            zones: self.zones,
            mode,
            zone,
            sequencer: tuning.sequencer,
            spawners,
            defenders: self.defenders,
            max_duration: Duration::from_secs(self.max_secs),
        })
    }
}

fn init_logging(default: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Entry point for the Defence in Depth command-line interface.
fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log);

    let config = args.into_config()?;
    tracing::info!(
        seed = config.seed,
        zones = config.zones,
        defenders = config.defenders,
        "cli.campaign_starting"
    );
    let report = skirmish::run(&config)?;
    println!("{report}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_tuning_defaults() {
        let args = Args::parse_from([
            "defence-in-depth",
            "--waves",
            "3",
            "--prepare-secs",
            "12",
            "--zones",
            "2",
        ]);
        let config = args.into_config().expect("valid flags");
        assert_eq!(config.zones, 2);
        assert_eq!(config.zone.prepare_secs, 12);
        assert_eq!(config.zone.defence_secs, Tuning::default().zone.defence_secs);
        assert!(matches!(config.mode, ZoneMode::Waves(ref waves) if waves.total_waves == 3));
        assert_eq!(config.spawners.len(), 2);
    }

    #[test]
    fn zero_zones_is_rejected() {
        let args = Args::parse_from(["defence-in-depth", "--zones", "0"]);
        assert!(matches!(args.into_config(), Err(ConfigError::NoZones)));
    }
}
