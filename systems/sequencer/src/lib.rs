#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Zone sequencer for Defence in Depth.
//!
//! The sequencer owns every registered [`Zone`], keeps exactly one of them
//! in play, and walks the campaign forward as zones finish. Time reaches it
//! through [`Event::TimeAdvanced`]; the active zone is processed once per
//! check interval. Observers learn about progress through four channels.

use std::{collections::BTreeMap, time::Duration};

use defence_in_depth_core::{
    elapsed_in, Battlefield, Event, Timestamp, Transform, ZoneIndex, ZoneState,
};
use defence_in_depth_system_zone::Zone;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod channel;

pub use channel::{EventChannel, SubscriptionId};

const TARGET: &str = "defence_in_depth::sequencer";

/// Tunables of the sequencer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerSettings {
    /// Milliseconds of simulated time between two zone passes.
    pub check_interval_ms: u64,
}

impl Default for SequencerSettings {
    fn default() -> Self {
        Self {
            check_interval_ms: 1_000,
        }
    }
}

impl SequencerSettings {
    /// Simulated time between two zone passes, never shorter than a millisecond.
    #[must_use]
    pub fn check_interval(&self) -> Duration {
        Duration::from_millis(self.check_interval_ms.max(1))
    }
}

/// Reasons a zone cannot be registered.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// Ordinal 0 is reserved.
    #[error("zone `{0}` uses the reserved ordinal 0")]
    ZeroIndex(String),
    /// Another zone already claimed the ordinal.
    #[error("zone `{name}` collides with an existing zone at ordinal {index}")]
    DuplicateIndex {
        /// Name of the rejected zone.
        name: String,
        /// Ordinal both zones claim.
        index: ZoneIndex,
    },
}

/// Invariant violations reported while running the campaign.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SequencerError {
    /// Zone 1 was never registered.
    #[error("no zone registered at ordinal 1")]
    MissingFirstZone,
    /// The ordinal marked active has no zone behind it.
    #[error("active ordinal {0} has no registered zone")]
    MissingActiveZone(ZoneIndex),
}

/// A zone entered a new phase players should be told about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZoneChanged {
    /// Zone in play.
    pub zone: ZoneIndex,
    /// Phase it entered.
    pub state: ZoneState,
}

/// The zone in play changed state within its phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZoneUpdated {
    /// Zone in play.
    pub zone: ZoneIndex,
    /// State before the pass.
    pub from: ZoneState,
    /// State after the pass.
    pub to: ZoneState,
}

/// Defenders held a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ZoneHeld {
    /// Zone that was held.
    pub zone: ZoneIndex,
}

/// Every registered zone has been played.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AllZonesCompleted {
    /// Last zone played.
    pub last: ZoneIndex,
}

/// Supervises the campaign of zones.
#[derive(Debug, Default)]
pub struct ZoneSequencer {
    settings: SequencerSettings,
    zones: BTreeMap<ZoneIndex, Zone>,
    current: Option<ZoneIndex>,
    active: bool,
    accumulator: Duration,
    zone_changed: EventChannel<ZoneChanged>,
    zone_updated: EventChannel<ZoneUpdated>,
    zone_held: EventChannel<ZoneHeld>,
    all_completed: EventChannel<AllZonesCompleted>,
}

impl ZoneSequencer {
    /// Creates an idle sequencer without zones.
    #[must_use]
    pub fn new(settings: SequencerSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Adds a zone under its ordinal.
    pub fn register_zone(&mut self, zone: Zone) -> Result<(), RegistrationError> {
        let index = zone.index();
        let error = if index.get() == 0 {
            RegistrationError::ZeroIndex(zone.name().to_owned())
        } else if self.zones.contains_key(&index) {
            RegistrationError::DuplicateIndex {
                name: zone.name().to_owned(),
                index,
            }
        } else {
            tracing::info!(
                target: TARGET,
                zone = %zone.name(),
                index = %index,
                "sequencer.zone_registered"
            );
            let _ = self.zones.insert(index, zone);
            return Ok(());
        };
        tracing::error!(target: TARGET, error = %error, "sequencer.registration_rejected");
        Err(error)
    }

    /// Starts the campaign by opening the preparation of zone 1.
    pub fn start_zone_system<B: Battlefield + ?Sized>(
        &mut self,
        battlefield: &B,
    ) -> Result<(), SequencerError> {
        let first = ZoneIndex::FIRST;
        let mut expected = first;
        for index in self.zones.keys() {
            if *index != expected {
                tracing::warn!(
                    target: TARGET,
                    expected = %expected,
                    found = %index,
                    "sequencer.ordinal_gap"
                );
            }
            expected = index.next();
        }

        let Some(zone) = self.zones.get_mut(&first) else {
            let error = SequencerError::MissingFirstZone;
            tracing::error!(target: TARGET, error = %error, "sequencer.start_failed");
            return Err(error);
        };
        let _ = zone.activate(battlefield.now());
        let state = zone.state();
        self.current = Some(first);
        self.active = true;
        self.accumulator = Duration::ZERO;
        tracing::info!(
            target: TARGET,
            zones = self.zones.len(),
            "sequencer.started"
        );
        self.zone_changed.publish(&ZoneChanged { zone: first, state });
        Ok(())
    }

    /// Feeds battlefield events; runs one zone pass once a check interval has elapsed.
    pub fn handle<B, R>(&mut self, events: &[Event], battlefield: &mut B, rng: &mut R)
    where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized,
    {
        if !self.active {
            self.accumulator = Duration::ZERO;
            return;
        }
        let interval = self.settings.check_interval();
        self.accumulator = self.accumulator.saturating_add(elapsed_in(events));
        if self.accumulator >= interval {
            self.accumulator = Duration::ZERO;
            let _ = self.process_zone(battlefield, rng);
        }
    }

    /// Runs one pass of the zone in play and publishes the resulting transition.
    pub fn process_zone<B, R>(
        &mut self,
        battlefield: &mut B,
        rng: &mut R,
    ) -> Result<(), SequencerError>
    where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized,
    {
        if !self.active {
            return Ok(());
        }
        let Some(index) = self.current else {
            return Ok(());
        };
        let Some(zone) = self.zones.get_mut(&index) else {
            let error = SequencerError::MissingActiveZone(index);
            tracing::error!(target: TARGET, error = %error, "sequencer.process_failed");
            return Err(error);
        };
        let before = zone.state();
        if before.is_finished() {
            return Ok(());
        }
        let after = zone.process(battlefield, rng);
        if before == after {
            return Ok(());
        }

        tracing::info!(
            target: TARGET,
            zone = %index,
            from = %before,
            to = %after,
            "sequencer.transition"
        );
        match after {
            ZoneState::Active if before == ZoneState::Prepare => {
                self.zone_changed.publish(&ZoneChanged {
                    zone: index,
                    state: after,
                });
            }
            ZoneState::FinishedHeld => {
                self.active = false;
                self.zone_held.publish(&ZoneHeld { zone: index });
            }
            ZoneState::FinishedFailed => {
                zone.deactivate(battlefield);
                self.advance(index, battlefield);
            }
            _ => self.zone_updated.publish(&ZoneUpdated {
                zone: index,
                from: before,
                to: after,
            }),
        }
        Ok(())
    }

    fn advance<B: Battlefield + ?Sized>(&mut self, from: ZoneIndex, battlefield: &mut B) {
        let next = self
            .zones
            .range(from.next()..)
            .next()
            .map(|(index, _)| *index);
        let Some((index, zone)) =
            next.and_then(|index| self.zones.get_mut(&index).map(|zone| (index, zone)))
        else {
            self.active = false;
            tracing::info!(target: TARGET, last = %from, "sequencer.all_zones_completed");
            self.all_completed.publish(&AllZonesCompleted { last: from });
            return;
        };

        let _ = zone.activate(battlefield.now());
        let state = zone.state();
        self.current = Some(index);
        tracing::info!(
            target: TARGET,
            zone = %index,
            name = %zone.name(),
            "sequencer.zone_advanced"
        );
        self.zone_changed.publish(&ZoneChanged { zone: index, state });
    }

    /// Stops ticking and takes the zone in play out of the battlefield.
    pub fn stop<B: Battlefield + ?Sized>(&mut self, battlefield: &mut B) {
        self.active = false;
        self.accumulator = Duration::ZERO;
        if let Some(zone) = self.current.and_then(|index| self.zones.get_mut(&index)) {
            zone.deactivate(battlefield);
        }
        tracing::info!(target: TARGET, "sequencer.stopped");
    }

    /// Stops the campaign and forgets which zone was in play.
    pub fn reset<B: Battlefield + ?Sized>(&mut self, battlefield: &mut B) {
        self.stop(battlefield);
        self.current = None;
    }

    /// Cuts the preparation of the zone in play short.
    pub fn force_end_prepare(&mut self, now: Timestamp) -> bool {
        self.current_zone_mut()
            .map_or(false, |zone| zone.force_end_prepare(now))
    }

    /// Channel raised when a zone opens its preparation or its combat.
    pub fn on_zone_changed(&mut self) -> &mut EventChannel<ZoneChanged> {
        &mut self.zone_changed
    }

    /// Channel raised on freezes, thaws and wave transitions.
    pub fn on_zone_updated(&mut self) -> &mut EventChannel<ZoneUpdated> {
        &mut self.zone_updated
    }

    /// Channel raised when a zone is held.
    pub fn on_zone_held(&mut self) -> &mut EventChannel<ZoneHeld> {
        &mut self.zone_held
    }

    /// Channel raised once every zone has been played.
    pub fn on_all_zones_completed(&mut self) -> &mut EventChannel<AllZonesCompleted> {
        &mut self.all_completed
    }

    fn current_zone_mut(&mut self) -> Option<&mut Zone> {
        let index = self.current?;
        self.zones.get_mut(&index)
    }

    /// Zone in play.
    #[must_use]
    pub fn current_zone(&self) -> Option<&Zone> {
        self.zones.get(&self.current?)
    }

    /// Ordinal of the zone in play.
    #[must_use]
    pub fn current_index(&self) -> Option<ZoneIndex> {
        self.current
    }

    /// Registered zone at `index`.
    #[must_use]
    pub fn zone(&self, index: ZoneIndex) -> Option<&Zone> {
        self.zones.get(&index)
    }

    /// Number of registered zones.
    #[must_use]
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }

    /// Highest registered ordinal.
    #[must_use]
    pub fn max_zone_index(&self) -> Option<ZoneIndex> {
        self.zones.keys().next_back().copied()
    }

    /// Reports whether the campaign is ticking.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Reports whether the zone in play is still preparing.
    #[must_use]
    pub fn is_warmup(&self) -> bool {
        self.current_state() == Some(ZoneState::Prepare)
    }

    /// Reports whether the zone clock runs, i.e. the zone is not frozen.
    #[must_use]
    pub fn is_timer_running(&self) -> bool {
        self.current_state() != Some(ZoneState::Frozen)
    }

    /// State of the zone in play.
    #[must_use]
    pub fn current_state(&self) -> Option<ZoneState> {
        self.current_zone().map(Zone::state)
    }

    /// Living defenders seen by the zone in play.
    #[must_use]
    pub fn defender_count(&self) -> usize {
        self.current_zone().map_or(0, Zone::defender_count)
    }

    /// Living attackers inside the zone in play.
    #[must_use]
    pub fn attacker_count(&self) -> usize {
        self.current_zone().map_or(0, Zone::attacker_count)
    }

    /// End of the current phase of the zone in play, seen at `now`.
    #[must_use]
    pub fn timeout(&self, now: Timestamp) -> Option<Timestamp> {
        self.current_zone().map(|zone| zone.end_time(now))
    }

    /// Reinsertion point of the zone in play.
    #[must_use]
    pub fn reinsertion_point(&self) -> Option<Transform> {
        self.current_zone().and_then(Zone::reinsertion_point)
    }
}
