#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Zone lifecycle state machine for Defence in Depth.
//!
//! A [`Zone`] is one stage of the defence. Timed zones count down a
//! preparation window, then hold out for a defence window that freezes while
//! attackers outnumber defenders inside the boundary. Wave zones replace the
//! defence window with a sequence of ticket-budgeted waves. Either way the
//! zone owns its spawners and drives them once per pass while combat runs.

use std::time::Duration;

use defence_in_depth_core::{
    Battlefield, EntityId, FactionKey, Timestamp, Transform, ZoneBoundary, ZoneIndex, ZoneState,
};
use defence_in_depth_system_scheduler::{Scheduler, TimerToken};
use defence_in_depth_system_spawning::{SpawnStrategy, Spawner, SpawnerDefinition, ZoneContext};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod wave;

pub use wave::WaveSettings;

const TARGET: &str = "defence_in_depth::zone";

/// Furthest a wave zone looks ahead when reporting its next spawn.
const WAVE_END_HORIZON: Duration = Duration::from_secs(1000);

/// Tunables shared by every zone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneSettings {
    /// Name used in logs and queries.
    pub name: String,
    /// Seconds of preparation before combat opens.
    pub prepare_secs: u64,
    /// Seconds the defenders must hold a timed zone.
    pub defence_secs: u64,
    /// Faction holding the zone.
    pub defender: FactionKey,
    /// Faction assaulting the zone.
    pub attacker: FactionKey,
}

impl Default for ZoneSettings {
    fn default() -> Self {
        Self {
            name: "DidZone".to_owned(),
            prepare_secs: 300,
            defence_secs: 600,
            defender: FactionKey::defenders(),
            attacker: FactionKey::attackers(),
        }
    }
}

impl ZoneSettings {
    /// Length of the preparation window.
    #[must_use]
    pub fn prepare_duration(&self) -> Duration {
        Duration::from_secs(self.prepare_secs)
    }

    /// Length of the defence window.
    #[must_use]
    pub fn defence_duration(&self) -> Duration {
        Duration::from_secs(self.defence_secs)
    }
}

/// How a zone decides that it has been held.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ZoneMode {
    /// Survive the defence window.
    #[default]
    Timed,
    /// Clear a fixed number of waves.
    Waves(WaveSettings),
}

/// Level entity placed under a zone.
#[derive(Clone, Debug, PartialEq)]
pub enum Attachment {
    /// Closed polyline bounding the zone.
    Boundary(ZoneBoundary),
    /// Where players re-enter while the zone is in play.
    ReinsertionPoint(Transform),
    /// A spawner owned by the zone.
    Spawner(SpawnerDefinition),
    /// Supply container credited when a wave is cleared.
    SupplyCache(EntityId),
    /// Anything else; logged and ignored.
    Unknown(String),
}

/// Static placement data a zone is built from.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ZoneLayout {
    /// Attachments in placement order; spawners run in this order.
    pub attachments: Vec<Attachment>,
}

impl ZoneLayout {
    /// Creates an empty layout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attachment.
    #[must_use]
    pub fn with(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

/// Configuration defect found while setting up a zone.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ZoneDefect {
    /// No boundary was attached.
    #[error("zone has no boundary")]
    MissingBoundary,
    /// The boundary has fewer than three vertices.
    #[error("zone boundary has fewer than three vertices")]
    DegenerateBoundary,
    /// No player reinsertion point was attached.
    #[error("zone has no player reinsertion point")]
    MissingReinsertionPoint,
    /// No spawner was attached.
    #[error("zone has no spawners")]
    NoSpawners,
    /// A spawner has nowhere to spawn.
    #[error("spawner `{0}` has no spawn points")]
    SpawnerWithoutSpawnPoints(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ZoneTimer {
    PrepareElapsed,
    DefenceElapsed,
    TransitionElapsed,
}

/// One stage of the defence.
#[derive(Debug)]
pub struct Zone {
    index: ZoneIndex,
    settings: ZoneSettings,
    mode: ZoneMode,
    boundary: Option<ZoneBoundary>,
    reinsertion_point: Option<Transform>,
    supply_cache: Option<EntityId>,
    spawners: Vec<Spawner>,
    defects: Vec<ZoneDefect>,
    state: ZoneState,
    started_at: Timestamp,
    end_time: Timestamp,
    remaining: Duration,
    timers: Scheduler<ZoneTimer>,
    deadline: Option<TimerToken>,
    wave: u32,
    defender_count: usize,
    attacker_count: usize,
}

impl Zone {
    /// Builds a zone from its layout and prepares every attached spawner.
    #[must_use]
    pub fn prepare(
        index: ZoneIndex,
        settings: ZoneSettings,
        mode: ZoneMode,
        layout: ZoneLayout,
    ) -> Self {
        let mut zone = Self {
            index,
            settings,
            mode,
            boundary: None,
            reinsertion_point: None,
            supply_cache: None,
            spawners: Vec::new(),
            defects: Vec::new(),
            state: ZoneState::Inactive,
            started_at: Timestamp::ZERO,
            end_time: Timestamp::ZERO,
            remaining: Duration::ZERO,
            timers: Scheduler::new(),
            deadline: None,
            wave: 0,
            defender_count: 0,
            attacker_count: 0,
        };

        let mut degenerate = false;
        for attachment in layout.attachments {
            match attachment {
                Attachment::Boundary(boundary) => {
                    if zone.boundary.is_some() {
                        tracing::warn!(
                            target: TARGET,
                            zone = %zone.settings.name,
                            "zone.extra_boundary_ignored"
                        );
                    } else if boundary.is_degenerate() {
                        degenerate = true;
                    } else {
                        zone.boundary = Some(boundary);
                    }
                }
                Attachment::ReinsertionPoint(point) => zone.reinsertion_point = Some(point),
                Attachment::Spawner(definition) => {
                    let mut spawner = Spawner::from_definition(definition);
                    if zone.is_wave_mode() {
                        spawner.enable_tickets();
                    }
                    spawner.prepare(index);
                    if spawner.spawn_point_count() == 0 {
                        let name = spawner.name().to_owned();
                        zone.record(ZoneDefect::SpawnerWithoutSpawnPoints(name));
                    }
                    zone.spawners.push(spawner);
                }
                Attachment::SupplyCache(cache) => zone.supply_cache = Some(cache),
                Attachment::Unknown(label) => tracing::debug!(
                    target: TARGET,
                    zone = %zone.settings.name,
                    attachment = %label,
                    "zone.attachment_ignored"
                ),
            }
        }

        if zone.boundary.is_none() {
            zone.record(if degenerate {
                ZoneDefect::DegenerateBoundary
            } else {
                ZoneDefect::MissingBoundary
            });
        }
        if zone.reinsertion_point.is_none() {
            zone.record(ZoneDefect::MissingReinsertionPoint);
        }
        if zone.spawners.is_empty() {
            zone.record(ZoneDefect::NoSpawners);
        }

        tracing::info!(
            target: TARGET,
            zone = %zone.settings.name,
            index = %index,
            spawners = zone.spawners.len(),
            waves = ?zone.total_waves(),
            "zone.prepared"
        );
        zone
    }

    fn record(&mut self, defect: ZoneDefect) {
        tracing::error!(
            target: TARGET,
            zone = %self.settings.name,
            index = %self.index,
            defect = %defect,
            "zone.defect"
        );
        self.defects.push(defect);
    }

    /// Opens the preparation window. Only an inactive zone can be activated.
    pub fn activate(&mut self, now: Timestamp) -> bool {
        if self.state != ZoneState::Inactive {
            tracing::warn!(
                target: TARGET,
                zone = %self.settings.name,
                state = %self.state,
                "zone.activate_ignored"
            );
            return false;
        }

        self.defender_count = 0;
        self.attacker_count = 0;
        if matches!(self.mode, ZoneMode::Waves(_)) {
            self.start_wave(1, now);
        } else {
            self.enter_prepare(now);
            tracing::info!(
                target: TARGET,
                zone = %self.settings.name,
                index = %self.index,
                ends_at = %self.end_time,
                "zone.activated"
            );
        }
        true
    }

    /// Takes the zone out of play and removes everything its spawners own.
    ///
    /// Calling it again is harmless.
    pub fn deactivate<B: Battlefield + ?Sized>(&mut self, battlefield: &mut B) {
        self.timers.clear();
        self.deadline = None;
        for spawner in &mut self.spawners {
            spawner.cleanup(battlefield);
        }
        if self.state != ZoneState::Inactive {
            tracing::info!(
                target: TARGET,
                zone = %self.settings.name,
                from = %self.state,
                "zone.deactivated"
            );
        }
        self.state = ZoneState::Inactive;
    }

    /// Cuts the preparation window short so the next pass opens combat.
    pub fn force_end_prepare(&mut self, now: Timestamp) -> bool {
        if self.state != ZoneState::Prepare {
            return false;
        }
        self.set_deadline(now, ZoneTimer::PrepareElapsed);
        tracing::info!(target: TARGET, zone = %self.settings.name, "zone.prepare_skipped");
        true
    }

    /// Advances the zone by one pass and reports its state afterwards.
    pub fn process<B, R>(&mut self, battlefield: &mut B, rng: &mut R) -> ZoneState
    where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized,
    {
        let now = battlefield.now();
        match self.state {
            ZoneState::Inactive | ZoneState::FinishedHeld | ZoneState::FinishedFailed => {}
            ZoneState::Prepare => {
                if self.take_due(now) == Some(ZoneTimer::PrepareElapsed) {
                    self.enter_combat(now);
                }
            }
            ZoneState::Active | ZoneState::Frozen => {
                if self.is_wave_mode() {
                    self.process_wave_combat(now, battlefield, rng);
                } else {
                    self.process_timed_combat(now, battlefield, rng);
                }
            }
            ZoneState::WaveComplete => {
                if self.take_due(now) == Some(ZoneTimer::TransitionElapsed) {
                    self.finish_transition(now);
                }
            }
        }
        self.state
    }

    fn process_timed_combat<B, R>(&mut self, now: Timestamp, battlefield: &mut B, rng: &mut R)
    where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized,
    {
        self.refresh_counts(battlefield);
        if self.defender_count == 0 {
            self.finish(ZoneState::FinishedFailed, now);
            return;
        }
        if self.take_due(now) == Some(ZoneTimer::DefenceElapsed) {
            self.finish(ZoneState::FinishedHeld, now);
            return;
        }

        if self.attacker_count > self.defender_count {
            let _ = self.freeze(now);
        } else {
            let _ = self.unfreeze(now);
        }

        self.process_spawners(now, battlefield, rng);
    }

    fn process_wave_combat<B, R>(&mut self, now: Timestamp, battlefield: &mut B, rng: &mut R)
    where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized,
    {
        self.refresh_counts(battlefield);
        if self.defender_count == 0 {
            self.finish(ZoneState::FinishedFailed, now);
            return;
        }

        self.process_spawners(now, battlefield, rng);

        if self.remaining_tickets() == 0 && self.active_ai_count(battlefield) == 0 {
            self.complete_wave(now, battlefield);
        }
    }

    fn process_spawners<B, R>(&mut self, now: Timestamp, battlefield: &mut B, rng: &mut R)
    where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized,
    {
        let Some(boundary) = self.boundary.as_ref() else {
            return;
        };
        let wave = self.current_wave();
        let active_ai = self.active_ai_count(&*battlefield);
        let mut context = ZoneContext {
            index: self.index,
            state: self.state,
            wave,
            now,
            active_ai,
            boundary: Some(boundary),
            defender: &self.settings.defender,
        };
        for spawner in self.spawners.iter_mut().filter(|spawner| spawner.is_active(wave)) {
            spawner.process(&mut context, battlefield, rng);
        }
    }

    fn refresh_counts<B: Battlefield + ?Sized>(&mut self, battlefield: &B) {
        self.defender_count = battlefield
            .players_in_faction(&self.settings.defender)
            .iter()
            .filter(|player| player.alive)
            .count();
        self.attacker_count = self.boundary.as_ref().map_or(0, |boundary| {
            battlefield
                .agents()
                .iter()
                .filter(|agent| {
                    agent.alive
                        && agent.faction == self.settings.attacker
                        && boundary.contains_position(agent.position)
                })
                .count()
        });
        tracing::debug!(
            target: TARGET,
            zone = %self.settings.name,
            defenders = self.defender_count,
            attackers = self.attacker_count,
            "zone.counts"
        );
    }

    /// Pauses the defence window. A no-op unless a timed zone is active.
    pub fn freeze(&mut self, now: Timestamp) -> bool {
        if self.state != ZoneState::Active || self.is_wave_mode() {
            return false;
        }
        self.remaining = self.end_time.saturating_duration_since(now);
        self.cancel_deadline();
        self.state = ZoneState::Frozen;
        tracing::info!(
            target: TARGET,
            zone = %self.settings.name,
            remaining_secs = self.remaining.as_secs(),
            "zone.frozen"
        );
        true
    }

    /// Resumes the defence window. A no-op unless the zone is frozen.
    pub fn unfreeze(&mut self, now: Timestamp) -> bool {
        if self.state != ZoneState::Frozen {
            return false;
        }
        self.end_time = now.saturating_add(self.remaining);
        self.set_deadline(self.end_time, ZoneTimer::DefenceElapsed);
        self.state = ZoneState::Active;
        tracing::info!(
            target: TARGET,
            zone = %self.settings.name,
            ends_at = %self.end_time,
            "zone.unfrozen"
        );
        true
    }

    fn enter_prepare(&mut self, now: Timestamp) {
        self.state = ZoneState::Prepare;
        self.started_at = now;
        self.end_time = now.saturating_add(self.settings.prepare_duration());
        self.set_deadline(self.end_time, ZoneTimer::PrepareElapsed);
    }

    fn enter_combat(&mut self, now: Timestamp) {
        self.state = ZoneState::Active;
        self.started_at = now;
        if self.is_wave_mode() {
            self.end_time = now;
        } else {
            self.end_time = now.saturating_add(self.settings.defence_duration());
            self.set_deadline(self.end_time, ZoneTimer::DefenceElapsed);
        }
        for spawner in &mut self.spawners {
            spawner.arm(now);
        }
        tracing::info!(
            target: TARGET,
            zone = %self.settings.name,
            index = %self.index,
            wave = self.wave,
            tickets = self.remaining_tickets(),
            "zone.combat_started"
        );
    }

    fn start_wave(&mut self, wave: u32, now: Timestamp) {
        let ZoneMode::Waves(settings) = &self.mode else {
            return;
        };
        self.wave = wave;
        let tickets = settings.tickets_for(wave);
        let active = Some(wave);
        for spawner in self.spawners.iter_mut().filter(|spawner| spawner.is_active(active)) {
            if spawner.uses_tickets() {
                spawner.set_remaining_tickets(tickets);
            }
            let interval = settings.interval_for(spawner.base_interval(), wave);
            let count = settings.spawn_count_for(spawner.settings().spawn_count, wave);
            spawner.set_wave_interval(interval);
            spawner.set_spawn_count(count);
            tracing::debug!(
                target: TARGET,
                zone = %self.settings.name,
                spawner = %spawner.name(),
                wave,
                interval_secs = interval.as_secs(),
                count,
                "zone.wave_scaled"
            );
        }
        let total = settings.total_waves;
        self.enter_prepare(now);
        tracing::info!(
            target: TARGET,
            zone = %self.settings.name,
            wave,
            total,
            tickets,
            "zone.wave_preparing"
        );
    }

    fn complete_wave<B: Battlefield + ?Sized>(&mut self, now: Timestamp, battlefield: &mut B) {
        let ZoneMode::Waves(settings) = &self.mode else {
            return;
        };
        let transition = settings.transition();
        let reward = settings.reward();

        self.state = ZoneState::WaveComplete;
        self.started_at = now;
        self.end_time = now.saturating_add(transition);
        self.set_deadline(self.end_time, ZoneTimer::TransitionElapsed);
        tracing::info!(
            target: TARGET,
            zone = %self.settings.name,
            wave = self.wave,
            "zone.wave_complete"
        );

        if let (Some(cache), Some(amount)) = (self.supply_cache, reward) {
            if let Err(error) = battlefield.credit_supplies(cache, amount) {
                tracing::warn!(
                    target: TARGET,
                    zone = %self.settings.name,
                    cache = %cache,
                    error = %error,
                    "zone.supply_reward_failed"
                );
            }
        }
    }

    fn finish_transition(&mut self, now: Timestamp) {
        if self.wave >= self.total_waves().unwrap_or(0) {
            self.finish(ZoneState::FinishedHeld, now);
        } else {
            self.start_wave(self.wave.saturating_add(1), now);
        }
    }

    fn finish(&mut self, outcome: ZoneState, now: Timestamp) {
        self.cancel_deadline();
        self.state = outcome;
        self.end_time = now;
        tracing::info!(
            target: TARGET,
            zone = %self.settings.name,
            index = %self.index,
            outcome = %outcome,
            "zone.finished"
        );
    }

    fn set_deadline(&mut self, due: Timestamp, timer: ZoneTimer) {
        self.cancel_deadline();
        self.deadline = Some(self.timers.schedule(due, timer));
    }

    fn cancel_deadline(&mut self) {
        if let Some(token) = self.deadline.take() {
            let _ = self.timers.cancel(token);
        }
    }

    fn take_due(&mut self, now: Timestamp) -> Option<ZoneTimer> {
        let (token, timer) = self.timers.pop_due(now)?;
        if self.deadline == Some(token) {
            self.deadline = None;
        }
        Some(timer)
    }

    fn is_wave_mode(&self) -> bool {
        matches!(self.mode, ZoneMode::Waves(_))
    }

    fn total_waves(&self) -> Option<u32> {
        match &self.mode {
            ZoneMode::Waves(settings) => Some(settings.total_waves),
            ZoneMode::Timed => None,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ZoneState {
        self.state
    }

    /// Ordinal of the zone.
    #[must_use]
    pub fn index(&self) -> ZoneIndex {
        self.index
    }

    /// Name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.settings.name
    }

    /// Tunables the zone was built with.
    #[must_use]
    pub fn settings(&self) -> &ZoneSettings {
        &self.settings
    }

    /// Moment the current phase started.
    #[must_use]
    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    /// Moment the current phase ends as seen at `now`.
    ///
    /// A frozen zone keeps pushing its end forward. An active wave reports
    /// its next spawn, looking at most a fixed horizon ahead.
    #[must_use]
    pub fn end_time(&self, now: Timestamp) -> Timestamp {
        match self.state {
            ZoneState::Frozen => now.saturating_add(self.remaining),
            ZoneState::Active if self.is_wave_mode() => {
                let wave = self.current_wave();
                self.spawners
                    .iter()
                    .filter(|spawner| spawner.is_active(wave))
                    .map(|spawner| spawner.next_spawn_at(now))
                    .fold(now.saturating_add(WAVE_END_HORIZON), Timestamp::min)
            }
            _ => self.end_time,
        }
    }

    /// Living defenders seen during the last pass.
    #[must_use]
    pub fn defender_count(&self) -> usize {
        self.defender_count
    }

    /// Living attackers inside the boundary seen during the last pass.
    #[must_use]
    pub fn attacker_count(&self) -> usize {
        self.attacker_count
    }

    /// Where players re-enter while the zone is in play.
    #[must_use]
    pub fn reinsertion_point(&self) -> Option<Transform> {
        self.reinsertion_point
    }

    /// Zone polygon, absent when the layout lacked a usable one.
    #[must_use]
    pub fn boundary(&self) -> Option<&ZoneBoundary> {
        self.boundary.as_ref()
    }

    /// Spawners in attachment order.
    #[must_use]
    pub fn spawners(&self) -> &[Spawner] {
        &self.spawners
    }

    /// Living AI owned by the zone's spawners.
    #[must_use]
    pub fn active_ai_count<B: Battlefield + ?Sized>(&self, battlefield: &B) -> usize {
        self.spawners
            .iter()
            .map(|spawner| spawner.active_ai_count(battlefield))
            .sum()
    }

    /// Tickets left across active ticket-budgeted spawners.
    #[must_use]
    pub fn remaining_tickets(&self) -> u32 {
        let wave = self.current_wave();
        self.spawners
            .iter()
            .filter(|spawner| spawner.is_active(wave) && spawner.uses_tickets())
            .fold(0u32, |total, spawner| total.saturating_add(spawner.remaining_tickets()))
    }

    /// Wave in progress, in wave mode once the zone was activated.
    #[must_use]
    pub fn current_wave(&self) -> Option<u32> {
        if self.is_wave_mode() && self.wave > 0 {
            Some(self.wave)
        } else {
            None
        }
    }

    /// Number shown to players: the wave in wave mode, the ordinal otherwise.
    #[must_use]
    pub fn display_number(&self) -> u32 {
        self.current_wave().unwrap_or_else(|| self.index.get())
    }

    /// Setup defects recorded by [`Zone::prepare`].
    #[must_use]
    pub fn defects(&self) -> &[ZoneDefect] {
        &self.defects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use defence_in_depth_core::Vec3;

    fn square() -> ZoneBoundary {
        ZoneBoundary::new(
            Vec3::ZERO,
            &[
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 0.0),
                Vec3::new(10.0, 0.0, 10.0),
                Vec3::new(0.0, 0.0, 10.0),
            ],
        )
    }

    fn timed(layout: ZoneLayout) -> Zone {
        Zone::prepare(
            ZoneIndex::FIRST,
            ZoneSettings {
                prepare_secs: 10,
                defence_secs: 20,
                ..ZoneSettings::default()
            },
            ZoneMode::Timed,
            layout,
        )
    }

    #[test]
    fn empty_layout_records_every_defect() {
        let zone = timed(ZoneLayout::new());
        assert_eq!(
            zone.defects(),
            &[
                ZoneDefect::MissingBoundary,
                ZoneDefect::MissingReinsertionPoint,
                ZoneDefect::NoSpawners
            ]
        );
    }

    #[test]
    fn degenerate_boundary_is_not_kept() {
        let flat = ZoneBoundary::new(Vec3::ZERO, &[Vec3::ZERO, Vec3::X]);
        let zone = timed(ZoneLayout::new().with(Attachment::Boundary(flat)));
        assert!(zone.boundary().is_none());
        assert_eq!(zone.defects()[0], ZoneDefect::DegenerateBoundary);
    }

    #[test]
    fn freeze_and_unfreeze_are_idempotent() {
        let mut zone = timed(ZoneLayout::new().with(Attachment::Boundary(square())));
        assert!(zone.activate(Timestamp::ZERO));
        zone.enter_combat(Timestamp::from_secs(10));

        assert!(!zone.unfreeze(Timestamp::from_secs(12)));
        assert!(zone.freeze(Timestamp::from_secs(15)));
        assert!(!zone.freeze(Timestamp::from_secs(18)));
        assert_eq!(zone.state(), ZoneState::Frozen);
        assert_eq!(zone.end_time(Timestamp::from_secs(18)), Timestamp::from_secs(33));

        assert!(zone.unfreeze(Timestamp::from_secs(20)));
        assert!(!zone.unfreeze(Timestamp::from_secs(21)));
        assert_eq!(zone.end_time(Timestamp::from_secs(21)), Timestamp::from_secs(35));
        assert_eq!(zone.timers.len(), 1);
    }

    #[test]
    fn frozen_zone_never_sees_the_defence_deadline() {
        let mut zone = timed(ZoneLayout::new().with(Attachment::Boundary(square())));
        assert!(zone.activate(Timestamp::ZERO));
        zone.enter_combat(Timestamp::from_secs(10));
        assert!(zone.freeze(Timestamp::from_secs(11)));
        assert_eq!(zone.take_due(Timestamp::from_secs(60)), None);
    }

    #[test]
    fn forcing_the_end_of_prepare_only_works_while_preparing() {
        let mut zone = timed(ZoneLayout::new());
        assert!(!zone.force_end_prepare(Timestamp::ZERO));
        assert!(zone.activate(Timestamp::ZERO));
        assert!(!zone.activate(Timestamp::ZERO));
        assert!(zone.force_end_prepare(Timestamp::from_secs(2)));
        assert_eq!(
            zone.take_due(Timestamp::from_secs(2)),
            Some(ZoneTimer::PrepareElapsed)
        );
    }

    #[test]
    fn wave_zones_do_not_freeze() {
        let mut zone = Zone::prepare(
            ZoneIndex::FIRST,
            ZoneSettings::default(),
            ZoneMode::Waves(WaveSettings::default()),
            ZoneLayout::new(),
        );
        assert!(zone.activate(Timestamp::ZERO));
        assert_eq!(zone.current_wave(), Some(1));
        assert_eq!(zone.display_number(), 1);
        zone.enter_combat(Timestamp::from_secs(300));
        assert!(!zone.freeze(Timestamp::from_secs(301)));
    }
}
