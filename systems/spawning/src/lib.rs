#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Ticket-budgeted spawn scheduling for Defence in Depth zones.
//!
//! A zone owns a list of [`Spawner`]s and drives them once per pass through
//! the [`SpawnStrategy`] contract. Every spawner shares the same base
//! behaviour (wave timer, optional ticket budget, zone-level scaling, AI cap,
//! post-spawn settling) and a strategy decides what a "group" is: an infantry
//! squad, a crewed vehicle, or a mortar team running a fire mission.

use std::time::Duration;

use defence_in_depth_core::{
    Battlefield, FactionKey, GroupId, PrefabId, Timestamp, Transform, WaypointId, ZoneBoundary,
    ZoneIndex, ZoneState,
};
use defence_in_depth_system_scheduler::Scheduler;
use rand::{seq::SliceRandom, Rng};
use serde::{Deserialize, Serialize};

mod infantry;
mod mechanized;
mod mortar;
mod wave_gate;

pub use infantry::{InfantrySettings, InfantrySpawner};
pub use mechanized::{MechanizedSettings, MechanizedSpawner};
pub use mortar::{MortarSettings, MortarSpawner};
pub use wave_gate::{WaveGateSettings, WaveGatedSpawner};

pub(crate) const TARGET: &str = "defence_in_depth::spawning";

/// Tunables shared by every spawn strategy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnerSettings {
    /// AI group prefabs picked at random for every spawned group.
    pub prefabs: Vec<PrefabId>,
    /// Seconds between two waves.
    pub wave_interval_secs: u64,
    /// Groups spawned per wave before zone-level scaling.
    pub spawn_count: u32,
    /// Zone-wide living AI cap; waves stop once it is reached.
    pub max_ai: usize,
    /// Extra spawn count per zone level (zone 2 with `1.0` doubles the count).
    pub zone_level_multiplier: f32,
    /// Limit total spawns with a ticket budget.
    pub use_tickets: bool,
    /// Budget granted when the spawner is prepared.
    pub max_tickets: u32,
    /// Randomly add or remove one group per wave.
    pub count_jitter: bool,
    /// Milliseconds between a spawn and the settling of its members.
    pub settle_delay_ms: u64,
}

impl Default for SpawnerSettings {
    fn default() -> Self {
        Self {
            prefabs: Vec::new(),
            wave_interval_secs: 90,
            spawn_count: 5,
            max_ai: 50,
            zone_level_multiplier: 1.0,
            use_tickets: false,
            max_tickets: 0,
            count_jitter: false,
            settle_delay_ms: 500,
        }
    }
}

impl SpawnerSettings {
    /// Configured time between waves.
    #[must_use]
    pub fn wave_interval(&self) -> Duration {
        Duration::from_secs(self.wave_interval_secs)
    }

    /// Configured delay before spawned members are settled.
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Strategy-specific tunables, tagged by `kind` in configuration files.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StrategySettings {
    /// Regular infantry squads.
    Infantry(InfantrySettings),
    /// Crewed vehicles.
    Mechanized(MechanizedSettings),
    /// Ticket-gated squads bound to a range of waves.
    WaveGated(WaveGateSettings),
    /// A single mortar team with Monte-Carlo fire missions.
    Mortar(MortarSettings),
}

/// Level entity placed under a spawner.
#[derive(Clone, Debug, PartialEq)]
pub enum SpawnerChild {
    /// Location groups spawn at.
    SpawnPoint(Transform),
    /// Movement order handed to spawned groups.
    Waypoint(WaypointId),
    /// Anything else; ignored with a debug log.
    Other(String),
}

/// Static description a spawner is built from.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnerDefinition {
    /// Name used in logs.
    pub name: String,
    /// Shared tunables.
    pub settings: SpawnerSettings,
    /// Strategy and its tunables.
    pub strategy: StrategySettings,
    /// Spawn points, waypoints and other children.
    pub children: Vec<SpawnerChild>,
}

/// Per-pass view of the owning zone handed to every spawner.
///
/// `active_ai` starts as the zone-wide count of living owned AI and grows as
/// spawners in the same pass add members, so the cap holds across spawners.
#[derive(Clone, Copy, Debug)]
pub struct ZoneContext<'a> {
    /// Ordinal of the owning zone.
    pub index: ZoneIndex,
    /// State of the owning zone for this pass.
    pub state: ZoneState,
    /// Current wave when the zone runs in wave mode.
    pub wave: Option<u32>,
    /// Session time of the pass.
    pub now: Timestamp,
    /// Living AI owned by the zone's spawners.
    pub active_ai: usize,
    /// Zone polygon, absent when the layout did not provide one.
    pub boundary: Option<&'a ZoneBoundary>,
    /// Faction defending the zone.
    pub defender: &'a FactionKey,
}

/// Contract every spawner fulfils towards its zone.
pub trait SpawnStrategy {
    /// Binds the spawner to its zone and discovers its children.
    fn prepare(&mut self, zone: ZoneIndex);

    /// Restarts the wave timer so the next wave lands one interval after `now`.
    fn arm(&mut self, now: Timestamp);

    /// Advances the spawner by one zone pass.
    fn process<B, R>(&mut self, context: &mut ZoneContext<'_>, battlefield: &mut B, rng: &mut R)
    where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized;

    /// Deletes everything the spawner owns and cancels pending settle timers.
    fn cleanup<B: Battlefield + ?Sized>(&mut self, battlefield: &mut B);

    /// Number of groups the next wave should contain.
    fn spawn_count_for_wave<R: Rng + ?Sized>(&self, context: &ZoneContext<'_>, rng: &mut R)
        -> u32;

    /// Spawns one group and returns how many members it brought.
    fn spawn_single_group<B, R>(
        &mut self,
        context: &ZoneContext<'_>,
        battlefield: &mut B,
        rng: &mut R,
    ) -> Option<usize>
    where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized;

    /// Reports whether the spawner takes part in the provided wave.
    fn is_active(&self, wave: Option<u32>) -> bool;

    /// Reports whether a ticket budget limits the spawner.
    fn uses_tickets(&self) -> bool;

    /// Tickets left in the budget.
    fn remaining_tickets(&self) -> u32;

    /// Replaces the budget, used by wave zones at wave start.
    fn set_remaining_tickets(&mut self, tickets: u32);

    /// Living members across the groups the spawner owns.
    fn active_ai_count<B: Battlefield + ?Sized>(&self, battlefield: &B) -> usize;
}

/// Closed set of spawn strategies a zone may host.
#[derive(Debug)]
pub enum Spawner {
    /// Regular infantry squads.
    Infantry(InfantrySpawner),
    /// Crewed vehicles.
    Mechanized(MechanizedSpawner),
    /// Ticket-gated squads bound to a range of waves.
    WaveGated(WaveGatedSpawner),
    /// A single mortar team.
    Mortar(MortarSpawner),
}

impl Spawner {
    /// Builds the spawner described by `definition`.
    #[must_use]
    pub fn from_definition(definition: SpawnerDefinition) -> Self {
        let SpawnerDefinition {
            name,
            settings,
            strategy,
            children,
        } = definition;
        match strategy {
            StrategySettings::Infantry(extra) => Self::Infantry(InfantrySpawner::new(
                SpawnerCore::new(name, settings, children),
                extra,
            )),
            StrategySettings::Mechanized(extra) => Self::Mechanized(MechanizedSpawner::new(
                SpawnerCore::new(name, settings, children),
                extra,
            )),
            StrategySettings::WaveGated(extra) => Self::WaveGated(WaveGatedSpawner::new(
                SpawnerCore::new(name, settings, children),
                extra,
            )),
            StrategySettings::Mortar(extra) => {
                Self::Mortar(MortarSpawner::new(SpawnerCore::new(name, settings, children), extra))
            }
        }
    }

    /// Name used in logs.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core().name
    }

    /// Short label of the strategy.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Infantry(_) => "infantry",
            Self::Mechanized(_) => "mechanized",
            Self::WaveGated(_) => "wave_gated",
            Self::Mortar(_) => "mortar",
        }
    }

    /// Shared tunables the spawner was built with.
    #[must_use]
    pub fn settings(&self) -> &SpawnerSettings {
        &self.core().settings
    }

    /// Number of spawn points discovered by `prepare`.
    #[must_use]
    pub fn spawn_point_count(&self) -> usize {
        self.core().spawn_points.len()
    }

    /// Interval the spawner was prepared with, before any wave scaling.
    #[must_use]
    pub fn base_interval(&self) -> Duration {
        self.core().base_interval
    }

    /// Interval currently separating waves.
    #[must_use]
    pub fn wave_interval(&self) -> Duration {
        self.core().wave_interval
    }

    /// Overrides the interval separating waves.
    pub fn set_wave_interval(&mut self, interval: Duration) {
        self.core_mut().wave_interval = interval;
    }

    /// Groups per wave before zone-level scaling.
    #[must_use]
    pub fn spawn_count(&self) -> u32 {
        self.core().spawn_count
    }

    /// Overrides the groups per wave before zone-level scaling.
    pub fn set_spawn_count(&mut self, count: u32) {
        self.core_mut().spawn_count = count;
    }

    /// Moment the next wave becomes due; `now` when it is already due.
    #[must_use]
    pub fn next_spawn_at(&self, now: Timestamp) -> Timestamp {
        self.core()
            .last_spawn
            .map_or(now, |last| last.saturating_add(self.core().wave_interval))
    }

    /// Groups currently owned by the spawner.
    #[must_use]
    pub fn groups(&self) -> &[GroupId] {
        &self.core().groups
    }

    /// Puts the spawner on a ticket budget; mortar teams stay unbudgeted.
    pub fn enable_tickets(&mut self) {
        if let Self::Mortar(_) = self {
            return;
        }
        self.core_mut().settings.use_tickets = true;
    }

    /// Mortar strategy view, when this spawner is one.
    #[must_use]
    pub fn as_mortar(&self) -> Option<&MortarSpawner> {
        match self {
            Self::Mortar(mortar) => Some(mortar),
            _ => None,
        }
    }

    fn core(&self) -> &SpawnerCore {
        match self {
            Self::Infantry(spawner) => &spawner.core,
            Self::Mechanized(spawner) => &spawner.core,
            Self::WaveGated(spawner) => &spawner.core,
            Self::Mortar(spawner) => &spawner.core,
        }
    }

    fn core_mut(&mut self) -> &mut SpawnerCore {
        match self {
            Self::Infantry(spawner) => &mut spawner.core,
            Self::Mechanized(spawner) => &mut spawner.core,
            Self::WaveGated(spawner) => &mut spawner.core,
            Self::Mortar(spawner) => &mut spawner.core,
        }
    }

    fn missing_requirement(&self) -> Option<&'static str> {
        match self {
            Self::Infantry(spawner) => spawner.core.missing_requirement(),
            Self::WaveGated(spawner) => spawner.core.missing_requirement(),
            Self::Mechanized(spawner) => spawner.missing_requirement(),
            Self::Mortar(spawner) => spawner.missing_requirement(),
        }
    }

    fn spawn_wave<B, R>(&mut self, context: &mut ZoneContext<'_>, battlefield: &mut B, rng: &mut R)
    where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized,
    {
        if let Some(missing) = self.missing_requirement() {
            tracing::warn!(
                target: TARGET,
                spawner = %self.name(),
                zone = %context.index,
                missing,
                "spawning.wave_skipped"
            );
            return;
        }

        if let Self::Mechanized(spawner) = self {
            if !spawner.threshold_reached(context.active_ai) {
                tracing::debug!(
                    target: TARGET,
                    spawner = %spawner.core.name,
                    active_ai = context.active_ai,
                    threshold = spawner.settings.min_ai_threshold,
                    "spawning.awaiting_threshold"
                );
                return;
            }
        }

        let max_ai = self.core().settings.max_ai;
        let count = self.spawn_count_for_wave(context, rng);
        tracing::debug!(
            target: TARGET,
            spawner = %self.name(),
            zone = %context.index,
            count,
            active_ai = context.active_ai,
            "spawning.wave"
        );

        for _ in 0..count {
            if context.active_ai >= max_ai {
                tracing::debug!(
                    target: TARGET,
                    spawner = %self.name(),
                    active_ai = context.active_ai,
                    max_ai,
                    "spawning.cap_reached"
                );
                break;
            }
            if self.core().exhausted() {
                break;
            }
            if let Some(members) = self.spawn_single_group(context, battlefield, rng) {
                context.active_ai = context.active_ai.saturating_add(members);
            }
        }
    }
}

impl SpawnStrategy for Spawner {
    fn prepare(&mut self, zone: ZoneIndex) {
        self.core_mut().prepare(zone);
        match self {
            Self::Mechanized(spawner) => spawner.prepare(),
            Self::Mortar(spawner) => spawner.prepare(),
            Self::Infantry(_) | Self::WaveGated(_) => {}
        }
        tracing::debug!(
            target: TARGET,
            spawner = %self.name(),
            kind = self.kind(),
            zone = %zone,
            spawn_points = self.core().spawn_points.len(),
            waypoints = self.core().waypoints.len(),
            interval_secs = self.core().wave_interval.as_secs(),
            "spawning.prepared"
        );
    }

    fn arm(&mut self, now: Timestamp) {
        self.core_mut().last_spawn = Some(now);
        if let Self::Infantry(spawner) = self {
            spawner.reset_jitter();
        }
    }

    fn process<B, R>(&mut self, context: &mut ZoneContext<'_>, battlefield: &mut B, rng: &mut R)
    where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized,
    {
        if !context.state.is_spawning() || self.core().zone.is_none() {
            return;
        }
        self.core_mut().settle_due(battlefield);

        if let Self::Mortar(spawner) = self {
            spawner.process(context, battlefield, rng);
            return;
        }

        if self.core().exhausted() {
            return;
        }

        let interval = match self {
            Self::Infantry(spawner) => spawner.jittered_interval(rng),
            _ => self.core().wave_interval,
        };
        if !self.core().wave_due(context.now, interval) {
            return;
        }

        self.arm(context.now);
        self.spawn_wave(context, battlefield, rng);
    }

    fn cleanup<B: Battlefield + ?Sized>(&mut self, battlefield: &mut B) {
        match self {
            Self::Mechanized(spawner) => spawner.remove_vehicles(battlefield),
            Self::Mortar(spawner) => spawner.remove_mortar(battlefield),
            Self::Infantry(_) | Self::WaveGated(_) => {}
        }
        self.core_mut().cleanup(battlefield);
    }

    fn spawn_count_for_wave<R: Rng + ?Sized>(
        &self,
        context: &ZoneContext<'_>,
        rng: &mut R,
    ) -> u32 {
        match self {
            Self::Infantry(spawner) => spawner.core.jittered_count(context.index, rng),
            Self::WaveGated(spawner) => {
                if spawner.in_range(context.wave) {
                    spawner.core.jittered_count(context.index, rng)
                } else {
                    0
                }
            }
            Self::Mechanized(spawner) => spawner.spawn_count(context.index, rng),
            Self::Mortar(_) => 1,
        }
    }

    fn spawn_single_group<B, R>(
        &mut self,
        context: &ZoneContext<'_>,
        battlefield: &mut B,
        rng: &mut R,
    ) -> Option<usize>
    where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized,
    {
        match self {
            Self::Infantry(spawner) => spawner.spawn_single_group(context.now, battlefield, rng),
            Self::WaveGated(spawner) => {
                spawner
                    .core
                    .spawn_random_group(context.now, battlefield, rng)
            }
            Self::Mechanized(spawner) => spawner.spawn_single_group(context.now, battlefield, rng),
            Self::Mortar(spawner) => spawner.spawn_single_group(context, battlefield, rng),
        }
    }

    fn is_active(&self, wave: Option<u32>) -> bool {
        match self {
            Self::WaveGated(spawner) => spawner.in_range(wave),
            Self::Infantry(_) | Self::Mechanized(_) | Self::Mortar(_) => true,
        }
    }

    fn uses_tickets(&self) -> bool {
        self.core().settings.use_tickets
    }

    fn remaining_tickets(&self) -> u32 {
        self.core().remaining_tickets
    }

    fn set_remaining_tickets(&mut self, tickets: u32) {
        self.core_mut().remaining_tickets = tickets;
        tracing::debug!(
            target: TARGET,
            spawner = %self.name(),
            tickets,
            "spawning.tickets_set"
        );
    }

    fn active_ai_count<B: Battlefield + ?Sized>(&self, battlefield: &B) -> usize {
        self.core()
            .groups
            .iter()
            .map(|group| battlefield.group_members(*group).len())
            .sum()
    }
}

/// State shared by every strategy.
#[derive(Debug)]
pub(crate) struct SpawnerCore {
    pub(crate) name: String,
    pub(crate) settings: SpawnerSettings,
    children: Vec<SpawnerChild>,
    pub(crate) zone: Option<ZoneIndex>,
    pub(crate) spawn_points: Vec<Transform>,
    pub(crate) waypoints: Vec<WaypointId>,
    pub(crate) base_interval: Duration,
    pub(crate) wave_interval: Duration,
    pub(crate) spawn_count: u32,
    pub(crate) remaining_tickets: u32,
    pub(crate) last_spawn: Option<Timestamp>,
    pub(crate) groups: Vec<GroupId>,
    settle: Scheduler<GroupId>,
}

impl SpawnerCore {
    pub(crate) fn new(
        name: String,
        settings: SpawnerSettings,
        children: Vec<SpawnerChild>,
    ) -> Self {
        let wave_interval = settings.wave_interval();
        let spawn_count = settings.spawn_count;
        Self {
            name,
            settings,
            children,
            zone: None,
            spawn_points: Vec::new(),
            waypoints: Vec::new(),
            base_interval: wave_interval,
            wave_interval,
            spawn_count,
            remaining_tickets: 0,
            last_spawn: None,
            groups: Vec::new(),
            settle: Scheduler::new(),
        }
    }

    fn prepare(&mut self, zone: ZoneIndex) {
        self.zone = Some(zone);
        self.spawn_points.clear();
        self.waypoints.clear();
        for child in &self.children {
            match child {
                SpawnerChild::SpawnPoint(transform) => self.spawn_points.push(*transform),
                SpawnerChild::Waypoint(waypoint) => self.waypoints.push(*waypoint),
                SpawnerChild::Other(label) => tracing::debug!(
                    target: TARGET,
                    spawner = %self.name,
                    child = %label,
                    "spawning.child_ignored"
                ),
            }
        }

        if self.spawn_points.is_empty() {
            tracing::warn!(target: TARGET, spawner = %self.name, "spawning.no_spawn_points");
        }
        if self.waypoints.is_empty() {
            tracing::warn!(target: TARGET, spawner = %self.name, "spawning.no_waypoints");
        }

        self.base_interval = self.settings.wave_interval();
        self.wave_interval = self.base_interval;
        self.spawn_count = self.settings.spawn_count;
        if self.settings.use_tickets {
            self.remaining_tickets = self.settings.max_tickets;
        }
        self.last_spawn = None;
    }

    pub(crate) fn missing_requirement(&self) -> Option<&'static str> {
        if self.settings.prefabs.is_empty() {
            Some("prefabs")
        } else if self.spawn_points.is_empty() {
            Some("spawn_points")
        } else if self.waypoints.is_empty() {
            Some("waypoints")
        } else {
            None
        }
    }

    pub(crate) fn exhausted(&self) -> bool {
        self.settings.use_tickets && self.remaining_tickets == 0
    }

    fn wave_due(&self, now: Timestamp, interval: Duration) -> bool {
        self.last_spawn
            .map_or(true, |last| now.saturating_duration_since(last) >= interval)
    }

    fn settle_due<B: Battlefield + ?Sized>(&mut self, battlefield: &mut B) {
        let now = battlefield.now();
        while let Some((_, group)) = self.settle.pop_due(now) {
            let members = battlefield.group_members(group);
            for member in &members {
                battlefield.disable_unconsciousness(*member);
            }
            if self.settings.use_tickets {
                let debit = u32::try_from(members.len()).unwrap_or(u32::MAX);
                self.remaining_tickets = self.remaining_tickets.saturating_sub(debit);
                tracing::debug!(
                    target: TARGET,
                    spawner = %self.name,
                    group = %group,
                    debit,
                    remaining = self.remaining_tickets,
                    "spawning.tickets_consumed"
                );
            }
        }
    }

    pub(crate) fn scaled_count(&self, zone: ZoneIndex) -> u32 {
        let level = zone.get().saturating_sub(1) as f32;
        let multiplier = (1.0 + level * self.settings.zone_level_multiplier).max(0.0);
        (self.spawn_count as f32 * multiplier).ceil() as u32
    }

    pub(crate) fn jittered_count<R: Rng + ?Sized>(&self, zone: ZoneIndex, rng: &mut R) -> u32 {
        let count = self.scaled_count(zone);
        if !self.settings.count_jitter {
            return count;
        }
        let offset: i64 = rng.gen_range(-1..=1);
        u32::try_from((i64::from(count) + offset).max(1)).unwrap_or(1)
    }

    /// Takes ownership of a freshly spawned group and schedules its settling.
    pub(crate) fn adopt<B: Battlefield + ?Sized>(
        &mut self,
        group: GroupId,
        now: Timestamp,
        battlefield: &B,
    ) -> usize {
        let due = now.saturating_add(self.settings.settle_delay());
        let _ = self.settle.schedule(due, group);
        self.groups.push(group);
        battlefield.group_members(group).len()
    }

    pub(crate) fn spawn_group_at<B: Battlefield + ?Sized>(
        &mut self,
        prefab: &PrefabId,
        spawn_point: Transform,
        waypoint: WaypointId,
        now: Timestamp,
        battlefield: &mut B,
    ) -> Option<usize> {
        match battlefield.spawn_group(prefab, spawn_point) {
            Ok(group) => {
                battlefield.assign_waypoint(group, waypoint);
                let members = self.adopt(group, now, battlefield);
                tracing::debug!(
                    target: TARGET,
                    spawner = %self.name,
                    prefab = %prefab,
                    group = %group,
                    members,
                    "spawning.group_spawned"
                );
                Some(members)
            }
            Err(error) => {
                tracing::error!(
                    target: TARGET,
                    spawner = %self.name,
                    prefab = %prefab,
                    error = %error,
                    "spawning.group_failed"
                );
                None
            }
        }
    }

    pub(crate) fn spawn_random_group<B, R>(
        &mut self,
        now: Timestamp,
        battlefield: &mut B,
        rng: &mut R,
    ) -> Option<usize>
    where
        B: Battlefield + ?Sized,
        R: Rng + ?Sized,
    {
        let prefab = self.settings.prefabs.choose(rng)?.clone();
        let spawn_point = *self.spawn_points.choose(rng)?;
        let waypoint = *self.waypoints.choose(rng)?;
        self.spawn_group_at(&prefab, spawn_point, waypoint, now, battlefield)
    }

    pub(crate) fn release_group<B: Battlefield + ?Sized>(
        &mut self,
        group: GroupId,
        battlefield: &mut B,
    ) {
        self.groups.retain(|owned| *owned != group);
        battlefield.delete_group(group);
    }

    fn cleanup<B: Battlefield + ?Sized>(&mut self, battlefield: &mut B) {
        self.settle.clear();
        for group in self.groups.drain(..) {
            battlefield.delete_group(group);
        }
    }
}
