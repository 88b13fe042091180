#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Defence in Depth engine.
//!
//! This crate defines the vocabulary that connects the authoritative
//! battlefield, the orchestration systems, and adapters. Adapters submit
//! [`Command`] values to mutate the battlefield, the battlefield broadcasts
//! [`Event`] values, and the zone systems observe time through those events
//! while reaching into the battlefield exclusively through the
//! [`Battlefield`] trait.

use std::{fmt, time::Duration};

pub use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod geometry;

pub use geometry::{ground, Bounds2, ZoneBoundary};

/// Canonical banner emitted when a session boots.
pub const WELCOME_BANNER: &str = "Defence in Depth: hold the line.";

/// Point on the session clock, measured from session start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(Duration);

impl Timestamp {
    /// The instant the session started.
    pub const ZERO: Self = Self(Duration::ZERO);

    /// Creates a timestamp from an offset since session start.
    #[must_use]
    pub const fn from_duration(offset: Duration) -> Self {
        Self(offset)
    }

    /// Creates a timestamp from whole seconds since session start.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    /// Creates a timestamp from milliseconds since session start.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(Duration::from_millis(millis))
    }

    /// Offset since session start.
    #[must_use]
    pub const fn since_start(&self) -> Duration {
        self.0
    }

    /// Returns the timestamp `offset` later, saturating at the clock limit.
    #[must_use]
    pub fn saturating_add(self, offset: Duration) -> Self {
        Self(self.0.saturating_add(offset))
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    #[must_use]
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.0.as_secs_f64())
    }
}

/// Ordinal of a zone within the campaign. The first zone is `1`.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ZoneIndex(u32);

impl ZoneIndex {
    /// Ordinal of the zone played first.
    pub const FIRST: Self = Self(1);

    /// Creates a zone ordinal.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric ordinal.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Ordinal of the zone played after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for ZoneIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle state of a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneState {
    /// The zone is not in play.
    Inactive,
    /// Countdown before combat opens.
    Prepare,
    /// Combat is ongoing and the defence timer runs.
    Active,
    /// Combat is ongoing but the timer is paused because attackers outnumber defenders.
    Frozen,
    /// A wave was cleared and the zone waits before preparing the next one.
    WaveComplete,
    /// Defenders held the zone.
    FinishedHeld,
    /// Every defender was eliminated.
    FinishedFailed,
}

impl ZoneState {
    /// Reports whether the state is terminal.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::FinishedHeld | Self::FinishedFailed)
    }

    /// Reports whether spawners attached to the zone may act.
    #[must_use]
    pub const fn is_spawning(self) -> bool {
        matches!(self, Self::Active | Self::Frozen)
    }
}

impl fmt::Display for ZoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Inactive => "INACTIVE",
            Self::Prepare => "PREPARE",
            Self::Active => "ACTIVE",
            Self::Frozen => "FROZEN",
            Self::WaveComplete => "WAVE_COMPLETE",
            Self::FinishedHeld => "FINISHED_HELD",
            Self::FinishedFailed => "FINISHED_FAILED",
        };
        f.write_str(label)
    }
}

/// Key identifying a faction in the faction registry.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactionKey(String);

impl FactionKey {
    /// Creates a faction key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Default defending faction.
    #[must_use]
    pub fn defenders() -> Self {
        Self::new("US")
    }

    /// Default attacking faction.
    #[must_use]
    pub fn attackers() -> Self {
        Self::new("USSR")
    }

    /// Borrows the key as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FactionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a spawnable prefab.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrefabId(String);

impl PrefabId {
    /// Creates a prefab identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrows the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PrefabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u32);

        impl $name {
            /// Creates a new identifier with the provided numeric value.
            #[must_use]
            pub const fn new(value: u32) -> Self {
                Self(value)
            }

            /// Retrieves the numeric representation of the identifier.
            #[must_use]
            pub const fn get(&self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "#{}", self.0)
            }
        }
    };
}

numeric_id!(
    /// Unique identifier of a spawned entity (character, vehicle, supply cache).
    EntityId
);
numeric_id!(
    /// Unique identifier of an AI group.
    GroupId
);
numeric_id!(
    /// Unique identifier of a movement order or fire-control waypoint.
    WaypointId
);
numeric_id!(
    /// Unique identifier of a connected player.
    PlayerId
);

/// World placement used when spawning prefabs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// World position.
    pub position: Vec3,
    /// Heading around the vertical axis in radians.
    pub yaw: f32,
}

impl Transform {
    /// Creates a transform at the provided position with zero heading.
    #[must_use]
    pub const fn at(position: Vec3) -> Self {
        Self { position, yaw: 0.0 }
    }
}

/// Read-only view of a player as reported by the faction registry.
#[derive(Clone, Debug, PartialEq)]
pub struct PlayerSnapshot {
    /// Identifier of the player.
    pub id: PlayerId,
    /// Faction the player belongs to.
    pub faction: FactionKey,
    /// Position of the controlled character.
    pub position: Vec3,
    /// Whether the controlled character is alive.
    pub alive: bool,
}

/// Read-only view of an AI agent as reported by the agent registry.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentSnapshot {
    /// Entity controlled by the agent.
    pub entity: EntityId,
    /// Group the agent belongs to, if any.
    pub group: Option<GroupId>,
    /// Faction of the controlled character.
    pub faction: FactionKey,
    /// Position of the controlled character.
    pub position: Vec3,
    /// Whether the controlled character is alive.
    pub alive: bool,
}

/// Crew layout used when seating AI into a vehicle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrewConfig {
    /// Character prefab for the driver; the vehicle default is used when absent.
    pub driver_prefab: Option<PrefabId>,
    /// Character prefab for the gunner; the vehicle default is used when absent.
    pub gunner_prefab: Option<PrefabId>,
    /// Seat a driver.
    pub spawn_driver: bool,
    /// Seat a gunner.
    pub spawn_gunner: bool,
    /// Keep the gunner on the turret even when threatened.
    pub no_turret_dismount: bool,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            driver_prefab: None,
            gunner_prefab: None,
            spawn_driver: true,
            spawn_gunner: true,
            no_turret_dismount: true,
        }
    }
}

/// Reasons a spawn request may fail inside the battlefield.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SpawnError {
    /// No prefab with the provided identifier is registered.
    #[error("unknown prefab `{0}`")]
    UnknownPrefab(PrefabId),
    /// The prefab exists but does not produce the requested kind of entity.
    #[error("prefab `{0}` does not produce the requested entity kind")]
    WrongKind(PrefabId),
    /// The vehicle offers no seats matching the crew layout.
    #[error("vehicle {0} has no compartments for the requested crew")]
    NoCompartments(EntityId),
    /// The referenced entity does not exist.
    #[error("entity {0} does not exist")]
    MissingEntity(EntityId),
}

/// Reasons a supply credit may be rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SupplyError {
    /// The entity is not a supply container.
    #[error("entity {0} is not a supply container")]
    NotAContainer(EntityId),
    /// The container would exceed its capacity.
    #[error("supply container {container} cannot hold {requested} more supplies")]
    CapacityExceeded {
        /// Container that rejected the credit.
        container: EntityId,
        /// Amount that was requested.
        requested: u32,
    },
}

/// Collaborator surface through which the orchestration core observes and
/// mutates the game world.
///
/// Every method is infallible from the caller's perspective except the spawn
/// primitives, which report transient misses through [`SpawnError`].
pub trait Battlefield {
    /// Current session time.
    fn now(&self) -> Timestamp;

    /// Players registered in the provided faction.
    fn players_in_faction(&self, faction: &FactionKey) -> Vec<PlayerSnapshot>;

    /// Every AI agent currently known to the world.
    fn agents(&self) -> Vec<AgentSnapshot>;

    /// Living members of the group; empty when the group no longer exists.
    fn group_members(&self, group: GroupId) -> Vec<EntityId>;

    /// Instantiates an AI group prefab at the provided placement.
    fn spawn_group(&mut self, prefab: &PrefabId, at: Transform) -> Result<GroupId, SpawnError>;

    /// Instantiates a vehicle prefab at the provided placement.
    fn spawn_vehicle(&mut self, prefab: &PrefabId, at: Transform) -> Result<EntityId, SpawnError>;

    /// Seats AI into the vehicle and optionally hands the new group a movement order.
    fn crew_vehicle(
        &mut self,
        vehicle: EntityId,
        crew: &CrewConfig,
        waypoint: Option<WaypointId>,
    ) -> Result<GroupId, SpawnError>;

    /// Position of an entity, `None` once it is gone or destroyed.
    fn entity_position(&self, entity: EntityId) -> Option<Vec3>;

    /// Appends a movement order to the group.
    fn assign_waypoint(&mut self, group: GroupId, waypoint: WaypointId);

    /// Detaches a movement order from the group without destroying it.
    fn remove_waypoint(&mut self, group: GroupId, waypoint: WaypointId);

    /// Movement orders currently attached to the group.
    fn group_waypoints(&self, group: GroupId) -> Vec<WaypointId>;

    /// Creates a fire-control waypoint ordering `shot_count` rounds at `position`.
    fn create_fire_waypoint(
        &mut self,
        position: Vec3,
        shot_count: u32,
    ) -> Result<WaypointId, SpawnError>;

    /// Destroys a dynamically created waypoint.
    fn delete_waypoint(&mut self, waypoint: WaypointId);

    /// Deletes every member of the group and the group itself.
    fn delete_group(&mut self, group: GroupId);

    /// Deletes a single entity.
    fn delete_entity(&mut self, entity: EntityId);

    /// Prevents the character from entering involuntary unconsciousness.
    fn disable_unconsciousness(&mut self, entity: EntityId);

    /// Terrain height at the provided ground coordinates.
    fn surface_height(&self, x: f32, z: f32) -> f32;

    /// Adds supplies to a supply container.
    fn credit_supplies(&mut self, container: EntityId, amount: u32) -> Result<(), SupplyError>;
}

/// Commands that express the runtime mutations adapters may request from the
/// authoritative battlefield.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Advances the session clock by the provided delta time.
    Tick {
        /// Duration of simulated time that elapsed since the previous tick.
        dt: Duration,
    },
    /// Registers a player in a faction with a living character.
    JoinPlayer {
        /// Identifier of the joining player.
        player: PlayerId,
        /// Faction the player joins.
        faction: FactionKey,
        /// Initial character position.
        position: Vec3,
    },
    /// Teleports a player's character.
    MovePlayer {
        /// Player to move.
        player: PlayerId,
        /// Destination position.
        position: Vec3,
    },
    /// Marks a player's character as destroyed.
    KillPlayer {
        /// Player whose character dies.
        player: PlayerId,
    },
    /// Restores a destroyed player character at a position.
    RespawnPlayer {
        /// Player to respawn.
        player: PlayerId,
        /// Respawn position.
        position: Vec3,
    },
    /// Marks a single AI character as destroyed.
    KillAgent {
        /// Character to destroy.
        entity: EntityId,
    },
    /// Marks every member of a group as destroyed.
    KillGroup {
        /// Group to destroy.
        group: GroupId,
    },
    /// Teleports every living member of a group.
    MoveGroup {
        /// Group to move.
        group: GroupId,
        /// Destination position.
        position: Vec3,
    },
}

/// Events broadcast by the battlefield after processing commands.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Indicates that the session clock advanced.
    TimeAdvanced {
        /// Duration of simulated time that elapsed in the tick.
        dt: Duration,
    },
    /// Confirms that a player joined a faction.
    PlayerJoined {
        /// Identifier of the player.
        player: PlayerId,
        /// Faction joined.
        faction: FactionKey,
    },
    /// Confirms that a player's character moved.
    PlayerMoved {
        /// Identifier of the player.
        player: PlayerId,
        /// New position.
        position: Vec3,
    },
    /// Confirms that a player's character died.
    PlayerKilled {
        /// Identifier of the player.
        player: PlayerId,
    },
    /// Confirms that a player's character was restored.
    PlayerRespawned {
        /// Identifier of the player.
        player: PlayerId,
    },
    /// Confirms that an AI character died.
    AgentKilled {
        /// Character that died.
        entity: EntityId,
    },
    /// Confirms that a group was teleported.
    GroupMoved {
        /// Group that moved.
        group: GroupId,
        /// Destination position.
        position: Vec3,
    },
}

/// Sums the simulated time carried by `TimeAdvanced` events.
#[must_use]
pub fn elapsed_in(events: &[Event]) -> Duration {
    events
        .iter()
        .filter_map(|event| match event {
            Event::TimeAdvanced { dt } => Some(*dt),
            _ => None,
        })
        .fold(Duration::ZERO, Duration::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_arithmetic_saturates() {
        let start = Timestamp::from_secs(10);
        let later = start.saturating_add(Duration::from_millis(1_500));
        assert_eq!(later, Timestamp::from_millis(11_500));
        assert_eq!(later.saturating_duration_since(start), Duration::from_millis(1_500));
        assert_eq!(start.saturating_duration_since(later), Duration::ZERO);
    }

    #[test]
    fn only_terminal_states_are_finished() {
        assert!(ZoneState::FinishedHeld.is_finished());
        assert!(ZoneState::FinishedFailed.is_finished());
        assert!(!ZoneState::Frozen.is_finished());
        assert!(ZoneState::Frozen.is_spawning());
        assert!(!ZoneState::Prepare.is_spawning());
        assert!(!ZoneState::WaveComplete.is_spawning());
    }

    #[test]
    fn elapsed_ignores_unrelated_events() {
        let events = [
            Event::TimeAdvanced {
                dt: Duration::from_millis(400),
            },
            Event::PlayerKilled {
                player: PlayerId::new(1),
            },
            Event::TimeAdvanced {
                dt: Duration::from_millis(600),
            },
        ];
        assert_eq!(elapsed_in(&events), Duration::from_secs(1));
    }

    #[test]
    fn crew_config_fills_missing_fields_with_defaults() {
        let crew: CrewConfig = toml::from_str("spawn_gunner = false").expect("parse");
        assert!(crew.spawn_driver);
        assert!(!crew.spawn_gunner);
        assert!(crew.no_turret_dismount);
        assert_eq!(crew.driver_prefab, None);
    }

    #[test]
    fn faction_keys_deserialize_transparently() {
        #[derive(Deserialize)]
        struct Holder {
            faction: FactionKey,
        }
        let holder: Holder = toml::from_str("faction = \"US\"").expect("parse");
        assert_eq!(holder.faction, FactionKey::defenders());
    }
}
