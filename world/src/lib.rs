#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative in-memory battlefield for Defence in Depth.
//!
//! The world owns the session clock, players, AI characters, groups, vehicles,
//! waypoints and supply containers. Runtime mutations arrive as
//! [`Command`] values through [`apply`]; the orchestration systems reach in
//! through the [`Battlefield`] implementation. Level placement (prefab
//! registration, static waypoints, supply caches) happens through inherent
//! methods before the session starts.

use std::{
    collections::{BTreeMap, HashMap},
    time::Duration,
};

use defence_in_depth_core::{
    AgentSnapshot, Battlefield, Command, CrewConfig, EntityId, Event, FactionKey, GroupId,
    PlayerId, PlayerSnapshot, PrefabId, SpawnError, SupplyError, Timestamp, Transform, Vec3,
    WaypointId, WELCOME_BANNER,
};

/// Spacing between members of a freshly spawned group, in metres.
const MEMBER_SPACING: f32 = 1.5;

/// Blueprint the world instantiates when a prefab is spawned.
#[derive(Clone, Debug, PartialEq)]
pub enum Prefab {
    /// AI group of infantry characters.
    Group {
        /// Faction every member belongs to.
        faction: FactionKey,
        /// Number of characters in the group.
        members: u32,
    },
    /// Vehicle or static weapon with crew compartments.
    Vehicle {
        /// Faction of the crew seated into the vehicle.
        faction: FactionKey,
        /// Whether the vehicle has a pilot compartment.
        driver_seat: bool,
        /// Whether the vehicle has a turret compartment.
        gunner_seat: bool,
    },
}

/// Height model of the terrain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Terrain {
    /// Level ground at a fixed height.
    Flat(f32),
    /// Inclined plane `base + x * slope_x + z * slope_z`.
    Plane {
        /// Height at the world origin.
        base: f32,
        /// Rise per metre along `x`.
        slope_x: f32,
        /// Rise per metre along `z`.
        slope_z: f32,
    },
}

impl Terrain {
    /// Height of the terrain at the provided ground coordinates.
    #[must_use]
    pub fn height_at(&self, x: f32, z: f32) -> f32 {
        match *self {
            Self::Flat(height) => height,
            Self::Plane {
                base,
                slope_x,
                slope_z,
            } => base + x * slope_x + z * slope_z,
        }
    }
}

/// Represents the authoritative battlefield state.
#[derive(Debug)]
pub struct World {
    banner: &'static str,
    clock: Timestamp,
    terrain: Terrain,
    march_speed: f32,
    prefabs: HashMap<PrefabId, Prefab>,
    players: BTreeMap<PlayerId, Player>,
    entities: BTreeMap<EntityId, Entity>,
    groups: BTreeMap<GroupId, Group>,
    waypoints: BTreeMap<WaypointId, Waypoint>,
    next_entity: u32,
    next_group: u32,
    next_waypoint: u32,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// Creates an empty battlefield on flat ground with stationary AI.
    #[must_use]
    pub fn new() -> Self {
        Self {
            banner: WELCOME_BANNER,
            clock: Timestamp::ZERO,
            terrain: Terrain::Flat(0.0),
            march_speed: 0.0,
            prefabs: HashMap::new(),
            players: BTreeMap::new(),
            entities: BTreeMap::new(),
            groups: BTreeMap::new(),
            waypoints: BTreeMap::new(),
            next_entity: 1,
            next_group: 1,
            next_waypoint: 1,
        }
    }

    /// Replaces the terrain height model.
    #[must_use]
    pub fn with_terrain(mut self, terrain: Terrain) -> Self {
        self.terrain = terrain;
        self
    }

    /// Makes AI groups walk toward their first movement order at `speed` metres per second.
    #[must_use]
    pub fn with_march_speed(mut self, speed: f32) -> Self {
        self.march_speed = speed.max(0.0);
        self
    }

    /// Registers a prefab blueprint under the provided identifier.
    pub fn register_prefab(&mut self, id: PrefabId, prefab: Prefab) {
        let _ = self.prefabs.insert(id, prefab);
    }

    /// Places a static movement order, as level data would.
    pub fn place_waypoint(&mut self, position: Vec3) -> WaypointId {
        let id = self.allocate_waypoint();
        let _ = self.waypoints.insert(
            id,
            Waypoint {
                position,
                kind: WaypointKind::Move,
            },
        );
        id
    }

    /// Places a supply container holding `supplies` out of `capacity`.
    pub fn place_supply_cache(&mut self, position: Vec3, supplies: u32, capacity: u32) -> EntityId {
        let id = self.allocate_entity();
        let _ = self.entities.insert(
            id,
            Entity {
                position,
                alive: true,
                kind: EntityKind::SupplyCache { supplies, capacity },
            },
        );
        id
    }

    fn allocate_entity(&mut self) -> EntityId {
        let id = EntityId::new(self.next_entity);
        self.next_entity = self.next_entity.saturating_add(1);
        id
    }

    fn allocate_group(&mut self) -> GroupId {
        let id = GroupId::new(self.next_group);
        self.next_group = self.next_group.saturating_add(1);
        id
    }

    fn allocate_waypoint(&mut self) -> WaypointId {
        let id = WaypointId::new(self.next_waypoint);
        self.next_waypoint = self.next_waypoint.saturating_add(1);
        id
    }

    fn ground_position(&self, x: f32, z: f32) -> Vec3 {
        Vec3::new(x, self.terrain.height_at(x, z), z)
    }

    fn spawn_character(
        &mut self,
        faction: &FactionKey,
        group: GroupId,
        position: Vec3,
        turret_locked: bool,
    ) -> EntityId {
        let id = self.allocate_entity();
        let _ = self.entities.insert(
            id,
            Entity {
                position,
                alive: true,
                kind: EntityKind::Character {
                    faction: faction.clone(),
                    group: Some(group),
                    unconsciousness_permitted: true,
                    turret_locked,
                },
            },
        );
        id
    }

    fn kill_entity(&mut self, entity: EntityId, out_events: &mut Vec<Event>) {
        if let Some(record) = self.entities.get_mut(&entity) {
            if record.alive && matches!(record.kind, EntityKind::Character { .. }) {
                record.alive = false;
                out_events.push(Event::AgentKilled { entity });
            }
        }
    }

    fn march(&mut self, dt: Duration) {
        if self.march_speed <= 0.0 {
            return;
        }
        let step = self.march_speed * dt.as_secs_f32();
        for group in self.groups.values() {
            let Some(destination) = group
                .waypoints
                .first()
                .and_then(|id| self.waypoints.get(id))
                .filter(|waypoint| waypoint.kind == WaypointKind::Move)
                .map(|waypoint| waypoint.position)
            else {
                continue;
            };

            for member in &group.members {
                let Some(entity) = self.entities.get_mut(member) else {
                    continue;
                };
                if !entity.alive {
                    continue;
                }
                let offset = Vec3::new(
                    destination.x - entity.position.x,
                    0.0,
                    destination.z - entity.position.z,
                );
                let distance = offset.length();
                let next = if distance <= step {
                    destination
                } else {
                    entity.position + offset / distance * step
                };
                entity.position = Vec3::new(next.x, self.terrain.height_at(next.x, next.z), next.z);
            }
        }
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::Tick { dt } => {
            world.clock = world.clock.saturating_add(dt);
            world.march(dt);
            out_events.push(Event::TimeAdvanced { dt });
        }
        Command::JoinPlayer {
            player,
            faction,
            position,
        } => {
            let _ = world.players.insert(
                player,
                Player {
                    faction: faction.clone(),
                    position,
                    alive: true,
                },
            );
            out_events.push(Event::PlayerJoined { player, faction });
        }
        Command::MovePlayer { player, position } => {
            if let Some(record) = world.players.get_mut(&player) {
                record.position = position;
                out_events.push(Event::PlayerMoved { player, position });
            }
        }
        Command::KillPlayer { player } => {
            if let Some(record) = world.players.get_mut(&player) {
                if record.alive {
                    record.alive = false;
                    out_events.push(Event::PlayerKilled { player });
                }
            }
        }
        Command::RespawnPlayer { player, position } => {
            if let Some(record) = world.players.get_mut(&player) {
                record.alive = true;
                record.position = position;
                out_events.push(Event::PlayerRespawned { player });
            }
        }
        Command::KillAgent { entity } => world.kill_entity(entity, out_events),
        Command::KillGroup { group } => {
            let members = world
                .groups
                .get(&group)
                .map(|record| record.members.clone())
                .unwrap_or_default();
            for member in members {
                world.kill_entity(member, out_events);
            }
        }
        Command::MoveGroup { group, position } => {
            let Some(record) = world.groups.get(&group) else {
                return;
            };
            let members = record.members.clone();
            let ground = world.ground_position(position.x, position.z);
            for member in members {
                if let Some(entity) = world.entities.get_mut(&member) {
                    if entity.alive {
                        entity.position = ground;
                    }
                }
            }
            out_events.push(Event::GroupMoved { group, position });
        }
    }
}

impl Battlefield for World {
    fn now(&self) -> Timestamp {
        self.clock
    }

    fn players_in_faction(&self, faction: &FactionKey) -> Vec<PlayerSnapshot> {
        self.players
            .iter()
            .filter(|(_, player)| &player.faction == faction)
            .map(|(id, player)| PlayerSnapshot {
                id: *id,
                faction: player.faction.clone(),
                position: player.position,
                alive: player.alive,
            })
            .collect()
    }

    fn agents(&self) -> Vec<AgentSnapshot> {
        self.entities
            .iter()
            .filter_map(|(id, entity)| match &entity.kind {
                EntityKind::Character { faction, group, .. } => Some(AgentSnapshot {
                    entity: *id,
                    group: *group,
                    faction: faction.clone(),
                    position: entity.position,
                    alive: entity.alive,
                }),
                _ => None,
            })
            .collect()
    }

    fn group_members(&self, group: GroupId) -> Vec<EntityId> {
        self.groups
            .get(&group)
            .map(|record| {
                record
                    .members
                    .iter()
                    .copied()
                    .filter(|member| {
                        self.entities
                            .get(member)
                            .map_or(false, |entity| entity.alive)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn spawn_group(&mut self, prefab: &PrefabId, at: Transform) -> Result<GroupId, SpawnError> {
        let (faction, members) = match self.prefabs.get(prefab) {
            Some(Prefab::Group { faction, members }) => (faction.clone(), *members),
            Some(Prefab::Vehicle { .. }) => return Err(SpawnError::WrongKind(prefab.clone())),
            None => return Err(SpawnError::UnknownPrefab(prefab.clone())),
        };

        let group = self.allocate_group();
        let mut roster = Vec::new();
        for slot in 0..members {
            let x = at.position.x + slot as f32 * MEMBER_SPACING;
            let position = self.ground_position(x, at.position.z);
            roster.push(self.spawn_character(&faction, group, position, false));
        }
        let _ = self.groups.insert(
            group,
            Group {
                members: roster,
                waypoints: Vec::new(),
            },
        );
        Ok(group)
    }

    fn spawn_vehicle(&mut self, prefab: &PrefabId, at: Transform) -> Result<EntityId, SpawnError> {
        let (faction, driver_seat, gunner_seat) = match self.prefabs.get(prefab) {
            Some(Prefab::Vehicle {
                faction,
                driver_seat,
                gunner_seat,
            }) => (faction.clone(), *driver_seat, *gunner_seat),
            Some(Prefab::Group { .. }) => return Err(SpawnError::WrongKind(prefab.clone())),
            None => return Err(SpawnError::UnknownPrefab(prefab.clone())),
        };

        let id = self.allocate_entity();
        let _ = self.entities.insert(
            id,
            Entity {
                position: at.position,
                alive: true,
                kind: EntityKind::Vehicle {
                    faction,
                    driver_seat,
                    gunner_seat,
                },
            },
        );
        Ok(id)
    }

    fn crew_vehicle(
        &mut self,
        vehicle: EntityId,
        crew: &CrewConfig,
        waypoint: Option<WaypointId>,
    ) -> Result<GroupId, SpawnError> {
        let Some(record) = self.entities.get(&vehicle).filter(|entity| entity.alive) else {
            return Err(SpawnError::MissingEntity(vehicle));
        };
        let EntityKind::Vehicle {
            faction,
            driver_seat,
            gunner_seat,
        } = &record.kind
        else {
            return Err(SpawnError::MissingEntity(vehicle));
        };

        let seat_driver = crew.spawn_driver && *driver_seat;
        let seat_gunner = crew.spawn_gunner && *gunner_seat;
        if !seat_driver && !seat_gunner {
            return Err(SpawnError::NoCompartments(vehicle));
        }

        let faction = faction.clone();
        let position = record.position;
        let group = self.allocate_group();
        let mut roster = Vec::new();
        if seat_driver {
            roster.push(self.spawn_character(&faction, group, position, false));
        }
        if seat_gunner {
            roster.push(self.spawn_character(&faction, group, position, crew.no_turret_dismount));
        }

        let waypoints = waypoint
            .filter(|id| self.waypoints.contains_key(id))
            .into_iter()
            .collect();
        let _ = self.groups.insert(
            group,
            Group {
                members: roster,
                waypoints,
            },
        );
        Ok(group)
    }

    fn entity_position(&self, entity: EntityId) -> Option<Vec3> {
        self.entities
            .get(&entity)
            .filter(|record| record.alive)
            .map(|record| record.position)
    }

    fn assign_waypoint(&mut self, group: GroupId, waypoint: WaypointId) {
        if !self.waypoints.contains_key(&waypoint) {
            return;
        }
        if let Some(record) = self.groups.get_mut(&group) {
            record.waypoints.push(waypoint);
        }
    }

    fn remove_waypoint(&mut self, group: GroupId, waypoint: WaypointId) {
        if let Some(record) = self.groups.get_mut(&group) {
            record.waypoints.retain(|id| *id != waypoint);
        }
    }

    fn group_waypoints(&self, group: GroupId) -> Vec<WaypointId> {
        self.groups
            .get(&group)
            .map(|record| record.waypoints.clone())
            .unwrap_or_default()
    }

    fn create_fire_waypoint(
        &mut self,
        position: Vec3,
        shot_count: u32,
    ) -> Result<WaypointId, SpawnError> {
        let id = self.allocate_waypoint();
        let _ = self.waypoints.insert(
            id,
            Waypoint {
                position,
                kind: WaypointKind::FireSupport { shot_count },
            },
        );
        Ok(id)
    }

    fn delete_waypoint(&mut self, waypoint: WaypointId) {
        if self.waypoints.remove(&waypoint).is_none() {
            return;
        }
        for group in self.groups.values_mut() {
            group.waypoints.retain(|id| *id != waypoint);
        }
    }

    fn delete_group(&mut self, group: GroupId) {
        let Some(record) = self.groups.remove(&group) else {
            return;
        };
        for member in record.members {
            let _ = self.entities.remove(&member);
        }
    }

    fn delete_entity(&mut self, entity: EntityId) {
        let Some(record) = self.entities.remove(&entity) else {
            return;
        };
        if let EntityKind::Character {
            group: Some(group), ..
        } = record.kind
        {
            if let Some(group) = self.groups.get_mut(&group) {
                group.members.retain(|member| *member != entity);
            }
        }
    }

    fn disable_unconsciousness(&mut self, entity: EntityId) {
        if let Some(Entity {
            kind:
                EntityKind::Character {
                    unconsciousness_permitted,
                    ..
                },
            ..
        }) = self.entities.get_mut(&entity)
        {
            *unconsciousness_permitted = false;
        }
    }

    fn surface_height(&self, x: f32, z: f32) -> f32 {
        self.terrain.height_at(x, z)
    }

    fn credit_supplies(&mut self, container: EntityId, amount: u32) -> Result<(), SupplyError> {
        match self.entities.get_mut(&container).map(|entity| &mut entity.kind) {
            Some(EntityKind::SupplyCache { supplies, capacity }) => {
                let total = supplies.saturating_add(amount);
                if total > *capacity {
                    return Err(SupplyError::CapacityExceeded {
                        container,
                        requested: amount,
                    });
                }
                *supplies = total;
                Ok(())
            }
            _ => Err(SupplyError::NotAContainer(container)),
        }
    }
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::{EntityKind, WaypointKind, World};
    use defence_in_depth_core::{EntityId, FactionKey, GroupId, Timestamp, Vec3, WaypointId};

    /// Retrieves the welcome banner that adapters may display to players.
    #[must_use]
    pub fn welcome_banner(world: &World) -> &'static str {
        world.banner
    }

    /// Current session time.
    #[must_use]
    pub fn now(world: &World) -> Timestamp {
        world.clock
    }

    /// Captures a read-only view of a group.
    #[must_use]
    pub fn group(world: &World, id: GroupId) -> Option<GroupSnapshot> {
        let record = world.groups.get(&id)?;
        let alive_members = record
            .members
            .iter()
            .filter(|member| {
                world
                    .entities
                    .get(member)
                    .map_or(false, |entity| entity.alive)
            })
            .count();
        Some(GroupSnapshot {
            id,
            members: record.members.clone(),
            alive_members,
            waypoints: record.waypoints.clone(),
        })
    }

    /// Captures every group in deterministic order.
    #[must_use]
    pub fn groups(world: &World) -> Vec<GroupSnapshot> {
        world
            .groups
            .keys()
            .filter_map(|id| group(world, *id))
            .collect()
    }

    /// Counts living AI characters of the faction.
    #[must_use]
    pub fn living_agents(world: &World, faction: &FactionKey) -> usize {
        world
            .entities
            .values()
            .filter(|entity| entity.alive)
            .filter(|entity| {
                matches!(&entity.kind, EntityKind::Character { faction: own, .. } if own == faction)
            })
            .count()
    }

    /// Vehicles currently present in the world.
    #[must_use]
    pub fn vehicles(world: &World) -> Vec<EntityId> {
        world
            .entities
            .iter()
            .filter(|(_, entity)| matches!(entity.kind, EntityKind::Vehicle { .. }))
            .map(|(id, _)| *id)
            .collect()
    }

    /// Captures a read-only view of a waypoint.
    #[must_use]
    pub fn waypoint(world: &World, id: WaypointId) -> Option<WaypointSnapshot> {
        world.waypoints.get(&id).map(|waypoint| WaypointSnapshot {
            id,
            position: waypoint.position,
            shot_count: match waypoint.kind {
                WaypointKind::Move => None,
                WaypointKind::FireSupport { shot_count } => Some(shot_count),
            },
        })
    }

    /// Fire-control waypoints currently present in the world.
    #[must_use]
    pub fn fire_waypoints(world: &World) -> Vec<WaypointSnapshot> {
        world
            .waypoints
            .keys()
            .filter_map(|id| waypoint(world, *id))
            .filter(|snapshot| snapshot.shot_count.is_some())
            .collect()
    }

    /// Supplies stored in a container.
    #[must_use]
    pub fn supplies(world: &World, container: EntityId) -> Option<u32> {
        match world.entities.get(&container).map(|entity| &entity.kind) {
            Some(EntityKind::SupplyCache { supplies, .. }) => Some(*supplies),
            _ => None,
        }
    }

    /// Whether a character may still fall unconscious.
    #[must_use]
    pub fn unconsciousness_permitted(world: &World, entity: EntityId) -> Option<bool> {
        match world.entities.get(&entity).map(|record| &record.kind) {
            Some(EntityKind::Character {
                unconsciousness_permitted,
                ..
            }) => Some(*unconsciousness_permitted),
            _ => None,
        }
    }

    /// Whether a character is locked to its turret.
    #[must_use]
    pub fn turret_locked(world: &World, entity: EntityId) -> Option<bool> {
        match world.entities.get(&entity).map(|record| &record.kind) {
            Some(EntityKind::Character { turret_locked, .. }) => Some(*turret_locked),
            _ => None,
        }
    }

    /// Position of any entity, alive or not.
    #[must_use]
    pub fn position(world: &World, entity: EntityId) -> Option<Vec3> {
        world.entities.get(&entity).map(|record| record.position)
    }

    /// Read-only snapshot of an AI group.
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct GroupSnapshot {
        /// Identifier of the group.
        pub id: GroupId,
        /// Every member, alive or not.
        pub members: Vec<EntityId>,
        /// Number of living members.
        pub alive_members: usize,
        /// Attached movement orders.
        pub waypoints: Vec<WaypointId>,
    }

    /// Read-only snapshot of a waypoint.
    #[derive(Clone, Copy, Debug, PartialEq)]
    pub struct WaypointSnapshot {
        /// Identifier of the waypoint.
        pub id: WaypointId,
        /// World position of the waypoint.
        pub position: Vec3,
        /// Ordered shot count for fire-control waypoints.
        pub shot_count: Option<u32>,
    }
}

#[derive(Clone, Debug)]
struct Player {
    faction: FactionKey,
    position: Vec3,
    alive: bool,
}

#[derive(Clone, Debug)]
struct Entity {
    position: Vec3,
    alive: bool,
    kind: EntityKind,
}

#[derive(Clone, Debug)]
enum EntityKind {
    Character {
        faction: FactionKey,
        group: Option<GroupId>,
        unconsciousness_permitted: bool,
        turret_locked: bool,
    },
    Vehicle {
        faction: FactionKey,
        driver_seat: bool,
        gunner_seat: bool,
    },
    SupplyCache {
        supplies: u32,
        capacity: u32,
    },
}

#[derive(Clone, Debug)]
struct Group {
    members: Vec<EntityId>,
    waypoints: Vec<WaypointId>,
}

#[derive(Clone, Copy, Debug)]
struct Waypoint {
    position: Vec3,
    kind: WaypointKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WaypointKind {
    Move,
    FireSupport { shot_count: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rifle_squad() -> PrefabId {
        PrefabId::new("rifle_squad")
    }

    fn world_with_squad() -> World {
        let mut world = World::new();
        world.register_prefab(
            rifle_squad(),
            Prefab::Group {
                faction: FactionKey::attackers(),
                members: 4,
            },
        );
        world
    }

    #[test]
    fn tick_advances_clock_and_reports_time() {
        let mut world = World::new();
        let mut events = Vec::new();
        apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_millis(250),
            },
            &mut events,
        );
        assert_eq!(world.now(), Timestamp::from_millis(250));
        assert_eq!(
            events,
            vec![Event::TimeAdvanced {
                dt: Duration::from_millis(250)
            }]
        );
    }

    #[test]
    fn spawned_group_members_share_the_prefab_faction() {
        let mut world = world_with_squad();
        let group = world
            .spawn_group(&rifle_squad(), Transform::at(Vec3::new(10.0, 0.0, 10.0)))
            .expect("spawn");
        assert_eq!(world.group_members(group).len(), 4);
        assert!(world
            .agents()
            .iter()
            .all(|agent| agent.faction == FactionKey::attackers() && agent.group == Some(group)));
    }

    #[test]
    fn unknown_prefab_is_reported() {
        let mut world = World::new();
        let error = world
            .spawn_group(&PrefabId::new("ghost"), Transform::at(Vec3::ZERO))
            .expect_err("unknown prefab");
        assert_eq!(error, SpawnError::UnknownPrefab(PrefabId::new("ghost")));
    }

    #[test]
    fn killed_members_leave_the_living_roster() {
        let mut world = world_with_squad();
        let group = world
            .spawn_group(&rifle_squad(), Transform::at(Vec3::ZERO))
            .expect("spawn");
        let victim = world.group_members(group)[0];
        let mut events = Vec::new();
        apply(&mut world, Command::KillAgent { entity: victim }, &mut events);
        apply(&mut world, Command::KillAgent { entity: victim }, &mut events);
        assert_eq!(events, vec![Event::AgentKilled { entity: victim }]);
        assert_eq!(world.group_members(group).len(), 3);
    }

    #[test]
    fn crew_requires_a_matching_seat() {
        let mut world = World::new();
        let mortar = PrefabId::new("mortar");
        world.register_prefab(
            mortar.clone(),
            Prefab::Vehicle {
                faction: FactionKey::attackers(),
                driver_seat: false,
                gunner_seat: true,
            },
        );
        let vehicle = world
            .spawn_vehicle(&mortar, Transform::at(Vec3::ZERO))
            .expect("vehicle");

        let drivers_only = CrewConfig {
            spawn_gunner: false,
            ..CrewConfig::default()
        };
        assert_eq!(
            world.crew_vehicle(vehicle, &drivers_only, None),
            Err(SpawnError::NoCompartments(vehicle))
        );

        let crew = world
            .crew_vehicle(vehicle, &CrewConfig::default(), None)
            .expect("crew");
        let gunner = world.group_members(crew)[0];
        assert_eq!(query::turret_locked(&world, gunner), Some(true));
    }

    #[test]
    fn deleting_a_waypoint_detaches_it_from_groups() {
        let mut world = world_with_squad();
        let group = world
            .spawn_group(&rifle_squad(), Transform::at(Vec3::ZERO))
            .expect("spawn");
        let waypoint = world
            .create_fire_waypoint(Vec3::new(5.0, 0.0, 5.0), 3)
            .expect("waypoint");
        world.assign_waypoint(group, waypoint);
        assert_eq!(world.group_waypoints(group), vec![waypoint]);

        world.delete_waypoint(waypoint);
        assert!(world.group_waypoints(group).is_empty());
        assert!(query::waypoint(&world, waypoint).is_none());
    }

    #[test]
    fn marching_groups_close_on_their_waypoint() {
        let mut world = world_with_squad().with_march_speed(2.0);
        let destination = world.place_waypoint(Vec3::new(0.0, 0.0, 100.0));
        let group = world
            .spawn_group(&rifle_squad(), Transform::at(Vec3::ZERO))
            .expect("spawn");
        world.assign_waypoint(group, destination);

        let mut events = Vec::new();
        apply(
            &mut world,
            Command::Tick {
                dt: Duration::from_secs(5),
            },
            &mut events,
        );
        let leader = world.group_members(group)[0];
        let position = world.entity_position(leader).expect("alive");
        assert!((position.z - 10.0).abs() < 1e-3);
    }

    #[test]
    fn supply_credit_respects_capacity() {
        let mut world = World::new();
        let cache = world.place_supply_cache(Vec3::ZERO, 100, 150);
        assert_eq!(world.credit_supplies(cache, 40), Ok(()));
        assert_eq!(query::supplies(&world, cache), Some(140));
        assert_eq!(
            world.credit_supplies(cache, 40),
            Err(SupplyError::CapacityExceeded {
                container: cache,
                requested: 40
            })
        );
        assert_eq!(
            world.credit_supplies(EntityId::new(999), 1),
            Err(SupplyError::NotAContainer(EntityId::new(999)))
        );
    }

    #[test]
    fn terrain_plane_tilts_heights() {
        let terrain = Terrain::Plane {
            base: 10.0,
            slope_x: 0.5,
            slope_z: -1.0,
        };
        let world = World::new().with_terrain(terrain);
        assert!((world.surface_height(4.0, 2.0) - 10.0).abs() < f32::EPSILON);
    }
}
