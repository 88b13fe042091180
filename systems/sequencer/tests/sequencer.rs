use std::{cell::RefCell, rc::Rc, time::Duration};

use defence_in_depth_core::{
    Command, FactionKey, PlayerId, PrefabId, Timestamp, Transform, Vec3, ZoneBoundary, ZoneIndex,
    ZoneState,
};
use defence_in_depth_system_sequencer::{SequencerError, SequencerSettings, ZoneSequencer};
use defence_in_depth_system_spawning::{
    InfantrySettings, SpawnerChild, SpawnerDefinition, SpawnerSettings, StrategySettings,
    WaveGateSettings,
};
use defence_in_depth_system_zone::{
    Attachment, WaveSettings, Zone, ZoneLayout, ZoneMode, ZoneSettings,
};
use defence_in_depth_world::{self as world, query, Prefab, World};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

const DEFENDER: PlayerId = PlayerId::new(7);

#[derive(Clone, Debug, PartialEq)]
enum Notice {
    Changed(u32, ZoneState),
    Updated(u32, ZoneState, ZoneState),
    Held(u32),
    Completed(u32),
}

fn rifle_squad() -> PrefabId {
    PrefabId::new("rifle_squad")
}

fn inside() -> Vec3 {
    Vec3::new(50.0, 0.0, 50.0)
}

struct Campaign {
    world: World,
    rng: ChaCha8Rng,
    sequencer: ZoneSequencer,
    log: Rc<RefCell<Vec<Notice>>>,
}

impl Campaign {
    fn new(seed: u64, settings: SequencerSettings) -> Self {
        let mut world = World::new();
        world.register_prefab(
            rifle_squad(),
            Prefab::Group {
                faction: FactionKey::attackers(),
                members: 4,
            },
        );
        let mut events = Vec::new();
        world::apply(
            &mut world,
            Command::JoinPlayer {
                player: DEFENDER,
                faction: FactionKey::defenders(),
                position: inside(),
            },
            &mut events,
        );

        let log = Rc::new(RefCell::new(Vec::new()));
        let mut sequencer = ZoneSequencer::new(settings);
        let sink = Rc::clone(&log);
        let _ = sequencer.on_zone_changed().subscribe(move |event| {
            sink.borrow_mut()
                .push(Notice::Changed(event.zone.get(), event.state));
        });
        let sink = Rc::clone(&log);
        let _ = sequencer.on_zone_updated().subscribe(move |event| {
            sink.borrow_mut()
                .push(Notice::Updated(event.zone.get(), event.from, event.to));
        });
        let sink = Rc::clone(&log);
        let _ = sequencer
            .on_zone_held()
            .subscribe(move |event| sink.borrow_mut().push(Notice::Held(event.zone.get())));
        let sink = Rc::clone(&log);
        let _ = sequencer.on_all_zones_completed().subscribe(move |event| {
            sink.borrow_mut().push(Notice::Completed(event.last.get()));
        });

        Self {
            world,
            rng: ChaCha8Rng::seed_from_u64(seed),
            sequencer,
            log,
        }
    }

    fn zone(&mut self, index: u32, mode: ZoneMode, strategy: StrategySettings) -> Zone {
        let objective = self.world.place_waypoint(inside());
        let origin = Vec3::new(index as f32 * 1_000.0, 0.0, 0.0);
        let boundary = ZoneBoundary::new(
            Vec3::ZERO,
            &[
                Vec3::new(0.0, 0.0, 0.0),
                Vec3::new(100.0, 0.0, 0.0),
                Vec3::new(100.0, 0.0, 100.0),
                Vec3::new(0.0, 0.0, 100.0),
            ],
        );
        Zone::prepare(
            ZoneIndex::new(index),
            ZoneSettings {
                name: format!("zone-{index}"),
                prepare_secs: 5,
                defence_secs: 30,
                ..ZoneSettings::default()
            },
            mode,
            ZoneLayout::new()
                .with(Attachment::Boundary(boundary))
                .with(Attachment::ReinsertionPoint(Transform::at(inside())))
                .with(Attachment::Spawner(SpawnerDefinition {
                    name: format!("spawner-{index}"),
                    settings: SpawnerSettings {
                        prefabs: vec![rifle_squad()],
                        wave_interval_secs: 2,
                        spawn_count: 1,
                        ..SpawnerSettings::default()
                    },
                    strategy,
                    children: vec![
                        SpawnerChild::SpawnPoint(Transform::at(origin - Vec3::X * 500.0)),
                        SpawnerChild::Waypoint(objective),
                    ],
                })),
        )
    }

    fn register_timed(&mut self, indices: &[u32]) {
        for index in indices {
            let zone = self.zone(*index, ZoneMode::Timed, steady_infantry());
            assert_eq!(self.sequencer.register_zone(zone), Ok(()));
        }
    }

    fn start(&mut self) {
        assert_eq!(self.sequencer.start_zone_system(&self.world), Ok(()));
    }

    fn command(&mut self, command: Command) {
        let mut events = Vec::new();
        world::apply(&mut self.world, command, &mut events);
        self.sequencer.handle(&events, &mut self.world, &mut self.rng);
    }

    fn tick(&mut self, dt: Duration) {
        self.command(Command::Tick { dt });
    }

    fn seconds(&mut self, count: u32) {
        for _ in 0..count {
            self.tick(Duration::from_secs(1));
        }
    }

    fn run_until(&mut self, mut done: impl FnMut(&Self) -> bool, limit: u32) {
        for _ in 0..limit {
            if done(self) {
                return;
            }
            self.tick(Duration::from_secs(1));
        }
        assert!(done(self), "condition not reached after {limit}s");
    }

    fn secs(&self) -> u64 {
        query::now(&self.world).since_start().as_secs()
    }

    fn notices(&self) -> Vec<Notice> {
        self.log.borrow().clone()
    }
}

fn steady_infantry() -> StrategySettings {
    StrategySettings::Infantry(InfantrySettings {
        min_interval_multiplier: 1.0,
        max_interval_multiplier: 1.0,
        ..InfantrySettings::default()
    })
}

#[test]
fn failed_zones_advance_until_the_campaign_is_over() {
    let mut campaign = Campaign::new(1, SequencerSettings::default());
    campaign.register_timed(&[1, 2, 3]);
    campaign.start();
    assert!(campaign.sequencer.is_warmup());

    campaign.seconds(7);
    assert_eq!(campaign.sequencer.current_state(), Some(ZoneState::Active));
    assert_eq!(query::groups(&campaign.world).len(), 1);
    campaign.command(Command::KillPlayer { player: DEFENDER });

    campaign.seconds(1);
    assert_eq!(campaign.sequencer.current_index(), Some(ZoneIndex::new(2)));
    assert_eq!(
        campaign.sequencer.zone(ZoneIndex::FIRST).map(Zone::state),
        Some(ZoneState::Inactive)
    );
    assert!(query::groups(&campaign.world).is_empty());

    campaign.run_until(|campaign| !campaign.sequencer.is_active(), 40);
    campaign.seconds(30);

    assert_eq!(
        campaign.notices(),
        vec![
            Notice::Changed(1, ZoneState::Prepare),
            Notice::Changed(1, ZoneState::Active),
            Notice::Changed(2, ZoneState::Prepare),
            Notice::Changed(2, ZoneState::Active),
            Notice::Changed(3, ZoneState::Prepare),
            Notice::Changed(3, ZoneState::Active),
            Notice::Completed(3),
        ]
    );
    assert_eq!(campaign.secs(), 50);
}

#[test]
fn holding_a_zone_stops_the_campaign() {
    let mut campaign = Campaign::new(2, SequencerSettings::default());
    campaign.register_timed(&[1, 2]);
    campaign.start();

    campaign.run_until(|campaign| !campaign.sequencer.is_active(), 60);
    assert_eq!(campaign.secs(), 35);
    assert_eq!(campaign.sequencer.current_state(), Some(ZoneState::FinishedHeld));
    campaign.seconds(10);

    assert_eq!(
        campaign.notices(),
        vec![
            Notice::Changed(1, ZoneState::Prepare),
            Notice::Changed(1, ZoneState::Active),
            Notice::Held(1),
        ]
    );
    assert_eq!(
        campaign.sequencer.zone(ZoneIndex::new(2)).map(Zone::state),
        Some(ZoneState::Inactive)
    );
}

#[test]
fn freezing_is_reported_once_per_transition() {
    let mut campaign = Campaign::new(3, SequencerSettings::default());
    campaign.register_timed(&[1]);
    campaign.start();
    campaign.seconds(7);

    let squad = query::groups(&campaign.world)[0].id;
    campaign.command(Command::MoveGroup {
        group: squad,
        position: inside(),
    });
    campaign.seconds(4);
    assert!(!campaign.sequencer.is_timer_running());
    assert_eq!(campaign.sequencer.attacker_count(), 4);
    assert_eq!(campaign.sequencer.defender_count(), 1);

    campaign.command(Command::KillGroup { group: squad });
    campaign.seconds(3);
    assert!(campaign.sequencer.is_timer_running());

    let updates: Vec<_> = campaign
        .notices()
        .into_iter()
        .filter(|notice| matches!(notice, Notice::Updated(..)))
        .collect();
    assert_eq!(
        updates,
        vec![
            Notice::Updated(1, ZoneState::Active, ZoneState::Frozen),
            Notice::Updated(1, ZoneState::Frozen, ZoneState::Active),
        ]
    );
}

#[test]
fn passes_run_once_per_check_interval() {
    let mut campaign = Campaign::new(4, SequencerSettings::default());
    campaign.register_timed(&[1]);
    campaign.start();

    for _ in 0..19 {
        campaign.tick(Duration::from_millis(250));
    }
    assert_eq!(campaign.sequencer.current_state(), Some(ZoneState::Prepare));
    campaign.tick(Duration::from_millis(250));
    assert_eq!(campaign.sequencer.current_state(), Some(ZoneState::Active));
    assert_eq!(
        campaign.sequencer.timeout(query::now(&campaign.world)),
        Some(Timestamp::from_secs(35))
    );
}

#[test]
fn long_ticks_run_a_single_pass_and_drop_the_remainder() {
    let mut campaign = Campaign::new(4, SequencerSettings::default());
    campaign.register_timed(&[1]);
    campaign.start();

    campaign.tick(Duration::from_millis(4_500));
    assert_eq!(campaign.sequencer.current_state(), Some(ZoneState::Prepare));
    campaign.tick(Duration::from_millis(750));
    assert_eq!(campaign.sequencer.current_state(), Some(ZoneState::Prepare));
    campaign.tick(Duration::from_millis(250));
    assert_eq!(campaign.sequencer.current_state(), Some(ZoneState::Active));
}

#[test]
fn missing_first_zone_refuses_to_start() {
    let mut campaign = Campaign::new(5, SequencerSettings::default());
    campaign.register_timed(&[2]);
    assert_eq!(
        campaign.sequencer.start_zone_system(&campaign.world),
        Err(SequencerError::MissingFirstZone)
    );
    assert!(!campaign.sequencer.is_active());
    campaign.seconds(10);
    assert!(campaign.notices().is_empty());
}

#[test]
fn gaps_in_the_ordinals_are_skipped() {
    let mut campaign = Campaign::new(6, SequencerSettings::default());
    campaign.register_timed(&[1, 3]);
    campaign.start();
    campaign.seconds(6);
    campaign.command(Command::KillPlayer { player: DEFENDER });
    campaign.seconds(1);

    assert_eq!(campaign.sequencer.current_index(), Some(ZoneIndex::new(3)));
    assert_eq!(
        campaign.notices().last(),
        Some(&Notice::Changed(3, ZoneState::Prepare))
    );
    assert_eq!(campaign.sequencer.max_zone_index(), Some(ZoneIndex::new(3)));
}

#[test]
fn admin_can_skip_the_warmup() {
    let mut campaign = Campaign::new(7, SequencerSettings::default());
    campaign.register_timed(&[1]);
    campaign.start();
    campaign.seconds(1);
    assert_eq!(
        campaign.sequencer.reinsertion_point(),
        Some(Transform::at(inside()))
    );
    assert!(campaign.sequencer.force_end_prepare(query::now(&campaign.world)));
    campaign.seconds(1);
    assert!(!campaign.sequencer.is_warmup());
    assert!(!campaign.sequencer.force_end_prepare(query::now(&campaign.world)));
}

#[test]
fn stopping_clears_the_battlefield() {
    let mut campaign = Campaign::new(8, SequencerSettings::default());
    campaign.register_timed(&[1]);
    campaign.start();
    campaign.seconds(12);
    assert!(!query::groups(&campaign.world).is_empty());

    campaign.sequencer.stop(&mut campaign.world);
    assert!(query::groups(&campaign.world).is_empty());
    assert_eq!(campaign.sequencer.current_state(), Some(ZoneState::Inactive));
    campaign.seconds(5);
    assert!(query::groups(&campaign.world).is_empty());

    campaign.sequencer.reset(&mut campaign.world);
    assert_eq!(campaign.sequencer.current_index(), None);
    campaign.start();
    assert_eq!(
        campaign.notices().last(),
        Some(&Notice::Changed(1, ZoneState::Prepare))
    );
}

#[test]
fn wave_transitions_are_published_as_updates() {
    let mut campaign = Campaign::new(9, SequencerSettings::default());
    let zone = campaign.zone(
        1,
        ZoneMode::Waves(WaveSettings {
            total_waves: 2,
            base_tickets: 4,
            tickets_per_wave: 0,
            transition_secs: 3,
            ..WaveSettings::default()
        }),
        StrategySettings::WaveGated(WaveGateSettings::default()),
    );
    assert_eq!(campaign.sequencer.register_zone(zone), Ok(()));
    campaign.start();

    for _ in 0..2 {
        campaign.run_until(
            |campaign| !query::groups(&campaign.world).is_empty()
                && query::groups(&campaign.world)
                    .iter()
                    .any(|group| group.alive_members > 0),
            30,
        );
        campaign.seconds(1);
        let alive: Vec<_> = query::groups(&campaign.world)
            .into_iter()
            .filter(|group| group.alive_members > 0)
            .map(|group| group.id)
            .collect();
        for group in alive {
            campaign.command(Command::KillGroup { group });
        }
        campaign.run_until(
            |campaign| campaign.sequencer.current_state() != Some(ZoneState::Active),
            5,
        );
    }
    campaign.run_until(|campaign| !campaign.sequencer.is_active(), 10);

    assert_eq!(
        campaign.notices(),
        vec![
            Notice::Changed(1, ZoneState::Prepare),
            Notice::Changed(1, ZoneState::Active),
            Notice::Updated(1, ZoneState::Active, ZoneState::WaveComplete),
            Notice::Updated(1, ZoneState::WaveComplete, ZoneState::Prepare),
            Notice::Changed(1, ZoneState::Active),
            Notice::Updated(1, ZoneState::Active, ZoneState::WaveComplete),
            Notice::Held(1),
        ]
    );
}

#[test]
fn same_seed_replays_the_same_campaign() {
    fn run(seed: u64) -> (Vec<Notice>, Vec<(u32, usize)>) {
        let mut campaign = Campaign::new(seed, SequencerSettings::default());
        for index in 1..=2 {
            let zone = campaign.zone(
                index,
                ZoneMode::Timed,
                StrategySettings::Infantry(InfantrySettings::default()),
            );
            assert_eq!(campaign.sequencer.register_zone(zone), Ok(()));
        }
        campaign.start();
        let mut spawns = Vec::new();
        for second in 0..45 {
            if second == 20 {
                campaign.command(Command::KillPlayer { player: DEFENDER });
            }
            campaign.seconds(1);
            spawns.push((second, query::groups(&campaign.world).len()));
        }
        (campaign.notices(), spawns)
    }

    assert_eq!(run(42), run(42));
}
