use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    time::Duration,
};

use glam::Vec3;
use runecast_core::{
    services::Entities, CastRequest, Command, Entity, EntityFlags, EntityHandle, Event, Pool,
    SpellKind,
};
use runecast_system_spellcasting::{Spellcasting, SpellcastingConfig};
use runecast_world::{self as world, query, World};

#[test]
fn deterministic_replay_produces_identical_runs() {
    let first = replay(SpellcastingConfig::default());
    let second = replay(SpellcastingConfig::default());

    assert_eq!(first, second, "replay diverged between runs");
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert!(first.particles > 0);
    assert!(!first.bursts.is_empty(), "the scripted fight deals damage");
}

#[test]
fn rng_seed_changes_the_replay() {
    let first = replay(SpellcastingConfig::default());
    let reseeded = replay(SpellcastingConfig {
        rng_seed: SpellcastingConfig::default().rng_seed.wrapping_add(1),
        ..SpellcastingConfig::default()
    });

    assert_ne!(first.fingerprint(), reseeded.fingerprint());
}

fn replay(config: SpellcastingConfig) -> ReplayOutcome {
    let mut world = World::new();
    let goblins: Vec<EntityHandle> = [300.0, 700.0]
        .into_iter()
        .filter_map(|z| {
            world.add_entity(Entity {
                template: "goblin".to_owned(),
                pos: Vec3::new(40.0, 0.0, z),
                flags: EntityFlags::NPC | EntityFlags::IN_SCENE | EntityFlags::IN_TREAT_ZONE,
                group: Some(2),
                life: Pool::full(120.0),
                mana: Pool::full(60.0),
                height: -170.0,
                ..Entity::default()
            })
        })
        .collect();
    if let Some(player) = world.entity_mut(EntityHandle::PLAYER) {
        player.life.current = 10.0;
    }
    let mut spells = Spellcasting::new(&config);
    let mut log = Vec::new();

    for command in scripted_commands(&goblins) {
        let mut events = Vec::new();
        world::apply(&mut world, command.clone(), &mut events);
        spells
            .apply(&mut world, command, &mut events)
            .expect("scripted casts fit in the registry");
        record_events(&events, &mut log);
    }

    let entities = world
        .entity_handles()
        .into_iter()
        .filter_map(|handle| world.entity(handle).map(|entity| EntityState::new(handle, entity)))
        .collect();
    let bursts = query::damage_bursts(&world)
        .iter()
        .map(|burst| (burst.radius.to_bits(), burst.amount.to_bits()))
        .collect();

    ReplayOutcome {
        entities,
        bursts,
        particles: query::particles_spawned(&world),
        live_spells: spells.registry().len(),
        events: log,
    }
}

fn record_events(events: &[Event], log: &mut Vec<Event>) {
    log.extend(events.iter().cloned());
}

fn cast(request: CastRequest) -> Command {
    Command::CastSpell { request }
}

fn ticks(count: usize, millis: u64) -> impl Iterator<Item = Command> {
    std::iter::repeat(Command::Tick {
        dt: Duration::from_millis(millis),
    })
    .take(count)
}

fn scripted_commands(goblins: &[EntityHandle]) -> Vec<Command> {
    let shaman = goblins.first().copied().unwrap_or(EntityHandle::PLAYER);
    let brute = goblins.last().copied().unwrap_or(EntityHandle::PLAYER);
    let mut commands = vec![
        cast(CastRequest::new(SpellKind::Heal, EntityHandle::PLAYER, 3.0)),
        cast(CastRequest::new(SpellKind::Fireball, EntityHandle::PLAYER, 4.0)),
        cast(CastRequest::new(SpellKind::Confuse, EntityHandle::PLAYER, 2.0).with_target(brute)),
        cast(CastRequest::new(SpellKind::Armor, shaman, 2.0).with_target(shaman)),
    ];
    commands.extend(ticks(60, 16));
    commands.push(cast(CastRequest::new(
        SpellKind::PoisonProjectile,
        EntityHandle::PLAYER,
        3.0,
    )));
    commands.push(cast(CastRequest::new(
        SpellKind::IceProjectile,
        EntityHandle::PLAYER,
        2.0,
    )));
    commands.extend(ticks(120, 33));
    commands.push(Command::EndSpellsByCaster {
        caster: shaman,
        kind: SpellKind::Armor,
    });
    commands.push(cast(CastRequest::new(
        SpellKind::LightningStrike,
        EntityHandle::PLAYER,
        3.0,
    )));
    commands.extend(ticks(90, 16));
    commands
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ReplayOutcome {
    entities: Vec<EntityState>,
    bursts: Vec<(u32, u32)>,
    particles: usize,
    live_spells: usize,
    events: Vec<Event>,
}

impl ReplayOutcome {
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        hasher.finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct EntityState {
    handle: EntityHandle,
    pos: [u32; 3],
    life: u32,
    mana: u32,
    poison: u32,
    flags: u16,
}

impl EntityState {
    fn new(handle: EntityHandle, entity: &Entity) -> Self {
        Self {
            handle,
            pos: entity.pos.to_array().map(f32::to_bits),
            life: entity.life.current.to_bits(),
            mana: entity.mana.current.to_bits(),
            poison: entity.poison.to_bits(),
            flags: entity.flags.bits(),
        }
    }
}
