use std::time::Duration;

use glam::Vec3;
use runecast_core::{
    services::{Entities, PlayerState},
    CastRequest, Command, EndReason, Entity, EntityFlags, EntityHandle, Event, Pool, SoundId,
    SpellHandle, SpellKind,
};
use runecast_system_spellcasting::{CastError, CastOutcome, Spellcasting, SpellcastingConfig};
use runecast_world::{query, World, WorldConfig};

fn spells() -> Spellcasting {
    Spellcasting::new(&SpellcastingConfig::default())
}

fn npc(world: &mut World, pos: Vec3) -> EntityHandle {
    world
        .add_entity(Entity {
            template: "goblin".to_owned(),
            pos,
            flags: EntityFlags::NPC | EntityFlags::IN_SCENE | EntityFlags::IN_TREAT_ZONE,
            life: Pool::full(100.0),
            mana: Pool::full(100.0),
            height: -170.0,
            ..Entity::default()
        })
        .expect("entity slot")
}

fn cast(spells: &mut Spellcasting, world: &mut World, request: CastRequest) -> CastOutcome {
    let mut events = Vec::new();
    spells
        .cast(world, request, &mut events)
        .expect("registry has room")
}

fn launched(spells: &mut Spellcasting, world: &mut World, request: CastRequest) -> SpellHandle {
    match cast(spells, world, request) {
        CastOutcome::Launched(handle) => handle,
        CastOutcome::Vetoed => panic!("cast was vetoed"),
    }
}

fn tick(spells: &mut Spellcasting, world: &mut World, dt: Duration) -> Vec<Event> {
    let mut events = Vec::new();
    runecast_world::apply(world, Command::Tick { dt }, &mut events);
    spells
        .apply(world, Command::Tick { dt }, &mut events)
        .expect("ticks never fail");
    events
}

#[test]
fn heal_allows_one_instance_per_caster() {
    let mut world = World::new();
    let mut spells = spells();
    let _ = launched(
        &mut spells,
        &mut world,
        CastRequest::new(SpellKind::Heal, EntityHandle::PLAYER, 2.0),
    );
    let second = cast(
        &mut spells,
        &mut world,
        CastRequest::new(SpellKind::Heal, EntityHandle::PLAYER, 2.0),
    );
    assert_eq!(second, CastOutcome::Vetoed);
    assert_eq!(spells.registry().len(), 1);

    let healer = npc(&mut world, Vec3::new(500.0, 0.0, 0.0));
    let other = cast(
        &mut spells,
        &mut world,
        CastRequest::new(SpellKind::Heal, healer, 2.0).with_target(healer),
    );
    assert!(matches!(other, CastOutcome::Launched(_)), "other casters may heal");
}

#[test]
fn vetoed_cast_plays_the_fizzle_cue() {
    let mut world = World::new();
    let mut spells = spells();
    let mut events = Vec::new();
    let _ = spells
        .cast(
            &mut world,
            CastRequest::new(SpellKind::Heal, EntityHandle::PLAYER, 1.0),
            &mut events,
        )
        .expect("registry has room");
    let _ = spells
        .cast(
            &mut world,
            CastRequest::new(SpellKind::Heal, EntityHandle::PLAYER, 1.0),
            &mut events,
        )
        .expect("registry has room");
    assert!(query::played_cues(&world)
        .iter()
        .any(|played| played.cue == SoundId::MagicFizzle));
    assert!(events.contains(&Event::SpellVetoed {
        kind: SpellKind::Heal,
        caster: EntityHandle::PLAYER,
    }));
}

#[test]
fn armor_and_lower_armor_replace_each_other() {
    let mut world = World::new();
    let mut spells = spells();
    let shaman = npc(&mut world, Vec3::new(0.0, 0.0, 500.0));
    let brute = npc(&mut world, Vec3::new(0.0, 0.0, 600.0));

    let curse = launched(
        &mut spells,
        &mut world,
        CastRequest::new(SpellKind::LowerArmor, shaman, 3.0).with_target(brute),
    );
    let blessing = launched(
        &mut spells,
        &mut world,
        CastRequest::new(SpellKind::Armor, shaman, 3.0).with_target(brute),
    );
    assert!(!spells.registry().contains(curse), "armor lifts the curse");
    assert!(spells.registry().is_affected(brute, SpellKind::Armor));

    let _ = launched(
        &mut spells,
        &mut world,
        CastRequest::new(SpellKind::LowerArmor, shaman, 3.0).with_target(brute),
    );
    assert!(!spells.registry().contains(blessing), "the curse strips armor");
    assert!(!spells.registry().is_affected(brute, SpellKind::Armor));
}

#[test]
fn slow_down_toggles_on_a_second_cast() {
    let mut world = World::new();
    let mut spells = spells();
    let victim = npc(&mut world, Vec3::new(0.0, 0.0, 400.0));
    let first = launched(
        &mut spells,
        &mut world,
        CastRequest::new(SpellKind::SlowDown, EntityHandle::PLAYER, 3.0).with_target(victim),
    );
    let second = cast(
        &mut spells,
        &mut world,
        CastRequest::new(SpellKind::SlowDown, EntityHandle::PLAYER, 3.0).with_target(victim),
    );
    assert_eq!(second, CastOutcome::Vetoed);
    assert!(!spells.registry().contains(first));
    assert!(!spells.registry().is_affected(victim, SpellKind::SlowDown));

    let third = cast(
        &mut spells,
        &mut world,
        CastRequest::new(SpellKind::SlowDown, EntityHandle::PLAYER, 3.0).with_target(victim),
    );
    assert!(matches!(third, CastOutcome::Launched(_)));
}

#[test]
fn spells_are_reaped_exactly_at_their_duration() {
    let mut world = World::new();
    let mut spells = spells();
    let heal = launched(
        &mut spells,
        &mut world,
        CastRequest::new(SpellKind::Heal, EntityHandle::PLAYER, 1.0)
            .with_duration(Duration::from_millis(1000)),
    );

    let events = tick(&mut spells, &mut world, Duration::from_millis(999));
    assert!(spells.registry().contains(heal), "one millisecond left");
    assert!(events.iter().all(|event| !matches!(event, Event::SpellEnded { .. })));

    let events = tick(&mut spells, &mut world, Duration::from_millis(1));
    assert!(!spells.registry().contains(heal));
    assert!(events.contains(&Event::SpellEnded {
        spell: heal,
        kind: SpellKind::Heal,
        reason: EndReason::Expired,
    }));
}

/// Casts every kind on its own world, lets it run, cancels it and checks that
/// nothing it held is left behind.
fn cast_and_release_every_kind(config: &WorldConfig) {
    for kind in SpellKind::ALL {
        let mut world = World::with_config(config.clone());
        let mut spells = spells();
        let victim = npc(&mut world, Vec3::new(400.0, 0.0, 0.0));
        let spell = launched(
            &mut spells,
            &mut world,
            CastRequest::new(kind, EntityHandle::PLAYER, 2.0).with_target(victim),
        );
        for _ in 0..10 {
            let _ = tick(&mut spells, &mut world, Duration::from_millis(16));
        }
        let mut events = Vec::new();
        let _ = spells.end_spell(&mut world, spell, &mut events);
        for _ in 0..63 {
            let _ = tick(&mut spells, &mut world, Duration::from_millis(16));
        }

        assert!(!spells.registry().contains(spell), "{kind:?} still registered");
        assert!(spells.registry().is_empty(), "{kind:?} left spells behind");
        assert_eq!(query::owned_light_count(&world), 0, "{kind:?} kept a light");
        assert!(query::active_loops(&world).is_empty(), "{kind:?} kept a loop");
        assert_eq!(query::live_emitter_count(&world), 0, "{kind:?} kept an emitter");
        assert_eq!(query::damage_zone_count(&world), 0, "{kind:?} kept a damage zone");
    }
}

#[test]
fn every_kind_survives_exhausted_pools() {
    cast_and_release_every_kind(&WorldConfig {
        light_capacity: 0,
        sound_channels: 0,
        emitter_capacity: 0,
        damage_zone_capacity: 0,
        ..WorldConfig::default()
    });
}

#[test]
fn every_kind_gives_back_what_it_acquired() {
    cast_and_release_every_kind(&WorldConfig::default());
}

#[test]
fn heal_strength_falls_off_with_distance() {
    let mut world = World::new();
    let mut spells = spells();
    let close = npc(&mut world, Vec3::new(100.0, 0.0, 0.0));
    let edge = npc(&mut world, Vec3::new(0.0, 0.0, 299.0));
    let outside = npc(&mut world, Vec3::new(0.0, 0.0, 301.0));
    for handle in [close, edge, outside] {
        if let Some(entity) = world.entity_mut(handle) {
            entity.life.current = 10.0;
        }
    }

    let _ = launched(
        &mut spells,
        &mut world,
        CastRequest::new(SpellKind::Heal, EntityHandle::PLAYER, 2.0),
    );
    let _ = tick(&mut spells, &mut world, Duration::from_millis(1000));

    let life = |handle: EntityHandle| world.entity(handle).map(|entity| entity.life.current);
    let close_life = life(close).expect("close npc");
    let edge_life = life(edge).expect("edge npc");
    assert!(
        (11.0..=13.3).contains(&close_life),
        "close npc healed by the full falloff: {close_life}"
    );
    assert!(edge_life > 10.0 && edge_life < 10.1, "edge npc barely healed: {edge_life}");
    assert_eq!(life(outside), Some(10.0), "out of range");
}

#[test]
fn restored_field_matches_a_field_that_lived_through_the_offset() {
    let offset = Duration::from_millis(4000);

    let mut restored_world = World::new();
    let mut restored_spells = spells();
    let restored = launched(
        &mut restored_spells,
        &mut restored_world,
        CastRequest::new(SpellKind::CreateField, EntityHandle::PLAYER, 3.0).restore_at(offset),
    );

    let mut lived_world = World::new();
    let mut lived_spells = spells();
    let lived = launched(
        &mut lived_spells,
        &mut lived_world,
        CastRequest::new(SpellKind::CreateField, EntityHandle::PLAYER, 3.0),
    );
    for _ in 0..4000 {
        let mut events = Vec::new();
        lived_spells.tick(&mut lived_world, Duration::from_millis(1), &mut events);
    }

    let restored = restored_spells.registry().get(restored).expect("restored field");
    let lived = lived_spells.registry().get(lived).expect("lived field");
    assert_eq!(restored.state().remaining(), lived.state().remaining());
    assert_eq!(restored.state().elapsed(), offset);
    assert!(restored.spawned_entity().is_some());
    assert!(lived.spawned_entity().is_some());
    assert!(
        query::played_cues(&restored_world)
            .iter()
            .all(|played| played.cue != SoundId::CreateField),
        "restored casts stay silent"
    );
}

#[test]
fn full_registry_fizzles_the_cast() {
    let mut world = World::new();
    let mut spells = Spellcasting::new(&SpellcastingConfig {
        registry_capacity: 2,
        ..SpellcastingConfig::default()
    });
    let _ = launched(
        &mut spells,
        &mut world,
        CastRequest::new(SpellKind::Heal, EntityHandle::PLAYER, 1.0),
    );
    let _ = launched(
        &mut spells,
        &mut world,
        CastRequest::new(SpellKind::CreateFood, EntityHandle::PLAYER, 1.0),
    );

    let mut events = Vec::new();
    let result = spells.cast(
        &mut world,
        CastRequest::new(SpellKind::Fireball, EntityHandle::PLAYER, 1.0),
        &mut events,
    );
    assert_eq!(result, Err(CastError::RegistryFull { capacity: 2 }));
    assert!(events.contains(&Event::SpellFizzled {
        kind: SpellKind::Fireball,
        caster: EntityHandle::PLAYER,
    }));
    assert!(query::active_loops(&world).is_empty(), "nothing leaked by the fizzle");
}

#[test]
fn ending_a_spell_twice_is_harmless() {
    let mut world = World::new();
    let mut spells = spells();
    let armor = launched(
        &mut spells,
        &mut world,
        CastRequest::new(SpellKind::Armor, EntityHandle::PLAYER, 1.0),
    );
    let mut events = Vec::new();
    assert!(spells.end_spell(&mut world, armor, &mut events));
    assert!(!spells.end_spell(&mut world, armor, &mut events));
    let ended = events
        .iter()
        .filter(|event| matches!(event, Event::SpellEnded { .. }))
        .count();
    assert_eq!(ended, 1);
}

#[test]
fn player_upkeep_drains_mana() {
    let mut world = World::new();
    let mut spells = spells();
    let _ = launched(
        &mut spells,
        &mut world,
        CastRequest::new(SpellKind::Speed, EntityHandle::PLAYER, 1.0),
    );
    let _ = tick(&mut spells, &mut world, Duration::from_millis(1000));
    let mana = world
        .entity(EntityHandle::PLAYER)
        .map(|player| player.mana.current)
        .expect("player");
    assert!((mana - 98.0).abs() < 1e-3, "two mana per second: {mana}");
    assert_eq!(world.player().hunger, 50.0, "speed does not feed");
}
