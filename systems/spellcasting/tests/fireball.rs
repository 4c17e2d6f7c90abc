use std::time::Duration;

use glam::Vec3;
use runecast_core::{
    services::Entities, CastRequest, Command, DamageType, EndReason, Entity, EntityFlags,
    EntityHandle, Event, Pool, SoundId, SpellHandle, SpellKind,
};
use runecast_system_spellcasting::{CastOutcome, Spellcasting, SpellcastingConfig};
use runecast_world::{query, World};

const FRAME: Duration = Duration::from_millis(16);

fn hurl(world: &mut World, spells: &mut Spellcasting) -> SpellHandle {
    let mut events = Vec::new();
    let outcome = spells
        .cast(
            world,
            CastRequest::new(SpellKind::Fireball, EntityHandle::PLAYER, 5.0),
            &mut events,
        )
        .expect("registry has room");
    match outcome {
        CastOutcome::Launched(handle) => handle,
        CastOutcome::Vetoed => panic!("fireball has no guard"),
    }
}

fn frame(world: &mut World, spells: &mut Spellcasting) -> Vec<Event> {
    let mut events = Vec::new();
    runecast_world::apply(world, Command::Tick { dt: FRAME }, &mut events);
    spells
        .apply(world, Command::Tick { dt: FRAME }, &mut events)
        .expect("ticks never fail");
    events
}

fn ended(events: &[Event]) -> Option<EndReason> {
    events.iter().find_map(|event| match event {
        Event::SpellEnded { reason, .. } => Some(*reason),
        _ => None,
    })
}

#[test]
fn fireball_explodes_once_on_the_first_npc_in_its_path() {
    let mut world = World::new();
    let goblin = world
        .add_entity(Entity {
            template: "goblin".to_owned(),
            pos: Vec3::new(0.0, 0.0, 800.0),
            flags: EntityFlags::NPC | EntityFlags::IN_SCENE,
            life: Pool::full(100.0),
            height: -170.0,
            ..Entity::default()
        })
        .expect("entity slot");
    let mut spells = Spellcasting::new(&SpellcastingConfig::default());
    let _ = hurl(&mut world, &mut spells);

    let mut hit_frame = None;
    for frame_index in 1..=400 {
        let events = frame(&mut world, &mut spells);
        if let Some(reason) = ended(&events) {
            assert_eq!(reason, EndReason::Expired);
            hit_frame = Some(frame_index);
            break;
        }
    }

    // Held for 125 frames, then 95 frames of flight to close within reach.
    assert_eq!(hit_frame, Some(220));
    assert!(spells.registry().is_empty());

    let bursts = query::damage_bursts(&world);
    assert_eq!(bursts.len(), 1, "exactly one explosion");
    assert_eq!(bursts[0].radius, 150.0);
    assert_eq!(bursts[0].amount, 15.0);
    assert!(bursts[0].kind.contains(DamageType::FIRE | DamageType::MAGICAL));
    assert_eq!(query::explosions(&world).len(), 1);

    let life = world.entity(goblin).map(|entity| entity.life.current);
    assert_eq!(life, Some(85.0));
    let player_life = world
        .entity(EntityHandle::PLAYER)
        .map(|entity| entity.life.current);
    assert_eq!(player_life, Some(100.0), "the caster stays out of the blast");

    assert!(query::played_cues(&world)
        .iter()
        .any(|played| played.cue == SoundId::FireHit));
    assert_eq!(query::audible_notifications(&world).len(), 1);
    assert!(query::active_loops(&world).is_empty());
    assert_eq!(query::owned_light_count(&world), 0);
    assert_eq!(query::lingering_light_count(&world), 1);

    for _ in 0..32 {
        let _ = frame(&mut world, &mut spells);
    }
    assert_eq!(query::lingering_light_count(&world), 0, "afterglow fades");
}

#[test]
fn unobstructed_fireball_burns_out_after_six_seconds() {
    let mut world = World::new();
    let mut spells = Spellcasting::new(&SpellcastingConfig::default());
    let _ = hurl(&mut world, &mut spells);

    for _ in 0..374 {
        assert_eq!(ended(&frame(&mut world, &mut spells)), None);
    }
    assert_eq!(spells.registry().len(), 1);
    assert_eq!(query::active_loops(&world).len(), 1, "wind follows the ball");

    let events = frame(&mut world, &mut spells);
    assert_eq!(ended(&events), Some(EndReason::Expired));
    assert!(spells.registry().is_empty());
    assert!(query::damage_bursts(&world).is_empty());
    assert!(query::active_loops(&world).is_empty());
    assert_eq!(query::lingering_light_count(&world), 1);
}

#[test]
fn released_fireball_advances_by_its_velocity_each_frame() {
    let mut world = World::new();
    let mut spells = Spellcasting::new(&SpellcastingConfig::default());
    let ball = hurl(&mut world, &mut spells);
    let position = |spells: &Spellcasting| {
        spells
            .registry()
            .get(ball)
            .map(|instance| instance.position())
            .expect("ball still flying")
    };

    for _ in 0..129 {
        let _ = frame(&mut world, &mut spells);
    }
    // 100 units of motion scaled by 0.0045 per millisecond.
    let step = Vec3::Z * (100.0 * 16.0 * 0.0045);
    let mut previous = position(&spells);
    for _ in 0..4 {
        let _ = frame(&mut world, &mut spells);
        let current = position(&spells);
        let delta = current - previous;
        assert!(
            (delta - step).length() < 1e-3,
            "moved {delta:?} instead of {step:?}"
        );
        previous = current;
    }
}
