use std::time::Duration;

use glam::Vec3;
use runecast_core::{
    from_millis, millis, services::SpellWorld, CastFlags, CastRequest, EntityHandle, LightHandle,
    SoundHandle, SpellKind,
};
use tracing::debug;

use crate::{
    context::SpellContext,
    kinds::{
        afflictions::{Confuse, DispellIllusion, Harm, LightningStrike, Paralyse},
        fields::{CreateField, DisarmTrap, FireField, IceField, RuneOfGuarding},
        projectiles::{Fireball, IceProjectile, PoisonProjectile},
        restoration::{CreateFood, CurePoison, Heal},
        summons::{FlyingEye, RiseDead},
        wards::{Armor, DetectTrap, Levitate, LowerArmor, RepelUndead, SlowDown, Speed, SustainedAura},
    },
};

/// Lifecycle hooks every spell kind implements.
///
/// `can_launch` may veto the cast before any resource is taken, `launch` runs
/// once on acceptance, `update` runs once per tick while the spell is alive,
/// and `end` runs exactly once whether the spell expired or was cancelled.
pub(crate) trait SpellBehavior {
    fn can_launch(&mut self, _state: &mut SpellState, _cx: &mut SpellContext<'_>) -> bool {
        true
    }

    fn launch(&mut self, state: &mut SpellState, cx: &mut SpellContext<'_>);

    fn update(&mut self, _state: &mut SpellState, _cx: &mut SpellContext<'_>, _dt: Duration) {}

    fn end(&mut self, _state: &mut SpellState, _cx: &mut SpellContext<'_>) {}

    fn position(&self, state: &SpellState) -> Vec3 {
        state.position
    }

    fn spawned_entity(&self) -> Option<EntityHandle> {
        None
    }
}

/// Runtime state shared by every spell kind.
#[derive(Clone, Debug)]
pub struct SpellState {
    pub(crate) kind: SpellKind,
    pub(crate) caster: EntityHandle,
    pub(crate) target: Option<EntityHandle>,
    pub(crate) level: f32,
    pub(crate) duration: Duration,
    pub(crate) elapsed: Duration,
    pub(crate) mana_per_second: f32,
    pub(crate) has_duration: bool,
    pub(crate) flags: CastFlags,
    pub(crate) launch_duration: Option<Duration>,
    pub(crate) restore_offset: Duration,
    pub(crate) caster_pos: Vec3,
    pub(crate) position: Vec3,
    pub(crate) targets: Vec<EntityHandle>,
    pub(crate) light: Option<LightHandle>,
    pub(crate) sound: Option<SoundHandle>,
}

impl SpellState {
    fn from_request(request: &CastRequest, caster_pos: Vec3) -> Self {
        Self {
            kind: request.kind,
            caster: request.caster,
            target: request.target,
            level: request.level,
            duration: Duration::ZERO,
            elapsed: Duration::ZERO,
            mana_per_second: 0.0,
            has_duration: true,
            flags: request.flags,
            launch_duration: request.launch_duration,
            restore_offset: request.restore_offset,
            caster_pos,
            position: caster_pos,
            targets: Vec::new(),
            light: None,
            sound: None,
        }
    }

    /// Kind of the spell.
    #[must_use]
    pub fn kind(&self) -> SpellKind {
        self.kind
    }

    /// Entity that cast the spell.
    #[must_use]
    pub fn caster(&self) -> EntityHandle {
        self.caster
    }

    /// Entity the spell is aimed at.
    #[must_use]
    pub fn target(&self) -> Option<EntityHandle> {
        self.target
    }

    /// Current potency.
    #[must_use]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Total lifespan.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Time spent alive so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Lifespan left before the driver reaps the spell.
    #[must_use]
    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.elapsed)
    }

    /// Mana drained from the caster every second.
    #[must_use]
    pub fn mana_per_second(&self) -> f32 {
        self.mana_per_second
    }

    /// Cast-time modifiers.
    #[must_use]
    pub fn flags(&self) -> CastFlags {
        self.flags
    }

    /// Caster position captured when the cast was requested.
    #[must_use]
    pub fn caster_pos(&self) -> Vec3 {
        self.caster_pos
    }

    /// Entities registered as affected by the spell.
    #[must_use]
    pub fn targets(&self) -> &[EntityHandle] {
        &self.targets
    }

    /// Main light held by the spell.
    #[must_use]
    pub fn light(&self) -> Option<LightHandle> {
        self.light
    }

    /// Main looped sound held by the spell.
    #[must_use]
    pub fn sound(&self) -> Option<SoundHandle> {
        self.sound
    }

    /// Reports whether the driver will reap the spell.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.elapsed >= self.duration
    }

    pub(crate) fn duration_or(&self, default_ms: u64) -> Duration {
        self.launch_duration
            .unwrap_or(Duration::from_millis(default_ms))
    }

    /// Requests reaping at the end of the current tick.
    pub(crate) fn terminate(&mut self) {
        self.duration = Duration::ZERO;
    }

    pub(crate) fn elapsed_ms(&self) -> f32 {
        millis(self.elapsed)
    }

    pub(crate) fn set_duration_ms(&mut self, value: f32) {
        self.duration = from_millis(value);
    }

    pub(crate) fn plays_sound(&self) -> bool {
        !self.flags.contains(CastFlags::NO_SOUND)
    }

    pub(crate) fn is_restoring(&self) -> bool {
        self.flags.contains(CastFlags::RESTORE)
    }

    pub(crate) fn caster_is_player(&self) -> bool {
        self.caster.is_player()
    }

    pub(crate) fn target_or_caster(&self) -> EntityHandle {
        self.target.unwrap_or(self.caster)
    }

    /// Forces player-cast spells onto the player.
    pub(crate) fn target_self_if_player(&mut self) {
        if self.caster_is_player() {
            self.target = Some(EntityHandle::PLAYER);
        }
    }

    pub(crate) fn add_target(&mut self, target: EntityHandle) {
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
    }
}

macro_rules! dispatch {
    ($behavior:expr, $spell:ident => $call:expr) => {
        match $behavior {
            Behavior::Heal($spell) => $call,
            Behavior::DetectTrap($spell) => $call,
            Behavior::Armor($spell) => $call,
            Behavior::LowerArmor($spell) => $call,
            Behavior::Harm($spell) => $call,
            Behavior::Speed($spell) => $call,
            Behavior::DispellIllusion($spell) => $call,
            Behavior::Fireball($spell) => $call,
            Behavior::CreateFood($spell) => $call,
            Behavior::IceProjectile($spell) => $call,
            Behavior::RuneOfGuarding($spell) => $call,
            Behavior::Levitate($spell) => $call,
            Behavior::CurePoison($spell) => $call,
            Behavior::RepelUndead($spell) => $call,
            Behavior::PoisonProjectile($spell) => $call,
            Behavior::RiseDead($spell) => $call,
            Behavior::Paralyse($spell) => $call,
            Behavior::CreateField($spell) => $call,
            Behavior::DisarmTrap($spell) => $call,
            Behavior::SlowDown($spell) => $call,
            Behavior::FlyingEye($spell) => $call,
            Behavior::FireField($spell) => $call,
            Behavior::IceField($spell) => $call,
            Behavior::LightningStrike($spell) => $call,
            Behavior::Confuse($spell) => $call,
            Behavior::SustainedAura($spell) => $call,
        }
    };
}

#[derive(Debug)]
pub(crate) enum Behavior {
    Heal(Heal),
    DetectTrap(DetectTrap),
    Armor(Armor),
    LowerArmor(LowerArmor),
    Harm(Harm),
    Speed(Speed),
    DispellIllusion(DispellIllusion),
    Fireball(Fireball),
    CreateFood(CreateFood),
    IceProjectile(IceProjectile),
    RuneOfGuarding(RuneOfGuarding),
    Levitate(Levitate),
    CurePoison(CurePoison),
    RepelUndead(RepelUndead),
    PoisonProjectile(PoisonProjectile),
    RiseDead(RiseDead),
    Paralyse(Paralyse),
    CreateField(CreateField),
    DisarmTrap(DisarmTrap),
    SlowDown(SlowDown),
    FlyingEye(FlyingEye),
    FireField(FireField),
    IceField(IceField),
    LightningStrike(LightningStrike),
    Confuse(Confuse),
    SustainedAura(SustainedAura),
}

impl Behavior {
    fn for_kind(kind: SpellKind) -> Self {
        match kind {
            SpellKind::Heal => Behavior::Heal(Heal::default()),
            SpellKind::DetectTrap => Behavior::DetectTrap(DetectTrap),
            SpellKind::Armor => Behavior::Armor(Armor),
            SpellKind::LowerArmor => Behavior::LowerArmor(LowerArmor::default()),
            SpellKind::Harm => Behavior::Harm(Harm::default()),
            SpellKind::Speed => Behavior::Speed(Speed::default()),
            SpellKind::DispellIllusion => Behavior::DispellIllusion(DispellIllusion),
            SpellKind::Fireball => Behavior::Fireball(Fireball::default()),
            SpellKind::CreateFood => Behavior::CreateFood(CreateFood::default()),
            SpellKind::IceProjectile => Behavior::IceProjectile(IceProjectile::default()),
            SpellKind::RuneOfGuarding => Behavior::RuneOfGuarding(RuneOfGuarding),
            SpellKind::Levitate => Behavior::Levitate(Levitate::default()),
            SpellKind::CurePoison => Behavior::CurePoison(CurePoison::default()),
            SpellKind::RepelUndead => Behavior::RepelUndead(RepelUndead::default()),
            SpellKind::PoisonProjectile => Behavior::PoisonProjectile(PoisonProjectile::default()),
            SpellKind::RiseDead => Behavior::RiseDead(RiseDead::default()),
            SpellKind::Paralyse => Behavior::Paralyse(Paralyse),
            SpellKind::CreateField => Behavior::CreateField(CreateField::default()),
            SpellKind::DisarmTrap => Behavior::DisarmTrap(DisarmTrap),
            SpellKind::SlowDown => Behavior::SlowDown(SlowDown),
            SpellKind::FlyingEye => Behavior::FlyingEye(FlyingEye::default()),
            SpellKind::FireField => Behavior::FireField(FireField::default()),
            SpellKind::IceField => Behavior::IceField(IceField::default()),
            SpellKind::LightningStrike => Behavior::LightningStrike(LightningStrike::default()),
            SpellKind::Confuse => Behavior::Confuse(Confuse),
            SpellKind::FireProtection
            | SpellKind::ColdProtection
            | SpellKind::Invisibility
            | SpellKind::LifeDrain
            | SpellKind::ManaDrain => Behavior::SustainedAura(SustainedAura),
        }
    }
}

/// One active cast: shared state plus the kind-specific behaviour.
#[derive(Debug)]
pub struct SpellInstance {
    state: SpellState,
    behavior: Behavior,
}

impl SpellInstance {
    pub(crate) fn new(request: &CastRequest, world: &dyn SpellWorld) -> Self {
        let caster_pos = world
            .entity(request.caster)
            .map(|entity| entity.pos)
            .unwrap_or(Vec3::ZERO);
        Self {
            state: SpellState::from_request(request, caster_pos),
            behavior: Behavior::for_kind(request.kind),
        }
    }

    /// Kind of the spell.
    #[must_use]
    pub fn kind(&self) -> SpellKind {
        self.state.kind
    }

    /// Shared runtime state.
    #[must_use]
    pub fn state(&self) -> &SpellState {
        &self.state
    }

    /// Current visual anchor.
    #[must_use]
    pub fn position(&self) -> Vec3 {
        dispatch!(&self.behavior, spell => spell.position(&self.state))
    }

    /// Entity spawned and still owned by the spell.
    #[must_use]
    pub fn spawned_entity(&self) -> Option<EntityHandle> {
        dispatch!(&self.behavior, spell => spell.spawned_entity())
    }

    pub(crate) fn state_mut(&mut self) -> &mut SpellState {
        &mut self.state
    }

    pub(crate) fn can_launch(&mut self, cx: &mut SpellContext<'_>) -> bool {
        if !cx.world.is_valid(self.state.caster) {
            return false;
        }
        dispatch!(&mut self.behavior, spell => spell.can_launch(&mut self.state, cx))
    }

    pub(crate) fn launch(&mut self, cx: &mut SpellContext<'_>) {
        if self.state.is_restoring() {
            self.state.elapsed = self.state.restore_offset;
        }
        dispatch!(&mut self.behavior, spell => spell.launch(&mut self.state, cx));
        debug!(
            kind = ?self.state.kind,
            caster = ?self.state.caster,
            duration_ms = self.state.duration.as_millis() as u64,
            "spell launched"
        );
    }

    pub(crate) fn update(&mut self, cx: &mut SpellContext<'_>, dt: Duration) {
        dispatch!(&mut self.behavior, spell => spell.update(&mut self.state, cx, dt));
    }

    pub(crate) fn end(&mut self, cx: &mut SpellContext<'_>) {
        dispatch!(&mut self.behavior, spell => spell.end(&mut self.state, cx));
        if let Some(light) = self.state.light.take() {
            cx.world.release_light(light);
        }
        if let Some(sound) = self.state.sound.take() {
            cx.world.stop_sound(sound);
        }
        self.state.targets.clear();
    }
}
