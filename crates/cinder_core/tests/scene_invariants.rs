//! Invariant checks over long pseudo-random sequences of structural changes.
//!
//! After every operation:
//! - every system's matching list is exactly the set of live entities whose
//!   mask covers its requirements
//! - `has_component` agrees with the lists of systems requiring that type
//! - handles destroyed earlier stay invalid, even once their slot is reused

use std::collections::HashSet;

use cinder_core::{Component, EcsResult, Entity, Scene, SceneConfig, System, SystemSetup};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Health(i32);
impl Component for Health {}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Armor(i32);
impl Component for Armor {}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Name(u64);
impl Component for Name {}

struct NeedsHealth;
impl System for NeedsHealth {
    fn setup(&mut self, setup: &mut SystemSetup<'_>) -> EcsResult<()> {
        setup.require_component::<Health>()
    }
}

struct NeedsArmor;
impl System for NeedsArmor {
    fn setup(&mut self, setup: &mut SystemSetup<'_>) -> EcsResult<()> {
        setup.require_component::<Armor>()
    }
}

struct NeedsBoth;
impl System for NeedsBoth {
    fn setup(&mut self, setup: &mut SystemSetup<'_>) -> EcsResult<()> {
        setup.require_component::<Health>()?;
        setup.require_component::<Armor>()
    }
}

/// Requires nothing, so it holds every live entity.
struct NeedsNothing;
impl System for NeedsNothing {}

/// Deterministic xorshift so failures reproduce.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, n: usize) -> usize {
        #[allow(clippy::cast_possible_truncation)]
        let value = (self.next() % n as u64) as usize;
        value
    }
}

fn check_matching<S: System>(scene: &Scene) {
    let required = scene.required_mask::<S>().unwrap();
    let listed: HashSet<Entity> = scene
        .matching_entities::<S>()
        .unwrap()
        .iter()
        .copied()
        .collect();
    let expected: HashSet<Entity> = scene
        .world()
        .entities()
        .iter_alive()
        .filter(|&(_, mask)| mask.contains_all(required))
        .map(|(entity, _)| entity)
        .collect();

    assert_eq!(
        listed.len(),
        scene.matching_entities::<S>().unwrap().len(),
        "duplicate entry in {}",
        std::any::type_name::<S>()
    );
    assert_eq!(listed, expected, "matching list of {}", std::any::type_name::<S>());
}

fn check_invariants(scene: &Scene, live: &[Entity], dead: &[Entity]) {
    check_matching::<NeedsHealth>(scene);
    check_matching::<NeedsArmor>(scene);
    check_matching::<NeedsBoth>(scene);
    check_matching::<NeedsNothing>(scene);

    let health_list = scene.matching_entities::<NeedsHealth>().unwrap();
    let armor_list = scene.matching_entities::<NeedsArmor>().unwrap();
    for &entity in live {
        assert!(scene.is_valid(entity));
        assert_eq!(scene.has_component::<Health>(entity), health_list.contains(&entity));
        assert_eq!(scene.has_component::<Armor>(entity), armor_list.contains(&entity));
    }
    for &entity in dead {
        assert!(!scene.is_valid(entity), "stale handle {entity} is valid again");
    }
    assert_eq!(scene.world().alive_count(), live.len());
}

fn run_sequence(seed: u64, steps: usize) {
    let mut scene = Scene::new(SceneConfig {
        initial_pool_size: 4,
        ..SceneConfig::default()
    }).unwrap();
    scene.add_system(NeedsHealth).unwrap();
    scene.add_system(NeedsArmor).unwrap();
    scene.add_system(NeedsBoth).unwrap();
    scene.add_system(NeedsNothing).unwrap();

    let mut rng = Rng(seed);
    let mut live: Vec<Entity> = Vec::new();
    let mut dead: Vec<Entity> = Vec::new();

    for step in 0..steps {
        if live.is_empty() || rng.below(5) == 0 {
            live.push(scene.create_entity().unwrap());
        } else {
            let pick = rng.below(live.len());
            let entity = live[pick];
            #[allow(clippy::cast_possible_truncation)]
            let value = step as i32;
            match rng.below(7) {
                0 => {
                    scene.destroy_entity(entity).unwrap();
                    dead.push(live.swap_remove(pick));
                }
                1 => {
                    let _ = scene.add_component(entity, Health(value));
                }
                2 => {
                    let _ = scene.add_component(entity, Armor(value));
                }
                3 => {
                    let _ = scene.add_component(entity, Name(step as u64));
                }
                4 => {
                    let _ = scene.remove_component::<Health>(entity);
                }
                5 => {
                    let _ = scene.remove_component::<Armor>(entity);
                }
                _ => scene.simulate(0.016).unwrap(),
            }
        }
        check_invariants(&scene, &live, &dead);
    }
}

#[test]
fn test_invariants_hold_across_random_sequences() {
    for seed in [0x9E37_79B9_7F4A_7C15, 0xDEAD_BEEF, 42, 7_777_777] {
        run_sequence(seed, 2_000);
    }
}

#[test]
fn test_component_values_survive_pool_growth() {
    let mut scene = Scene::new(SceneConfig {
        initial_pool_size: 1,
        ..SceneConfig::default()
    }).unwrap();

    let entities: Vec<Entity> = (0..300)
        .map(|n| {
            let entity = scene.create_entity().unwrap();
            scene.add_component(entity, Health(n)).unwrap();
            entity
        })
        .collect();

    for (n, &entity) in (0..).zip(&entities) {
        assert_eq!(scene.get_component::<Health>(entity), Ok(&Health(n)));
    }
}

#[test]
fn test_destroyed_handles_never_revalidate() {
    let mut scene = Scene::default();
    let mut dead = Vec::new();
    for _ in 0..50 {
        let entity = scene.create_entity().unwrap();
        scene.destroy_entity(entity).unwrap();
        dead.push(entity);
    }

    // All fifty handles share slot 0 with increasing generations.
    assert!(dead.iter().all(|entity| entity.index() == 0));
    let current = scene.create_entity().unwrap();
    assert_eq!(current.generation(), 50);
    assert!(dead.iter().all(|&entity| !scene.is_valid(entity)));
}
