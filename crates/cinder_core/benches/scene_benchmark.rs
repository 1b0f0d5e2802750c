//! # Scene Benchmark
//!
//! Measures the per-tick paths a game hits every frame:
//! - structural churn (create, add, destroy)
//! - a movement system over its matching list
//! - message posting and polling
//!
//! Run with: `cargo bench --package cinder_core`

// Benchmarks don't need docs
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cinder_core::{
    Component, EcsResult, MessageId, Scene, SceneConfig, System, SystemContext, SystemSetup,
};

#[derive(Clone, Copy, Default)]
struct Position([f32; 3]);
impl Component for Position {}

#[derive(Clone, Copy, Default)]
struct Velocity([f32; 3]);
impl Component for Velocity {}

struct Movement;

impl System for Movement {
    fn setup(&mut self, setup: &mut SystemSetup<'_>) -> EcsResult<()> {
        setup.require_component::<Position>()?;
        setup.require_component::<Velocity>()
    }

    fn process(&mut self, ctx: &mut SystemContext<'_>, dt: f32) -> EcsResult<()> {
        for &entity in ctx.entities() {
            let velocity = ctx.get::<Velocity>(entity)?.0;
            let position = &mut ctx.get_mut::<Position>(entity)?.0;
            for axis in 0..3 {
                position[axis] += velocity[axis] * dt;
            }
        }
        Ok(())
    }
}

const PING: MessageId = MessageId(1);

/// Posts `count` messages per tick.
struct Chatter(u32);

impl System for Chatter {
    fn process(&mut self, ctx: &mut SystemContext<'_>, _dt: f32) -> EcsResult<()> {
        for n in 0..self.0 {
            *ctx.post::<[f32; 4]>(PING) = [n as f32; 4];
        }
        Ok(())
    }
}

/// Reads everything posted.
#[derive(Default)]
struct Reader(f32);

impl System for Reader {
    fn handle_message(
        &mut self,
        message: &cinder_core::Message<'_>,
        _ctx: &mut SystemContext<'_>,
    ) -> EcsResult<()> {
        if let Some(data) = message.data::<[f32; 4]>() {
            self.0 += data[0];
        }
        Ok(())
    }
}

fn populated_scene(count: u32) -> Scene {
    let mut scene = Scene::new(SceneConfig {
        initial_pool_size: count as usize,
        ..SceneConfig::default()
    }).expect("valid config");
    scene.add_system(Movement).expect("attach movement");
    for i in 0..count {
        let entity = scene.create_entity().expect("create");
        let f = i as f32;
        scene.add_component(entity, Position([f, f, f])).expect("position");
        scene.add_component(entity, Velocity([0.1, 0.2, 0.3])).expect("velocity");
    }
    scene
}

/// Benchmark: create, attach two components and destroy.
fn bench_structural_churn(c: &mut Criterion) {
    let mut group = c.benchmark_group("structural_churn");

    for count in [1_000u32, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            let mut scene = populated_scene(0);
            b.iter(|| {
                let mut spawned = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let entity = scene.create_entity().expect("create");
                    scene.add_component(entity, Position::default()).expect("position");
                    scene.add_component(entity, Velocity::default()).expect("velocity");
                    spawned.push(entity);
                }
                for entity in spawned {
                    scene.destroy_entity(entity).expect("destroy");
                }
                black_box(scene.world().alive_count())
            });
        });
    }

    group.finish();
}

/// Benchmark: one tick of the movement system.
fn bench_movement_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("movement_tick");

    for count in [10_000u32, 100_000] {
        let mut scene = populated_scene(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| scene.simulate(black_box(1.0 / 60.0)).expect("tick"));
        });
    }

    group.finish();
}

/// Benchmark: post and poll messages through the bus.
fn bench_messages(c: &mut Criterion) {
    let mut scene = Scene::new(SceneConfig {
        message_arena_words: 4096,
        ..SceneConfig::default()
    }).expect("valid config");
    scene.add_system(Chatter(500)).expect("attach chatter");
    scene.add_system(Reader::default()).expect("attach reader");

    c.bench_function("messages_500_per_tick", |b| {
        b.iter(|| scene.simulate(1.0 / 60.0).expect("tick"));
    });
    black_box(scene.system::<Reader>().map(|reader| reader.0));
}

criterion_group!(
    benches,
    bench_structural_churn,
    bench_movement_tick,
    bench_messages
);
criterion_main!(benches);
