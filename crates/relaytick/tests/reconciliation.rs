//! Producer spawns a replicated entity at tick 100 with a position and a
//! color. The authoritative transaction for that spawn is delayed and
//! doesn't reach the consumer until the consumer is already at tick 120.
//! The consumer must roll back to tick 100, apply the correction, and
//! resimulate forward through tick 120 so its final state matches what the
//! producer would show at its own tick 120, running the same deterministic
//! movement system throughout.

use relaytick::{
    Component, ComponentId, Domain, Entity, Query, ReplicationConfig, Session, SpawnComponent,
    SystemRunner, Transaction, TransactionOp, World,
};

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
struct Position {
    x: f32,
    y: f32,
}
impl Component for Position {
    fn type_name() -> &'static str {
        "Position"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
struct Color(u8);
impl Component for Color {
    fn type_name() -> &'static str {
        "Color"
    }
}

fn encode<T: Copy>(world: &World, component: ComponentId, value: T) -> Vec<u8> {
    let raw = unsafe { std::slice::from_raw_parts((&value as *const T).cast::<u8>(), std::mem::size_of::<T>()) };
    (world.components().meta(component).unwrap().encode_fn)(raw).unwrap()
}

fn movement_runner(position: ComponentId) -> SystemRunner {
    let mut runner = SystemRunner::new(1.0 / 60.0);
    runner.register(
        "move_east",
        Query::new().write(position),
        Box::new(move |ctx| {
            let matches = ctx.world.query(ctx.query).unwrap();
            for entity in matches.entities() {
                if let Some(p) = ctx.world.get::<Position>(entity).copied() {
                    ctx.world.set(entity, Position { x: p.x + 1.0, y: p.y }).unwrap();
                }
            }
        }),
    );
    runner
}

#[test]
fn consumer_resimulation_matches_producer_trajectory_after_late_correction() {
    // --- Producer: spawns E at tick 100 with Position(125,125), Color(0). ---
    let mut producer = World::new(Domain::PRODUCER);
    let position_id = producer.register::<Position>();
    let color_id = producer.register::<Color>();
    for _ in 0..100 {
        producer.advance_tick();
    }
    let entity = producer.spawn();
    producer.add(entity, Position { x: 125.0, y: 125.0 }).unwrap();
    producer.add(entity, Color(0)).unwrap();
    let position_payload = encode(&producer, position_id, Position { x: 125.0, y: 125.0 });
    let color_payload = encode(&producer, color_id, Color(0));

    // --- Consumer: jumps straight to tick 120 with nothing known yet. ---
    let mut consumer = Session::new(
        Domain(1),
        ReplicationConfig::new().with_checkpoint_interval(0).with_history_window(128),
    );
    consumer.world_mut().register::<Position>();
    consumer.world_mut().register::<Color>();
    // A tick-0 checkpoint is the only retained history; nothing was
    // simulated locally before the correction arrives, so this is the floor
    // rollback falls back to.
    consumer.checkpoint_now(&[]);
    for _ in 0..120 {
        consumer.world_mut().advance_tick();
    }

    let consumer_position_id = consumer.world().components().id_of::<Position>().unwrap();
    let mut runner = movement_runner(consumer_position_id);

    // The producer's authoritative tick-100 transaction, arriving late.
    let wire_entity = Entity::new(Domain::PRODUCER, entity.local());
    consumer.ingest_transaction(
        100,
        Transaction {
            domain_id: 0,
            seq: 0,
            ops: vec![TransactionOp::Spawn {
                entity: wire_entity,
                components: vec![
                    SpawnComponent { id: position_id, payload: Some(position_payload), relation: None },
                    SpawnComponent { id: color_id, payload: Some(color_payload), relation: None },
                ],
                causal_key: None,
            }],
        },
    );

    // Triggers rollback to the tick-0 checkpoint, then resimulates forward
    // through tick 120, applying the tick-100 spawn along the way.
    consumer.step(&mut runner).unwrap();

    let local = consumer
        .reconciler_mut()
        .ghosts_mut()
        .resolve(wire_entity, 100)
        .expect("ghost bound while applying the rolled-back spawn");

    assert_eq!(consumer.world().get::<Color>(local).copied(), Some(Color(0)));

    // `move_east` runs once for every tick from 100 (the tick the spawn
    // landed on) through 120 inclusive: 21 ticks, +1.0 each.
    let expected = Position { x: 125.0 + 21.0, y: 125.0 };
    assert_eq!(
        consumer.world().get::<Position>(local).copied(),
        Some(expected),
        "consumer position must match the producer's deterministic trajectory as of its own tick 120"
    );
}
