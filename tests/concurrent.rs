use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use itertools::Itertools;
use strata::*;

#[derive(Debug, Clone, PartialEq)]
struct Transform(f32, f32);
impl Component for Transform {}

#[derive(Debug, Clone, PartialEq)]
struct Sprite(u32);
impl Component for Sprite {}

#[test]
fn reader_thread_during_mutation() {
    let manager = Arc::new(EntityManager::new());
    let done = Arc::new(AtomicBool::new(false));

    let renderer = thread::spawn({
        let manager = manager.clone();
        let done = done.clone();
        move || {
            let mut frames = 0;
            while !done.load(Ordering::Acquire) {
                for entity in manager.entities_with_all([key::<Transform>(), key::<Sprite>()]) {
                    // Reads are total, a concurrently destroyed entity yields None
                    let _ = entity.get::<Transform>();
                }
                frames += 1;
            }
            frames
        }
    });

    let mut live = Vec::new();
    for i in 0..500 {
        live.push(manager.build(
            EntityBuilder::new()
                .set(Transform(i as f32, 0.0))
                .set(Sprite(i)),
        ));

        if i % 3 == 0 {
            live.swap_remove(0).dispose();
        }
    }

    done.store(true, Ordering::Release);
    renderer.join().unwrap();

    assert_eq!(manager.iter().count(), live.len());
}

#[test]
fn concurrent_allocation_is_unique() {
    let manager = Arc::new(EntityManager::new());

    let ids = (0..4)
        .map(|_| {
            let manager = manager.clone();
            thread::spawn(move || {
                (0..250)
                    .map(|_| manager.build(EntityBuilder::new().set(Sprite(0))).id())
                    .collect_vec()
            })
        })
        .collect_vec()
        .into_iter()
        .flat_map(|v| v.join().unwrap())
        .collect_vec();

    assert_eq!(ids.len(), 1000);
    assert_eq!(ids.iter().unique().count(), 1000);
    assert_eq!(manager.len(), 1000);
}

#[test]
fn racing_singletons() {
    let manager = Arc::new(EntityManager::new());
    let urn: Urn = "engine:entities#player".parse().unwrap();

    let winners = (0..8)
        .map(|_| {
            let manager = manager.clone();
            let urn = urn.clone();
            thread::spawn(move || manager.build(EntityBuilder::new().single(urn)).exists())
        })
        .collect_vec()
        .into_iter()
        .map(|v| v.join().unwrap())
        .filter(|&v| v)
        .count();

    assert_eq!(winners, 1);
    assert_eq!(manager.len(), 1);
    assert!(!manager.get_single_entity(&urn).is_null());
}
