use strata::*;

pub struct Position(pub [f32; 3]);
impl Component for Position {}

pub struct Rotation(pub [f32; 3]);
impl Component for Rotation {}

pub struct Velocity(pub [f32; 3]);
impl Component for Velocity {}

pub struct Benchmark;

impl Benchmark {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&mut self) {
        let manager = EntityManager::with_capacity(10_000);
        let mut builder = EntityBuilder::new();
        for _ in 0..10_000 {
            builder
                .set(Position([1.0, 0.0, 0.0]))
                .set(Rotation([1.0, 0.0, 0.0]))
                .set(Velocity([1.0, 0.0, 0.0]));

            manager.build(&mut builder);
        }
    }

    pub fn run_with_destroy(&mut self) {
        let manager = EntityManager::with_capacity(10_000);
        let entities: Vec<_> = (0..10_000)
            .map(|_| manager.build(EntityBuilder::new().set(Position([0.0; 3]))))
            .collect();

        for entity in entities {
            entity.dispose();
        }
    }
}
