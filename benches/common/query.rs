use strata::*;

pub struct Position(pub f32);
impl Component for Position {}

pub struct Velocity(pub f32);
impl Component for Velocity {}

pub struct Frozen;
impl Component for Frozen {}

pub struct Benchmark(Group);

impl Benchmark {
    pub fn new() -> Self {
        let pool = EntityPool::with_capacity(10_000);
        for i in 0..10_000 {
            let mut builder = EntityBuilder::new();
            builder.set(Position(0.0)).set(Velocity(1.0));
            if i % 4 == 0 {
                builder.set(Frozen);
            }

            builder.build(&pool);
        }

        let group = GroupBuilder::new()
            .with::<Position>()
            .with::<Velocity>()
            .without::<Frozen>()
            .build(pool);

        Self(group)
    }

    pub fn run(&mut self) -> usize {
        self.0.iter().count()
    }

    pub fn run_update(&mut self) {
        for entity in &self.0 {
            let Some(vel) = entity.get::<Velocity>() else {
                continue;
            };

            entity.set(Position(vel.0)).unwrap();
        }
    }
}
