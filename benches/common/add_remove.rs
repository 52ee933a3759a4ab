use strata::*;

pub struct A(pub f32);
impl Component for A {}

pub struct B(pub f32);
impl Component for B {}

pub struct Benchmark(EntityManager, Vec<EntityRef>);

impl Benchmark {
    pub fn new() -> Self {
        let manager = EntityManager::new();
        let entities = (0..10_000)
            .map(|_| manager.build(EntityBuilder::new().set(A(0.0))))
            .collect();

        Self(manager, entities)
    }

    pub fn run(&mut self) {
        for entity in &self.1 {
            entity.set(B(0.0)).unwrap();
        }

        for entity in &self.1 {
            entity.remove::<B>().unwrap();
        }
    }
}
