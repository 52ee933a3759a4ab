use super::{Entity, EntityGen, EntityIndex};
use crate::{error::Result, Error};

pub(crate) const DEFAULT_GEN: EntityGen = 1;

struct Slot {
    // even = dead, odd = alive
    gen: u64,
}

impl Slot {
    fn is_alive(&self) -> bool {
        self.gen & 1 == 1
    }

    fn make_alive(&mut self) -> EntityGen {
        debug_assert!(!self.is_alive());
        self.gen += 1;
        from_slot_gen(self.gen)
    }

    fn make_dead(&mut self) {
        debug_assert!(self.is_alive());
        // Since the slot is alive, the gen is odd, adding one makes it even
        self.gen += 1;
    }

    /// Returns true if the slot can not be revived without exceeding
    /// [`EntityGen::MAX`]
    fn is_exhausted(&self) -> bool {
        debug_assert!(!self.is_alive());
        // A dead slot revives as `(gen >> 1)`
        self.gen >> 1 > u64::from(EntityGen::MAX)
    }
}

fn to_slot_gen(gen: EntityGen) -> u64 {
    (u64::from(gen) << 1) | 1
}

fn from_slot_gen(gen: u64) -> EntityGen {
    (gen >> 1) as EntityGen
}

/// Dense arena of entity slots indexed by [`Entity::index`].
///
/// Freed indices are recycled with a bumped generation, so an id which was
/// despawned is never handed out again. An index whose generation reached
/// [`EntityGen::MAX`] is retired instead of recycled.
pub(crate) struct EntityStore {
    slots: Vec<Slot>,
    free: Vec<EntityIndex>,
    len: usize,
}

impl core::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityStore")
            .field("len", &self.len)
            .field("free", &self.free.len())
            .finish()
    }
}

impl EntityStore {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(cap: usize) -> Self {
        let mut slots = Vec::with_capacity(cap + 1);
        // Index 0 is never valid
        slots.push(Slot { gen: 0 });

        Self {
            slots,
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn spawn(&mut self) -> Entity {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            let gen = slot.make_alive();
            self.len += 1;
            Entity::from_parts(index, gen)
        } else {
            let index = self.slots.len();
            assert!(index < u32::MAX as usize, "Entity index space exhausted");

            self.slots.push(Slot {
                gen: to_slot_gen(DEFAULT_GEN),
            });

            self.len += 1;
            Entity::from_parts(index as EntityIndex, DEFAULT_GEN)
        }
    }

    /// Revives an already minted id.
    ///
    /// Fails if the index was never allocated, is currently occupied, or if
    /// `id` is older than the slot's last despawned generation.
    pub fn spawn_at(&mut self, id: Entity) -> Result<()> {
        if !self.is_minted(id) {
            return Err(Error::IdUnavailable(id));
        }

        let index = id.index();
        let slot = &mut self.slots[index as usize];
        if slot.is_alive() {
            return Err(Error::EntityOccupied(Entity::from_parts(
                index,
                from_slot_gen(slot.gen),
            )));
        }

        if to_slot_gen(id.gen()) <= slot.gen {
            return Err(Error::IdUnavailable(id));
        }

        slot.gen = to_slot_gen(id.gen());
        if let Some(pos) = self.free.iter().position(|&v| v == index) {
            self.free.swap_remove(pos);
        }

        self.len += 1;
        Ok(())
    }

    pub fn despawn(&mut self, id: Entity) -> Result<()> {
        if !self.is_alive(id) {
            return Err(Error::NoSuchEntity(id));
        }

        let index = id.index();
        let slot = &mut self.slots[index as usize];
        slot.make_dead();
        if slot.is_exhausted() {
            tracing::debug!(%id, "retiring exhausted entity slot");
        } else {
            self.free.push(index);
        }
        self.len -= 1;

        Ok(())
    }

    #[inline]
    fn slot(&self, index: EntityIndex) -> Option<&Slot> {
        if index == 0 {
            return None;
        }

        self.slots.get(index as usize)
    }

    #[inline]
    pub fn is_alive(&self, id: Entity) -> bool {
        !id.is_null()
            && self
                .slot(id.index())
                .filter(|v| v.is_alive() && v.gen == to_slot_gen(id.gen()))
                .is_some()
    }

    /// Returns true if the index of `id` has ever been handed out
    #[inline]
    pub fn is_minted(&self, id: Entity) -> bool {
        !id.is_null() && self.slot(id.index()).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn iter(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, slot)| slot.is_alive())
            .map(|(index, slot)| Entity::from_parts(index as EntityIndex, from_slot_gen(slot.gen)))
    }
}

impl Default for EntityStore {
    fn default() -> Self {
        Self::new()
    }
}
