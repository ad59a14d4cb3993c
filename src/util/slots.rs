use mio::Token;

/// Bits of a [`Token`] holding the slot index
const INDEX_BITS: u32 = 24;
const INDEX_MASK: usize = (1 << INDEX_BITS) - 1;
/// Generations never set the top bit, tokens with it set stay free for
/// listeners and the waker
const GENERATION_MASK: usize = (usize::MAX >> INDEX_BITS) >> 1;

/// Largest number of slots a table can hold
pub(crate) const SLOTS_MAX: usize = INDEX_MASK + 1;

/// Identity of a connection: slot index plus the generation of that slot
/// at allocation time
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub(crate) struct SlotId {
    index: usize,
    generation: usize,
}

impl SlotId {
    /// Poll token carrying this identity
    pub(crate) fn token(self) -> Token {
        Token((self.generation << INDEX_BITS) | self.index)
    }

    /// Identity carried by `token`, `None` for listener and waker tokens
    pub(crate) fn from_token(token: Token) -> Option<Self> {
        let generation = token.0 >> INDEX_BITS;
        (generation <= GENERATION_MASK).then_some(Self {
            index: token.0 & INDEX_MASK,
            generation,
        })
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.index, self.generation)
    }
}

#[derive(Debug)]
enum Entry<T> {
    Vacant,
    /// Value is stored in the table
    Parked(T),
    /// Value is lent out, the slot stays allocated
    InFlight,
}

#[derive(Debug)]
struct Slot<T> {
    generation: usize,
    entry: Entry<T>,
}

/// Fixed-capacity table of generation-checked slots.
///
/// A released slot bumps its generation, so every [`SlotId`] handed out
/// before stops matching.
#[derive(Debug)]
pub(crate) struct Slots<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
    capacity: usize,
}

impl<T> Slots<T> {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.min(SLOTS_MAX);
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            capacity,
        }
    }

    /// Number of allocated slots, parked and in flight
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Allocates a slot for the value built by `make`, `None` when full
    pub(crate) fn insert_with<F>(&mut self, make: F) -> Option<SlotId>
    where
        F: FnOnce(SlotId) -> T,
    {
        let index = if let Some(index) = self.free.pop() {
            index
        } else if self.slots.len() < self.capacity {
            self.slots.push(Slot {
                generation: 0,
                entry: Entry::Vacant,
            });
            self.slots.len() - 1
        } else {
            return None;
        };

        let slot = &mut self.slots[index];
        let id = SlotId {
            index,
            generation: slot.generation,
        };
        slot.entry = Entry::Parked(make(id));
        Some(id)
    }

    /// Lends the parked value out; the slot stays allocated
    pub(crate) fn take(&mut self, id: SlotId) -> Option<T> {
        let slot = self.slot_mut(id)?;
        match std::mem::replace(&mut slot.entry, Entry::InFlight) {
            Entry::Parked(value) => Some(value),
            other => {
                slot.entry = other;
                None
            }
        }
    }

    /// Stores a lent value back. Gives the value back if `id` is stale or not in flight.
    pub(crate) fn park(&mut self, id: SlotId, value: T) -> Result<(), T> {
        match self.slot_mut(id) {
            Some(slot) if matches!(slot.entry, Entry::InFlight) => {
                slot.entry = Entry::Parked(value);
                Ok(())
            }
            _ => Err(value),
        }
    }

    /// Frees the slot and returns a parked value
    pub(crate) fn release(&mut self, id: SlotId) -> Option<T> {
        let slot = self.slot_mut(id)?;
        let entry = std::mem::replace(&mut slot.entry, Entry::Vacant);
        slot.generation = (slot.generation + 1) & GENERATION_MASK;
        self.free.push(id.index);

        match entry {
            Entry::Parked(value) => Some(value),
            Entry::InFlight | Entry::Vacant => None,
        }
    }

    /// Frees every slot and returns the parked values
    pub(crate) fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        for index in 0..self.slots.len() {
            let slot = &self.slots[index];
            if matches!(slot.entry, Entry::Vacant) {
                continue;
            }
            let id = SlotId {
                index,
                generation: slot.generation,
            };
            values.extend(self.release(id));
        }
        values
    }

    fn slot_mut(&mut self, id: SlotId) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(id.index)
            .filter(|slot| slot.generation == id.generation && !matches!(slot.entry, Entry::Vacant))
    }
}

#[cfg(test)]
mod tests {
    use mio::Token;

    use super::{SlotId, Slots};

    #[test]
    fn insert_take_park_release_test() {
        let mut slots = Slots::with_capacity(2);
        let a = slots.insert_with(|_| "a").unwrap();
        let b = slots.insert_with(|_| "b").unwrap();
        assert!(slots.insert_with(|_| "c").is_none());
        assert_eq!(slots.len(), 2);

        assert_eq!(slots.take(a), Some("a"));
        assert_eq!(slots.take(a), None, "in flight values are lent only once");
        assert_eq!(slots.park(a, "a2"), Ok(()));
        assert_eq!(slots.park(b, "b2"), Err("b2"), "b is parked, not in flight");

        assert_eq!(slots.release(b), Some("b"));
        assert_eq!(slots.len(), 1);
        assert_eq!(slots.take(b), None, "stale id");
        assert_eq!(slots.release(b), None);

        let c = slots.insert_with(|_| "c").unwrap();
        assert_ne!(b, c);
        assert_eq!(slots.take(c), Some("c"));
        assert_eq!(slots.park(b, "stale"), Err("stale"));
    }

    #[test]
    fn insert_with_sees_its_id_test() {
        let mut slots = Slots::with_capacity(4);
        let id = slots.insert_with(|id| id).unwrap();
        assert_eq!(slots.take(id), Some(id));
    }

    #[test]
    fn token_round_trip_test() {
        let mut slots = Slots::with_capacity(1);
        let first = slots.insert_with(|_| ()).unwrap();
        let _ = slots.release(first);
        let second = slots.insert_with(|_| ()).unwrap();

        assert_ne!(first.token(), second.token());
        assert_eq!(SlotId::from_token(second.token()), Some(second));
        assert_eq!(SlotId::from_token(Token(usize::MAX)), None);
        assert_eq!(SlotId::from_token(Token(usize::MAX - 3)), None);
    }

    #[test]
    fn drain_test() {
        let mut slots = Slots::with_capacity(3);
        let a = slots.insert_with(|_| 1).unwrap();
        let _b = slots.insert_with(|_| 2).unwrap();
        let _c = slots.insert_with(|_| 3).unwrap();
        assert_eq!(slots.take(a), Some(1));

        let mut drained = slots.drain();
        drained.sort_unstable();
        assert_eq!(drained, vec![2, 3]);
        assert_eq!(slots.len(), 0);
    }
}
