// Generation-checked object pool
//
// 1. Objects live in `Vec<Slot<T>>`, addressed by u32 index
// 2. Free list for slot reuse
// 3. Every removal bumps the slot generation; lookups compare generations,
//    so stale handles are detected rather than dangling

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

pub struct Pool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Pool<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Store `value`, returning its `(index, generation)` pair.
    pub fn insert(&mut self, value: T) -> (u32, u32) {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return (index, slot.generation);
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        (index, 0)
    }

    #[inline]
    pub fn get(&self, index: u32, generation: u32) -> Option<&T> {
        match self.slots.get(index as usize) {
            Some(slot) if slot.generation == generation => slot.value.as_ref(),
            _ => None,
        }
    }

    #[inline]
    pub fn get_mut(&mut self, index: u32, generation: u32) -> Option<&mut T> {
        match self.slots.get_mut(index as usize) {
            Some(slot) if slot.generation == generation => slot.value.as_mut(),
            _ => None,
        }
    }

    #[inline]
    pub fn contains(&self, index: u32, generation: u32) -> bool {
        self.get(index, generation).is_some()
    }

    /// Take the object out of its slot and retire the slot's generation.
    pub fn remove(&mut self, index: u32, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(index as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.live -= 1;
        Some(value)
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}

impl<T> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_and_get() {
        let mut pool = Pool::new();
        let (a, ga) = pool.insert("a");
        let (b, gb) = pool.insert("b");
        assert_ne!(a, b);
        assert_eq!(pool.get(a, ga), Some(&"a"));
        assert_eq!(pool.get(b, gb), Some(&"b"));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_removed_slot_is_stale() {
        let mut pool = Pool::new();
        let (a, ga) = pool.insert(1);
        assert_eq!(pool.remove(a, ga), Some(1));
        assert!(pool.get(a, ga).is_none());
        assert!(pool.remove(a, ga).is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_slot_reuse_bumps_generation() {
        let mut pool = Pool::new();
        let (a, ga) = pool.insert(1);
        pool.remove(a, ga);
        let (b, gb) = pool.insert(2);
        // Same slot, new generation: the old handle must not see the new value
        assert_eq!(a, b);
        assert_ne!(ga, gb);
        assert!(pool.get(a, ga).is_none());
        assert_eq!(pool.get(b, gb), Some(&2));
    }

    #[test]
    fn test_get_mut() {
        let mut pool = Pool::new();
        let (a, ga) = pool.insert(String::from("x"));
        if let Some(s) = pool.get_mut(a, ga) {
            s.push('y');
        }
        assert_eq!(pool.get(a, ga).map(String::as_str), Some("xy"));
    }
}
