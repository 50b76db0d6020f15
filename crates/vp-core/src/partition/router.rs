use std::collections::HashMap;
use std::collections::hash_map::Entry;

use super::key::PartitionKey;

/// Maps partition keys to their virtual processors.
///
/// Processors are created lazily on first use and removed by [`retire`](Self::retire).
/// The router never lets one key reach another key's processor.
#[derive(Debug)]
pub struct VirtualProcessorRouter<P> {
    processors: HashMap<PartitionKey, P>,
    created_total: u64,
    retired_total: u64,
}

impl<P> Default for VirtualProcessorRouter<P> {
    fn default() -> Self {
        Self {
            processors: HashMap::new(),
            created_total: 0,
            retired_total: 0,
        }
    }
}

impl<P> VirtualProcessorRouter<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The processor for `key`, created with `make` if absent.
    pub fn resolve(&mut self, key: &PartitionKey, make: impl FnOnce(&PartitionKey) -> P) -> &mut P {
        match self.processors.entry(key.clone()) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                self.created_total += 1;
                let processor = make(key);
                e.insert(processor)
            }
        }
    }

    pub fn get(&self, key: &PartitionKey) -> Option<&P> {
        self.processors.get(key)
    }

    pub fn get_mut(&mut self, key: &PartitionKey) -> Option<&mut P> {
        self.processors.get_mut(key)
    }

    pub fn retire(&mut self, key: &PartitionKey) -> Option<P> {
        let removed = self.processors.remove(key);
        if removed.is_some() {
            self.retired_total += 1;
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PartitionKey, &P)> {
        self.processors.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&PartitionKey, &mut P)> {
        self.processors.iter_mut()
    }

    /// Remove and return every processor.
    pub fn drain(&mut self) -> impl Iterator<Item = (PartitionKey, P)> + '_ {
        self.processors.drain()
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    pub fn created_total(&self) -> u64 {
        self.created_total
    }

    pub fn retired_total(&self) -> u64 {
        self.retired_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_creates_once() {
        let mut router: VirtualProcessorRouter<Vec<i64>> = VirtualProcessorRouter::new();
        let a = PartitionKey::from("a");
        router.resolve(&a, |_| Vec::new()).push(1);
        router.resolve(&a, |_| panic!("must not recreate")).push(2);
        assert_eq!(router.get(&a), Some(&vec![1, 2]));
        assert_eq!(router.created_total(), 1);
    }

    #[test]
    fn keys_are_isolated() {
        let mut router: VirtualProcessorRouter<Vec<&str>> = VirtualProcessorRouter::new();
        let east = PartitionKey::from("east");
        let west = PartitionKey::from("west");
        router.resolve(&east, |_| Vec::new()).push("e1");
        router.resolve(&west, |_| Vec::new()).push("w1");
        router.resolve(&east, |_| Vec::new()).push("e2");
        assert_eq!(router.get(&east), Some(&vec!["e1", "e2"]));
        assert_eq!(router.get(&west), Some(&vec!["w1"]));
        assert_eq!(router.len(), 2);
    }

    #[test]
    fn retire_then_recreate_is_fresh() {
        let mut router: VirtualProcessorRouter<Vec<i64>> = VirtualProcessorRouter::new();
        let a = PartitionKey::from("a");
        router.resolve(&a, |_| vec![1]);
        assert_eq!(router.retire(&a), Some(vec![1]));
        assert!(router.retire(&a).is_none());
        assert!(router.is_empty());
        assert_eq!(router.resolve(&a, |_| Vec::new()).len(), 0);
        assert_eq!(router.created_total(), 2);
        assert_eq!(router.retired_total(), 1);
    }
}
