use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::models::Sample;

/// An immutable batch of samples. Cloning shares it.
pub type Batch = Arc<[Sample]>;

/// Latest batch of samples per metric name.
///
/// Batches are never edited in place: `replace` swaps in a new `Arc` under the write lock, so
/// a reader holds either the previous batch or the new one, never a mix. Readers only take the
/// read lock long enough to clone the `Arc`.
#[derive(Debug, Default)]
pub struct SampleStore {
    batches: RwLock<HashMap<String, Batch>>,
}

impl SampleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the batch for `name` with `samples`, returning the previous one.
    pub fn replace(&self, name: &str, samples: Vec<Sample>) -> Option<Batch> {
        let batch: Batch = samples.into();
        // A poisoned lock still holds a consistent map: the only write is a single insert.
        let mut batches = self.batches.write().unwrap_or_else(PoisonError::into_inner);
        batches.insert(name.to_string(), batch)
    }

    /// Current batch for `name`, or `None` if it was never written.
    pub fn snapshot(&self, name: &str) -> Option<Batch> {
        let batches = self.batches.read().unwrap_or_else(PoisonError::into_inner);
        batches.get(name).cloned()
    }

    /// Shallow copy of every batch.
    pub fn snapshot_all(&self) -> HashMap<String, Batch> {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.batches
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LabelSet;
    use std::thread;

    fn batch_of(len: usize, value: f64) -> Vec<Sample> {
        (0..len)
            .map(|i| {
                let mut labels = LabelSet::new();
                labels.insert("i".to_string(), i.to_string());
                Sample::new(value, labels)
            })
            .collect()
    }

    #[test]
    fn snapshot_of_unknown_metric_is_none() {
        let store = SampleStore::new();
        assert!(store.snapshot("missing").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn replace_swaps_the_whole_batch() {
        let store = SampleStore::new();
        assert!(store.replace("m", batch_of(3, 1.0)).is_none());

        let previous = store.replace("m", batch_of(1, 2.0)).expect("previous batch");
        assert_eq!(previous.len(), 3);

        let current = store.snapshot("m").unwrap();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].value, 2.0);
    }

    #[test]
    fn snapshot_all_is_detached_from_live_state() {
        let store = SampleStore::new();
        store.replace("a", batch_of(2, 1.0));

        let mut copy = store.snapshot_all();
        copy.remove("a");
        copy.insert("b".to_string(), batch_of(1, 1.0).into());

        store.replace("a", batch_of(5, 1.0));
        assert_eq!(store.snapshot("a").unwrap().len(), 5);
        assert!(store.snapshot("b").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn readers_never_see_a_torn_batch() {
        let store = Arc::new(SampleStore::new());
        store.replace("x", batch_of(10, 0.0));

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for round in 1..=500 {
                    let len = if round % 2 == 0 { 10 } else { 25 };
                    store.replace("x", batch_of(len, round as f64));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let batch = store.snapshot("x").expect("batch is always present");
                        assert!(batch.len() == 10 || batch.len() == 25);
                        let first = batch[0].value;
                        assert!(batch.iter().all(|s| s.value == first));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
