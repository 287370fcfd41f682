//! Collection of all traxels of a run, keyed by `(timestep, object id)`.
use crate::traxel::Traxel;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;

/// Serialized as a JSON array of traxels in `(timestep, id)` order.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(from = "Vec<Traxel>")]
pub struct TraxelStore {
    traxels: BTreeMap<(usize, u32), Traxel>,
}

impl TraxelStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a traxel, returning the one previously stored under its key.
    pub fn insert(&mut self, traxel: Traxel) -> Option<Traxel> {
        self.traxels.insert((traxel.timestep, traxel.id), traxel)
    }

    pub fn get(&self, timestep: usize, id: u32) -> Option<&Traxel> {
        self.traxels.get(&(timestep, id))
    }

    pub fn contains(&self, timestep: usize, id: u32) -> bool {
        self.traxels.contains_key(&(timestep, id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Traxel> {
        self.traxels.values()
    }

    /// Traxels of one timestep in id order.
    pub fn frame(&self, timestep: usize) -> impl Iterator<Item = &Traxel> {
        self.traxels
            .range((timestep, 0)..=(timestep, u32::MAX))
            .map(|(_, t)| t)
    }

    /// Distinct timesteps holding at least one traxel.
    pub fn timesteps(&self) -> Vec<usize> {
        let mut steps: Vec<usize> = self.traxels.keys().map(|(t, _)| *t).collect();
        steps.dedup();
        steps
    }

    pub fn len(&self) -> usize {
        self.traxels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traxels.is_empty()
    }
}

impl Extend<Traxel> for TraxelStore {
    fn extend<I: IntoIterator<Item = Traxel>>(&mut self, iter: I) {
        for traxel in iter {
            self.insert(traxel);
        }
    }
}

impl From<Vec<Traxel>> for TraxelStore {
    fn from(traxels: Vec<Traxel>) -> Self {
        let mut store = Self::new();
        store.extend(traxels);
        store
    }
}

impl Serialize for TraxelStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.traxels.values())
    }
}
