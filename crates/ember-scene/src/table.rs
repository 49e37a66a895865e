//! Dense, ID-indexed entity storage.
//!
//! A [`PackedLookupTable`] keeps its values contiguous for iteration while
//! handing out stable, generation-checked keys. Removing an entry compacts
//! the dense array and never lets the removed key resolve again, even if
//! its slot is later reused.

use std::ops::{Index, IndexMut};

use slotmap::{Key, SlotMap};

use crate::error::{Result, SceneError};

slotmap::new_key_type! {
    /// Key of a [`crate::DirectionalLight`].
    pub struct DirectionalLightId;
    /// Key of a [`crate::PointLight`].
    pub struct PointLightId;
    /// Key of a [`crate::MeshInstance`].
    pub struct MeshInstanceId;
    /// Key of a [`crate::LightProbe`].
    pub struct LightProbeId;
    /// Key of a [`crate::Mesh`] in a [`crate::ResourcePool`].
    pub struct MeshId;
    /// Key of a [`crate::SubMesh`] within its mesh.
    pub struct SubMeshId;
}

/// Dense storage with stable keys. Iteration follows insertion order of the
/// live entries.
#[derive(Debug, Clone)]
pub struct PackedLookupTable<K: Key, T> {
    slots: SlotMap<K, usize>,
    keys: Vec<K>,
    values: Vec<T>,
}

impl<K: Key, T> PackedLookupTable<K, T> {
    /// Empty table.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Empty table with room for `capacity` entries before reallocating.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: SlotMap::with_capacity_and_key(capacity),
            keys: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
        }
    }

    /// Store `value` and return its key.
    pub fn insert(&mut self, value: T) -> K {
        let key = self.slots.insert(self.values.len());
        self.keys.push(key);
        self.values.push(value);
        key
    }

    /// Remove and return the value for `key`.
    ///
    /// Later entries shift down one slot, so relative order is kept.
    pub fn remove(&mut self, key: K) -> Result<T> {
        let slot = self.slots.remove(key).ok_or_else(invalid_id::<K>)?;
        self.keys.remove(slot);
        let value = self.values.remove(slot);
        for later in &self.keys[slot..] {
            if let Some(s) = self.slots.get_mut(*later) {
                *s -= 1;
            }
        }
        Ok(value)
    }

    /// Value for `key`, or [`SceneError::InvalidId`].
    pub fn get(&self, key: K) -> Result<&T> {
        let slot = *self.slots.get(key).ok_or_else(invalid_id::<K>)?;
        Ok(&self.values[slot])
    }

    /// Mutable value for `key`, or [`SceneError::InvalidId`].
    pub fn get_mut(&mut self, key: K) -> Result<&mut T> {
        let slot = *self.slots.get(key).ok_or_else(invalid_id::<K>)?;
        Ok(&mut self.values[slot])
    }

    /// True if `key` refers to a live entry.
    pub fn contains(&self, key: K) -> bool {
        self.slots.contains_key(key)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if there are no live entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(key, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> {
        self.keys.iter().copied().zip(self.values.iter())
    }

    /// `(key, value)` pairs in insertion order, values mutable.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (K, &mut T)> {
        self.keys.iter().copied().zip(self.values.iter_mut())
    }

    /// Live keys in insertion order.
    pub fn ids(&self) -> &[K] {
        &self.keys
    }

    /// Live values in insertion order.
    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Remove every entry. Previously issued keys stay invalid.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.keys.clear();
        self.values.clear();
    }
}

impl<K: Key, T> Default for PackedLookupTable<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Key, T> Index<K> for PackedLookupTable<K, T> {
    type Output = T;

    /// Panics on a stale key; use [`PackedLookupTable::get`] to handle it.
    fn index(&self, key: K) -> &T {
        match self.get(key) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }
}

impl<K: Key, T> IndexMut<K> for PackedLookupTable<K, T> {
    fn index_mut(&mut self, key: K) -> &mut T {
        match self.get_mut(key) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }
}

fn invalid_id<K>() -> SceneError {
    let name = std::any::type_name::<K>();
    SceneError::InvalidId {
        table: name.rsplit("::").next().unwrap_or(name),
    }
}
