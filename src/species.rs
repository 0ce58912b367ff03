//! This module contains the registry of particle species discovered during a run.
use crate::core::{Particle, Real};
use crate::error::{Result, ScoreError};
use crate::grid::try_filled;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, TryReserveError};

/// Identifies a species: the grouped particle code together with a flag telling whether the
/// species is the primary particle.
///
/// A primary proton and a secondary proton are two different species.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SpeciesKey {
    grouped_code: i32,
    is_primary: bool,
}

impl SpeciesKey {
    /// Constructor.
    pub const fn new(grouped_code: i32, is_primary: bool) -> Self {
        Self {
            grouped_code,
            is_primary,
        }
    }

    /// Returns the particle code without its excitation level digit.
    pub const fn grouped_code(&self) -> i32 {
        self.grouped_code
    }

    /// Returns whether this is the primary species.
    pub const fn is_primary(&self) -> bool {
        self.is_primary
    }
}

/// Everything the output needs to know about a species.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SpeciesInfo {
    key: SpeciesKey,
    atomic_number: u32,
    mass_number: u32,
    name: String,
}

impl SpeciesInfo {
    /// Record the species `key` as seen first for `particle`.
    pub fn new(key: SpeciesKey, particle: &Particle) -> Self {
        Self {
            key,
            atomic_number: particle.atomic_number(),
            mass_number: particle.mass_number(),
            name: particle.display_name().to_string(),
        }
    }

    /// Returns the key of this species.
    pub const fn key(&self) -> SpeciesKey {
        self.key
    }

    /// Returns the atomic number $Z$.
    pub const fn atomic_number(&self) -> u32 {
        self.atomic_number
    }

    /// Returns the mass number $A$.
    pub const fn mass_number(&self) -> u32 {
        self.mass_number
    }

    /// Returns the name without excitation energy.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the column header of this species: its name, suffixed with `_1` for the primary.
    pub fn column_name(&self) -> String {
        if self.key.is_primary() {
            format!("{}_1", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Per-voxel storage of one species.
pub trait Tally: Sized {
    /// Allocate storage for `voxels` voxels with every cell set to zero.
    fn zeroed(voxels: usize) -> std::result::Result<Self, TryReserveError>;

    /// Add the contents of `other` element-wise.
    fn merge(&mut self, other: Self);
}

impl<T: Real> Tally for Vec<T> {
    fn zeroed(voxels: usize) -> std::result::Result<Self, TryReserveError> {
        try_filled(voxels, T::zero())
    }

    fn merge(&mut self, other: Self) {
        debug_assert_eq!(self.len(), other.len());
        self.iter_mut().zip(other).for_each(|(a, b)| *a += b);
    }
}

/// A species together with its storage.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct SpeciesEntry<E> {
    info: SpeciesInfo,
    cells: E,
}

impl<E> SpeciesEntry<E> {
    /// Returns the species description.
    pub const fn info(&self) -> &SpeciesInfo {
        &self.info
    }

    /// Returns the storage of this species.
    pub const fn cells(&self) -> &E {
        &self.cells
    }
}

#[derive(Deserialize)]
struct RegistryData<E> {
    voxels: usize,
    entries: Vec<SpeciesEntry<E>>,
}

impl<E> From<RegistryData<E>> for SpeciesRegistry<E> {
    fn from(data: RegistryData<E>) -> Self {
        let mut registry = Self {
            voxels: data.voxels,
            entries: data.entries,
            index: HashMap::new(),
        };
        registry.reindex();
        registry
    }
}

/// Ordered collection of the species seen so far, each owning storage of type `E`.
///
/// Species are kept in the order they were first seen until [`SpeciesRegistry::sort_by_nuclide`]
/// is called. Lookups go through a hash map keyed by [`SpeciesKey`].
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(
    from = "RegistryData<E>",
    bound(serialize = "E: Serialize", deserialize = "E: Deserialize<'de>")
)]
pub struct SpeciesRegistry<E> {
    voxels: usize,
    entries: Vec<SpeciesEntry<E>>,
    #[serde(skip_serializing)]
    index: HashMap<SpeciesKey, usize>,
}

impl<E> SpeciesRegistry<E> {
    /// Create an empty registry whose species store `voxels` cells each.
    pub fn new(voxels: usize) -> Self {
        Self {
            voxels,
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Returns the number of voxels stored per species.
    pub const fn voxels(&self) -> usize {
        self.voxels
    }

    /// Returns the number of species.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether no species has been seen yet.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the storage of the species `key`, if it has been seen.
    pub fn get(&self, key: SpeciesKey) -> Option<&E> {
        self.index.get(&key).map(|&l| &self.entries[l].cells)
    }

    /// Returns all species in their current order.
    pub fn entries(&self) -> &[SpeciesEntry<E>] {
        &self.entries
    }

    /// Iterate over the descriptions of all species in their current order.
    pub fn species(&self) -> impl Iterator<Item = &SpeciesInfo> {
        self.entries.iter().map(|entry| &entry.info)
    }

    /// Stable sort of the species by atomic number and, for equal atomic numbers, by mass number.
    pub fn sort_by_nuclide(&mut self) {
        self.entries.sort_by_key(|entry| {
            (entry.info.atomic_number, entry.info.mass_number)
        });
        self.reindex();
    }

    /// Convert the storage of every species with `f`, keeping order and keys.
    pub fn map_cells<F, U>(self, mut f: F) -> SpeciesRegistry<U>
    where
        F: FnMut(E) -> U,
    {
        SpeciesRegistry {
            voxels: self.voxels,
            entries: self
                .entries
                .into_iter()
                .map(|entry| SpeciesEntry {
                    info: entry.info,
                    cells: f(entry.cells),
                })
                .collect(),
            index: self.index,
        }
    }

    fn reindex(&mut self) {
        self.index = self
            .entries
            .iter()
            .enumerate()
            .map(|(l, entry)| (entry.info.key, l))
            .collect();
    }
}

impl<E: Tally> SpeciesRegistry<E> {
    /// Returns the storage of the species `key`, creating it for `particle` with all cells zero if
    /// it has not been seen before.
    ///
    /// If the storage cannot be allocated, [`ScoreError::OutOfMemory`] is returned and the
    /// registry is left unchanged.
    pub fn lookup(&mut self, key: SpeciesKey, particle: &Particle) -> Result<&mut E> {
        let l = match self.index.get(&key) {
            Some(&l) => l,
            None => {
                let cells = E::zeroed(self.voxels).map_err(|_| ScoreError::OutOfMemory {
                    species: particle.display_name().to_string(),
                    voxels: self.voxels,
                })?;
                let info = SpeciesInfo::new(key, particle);
                debug!("new species {} ({:?})", info.column_name(), key);

                self.entries.push(SpeciesEntry { info, cells });
                self.index.insert(key, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };

        Ok(&mut self.entries[l].cells)
    }

    /// Add every species of `other` into this registry, appending those not seen here yet.
    pub fn merge(&mut self, other: Self) {
        debug_assert_eq!(self.voxels, other.voxels);

        for entry in other.entries {
            match self.index.get(&entry.info.key) {
                Some(&l) => self.entries[l].cells.merge(entry.cells),
                None => {
                    self.index.insert(entry.info.key, self.entries.len());
                    self.entries.push(entry);
                }
            }
        }
    }
}
