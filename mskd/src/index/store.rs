//! Indexed storage for features from multiple maps.
//!
//! Features from all ingested maps share one id space (ingestion order)
//! and one 2-d tree over their (rt, mz) coordinates. Payloads are held by
//! reference in one of two regimes fixed at construction time: shared
//! read-only borrows, or exclusive borrows that stay editable through the
//! store.

use crate::data::feature::FeatureLike;
use crate::index::error::IndexError;
use crate::index::kdtree::KdTree;

/// How a store holds its feature payloads. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadMode {
    /// Exclusive mutable references; payloads can be edited through the store.
    Exclusive,
    /// Shared immutable references; payloads are read-only through the store.
    Shared,
}

/// Reference to one ingested feature, in one of the two ownership regimes.
///
/// A store only ever holds slots of the variant matching its
/// [`PayloadMode`]; the two regimes are never mixed within one instance.
#[derive(Debug)]
pub enum PayloadSlot<'a, F> {
    Exclusive(&'a mut F),
    Shared(&'a F),
}

impl<'a, F> PayloadSlot<'a, F> {
    fn get(&self) -> &F {
        match self {
            PayloadSlot::Exclusive(f) => f,
            PayloadSlot::Shared(f) => f,
        }
    }
}

/// A set of feature maps together with a 2-d tree for fast rt/mz search.
///
/// Coordinates, intensity and charge are copied into flat columns at
/// ingestion; rt is the one column a transformation pass may rewrite
/// later, everything else is immutable for the life of the row. The tree
/// is rebuilt from the columns after every ingestion batch and after
/// every transformation pass, so queries always observe one consistent
/// coordinate snapshot.
pub struct FeatureMapIndex<'a, F: FeatureLike> {
    pub(crate) rt: Vec<f64>,
    pub(crate) mz: Vec<f64>,
    pub(crate) intensity: Vec<f32>,
    pub(crate) charge: Vec<i32>,
    pub(crate) map_index: Vec<usize>,
    pub(crate) tree: KdTree,
    payloads: Vec<PayloadSlot<'a, F>>,
    num_maps: usize,
    mode: PayloadMode,
}

impl<'a, F: FeatureLike> FeatureMapIndex<'a, F> {
    /// Empty store holding shared read-only payloads.
    pub fn new() -> Self {
        Self::with_mode(PayloadMode::Shared)
    }

    /// Empty store holding exclusively owned, editable payloads.
    pub fn new_exclusive() -> Self {
        Self::with_mode(PayloadMode::Exclusive)
    }

    fn with_mode(mode: PayloadMode) -> Self {
        FeatureMapIndex {
            rt: Vec::new(),
            mz: Vec::new(),
            intensity: Vec::new(),
            charge: Vec::new(),
            map_index: Vec::new(),
            tree: KdTree::default(),
            payloads: Vec::new(),
            num_maps: 0,
            mode,
        }
    }

    /// Ingest read-only maps and build the tree.
    pub fn from_maps<M: AsRef<[F]>>(maps: &'a [M]) -> Result<Self, IndexError> {
        let mut store = Self::new();
        store.add_maps(maps)?;
        Ok(store)
    }

    /// Ingest mutable maps and build the tree.
    pub fn from_maps_mut(maps: &'a mut [Vec<F>]) -> Result<Self, IndexError> {
        let mut store = Self::new_exclusive();
        store.add_maps_mut(maps)?;
        Ok(store)
    }

    /// Append one row per feature from `maps` (read-only payloads) and
    /// rebuild the tree. The outer position of each map becomes its map
    /// index.
    ///
    /// Fails with `OwnershipConflict` on a store fixed to exclusive
    /// payloads, and with `ShapeMismatch` when a follow-up batch does not
    /// present the same number of maps as the first one. Nothing is
    /// ingested on error.
    pub fn add_maps<M: AsRef<[F]>>(&mut self, maps: &'a [M]) -> Result<(), IndexError> {
        self.check_ingest(PayloadMode::Shared, maps.len())?;
        for (map_idx, map) in maps.iter().enumerate() {
            for feature in map.as_ref() {
                self.push_columns(map_idx, feature);
                self.payloads.push(PayloadSlot::Shared(feature));
            }
        }
        self.num_maps = maps.len();
        self.rebuild();
        Ok(())
    }

    /// Mutable-payload counterpart of [`add_maps`](Self::add_maps);
    /// requires a store constructed in exclusive mode.
    pub fn add_maps_mut(&mut self, maps: &'a mut [Vec<F>]) -> Result<(), IndexError> {
        let n_maps = maps.len();
        self.check_ingest(PayloadMode::Exclusive, n_maps)?;
        for (map_idx, map) in maps.iter_mut().enumerate() {
            for feature in map.iter_mut() {
                self.push_columns(map_idx, &*feature);
                self.payloads.push(PayloadSlot::Exclusive(feature));
            }
        }
        self.num_maps = n_maps;
        self.rebuild();
        Ok(())
    }

    fn check_ingest(&self, requested: PayloadMode, n_maps: usize) -> Result<(), IndexError> {
        if self.mode != requested {
            return Err(IndexError::OwnershipConflict {
                fixed: self.mode,
                requested,
            });
        }
        if self.num_maps != 0 && n_maps != self.num_maps {
            return Err(IndexError::ShapeMismatch {
                expected: self.num_maps,
                got: n_maps,
            });
        }
        Ok(())
    }

    fn push_columns(&mut self, map_idx: usize, feature: &F) {
        self.rt.push(feature.rt());
        self.mz.push(feature.mz());
        self.intensity.push(feature.intensity());
        self.charge.push(feature.charge());
        self.map_index.push(map_idx);
    }

    /// Rebuild the 2-d tree from the current coordinate columns,
    /// replacing the previous one wholesale.
    pub fn rebuild(&mut self) {
        self.tree = KdTree::build(&self.rt, &self.mz);
    }

    /// Drop all rows, maps and the tree. The payload mode stays fixed.
    pub fn clear(&mut self) {
        self.rt.clear();
        self.mz.clear();
        self.intensity.clear();
        self.charge.clear();
        self.map_index.clear();
        self.payloads.clear();
        self.num_maps = 0;
        self.tree = KdTree::default();
    }

    /// Number of stored features.
    pub fn size(&self) -> usize {
        self.rt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rt.is_empty()
    }

    /// Number of ingested maps (0 before the first batch and after a reset).
    pub fn num_maps(&self) -> usize {
        self.num_maps
    }

    /// Number of points in the tree.
    pub fn tree_size(&self) -> usize {
        self.tree.size()
    }

    /// The payload regime this store was constructed with.
    pub fn payload_mode(&self) -> PayloadMode {
        self.mode
    }

    pub(crate) fn check_id(&self, id: usize) -> Result<(), IndexError> {
        if id < self.size() {
            Ok(())
        } else {
            Err(IndexError::OutOfRange {
                id,
                size: self.size(),
            })
        }
    }

    /// Retention time of feature `id` (reflects applied transformations).
    pub fn rt(&self, id: usize) -> Result<f64, IndexError> {
        self.check_id(id)?;
        Ok(self.rt[id])
    }

    /// Mass-to-charge ratio of feature `id`.
    pub fn mz(&self, id: usize) -> Result<f64, IndexError> {
        self.check_id(id)?;
        Ok(self.mz[id])
    }

    /// Intensity of feature `id`.
    pub fn intensity(&self, id: usize) -> Result<f32, IndexError> {
        self.check_id(id)?;
        Ok(self.intensity[id])
    }

    /// Charge state of feature `id`.
    pub fn charge(&self, id: usize) -> Result<i32, IndexError> {
        self.check_id(id)?;
        Ok(self.charge[id])
    }

    /// Index of the map feature `id` was ingested from.
    pub fn map_index(&self, id: usize) -> Result<usize, IndexError> {
        self.check_id(id)?;
        Ok(self.map_index[id])
    }

    /// Read-only view of the payload behind feature `id`; available in
    /// both payload modes.
    pub fn feature(&self, id: usize) -> Result<&F, IndexError> {
        self.check_id(id)?;
        Ok(self.payloads[id].get())
    }

    /// Mutable view of the payload behind feature `id`.
    ///
    /// Fails with `ModeError` on a store holding shared payloads; no id
    /// ever yields a mutable reference there.
    pub fn feature_mut(&mut self, id: usize) -> Result<&mut F, IndexError> {
        if self.mode != PayloadMode::Exclusive {
            return Err(IndexError::ModeError);
        }
        self.check_id(id)?;
        match &mut self.payloads[id] {
            PayloadSlot::Exclusive(f) => Ok(f),
            PayloadSlot::Shared(_) => Err(IndexError::ModeError),
        }
    }
}

impl<'a, F: FeatureLike> Default for FeatureMapIndex<'a, F> {
    fn default() -> Self {
        Self::new()
    }
}
