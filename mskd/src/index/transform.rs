use itertools::Itertools;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::feature::FeatureLike;
use crate::index::error::IndexError;
use crate::index::store::FeatureMapIndex;

/// One rt-correction curve, evaluated pointwise.
///
/// The index never fits these itself; an alignment step supplies one
/// model per map and the applier only calls `evaluate`. Implementations
/// must be pure from the index's perspective.
pub trait CorrectionModel: Sync {
    /// Corrected retention time for `rt`.
    fn evaluate(&self, rt: f64) -> f64;
}

impl<M: CorrectionModel + ?Sized> CorrectionModel for Box<M> {
    fn evaluate(&self, rt: f64) -> f64 {
        (**self).evaluate(rt)
    }
}

impl<M: CorrectionModel + ?Sized> CorrectionModel for &M {
    fn evaluate(&self, rt: f64) -> f64 {
        (**self).evaluate(rt)
    }
}

/// Affine rt correction `rt * slope + intercept`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LinearCorrection {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearCorrection {
    pub fn new(slope: f64, intercept: f64) -> Self {
        LinearCorrection { slope, intercept }
    }

    /// The do-nothing correction.
    pub fn identity() -> Self {
        LinearCorrection {
            slope: 1.0,
            intercept: 0.0,
        }
    }
}

impl CorrectionModel for LinearCorrection {
    fn evaluate(&self, rt: f64) -> f64 {
        self.slope * rt + self.intercept
    }
}

/// Piecewise-linear rt correction through `(observed, corrected)` support
/// points, e.g. the sampled curve of a lowess fit.
///
/// Between two neighboring support points the correction interpolates
/// linearly; beyond the first or last point it extrapolates with the
/// slope of the nearest segment. With no support points it is the
/// identity, with a single one a constant shift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PiecewiseLinearCorrection {
    knots: Vec<(f64, f64)>,
}

impl PiecewiseLinearCorrection {
    /// Sorts the support points by observed rt and keeps the first of
    /// any run sharing the same observed rt.
    pub fn new(knots: Vec<(f64, f64)>) -> Self {
        let knots = knots
            .into_iter()
            .sorted_by_key(|&(x, _)| OrderedFloat(x))
            .dedup_by(|a, b| a.0 == b.0)
            .collect();
        PiecewiseLinearCorrection { knots }
    }

    pub fn len(&self) -> usize {
        self.knots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.knots.is_empty()
    }
}

impl CorrectionModel for PiecewiseLinearCorrection {
    fn evaluate(&self, rt: f64) -> f64 {
        match self.knots.len() {
            0 => rt,
            1 => rt + (self.knots[0].1 - self.knots[0].0),
            n => {
                // index of the segment end: first knot at or past rt,
                // clamped so the edge segments also serve extrapolation
                let hi = self
                    .knots
                    .partition_point(|&(x, _)| x < rt)
                    .clamp(1, n - 1);
                let (x0, y0) = self.knots[hi - 1];
                let (x1, y1) = self.knots[hi];
                let t = (rt - x0) / (x1 - x0);
                y0 + t * (y1 - y0)
            }
        }
    }
}

impl<'a, F: FeatureLike> FeatureMapIndex<'a, F> {
    /// Rewrite every feature's rt through its map's correction model,
    /// then rebuild the tree.
    ///
    /// `models` must hold exactly one model per map, in map-index order;
    /// on a length mismatch nothing is mutated. The rebuild happens
    /// before this returns, so no query can observe rewritten
    /// coordinates through a stale tree.
    pub fn apply_transformations<M: CorrectionModel>(
        &mut self,
        models: &[M],
    ) -> Result<(), IndexError> {
        if models.len() != self.num_maps() {
            return Err(IndexError::ShapeMismatch {
                expected: self.num_maps(),
                got: models.len(),
            });
        }
        self.rt
            .par_iter_mut()
            .zip(self.map_index.par_iter())
            .for_each(|(rt, &map_idx)| *rt = models[map_idx].evaluate(*rt));
        self.rebuild();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::feature::Feature;

    fn two_maps() -> Vec<Vec<Feature>> {
        vec![
            vec![
                Feature::new(10.0, 500.0, 100.0, 2),
                Feature::new(20.0, 600.0, 50.0, 1),
            ],
            vec![Feature::new(10.3, 501.5, 80.0, 2)],
        ]
    }

    #[test]
    fn test_identity_models_change_nothing() {
        let maps = two_maps();
        let mut store = FeatureMapIndex::from_maps(&maps).unwrap();

        let rts_before: Vec<f64> = (0..store.size()).map(|i| store.rt(i).unwrap()).collect();
        let mut hood_before = store.neighborhood(0, 0.5, 2.0, false, false, -1.0).unwrap();
        hood_before.sort_unstable();

        store
            .apply_transformations(&vec![LinearCorrection::identity(); 2])
            .unwrap();

        let rts_after: Vec<f64> = (0..store.size()).map(|i| store.rt(i).unwrap()).collect();
        let mut hood_after = store.neighborhood(0, 0.5, 2.0, false, false, -1.0).unwrap();
        hood_after.sort_unstable();

        assert_eq!(rts_before, rts_after);
        assert_eq!(hood_before, hood_after);
    }

    #[test]
    fn test_shape_mismatch_leaves_coordinates_untouched() {
        let maps = two_maps();
        let mut store = FeatureMapIndex::from_maps(&maps).unwrap();
        let err = store
            .apply_transformations(&[LinearCorrection::identity()])
            .unwrap_err();
        assert_eq!(err, IndexError::ShapeMismatch { expected: 2, got: 1 });
        assert_eq!(store.rt(0).unwrap(), 10.0);
        assert_eq!(store.rt(2).unwrap(), 10.3);
    }

    #[test]
    fn test_per_map_shift_and_rebuild() {
        let maps = two_maps();
        let mut store = FeatureMapIndex::from_maps(&maps).unwrap();

        // map 0 shifted by +5 s, map 1 untouched
        let models = vec![LinearCorrection::new(1.0, 5.0), LinearCorrection::identity()];
        store.apply_transformations(&models).unwrap();

        assert_eq!(store.rt(0).unwrap(), 15.0);
        assert_eq!(store.rt(1).unwrap(), 25.0);
        assert_eq!(store.rt(2).unwrap(), 10.3);
        // mz is never transformed
        assert_eq!(store.mz(0).unwrap(), 500.0);

        // queries run against the rebuilt tree
        assert_eq!(store.query_region(14.5, 15.5, 499.0, 501.0, None), vec![0]);
        assert!(store
            .neighborhood(0, 0.5, 2.0, false, false, -1.0)
            .unwrap()
            .is_empty());
        assert_eq!(
            store.neighborhood(2, 5.0, 2.0, false, false, -1.0).unwrap(),
            vec![0]
        );
    }

    #[test]
    fn test_piecewise_interpolates_and_extrapolates() {
        // unsorted input with a duplicate observed rt
        let model = PiecewiseLinearCorrection::new(vec![
            (20.0, 25.0),
            (0.0, 0.0),
            (10.0, 20.0),
            (10.0, 999.0),
        ]);
        assert_eq!(model.len(), 3);

        assert_eq!(model.evaluate(0.0), 0.0);
        assert_eq!(model.evaluate(5.0), 10.0);
        assert_eq!(model.evaluate(10.0), 20.0);
        assert_eq!(model.evaluate(15.0), 22.5);
        assert_eq!(model.evaluate(20.0), 25.0);
        // extrapolation reuses the edge segment slopes
        assert_eq!(model.evaluate(25.0), 27.5);
        assert_eq!(model.evaluate(-10.0), -20.0);
    }

    #[test]
    fn test_piecewise_degenerate_knot_counts() {
        let empty = PiecewiseLinearCorrection::new(vec![]);
        assert!(empty.is_empty());
        assert_eq!(empty.evaluate(12.5), 12.5);

        let single = PiecewiseLinearCorrection::new(vec![(10.0, 13.0)]);
        assert_eq!(single.evaluate(0.0), 3.0);
        assert_eq!(single.evaluate(40.0), 43.0);
    }

    #[test]
    fn test_boxed_models_can_be_mixed() {
        let maps = two_maps();
        let mut store = FeatureMapIndex::from_maps(&maps).unwrap();

        let models: Vec<Box<dyn CorrectionModel>> = vec![
            Box::new(LinearCorrection::new(1.0, 1.0)),
            Box::new(PiecewiseLinearCorrection::new(vec![
                (0.0, 0.0),
                (100.0, 110.0),
            ])),
        ];
        store.apply_transformations(&models).unwrap();

        assert_eq!(store.rt(0).unwrap(), 11.0);
        assert_eq!(store.rt(1).unwrap(), 21.0);
        assert!((store.rt(2).unwrap() - 11.33).abs() < 1e-9);
    }
}
