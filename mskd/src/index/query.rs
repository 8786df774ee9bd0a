use crate::data::feature::FeatureLike;
use crate::index::error::IndexError;
use crate::index::store::FeatureMapIndex;

impl<'a, F: FeatureLike> FeatureMapIndex<'a, F> {
    /// Ids of all features compatible with feature `id` under the given
    /// tolerances.
    ///
    /// The rt window is `rt(id) ± rt_tol`. With `mz_relative` set, the mz
    /// window is `mz(id) * (1 ± mz_tol)`, i.e. the tolerance is a raw
    /// fraction of the center mass (10 ppm is `1.0e-5`); otherwise it is
    /// `mz(id) ± mz_tol` in absolute units.
    ///
    /// The center feature itself is never returned. Features from the
    /// center's own map are skipped unless `include_same_map`. A
    /// non-negative `max_log2_fc` additionally drops candidates whose
    /// intensity differs from the center's by more than that many log2
    /// units; pass `-1.0` to disable the intensity filter.
    ///
    /// Tolerances must be finite and non-negative. The order of the
    /// returned ids is unspecified; duplicates cannot occur.
    pub fn neighborhood(
        &self,
        id: usize,
        rt_tol: f64,
        mz_tol: f64,
        mz_relative: bool,
        include_same_map: bool,
        max_log2_fc: f64,
    ) -> Result<Vec<usize>, IndexError> {
        self.check_id(id)?;
        debug_assert!(rt_tol.is_finite() && rt_tol >= 0.0);
        debug_assert!(mz_tol.is_finite() && mz_tol >= 0.0);

        let rt_c = self.rt[id];
        let mz_c = self.mz[id];
        let (mz_lo, mz_hi) = if mz_relative {
            (mz_c * (1.0 - mz_tol), mz_c * (1.0 + mz_tol))
        } else {
            (mz_c - mz_tol, mz_c + mz_tol)
        };

        let center_map = self.map_index[id];
        let center_intensity = self.intensity[id] as f64;

        let mut result = Vec::new();
        for hit in self.tree.range(rt_c - rt_tol, rt_c + rt_tol, mz_lo, mz_hi) {
            let j = hit as usize;
            if j == id {
                continue;
            }
            if !include_same_map && self.map_index[j] == center_map {
                continue;
            }
            if max_log2_fc >= 0.0 {
                let fc = (self.intensity[j] as f64 / center_intensity).log2().abs();
                if fc > max_log2_fc {
                    continue;
                }
            }
            result.push(j);
        }
        Ok(result)
    }

    /// Ids of all features inside the closed box
    /// `[rt_lo, rt_hi] x [mz_lo, mz_hi]`.
    ///
    /// `ignored_map` drops every feature of one map from the result;
    /// `None` (or an index no map has) keeps everything. On an empty or
    /// cleared index the result is empty.
    pub fn query_region(
        &self,
        rt_lo: f64,
        rt_hi: f64,
        mz_lo: f64,
        mz_hi: f64,
        ignored_map: Option<usize>,
    ) -> Vec<usize> {
        let mut result = Vec::new();
        for hit in self.tree.range(rt_lo, rt_hi, mz_lo, mz_hi) {
            let j = hit as usize;
            if Some(self.map_index[j]) == ignored_map {
                continue;
            }
            result.push(j);
        }
        result
    }
}
