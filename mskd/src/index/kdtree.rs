use ordered_float::OrderedFloat;

/// Below this segment size the layout recursion stays on one thread.
const PARALLEL_CUTOFF: usize = 4096;

/// Balanced 2-d tree over (rt, mz) points, bulk-loaded once and queried
/// many times.
///
/// The tree is stored implicitly in a flat arena: `ids` holds feature ids
/// in kd-order (the median of every segment sits at its midpoint, the
/// left subtree occupies the left half, the right subtree the right
/// half), and `points` carries a snapshot of the coordinates taken at
/// build time. Rebuilding replaces both vectors wholesale; there is no
/// incremental insert or delete.
#[derive(Debug, Clone, Default)]
pub struct KdTree {
    ids: Vec<u32>,
    points: Vec<[f64; 2]>,
}

impl KdTree {
    /// Build a balanced tree over two parallel coordinate columns.
    ///
    /// The split axis alternates with depth (even depth splits on rt, odd
    /// on mz) and the split point is the median element under the key
    /// `(coordinate, id)`, so ties in coordinate value are broken by
    /// original id and the layout is reproducible for a given input.
    /// Median selection is linear per level; sibling subtrees above
    /// `PARALLEL_CUTOFF` points are laid out on the rayon pool.
    pub fn build(rt: &[f64], mz: &[f64]) -> Self {
        debug_assert_eq!(rt.len(), mz.len());
        let mut ids: Vec<u32> = (0..rt.len() as u32).collect();
        layout(&mut ids, rt, mz, 0);
        let points = ids
            .iter()
            .map(|&id| [rt[id as usize], mz[id as usize]])
            .collect();
        KdTree { ids, points }
    }

    /// Number of indexed points (0 if never built or after a reset).
    pub fn size(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Collect all ids whose snapshot coordinates lie inside the closed
    /// box `[rt_lo, rt_hi] x [mz_lo, mz_hi]`.
    ///
    /// Only subtrees whose half-space can intersect the box are visited.
    /// The order of the returned ids is an implementation detail.
    pub fn range(&self, rt_lo: f64, rt_hi: f64, mz_lo: f64, mz_hi: f64) -> Vec<u32> {
        let mut hits = Vec::new();
        if !self.ids.is_empty() {
            self.collect(0, self.ids.len(), 0, &[rt_lo, rt_hi, mz_lo, mz_hi], &mut hits);
        }
        hits
    }

    fn collect(&self, lo: usize, hi: usize, depth: usize, win: &[f64; 4], hits: &mut Vec<u32>) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        let p = self.points[mid];
        let axis = depth % 2;
        let (w_lo, w_hi) = (win[2 * axis], win[2 * axis + 1]);

        // Subtrees are pruned against the split value alone; the split
        // point itself still needs the full box check.
        if w_lo <= p[axis] {
            self.collect(lo, mid, depth + 1, win, hits);
        }
        if win[0] <= p[0] && p[0] <= win[1] && win[2] <= p[1] && p[1] <= win[3] {
            hits.push(self.ids[mid]);
        }
        if w_hi >= p[axis] {
            self.collect(mid + 1, hi, depth + 1, win, hits);
        }
    }
}

/// Recursively arrange `ids` into kd-order.
fn layout(ids: &mut [u32], rt: &[f64], mz: &[f64], depth: usize) {
    let n = ids.len();
    if n <= 1 {
        return;
    }
    let coords = if depth % 2 == 0 { rt } else { mz };
    let mid = n / 2;
    ids.select_nth_unstable_by_key(mid, |&id| (OrderedFloat(coords[id as usize]), id));
    let (left, rest) = ids.split_at_mut(mid);
    let right = &mut rest[1..];
    if n > PARALLEL_CUTOFF {
        rayon::join(
            || layout(left, rt, mz, depth + 1),
            || layout(right, rt, mz, depth + 1),
        );
    } else {
        layout(left, rt, mz, depth + 1);
        layout(right, rt, mz, depth + 1);
    }
}
