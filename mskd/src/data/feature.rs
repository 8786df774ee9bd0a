use serde::{Deserialize, Serialize};

/// Read access to one detected LC-MS feature.
///
/// Anything that can report a retention time, a mass-to-charge ratio, an
/// intensity and a charge state can be ingested into a
/// [`FeatureMapIndex`](crate::index::store::FeatureMapIndex).
pub trait FeatureLike {
    /// Retention time in seconds.
    fn rt(&self) -> f64;
    /// Mass-to-charge ratio.
    fn mz(&self) -> f64;
    /// Apex or summed intensity.
    fn intensity(&self) -> f32;
    /// Charge state (0 if unknown).
    fn charge(&self) -> i32;
}

/// Plain feature record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub rt: f64,
    pub mz: f64,
    pub intensity: f32,
    pub charge: i32,
}

impl Feature {
    pub fn new(rt: f64, mz: f64, intensity: f32, charge: i32) -> Self {
        Feature { rt, mz, intensity, charge }
    }
}

impl FeatureLike for Feature {
    fn rt(&self) -> f64 {
        self.rt
    }

    fn mz(&self) -> f64 {
        self.mz
    }

    fn intensity(&self) -> f32 {
        self.intensity
    }

    fn charge(&self) -> i32 {
        self.charge
    }
}
