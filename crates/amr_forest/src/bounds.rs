//! Axis-aligned bounding box with double precision for block geometry.

use glam::DVec3;

/// Double-precision axis-aligned bounding box.
///
/// Used for the domain extent and for the spatial region of each block,
/// which the persistence layer reads alongside the block's index.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DAabb3 {
  /// Minimum corner (inclusive).
  pub min: DVec3,
  /// Maximum corner (exclusive for cell ownership).
  pub max: DVec3,
}

impl DAabb3 {
  /// Create a new AABB from min and max corners.
  ///
  /// # Panics
  /// Debug-asserts that min <= max on all axes.
  pub fn new(min: DVec3, max: DVec3) -> Self {
    debug_assert!(
      min.x <= max.x && min.y <= max.y && min.z <= max.z,
      "AABB min must be <= max on all axes"
    );
    Self { min, max }
  }

  /// Check if this AABB overlaps with another (shared boundaries count).
  #[inline]
  pub fn overlaps(&self, other: &DAabb3) -> bool {
    self.min.x <= other.max.x
      && self.max.x >= other.min.x
      && self.min.y <= other.max.y
      && self.max.y >= other.min.y
      && self.min.z <= other.max.z
      && self.max.z >= other.min.z
  }

  /// Check if this AABB contains a point (half-open on the max side).
  #[inline]
  pub fn contains_point(&self, point: DVec3) -> bool {
    point.cmpge(self.min).all() && point.cmplt(self.max).all()
  }

  /// Get the size of the AABB (max - min).
  #[inline]
  pub fn size(&self) -> DVec3 {
    self.max - self.min
  }

  /// Get the center of the AABB.
  #[inline]
  pub fn center(&self) -> DVec3 {
    (self.min + self.max) * 0.5
  }

  /// Sub-box `index` of a regular grid with `counts` cells per axis.
  pub fn grid_cell(&self, counts: [u64; 3], index: [u64; 3]) -> DAabb3 {
    let size = self.size();
    let step = DVec3::new(
      size.x / counts[0] as f64,
      size.y / counts[1] as f64,
      size.z / counts[2] as f64,
    );
    let low = DVec3::new(index[0] as f64, index[1] as f64, index[2] as f64);
    DAabb3::new(self.min + low * step, self.min + (low + DVec3::ONE) * step)
  }
}
