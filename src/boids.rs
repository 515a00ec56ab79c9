//! Live boid attributes.
//!
//! [`BoidTable`] holds the per-boid attributes as parallel arrays indexed by
//! boid index `0..N`. The host owns the table through a [`BoidStore`] handle
//! and may read it at any time (for rendering, say); the flock writes
//! positions and orientations back only from its integrator stage.

use glam::{Quat, Vec3};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::Arc;

/// Local forward axis of a boid.
pub const FORWARD: Vec3 = Vec3::Z;
/// Local up axis of a boid.
pub const UP: Vec3 = Vec3::Y;

/// Direction a boid with this orientation is facing.
#[inline]
pub fn forward(orientation: Quat) -> Vec3 {
    orientation * FORWARD
}

/// Up vector of a boid with this orientation.
#[inline]
pub fn up(orientation: Quat) -> Vec3 {
    orientation * UP
}

/// Orientation whose forward axis is `direction` and whose up axis is as
/// close to `up` as possible.
///
/// Returns `None` when `direction` has zero length. When `up` is parallel to
/// `direction` an arbitrary perpendicular up axis is used.
pub fn look_rotation(direction: Vec3, up: Vec3) -> Option<Quat> {
    let z = direction.try_normalize()?;
    let x = up
        .cross(z)
        .try_normalize()
        .unwrap_or_else(|| z.any_orthonormal_vector());
    let y = z.cross(x);
    Some(Quat::from_mat3(&glam::Mat3::from_cols(x, y, z)).normalize())
}

/// Struct-of-arrays table of live boid attributes.
#[derive(Clone, Debug, Default)]
pub struct BoidTable {
    positions: Vec<Vec3>,
    orientations: Vec<Quat>,
    speeds: Vec<f32>,
}

impl BoidTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            orientations: Vec::with_capacity(capacity),
            speeds: Vec::with_capacity(capacity),
        }
    }

    /// Append a boid and return its index.
    ///
    /// The orientation is normalized on the way in.
    pub fn push(&mut self, position: Vec3, orientation: Quat, speed: f32) -> usize {
        self.positions.push(position);
        self.orientations.push(orientation.normalize());
        self.speeds.push(speed);
        self.positions.len() - 1
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn orientations(&self) -> &[Quat] {
        &self.orientations
    }

    pub fn speeds(&self) -> &[f32] {
        &self.speeds
    }

    /// Set a boid's pose. Used by hosts to place boids between runs.
    pub fn set_pose(&mut self, index: usize, position: Vec3, orientation: Quat) {
        self.positions[index] = position;
        self.orientations[index] = orientation.normalize();
    }

    /// Mutable pose columns plus the read-only speed column.
    pub(crate) fn columns_mut(&mut self) -> (&mut [Vec3], &mut [Quat], &[f32]) {
        (&mut self.positions, &mut self.orientations, &self.speeds)
    }
}

/// Shared handle to the live [`BoidTable`].
///
/// Cloning the handle shares the table. Read guards may be held by any
/// number of readers; the integrator takes the write guard for the duration
/// of a coast or apply step.
#[derive(Clone, Debug, Default)]
pub struct BoidStore {
    table: Arc<RwLock<BoidTable>>,
}

impl BoidStore {
    pub fn new(table: BoidTable) -> Self {
        Self {
            table: Arc::new(RwLock::new(table)),
        }
    }

    pub fn read(&self) -> RwLockReadGuard<'_, BoidTable> {
        self.table.read()
    }

    /// Exclusive access to the live table.
    ///
    /// Blocks while a frame update is reading or integrating. Changing the
    /// number of boids while a flock is running makes its next update fail
    /// with [`FlockError::PopulationChanged`](crate::FlockError::PopulationChanged).
    pub fn write(&self) -> RwLockWriteGuard<'_, BoidTable> {
        self.table.write()
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<BoidTable> for BoidStore {
    fn from(table: BoidTable) -> Self {
        BoidStore::new(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_close(a: Vec3, b: Vec3) {
        assert!((a - b).length() < 1e-5, "{:?} != {:?}", a, b);
    }

    #[test]
    fn test_identity_axes() {
        assert_vec_close(forward(Quat::IDENTITY), Vec3::Z);
        assert_vec_close(up(Quat::IDENTITY), Vec3::Y);
    }

    #[test]
    fn test_look_rotation_faces_direction() {
        let dir = Vec3::new(1.0, 2.0, -0.5).normalize();
        let q = look_rotation(dir, Vec3::Y).unwrap();
        assert_vec_close(forward(q), dir);
        assert!(up(q).dot(Vec3::Y) > 0.0);
        assert!((q.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_look_rotation_degenerate_inputs() {
        assert!(look_rotation(Vec3::ZERO, Vec3::Y).is_none());

        // Up parallel to direction still yields a valid facing rotation
        let q = look_rotation(Vec3::Y, Vec3::Y).unwrap();
        assert_vec_close(forward(q), Vec3::Y);
    }

    #[test]
    fn test_table_push_and_store() {
        let mut table = BoidTable::new();
        let i = table.push(Vec3::ONE, Quat::from_xyzw(0.0, 0.0, 0.0, 2.0), 1.5);
        assert_eq!(i, 0);
        assert!((table.orientations()[0].length() - 1.0).abs() < 1e-6);

        let store = BoidStore::new(table);
        let alias = store.clone();
        alias.write().set_pose(0, Vec3::ZERO, Quat::IDENTITY);
        assert_eq!(store.read().positions()[0], Vec3::ZERO);
        assert_eq!(store.len(), 1);
        assert_eq!(store.read().speeds()[0], 1.5);
    }
}
