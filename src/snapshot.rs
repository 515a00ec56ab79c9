//! Per-cycle pose snapshot.
//!
//! At the start of every steering cycle the live pose of each boid is copied
//! into a snapshot buffer. The solver reads only the snapshot, so the host
//! and the integrator are free to keep moving the live table while a cycle
//! is in flight.

use crate::boids::BoidTable;
use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};
use rayon::prelude::*;

/// Frozen pose of one boid.
///
/// Stored as plain arrays so the record has no padding and can be treated
/// as raw bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SnapshotEntry {
    pub position: [f32; 3],
    pub speed: f32,
    pub orientation: [f32; 4],
}

impl SnapshotEntry {
    pub fn new(position: Vec3, orientation: Quat, speed: f32) -> Self {
        Self {
            position: position.to_array(),
            speed,
            orientation: orientation.to_array(),
        }
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    #[inline]
    pub fn orientation(&self) -> Quat {
        Quat::from_array(self.orientation)
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }
}

/// Copy every boid's pose and speed into `snapshot`.
///
/// # Panics
///
/// If `snapshot` and `live` differ in length. The caller sizes the buffer
/// once per run and checks the population before every cycle.
pub fn capture(live: &BoidTable, snapshot: &mut [SnapshotEntry], batch_size: usize) {
    assert_eq!(
        live.len(),
        snapshot.len(),
        "snapshot buffer does not match the live population"
    );

    let positions = live.positions();
    let orientations = live.orientations();
    let speeds = live.speeds();

    snapshot
        .par_iter_mut()
        .enumerate()
        .with_min_len(batch_size.max(1))
        .for_each(|(i, slot)| {
            *slot = SnapshotEntry::new(positions[i], orientations[i], speeds[i]);
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_is_padding_free() {
        assert_eq!(std::mem::size_of::<SnapshotEntry>(), 32);
        let entry = SnapshotEntry::new(Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY, 4.0);
        let bytes: &[u8] = bytemuck::bytes_of(&entry);
        assert_eq!(bytes.len(), 32);
    }

    #[test]
    fn test_capture_copies_every_slot() {
        let mut live = BoidTable::new();
        for i in 0..200 {
            let angle = i as f32 * 0.1;
            live.push(Vec3::splat(i as f32), Quat::from_rotation_y(angle), 1.0 + i as f32);
        }

        let mut snapshot = vec![SnapshotEntry::zeroed(); live.len()];
        capture(&live, &mut snapshot, 16);

        for (i, entry) in snapshot.iter().enumerate() {
            assert_eq!(entry.position(), live.positions()[i]);
            assert_eq!(entry.orientation(), live.orientations()[i]);
            assert_eq!(entry.speed(), live.speeds()[i]);
        }
    }

    #[test]
    fn test_capture_empty() {
        let live = BoidTable::new();
        let mut snapshot: Vec<SnapshotEntry> = Vec::new();
        capture(&live, &mut snapshot, 64);
        assert!(snapshot.is_empty());
    }
}
