// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive geometry: the 3D AABB value type and ray helpers.

use glam::Vec3;

/// `1 / sqrt(3)`, the component threshold used by [`find_orthogonal`].
const SQRT3_INV: f32 = 0.577_350_26;

/// Axis-aligned bounding box in 3D, defined by min/max corners.
///
/// Boxes may be degenerate (zero or inverted extents). The inverted
/// [`Aabb::EMPTY`] box acts as the identity for [`Aabb::union`]. Coordinates
/// are assumed finite (no NaNs or infinities except in `EMPTY` itself).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// The empty box: the identity for [`Aabb::union`] and
    /// [`Aabb::include`]. Contains nothing, intersects nothing.
    pub const EMPTY: Self = Self {
        min: Vec3::INFINITY,
        max: Vec3::NEG_INFINITY,
    };

    /// Create an AABB from min/max corners.
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// The smallest box spanning two points (in any order).
    pub fn from_points(a: Vec3, b: Vec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// The smallest box containing both operands.
    pub fn union(&self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Grow to contain the point.
    pub fn include(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// The box expanded by `r` on every side. Negative `r` shrinks without
    /// any inversion guard; use [`Aabb::shrunk`] when that matters.
    pub fn expanded(&self, r: f32) -> Self {
        Self {
            min: self.min - r,
            max: self.max + r,
        }
    }

    /// The box shrunk by `r` on every side, clamped at the center so the
    /// result never inverts. Negative `r` expands.
    pub fn shrunk(&self, r: f32) -> Self {
        let c = self.center();
        Self {
            min: (self.min + r).min(c),
            max: (self.max - r).max(c),
        }
    }

    /// Whether `other` lies entirely inside this box (closed comparison).
    pub fn contains(&self, other: &Self) -> bool {
        self.min.cmple(other.min).all() && other.max.cmple(self.max).all()
    }

    /// Whether the point lies inside this box (closed comparison).
    pub fn contains_point(&self, p: Vec3) -> bool {
        self.min.cmple(p).all() && p.cmple(self.max).all()
    }

    /// Whether the interiors of the two boxes overlap. Boxes that merely
    /// touch at a face, edge, or corner do not intersect.
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.cmplt(other.max).all() && other.min.cmplt(self.max).all()
    }

    /// True if the box is inverted on any axis. Assumes no NaN.
    pub fn is_empty(&self) -> bool {
        self.max.cmplt(self.min).any()
    }

    /// Center point.
    pub fn center(&self) -> Vec3 {
        0.5 * (self.min + self.max)
    }

    /// Full edge lengths.
    pub fn extents(&self) -> Vec3 {
        self.max - self.min
    }

    /// Half edge lengths.
    pub fn half_extents(&self) -> Vec3 {
        0.5 * (self.max - self.min)
    }

    /// Surface area, `2 * (ex*ey + ey*ez + ez*ex)`. Used for relative cost
    /// comparison during tree insertion; negative extents clamp to zero.
    pub fn area(&self) -> f32 {
        let e = (self.max - self.min).max(Vec3::ZERO);
        2.0 * (e.x * e.y + e.y * e.z + e.z * e.x)
    }

    /// Slab test of the segment `from -> to` against this box.
    ///
    /// Returns the entry fraction `t` along the segment, with
    /// `0 <= t <= max_fraction`, or `None` when the segment misses the box
    /// within that range. Segments starting inside the box have no entry
    /// face and report `None`.
    pub fn ray_cast(&self, from: Vec3, to: Vec3, max_fraction: f32) -> Option<f32> {
        let d = to - from;
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;

        for axis in 0..3 {
            if d[axis].abs() < f32::EPSILON {
                // Parallel to this slab: miss unless the origin is inside it.
                if from[axis] < self.min[axis] || from[axis] > self.max[axis] {
                    return None;
                }
            } else {
                let inv = 1.0 / d[axis];
                let mut t1 = (self.min[axis] - from[axis]) * inv;
                let mut t2 = (self.max[axis] - from[axis]) * inv;
                if t1 > t2 {
                    core::mem::swap(&mut t1, &mut t2);
                }
                t_min = t_min.max(t1);
                t_max = t_max.min(t2);
                if t_min > t_max {
                    return None;
                }
            }
        }

        if t_min < 0.0 || t_min > max_fraction {
            return None;
        }
        Some(t_min)
    }
}

/// Returns a vector orthogonal to `v`; unit if `v` is a unit vector.
///
/// The branch keeps the two components drawn from `v` away from the zero
/// vector: at least one component of any unit vector has magnitude
/// `>= 1/sqrt(3)`.
pub fn find_orthogonal(v: Vec3) -> Vec3 {
    if v.x.abs() >= SQRT3_INV {
        Vec3::new(v.y, -v.x, 0.0)
    } else {
        Vec3::new(0.0, v.z, -v.y)
    }
}
