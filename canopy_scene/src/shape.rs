// Copyright 2026 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shape variants, their bounds, and the GPU parameter record.

use bytemuck::{Pod, Zeroable};
use canopy_tree::Aabb;
use glam::{Mat3, Quat, Vec3};

/// How a shape's distance field combines with the scene so far.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum BlendOp {
    /// Merge with the scene.
    #[default]
    Union = 0,
    /// Carve out of the scene.
    Subtract = 1,
    /// Keep only the overlap with the scene.
    Intersect = 2,
}

/// A ray-marched primitive, described by its analytic parameters.
///
/// Shapes are plain data: bounds and GPU encoding are pure functions of the
/// variant, with no dispatch hierarchy behind them.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Shape {
    /// A sphere.
    Sphere {
        /// Center, world space.
        center: Vec3,
        /// Radius.
        radius: f32,
    },
    /// An oriented, optionally rounded box.
    Box {
        /// Center, world space.
        center: Vec3,
        /// Half edge lengths along the box's own axes.
        half_extents: Vec3,
        /// Orientation.
        rotation: Quat,
        /// Edge rounding radius; 0 for a sharp box.
        corner_radius: f32,
    },
    /// A capsule between two endpoints.
    Capsule {
        /// First endpoint.
        a: Vec3,
        /// Second endpoint.
        b: Vec3,
        /// Radius.
        radius: f32,
    },
    /// A cylinder between two endpoints.
    Cylinder {
        /// First endpoint.
        a: Vec3,
        /// Second endpoint.
        b: Vec3,
        /// Radius.
        radius: f32,
    },
}

impl Shape {
    /// Tight world-space bounds of the shape.
    ///
    /// Box bounds are exact for the oriented box; cylinder bounds are
    /// conservative (the capsule over the same segment).
    pub fn bounds(&self) -> Aabb {
        match *self {
            Self::Sphere { center, radius } => {
                Aabb::new(center - radius, center + radius)
            }
            Self::Box {
                center,
                half_extents,
                rotation,
                corner_radius,
            } => {
                let m = Mat3::from_quat(rotation);
                let extent = m.x_axis.abs() * half_extents.x
                    + m.y_axis.abs() * half_extents.y
                    + m.z_axis.abs() * half_extents.z;
                Aabb::new(center - extent, center + extent).expanded(corner_radius)
            }
            Self::Capsule { a, b, radius } | Self::Cylinder { a, b, radius } => {
                Aabb::new(a.min(b) - radius, a.max(b) + radius)
            }
        }
    }

    /// Encode the shape and its blend operator as a GPU record.
    pub fn record(&self, op: BlendOp) -> ShapeRecord {
        let mut record = ShapeRecord {
            kind: self.kind(),
            op: op as i32,
            ..ShapeRecord::zeroed()
        };
        match *self {
            Self::Sphere { center, radius } => {
                record.data0 = [center.x, center.y, center.z, radius];
            }
            Self::Box {
                center,
                half_extents,
                rotation,
                corner_radius,
            } => {
                record.data0 = [center.x, center.y, center.z, corner_radius];
                record.data1 = [half_extents.x, half_extents.y, half_extents.z, 0.0];
                record.data2 = [rotation.x, rotation.y, rotation.z, rotation.w];
            }
            Self::Capsule { a, b, radius } | Self::Cylinder { a, b, radius } => {
                record.data0 = [a.x, a.y, a.z, radius];
                record.data1 = [b.x, b.y, b.z, 0.0];
            }
        }
        record
    }

    fn kind(&self) -> i32 {
        match self {
            Self::Sphere { .. } => 0,
            Self::Box { .. } => 1,
            Self::Capsule { .. } => 2,
            Self::Cylinder { .. } => 3,
        }
    }
}

/// GPU mirror of one shape: a kind/operator header plus three generic
/// parameter registers. 64 bytes, matching the shader-side struct.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ShapeRecord {
    /// Shape kind discriminant (sphere 0, box 1, capsule 2, cylinder 3).
    pub kind: i32,
    /// Blend operator discriminant.
    pub op: i32,
    /// Explicit padding keeping the data registers 16-byte aligned.
    pub pad: [i32; 2],
    /// First parameter register; meaning depends on `kind`.
    pub data0: [f32; 4],
    /// Second parameter register.
    pub data1: [f32; 4],
    /// Third parameter register.
    pub data2: [f32; 4],
}

impl ShapeRecord {
    /// Byte stride of one record in an exported buffer.
    pub const STRIDE: usize = core::mem::size_of::<Self>();
}
