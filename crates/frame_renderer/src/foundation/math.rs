//! Math utilities and types
//!
//! Provides the vector, matrix, plane and bounding-box types shared by view
//! setup, culling and the shading passes.

pub use nalgebra::{Matrix4, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type (column-major storage)
pub type Mat4 = Matrix4<f32>;

/// Orientation axes: forward, left, up.
pub type Axis = [Vec3; 3];

/// The identity orientation axes
pub fn identity_axis() -> Axis {
    [Vec3::x(), Vec3::y(), Vec3::z()]
}

/// Classification of a plane normal, used to pick fast paths in box tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneType {
    /// Normal is the +X axis
    AxialX,
    /// Normal is the +Y axis
    AxialY,
    /// Normal is the +Z axis
    AxialZ,
    /// Any other normal
    NonAxial,
}

/// Which side(s) of a plane a volume lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    /// Entirely in front of (or on) the plane
    Front,
    /// Entirely behind the plane
    Back,
    /// Straddles the plane
    Cross,
}

/// A plane `normal . p = dist` with precomputed normal sign bits
///
/// Bit `j` of `signbits` is set when component `j` of the normal is negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Plane normal
    pub normal: Vec3,
    /// Distance from the origin along the normal
    pub dist: f32,
    /// Axial classification
    pub kind: PlaneType,
    /// Sign bits of the normal components
    pub signbits: u8,
}

impl Plane {
    /// Create a plane and derive its type and sign bits from the normal
    pub fn new(normal: Vec3, dist: f32) -> Self {
        let kind = if normal == Vec3::x() {
            PlaneType::AxialX
        } else if normal == Vec3::y() {
            PlaneType::AxialY
        } else if normal == Vec3::z() {
            PlaneType::AxialZ
        } else {
            PlaneType::NonAxial
        };

        Self {
            normal,
            dist,
            kind,
            signbits: Self::signbits_of(&normal),
        }
    }

    /// Sign bits of a normal vector
    pub fn signbits_of(normal: &Vec3) -> u8 {
        let mut bits = 0;
        for j in 0..3 {
            if normal[j] < 0.0 {
                bits |= 1 << j;
            }
        }
        bits
    }

    /// Signed distance of a point from the plane
    pub fn distance_to(&self, point: &Vec3) -> f32 {
        self.normal.dot(point) - self.dist
    }

    /// Classify an axis-aligned box against this plane
    ///
    /// The sign bits select the corner farthest along the normal and the one
    /// nearest to it, so only two dot products are needed.
    pub fn box_side(&self, bounds: &Aabb) -> PlaneSide {
        let mut far = Vec3::zeros();
        let mut near = Vec3::zeros();
        for j in 0..3 {
            if self.signbits & (1 << j) == 0 {
                far[j] = bounds.maxs[j];
                near[j] = bounds.mins[j];
            } else {
                far[j] = bounds.mins[j];
                near[j] = bounds.maxs[j];
            }
        }

        let front = self.normal.dot(&far) >= self.dist;
        let back = self.normal.dot(&near) < self.dist;
        match (front, back) {
            (true, true) => PlaneSide::Cross,
            (false, true) => PlaneSide::Back,
            _ => PlaneSide::Front,
        }
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self::new(Vec3::z(), 0.0)
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub mins: Vec3,
    /// Maximum corner
    pub maxs: Vec3,
}

impl Aabb {
    /// Create a box from its corners
    pub fn new(mins: Vec3, maxs: Vec3) -> Self {
        Self { mins, maxs }
    }

    /// An inverted box that any added point will replace
    pub fn cleared() -> Self {
        Self {
            mins: Vec3::repeat(f32::MAX),
            maxs: Vec3::repeat(f32::MIN),
        }
    }

    /// True if no point was ever added
    pub fn is_cleared(&self) -> bool {
        self.mins.x > self.maxs.x
    }

    /// Grow the box to contain `point`
    pub fn add_point(&mut self, point: &Vec3) {
        self.mins = self.mins.inf(point);
        self.maxs = self.maxs.sup(point);
    }

    /// One of the eight corners; bit 0/1/2 of `index` selects mins on X/Y/Z
    pub fn corner(&self, index: usize) -> Vec3 {
        Vec3::new(
            if index & 1 != 0 { self.mins.x } else { self.maxs.x },
            if index & 2 != 0 { self.mins.y } else { self.maxs.y },
            if index & 4 != 0 { self.mins.z } else { self.maxs.z },
        )
    }
}
