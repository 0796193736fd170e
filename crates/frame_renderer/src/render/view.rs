//! # View Setup
//!
//! Camera transform, frustum and projection for one rendered view.
//!
//! World space is right-handed with the camera looking down +X, +Y to the
//! left and +Z up. The world transform first rotates into camera-relative
//! space and then flips into Vulkan's convention (looking down -Z, Y down,
//! depth in [0, 1]):
//!
//! ```text
//! (x, y, z)  →  (-y, z, -x)
//! ```

use crate::foundation::math::{identity_axis, Aabb, Axis, Mat4, Plane, PlaneSide, PlaneType, Vec3};
use crate::scene::RefEntity;

/// Far clip distance of views that render no world
pub const NO_WORLD_FAR_CLIP: f32 = 2048.0;

/// A position and axes plus the transform into clip-ready eye space
#[derive(Debug, Clone, PartialEq)]
pub struct Orientation {
    /// Model-view matrix (column-major)
    pub model_matrix: Mat4,
    /// Local axes in world space
    pub axis: Axis,
    /// Local origin in world space
    pub origin: Vec3,
    /// Camera origin in local coordinates
    pub view_origin: Vec3,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            model_matrix: Mat4::identity(),
            axis: identity_axis(),
            origin: Vec3::zeros(),
            view_origin: Vec3::zeros(),
        }
    }
}

/// Viewport rectangle in framebuffer pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// Left edge
    pub x: i32,
    /// Top edge
    pub y: i32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

impl Viewport {
    /// Create a viewport
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// True when nothing can be drawn
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Result of a frustum test
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullResult {
    /// Completely inside
    In,
    /// Crosses at least one plane
    Clip,
    /// Completely outside
    Out,
}

/// The four side planes of a view frustum, normals pointing inward
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Frustum {
    /// Left, right, bottom, top
    pub planes: [Plane; 4],
}

impl Frustum {
    /// Test a world-space box
    pub fn cull_box(&self, bounds: &Aabb) -> CullResult {
        let mut result = CullResult::In;
        for plane in &self.planes {
            match plane.box_side(bounds) {
                PlaneSide::Back => return CullResult::Out,
                PlaneSide::Cross => result = CullResult::Clip,
                PlaneSide::Front => {}
            }
        }
        result
    }

    /// Test a world-space sphere
    pub fn cull_sphere(&self, center: &Vec3, radius: f32) -> CullResult {
        let mut result = CullResult::In;
        for plane in &self.planes {
            let dist = plane.distance_to(center);
            if dist < -radius {
                return CullResult::Out;
            }
            if dist <= radius {
                result = CullResult::Clip;
            }
        }
        result
    }
}

/// Everything needed to render one view
#[derive(Debug, Clone, PartialEq)]
pub struct ViewParms {
    /// Camera origin and axes
    pub camera: Orientation,
    /// World transform derived from the camera
    pub world: Orientation,
    /// Horizontal field of view, degrees
    pub fov_x: f32,
    /// Vertical field of view, degrees
    pub fov_y: f32,
    /// Near clip distance
    pub z_near: f32,
    /// Far clip distance
    pub z_far: f32,
    /// Side planes
    pub frustum: Frustum,
    /// Projection matrix
    pub projection: Mat4,
    /// Target rectangle
    pub viewport: Viewport,
    /// Rendered through a portal
    pub is_portal: bool,
    /// Rendered through a mirror
    pub is_mirror: bool,
    /// No world geometry (HUD, menus)
    pub no_world_model: bool,
    /// Clip plane of portal views, world space
    pub portal_plane: Plane,
    /// Bounds of the visible world, filled by surface collection
    pub vis_bounds: Aabb,
}

impl ViewParms {
    /// A primary view from a camera position and axes
    pub fn new(origin: Vec3, axis: Axis, fov_x: f32, fov_y: f32, viewport: Viewport) -> Self {
        Self {
            camera: Orientation {
                origin,
                axis,
                ..Orientation::default()
            },
            world: Orientation::default(),
            fov_x,
            fov_y,
            z_near: 0.0,
            z_far: 0.0,
            frustum: Frustum::default(),
            projection: Mat4::identity(),
            viewport,
            is_portal: false,
            is_mirror: false,
            no_world_model: false,
            portal_plane: Plane::default(),
            vis_bounds: Aabb::cleared(),
        }
    }

    /// Build the world transform from the camera
    pub fn rotate_for_viewer(&mut self) {
        let origin = self.camera.origin;
        let [a0, a1, a2] = self.camera.axis;

        #[rustfmt::skip]
        let viewer = Mat4::new(
            a0.x, a0.y, a0.z, -a0.dot(&origin),
            a1.x, a1.y, a1.z, -a1.dot(&origin),
            a2.x, a2.y, a2.z, -a2.dot(&origin),
            0.0,  0.0,  0.0,  1.0,
        );

        self.world = Orientation {
            model_matrix: flip_matrix() * viewer,
            axis: identity_axis(),
            origin: Vec3::zeros(),
            view_origin: origin,
        };
    }

    /// Derive the four side planes from the field of view
    pub fn setup_frustum(&mut self) {
        let [forward, left, up] = self.camera.axis;
        let (x_sin, x_cos) = (self.fov_x.to_radians() * 0.5).sin_cos();
        let (y_sin, y_cos) = (self.fov_y.to_radians() * 0.5).sin_cos();

        let normals = [
            forward * x_sin + left * x_cos,
            forward * x_sin - left * x_cos,
            forward * y_sin + up * y_cos,
            forward * y_sin - up * y_cos,
        ];

        for (plane, normal) in self.frustum.planes.iter_mut().zip(normals) {
            *plane = Plane {
                normal,
                dist: normal.dot(&self.camera.origin),
                kind: PlaneType::NonAxial,
                signbits: Plane::signbits_of(&normal),
            };
        }
    }

    /// Distance to the farthest visible point
    ///
    /// Views without world geometry, or whose visible world is empty, use a
    /// fixed distance.
    pub fn far_clip_distance(&self) -> f32 {
        if self.no_world_model || self.vis_bounds.is_cleared() {
            return NO_WORLD_FAR_CLIP;
        }

        (0..8)
            .map(|i| (self.vis_bounds.corner(i) - self.camera.origin).norm_squared())
            .fold(0.0_f32, f32::max)
            .sqrt()
    }

    /// Build the projection matrix; the far plane comes from the visible bounds
    pub fn setup_projection(&mut self, z_near: f32) {
        let z_far = self.far_clip_distance();
        self.z_near = z_near;
        self.z_far = z_far;

        let p10 = -z_far / (z_far - z_near);
        let mut projection = Mat4::zeros();
        projection[(0, 0)] = 1.0 / (self.fov_x.to_radians() * 0.5).tan();
        projection[(1, 1)] = -1.0 / (self.fov_y.to_radians() * 0.5).tan();
        projection[(2, 2)] = p10;
        projection[(2, 3)] = z_near * p10;
        projection[(3, 2)] = -1.0;
        self.projection = projection;
    }
}

/// Maps camera space (looking down +X) to Vulkan eye space (looking down -Z)
#[rustfmt::skip]
pub fn flip_matrix() -> Mat4 {
    Mat4::new(
        0.0, -1.0, 0.0, 0.0,
        0.0,  0.0, 1.0, 0.0,
       -1.0,  0.0, 0.0, 0.0,
        0.0,  0.0, 0.0, 1.0,
    )
}

/// Orientation of a model entity as seen from `view`
pub fn rotate_for_entity(entity: &RefEntity, view: &ViewParms) -> Orientation {
    let [a0, a1, a2] = entity.axis;
    let origin = entity.origin;

    #[rustfmt::skip]
    let local = Mat4::new(
        a0.x, a1.x, a2.x, origin.x,
        a0.y, a1.y, a2.y, origin.y,
        a0.z, a1.z, a2.z, origin.z,
        0.0,  0.0,  0.0,  1.0,
    );

    let delta = view.camera.origin - origin;
    let scale = if entity.non_normalized_axes {
        let length = a0.norm();
        if length > 0.0 {
            1.0 / length
        } else {
            0.0
        }
    } else {
        1.0
    };

    Orientation {
        model_matrix: view.world.model_matrix * local,
        axis: entity.axis,
        origin,
        view_origin: Vec3::new(delta.dot(&a0), delta.dot(&a1), delta.dot(&a2)) * scale,
    }
}

/// Express a world point in an orientation's local frame
pub fn world_point_to_local(world: &Vec3, orientation: &Orientation) -> Vec3 {
    let delta = world - orientation.origin;
    let [a0, a1, a2] = orientation.axis;
    Vec3::new(delta.dot(&a0), delta.dot(&a1), delta.dot(&a2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    fn primary_view(origin: Vec3) -> ViewParms {
        ViewParms::new(origin, identity_axis(), 90.0, 90.0, Viewport::new(0, 0, 640, 480))
    }

    #[test]
    fn test_far_clip_without_world_is_fixed() {
        let mut view = primary_view(Vec3::zeros());
        view.no_world_model = true;
        view.vis_bounds = Aabb::new(Vec3::repeat(-10_000.0), Vec3::repeat(10_000.0));
        assert_relative_eq!(view.far_clip_distance(), 2048.0);
    }

    #[test]
    fn test_far_clip_reaches_farthest_corner() {
        let mut view = primary_view(Vec3::new(1.0, 2.0, 3.0));
        view.vis_bounds = Aabb::new(Vec3::new(-10.0, -20.0, -30.0), Vec3::new(40.0, 50.0, 60.0));
        // farthest corner is (-10, -20, -30): delta (-11, -22, -33)
        let expected = (11.0_f32 * 11.0 + 22.0 * 22.0 + 33.0 * 33.0).sqrt();
        assert_relative_eq!(view.far_clip_distance(), expected, epsilon = 1e-3);
    }

    #[test]
    fn test_world_transform_looks_down_negative_z() {
        let mut view = primary_view(Vec3::new(100.0, 0.0, 0.0));
        view.rotate_for_viewer();
        // a point 10 units ahead lands on the -Z axis
        let eye = view.world.model_matrix * Vec4::new(110.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(eye, Vec4::new(0.0, 0.0, -10.0, 1.0), epsilon = 1e-5);
        // left maps to -X, up maps to +Y
        let left = view.world.model_matrix * Vec4::new(100.0, 5.0, 0.0, 1.0);
        assert_relative_eq!(left.x, -5.0, epsilon = 1e-5);
        let up = view.world.model_matrix * Vec4::new(100.0, 0.0, 5.0, 1.0);
        assert_relative_eq!(up.y, 5.0, epsilon = 1e-5);
    }

    #[test]
    fn test_projection_maps_near_and_far_to_unit_depth() {
        let mut view = primary_view(Vec3::zeros());
        view.no_world_model = true;
        view.setup_projection(4.0);
        let near = view.projection * Vec4::new(0.0, 0.0, -4.0, 1.0);
        let far = view.projection * Vec4::new(0.0, 0.0, -2048.0, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
        assert_relative_eq!(view.projection[(0, 0)], 1.0, epsilon = 1e-5);
        assert_relative_eq!(view.projection[(1, 1)], -1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_frustum_culls_behind_camera() {
        let mut view = primary_view(Vec3::zeros());
        view.setup_frustum();
        assert!(view.frustum.planes.iter().all(|p| p.kind == PlaneType::NonAxial));
        assert_eq!(view.frustum.cull_sphere(&Vec3::new(100.0, 0.0, 0.0), 5.0), CullResult::In);
        assert_eq!(view.frustum.cull_sphere(&Vec3::new(-100.0, 0.0, 0.0), 5.0), CullResult::Out);
        assert_eq!(view.frustum.cull_sphere(&Vec3::new(100.0, 100.0, 0.0), 5.0), CullResult::Clip);

        let ahead = Aabb::new(Vec3::new(50.0, -1.0, -1.0), Vec3::new(60.0, 1.0, 1.0));
        let behind = Aabb::new(Vec3::new(-60.0, -1.0, -1.0), Vec3::new(-50.0, 1.0, 1.0));
        assert_eq!(view.frustum.cull_box(&ahead), CullResult::In);
        assert_eq!(view.frustum.cull_box(&behind), CullResult::Out);
    }

    #[test]
    fn test_scaled_entity_view_origin_is_compensated() {
        let mut view = primary_view(Vec3::new(10.0, 0.0, 0.0));
        view.rotate_for_viewer();
        let axis = [Vec3::x() * 2.0, Vec3::y() * 2.0, Vec3::z() * 2.0];
        let entity = RefEntity::new(crate::scene::RefEntityType::Sprite, Vec3::zeros()).with_axis(axis, true);
        let orientation = rotate_for_entity(&entity, &view);
        // delta . axis0 = 20, scaled by 1 / |axis0|
        assert_relative_eq!(orientation.view_origin, Vec3::new(10.0, 0.0, 0.0), epsilon = 1e-5);

        let local = world_point_to_local(&Vec3::new(3.0, 4.0, 5.0), &view.world);
        assert_relative_eq!(local, Vec3::new(3.0, 4.0, 5.0));
    }
}
