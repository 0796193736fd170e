//! Fog volumes, dynamic lights and client polygons

use bitflags::bitflags;

use crate::foundation::math::{Aabb, Vec3, Vec4};
use crate::scene::entity::RefEntity;
use crate::scene::shader::ShaderHandle;

/// An axis-aligned fog volume
#[derive(Debug, Clone, PartialEq)]
pub struct FogVolume {
    /// Extent of the volume
    pub bounds: Aabb,
    /// Tint, RGBA
    pub color: [u8; 4],
    /// Texture coordinate scale, the inverse of the opaque distance
    pub tc_scale: f32,
    /// Bounding surface plane `(normal, dist)` for volumes entered from above
    pub surface: Option<Vec4>,
}

impl FogVolume {
    /// A fog volume with no bounding surface
    pub fn new(bounds: Aabb, color: [u8; 4], depth_for_opaque: f32) -> Self {
        Self {
            bounds,
            color,
            tc_scale: 1.0 / (depth_for_opaque * 8.0),
            surface: None,
        }
    }

    /// Set the bounding surface plane
    pub fn with_surface(mut self, normal: Vec3, dist: f32) -> Self {
        self.surface = Some(Vec4::new(normal.x, normal.y, normal.z, dist));
        self
    }

    /// True when a sphere overlaps the volume bounds
    pub fn touches_sphere(&self, center: &Vec3, radius: f32) -> bool {
        (0..3).all(|j| {
            center[j] - radius < self.bounds.maxs[j] && center[j] + radius > self.bounds.mins[j]
        })
    }
}

/// Fog volumes of the loaded world
///
/// Index 0 means "no fog"; volumes are numbered from 1.
#[derive(Debug, Clone, Default)]
pub struct FogTable {
    volumes: Vec<FogVolume>,
}

impl FogTable {
    /// Wrap the world's fog volumes
    pub fn new(volumes: Vec<FogVolume>) -> Self {
        Self { volumes }
    }

    /// Volume by fog number
    pub fn get(&self, fog_num: u32) -> Option<&FogVolume> {
        let index = (fog_num as usize).checked_sub(1)?;
        self.volumes.get(index)
    }

    /// Fog number of the first volume overlapping a sphere, 0 if none
    pub fn sprite_fog_num(&self, origin: &Vec3, radius: f32) -> u32 {
        self.volumes
            .iter()
            .position(|fog| fog.touches_sphere(origin, radius))
            .map_or(0, |i| i as u32 + 1)
    }

    /// Number of volumes
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// True when the world has no fog
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }
}

/// A dynamic point light
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dlight {
    /// World position
    pub origin: Vec3,
    /// Linear color, 0..1 per channel
    pub color: Vec3,
    /// Radius of influence
    pub radius: f32,
    /// Blend additively instead of modulating
    pub additive: bool,
    /// Position in the current entity's local frame
    pub transformed: Vec3,
}

impl Dlight {
    /// A modulating light
    pub fn new(origin: Vec3, color: Vec3, radius: f32) -> Self {
        Self {
            origin,
            color,
            radius,
            additive: false,
            transformed: origin,
        }
    }

    /// Switch to additive blending
    pub fn additive(mut self) -> Self {
        self.additive = true;
        self
    }
}

/// Vertex of a client polygon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolyVert {
    /// World position
    pub xyz: Vec3,
    /// Texture coordinates
    pub st: [f32; 2],
    /// Vertex color
    pub color: [u8; 4],
}

/// A convex polygon submitted by the client (marks, decals)
#[derive(Debug, Clone, PartialEq)]
pub struct Poly {
    /// Shader to draw with
    pub shader: ShaderHandle,
    /// Fog volume containing the polygon
    pub fog_num: u32,
    /// Vertexes in fan order
    pub verts: Vec<PolyVert>,
}

bitflags! {
    /// Scene-wide flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RefDefFlags: u32 {
        /// HUD or menu scene; no world geometry
        const NO_WORLD_MODEL = 0x1;
    }
}

/// Everything the client submits for one frame
#[derive(Debug, Clone, Default)]
pub struct RefDef {
    /// Frame time in seconds
    pub time: f32,
    /// Scene flags
    pub flags: RefDefFlags,
    /// Entities, indexed by sort key entity number
    pub entities: Vec<RefEntity>,
    /// Dynamic lights
    pub dlights: Vec<Dlight>,
    /// Client polygons
    pub polys: Vec<Poly>,
}

impl RefDef {
    /// True when no world geometry is rendered
    pub fn no_world_model(&self) -> bool {
        self.flags.contains(RefDefFlags::NO_WORLD_MODEL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_fog(offset: f32) -> FogVolume {
        FogVolume::new(
            Aabb::new(Vec3::repeat(offset), Vec3::repeat(offset + 10.0)),
            [128, 128, 128, 255],
            100.0,
        )
    }

    #[test]
    fn test_fog_numbers_start_at_one() {
        let table = FogTable::new(vec![unit_fog(0.0)]);
        assert!(table.get(0).is_none());
        assert!(table.get(1).is_some());
        assert!(table.get(2).is_none());
    }

    #[test]
    fn test_sprite_fog_first_match_wins() {
        let table = FogTable::new(vec![unit_fog(0.0), unit_fog(5.0), unit_fog(100.0)]);
        assert_eq!(table.sprite_fog_num(&Vec3::repeat(7.0), 1.0), 1);
        assert_eq!(table.sprite_fog_num(&Vec3::repeat(105.0), 1.0), 3);
        assert_eq!(table.sprite_fog_num(&Vec3::repeat(50.0), 1.0), 0);
        // radius reaches into the volume
        assert_eq!(table.sprite_fog_num(&Vec3::new(12.0, 5.0, 5.0), 3.0), 1);
    }
}
