//! # Packed Sort Keys
//!
//! A draw surface's sort key packs four fields into one `u32` so the sorter
//! compares a single integer:
//!
//! ```text
//!  31 30            17 16          7 6      2 1    0
//! +--+----------------+-------------+--------+------+
//! |  | shader (14)    | entity (10) | fog (5)| dl(2)|
//! +--+----------------+-------------+--------+------+
//! ```
//!
//! The shader's sorted index occupies the most significant bits, so shader
//! changes dominate the ordering and GPU state switches are minimised.
//!
//! Encoding does not mask its inputs. A value wider than its field spills
//! into the neighbouring field; callers keep shader, entity and fog counts
//! within `MAX_SHADERS`, `MAX_REF_ENTITIES` and `MAX_FOG_VOLUMES`.

/// Width of the dynamic-light flag field
pub const DLIGHT_BITS: u32 = 2;
/// Width of the fog-volume field
pub const FOG_BITS: u32 = 5;
/// Width of the entity field
pub const ENTITY_BITS: u32 = 10;
/// Width of the shader field
pub const SHADER_BITS: u32 = 14;

/// Position of the dynamic-light flag field
pub const DLIGHT_SHIFT: u32 = 0;
/// Position of the fog-volume field
pub const FOG_SHIFT: u32 = DLIGHT_SHIFT + DLIGHT_BITS;
/// Position of the entity field
pub const ENTITY_SHIFT: u32 = FOG_SHIFT + FOG_BITS;
/// Position of the shader field
pub const SHADER_SHIFT: u32 = ENTITY_SHIFT + ENTITY_BITS;

/// Number of addressable shaders
pub const MAX_SHADERS: u32 = 1 << SHADER_BITS;
/// Number of addressable fog volumes, including index 0 ("no fog")
pub const MAX_FOG_VOLUMES: u32 = 1 << FOG_BITS;
/// Entity index reserved for world geometry
pub const ENTITY_NUM_WORLD: u32 = (1 << ENTITY_BITS) - 1;
/// Number of scene entities; the last entity slot belongs to the world
pub const MAX_REF_ENTITIES: u32 = ENTITY_NUM_WORLD;

const DLIGHT_MASK: u32 = (1 << DLIGHT_BITS) - 1;
const FOG_MASK: u32 = (1 << FOG_BITS) - 1;
const ENTITY_MASK: u32 = (1 << ENTITY_BITS) - 1;
const SHADER_MASK: u32 = MAX_SHADERS - 1;

const _: () = assert!(SHADER_SHIFT + SHADER_BITS <= u32::BITS);
const _: () = assert!(FOG_SHIFT >= DLIGHT_SHIFT + DLIGHT_BITS);
const _: () = assert!(ENTITY_SHIFT >= FOG_SHIFT + FOG_BITS);
const _: () = assert!(SHADER_SHIFT >= ENTITY_SHIFT + ENTITY_BITS);

/// Packed 32-bit draw-surface sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SortKey(u32);

/// Unpacked fields of a [`SortKey`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedSortKey {
    /// Sorted shader index
    pub shader: u32,
    /// Scene entity index (`ENTITY_NUM_WORLD` for world geometry)
    pub entity: u32,
    /// Fog volume index (0 = no fog)
    pub fog: u32,
    /// Dynamic-light flag
    pub dlight: u32,
}

impl SortKey {
    /// Pack the four fields
    pub const fn encode(shader: u32, entity: u32, fog: u32, dlight: u32) -> Self {
        Self(
            (shader << SHADER_SHIFT)
                | (entity << ENTITY_SHIFT)
                | (fog << FOG_SHIFT)
                | (dlight << DLIGHT_SHIFT),
        )
    }

    /// Wrap an already packed value
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The packed value
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Sorted shader index
    pub const fn shader(self) -> u32 {
        (self.0 >> SHADER_SHIFT) & SHADER_MASK
    }

    /// Entity index
    pub const fn entity(self) -> u32 {
        (self.0 >> ENTITY_SHIFT) & ENTITY_MASK
    }

    /// Fog volume index
    pub const fn fog(self) -> u32 {
        (self.0 >> FOG_SHIFT) & FOG_MASK
    }

    /// Dynamic-light flag
    pub const fn dlight(self) -> u32 {
        (self.0 >> DLIGHT_SHIFT) & DLIGHT_MASK
    }

    /// Unpack all fields
    pub const fn decode(self) -> DecodedSortKey {
        DecodedSortKey {
            shader: self.shader(),
            entity: self.entity(),
            fog: self.fog(),
            dlight: self.dlight(),
        }
    }
}
