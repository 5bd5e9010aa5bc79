use lumel_geom::{Aabb, Vec3};

use crate::shaders::ShaderId;

/// Number of independent light style channels a surface can carry.
/// A true domain constant of the map format, not a tunable.
pub const MAX_STYLES: usize = 4;

/// Sentinel written into `Surface::lightmap_num` for vertex-only surfaces.
pub const LIGHTMAP_BY_VERTEX: i32 = -3;

/// Sentinel for "no lightmap assigned (yet)".
pub const LIGHTMAP_NONE: i32 = -1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Vertex {
    pub pos: Vec3,
    pub normal: Vec3,
    /// Base texture coordinates, untouched by the baker.
    pub st: [f32; 2],
    /// Lightmap coordinates per style, rewritten at emission.
    pub lm_st: [[f32; 2]; MAX_STYLES],
    /// Vertex color per style, written for vertex-lit output.
    pub color: [[u8; 3]; MAX_STYLES],
}

impl Vertex {
    pub fn at(pos: Vec3) -> Self {
        Self {
            pos,
            normal: Vec3::ZERO,
            st: [0.0; 2],
            lm_st: [[0.0; 2]; MAX_STYLES],
            color: [[0; 3]; MAX_STYLES],
        }
    }
}

#[derive(Clone, Debug)]
pub enum SurfaceKind {
    /// Triangle soup; `indices` are triples into the vertex list.
    Planar { indices: Vec<u32> },
    /// Biquadratic bezier patch control grid, `width * height` vertices,
    /// both dimensions odd and >= 3.
    Patch { width: usize, height: usize },
}

#[derive(Clone, Debug)]
pub struct Surface {
    pub shader: ShaderId,
    pub entity: usize,
    pub verts: Vec<Vertex>,
    pub kind: SurfaceKind,
    /// Output page index per style, `LIGHTMAP_NONE` until emission.
    pub lightmap_num: [i32; MAX_STYLES],
    /// Style index per channel; slot 0 is always style 0.
    pub styles: [u8; MAX_STYLES],
    /// Name of the synthesized multi-style shader, when one was needed.
    pub generated_shader: Option<String>,
}

impl Surface {
    pub fn new(shader: ShaderId, entity: usize, verts: Vec<Vertex>, kind: SurfaceKind) -> Self {
        Self {
            shader,
            entity,
            verts,
            kind,
            lightmap_num: [LIGHTMAP_NONE; MAX_STYLES],
            styles: [0; MAX_STYLES],
            generated_shader: None,
        }
    }

    pub fn bounds(&self) -> Aabb {
        let mut b = Aabb::empty();
        for v in &self.verts {
            b.add_point(v.pos);
        }
        b
    }

    /// Triangle index triples. Patches triangulate their control grid cells;
    /// projection uses the subdivided mesh instead, this is for bounds and
    /// approximation walks only.
    pub fn triangles(&self) -> Vec<[u32; 3]> {
        match &self.kind {
            SurfaceKind::Planar { indices } => indices
                .chunks_exact(3)
                .map(|t| [t[0], t[1], t[2]])
                .collect(),
            SurfaceKind::Patch { width, height } => {
                let mut out = Vec::with_capacity((width - 1) * (height - 1) * 2);
                for y in 0..height - 1 {
                    for x in 0..width - 1 {
                        let a = (y * width + x) as u32;
                        let b = a + 1;
                        let c = a + *width as u32;
                        let d = c + 1;
                        out.push([a, b, d]);
                        out.push([a, d, c]);
                    }
                }
                out
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct Entity {
    pub name: String,
    pub cast_shadows: bool,
    pub recv_shadows: bool,
    /// Per-entity lightmap sample size override, world units per luxel.
    pub sample_size: Option<u32>,
}

impl Default for Entity {
    fn default() -> Self {
        Self {
            name: String::from("worldspawn"),
            cast_shadows: true,
            recv_shadows: true,
            sample_size: None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PointLight {
    pub origin: Vec3,
    /// Color scaled by intensity.
    pub color: [f32; 3],
    pub style: u8,
}

/// One BSP leaf: a box, its PVS cluster, and the surfaces it references.
#[derive(Clone, Debug)]
pub struct Leaf {
    pub bounds: Aabb,
    pub cluster: u32,
    /// Solid leaves occlude; sample points inside them are unusable.
    pub opaque: bool,
    pub surfaces: Vec<usize>,
}
