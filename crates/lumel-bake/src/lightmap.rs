use lumel_atlas::Placement;
use lumel_geom::{Aabb, Plane, Vec3};
use lumel_scene::{LuxelClass, ShaderId, MAX_STYLES};

use crate::patch::PatchMesh;

/// Tangent world axes `(s, t)` for a projection axis.
#[inline]
pub fn tangent_axes(axis: usize) -> (usize, usize) {
    match axis {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}

/// Which channel slots are active, paired with the fixed channel array so
/// nothing scans for sentinel styles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StyleSet(u8);

impl StyleSet {
    #[inline]
    pub fn set(&mut self, slot: usize) {
        self.0 |= 1 << slot;
    }

    #[inline]
    pub fn clear(&mut self, slot: usize) {
        self.0 &= !(1 << slot);
    }

    #[inline]
    pub fn has(self, slot: usize) -> bool {
        self.0 & (1 << slot) != 0
    }

    #[inline]
    pub fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..MAX_STYLES).filter(move |&i| self.has(i))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Unplaced,
    Placed,
    Approximated,
    /// Solid channel served by a twin owner's single stamped texel.
    SolidInline,
}

/// One style channel of a raw lightmap.
#[derive(Clone, Debug)]
pub struct Channel {
    pub style: u8,
    /// Super-resolution accumulation buffer, dropped after downsampling.
    pub super_colors: Vec<[f32; 3]>,
    /// Final per-texel colors, `w * h`.
    pub colors: Vec<[f32; 3]>,
    pub solid: bool,
    pub solid_color: [f32; 3],
    /// `(owner lightmap, owner slot)` once collapsed into another channel.
    pub twin: Option<(usize, usize)>,
    pub placement: Option<Placement>,
    pub state: ChannelState,
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            style: 0,
            super_colors: Vec::new(),
            colors: Vec::new(),
            solid: false,
            solid_color: [0.0; 3],
            twin: None,
            placement: None,
            state: ChannelState::Unplaced,
        }
    }
}

/// The unit of baking: one shared lightmap for a group of compatible
/// surfaces, with up to `MAX_STYLES` parallel style channels.
#[derive(Clone, Debug)]
pub struct RawLightmap {
    /// Member surfaces, indices into the surface-info list.
    pub surfaces: Vec<usize>,
    pub entity: usize,
    pub shader: ShaderId,
    pub sample_size: u32,
    pub brightness: f32,
    /// Projection axis for planar groups; patches parameterize themselves.
    pub axis: Option<usize>,
    pub plane: Option<Plane>,
    pub bounds: Aabb,
    pub patch: Option<PatchMesh>,
    /// Seam continuity in s/t (coinciding first/last patch rows or columns).
    pub wrap: [bool; 2],

    /// Final texel dimensions and the supersampled dimensions.
    pub w: usize,
    pub h: usize,
    pub sw: usize,
    pub sh: usize,
    /// World position of texel `(0,0)` (planar groups; lies on the plane).
    pub origin: Vec3,

    // Shared across styles: geometry and visibility per texel.
    pub super_origins: Vec<Vec3>,
    pub super_normals: Vec<Vec3>,
    pub super_classes: Vec<LuxelClass>,
    pub classes: Vec<LuxelClass>,
    /// Dominant incoming light direction per final texel (deluxemapping).
    pub dirs: Option<Vec<Vec3>>,

    pub styles: StyleSet,
    pub channels: [Channel; MAX_STYLES],
}

impl RawLightmap {
    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.w + x
    }

    #[inline]
    pub fn sidx(&self, x: usize, y: usize) -> usize {
        y * self.sw + x
    }

    /// Supersample factor; the grouper establishes `sw == w * s`.
    #[inline]
    pub fn supersample(&self) -> usize {
        self.sw / self.w
    }

    /// World step vectors per final texel for planar groups.
    pub fn vecs(&self) -> [Vec3; 2] {
        let axis = self.axis.unwrap_or(2);
        let (ts, tt) = tangent_axes(axis);
        let mut s = Vec3::ZERO;
        let mut t = Vec3::ZERO;
        s.set(ts, self.sample_size as f32);
        t.set(tt, self.sample_size as f32);
        [s, t]
    }

    /// Surface-space coordinates of a world point in super-texel units.
    /// Planar groups only.
    pub fn st_of(&self, p: Vec3) -> [f32; 2] {
        let axis = self.axis.unwrap_or(2);
        let (ts, tt) = tangent_axes(axis);
        let s = (p.get(ts) - self.origin.get(ts)) / self.sample_size as f32;
        let t = (p.get(tt) - self.origin.get(tt)) / self.sample_size as f32;
        let ss = self.supersample() as f32;
        [s * ss, t * ss]
    }

    /// Inverse of `st_of`: world position of fractional super-texel
    /// coordinates, re-projected onto the group plane.
    pub fn world_of(&self, s: f32, t: f32) -> Vec3 {
        let axis = self.axis.unwrap_or(2);
        let (ts, tt) = tangent_axes(axis);
        let ss = self.supersample() as f32;
        let mut p = self.origin;
        p.set(ts, self.origin.get(ts) + s / ss * self.sample_size as f32);
        p.set(tt, self.origin.get(tt) + t / ss * self.sample_size as f32);
        if let Some(plane) = self.plane {
            if let Some(v) = plane.solve_axis(p, axis) {
                p.set(axis, v);
            }
        }
        p
    }

    /// Surface-space coordinates of a surface vertex in super-texel units.
    /// Planar members project through the group basis; patch control points
    /// interpolate linearly across the patch dimensions, since lightmap
    /// resolution and control-grid resolution are decoupled.
    pub fn vertex_st(&self, surf: &lumel_scene::Surface, vi: usize) -> [f32; 2] {
        match &surf.kind {
            lumel_scene::SurfaceKind::Patch { width, height } => {
                let ss = self.supersample() as f32;
                let c = (vi % width) as f32 / (*width - 1) as f32;
                let r = (vi / width) as f32 / (*height - 1) as f32;
                [
                    c * (self.w - 1) as f32 * ss,
                    r * (self.h - 1) as f32 * ss,
                ]
            }
            lumel_scene::SurfaceKind::Planar { .. } => self.st_of(surf.verts[vi].pos),
        }
    }

    /// Bilinear color lookup in a channel at super-texel coordinates.
    pub fn sample_color(&self, slot: usize, st: [f32; 2]) -> [f32; 3] {
        let ch = &self.channels[slot];
        if ch.solid {
            return ch.solid_color;
        }
        if ch.colors.is_empty() {
            return [0.0; 3];
        }
        let ss = self.supersample() as f32;
        let fx = (st[0] / ss).clamp(0.0, (self.w - 1) as f32);
        let fy = (st[1] / ss).clamp(0.0, (self.h - 1) as f32);
        let x0 = fx.floor() as usize;
        let y0 = fy.floor() as usize;
        let x1 = (x0 + 1).min(self.w - 1);
        let y1 = (y0 + 1).min(self.h - 1);
        let tx = fx - x0 as f32;
        let ty = fy - y0 as f32;
        let mut out = [0.0f32; 3];
        for k in 0..3 {
            let c00 = ch.colors[self.idx(x0, y0)][k];
            let c10 = ch.colors[self.idx(x1, y0)][k];
            let c01 = ch.colors[self.idx(x0, y1)][k];
            let c11 = ch.colors[self.idx(x1, y1)][k];
            let top = c00 + (c10 - c00) * tx;
            let bot = c01 + (c11 - c01) * tx;
            out[k] = top + (bot - top) * ty;
        }
        out
    }

    /// Validity mask for the stamp test: lit texels only.
    pub fn stamp_mask(&self) -> Vec<bool> {
        self.classes.iter().map(|c| c.is_lit()).collect()
    }

    /// True once every channel reached a terminal state.
    pub fn resolved(&self) -> bool {
        self.styles.iter().all(|slot| {
            let ch = &self.channels[slot];
            ch.twin.is_some() || !matches!(ch.state, ChannelState::Unplaced)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_set_roundtrip() {
        let mut s = StyleSet::default();
        assert_eq!(s.count(), 0);
        s.set(0);
        s.set(3);
        assert!(s.has(0) && s.has(3) && !s.has(1));
        assert_eq!(s.iter().collect::<Vec<_>>(), vec![0, 3]);
        s.clear(3);
        assert_eq!(s.count(), 1);
    }

    #[test]
    fn tangent_axes_cover_the_other_two() {
        for axis in 0..3 {
            let (a, b) = tangent_axes(axis);
            assert_ne!(a, axis);
            assert_ne!(b, axis);
            assert_ne!(a, b);
        }
    }
}
