//! Vertex-color substitution: raw lightmaps whose content linear vertex
//! interpolation can reproduce within tolerance give up their atlas space.

use log::debug;
use lumel_geom::Vec3;
use lumel_scene::{Scene, MAX_STYLES};

use crate::config::BakeConfig;
use crate::info::SurfaceInfo;
use crate::lightmap::{ChannelState, RawLightmap};

#[derive(Clone, Copy)]
struct ProbeVert {
    pos: Vec3,
    st: [f32; 2],
    /// Interpolated vertex color per channel slot.
    color: [[f32; 3]; MAX_STYLES],
}

/// Runs the approximation pass over every lightmap. Failure to qualify is
/// not an error; the lightmap simply stays at full fidelity.
pub fn approximate_lightmaps(
    lightmaps: &mut [RawLightmap],
    infos: &mut [SurfaceInfo],
    scene: &Scene,
    cfg: &BakeConfig,
) {
    if cfg.approximate_tolerance <= 0.0 {
        return;
    }
    let mut approximated = 0usize;
    for lm in lightmaps.iter_mut() {
        if try_approximate(lm, infos, scene, cfg) {
            approximated += 1;
        }
    }
    debug!("approximated {} lightmaps to vertex colors", approximated);
}

/// A lightmap is fully approximated, and frees its pages, only when every
/// member surface passes.
fn try_approximate(
    lm: &mut RawLightmap,
    infos: &mut [SurfaceInfo],
    scene: &Scene,
    cfg: &BakeConfig,
) -> bool {
    let threshold = cfg.subdivide_threshold.max(0.25);
    for &info_idx in &lm.surfaces {
        let info = &infos[info_idx];
        let surf = &scene.surfaces[info.surface];

        // Surfaces smaller than two luxels in every axis cannot show a
        // gradient worth a lightmap; force them through.
        let size = info.bounds.size();
        let tiny_limit = (2 * info.sample_size) as f32;
        if size.x < tiny_limit && size.y < tiny_limit && size.z < tiny_limit {
            continue;
        }

        for tri in surf.triangles() {
            let corners = [
                probe_vert(lm, surf, tri[0] as usize),
                probe_vert(lm, surf, tri[1] as usize),
                probe_vert(lm, surf, tri[2] as usize),
            ];
            if !approximate_triangle(lm, corners, cfg.approximate_tolerance, threshold) {
                return false;
            }
        }
    }

    for &info_idx in &lm.surfaces {
        infos[info_idx].approximated = true;
    }
    for slot in lm.styles.iter() {
        let ch = &mut lm.channels[slot];
        if ch.twin.is_none() {
            ch.state = ChannelState::Approximated;
        }
    }
    true
}

fn probe_vert(lm: &RawLightmap, surf: &lumel_scene::Surface, vi: usize) -> ProbeVert {
    let st = lm.vertex_st(surf, vi);
    let mut color = [[0.0f32; 3]; MAX_STYLES];
    for slot in lm.styles.iter() {
        color[slot] = lm.sample_color(slot, st);
    }
    ProbeVert {
        pos: surf.verts[vi].pos,
        st,
        color,
    }
}

/// Tests one vertex: the would-be lightmap color at its `st` against the
/// linearly interpolated vertex color, per channel, per component.
fn vert_within(lm: &RawLightmap, v: &ProbeVert, tolerance: f32) -> bool {
    for slot in lm.styles.iter() {
        let looked_up = lm.sample_color(slot, v.st);
        for k in 0..3 {
            if (looked_up[k] - v.color[slot][k]).abs() > tolerance {
                return false;
            }
        }
    }
    true
}

/// Recursive midpoint test. Splits the longest world-space edge until it
/// drops under `threshold`; a triangle passes only if itself and all its
/// children pass.
fn approximate_triangle(
    lm: &RawLightmap,
    verts: [ProbeVert; 3],
    tolerance: f32,
    threshold: f32,
) -> bool {
    for v in &verts {
        if !vert_within(lm, v, tolerance) {
            return false;
        }
    }

    let mut longest = 0usize;
    let mut longest_len = 0.0f32;
    for i in 0..3 {
        let len = verts[i].pos.distance(verts[(i + 1) % 3].pos);
        if len > longest_len {
            longest_len = len;
            longest = i;
        }
    }
    if longest_len < threshold {
        return true;
    }

    let a = longest;
    let b = (longest + 1) % 3;
    let c = (longest + 2) % 3;
    let mid = midpoint(&verts[a], &verts[b]);
    if !vert_within(lm, &mid, tolerance) {
        return false;
    }
    approximate_triangle(lm, [verts[a], mid, verts[c]], tolerance, threshold)
        && approximate_triangle(lm, [mid, verts[b], verts[c]], tolerance, threshold)
}

fn midpoint(a: &ProbeVert, b: &ProbeVert) -> ProbeVert {
    let mut color = [[0.0f32; 3]; MAX_STYLES];
    for slot in 0..MAX_STYLES {
        for k in 0..3 {
            color[slot][k] = (a.color[slot][k] + b.color[slot][k]) * 0.5;
        }
    }
    ProbeVert {
        pos: (a.pos + b.pos) * 0.5,
        st: [(a.st[0] + b.st[0]) * 0.5, (a.st[1] + b.st[1]) * 0.5],
        color,
    }
}
