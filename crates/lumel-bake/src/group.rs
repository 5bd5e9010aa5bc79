//! Greedy clustering of compatible surfaces into shared raw lightmaps,
//! plus lightmap sizing with sample-size auto-grow.

use std::cmp::Ordering;

use log::{debug, warn};
use lumel_geom::Vec3;
use lumel_scene::{Scene, ShaderCatalog, SurfaceKind};

use crate::config::BakeConfig;
use crate::constants::{MAX_RESIZE_WARNINGS, PLANE_DIST_EPS, PLANE_NORMAL_EPS};
use crate::info::SurfaceInfo;
use crate::lightmap::{tangent_axes, RawLightmap, StyleSet};
use crate::patch::PatchMesh;

#[inline]
fn eligible(info: &SurfaceInfo) -> bool {
    !info.vertex_lit && (info.plane.is_some() || info.patch_iterations.is_some())
}

/// Deterministic total order: entity, lightmap-eligibility, shader, sample
/// size, axis, plane, then box position. Grouping walks surfaces in this
/// order, so the comparator pins down which groups form first.
fn compare_infos(a: &SurfaceInfo, b: &SurfaceInfo) -> Ordering {
    a.entity
        .cmp(&b.entity)
        .then_with(|| eligible(b).cmp(&eligible(a)))
        .then_with(|| a.shader.cmp(&b.shader))
        .then_with(|| a.sample_size.cmp(&b.sample_size))
        .then_with(|| a.axis.unwrap_or(3).cmp(&b.axis.unwrap_or(3)))
        .then_with(|| {
            let pa = a.plane.unwrap_or_default();
            let pb = b.plane.unwrap_or_default();
            pa.normal
                .x
                .total_cmp(&pb.normal.x)
                .then(pa.normal.y.total_cmp(&pb.normal.y))
                .then(pa.normal.z.total_cmp(&pb.normal.z))
                .then(pa.dist.total_cmp(&pb.dist))
        })
        .then_with(|| {
            a.bounds
                .min
                .x
                .total_cmp(&b.bounds.min.x)
                .then(a.bounds.min.y.total_cmp(&b.bounds.min.y))
                .then(a.bounds.min.z.total_cmp(&b.bounds.min.z))
        })
}

/// Whether `cand` may join the group seeded with `seed`/`lm_bounds`.
fn compatible(
    seed: &SurfaceInfo,
    cand: &SurfaceInfo,
    lm_bounds: lumel_geom::Aabb,
    mergable: bool,
) -> bool {
    if cand.entity != seed.entity
        || cand.shader != seed.shader
        || cand.sample_size != seed.sample_size
        || cand.axis != seed.axis
    {
        return false;
    }
    let (Some(pa), Some(pb)) = (seed.plane, cand.plane) else {
        return false;
    };
    if !mergable && !pa.nearly_equal(pb, PLANE_NORMAL_EPS, PLANE_DIST_EPS) {
        return false;
    }
    let slack = cand.sample_size as f32;
    lm_bounds.expanded(slack).overlaps(cand.bounds)
}

/// Runs the grouping pass. Surfaces gain their `lm` back-reference; the
/// returned lightmaps have final dimensions but no sample data yet.
pub fn group_surfaces(
    infos: &mut [SurfaceInfo],
    scene: &Scene,
    catalog: &ShaderCatalog,
    cfg: &BakeConfig,
) -> Vec<RawLightmap> {
    let mut order: Vec<usize> = (0..infos.len()).collect();
    order.sort_by(|&a, &b| compare_infos(&infos[a], &infos[b]));

    let mut lightmaps: Vec<RawLightmap> = Vec::new();
    let mut resize_warnings = 0usize;

    for pos in 0..order.len() {
        let seed = order[pos];
        if infos[seed].lm.is_some() || !eligible(&infos[seed]) {
            continue;
        }
        let lm_index = lightmaps.len();
        let brightness = catalog
            .get(infos[seed].shader)
            .map(|s| s.brightness)
            .unwrap_or(1.0);
        let mergable = catalog
            .get(infos[seed].shader)
            .map(|s| s.lm_mergable)
            .unwrap_or(false);

        let mut lm = new_lightmap(&infos[seed], brightness);
        infos[seed].lm = Some(lm_index);

        if infos[seed].patch_iterations.is_some() {
            // Non-planar patches always finish their own lightmap.
            size_patch_lightmap(&mut lm, scene, &infos[seed], cfg, &mut resize_warnings);
            lightmaps.push(lm);
            continue;
        }

        // Fixed-point merge: a merge can grow the bounds and admit a
        // surface rejected earlier, so rescan until nothing changes.
        let mut changed = true;
        while changed {
            changed = false;
            for &cand in order.iter().skip(pos + 1) {
                if infos[cand].lm.is_some()
                    || !eligible(&infos[cand])
                    || infos[cand].patch_iterations.is_some()
                {
                    continue;
                }
                let seed_info = &infos[seed];
                if compatible(seed_info, &infos[cand], lm.bounds, mergable) {
                    lm.bounds = lm.bounds.union(infos[cand].bounds);
                    lm.surfaces.push(cand);
                    infos[cand].lm = Some(lm_index);
                    changed = true;
                }
            }
        }

        size_planar_lightmap(&mut lm, cfg, &mut resize_warnings);
        lightmaps.push(lm);
    }

    debug!(
        "grouped {} eligible surfaces into {} raw lightmaps",
        infos.iter().filter(|i| i.lm.is_some()).count(),
        lightmaps.len()
    );
    lightmaps
}

fn new_lightmap(seed: &SurfaceInfo, brightness: f32) -> RawLightmap {
    RawLightmap {
        surfaces: vec![seed.surface],
        entity: seed.entity,
        shader: seed.shader,
        sample_size: seed.sample_size,
        brightness,
        axis: seed.axis,
        plane: seed.plane,
        bounds: seed.bounds,
        patch: None,
        wrap: [false, false],
        w: 0,
        h: 0,
        sw: 0,
        sh: 0,
        origin: Vec3::ZERO,
        super_origins: Vec::new(),
        super_normals: Vec::new(),
        super_classes: Vec::new(),
        classes: Vec::new(),
        dirs: None,
        styles: StyleSet::default(),
        channels: Default::default(),
    }
}

fn warn_resized(lm_note: &str, sample_size: u32, warnings: &mut usize) {
    *warnings += 1;
    if *warnings <= MAX_RESIZE_WARNINGS {
        warn!(
            "{} exceeds page size, sample size grown to {}",
            lm_note, sample_size
        );
    } else {
        debug!(
            "{} exceeds page size, sample size grown to {}",
            lm_note, sample_size
        );
    }
}

/// Snaps the origin to the bounds corner and derives `(w,h)`; grows the
/// sample size until the lightmap fits a page.
fn size_planar_lightmap(lm: &mut RawLightmap, cfg: &BakeConfig, warnings: &mut usize) {
    let axis = lm.axis.unwrap_or(2);
    let (ts, tt) = tangent_axes(axis);
    loop {
        let sample = lm.sample_size as f32;
        let o_s = (lm.bounds.min.get(ts) / sample).floor() * sample;
        let o_t = (lm.bounds.min.get(tt) / sample).floor() * sample;
        let w = ((lm.bounds.max.get(ts) - o_s) / sample).ceil() as usize + 1;
        let h = ((lm.bounds.max.get(tt) - o_t) / sample).ceil() as usize + 1;
        if w > cfg.page_width || h > cfg.page_height {
            lm.sample_size += 1;
            warn_resized("planar lightmap", lm.sample_size, warnings);
            continue;
        }
        let mut origin = Vec3::ZERO;
        origin.set(ts, o_s);
        origin.set(tt, o_t);
        if let Some(plane) = lm.plane {
            if let Some(v) = plane.solve_axis(origin, axis) {
                origin.set(axis, v);
            }
        }
        lm.origin = origin;
        lm.w = w.max(2);
        lm.h = h.max(2);
        lm.sw = lm.w * cfg.supersample.max(1);
        lm.sh = lm.h * cfg.supersample.max(1);
        break;
    }
}

/// Refines the patch mesh and derives `(w,h)` from the longest row/column
/// arc length, decoupled from the control grid dimensions.
fn size_patch_lightmap(
    lm: &mut RawLightmap,
    scene: &Scene,
    seed: &SurfaceInfo,
    cfg: &BakeConfig,
    warnings: &mut usize,
) {
    let surf = &scene.surfaces[seed.surface];
    let SurfaceKind::Patch { width, height } = surf.kind else {
        return;
    };
    let points: Vec<_> = surf.verts.iter().map(|v| v.pos).collect();
    let control = PatchMesh::from_points(width, height, &points);
    lm.wrap = control.wraps();
    let mesh = control.refined(seed.patch_iterations.unwrap_or(0));
    let (row_len, col_len) = mesh.span_lengths();
    loop {
        let sample = lm.sample_size as f32;
        let w = (row_len / sample).ceil() as usize + 1;
        let h = (col_len / sample).ceil() as usize + 1;
        if w > cfg.page_width || h > cfg.page_height {
            lm.sample_size += 1;
            warn_resized("patch lightmap", lm.sample_size, warnings);
            continue;
        }
        lm.w = w.max(2);
        lm.h = h.max(2);
        lm.sw = lm.w * cfg.supersample.max(1);
        lm.sh = lm.h * cfg.supersample.max(1);
        break;
    }
    lm.patch = Some(mesh);
}
