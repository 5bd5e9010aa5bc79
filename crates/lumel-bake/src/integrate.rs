//! Supersampled irradiance integration: texel mapping, classification,
//! sampling, downsampling with hole fill, wrap seams, and solid collapse.

use log::debug;
use lumel_geom::Vec3;
use lumel_scene::{IrradianceSampler, LuxelClass, Scene, MAX_STYLES};
use rayon::prelude::*;

use crate::config::BakeConfig;
use crate::constants::{BARY_EPSILON, OCCLUDED_NUDGE_TRIES, SAMPLE_OFFSET, SOLID_EPSILON};
use crate::info::SurfaceInfo;
use crate::lightmap::RawLightmap;

/// Fills every raw lightmap's channels from the sampler. Each lightmap's
/// buffers are exclusively owned by one task; the pass is a hard barrier,
/// nothing downstream starts until all lightmaps committed.
pub fn integrate_lightmaps(
    lightmaps: &mut [RawLightmap],
    infos: &[SurfaceInfo],
    scene: &Scene,
    sampler: &dyn IrradianceSampler,
    cfg: &BakeConfig,
) {
    let styles = sampler.styles();
    lightmaps
        .par_iter_mut()
        .for_each(|lm| integrate_one(lm, infos, scene, sampler, cfg, &styles));
    let texels: usize = lightmaps.iter().map(|lm| lm.w * lm.h).sum();
    debug!(
        "integrated {} lightmaps, {} final texels",
        lightmaps.len(),
        texels
    );
}

fn integrate_one(
    lm: &mut RawLightmap,
    infos: &[SurfaceInfo],
    scene: &Scene,
    sampler: &dyn IrradianceSampler,
    cfg: &BakeConfig,
    styles: &[u8],
) {
    let supers = lm.sw * lm.sh;
    lm.super_origins = vec![Vec3::ZERO; supers];
    lm.super_normals = vec![Vec3::ZERO; supers];
    lm.super_classes = vec![LuxelClass::Unmapped; supers];

    map_texels(lm, infos, scene);
    classify_texels(lm, sampler);

    let mut super_dirs = if cfg.deluxe {
        Some(vec![Vec3::ZERO; supers])
    } else {
        None
    };

    // Sample every style present in the scene; channels that stay dark are
    // deactivated below instead of wasting page space.
    for (slot, &style) in styles.iter().take(MAX_STYLES).enumerate() {
        let ch = &mut lm.channels[slot];
        ch.style = style;
        ch.super_colors = vec![[0.0; 3]; supers];
        let mut lit_any = style == 0;
        for i in 0..supers {
            if !lm.super_classes[i].is_lit() && lm.super_classes[i] != LuxelClass::Occluded {
                continue;
            }
            let r = sampler.sample(lm.super_origins[i], lm.super_normals[i], style);
            ch.super_colors[i] = r.color;
            if r.color[0].max(r.color[1]).max(r.color[2]) > 0.5 {
                lit_any = true;
            }
            if style == 0 {
                if let Some(dirs) = super_dirs.as_mut() {
                    dirs[i] += r.direction;
                }
            }
        }
        if lit_any {
            lm.styles.set(slot);
        } else {
            ch.super_colors = Vec::new();
        }
    }

    downsample(lm, cfg, super_dirs.as_deref());
    fill_holes(lm, cfg);
    apply_wrap(lm);
    detect_solid(lm);

    // Accumulation buffers are dead weight from here on.
    for slot in 0..MAX_STYLES {
        lm.channels[slot].super_colors = Vec::new();
    }
}

/// Rasterizes member surfaces into the super grid, recording a world origin
/// and normal per covered texel. Patches cover their whole parameter
/// rectangle; planar groups cover the union of their triangles.
fn map_texels(lm: &mut RawLightmap, infos: &[SurfaceInfo], scene: &Scene) {
    let ss = lm.supersample();
    if let Some(mesh) = lm.patch.take() {
        let s_max = (lm.w - 1) * ss;
        let t_max = (lm.h - 1) * ss;
        for sy in 0..=t_max.min(lm.sh - 1) {
            for sx in 0..=s_max.min(lm.sw - 1) {
                let u = sx as f32 / s_max.max(1) as f32;
                let v = sy as f32 / t_max.max(1) as f32;
                let (pos, normal) = mesh.eval(u, v);
                let i = lm.sidx(sx, sy);
                lm.super_origins[i] = pos + normal * SAMPLE_OFFSET;
                lm.super_normals[i] = normal;
                lm.super_classes[i] = LuxelClass::Flooded;
            }
        }
        lm.patch = Some(mesh);
        return;
    }

    let normal = lm.plane.map(|p| p.normal).unwrap_or(Vec3::new(0.0, 0.0, 1.0));
    let members = lm.surfaces.clone();
    for info_idx in members {
        let surf = &scene.surfaces[infos[info_idx].surface];
        for tri in surf.triangles() {
            let st: Vec<[f32; 2]> = tri
                .iter()
                .map(|&vi| lm.st_of(surf.verts[vi as usize].pos))
                .collect();
            rasterize_triangle(lm, &st, normal);
        }
    }
}

/// Stamps one triangle's super-texels. Barycentric test with slack so
/// texels straddling an edge still map; first mapping wins.
fn rasterize_triangle(lm: &mut RawLightmap, st: &[[f32; 2]], normal: Vec3) {
    let min_x = st.iter().map(|p| p[0]).fold(f32::MAX, f32::min);
    let max_x = st.iter().map(|p| p[0]).fold(f32::MIN, f32::max);
    let min_y = st.iter().map(|p| p[1]).fold(f32::MAX, f32::min);
    let max_y = st.iter().map(|p| p[1]).fold(f32::MIN, f32::max);
    let x0 = (min_x.floor().max(0.0)) as usize;
    let y0 = (min_y.floor().max(0.0)) as usize;
    let x1 = (max_x.ceil() as isize).clamp(0, lm.sw as isize - 1) as usize;
    let y1 = (max_y.ceil() as isize).clamp(0, lm.sh as isize - 1) as usize;

    let ax = st[1][0] - st[0][0];
    let ay = st[1][1] - st[0][1];
    let bx = st[2][0] - st[0][0];
    let by = st[2][1] - st[0][1];
    let denom = ax * by - ay * bx;
    if denom.abs() <= f32::EPSILON {
        return;
    }

    for y in y0..=y1 {
        for x in x0..=x1 {
            let i = lm.sidx(x, y);
            if lm.super_classes[i] != LuxelClass::Unmapped {
                continue;
            }
            let px = x as f32 - st[0][0];
            let py = y as f32 - st[0][1];
            let b1 = (px * by - py * bx) / denom;
            let b2 = (ax * py - ay * px) / denom;
            let b0 = 1.0 - b1 - b2;
            if b0 < -BARY_EPSILON || b1 < -BARY_EPSILON || b2 < -BARY_EPSILON {
                continue;
            }
            let origin = lm.world_of(x as f32, y as f32) + normal * SAMPLE_OFFSET;
            lm.super_origins[i] = origin;
            lm.super_normals[i] = normal;
            // Real classification happens in the next step.
            lm.super_classes[i] = LuxelClass::Flooded;
        }
    }
}

/// Replaces the mapping placeholder with the sampler's classification.
/// Occluded origins get nudged toward the group centroid before giving up.
fn classify_texels(lm: &mut RawLightmap, sampler: &dyn IrradianceSampler) {
    let center = lm.bounds.center();
    for i in 0..lm.super_classes.len() {
        if lm.super_classes[i] == LuxelClass::Unmapped {
            continue;
        }
        let mut origin = lm.super_origins[i];
        let mut class = sampler.classify(origin);
        if class == LuxelClass::Occluded {
            for step in 1..=OCCLUDED_NUDGE_TRIES {
                let t = step as f32 / OCCLUDED_NUDGE_TRIES as f32 * 0.5;
                let p = origin + (center - origin) * t;
                let c = sampler.classify(p);
                if c != LuxelClass::Occluded {
                    origin = p;
                    class = c;
                    break;
                }
            }
        }
        lm.super_origins[i] = origin;
        lm.super_classes[i] = class;
    }
}

#[inline]
fn class_rank(c: LuxelClass) -> u8 {
    match c {
        LuxelClass::Mapped(_) => 3,
        LuxelClass::Flooded => 2,
        LuxelClass::Occluded => 1,
        LuxelClass::Unmapped => 0,
    }
}

/// Averages each `S x S` block into a final texel, preferring lit samples;
/// occluded samples are a fallback used only when the block has no lit ones.
fn downsample(lm: &mut RawLightmap, cfg: &BakeConfig, super_dirs: Option<&[Vec3]>) {
    let ss = lm.supersample();
    let texels = lm.w * lm.h;
    lm.classes = vec![LuxelClass::Unmapped; texels];
    if cfg.deluxe {
        lm.dirs = Some(vec![Vec3::ZERO; texels]);
    }

    // Final class per texel, shared by all styles.
    for y in 0..lm.h {
        for x in 0..lm.w {
            let mut best = LuxelClass::Unmapped;
            for by in 0..ss {
                for bx in 0..ss {
                    let c = lm.super_classes[lm.sidx(x * ss + bx, y * ss + by)];
                    if class_rank(c) > class_rank(best) {
                        best = c;
                    }
                }
            }
            let i = lm.idx(x, y);
            lm.classes[i] = best;
            if let (Some(dirs), Some(sd)) = (lm.dirs.as_mut(), super_dirs) {
                let mut acc = Vec3::ZERO;
                for by in 0..ss {
                    for bx in 0..ss {
                        let si = (y * ss + by) * lm.sw + x * ss + bx;
                        if lm.super_classes[si].is_lit() {
                            acc += sd[si];
                        }
                    }
                }
                dirs[i] = acc;
            }
        }
    }

    let super_classes = lm.super_classes.clone();
    for slot in lm.styles.iter() {
        let sw = lm.sw;
        let ch = &mut lm.channels[slot];
        let mut colors = vec![[0.0f32; 3]; texels];
        for y in 0..lm.h {
            for x in 0..lm.w {
                let mut lit_sum = [0.0f32; 3];
                let mut lit_n = 0u32;
                let mut occ_sum = [0.0f32; 3];
                let mut occ_n = 0u32;
                for by in 0..ss {
                    for bx in 0..ss {
                        let si = (y * ss + by) * sw + x * ss + bx;
                        let c = &ch.super_colors[si];
                        match super_classes[si] {
                            LuxelClass::Mapped(_) | LuxelClass::Flooded => {
                                lit_sum[0] += c[0];
                                lit_sum[1] += c[1];
                                lit_sum[2] += c[2];
                                lit_n += 1;
                            }
                            LuxelClass::Occluded => {
                                occ_sum[0] += c[0];
                                occ_sum[1] += c[1];
                                occ_sum[2] += c[2];
                                occ_n += 1;
                            }
                            LuxelClass::Unmapped => {}
                        }
                    }
                }
                let out = &mut colors[y * lm.w + x];
                if lit_n > 0 {
                    let inv = 1.0 / lit_n as f32;
                    *out = [lit_sum[0] * inv, lit_sum[1] * inv, lit_sum[2] * inv];
                } else if occ_n > 0 {
                    let inv = 1.0 / occ_n as f32;
                    *out = [occ_sum[0] * inv, occ_sum[1] * inv, occ_sum[2] * inv];
                }
            }
        }
        ch.colors = colors;
    }
}

/// Single-pass hole fill: dead texels borrow the average of their already
/// resolved 4-neighbors and turn `Flooded`; anything still empty afterwards
/// gets the ambient constant but stays unmapped.
fn fill_holes(lm: &mut RawLightmap, cfg: &BakeConfig) {
    let (w, h) = (lm.w, lm.h);
    let slots: Vec<usize> = lm.styles.iter().collect();
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            if lm.classes[i].is_lit() {
                continue;
            }
            let mut neighbors = Vec::with_capacity(4);
            if x > 0 && lm.classes[i - 1].is_lit() {
                neighbors.push(i - 1);
            }
            if x + 1 < w && lm.classes[i + 1].is_lit() {
                neighbors.push(i + 1);
            }
            if y > 0 && lm.classes[i - w].is_lit() {
                neighbors.push(i - w);
            }
            if y + 1 < h && lm.classes[i + w].is_lit() {
                neighbors.push(i + w);
            }
            if neighbors.is_empty() {
                for &slot in &slots {
                    lm.channels[slot].colors[i] = cfg.ambient;
                }
                continue;
            }
            let inv = 1.0 / neighbors.len() as f32;
            for &slot in &slots {
                let mut acc = [0.0f32; 3];
                for &n in &neighbors {
                    let c = lm.channels[slot].colors[n];
                    acc[0] += c[0];
                    acc[1] += c[1];
                    acc[2] += c[2];
                }
                lm.channels[slot].colors[i] = [acc[0] * inv, acc[1] * inv, acc[2] * inv];
            }
            if let Some(dirs) = lm.dirs.as_mut() {
                let mut acc = Vec3::ZERO;
                for &n in &neighbors {
                    acc += dirs[n];
                }
                dirs[i] = acc * inv;
            }
            lm.classes[i] = LuxelClass::Flooded;
        }
    }
}

/// Averages coinciding edge rows/columns so wrapped parameterizations stay
/// seamless under bilinear filtering.
fn apply_wrap(lm: &mut RawLightmap) {
    let (w, h) = (lm.w, lm.h);
    let slots: Vec<usize> = lm.styles.iter().collect();
    if lm.wrap[0] && w >= 2 {
        for y in 0..h {
            let a = y * w;
            let b = y * w + w - 1;
            for &slot in &slots {
                let ch = &mut lm.channels[slot];
                let avg = [
                    (ch.colors[a][0] + ch.colors[b][0]) * 0.5,
                    (ch.colors[a][1] + ch.colors[b][1]) * 0.5,
                    (ch.colors[a][2] + ch.colors[b][2]) * 0.5,
                ];
                ch.colors[a] = avg;
                ch.colors[b] = avg;
            }
            let best = if class_rank(lm.classes[a]) >= class_rank(lm.classes[b]) {
                lm.classes[a]
            } else {
                lm.classes[b]
            };
            lm.classes[a] = best;
            lm.classes[b] = best;
        }
    }
    if lm.wrap[1] && h >= 2 {
        for x in 0..w {
            let a = x;
            let b = (h - 1) * w + x;
            for &slot in &slots {
                let ch = &mut lm.channels[slot];
                let avg = [
                    (ch.colors[a][0] + ch.colors[b][0]) * 0.5,
                    (ch.colors[a][1] + ch.colors[b][1]) * 0.5,
                    (ch.colors[a][2] + ch.colors[b][2]) * 0.5,
                ];
                ch.colors[a] = avg;
                ch.colors[b] = avg;
            }
            let best = if class_rank(lm.classes[a]) >= class_rank(lm.classes[b]) {
                lm.classes[a]
            } else {
                lm.classes[b]
            };
            lm.classes[a] = best;
            lm.classes[b] = best;
        }
    }
}

/// Collapses channels whose lit texels span less than `SOLID_EPSILON` per
/// component (or whose grid is at most 2x2) to a single color.
fn detect_solid(lm: &mut RawLightmap) {
    let tiny = lm.w <= 2 && lm.h <= 2;
    let classes = &lm.classes;
    for slot in lm.styles.iter() {
        let ch = &mut lm.channels[slot];
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        let mut sum = [0.0f32; 3];
        let mut n = 0u32;
        for (i, c) in ch.colors.iter().enumerate() {
            if !classes[i].is_lit() {
                continue;
            }
            for k in 0..3 {
                min[k] = min[k].min(c[k]);
                max[k] = max[k].max(c[k]);
                sum[k] += c[k];
            }
            n += 1;
        }
        if n == 0 {
            continue;
        }
        let span_ok = (0..3).all(|k| max[k] - min[k] < SOLID_EPSILON);
        if tiny || span_ok {
            let inv = 1.0 / n as f32;
            ch.solid = true;
            ch.solid_color = [sum[0] * inv, sum[1] * inv, sum[2] * inv];
        }
    }
}
