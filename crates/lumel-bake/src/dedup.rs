//! Twin detection: channels with (near-)identical content are stored once,
//! later channels merely reference the earlier owner's placement.

use log::debug;
use lumel_scene::LuxelClass;

use crate::config::BakeConfig;
use crate::constants::{LUXEL_TOLERANCE, SOLID_EPSILON};
use crate::lightmap::{ChannelState, RawLightmap};

/// Pairwise earlier-vs-later comparison over every unresolved channel.
/// Returns the number of twins created. Purely an optimization; channels
/// that fail to merge simply keep their own storage.
pub fn deduplicate_lightmaps(lightmaps: &mut [RawLightmap], cfg: &BakeConfig) -> usize {
    if cfg.no_collapse {
        return 0;
    }
    let mut pairs: Vec<(usize, usize)> = Vec::new();
    for (li, lm) in lightmaps.iter().enumerate() {
        for slot in lm.styles.iter() {
            pairs.push((li, slot));
        }
    }

    let mut twins = 0usize;
    for j in 1..pairs.len() {
        let (lj, sj) = pairs[j];
        {
            let ch = &lightmaps[lj].channels[sj];
            if ch.twin.is_some() || ch.state != ChannelState::Unplaced {
                continue;
            }
        }
        for &(li, si) in pairs.iter().take(j) {
            if li == lj {
                // Channels of one lightmap share storage already.
                continue;
            }
            if !owner_candidate(lightmaps, li, si, lj, sj, cfg) {
                continue;
            }
            let merged = if lightmaps[li].channels[si].solid {
                merge_solid(lightmaps, li, si, lj, sj)
            } else {
                merge_grids(lightmaps, li, si, lj, sj)
            };
            if merged {
                let owner_state = lightmaps[li].channels[si].solid;
                let ch = &mut lightmaps[lj].channels[sj];
                ch.twin = Some((li, si));
                if owner_state {
                    ch.state = ChannelState::SolidInline;
                }
                twins += 1;
                break;
            }
        }
    }
    debug!("deduplicated {} twin channels", twins);
    twins
}

/// Compatibility gate before any texel comparison.
fn owner_candidate(
    lightmaps: &[RawLightmap],
    li: usize,
    si: usize,
    lj: usize,
    sj: usize,
    cfg: &BakeConfig,
) -> bool {
    let a = &lightmaps[li];
    let b = &lightmaps[lj];
    let ca = &a.channels[si];
    let cb = &b.channels[sj];
    if ca.twin.is_some() || ca.state != ChannelState::Unplaced {
        return false;
    }
    if a.w != b.w || a.h != b.h || a.brightness != b.brightness || ca.solid != cb.solid {
        return false;
    }
    // With a minimum-light floor configured, styled channels keep their
    // own storage apart from style-0 channels to preserve style semantics.
    if cfg.min_light > 0.0 && (ca.style != 0) != (cb.style != 0) {
        return false;
    }
    true
}

fn merge_solid(lightmaps: &mut [RawLightmap], li: usize, si: usize, lj: usize, sj: usize) -> bool {
    let a = lightmaps[li].channels[si].solid_color;
    let b = lightmaps[lj].channels[sj].solid_color;
    for k in 0..3 {
        if (a[k] - b[k]).abs() >= SOLID_EPSILON {
            return false;
        }
    }
    let avg = [
        (a[0] + b[0]) * 0.5,
        (a[1] + b[1]) * 0.5,
        (a[2] + b[2]) * 0.5,
    ];
    lightmaps[li].channels[si].solid_color = avg;
    lightmaps[lj].channels[sj].solid_color = avg;
    true
}

/// Texel-by-texel comparison under a normalized difference budget, then an
/// occlusion-aware merge. Texels valid on exactly one side are never a
/// mismatch: the valid value is propagated to both lightmaps.
fn merge_grids(lightmaps: &mut [RawLightmap], li: usize, si: usize, lj: usize, sj: usize) -> bool {
    let texels = lightmaps[li].w * lightmaps[li].h;
    let budget = LUXEL_TOLERANCE * texels as f32;
    let mut total = 0.0f32;
    for i in 0..texels {
        let va = lightmaps[li].classes[i].is_lit();
        let vb = lightmaps[lj].classes[i].is_lit();
        if !va || !vb {
            continue;
        }
        let ca = lightmaps[li].channels[si].colors[i];
        let cb = lightmaps[lj].channels[sj].colors[i];
        let mut diff = 0.0f32;
        for k in 0..3 {
            diff = diff.max((ca[k] - cb[k]).abs());
        }
        total += diff;
        if total > budget {
            return false;
        }
    }

    for i in 0..texels {
        let va = lightmaps[li].classes[i].is_lit();
        let vb = lightmaps[lj].classes[i].is_lit();
        match (va, vb) {
            (true, true) => {
                let ca = lightmaps[li].channels[si].colors[i];
                let cb = lightmaps[lj].channels[sj].colors[i];
                let avg = [
                    (ca[0] + cb[0]) * 0.5,
                    (ca[1] + cb[1]) * 0.5,
                    (ca[2] + cb[2]) * 0.5,
                ];
                lightmaps[li].channels[si].colors[i] = avg;
                lightmaps[lj].channels[sj].colors[i] = avg;
            }
            (true, false) => {
                let ca = lightmaps[li].channels[si].colors[i];
                lightmaps[lj].channels[sj].colors[i] = ca;
                lightmaps[lj].classes[i] = LuxelClass::Flooded;
            }
            (false, true) => {
                let cb = lightmaps[lj].channels[sj].colors[i];
                lightmaps[li].channels[si].colors[i] = cb;
                lightmaps[li].classes[i] = LuxelClass::Flooded;
            }
            (false, false) => {}
        }
    }
    true
}
