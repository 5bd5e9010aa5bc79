//! Final output: page byte assembly, vertex UV/color rewrite, and the
//! generated shader script.
#![forbid(unsafe_code)]

pub mod script;
pub mod tga;

use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::info;
use lumel_atlas::AtlasPacker;
use lumel_bake::{BakeConfig, ChannelState, FillMode, RawLightmap, SurfaceInfo};
use lumel_geom::Vec3;
use lumel_scene::types::LIGHTMAP_BY_VERTEX;
use lumel_scene::{Scene, ShaderCatalog, Surface};

use script::{ShaderScript, StyleStage};

#[derive(Debug)]
pub enum EmitError {
    Io(io::Error),
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmitError::Io(e) => write!(f, "emit failed: {}", e),
        }
    }
}

impl Error for EmitError {}

impl From<io::Error> for EmitError {
    fn from(e: io::Error) -> Self {
        EmitError::Io(e)
    }
}

/// What the emitter produced, for the summary log.
#[derive(Debug, Default)]
pub struct EmitOutput {
    pub pages: usize,
    pub files: Vec<PathBuf>,
    pub styled_shaders: usize,
    pub vertex_only_surfaces: usize,
}

struct PageImage {
    rgb: Vec<u8>,
    dir: Option<Vec<u8>>,
}

/// Runs the whole emission step: fills page buffers, rewrites vertex UVs
/// and colors in place, writes the lump or external images, and the
/// generated shader script.
pub fn emit(
    scene: &mut Scene,
    infos: &[SurfaceInfo],
    lightmaps: &[RawLightmap],
    packer: &AtlasPacker,
    catalog: &ShaderCatalog,
    cfg: &BakeConfig,
    map_name: &str,
    out_dir: &Path,
) -> Result<EmitOutput, EmitError> {
    let mut out = EmitOutput::default();
    if cfg.deluxe && cfg.deluxe_mode != 0 {
        log::warn!("tangent-space deluxemaps not supported, emitting world-space directions");
    }
    let mut images = build_pages(lightmaps, packer, cfg);
    out.pages = images.len();

    rewrite_surfaces(scene, infos, lightmaps, cfg, &mut out);

    let mut shader_script = ShaderScript::new(map_name);
    synthesize_styled_shaders(
        scene,
        infos,
        lightmaps,
        catalog,
        cfg,
        map_name,
        &mut shader_script,
    );
    out.styled_shaders = shader_script.len();

    fs::create_dir_all(out_dir)?;
    if cfg.external {
        write_external(&images, cfg, out_dir, &mut out)?;
    } else {
        write_lump(&mut images, cfg, map_name, out_dir, &mut out)?;
    }

    let scripts_dir = out_dir.join("scripts");
    fs::create_dir_all(&scripts_dir)?;
    let script_path = scripts_dir.join(format!("{}.shader", map_name));
    shader_script.write(&script_path)?;
    out.files.push(script_path);

    info!(
        "emitted {} pages, {} styled shaders, {} vertex-only surfaces",
        out.pages, out.styled_shaders, out.vertex_only_surfaces
    );
    Ok(out)
}

#[inline]
fn color_byte(v: f32, floor: f32) -> u8 {
    v.max(floor).clamp(0.0, 255.0).round() as u8
}

#[inline]
fn dir_bytes(d: Vec3) -> [u8; 3] {
    let n = d.normalized();
    [
        ((n.x * 127.5) + 127.5).clamp(0.0, 255.0) as u8,
        ((n.y * 127.5) + 127.5).clamp(0.0, 255.0) as u8,
        ((n.z * 127.5) + 127.5).clamp(0.0, 255.0) as u8,
    ]
}

/// Follows a twin reference to the channel that owns the storage.
fn resolve(lightmaps: &[RawLightmap], li: usize, slot: usize) -> (usize, usize) {
    match lightmaps[li].channels[slot].twin {
        Some((o, os)) => (o, os),
        None => (li, slot),
    }
}

fn build_pages(lightmaps: &[RawLightmap], packer: &AtlasPacker, cfg: &BakeConfig) -> Vec<PageImage> {
    let background: [u8; 3] = match cfg.fill_mode {
        FillMode::Pink => [255, 0, 255],
        _ => [0, 0, 0],
    };
    let mut images: Vec<PageImage> = packer
        .pages
        .iter()
        .map(|p| PageImage {
            rgb: background.repeat(p.width * p.height),
            dir: cfg.deluxe.then(|| vec![127u8; p.width * p.height * 3]),
        })
        .collect();

    for lm in lightmaps {
        for slot in lm.styles.iter() {
            let ch = &lm.channels[slot];
            if ch.twin.is_some() || ch.state != ChannelState::Placed {
                continue;
            }
            let Some(p) = ch.placement else { continue };
            let page = &mut images[p.page];
            let pw = packer.pages[p.page].width;

            if ch.solid {
                let i = (p.y * pw + p.x) * 3;
                for k in 0..3 {
                    page.rgb[i + k] = color_byte(ch.solid_color[k], 0.0);
                }
                continue;
            }

            // Average of lit texels, for the fill debug mode.
            let avg = average_color(lm, slot);
            for dy in 0..lm.h {
                for dx in 0..lm.w {
                    let t = lm.idx(dx, dy);
                    let lit = lm.classes[t].is_lit();
                    if !lit && cfg.fill_mode != FillMode::Average {
                        continue;
                    }
                    let c = if lit { ch.colors[t] } else { avg };
                    let i = ((p.y + dy) * pw + p.x + dx) * 3;
                    for k in 0..3 {
                        page.rgb[i + k] = color_byte(c[k], 0.0);
                    }
                    if let (Some(dir_page), Some(dirs)) = (page.dir.as_mut(), lm.dirs.as_ref()) {
                        let db = dir_bytes(dirs[t]);
                        dir_page[i..i + 3].copy_from_slice(&db);
                    }
                }
            }
        }
    }
    images
}

fn average_color(lm: &RawLightmap, slot: usize) -> [f32; 3] {
    let ch = &lm.channels[slot];
    let mut sum = [0.0f32; 3];
    let mut n = 0u32;
    for (i, c) in ch.colors.iter().enumerate() {
        if lm.classes[i].is_lit() {
            for k in 0..3 {
                sum[k] += c[k];
            }
            n += 1;
        }
    }
    if n == 0 {
        return [0.0; 3];
    }
    let inv = 1.0 / n as f32;
    [sum[0] * inv, sum[1] * inv, sum[2] * inv]
}

/// Rewrites every surface's lightmap UVs and vertex colors in place.
fn rewrite_surfaces(
    scene: &mut Scene,
    infos: &[SurfaceInfo],
    lightmaps: &[RawLightmap],
    cfg: &BakeConfig,
    out: &mut EmitOutput,
) {
    let pw = cfg.page_width as f32;
    let ph = cfg.page_height as f32;
    for info in infos {
        let surf = &mut scene.surfaces[info.surface];
        let Some(li) = info.lm else {
            // Vertex-lit with no baked data: ambient under the floor.
            surf.lightmap_num[0] = LIGHTMAP_BY_VERTEX;
            for v in surf.verts.iter_mut() {
                for k in 0..3 {
                    v.color[0][k] = color_byte(cfg.ambient[k], cfg.min_light);
                }
            }
            out.vertex_only_surfaces += 1;
            continue;
        };
        let lm = &lightmaps[li];
        let ss = lm.supersample() as f32;

        if info.approximated {
            out.vertex_only_surfaces += 1;
        }

        for (ordinal, slot) in lm.styles.iter().enumerate() {
            let (oli, oslot) = resolve(lightmaps, li, slot);
            let owner = &lightmaps[oli];
            let ch = &owner.channels[oslot];
            surf.styles[ordinal] = lm.channels[slot].style;

            if info.approximated || ch.state == ChannelState::Approximated {
                surf.lightmap_num[ordinal] = LIGHTMAP_BY_VERTEX;
                write_vertex_colors(surf, lm, slot, ordinal, cfg);
                continue;
            }
            let Some(p) = ch.placement else {
                surf.lightmap_num[ordinal] = LIGHTMAP_BY_VERTEX;
                write_vertex_colors(surf, lm, slot, ordinal, cfg);
                continue;
            };
            surf.lightmap_num[ordinal] = p.page as i32;

            for vi in 0..surf.verts.len() {
                let uv = if ch.solid {
                    [(p.x as f32 + 0.5) / pw, (p.y as f32 + 0.5) / ph]
                } else {
                    let st = lm.vertex_st(surf, vi);
                    [
                        (p.x as f32 + st[0] / ss + 0.5) / pw,
                        (p.y as f32 + st[1] / ss + 0.5) / ph,
                    ]
                };
                surf.verts[vi].lm_st[ordinal] = uv;
            }
            write_vertex_colors(surf, lm, slot, ordinal, cfg);
        }
    }
}

/// Vertex colors from the lightmap lookup, clamped to the configured floor.
fn write_vertex_colors(
    surf: &mut Surface,
    lm: &RawLightmap,
    slot: usize,
    ordinal: usize,
    cfg: &BakeConfig,
) {
    for vi in 0..surf.verts.len() {
        let st = lm.vertex_st(surf, vi);
        let c = lm.sample_color(slot, st);
        for k in 0..3 {
            surf.verts[vi].color[ordinal][k] = color_byte(c[k], cfg.min_light);
        }
    }
}

/// Surfaces with more than one active style get a synthesized shader with
/// one blended stage per extra style.
fn synthesize_styled_shaders(
    scene: &mut Scene,
    infos: &[SurfaceInfo],
    lightmaps: &[RawLightmap],
    catalog: &ShaderCatalog,
    cfg: &BakeConfig,
    map_name: &str,
    script: &mut ShaderScript,
) {
    for info in infos {
        let Some(li) = info.lm else { continue };
        let lm = &lightmaps[li];
        if lm.styles.count() <= 1 {
            continue;
        }
        let Some(def) = catalog.get(lm.shader) else { continue };

        let slots: Vec<usize> = lm.styles.iter().collect();
        let (l0, s0) = resolve(lightmaps, li, slots[0]);
        let base_place = lightmaps[l0].channels[s0].placement;

        let mut stages = Vec::new();
        for &slot in slots.iter().skip(1) {
            let (oli, oslot) = resolve(lightmaps, li, slot);
            let ch = &lightmaps[oli].channels[oslot];
            let Some(p) = ch.placement else { continue };
            let page_map = if cfg.external {
                let stride = if cfg.deluxe { 2 } else { 1 };
                format!("maps/{}/lm_{:04}.tga", map_name, p.page * stride)
            } else {
                String::from("$lightmap")
            };
            let tc_offset = base_place.and_then(|bp| {
                if bp.x == p.x && bp.y == p.y {
                    None
                } else {
                    Some([
                        (p.x as f32 - bp.x as f32) / cfg.page_width as f32,
                        (p.y as f32 - bp.y as f32) / cfg.page_height as f32,
                    ])
                }
            });
            stages.push(StyleStage {
                style: lm.channels[slot].style,
                page_map,
                rgb_gen: def.rgb_gen(lm.channels[slot].style).to_string(),
                tc_offset,
            });
        }
        if stages.is_empty() {
            continue;
        }
        let name = script.styled_shader(&def.key, &stages);
        scene.surfaces[info.surface].generated_shader = Some(name);
    }
}

/// One contiguous lump, pages in index order, direction pages interleaved
/// when deluxemapping.
fn write_lump(
    images: &mut [PageImage],
    cfg: &BakeConfig,
    map_name: &str,
    out_dir: &Path,
    out: &mut EmitOutput,
) -> Result<(), EmitError> {
    let mut lump = Vec::with_capacity(images.len() * cfg.page_width * cfg.page_height * 3);
    for img in images.iter_mut() {
        lump.extend_from_slice(&img.rgb);
        if let Some(dir) = img.dir.take() {
            lump.extend_from_slice(&dir);
        }
    }
    let path = out_dir.join(format!("{}.lm", map_name));
    fs::write(&path, &lump)?;
    out.files.push(path);
    Ok(())
}

/// Standalone images named `lm_NNNN.tga`; with deluxemapping the direction
/// page takes the next index.
fn write_external(
    images: &[PageImage],
    cfg: &BakeConfig,
    out_dir: &Path,
    out: &mut EmitOutput,
) -> Result<(), EmitError> {
    let stride = if cfg.deluxe { 2 } else { 1 };
    for (n, img) in images.iter().enumerate() {
        let path = out_dir.join(format!("lm_{:04}.tga", n * stride));
        tga::write_tga(&path, cfg.page_width, cfg.page_height, &img.rgb, cfg.flip_external)?;
        out.files.push(path);
        if let Some(dir) = img.dir.as_ref() {
            let path = out_dir.join(format!("lm_{:04}.tga", n * stride + 1));
            tga::write_tga(&path, cfg.page_width, cfg.page_height, dir, cfg.flip_external)?;
            out.files.push(path);
        }
    }
    Ok(())
}
