use lumel_bake::{dedup, BakeConfig, BakeContext, ChannelState};
use lumel_geom::Vec3;
use lumel_scene::{
    Entity, IrradianceSampler, LuxelClass, SampleResult, Scene, ShaderCatalog, Surface,
    SurfaceKind, Vertex,
};

/// Everything lit the same: forces solid channels everywhere.
struct UniformSampler {
    color: [f32; 3],
}

impl IrradianceSampler for UniformSampler {
    fn classify(&self, _p: Vec3) -> LuxelClass {
        LuxelClass::Mapped(0)
    }
    fn sample(&self, _origin: Vec3, _normal: Vec3, style: u8) -> SampleResult {
        SampleResult {
            color: if style == 0 { self.color } else { [0.0; 3] },
            direction: Vec3::new(0.0, 0.0, 1.0),
        }
    }
    fn styles(&self) -> Vec<u8> {
        vec![0]
    }
}

/// Light varies with world x/y but not z, so stacked surfaces bake
/// texel-identical grids.
struct GradientSampler;

impl IrradianceSampler for GradientSampler {
    fn classify(&self, _p: Vec3) -> LuxelClass {
        LuxelClass::Mapped(0)
    }
    fn sample(&self, origin: Vec3, _normal: Vec3, style: u8) -> SampleResult {
        if style != 0 {
            return SampleResult::default();
        }
        SampleResult {
            color: [
                (origin.x.abs() * 2.0).min(255.0),
                (origin.y.abs() * 2.0).min(255.0),
                64.0,
            ],
            direction: Vec3::new(0.0, 0.0, 1.0),
        }
    }
    fn styles(&self) -> Vec<u8> {
        vec![0]
    }
}

fn wall_catalog() -> ShaderCatalog {
    ShaderCatalog::from_toml_str("[shaders.wall]\n").unwrap()
}

fn quad(x0: f32, y0: f32, x1: f32, y1: f32, z: f32, catalog: &ShaderCatalog) -> Surface {
    let shader = catalog.get_id("wall").unwrap();
    let verts = vec![
        Vertex::at(Vec3::new(x0, y0, z)),
        Vertex::at(Vec3::new(x1, y0, z)),
        Vertex::at(Vec3::new(x1, y1, z)),
        Vertex::at(Vec3::new(x0, y1, z)),
    ];
    Surface::new(
        shader,
        0,
        verts,
        SurfaceKind::Planar {
            indices: vec![0, 1, 2, 0, 2, 3],
        },
    )
}

fn scene_of(surfaces: Vec<Surface>) -> Scene {
    Scene {
        entities: vec![Entity::default()],
        surfaces,
        lights: Vec::new(),
        leaves: Vec::new(),
    }
}

#[test]
fn projection_roundtrips_quad_corners() {
    let catalog = wall_catalog();
    let scene = scene_of(vec![quad(0.0, 0.0, 96.0, 64.0, 8.0, &catalog)]);
    let mut ctx = BakeContext::new(BakeConfig {
        supersample: 2,
        ..Default::default()
    });
    ctx.run(&scene, &catalog, &UniformSampler { color: [64.0; 3] });

    let lm = &ctx.lightmaps[0];
    for v in &scene.surfaces[0].verts {
        let st = lm.st_of(v.pos);
        let back = lm.world_of(st[0], st[1]);
        assert!(
            back.distance(v.pos) < 1e-4,
            "{:?} -> {:?} -> {:?}",
            v.pos,
            st,
            back
        );
    }
}

#[test]
fn supersample_dims_hold_for_every_lightmap() {
    let catalog = wall_catalog();
    let scene = scene_of(vec![
        quad(0.0, 0.0, 64.0, 64.0, 0.0, &catalog),
        quad(0.0, 0.0, 48.0, 32.0, 32.0, &catalog),
        quad(0.0, 0.0, 160.0, 96.0, 64.0, &catalog),
    ]);
    let mut ctx = BakeContext::new(BakeConfig {
        supersample: 3,
        ..Default::default()
    });
    ctx.run(&scene, &catalog, &UniformSampler { color: [32.0; 3] });
    for lm in &ctx.lightmaps {
        assert_eq!(lm.sw, lm.w * 3);
        assert_eq!(lm.sh, lm.h * 3);
    }
}

#[test]
fn uniform_light_always_flags_solid() {
    let catalog = wall_catalog();
    // Large lightmap: solidity must come from the color span, not from the
    // tiny-grid shortcut.
    let scene = scene_of(vec![quad(0.0, 0.0, 512.0, 512.0, 0.0, &catalog)]);
    let mut ctx = BakeContext::new(BakeConfig::default());
    ctx.run(&scene, &catalog, &UniformSampler { color: [80.0; 3] });
    let lm = &ctx.lightmaps[0];
    assert!(lm.w > 2 && lm.h > 2);
    let ch = &lm.channels[0];
    assert!(ch.solid);
    for k in 0..3 {
        assert!((ch.solid_color[k] - 80.0).abs() < 1.0);
    }
}

#[test]
fn solid_channels_store_one_authoritative_color() {
    let catalog = wall_catalog();
    let scene = scene_of(vec![quad(0.0, 0.0, 128.0, 128.0, 0.0, &catalog)]);
    let mut ctx = BakeContext::new(BakeConfig::default());
    let packer = ctx.run(&scene, &catalog, &UniformSampler { color: [50.0; 3] });
    // A solid channel occupies a 1x1 stamp regardless of (w, h).
    assert_eq!(packer.pages.len(), 1);
    assert_eq!(packer.pages[0].free, 128 * 128 - 1);
}

#[test]
fn identical_grids_merge_into_twins_idempotently() {
    let catalog = wall_catalog();
    // Two stacked 32x32-luxel quads: identical texel grids under
    // GradientSampler.
    let scene = scene_of(vec![
        quad(0.0, 0.0, 496.0, 496.0, 0.0, &catalog),
        quad(0.0, 0.0, 496.0, 496.0, 64.0, &catalog),
    ]);
    let mut ctx = BakeContext::new(BakeConfig::default());
    ctx.run(&scene, &catalog, &GradientSampler);

    assert_eq!(ctx.lightmaps.len(), 2);
    assert_eq!((ctx.lightmaps[0].w, ctx.lightmaps[0].h), (32, 32));
    assert!(!ctx.lightmaps[0].channels[0].solid);
    assert_eq!(ctx.lightmaps[1].channels[0].twin, Some((0, 0)));
    assert!(ctx.lightmaps[1].channels[0].placement.is_none());
    assert!(ctx.lightmaps[0].channels[0].placement.is_some());

    // Re-running the pass creates no new merges.
    let again = dedup::deduplicate_lightmaps(&mut ctx.lightmaps, &ctx.cfg);
    assert_eq!(again, 0);
}

#[test]
fn oversized_lightmap_grows_sample_size_until_it_fits() {
    let catalog = wall_catalog();
    // 130 x 40 luxels at the default sample size of 16.
    let scene = scene_of(vec![quad(0.0, 0.0, 16.0 * 129.0, 16.0 * 39.0, 0.0, &catalog)]);
    let mut ctx = BakeContext::new(BakeConfig::default());
    ctx.run(&scene, &catalog, &UniformSampler { color: [32.0; 3] });
    let lm = &ctx.lightmaps[0];
    assert!(lm.w <= 128, "w = {}", lm.w);
    assert!(lm.h <= 128);
    assert!(lm.sample_size > 16);
}

#[test]
fn flat_uniform_surface_approximates_to_vertex_colors() {
    let catalog = wall_catalog();
    let scene = scene_of(vec![quad(0.0, 0.0, 96.0, 96.0, 0.0, &catalog)]);
    let mut ctx = BakeContext::new(BakeConfig {
        approximate_tolerance: 8.0,
        subdivide_threshold: 8.0,
        ..Default::default()
    });
    let packer = ctx.run(&scene, &catalog, &UniformSampler { color: [100.0; 3] });
    assert_eq!(
        ctx.lightmaps[0].channels[0].state,
        ChannelState::Approximated
    );
    assert!(ctx.infos[0].approximated);
    // Fully approximated: zero atlas texels allocated.
    assert!(packer.pages.is_empty());
}

#[test]
fn patch_surface_bakes_and_places() {
    let catalog = wall_catalog();
    let shader = catalog.get_id("wall").unwrap();
    // A curved 3x3 patch spanning 128 units with a raised middle column.
    let mut verts = Vec::new();
    for r in 0..3 {
        for c in 0..3 {
            let mut p = Vec3::new(c as f32 * 64.0, r as f32 * 64.0, 0.0);
            if c == 1 {
                p.z = 32.0;
            }
            verts.push(Vertex::at(p));
        }
    }
    let surf = Surface::new(
        shader,
        0,
        verts,
        SurfaceKind::Patch {
            width: 3,
            height: 3,
        },
    );
    let scene = scene_of(vec![surf]);
    let mut ctx = BakeContext::new(BakeConfig::default());
    let packer = ctx.run(&scene, &catalog, &GradientSampler);

    let lm = &ctx.lightmaps[0];
    assert!(lm.patch.is_some());
    assert!(lm.w >= 2 && lm.h >= 2);
    assert_eq!(lm.channels[0].state, ChannelState::Placed);
    assert_eq!(packer.pages.len(), 1);
}
