use std::fs;

use lumel_bake::{BakeConfig, BakeContext};
use lumel_geom::{Aabb, Vec3};
use lumel_scene::{
    DirectSampler, Entity, IrradianceSampler, Leaf, LuxelClass, PointLight, SampleResult, Scene,
    ShaderCatalog, Surface, SurfaceKind, Vertex,
};

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

fn temp_out(name: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join("lumel_emit_tests").join(name);
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Identical grids for stacked quads: varies with x/y only.
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
                (origin.y.abs()).min(255.0),
                32.0,
            ],
            direction: Vec3::new(0.0, 0.0, 1.0),
        }
    }
    fn styles(&self) -> Vec<u8> {
        vec![0]
    }
}

#[test]
fn twin_surfaces_inherit_owner_placement() {
    let catalog = ShaderCatalog::from_toml_str("[shaders.wall]\n").unwrap();
    let mut scene = Scene {
        entities: vec![Entity::default()],
        surfaces: vec![
            quad(0.0, 0.0, 128.0, 96.0, 0.0, &catalog),
            quad(0.0, 0.0, 128.0, 96.0, 64.0, &catalog),
        ],
        lights: Vec::new(),
        leaves: Vec::new(),
    };
    let mut ctx = BakeContext::new(BakeConfig::default());
    let packer = ctx.run(&scene, &catalog, &GradientSampler);
    assert_eq!(ctx.lightmaps[1].channels[0].twin, Some((0, 0)));

    let out = temp_out("twins");
    lumel_emit::emit(
        &mut scene,
        &ctx.infos,
        &ctx.lightmaps,
        &packer,
        &catalog,
        &ctx.cfg,
        "twins",
        &out,
    )
    .unwrap();

    // The twin surface references the owner's page at the same offsets.
    assert_eq!(
        scene.surfaces[0].lightmap_num[0],
        scene.surfaces[1].lightmap_num[0]
    );
    for (a, b) in scene.surfaces[0]
        .verts
        .iter()
        .zip(scene.surfaces[1].verts.iter())
    {
        assert_eq!(a.lm_st[0], b.lm_st[0]);
        assert!(a.lm_st[0][0] >= 0.0 && a.lm_st[0][0] < 1.0);
    }
}

#[test]
fn styled_scene_emits_lump_and_shader_script() {
    let catalog = ShaderCatalog::from_toml_str(
        r#"
        [shaders.wall]
        [shaders.wall.styles]
        1 = "wave sin 0.5 0.5 0 1"
        "#,
    )
    .unwrap();
    let mut scene = Scene {
        entities: vec![Entity::default()],
        surfaces: vec![quad(0.0, 0.0, 256.0, 256.0, 0.0, &catalog)],
        lights: vec![
            PointLight {
                origin: Vec3::new(64.0, 64.0, 96.0),
                color: [300.0, 300.0, 300.0],
                style: 0,
            },
            PointLight {
                origin: Vec3::new(192.0, 192.0, 96.0),
                color: [200.0, 100.0, 50.0],
                style: 1,
            },
        ],
        leaves: vec![Leaf {
            bounds: Aabb::new(Vec3::new(-16.0, -16.0, -16.0), Vec3::splat(512.0)),
            cluster: 0,
            opaque: false,
            surfaces: vec![0],
        }],
    };

    let sampler = DirectSampler::new(&scene.lights, &scene.leaves);
    let mut ctx = BakeContext::new(BakeConfig::default());
    let packer = ctx.run(&scene, &catalog, &sampler);
    assert!(ctx.lightmaps[0].styles.count() >= 2, "style 1 never lit");

    let out = temp_out("styled");
    let result = lumel_emit::emit(
        &mut scene,
        &ctx.infos,
        &ctx.lightmaps,
        &packer,
        &catalog,
        &ctx.cfg,
        "styled",
        &out,
    )
    .unwrap();

    let lump = fs::read(out.join("styled.lm")).unwrap();
    assert_eq!(lump.len(), result.pages * 128 * 128 * 3);

    let script = fs::read_to_string(out.join("scripts/styled.shader")).unwrap();
    assert!(script.contains("styled_lm_0"));
    assert!(script.contains("rgbGen wave sin 0.5 0.5 0 1"));
    assert!(script.contains("blendFunc GL_SRC_ALPHA GL_ONE"));
    assert_eq!(scene.surfaces[0].generated_shader.as_deref(), Some("styled_lm_0"));
    assert_eq!(scene.surfaces[0].styles[1], 1);

    // Style-0 vertex data got rewritten into page space.
    for v in &scene.surfaces[0].verts {
        assert!(v.lm_st[0][0] > 0.0 && v.lm_st[0][0] < 1.0);
        assert!(v.color[0][0] > 0);
    }
}

#[test]
fn external_mode_writes_tga_pages() {
    let catalog = ShaderCatalog::from_toml_str("[shaders.wall]\n").unwrap();
    let mut scene = Scene {
        entities: vec![Entity::default()],
        surfaces: vec![quad(0.0, 0.0, 128.0, 128.0, 0.0, &catalog)],
        lights: Vec::new(),
        leaves: Vec::new(),
    };
    let mut ctx = BakeContext::new(BakeConfig {
        external: true,
        ..Default::default()
    });
    let packer = ctx.run(&scene, &catalog, &GradientSampler);

    let out = temp_out("external");
    let result = lumel_emit::emit(
        &mut scene,
        &ctx.infos,
        &ctx.lightmaps,
        &packer,
        &catalog,
        &ctx.cfg,
        "external",
        &out,
    )
    .unwrap();
    assert!(result.pages >= 1);
    let tga = fs::read(out.join("lm_0000.tga")).unwrap();
    assert_eq!(tga.len(), 18 + 128 * 128 * 3);
}
