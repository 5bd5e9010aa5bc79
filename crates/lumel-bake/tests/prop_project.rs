use lumel_bake::{BakeConfig, BakeContext};
use lumel_geom::Vec3;
use lumel_scene::{
    Entity, IrradianceSampler, LuxelClass, SampleResult, Scene, ShaderCatalog, Surface,
    SurfaceKind, Vertex,
};
use proptest::prelude::*;

struct FlatSampler;

impl IrradianceSampler for FlatSampler {
    fn classify(&self, _p: Vec3) -> LuxelClass {
        LuxelClass::Mapped(0)
    }
    fn sample(&self, _origin: Vec3, _normal: Vec3, _style: u8) -> SampleResult {
        SampleResult {
            color: [32.0; 3],
            direction: Vec3::new(0.0, 0.0, 1.0),
        }
    }
    fn styles(&self) -> Vec<u8> {
        vec![0]
    }
}

fn quad_scene(x0: f32, y0: f32, w: f32, h: f32, z: f32) -> (Scene, ShaderCatalog) {
    let catalog = ShaderCatalog::from_toml_str("[shaders.wall]\n").unwrap();
    let shader = catalog.get_id("wall").unwrap();
    let verts = vec![
        Vertex::at(Vec3::new(x0, y0, z)),
        Vertex::at(Vec3::new(x0 + w, y0, z)),
        Vertex::at(Vec3::new(x0 + w, y0 + h, z)),
        Vertex::at(Vec3::new(x0, y0 + h, z)),
    ];
    let surf = Surface::new(
        shader,
        0,
        verts,
        SurfaceKind::Planar {
            indices: vec![0, 1, 2, 0, 2, 3],
        },
    );
    let scene = Scene {
        entities: vec![Entity::default()],
        surfaces: vec![surf],
        lights: Vec::new(),
        leaves: Vec::new(),
    };
    (scene, catalog)
}

proptest! {
    // Projection is a bijection on the texel grid: surface points map to
    // (s,t) and back within tolerance, for arbitrary quads and factors.
    #[test]
    fn planar_projection_roundtrips(
        x0 in -128.0f32..128.0,
        y0 in -128.0f32..128.0,
        w in 8.0f32..256.0,
        h in 8.0f32..256.0,
        z in -64.0f32..64.0,
        supersample in 1usize..4,
    ) {
        let (scene, catalog) = quad_scene(x0, y0, w, h, z);
        let mut ctx = BakeContext::new(BakeConfig {
            supersample,
            ..Default::default()
        });
        ctx.run(&scene, &catalog, &FlatSampler);
        prop_assert_eq!(ctx.lightmaps.len(), 1);
        let lm = &ctx.lightmaps[0];
        prop_assert_eq!(lm.sw, lm.w * supersample);
        prop_assert_eq!(lm.sh, lm.h * supersample);
        for v in &scene.surfaces[0].verts {
            let st = lm.st_of(v.pos);
            let back = lm.world_of(st[0], st[1]);
            prop_assert!(back.distance(v.pos) < 1e-3);
        }
    }
}
