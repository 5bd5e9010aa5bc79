use std::error::Error;
use std::fmt;
use std::fs;
use std::path::Path;

use lumel_geom::{Aabb, Vec3};
use serde::Deserialize;

use crate::shaders::ShaderCatalog;
use crate::types::{Entity, Leaf, PointLight, Surface, SurfaceKind, Vertex};

#[derive(Debug)]
pub enum SceneError {
    UnknownShader(String),
    BadSurface(usize, &'static str),
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::UnknownShader(name) => write!(f, "unknown shader '{}'", name),
            SceneError::BadSurface(i, why) => write!(f, "surface {}: {}", i, why),
        }
    }
}

impl Error for SceneError {}

/// The whole input model, read once per compile.
#[derive(Debug)]
pub struct Scene {
    pub entities: Vec<Entity>,
    pub surfaces: Vec<Surface>,
    pub lights: Vec<PointLight>,
    pub leaves: Vec<Leaf>,
}

impl Scene {
    pub fn from_path(path: impl AsRef<Path>, catalog: &ShaderCatalog) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s, catalog)
    }

    pub fn from_toml_str(toml_str: &str, catalog: &ShaderCatalog) -> Result<Self, Box<dyn Error>> {
        let cfg: SceneConfig = toml::from_str(toml_str)?;

        let entities = if cfg.entities.is_empty() {
            vec![Entity::default()]
        } else {
            cfg.entities
                .into_iter()
                .map(|e| Entity {
                    name: e.name,
                    cast_shadows: e.cast_shadows,
                    recv_shadows: e.recv_shadows,
                    sample_size: e.sample_size,
                })
                .collect()
        };

        let mut surfaces = Vec::with_capacity(cfg.surfaces.len());
        for (i, sc) in cfg.surfaces.into_iter().enumerate() {
            let shader = catalog
                .get_id(&sc.shader)
                .ok_or_else(|| SceneError::UnknownShader(sc.shader.clone()))?;
            if sc.entity >= entities.len() {
                return Err(SceneError::BadSurface(i, "entity index out of range").into());
            }
            let mut verts = Vec::with_capacity(sc.positions.len());
            for (vi, p) in sc.positions.iter().enumerate() {
                let mut v = Vertex::at(Vec3::new(p[0], p[1], p[2]));
                if let Some(n) = sc.normals.get(vi) {
                    v.normal = Vec3::new(n[0], n[1], n[2]).normalized();
                }
                if let Some(st) = sc.st.get(vi) {
                    v.st = *st;
                }
                verts.push(v);
            }
            let kind = match sc.kind.as_str() {
                "planar" => {
                    if sc.indices.len() % 3 != 0 || sc.indices.is_empty() {
                        return Err(SceneError::BadSurface(i, "planar surface needs index triples").into());
                    }
                    if sc.indices.iter().any(|&ix| ix as usize >= verts.len()) {
                        return Err(SceneError::BadSurface(i, "index out of range").into());
                    }
                    SurfaceKind::Planar { indices: sc.indices }
                }
                "patch" => {
                    let (w, h) = (sc.patch_width, sc.patch_height);
                    if w < 3 || h < 3 || w % 2 == 0 || h % 2 == 0 {
                        return Err(SceneError::BadSurface(i, "patch dims must be odd and >= 3").into());
                    }
                    if w * h != verts.len() {
                        return Err(SceneError::BadSurface(i, "patch dims do not match vertex count").into());
                    }
                    SurfaceKind::Patch { width: w, height: h }
                }
                _ => return Err(SceneError::BadSurface(i, "kind must be 'planar' or 'patch'").into()),
            };
            surfaces.push(Surface::new(shader, sc.entity, verts, kind));
        }

        let lights = cfg
            .lights
            .into_iter()
            .map(|l| {
                let intensity = l.intensity.max(0.0);
                PointLight {
                    origin: Vec3::new(l.origin[0], l.origin[1], l.origin[2]),
                    color: [
                        intensity * l.color[0].clamp(0.0, 1.0),
                        intensity * l.color[1].clamp(0.0, 1.0),
                        intensity * l.color[2].clamp(0.0, 1.0),
                    ],
                    style: l.style,
                }
            })
            .collect();

        let leaves = cfg
            .leaves
            .into_iter()
            .map(|l| Leaf {
                bounds: Aabb::new(
                    Vec3::new(l.min[0], l.min[1], l.min[2]),
                    Vec3::new(l.max[0], l.max[1], l.max[2]),
                ),
                cluster: l.cluster,
                opaque: l.opaque,
                surfaces: l.surfaces,
            })
            .collect();

        let scene = Scene {
            entities,
            surfaces,
            lights,
            leaves,
        };
        log::info!(
            "scene loaded: {} surfaces, {} lights, {} leaves, {} entities",
            scene.surfaces.len(),
            scene.lights.len(),
            scene.leaves.len(),
            scene.entities.len()
        );
        Ok(scene)
    }
}

// --- Config ---

#[derive(Deserialize)]
struct SceneConfig {
    #[serde(default)]
    entities: Vec<EntityConfig>,
    #[serde(default)]
    surfaces: Vec<SurfaceConfig>,
    #[serde(default)]
    lights: Vec<LightConfig>,
    #[serde(default)]
    leaves: Vec<LeafConfig>,
}

#[derive(Deserialize)]
struct EntityConfig {
    #[serde(default = "default_entity_name")]
    name: String,
    #[serde(default = "default_true")]
    cast_shadows: bool,
    #[serde(default = "default_true")]
    recv_shadows: bool,
    #[serde(default)]
    sample_size: Option<u32>,
}

fn default_entity_name() -> String {
    String::from("worldspawn")
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
struct SurfaceConfig {
    shader: String,
    #[serde(default)]
    entity: usize,
    kind: String,
    positions: Vec<[f32; 3]>,
    #[serde(default)]
    normals: Vec<[f32; 3]>,
    #[serde(default)]
    st: Vec<[f32; 2]>,
    #[serde(default)]
    indices: Vec<u32>,
    #[serde(default)]
    patch_width: usize,
    #[serde(default)]
    patch_height: usize,
}

#[derive(Deserialize)]
struct LightConfig {
    origin: [f32; 3],
    #[serde(default = "default_light_color")]
    color: [f32; 3],
    #[serde(default = "default_intensity")]
    intensity: f32,
    #[serde(default)]
    style: u8,
}

fn default_light_color() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_intensity() -> f32 {
    300.0
}

#[derive(Deserialize)]
struct LeafConfig {
    min: [f32; 3],
    max: [f32; 3],
    #[serde(default)]
    cluster: u32,
    #[serde(default)]
    opaque: bool,
    #[serde(default)]
    surfaces: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ShaderCatalog {
        ShaderCatalog::from_toml_str("[shaders.wall]\n").unwrap()
    }

    #[test]
    fn loads_minimal_planar_scene() {
        let scene = Scene::from_toml_str(
            r#"
            [[surfaces]]
            shader = "wall"
            kind = "planar"
            positions = [[0,0,0],[64,0,0],[64,64,0],[0,64,0]]
            indices = [0,1,2, 0,2,3]

            [[lights]]
            origin = [32, 32, 64]
            "#,
            &catalog(),
        )
        .unwrap();
        assert_eq!(scene.surfaces.len(), 1);
        assert_eq!(scene.entities.len(), 1);
        assert_eq!(scene.lights[0].color, [300.0, 300.0, 300.0]);
        let b = scene.surfaces[0].bounds();
        assert_eq!(b.size().x, 64.0);
    }

    #[test]
    fn rejects_even_patch_dims() {
        let err = Scene::from_toml_str(
            r#"
            [[surfaces]]
            shader = "wall"
            kind = "patch"
            patch_width = 2
            patch_height = 3
            positions = [[0,0,0],[1,0,0],[0,1,0],[1,1,0],[0,2,0],[1,2,0]]
            "#,
            &catalog(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("odd"));
    }

    #[test]
    fn rejects_unknown_shader() {
        let err = Scene::from_toml_str(
            r#"
            [[surfaces]]
            shader = "missing"
            kind = "planar"
            positions = [[0,0,0],[1,0,0],[0,1,0]]
            indices = [0,1,2]
            "#,
            &catalog(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
