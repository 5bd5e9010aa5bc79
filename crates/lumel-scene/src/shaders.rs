use std::collections::HashMap;
use std::error::Error;
use std::fs;
use std::path::Path;

use serde::Deserialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(pub u16);

#[derive(Clone, Debug)]
pub struct ShaderDef {
    pub id: ShaderId,
    pub key: String,
    /// Never lightmapped, never vertex-lit (sky, nodraw, fullbright).
    pub no_lightmap: bool,
    /// Forced vertex lighting; the surface skips grouping entirely.
    pub vertex_lit: bool,
    /// May group with surfaces on a different plane (decal-like shaders).
    pub lm_mergable: bool,
    /// Per-shader luxel density override, world units per luxel.
    pub sample_size: Option<u32>,
    /// Brightness scale carried into dedup compatibility checks.
    pub brightness: f32,
    /// `rgbGen` expression per style index for synthesized script stages.
    pub style_rgb_gen: HashMap<u8, String>,
}

impl ShaderDef {
    #[inline]
    pub fn lightmapped(&self) -> bool {
        !self.no_lightmap && !self.vertex_lit
    }

    /// Expression for a style stage, falling back to a time-based wave.
    pub fn rgb_gen(&self, style: u8) -> &str {
        self.style_rgb_gen
            .get(&style)
            .map(String::as_str)
            .unwrap_or("wave noise 0.5 1.0 0.0 5.37")
    }
}

#[derive(Default, Clone, Debug)]
pub struct ShaderCatalog {
    pub shaders: Vec<ShaderDef>,
    pub by_key: HashMap<String, ShaderId>,
}

impl ShaderCatalog {
    pub fn new() -> Self {
        Self {
            shaders: Vec::new(),
            by_key: HashMap::new(),
        }
    }

    pub fn get_id(&self, key: &str) -> Option<ShaderId> {
        self.by_key.get(key).copied()
    }

    pub fn get(&self, id: ShaderId) -> Option<&ShaderDef> {
        self.shaders.get(id.0 as usize)
    }

    pub fn from_toml_str(toml_str: &str) -> Result<Self, Box<dyn Error>> {
        let cfg: ShadersConfig = toml::from_str(toml_str)?;
        let mut catalog = ShaderCatalog::new();
        let mut entries: Vec<(String, ShaderEntry)> = cfg.shaders.into_iter().collect();
        // HashMap iteration order is nondeterministic; sort keys so ShaderId
        // assignment is stable.
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, entry) in entries {
            let id = ShaderId(catalog.shaders.len() as u16);
            let mut style_rgb_gen = HashMap::new();
            for (k, v) in entry.styles {
                style_rgb_gen.insert(k.parse::<u8>()?, v);
            }
            catalog.by_key.insert(key.clone(), id);
            catalog.shaders.push(ShaderDef {
                id,
                key,
                no_lightmap: entry.no_lightmap,
                vertex_lit: entry.vertex_lit,
                lm_mergable: entry.lm_mergable,
                sample_size: entry.sample_size,
                brightness: entry.brightness,
                style_rgb_gen,
            });
        }
        Ok(catalog)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Self::from_toml_str(&s)
    }
}

// --- Config ---

#[derive(Deserialize)]
struct ShadersConfig {
    pub shaders: HashMap<String, ShaderEntry>,
}

#[derive(Deserialize)]
#[serde(default)]
struct ShaderEntry {
    pub no_lightmap: bool,
    pub vertex_lit: bool,
    pub lm_mergable: bool,
    pub sample_size: Option<u32>,
    pub brightness: f32,
    /// Style index (as a TOML key string) -> rgbGen expression.
    pub styles: HashMap<String, String>,
}

impl Default for ShaderEntry {
    fn default() -> Self {
        Self {
            no_lightmap: false,
            vertex_lit: false,
            lm_mergable: false,
            sample_size: None,
            brightness: 1.0,
            styles: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_under_reordering() {
        let a = ShaderCatalog::from_toml_str(
            r#"
            [shaders.wall]
            [shaders.floor]
            brightness = 2.0
            "#,
        )
        .unwrap();
        let b = ShaderCatalog::from_toml_str(
            r#"
            [shaders.floor]
            brightness = 2.0
            [shaders.wall]
            "#,
        )
        .unwrap();
        assert_eq!(a.get_id("floor"), b.get_id("floor"));
        assert_eq!(a.get_id("wall"), b.get_id("wall"));
        let floor = a.get(a.get_id("floor").unwrap()).unwrap();
        assert_eq!(floor.brightness, 2.0);
        assert!(floor.lightmapped());
    }

    #[test]
    fn style_expressions_parse_and_default() {
        let c = ShaderCatalog::from_toml_str(
            r#"
            [shaders.flicker]
            [shaders.flicker.styles]
            1 = "wave sin 0.5 0.5 0 1"
            "#,
        )
        .unwrap();
        let s = c.get(c.get_id("flicker").unwrap()).unwrap();
        assert_eq!(s.rgb_gen(1), "wave sin 0.5 0.5 0 1");
        assert_eq!(s.rgb_gen(2), "wave noise 0.5 1.0 0.0 5.37");
    }
}
