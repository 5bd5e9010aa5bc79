use std::error::Error;
use std::fs;
use std::path::Path;

use serde::Deserialize;

/// Debug fill for texels no surface maps.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillMode {
    /// Leave unmapped texels at the page background.
    #[default]
    None,
    /// Flood unmapped texels with the lightmap's average color.
    Average,
    /// Magenta, for eyeballing wasted page area.
    Pink,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct BakeConfig {
    /// World units per luxel before any auto-resize.
    pub sample_size: u32,
    /// Supersample factor `S`; the super grid is `(w*S, h*S)`.
    pub supersample: usize,
    /// Output page dimensions.
    pub page_width: usize,
    pub page_height: usize,
    /// Per-channel color slack for vertex-color substitution; 0 disables.
    pub approximate_tolerance: f32,
    /// World-space edge length where approximation recursion stops.
    pub subdivide_threshold: f32,
    /// Patch subdivision target edge length, world units.
    pub patch_subdivide: f32,
    /// Color given to holes that survive neighbor borrowing.
    pub ambient: [f32; 3],
    /// Floor applied to emitted vertex colors; also gates style collapse.
    pub min_light: f32,
    /// Write pages as standalone TGA images instead of one lump.
    pub external: bool,
    /// Flip external images vertically.
    pub flip_external: bool,
    /// Bake and emit per-texel light direction pages.
    pub deluxe: bool,
    /// Direction encoding: 0 = world space. Tangent space is recognized
    /// but not produced; nonzero values warn and fall back.
    pub deluxe_mode: u8,
    /// Strided packer scan.
    pub fast_allocate: bool,
    /// Disable twin detection entirely.
    pub no_collapse: bool,
    pub fill_mode: FillMode,
    /// Packer old-page skip threshold.
    pub search_block_size: usize,
}

impl Default for BakeConfig {
    fn default() -> Self {
        Self {
            sample_size: 16,
            supersample: 1,
            page_width: 128,
            page_height: 128,
            approximate_tolerance: 0.0,
            subdivide_threshold: 1.0,
            patch_subdivide: 8.0,
            ambient: [0.0; 3],
            min_light: 0.0,
            external: false,
            flip_external: false,
            deluxe: false,
            deluxe_mode: 0,
            fast_allocate: false,
            no_collapse: false,
            fill_mode: FillMode::None,
            search_block_size: 10,
        }
    }
}

impl BakeConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error>> {
        let s = fs::read_to_string(path)?;
        Ok(toml::from_str(&s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_keys() {
        let cfg: BakeConfig = toml::from_str(
            r#"
            supersample = 2
            fill_mode = "pink"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.supersample, 2);
        assert_eq!(cfg.fill_mode, FillMode::Pink);
        assert_eq!(cfg.sample_size, 16);
        assert_eq!(cfg.page_width, 128);
    }
}
