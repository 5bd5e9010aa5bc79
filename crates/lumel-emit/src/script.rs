//! Deterministic shader-script synthesis for multi-style surfaces: one
//! extra blended stage per style beyond 0, from a fixed string template.

use std::fs;
use std::io;
use std::path::Path;

use hashbrown::HashMap;

/// One synthesized stage for a style beyond 0.
#[derive(Clone, Debug)]
pub struct StyleStage {
    pub style: u8,
    /// `$lightmap` for lump pages, an image path for external pages.
    pub page_map: String,
    pub rgb_gen: String,
    /// Normalized page-space offset when this style's placement differs
    /// from style 0's.
    pub tc_offset: Option<[f32; 2]>,
}

/// Collects generated shader blocks, reusing previously generated ones via
/// shader-text equality.
pub struct ShaderScript {
    map_name: String,
    blocks: Vec<(String, String)>,
    by_body: HashMap<String, usize>,
}

impl ShaderScript {
    pub fn new(map_name: &str) -> Self {
        Self {
            map_name: map_name.to_string(),
            blocks: Vec::new(),
            by_body: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Returns the generated shader name for a styled surface, creating the
    /// block on first use.
    pub fn styled_shader(&mut self, base_key: &str, stages: &[StyleStage]) -> String {
        let body = Self::body_text(base_key, stages);
        if let Some(&i) = self.by_body.get(&body) {
            return self.blocks[i].0.clone();
        }
        let name = format!("{}_lm_{}", self.map_name, self.blocks.len());
        self.by_body.insert(body.clone(), self.blocks.len());
        self.blocks.push((name.clone(), body));
        name
    }

    fn body_text(base_key: &str, stages: &[StyleStage]) -> String {
        let mut s = String::from("{\n");
        s.push_str("\t{\n\t\tmap $lightmap\n\t\trgbGen identity\n\t}\n");
        s.push_str(&format!(
            "\t{{\n\t\tmap {}\n\t\tblendFunc GL_DST_COLOR GL_ZERO\n\t\trgbGen identity\n\t}}\n",
            base_key
        ));
        for stage in stages {
            s.push_str("\t{\n");
            s.push_str(&format!("\t\tmap {}\n", stage.page_map));
            s.push_str("\t\tblendFunc GL_SRC_ALPHA GL_ONE\n");
            s.push_str("\t\ttcGen lightmap\n");
            if let Some([dx, dy]) = stage.tc_offset {
                s.push_str(&format!("\t\ttcMod transform 1 0 0 1 {:.6} {:.6}\n", dx, dy));
            }
            s.push_str("\t\tdepthFunc equal\n");
            s.push_str(&format!("\t\trgbGen {}\n", stage.rgb_gen));
            s.push_str("\t}\n");
        }
        s.push('}');
        s
    }

    /// Writes the whole script: one named block per synthesized shader.
    pub fn write(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let mut out = String::new();
        for (name, body) in &self.blocks {
            out.push_str(name);
            out.push('\n');
            out.push_str(body);
            out.push_str("\n\n");
        }
        fs::write(path, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(style: u8) -> StyleStage {
        StyleStage {
            style,
            page_map: String::from("$lightmap"),
            rgb_gen: String::from("wave noise 0.5 1.0 0.0 5.37"),
            tc_offset: None,
        }
    }

    #[test]
    fn identical_bodies_reuse_one_block() {
        let mut script = ShaderScript::new("testmap");
        let a = script.styled_shader("textures/wall", &[stage(1)]);
        let b = script.styled_shader("textures/wall", &[stage(1)]);
        assert_eq!(a, b);
        assert_eq!(script.len(), 1);
        let c = script.styled_shader("textures/floor", &[stage(1)]);
        assert_ne!(a, c);
        assert_eq!(script.len(), 2);
    }

    #[test]
    fn offset_stage_emits_tcmod() {
        let mut s = stage(2);
        s.tc_offset = Some([0.25, 0.5]);
        let body = ShaderScript::body_text("textures/wall", &[s]);
        assert!(body.contains("tcMod transform 1 0 0 1 0.250000 0.500000"));
        assert!(body.contains("depthFunc equal"));
        assert!(body.contains("blendFunc GL_SRC_ALPHA GL_ONE"));
    }
}
