//! The baking pipeline: surface info extraction, projection, grouping,
//! supersampled integration, vertex-color approximation, twin
//! deduplication, and atlas placement. Strictly sequential by pass; each
//! pass completes for all raw lightmaps before the next begins.
#![forbid(unsafe_code)]

pub mod approx;
pub mod config;
pub mod constants;
pub mod dedup;
pub mod group;
pub mod info;
pub mod integrate;
pub mod lightmap;
pub mod pack;
pub mod patch;

use log::info;
use lumel_atlas::AtlasPacker;
use lumel_scene::{IrradianceSampler, Scene, ShaderCatalog};

pub use config::{BakeConfig, FillMode};
pub use info::SurfaceInfo;
pub use lightmap::{Channel, ChannelState, RawLightmap, StyleSet};
pub use patch::PatchMesh;

/// All pipeline state in one owned bundle, passed explicitly through each
/// pass. Nothing here is global; two contexts never interfere.
pub struct BakeContext {
    pub cfg: BakeConfig,
    pub infos: Vec<SurfaceInfo>,
    pub lightmaps: Vec<RawLightmap>,
}

/// Pass counters for the end-of-run summary.
#[derive(Debug, Default, Clone, Copy)]
pub struct BakeStats {
    pub surfaces: usize,
    pub vertex_lit: usize,
    pub lightmaps: usize,
    pub channels: usize,
    pub solid_channels: usize,
    pub twins: usize,
    pub approximated: usize,
}

impl BakeContext {
    pub fn new(cfg: BakeConfig) -> Self {
        Self {
            cfg,
            infos: Vec::new(),
            lightmaps: Vec::new(),
        }
    }

    /// Runs every pass in order against the scene and returns the packed
    /// atlas. The emitter consumes the context plus the returned packer.
    pub fn run(
        &mut self,
        scene: &Scene,
        catalog: &ShaderCatalog,
        sampler: &dyn IrradianceSampler,
    ) -> AtlasPacker {
        self.infos = info::extract_surface_infos(scene, catalog, &self.cfg);
        info!("extracted {} surface infos", self.infos.len());

        self.lightmaps = group::group_surfaces(&mut self.infos, scene, catalog, &self.cfg);
        info!("grouped into {} raw lightmaps", self.lightmaps.len());

        integrate::integrate_lightmaps(
            &mut self.lightmaps,
            &self.infos,
            scene,
            sampler,
            &self.cfg,
        );
        info!("integration complete");

        approx::approximate_lightmaps(&mut self.lightmaps, &mut self.infos, scene, &self.cfg);
        let twins = dedup::deduplicate_lightmaps(&mut self.lightmaps, &self.cfg);
        info!("deduplication found {} twins", twins);

        pack::pack_lightmaps(&mut self.lightmaps, &self.cfg)
    }

    pub fn stats(&self) -> BakeStats {
        let mut stats = BakeStats {
            surfaces: self.infos.len(),
            vertex_lit: self.infos.iter().filter(|i| i.vertex_lit).count(),
            lightmaps: self.lightmaps.len(),
            ..Default::default()
        };
        for lm in &self.lightmaps {
            for slot in lm.styles.iter() {
                let ch = &lm.channels[slot];
                stats.channels += 1;
                if ch.solid {
                    stats.solid_channels += 1;
                }
                if ch.twin.is_some() {
                    stats.twins += 1;
                }
                if ch.state == ChannelState::Approximated {
                    stats.approximated += 1;
                }
            }
        }
        stats
    }
}
