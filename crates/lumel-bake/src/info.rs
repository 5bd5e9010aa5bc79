use log::warn;
use lumel_geom::{Aabb, Plane};
use lumel_scene::{Scene, ShaderCatalog, ShaderId, SurfaceKind};

use crate::config::BakeConfig;
use crate::patch::PatchMesh;

/// Per-surface metadata gathered once, read-only afterwards except for the
/// lightmap back-reference set during grouping.
#[derive(Clone, Debug)]
pub struct SurfaceInfo {
    /// Index into the scene surface list.
    pub surface: usize,
    pub entity: usize,
    pub shader: ShaderId,
    pub sample_size: u32,
    pub cast_shadows: bool,
    pub recv_shadows: bool,
    pub bounds: Aabb,
    /// Planar surfaces only; coplanarity is a property of the input.
    pub plane: Option<Plane>,
    /// Dominant world axis of the plane normal.
    pub axis: Option<usize>,
    /// Subdivision rounds for patch resampling.
    pub patch_iterations: Option<usize>,
    /// PVS clusters the surface bounds touch.
    pub clusters: Vec<u32>,
    /// Never grouped: shader opted out, or projection degenerated.
    pub vertex_lit: bool,
    /// Back-reference into the raw lightmap list, set once by the grouper.
    pub lm: Option<usize>,
    /// Set when the approximation pass freed this surface's atlas space.
    pub approximated: bool,
}

/// Scans every scene surface into a `SurfaceInfo`.
pub fn extract_surface_infos(
    scene: &Scene,
    catalog: &ShaderCatalog,
    cfg: &BakeConfig,
) -> Vec<SurfaceInfo> {
    let mut infos = Vec::with_capacity(scene.surfaces.len());
    for (si, surf) in scene.surfaces.iter().enumerate() {
        let shader = catalog.get(surf.shader);
        let entity = &scene.entities[surf.entity];
        let sample_size = shader
            .and_then(|s| s.sample_size)
            .or(entity.sample_size)
            .unwrap_or(cfg.sample_size)
            .max(1);

        let bounds = surf.bounds();
        let mut vertex_lit = shader.map(|s| !s.lightmapped()).unwrap_or(false);

        let (plane, axis, patch_iterations) = match &surf.kind {
            SurfaceKind::Planar { indices } => {
                let plane = fit_plane(surf, indices);
                let axis = plane.map(|p| p.normal.dominant_axis());
                if plane.is_none() && !vertex_lit {
                    // Degenerate projection; the surface can still be lit
                    // per-vertex, so this is not fatal.
                    warn!("surface {}: zero-length projection axis, falling back to vertex light", si);
                    vertex_lit = true;
                }
                (plane, axis, None)
            }
            SurfaceKind::Patch { width, height } => {
                let points: Vec<_> = surf.verts.iter().map(|v| v.pos).collect();
                let mesh = PatchMesh::from_points(*width, *height, &points);
                let iterations =
                    PatchMesh::iterations_for(mesh.longest_control_edge(), cfg.patch_subdivide);
                (None, None, Some(iterations))
            }
        };

        let clusters = clusters_for(scene, si, bounds);

        infos.push(SurfaceInfo {
            surface: si,
            entity: surf.entity,
            shader: surf.shader,
            sample_size,
            cast_shadows: entity.cast_shadows,
            recv_shadows: entity.recv_shadows,
            bounds,
            plane,
            axis,
            patch_iterations,
            clusters,
            vertex_lit,
            lm: None,
            approximated: false,
        });
    }
    infos
}

/// Plane from the first non-degenerate triangle. The input guarantees
/// coplanarity; nothing is re-verified here.
fn fit_plane(surf: &lumel_scene::Surface, indices: &[u32]) -> Option<Plane> {
    for tri in indices.chunks_exact(3) {
        let a = surf.verts[tri[0] as usize].pos;
        let b = surf.verts[tri[1] as usize].pos;
        let c = surf.verts[tri[2] as usize].pos;
        if let Some(p) = Plane::from_points(a, b, c) {
            return Some(p);
        }
    }
    None
}

/// Every leaf whose box touches the surface box and whose surface list
/// actually references the surface.
fn clusters_for(scene: &Scene, surface: usize, bounds: Aabb) -> Vec<u32> {
    let mut clusters = Vec::new();
    for leaf in &scene.leaves {
        if leaf.bounds.overlaps(bounds) && leaf.surfaces.contains(&surface) {
            if !clusters.contains(&leaf.cluster) {
                clusters.push(leaf.cluster);
            }
        }
    }
    clusters
}
