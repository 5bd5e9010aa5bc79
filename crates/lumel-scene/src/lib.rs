//! Typed input model for the baker: shaders, surfaces, entities, lights,
//! leaf/cluster data, and the irradiance sampler seam.
#![forbid(unsafe_code)]

pub mod sampler;
pub mod scene;
pub mod shaders;
pub mod types;

pub use sampler::{DirectSampler, IrradianceSampler, LuxelClass, SampleResult};
pub use scene::Scene;
pub use shaders::{ShaderCatalog, ShaderDef, ShaderId};
pub use types::{Entity, Leaf, PointLight, Surface, SurfaceKind, Vertex, MAX_STYLES};
