//! lumel: offline lightmap baker and atlas packer for BSP-style maps.
//!
//! Single-pass batch tool: reads a scene and shader catalog, bakes
//! per-surface irradiance into raw lightmaps, packs them into fixed-size
//! pages, rewrites vertex UVs, and writes the pages plus a generated
//! shader script.

use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};
use lumel_bake::{BakeConfig, BakeContext, FillMode};
use lumel_scene::{DirectSampler, Scene, ShaderCatalog};

#[derive(Parser, Debug)]
#[command(name = "lumel", about = "offline lightmap baker and atlas packer")]
struct Args {
    /// Scene description (TOML).
    scene: PathBuf,
    /// Shader catalog (TOML).
    #[arg(long)]
    shaders: PathBuf,
    /// Bake settings file (TOML); defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output directory.
    #[arg(long, default_value = "out")]
    out: PathBuf,
    /// Map name used for output files; defaults to the scene file stem.
    #[arg(long)]
    name: Option<String>,
    /// Write pages as standalone TGA images instead of one lump.
    #[arg(long)]
    external: bool,
    /// Bake per-texel light direction pages.
    #[arg(long)]
    deluxe: bool,
    /// Strided packer scan; faster, slightly less dense.
    #[arg(long)]
    fast: bool,
    /// Disable twin collapsing.
    #[arg(long)]
    no_collapse: bool,
    /// Fill unmapped page texels with magenta for debugging.
    #[arg(long)]
    pink: bool,
    /// Supersample factor override.
    #[arg(long)]
    supersample: Option<usize>,
    /// Page size override (applies to both dimensions).
    #[arg(long)]
    page_size: Option<usize>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let catalog = ShaderCatalog::from_path(&args.shaders)?;
    let scene_path = args.scene.clone();
    let mut scene = Scene::from_path(&args.scene, &catalog)?;

    let mut cfg = match &args.config {
        Some(path) => BakeConfig::from_path(path)?,
        None => BakeConfig::default(),
    };
    if args.external {
        cfg.external = true;
    }
    if args.deluxe {
        cfg.deluxe = true;
    }
    if args.fast {
        cfg.fast_allocate = true;
    }
    if args.no_collapse {
        cfg.no_collapse = true;
    }
    if args.pink {
        cfg.fill_mode = FillMode::Pink;
    }
    if let Some(s) = args.supersample {
        cfg.supersample = s.max(1);
    }
    if let Some(p) = args.page_size {
        cfg.page_width = p;
        cfg.page_height = p;
    }

    let map_name = args
        .name
        .clone()
        .or_else(|| {
            scene_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| String::from("map"));

    let sampler = DirectSampler::new(&scene.lights, &scene.leaves);
    let mut ctx = BakeContext::new(cfg);
    let packer = ctx.run(&scene, &catalog, &sampler);

    let output = lumel_emit::emit(
        &mut scene,
        &ctx.infos,
        &ctx.lightmaps,
        &packer,
        &catalog,
        &ctx.cfg,
        &map_name,
        &args.out,
    )?;

    let stats = ctx.stats();
    info!(
        "{}: {} surfaces ({} vertex-lit), {} lightmaps, {} channels ({} solid, {} twins, {} approximated), {} pages",
        map_name,
        stats.surfaces,
        stats.vertex_lit,
        stats.lightmaps,
        stats.channels,
        stats.solid_channels,
        stats.twins,
        stats.approximated,
        output.pages
    );
    for f in &output.files {
        info!("wrote {}", f.display());
    }
    Ok(())
}
