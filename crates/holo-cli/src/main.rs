use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use holo_core::RenderOverrides;
use holo_render::{ContextOptions, GraphicsContext, HologramRenderer};

/// Config file picked up from the working directory when `--config` is not given.
const DEFAULT_CONFIG_FILE: &str = "hologram.toml";

#[derive(Parser)]
#[command(
    name = "holo",
    version,
    about = "Holo - lenticular hologram renderer",
    long_about = "Holo composites a color image and its depth map on the GPU into a single\ninterleaved image for display behind a lenticular lens sheet."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a color image and depth map into a hologram image
    Render(RenderArgs),

    /// Show the GPU adapter a render would use
    Info {
        /// Force the software (fallback) adapter
        #[arg(long)]
        fallback_adapter: bool,
    },

    /// Write the default configuration as TOML
    InitConfig {
        /// Destination file
        #[arg(default_value = DEFAULT_CONFIG_FILE)]
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Default)]
struct RenderArgs {
    /// Config file (default: ./hologram.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Color input image
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Depth map image
    #[arg(short, long)]
    depth: Option<PathBuf>,

    /// Output image; format follows the extension
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(long)]
    width: Option<u32>,

    #[arg(long)]
    height: Option<u32>,

    /// Depth cutoff (0-255 depth units)
    #[arg(long)]
    threshold: Option<f32>,

    /// Signed depth displacement
    #[arg(long, allow_hyphen_values = true)]
    protrude: Option<f32>,

    /// Interleaved lines per output height
    #[arg(long)]
    line_number: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    obliquity: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    deviation: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    scale_x: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    scale_y: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    offset_x: Option<f32>,

    #[arg(long, allow_hyphen_values = true)]
    offset_y: Option<f32>,

    /// Color blur size, 0 disables
    #[arg(long)]
    blur_size: Option<f32>,

    /// Depth below which the color blur applies (0-1)
    #[arg(long)]
    blur_depth: Option<f32>,

    /// Depth map pre-blur size, 0 disables
    #[arg(long)]
    depth_image_blur_size: Option<f32>,

    /// Border color as #RRGGBB
    #[arg(long)]
    border_color: Option<String>,

    /// Border thickness as a fraction of the output width
    #[arg(long)]
    border_size_x: Option<f32>,

    /// Border thickness as a fraction of the output height
    #[arg(long)]
    border_size_y: Option<f32>,

    /// WGSL vertex stage (default: built-in)
    #[arg(long)]
    vertex_shader: Option<PathBuf>,

    /// WGSL compositing kernel (default: built-in)
    #[arg(long)]
    fragment_shader: Option<PathBuf>,

    /// Print the render report as JSON
    #[arg(long)]
    json: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,

    /// Force the software (fallback) adapter
    #[arg(long)]
    fallback_adapter: bool,
}

impl RenderArgs {
    /// The command-line layer; only flags actually given are set.
    fn overrides(&self) -> RenderOverrides {
        RenderOverrides {
            image_file: self.image.clone(),
            depth_file: self.depth.clone(),
            output_file: self.output.clone(),
            output_width: self.width,
            output_height: self.height,
            threshold: self.threshold,
            protrude: self.protrude,
            line_number: self.line_number,
            obliquity: self.obliquity,
            deviation: self.deviation,
            scale_x: self.scale_x,
            scale_y: self.scale_y,
            offset_x: self.offset_x,
            offset_y: self.offset_y,
            blur_size: self.blur_size,
            blur_depth: self.blur_depth,
            depth_image_blur_size: self.depth_image_blur_size,
            border_color: self.border_color.clone(),
            border_size_x: self.border_size_x,
            border_size_y: self.border_size_y,
            vertex_shader_path: self.vertex_shader.clone(),
            fragment_shader_path: self.fragment_shader.clone(),
        }
    }

    /// Defaults, then the config file, then command-line flags.
    fn resolve_overrides(&self) -> Result<RenderOverrides> {
        let file_layer = match &self.config {
            Some(path) => RenderOverrides::load_layer(path, true),
            None => RenderOverrides::load_layer(Path::new(DEFAULT_CONFIG_FILE), false),
        }
        .context("failed to load configuration")?;
        Ok(file_layer.merge(self.overrides()))
    }
}

fn context_options(fallback_adapter: bool) -> ContextOptions {
    ContextOptions {
        force_fallback_adapter: fallback_adapter,
        ..ContextOptions::from_env()
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Render(args) if args.quiet => "warn",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Render(args) => cmd_render(&args),
        Commands::Info { fallback_adapter } => cmd_info(fallback_adapter),
        Commands::InitConfig { path, force } => cmd_init_config(&path, force),
    }
}

fn cmd_render(args: &RenderArgs) -> Result<()> {
    let config = args
        .resolve_overrides()?
        .resolve()
        .context("invalid render configuration")?;

    if !args.json && !args.quiet {
        let output = config.output();
        println!("🎬 Holo Render");
        println!("   Image:     {}", config.image().display_path().display());
        println!("   Depth:     {}", config.depth().display_path().display());
        println!("   Output:    {} ({}x{})", output.path.display(), output.width, output.height);
        println!("   Kernel:    {}", config.fragment_shader().label());
        println!();
    }

    let renderer = HologramRenderer::with_options(context_options(args.fallback_adapter));
    let report = renderer
        .render(&config)
        .with_context(|| format!("failed to render {}", config.output().path.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if !args.quiet {
        println!("✅ Wrote {}", report.output.display());
        println!("   Adapter:   {} ({})", report.adapter, report.backend);
        println!("   Hash:      {}", report.content_hash);
        println!("   Time:      {} ms", report.elapsed_ms);
    }
    Ok(())
}

fn cmd_info(fallback_adapter: bool) -> Result<()> {
    println!("🎬 Holo Lenticular Renderer");
    println!("   Version:   {}", env!("CARGO_PKG_VERSION"));

    let ctx = GraphicsContext::create_with(&context_options(fallback_adapter))
        .context("no usable GPU adapter")?;
    let info = ctx.adapter_info();
    println!("   Adapter:   {}", info.name);
    println!("   Backend:   {:?}", info.backend);
    println!("   Device:    {:?}", info.device_type);
    println!("   Driver:    {} {}", info.driver, info.driver_info);
    println!("   Max size:  {}px", ctx.max_texture_dimension());
    Ok(())
}

fn cmd_init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        anyhow::bail!("'{}' already exists (use --force to overwrite)", path.display());
    }
    let contents = RenderOverrides::defaults().to_toml_string()?;
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write config: {}", path.display()))?;
    println!("✅ Wrote default configuration to {}", path.display());
    Ok(())
}
