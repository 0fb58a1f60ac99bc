#[cfg(not(target_arch = "wasm32"))]
mod cli {
    use std::path::PathBuf;
    use std::process::ExitCode;
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    use clap::Parser;
    use shimmer::prelude::*;
    use shimmer::headless::Command;

    #[derive(Parser)]
    #[command(name = "shimmer", about = "A particle field that assembles into a shape")]
    struct Cli {
        /// Scene to show: home or sparkle
        #[arg(long)]
        scene: Option<SceneKind>,
        /// Field layout: instanced or pooled
        #[arg(long)]
        mode: Option<FieldMode>,
        /// Number of particles
        #[arg(long)]
        particles: Option<usize>,
        /// RNG seed for particle placement
        #[arg(long)]
        seed: Option<u64>,
        /// JSON scene config; command-line flags override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// JSON point cloud for the home scene (flat array of floats)
        #[arg(long)]
        shape: Option<PathBuf>,
        /// Print the effective config as JSON and exit
        #[arg(long)]
        print_config: bool,
        /// Run this many frames without a window and print a summary
        #[arg(long, value_name = "FRAMES")]
        headless_frames: Option<u32>,
    }

    pub fn main() -> ExitCode {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        match run(Cli::parse()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                log::error!("{e}");
                ExitCode::FAILURE
            }
        }
    }

    fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
        let mut config = match &cli.config {
            Some(path) => SceneConfig::from_json_file(path)?,
            None => SceneConfig::for_scene(cli.scene.unwrap_or_default()),
        };
        if let Some(scene) = cli.scene {
            config.scene = scene;
        }
        if let Some(mode) = cli.mode {
            config = config.with_mode(mode);
        }
        if let Some(count) = cli.particles {
            config = config.with_particle_count(count);
        }
        if let Some(seed) = cli.seed {
            config = config.with_seed(seed);
        }
        config.validate()?;
        if cli.print_config {
            println!("{}", config.to_json()?);
            return Ok(());
        }

        let seed = config.seed.unwrap_or_else(clock_seed);
        let shape = cli.shape.as_ref().map(PointCloud::from_json_file).transpose()?;
        log::info!(
            "{} scene, {} {} particles, seed {}",
            config.scene,
            config.field.count,
            config.field.mode,
            seed
        );

        match cli.headless_frames {
            Some(frames) => run_headless(&config, seed, shape.as_ref(), frames),
            None => Ok(shimmer::window::run(config, seed, shape)?),
        }
    }

    fn run_headless(
        config: &SceneConfig,
        seed: u64,
        shape: Option<&PointCloud>,
        frames: u32,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let mut render_loop = RenderLoop::new(
            HeadlessSurface::new(1280, 720),
            ManualScheduler::new(),
            ShaderLibrary::builtin(),
            |gfx, programs, size| AnyScene::build(gfx, programs, config, seed, shape, size),
        )?;

        for _ in 0..frames {
            render_loop.scheduler_mut().advance(Duration::from_micros(16_667));
            let now = render_loop.scheduler().now();
            render_loop.on_frame(now);
        }

        if let Some(gfx) = render_loop.context() {
            let uploaded: usize = gfx
                .commands()
                .iter()
                .filter_map(|c| match c {
                    Command::WriteBuffer { len, .. } => Some(*len),
                    _ => None,
                })
                .sum();
            println!("frames:      {}", render_loop.timer().frame());
            println!("draw calls:  {}", gfx.draw_count());
            println!("uploaded:    {uploaded} bytes");
            println!("live buffers: {}", gfx.live_buffers());
        }

        render_loop.dispose();
        Ok(())
    }

    fn clock_seed() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos() as u64)
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> std::process::ExitCode {
    cli::main()
}

#[cfg(target_arch = "wasm32")]
fn main() {}
