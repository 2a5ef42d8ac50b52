//! Headless scene runner.
//!
//!   kite_game [config.json] [scene.json] [frames]
//!
//! Loads the configuration (defaults when absent), optionally a scene
//! document, then drives a fixed number of frames at 60 Hz against a
//! recording renderer and logs per-frame statistics.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use kite_render::RecordingRenderer;
use kite_scene::{load_config_from_path, validate_config, Scene, SceneConfig, SceneError};

const DEFAULT_FRAMES: u32 = 600;
const FIXED_DT: f32 = 1.0 / 60.0;
const STATS_EVERY: u32 = 60;

struct Args {
    config: Option<PathBuf>,
    scene: Option<PathBuf>,
    frames: u32,
}

fn parse_args() -> Result<Args, String> {
    let mut args = std::env::args().skip(1);
    let config = args.next().map(PathBuf::from);
    let scene = args.next().map(PathBuf::from);
    let frames = match args.next() {
        Some(raw) => raw
            .parse()
            .map_err(|e| format!("invalid frame count '{raw}': {e}"))?,
        None => DEFAULT_FRAMES,
    };
    Ok(Args {
        config,
        scene,
        frames,
    })
}

fn load_config(path: Option<&Path>) -> Result<SceneConfig, SceneError> {
    match path {
        Some(path) => load_config_from_path(path),
        None => {
            let config = SceneConfig::default();
            validate_config(&config).map_err(SceneError::Validation)?;
            Ok(config)
        }
    }
}

fn run(args: Args) -> Result<(), SceneError> {
    let config = load_config(args.config.as_deref())?;
    let mut scene = Scene::new(config)?;
    let mut renderer = RecordingRenderer::new();

    if let Some(path) = &args.scene {
        scene.load(path, &mut renderer)?;
    }

    for frame in 1..=args.frames {
        renderer.clear();
        scene.update(FIXED_DT);
        scene.render(&mut renderer);

        if frame % STATS_EVERY == 0 {
            log::info!(
                "frame {frame}: {} live, {} drawn, {} sprites, {} collisions, layers {:?}",
                scene.live().len(),
                scene.rendered_count(),
                renderer.sprite_count(),
                scene.collision_events().len(),
                scene.layer_counts()
            );
        }
    }

    log::info!(
        "Finished {} frames, {:.2}s simulated",
        scene.clock().frame_count,
        scene.clock().elapsed
    );
    scene.clear_and_free();
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("kite scene runner starting...");

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
