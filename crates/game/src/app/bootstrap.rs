use std::path::PathBuf;
use std::time::Duration;

use engine::{
    compile_def_database, load_tiled_map, resolve_app_paths, AnimationLibrary, AnimationLoadError,
    ContentCompileError, LoopConfig, MapLoadError, SceneWorld, StartupError,
};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use super::gameplay::{GameplayConfig, GameplayError, GameplayScene};
use super::script::{ScriptError, ScriptedInput};

const COLLISION_LAYER: usize = 0;
const NANOS_PER_SECOND: f64 = 1_000_000_000.0;
const NANOS_PER_MILLI: f64 = 1_000_000.0;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunOptions {
    pub(crate) map: String,
    pub(crate) run_for: Duration,
    pub(crate) frame_dt: Duration,
    pub(crate) seed: u64,
    pub(crate) script: Option<PathBuf>,
    pub(crate) enemies: usize,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            map: "main".to_string(),
            run_for: Duration::from_secs(10),
            frame_dt: Duration::from_millis(16),
            seed: 1,
            script: None,
            enemies: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CliCommand {
    Run(RunOptions),
    Help,
}

#[derive(Debug, Error)]
pub(crate) enum BootstrapError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error("map load failed: {0}")]
    Map(#[from] MapLoadError),
    #[error("entity definitions failed to compile: {0}")]
    Content(#[from] ContentCompileError),
    #[error("animation load failed: {0}")]
    Animations(#[from] AnimationLoadError),
    #[error("input script failed to load: {0}")]
    Script(#[from] ScriptError),
    #[error("gameplay setup failed: {0}")]
    Gameplay(#[from] GameplayError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) options: RunOptions,
    pub(crate) scene: GameplayScene,
    pub(crate) world: SceneWorld,
    pub(crate) input: ScriptedInput,
}

pub(crate) fn build_app(options: RunOptions) -> Result<AppWiring, BootstrapError> {
    info!("=== Adventure Startup ===");
    let paths = resolve_app_paths()?;
    info!(root = %paths.root.display(), map = %options.map, "startup");

    let tilemap = load_tiled_map(&paths.map_path(&options.map))?;
    let defs = compile_def_database(&paths.defs_path)?;
    let animations = AnimationLibrary::load(&paths.animations_path)?;
    let input = match &options.script {
        Some(path) => ScriptedInput::load(path)?,
        None => ScriptedInput::default_script(),
    };
    info!(
        layers = tilemap.layers().len(),
        entity_defs = defs.entity_defs().len(),
        animations = animations.len(),
        script_ticks = input.total_ticks(),
        "content_loaded"
    );

    let config = LoopConfig::default();
    let scene = GameplayScene::new(
        &defs,
        &animations,
        GameplayConfig {
            enemy_count: options.enemies,
            seed: options.seed,
            target_tps: config.target_tps,
            player_spawn: None,
        },
    )?;
    let mut world = SceneWorld::default();
    world.set_tilemap(tilemap, COLLISION_LAYER);

    Ok(AppWiring {
        config,
        options,
        scene,
        world,
        input,
    })
}

pub(crate) fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

pub(crate) fn parse_args(args: &[String]) -> Result<CliCommand, String> {
    let mut options = RunOptions::default();
    let mut index = 0usize;
    while index < args.len() {
        let flag = args[index].as_str();
        if flag == "-h" || flag == "--help" {
            return Ok(CliCommand::Help);
        }
        let value = args
            .get(index + 1)
            .ok_or_else(|| format!("missing value for {flag}"))?;
        match flag {
            "--map" => {
                if value.is_empty() {
                    return Err("--map must not be empty".to_string());
                }
                options.map = value.clone();
            }
            "--seconds" => {
                options.run_for = parse_duration(value, NANOS_PER_SECOND).ok_or_else(|| {
                    format!("invalid --seconds value '{value}' (expected seconds >= 0)")
                })?;
            }
            "--frame-ms" => {
                options.frame_dt = parse_duration(value, NANOS_PER_MILLI)
                    .filter(|frame_dt| !frame_dt.is_zero())
                    .ok_or_else(|| {
                        format!("invalid --frame-ms value '{value}' (expected at least 1ns)")
                    })?;
            }
            "--seed" => {
                options.seed = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid --seed value '{value}' (expected u64)"))?;
            }
            "--script" => {
                options.script = Some(PathBuf::from(value));
            }
            "--enemies" => {
                options.enemies = value
                    .parse::<usize>()
                    .map_err(|_| format!("invalid --enemies value '{value}' (expected usize)"))?;
            }
            other => return Err(format!("unknown argument '{other}'")),
        }
        index += 2;
    }
    Ok(CliCommand::Run(options))
}

/// Parses a non-negative decimal count of some unit into whole nanoseconds.
fn parse_duration(value: &str, nanos_per_unit: f64) -> Option<Duration> {
    let nanos = (value.parse::<f64>().ok()? * nanos_per_unit).round();
    // u64::MAX as f64 is 2^64.
    (nanos.is_finite() && nanos >= 0.0 && nanos < u64::MAX as f64)
        .then(|| Duration::from_nanos(nanos as u64))
}

pub(crate) fn usage_text() -> String {
    [
        "adventure - headless tile-grid action simulation",
        "",
        "Usage:",
        "  adventure [--map <name>] [--seconds <secs>] [--frame-ms <ms>] [--seed <u64>] [--script <path>] [--enemies <n>]",
        "",
        "Defaults:",
        "  --map main",
        "  --seconds 10",
        "  --frame-ms 16",
        "  --seed 1",
        "  --enemies 4",
        "",
        "Environment:",
        "  ADVENTURE_ROOT  project root containing assets/",
        "  RUST_LOG        log filter (default info)",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn no_arguments_use_defaults() {
        assert_eq!(
            parse_args(&[]).expect("parse"),
            CliCommand::Run(RunOptions::default())
        );
    }

    #[test]
    fn all_flags_parse() {
        let parsed = parse_args(&args(&[
            "--map", "cave", "--seconds", "2.5", "--frame-ms", "8", "--seed", "99", "--script",
            "walk.json", "--enemies", "0",
        ]))
        .expect("parse");
        assert_eq!(
            parsed,
            CliCommand::Run(RunOptions {
                map: "cave".to_string(),
                run_for: Duration::from_millis(2500),
                frame_dt: Duration::from_millis(8),
                seed: 99,
                script: Some(PathBuf::from("walk.json")),
                enemies: 0,
            })
        );
    }

    #[test]
    fn fractional_values_round_to_nanoseconds() {
        let CliCommand::Run(options) =
            parse_args(&args(&["--frame-ms", "0.000001", "--seconds", "0.25"])).expect("parse")
        else {
            panic!("expected run command");
        };
        assert_eq!(options.frame_dt, Duration::from_nanos(1));
        assert_eq!(options.run_for, Duration::from_millis(250));
    }

    #[test]
    fn help_wins_over_other_flags() {
        assert_eq!(
            parse_args(&args(&["--seed", "3", "--help"])).expect("parse"),
            CliCommand::Help
        );
        assert_eq!(parse_args(&args(&["-h"])).expect("parse"), CliCommand::Help);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for raw in [
            &["--frame-ms", "0"][..],
            &["--seconds", "-1"][..],
            &["--seconds", "1e30"][..],
            &["--seconds", "NaN"][..],
            &["--frame-ms", "0.0000001"][..],
            &["--seed", "abc"][..],
            &["--enemies"][..],
            &["--bogus", "1"][..],
        ] {
            assert!(parse_args(&args(raw)).is_err(), "{raw:?}");
        }
    }
}
