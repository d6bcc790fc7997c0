use std::process::ExitCode;
use std::time::Duration;

use engine::{DriverError, EntityKind, FixedStepDriver, Scene, Vec2};
use tracing::{error, info};

use super::bootstrap::{AppWiring, RunOptions};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RunSummary {
    pub(crate) frames: u64,
    pub(crate) ticks: u64,
    pub(crate) game_over: bool,
    pub(crate) player_position: Option<Vec2>,
    pub(crate) player_health: Option<i32>,
    pub(crate) enemy_count: usize,
}

pub(crate) fn run(app: AppWiring) -> ExitCode {
    match run_headless(app) {
        Ok(summary) => {
            info!(
                frames = summary.frames,
                ticks = summary.ticks,
                game_over = summary.game_over,
                player_x = summary.player_position.map(|p| p.x),
                player_y = summary.player_position.map(|p| p.y),
                player_health = summary.player_health,
                enemy_count = summary.enemy_count,
                "shutdown"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "run_failed");
            ExitCode::FAILURE
        }
    }
}

/// Drives the scene on a synthetic clock: one frame every `frame_dt` until
/// `run_for` of simulated time has been fed or the scene pauses itself.
pub(crate) fn run_headless(app: AppWiring) -> Result<RunSummary, DriverError> {
    let AppWiring {
        config,
        options,
        mut scene,
        mut world,
        mut input,
    } = app;
    let mut driver = FixedStepDriver::new(&config);
    scene.load(&mut world);
    driver.configure_camera(&mut world)?;

    let RunOptions { run_for, frame_dt, .. } = options;
    let frame_dt = frame_dt.max(Duration::from_nanos(1));
    let mut now = Duration::ZERO;
    let mut frames = 0u64;
    loop {
        let report = driver.frame(now, &mut scene, &mut world, &mut input)?;
        frames += 1;
        if report.paused_by_scene || now >= run_for {
            break;
        }
        now = now.saturating_add(frame_dt).min(run_for);
    }

    let player = scene.player_id().and_then(|id| world.find_entity(id));
    let summary = RunSummary {
        frames,
        ticks: driver.tick_count(),
        game_over: scene.is_game_over(),
        player_position: player.map(|player| player.body.position),
        player_health: player.map(|player| player.vitals.health),
        enemy_count: world
            .entities()
            .iter()
            .filter(|entity| entity.kind == EntityKind::Enemy)
            .count(),
    };
    scene.unload(&mut world);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use engine::content::compile_def_source;
    use engine::{AnimationLibrary, LoopConfig, SceneWorld, TileMap};

    use super::*;
    use crate::app::gameplay::{GameplayConfig, GameplayScene};
    use crate::app::script::ScriptedInput;

    const DEFS: &str = r#"<Defs>
        <EntityDef><defName>hero</defName><health>50</health></EntityDef>
        <EntityDef><defName>enemy</defName><tracks><track>seek</track></tracks></EntityDef>
    </Defs>"#;

    fn wiring(options: RunOptions) -> AppWiring {
        let defs = compile_def_source(Path::new("defs.xml"), DEFS).expect("defs");
        let scene = GameplayScene::new(
            &defs,
            &AnimationLibrary::default(),
            GameplayConfig {
                enemy_count: options.enemies,
                seed: options.seed,
                ..GameplayConfig::default()
            },
        )
        .expect("scene");
        let mut world = SceneWorld::default();
        let map = TileMap::from_ascii(
            16.0,
            16.0,
            &["##########", "#........#", "#........#", "#........#", "##########"],
        )
        .expect("map");
        world.set_tilemap(map, 0);
        AppWiring {
            config: LoopConfig::default(),
            options,
            scene,
            world,
            input: ScriptedInput::default_script(),
        }
    }

    #[test]
    fn headless_run_covers_requested_time() {
        let summary = run_headless(wiring(RunOptions {
            run_for: Duration::from_secs(2),
            frame_dt: Duration::from_millis(10),
            enemies: 3,
            ..RunOptions::default()
        }))
        .expect("run");
        assert_eq!(summary.ticks, 120);
        assert_eq!(summary.frames, 201);
        assert!(!summary.game_over);
        assert_eq!(summary.enemy_count, 3);
        assert!(summary.player_health.is_some_and(|health| health > 0));
    }

    #[test]
    fn zero_seconds_runs_no_ticks() {
        let summary = run_headless(wiring(RunOptions {
            run_for: Duration::ZERO,
            ..RunOptions::default()
        }))
        .expect("run");
        assert_eq!(summary.ticks, 0);
        assert_eq!(summary.frames, 1);
    }

    #[test]
    fn missing_map_fails_the_run() {
        let mut app = wiring(RunOptions::default());
        app.world = SceneWorld::default();
        assert!(matches!(
            run_headless(app).expect_err("no map"),
            DriverError::MapNotLoaded
        ));
    }
}
