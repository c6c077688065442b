use std::env;
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;
use std::time::Duration;

use runner_engine::{
    load_prototypes, parse_prototypes, resolve_app_paths, ContentError, LoopConfig, Pacing,
    PrototypeDatabase, StartupError,
};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use super::gameplay::{Autopilot, RunnerScene};
use super::settings::{load_settings, RunnerSettings, SettingsError, SETTINGS_FILE_NAME};

const SIM_SECONDS_ENV_VAR: &str = "RUNNER_SIM_SECONDS";
const MAX_LIVE_ENTITIES_ENV_VAR: &str = "RUNNER_MAX_LIVE_ENTITIES";
const PACING_ENV_VAR: &str = "RUNNER_PACING";
const PROTOTYPES_FILE_NAME: &str = "prototypes.xml";
const BUILT_IN_PROTOTYPES: &str = include_str!("../../../../assets/base/prototypes.xml");

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Content(#[from] ContentError),
}

pub(crate) struct AppWiring {
    pub(crate) config: LoopConfig,
    pub(crate) scene: Box<RunnerScene>,
    pub(crate) autopilot: Autopilot,
}

pub(crate) fn build_app() -> Result<AppWiring, AppError> {
    init_tracing();
    info!("=== Runner Startup ===");

    let paths = resolve_app_paths()?;
    info!(root = %paths.root.display(), "app_paths_resolved");
    let settings = load_runner_settings(&paths.assets_dir.join(SETTINGS_FILE_NAME))?;
    let prototypes = Rc::new(load_prototype_database(
        &paths.base_content_dir.join(PROTOTYPES_FILE_NAME),
    )?);

    let overrides = EnvOverrides::from_env();
    let mut config = settings.loop_config();
    overrides.apply(&mut config);

    let scene = RunnerScene::new(
        settings.runner_config(),
        Rc::clone(&prototypes),
        overrides.max_live_entities,
    );
    let mut autopilot_settings = settings.autopilot_settings();
    if let Some(obstacle) = settings
        .spawn_points
        .first()
        .and_then(|spawn| prototypes.by_name(&spawn.prototype))
    {
        autopilot_settings.base_obstacle_speed = obstacle.speed;
    }
    let autopilot = Autopilot::new(autopilot_settings, scene.store());

    Ok(AppWiring {
        config,
        scene: Box::new(scene),
        autopilot,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_names(true)
        .compact()
        .init();
}

fn load_runner_settings(path: &Path) -> Result<RunnerSettings, SettingsError> {
    match load_settings(path)? {
        Some(settings) => {
            info!(path = %path.display(), "settings_loaded");
            Ok(settings)
        }
        None => {
            info!(path = %path.display(), "settings_missing_using_defaults");
            Ok(RunnerSettings::default())
        }
    }
}

fn load_prototype_database(path: &Path) -> Result<PrototypeDatabase, ContentError> {
    let database = if path.is_file() {
        load_prototypes(path)?
    } else {
        info!(path = %path.display(), "prototypes_missing_using_built_in");
        parse_prototypes(Path::new("<built-in>/prototypes.xml"), BUILT_IN_PROTOTYPES)?
    };
    info!(count = database.len(), "prototypes_loaded");
    Ok(database)
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct EnvOverrides {
    sim_duration: Option<Duration>,
    max_live_entities: Option<usize>,
    pacing: Option<Pacing>,
}

impl EnvOverrides {
    fn from_env() -> Self {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let sim_duration = parse_override(
            SIM_SECONDS_ENV_VAR,
            lookup(SIM_SECONDS_ENV_VAR),
            |seconds: &f64| seconds.is_finite() && *seconds > 0.0,
        )
        .map(Duration::from_secs_f64);
        let max_live_entities = parse_override(
            MAX_LIVE_ENTITIES_ENV_VAR,
            lookup(MAX_LIVE_ENTITIES_ENV_VAR),
            |max: &usize| *max > 0,
        );
        let pacing = lookup(PACING_ENV_VAR).and_then(|raw| {
            let pacing = Pacing::from_label(&raw);
            if pacing.is_none() {
                warn!(var = PACING_ENV_VAR, value = raw.as_str(), "invalid_env_override_ignored");
            }
            pacing
        });
        Self {
            sim_duration,
            max_live_entities,
            pacing,
        }
    }

    fn apply(&self, config: &mut LoopConfig) {
        if let Some(duration) = self.sim_duration {
            info!(seconds = duration.as_secs_f64(), "sim_duration_override");
            config.max_run_duration = Some(duration);
        }
        if let Some(pacing) = self.pacing {
            info!(pacing = pacing.label(), "pacing_override");
            config.pacing = pacing;
        }
        if let Some(max) = self.max_live_entities {
            info!(max_live_entities = max, "entity_capacity_override");
        }
    }
}

fn parse_override<T: FromStr>(
    var: &'static str,
    raw: Option<String>,
    accept: impl Fn(&T) -> bool,
) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse::<T>() {
        Ok(value) if accept(&value) => Some(value),
        _ => {
            warn!(var, value = raw.as_str(), "invalid_env_override_ignored");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;

    use super::*;

    fn overrides(pairs: &[(&str, &str)]) -> EnvOverrides {
        let values = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        EnvOverrides::from_lookup(|var| values.get(var).cloned())
    }

    #[test]
    fn valid_overrides_are_applied() {
        let overrides = overrides(&[
            (SIM_SECONDS_ENV_VAR, "2.5"),
            (MAX_LIVE_ENTITIES_ENV_VAR, " 12 "),
            (PACING_ENV_VAR, "fast"),
        ]);
        let mut config = LoopConfig::default();
        overrides.apply(&mut config);

        assert_eq!(config.max_run_duration, Some(Duration::from_millis(2500)));
        assert_eq!(config.pacing, Pacing::Unthrottled);
        assert_eq!(overrides.max_live_entities, Some(12));
    }

    #[test]
    fn invalid_overrides_are_ignored() {
        let overrides = overrides(&[
            (SIM_SECONDS_ENV_VAR, "-3"),
            (MAX_LIVE_ENTITIES_ENV_VAR, "lots"),
            (PACING_ENV_VAR, "warp"),
        ]);
        assert_eq!(overrides, EnvOverrides::default());

        let mut config = LoopConfig::default();
        overrides.apply(&mut config);
        assert_eq!(config.max_run_duration, None);
        assert_eq!(config.pacing, Pacing::RealTime);
    }

    #[test]
    fn built_in_prototypes_cover_player_and_enemy() {
        let dir = tempfile::tempdir().expect("tempdir");
        let database =
            load_prototype_database(&dir.path().join(PROTOTYPES_FILE_NAME)).expect("built-in");

        assert_eq!(database.by_name("runner.player").map(|p| p.category.as_str()), Some("Player"));
        assert_eq!(database.by_name("runner.enemy").map(|p| p.speed), Some(120.0));
    }

    #[test]
    fn prototype_file_on_disk_wins_over_built_in() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join(PROTOTYPES_FILE_NAME);
        fs::write(
            &path,
            "<Prototypes><Prototype><name>runner.enemy</name><category>Enemy</category>\
             <speed>90</speed></Prototype></Prototypes>",
        )
        .expect("write");

        let database = load_prototype_database(&path).expect("load");

        assert_eq!(database.len(), 1);
        assert_eq!(database.by_name("runner.enemy").map(|p| p.speed), Some(90.0));
    }

    #[test]
    fn missing_settings_fall_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings =
            load_runner_settings(&dir.path().join(SETTINGS_FILE_NAME)).expect("defaults");
        assert_eq!(settings, RunnerSettings::default());
    }

    #[test]
    fn shipped_settings_file_is_valid() {
        let raw = include_str!("../../../../assets/runner.json");
        let settings = super::super::settings::parse_settings_json(raw).expect("valid");
        assert_eq!(settings, RunnerSettings::default());
    }
}
