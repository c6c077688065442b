use std::fmt::Display;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use runner_engine::{Bounds, LoopConfig, Pacing, Transform, Vec2};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::gameplay::{
    AutopilotSettings, PlayArea, PlayerSettings, RunnerConfig, SpawnSettings, StateSettings,
};

pub const SETTINGS_FILE_NAME: &str = "runner.json";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("read settings '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("parse settings json at {field}: {source}")]
    Parse {
        field: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("validation failed at {field}: expected {expected}, got {actual}")]
    Invalid {
        field: String,
        expected: String,
        actual: String,
    },
}

fn expected_actual(
    field: impl Into<String>,
    expected: impl Display,
    actual: impl Display,
) -> SettingsError {
    SettingsError::Invalid {
        field: field.into(),
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingsVec2 {
    pub x: f32,
    pub y: f32,
}

impl From<SettingsVec2> for Vec2 {
    fn from(value: SettingsVec2) -> Self {
        Vec2::new(value.x, value.y)
    }
}

impl From<Vec2> for SettingsVec2 {
    fn from(value: Vec2) -> Self {
        Self {
            x: value.x,
            y: value.y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StateSection {
    pub velocity_amount: f32,
    pub velocity_change_time: i64,
    pub max_velocity_scale: f32,
}

impl Default for StateSection {
    fn default() -> Self {
        let defaults = StateSettings::default();
        Self {
            velocity_amount: defaults.velocity_amount,
            velocity_change_time: defaults.velocity_change_time,
            max_velocity_scale: defaults.max_velocity_scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpawnPointSection {
    pub prototype: String,
    pub position: SettingsVec2,
    pub initial_interval: f32,
    pub min_interval: f32,
    pub max_interval: f32,
    pub time_discount: f32,
}

impl Default for SpawnPointSection {
    fn default() -> Self {
        let defaults = RunnerConfig::default();
        let spawn = defaults
            .spawn_points
            .into_iter()
            .next()
            .unwrap_or_default();
        Self {
            prototype: spawn.prototype,
            position: spawn.transform.position.into(),
            initial_interval: spawn.initial_interval,
            min_interval: spawn.min_interval,
            max_interval: spawn.max_interval,
            time_discount: spawn.time_discount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerSection {
    pub prototype: String,
    pub spawn_position: SettingsVec2,
    pub jump_impulse: SettingsVec2,
    pub gravity: f32,
}

impl Default for PlayerSection {
    fn default() -> Self {
        let defaults = PlayerSettings::default();
        Self {
            prototype: defaults.prototype,
            spawn_position: defaults.spawn.position.into(),
            jump_impulse: defaults.jump_impulse.into(),
            gravity: defaults.gravity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayAreaSection {
    pub min: SettingsVec2,
    pub max: SettingsVec2,
    pub floor_y: f32,
}

impl Default for PlayAreaSection {
    fn default() -> Self {
        let defaults = PlayArea::default();
        Self {
            min: defaults.bounds.min.into(),
            max: defaults.bounds.max.into(),
            floor_y: defaults.floor_y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopSection {
    pub target_tps: u32,
    pub max_frame_delta_ms: u64,
    pub max_ticks_per_frame: u32,
    pub metrics_log_interval_ms: u64,
    pub pacing: String,
}

impl Default for LoopSection {
    fn default() -> Self {
        let defaults = LoopConfig::default();
        Self {
            target_tps: defaults.target_tps,
            max_frame_delta_ms: defaults.max_frame_delta.as_millis() as u64,
            max_ticks_per_frame: defaults.max_ticks_per_frame,
            metrics_log_interval_ms: defaults.metrics_log_interval.as_millis() as u64,
            pacing: defaults.pacing.label().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutopilotSection {
    pub restart_delay_seconds: f32,
    pub max_rounds: Option<u32>,
}

impl Default for AutopilotSection {
    fn default() -> Self {
        Self {
            restart_delay_seconds: 2.0,
            max_rounds: None,
        }
    }
}

/// Contents of `assets/runner.json`. Every section is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerSettings {
    pub state: StateSection,
    pub spawn_points: Vec<SpawnPointSection>,
    pub player: PlayerSection,
    pub play_area: PlayAreaSection,
    pub frame_loop: LoopSection,
    pub autopilot: AutopilotSection,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            state: StateSection::default(),
            spawn_points: vec![SpawnPointSection::default()],
            player: PlayerSection::default(),
            play_area: PlayAreaSection::default(),
            frame_loop: LoopSection::default(),
            autopilot: AutopilotSection::default(),
        }
    }
}

impl RunnerSettings {
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            state: StateSettings {
                velocity_amount: self.state.velocity_amount,
                velocity_change_time: self.state.velocity_change_time,
                max_velocity_scale: self.state.max_velocity_scale,
            },
            spawn_points: self
                .spawn_points
                .iter()
                .map(|spawn| SpawnSettings {
                    prototype: spawn.prototype.clone(),
                    transform: Transform::at(spawn.position.into()),
                    initial_interval: spawn.initial_interval,
                    min_interval: spawn.min_interval,
                    max_interval: spawn.max_interval,
                    time_discount: spawn.time_discount,
                })
                .collect(),
            player: PlayerSettings {
                prototype: self.player.prototype.clone(),
                spawn: Transform::at(self.player.spawn_position.into()),
                jump_impulse: self.player.jump_impulse.into(),
                gravity: self.player.gravity,
            },
            play_area: PlayArea {
                bounds: Bounds {
                    min: self.play_area.min.into(),
                    max: self.play_area.max.into(),
                },
                floor_y: self.play_area.floor_y,
            },
        }
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            target_tps: self.frame_loop.target_tps,
            max_frame_delta: Duration::from_millis(self.frame_loop.max_frame_delta_ms),
            max_ticks_per_frame: self.frame_loop.max_ticks_per_frame,
            metrics_log_interval: Duration::from_millis(self.frame_loop.metrics_log_interval_ms),
            pacing: Pacing::from_label(&self.frame_loop.pacing).unwrap_or(Pacing::RealTime),
            max_run_duration: None,
        }
    }

    /// Obstacle speed is left at its default; callers that know the
    /// prototypes override it.
    pub fn autopilot_settings(&self) -> AutopilotSettings {
        let tps = self.frame_loop.target_tps.max(1) as f32;
        AutopilotSettings {
            player_prototype: self.player.prototype.clone(),
            restart_delay_ticks: (self.autopilot.restart_delay_seconds.max(0.0) * tps).round()
                as u32,
            max_rounds: self.autopilot.max_rounds,
            ..AutopilotSettings::default()
        }
    }

    /// Checks ranges serde cannot express. Reports the first failing field.
    pub fn validate(&self) -> Result<(), SettingsError> {
        let state = &self.state;
        if !(state.velocity_amount.is_finite() && state.velocity_amount >= 0.0) {
            return Err(expected_actual(
                "state.velocity_amount",
                "a finite value >= 0",
                state.velocity_amount,
            ));
        }
        if state.velocity_change_time < 1 {
            return Err(expected_actual(
                "state.velocity_change_time",
                ">= 1",
                state.velocity_change_time,
            ));
        }
        if !(state.max_velocity_scale.is_finite() && state.max_velocity_scale >= 1.0) {
            return Err(expected_actual(
                "state.max_velocity_scale",
                "a finite value >= 1",
                state.max_velocity_scale,
            ));
        }

        for (index, spawn) in self.spawn_points.iter().enumerate() {
            let field = |name: &str| format!("spawn_points[{index}].{name}");
            if spawn.prototype.trim().is_empty() {
                return Err(expected_actual(field("prototype"), "a prototype name", "\"\""));
            }
            for (name, value) in [
                ("initial_interval", spawn.initial_interval),
                ("min_interval", spawn.min_interval),
                ("max_interval", spawn.max_interval),
            ] {
                if !(value.is_finite() && value > 0.0) {
                    return Err(expected_actual(field(name), "a finite value > 0", value));
                }
            }
            if spawn.min_interval > spawn.max_interval {
                return Err(expected_actual(
                    field("max_interval"),
                    format!(">= min_interval ({})", spawn.min_interval),
                    spawn.max_interval,
                ));
            }
            if !(spawn.time_discount.is_finite() && spawn.time_discount >= 0.0) {
                return Err(expected_actual(
                    field("time_discount"),
                    "a finite value >= 0",
                    spawn.time_discount,
                ));
            }
        }

        if self.player.prototype.trim().is_empty() {
            return Err(expected_actual("player.prototype", "a prototype name", "\"\""));
        }
        if !(self.player.gravity.is_finite() && self.player.gravity > 0.0) {
            return Err(expected_actual(
                "player.gravity",
                "a finite value > 0",
                self.player.gravity,
            ));
        }

        let area = &self.play_area;
        if !(area.min.x < area.max.x && area.min.y < area.max.y) {
            return Err(expected_actual(
                "play_area.max",
                format!("greater than min ({}, {})", area.min.x, area.min.y),
                format!("({}, {})", area.max.x, area.max.y),
            ));
        }
        if !(area.floor_y > area.min.y && area.floor_y < area.max.y) {
            return Err(expected_actual(
                "play_area.floor_y",
                format!("a value inside ({}, {})", area.min.y, area.max.y),
                area.floor_y,
            ));
        }

        let frame_loop = &self.frame_loop;
        for (name, value) in [
            ("target_tps", u64::from(frame_loop.target_tps)),
            ("max_frame_delta_ms", frame_loop.max_frame_delta_ms),
            ("max_ticks_per_frame", u64::from(frame_loop.max_ticks_per_frame)),
            ("metrics_log_interval_ms", frame_loop.metrics_log_interval_ms),
        ] {
            if value == 0 {
                return Err(expected_actual(format!("frame_loop.{name}"), ">= 1", value));
            }
        }
        if Pacing::from_label(&frame_loop.pacing).is_none() {
            return Err(expected_actual(
                "frame_loop.pacing",
                "\"realtime\" or \"fast\"",
                format!("\"{}\"", frame_loop.pacing),
            ));
        }

        let restart_delay = self.autopilot.restart_delay_seconds;
        if !(restart_delay.is_finite() && restart_delay >= 0.0) {
            return Err(expected_actual(
                "autopilot.restart_delay_seconds",
                "a finite value >= 0",
                restart_delay,
            ));
        }
        Ok(())
    }
}

/// Parses and validates settings JSON. Parse errors name the JSON path.
pub fn parse_settings_json(raw: &str) -> Result<RunnerSettings, SettingsError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    let settings: RunnerSettings = serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|error| {
            let path = error.path().to_string();
            SettingsError::Parse {
                field: if path.is_empty() { ".".to_string() } else { path },
                source: error.into_inner(),
            }
        })?;
    settings.validate()?;
    Ok(settings)
}

/// Returns `Ok(None)` when the file does not exist.
pub fn load_settings(path: &Path) -> Result<Option<RunnerSettings>, SettingsError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    parse_settings_json(&raw).map(Some)
}
