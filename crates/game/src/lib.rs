pub mod app;

pub use app::gameplay::{RunnerConfig, RunnerScene};
pub use app::run;
pub use app::settings::{parse_settings_json, RunnerSettings, SettingsError};
