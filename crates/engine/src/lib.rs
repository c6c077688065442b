use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

pub mod app;
pub mod content;
pub mod events;

pub use app::{
    run_app, run_app_with_metrics, Bounds, Entity, EntityId, FrameLoop, FrameOutcome, IdleInput,
    InputAction, InputSnapshot, InputSource, LoopConfig, LoopMetricsSnapshot, LoopSummary,
    MetricsHandle, Pacing, Scene, SceneCommand, SceneWorld, ShutdownReason, SpawnRequest,
    Transform, Vec2, WorldCommands,
};
pub use content::{
    load_prototypes, parse_prototypes, ContentError, ContentErrorCode, Prototype,
    PrototypeDatabase, PrototypeId, SourceLocation,
};
pub use events::{
    Event, EventBus, HandlerError, HandlerFailure, HandlerResult, PublishReport, Subscription,
    SubscriptionId,
};

pub const ROOT_ENV_VAR: &str = "RUNNER_ROOT";

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub root: PathBuf,
    pub assets_dir: PathBuf,
    pub base_content_dir: PathBuf,
}

impl AppPaths {
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let assets_dir = root.join("assets");
        let base_content_dir = assets_dir.join("base");
        Self {
            root,
            assets_dir,
            base_content_dir,
        }
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("RUNNER_ROOT is not valid unicode: {0:?}")]
    RootVarNotUnicode(std::ffi::OsString),
    #[error("cannot locate the running executable: {0}")]
    CurrentExe(#[source] std::io::Error),
    #[error("RUNNER_ROOT={path} is not a runner root (expected Cargo.toml next to crates/ or assets/)")]
    InvalidEnvRoot { path: PathBuf },
    #[error(
        "no runner root above {start_dir} (expected Cargo.toml next to crates/ or assets/); \
set RUNNER_ROOT to the checkout directory"
    )]
    RootNotFound { start_dir: PathBuf },
}

/// Where the runner's project root comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RootHint {
    Explicit(PathBuf),
    SearchFrom(PathBuf),
}

pub fn resolve_app_paths() -> Result<AppPaths, StartupError> {
    let hint = match env::var(ROOT_ENV_VAR) {
        Ok(value) => RootHint::Explicit(PathBuf::from(value)),
        Err(env::VarError::NotUnicode(raw)) => return Err(StartupError::RootVarNotUnicode(raw)),
        Err(env::VarError::NotPresent) => {
            let exe = env::current_exe().map_err(StartupError::CurrentExe)?;
            RootHint::SearchFrom(exe.parent().map(Path::to_path_buf).unwrap_or_default())
        }
    };
    resolve_root(hint).map(AppPaths::from_root)
}

fn resolve_root(hint: RootHint) -> Result<PathBuf, StartupError> {
    match hint {
        RootHint::Explicit(path) => {
            let path = canonical_or_given(&path);
            if looks_like_root(&path) {
                Ok(path)
            } else {
                Err(StartupError::InvalidEnvRoot { path })
            }
        }
        RootHint::SearchFrom(start_dir) => start_dir
            .ancestors()
            .find(|candidate| looks_like_root(candidate))
            .map(canonical_or_given)
            .ok_or_else(|| StartupError::RootNotFound {
                start_dir: canonical_or_given(&start_dir),
            }),
    }
}

fn looks_like_root(path: &Path) -> bool {
    path.join("Cargo.toml").is_file()
        && (path.join("crates").is_dir() || path.join("assets").is_dir())
}

fn canonical_or_given(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn checkout() -> TempDir {
        let temp = TempDir::new().expect("temp");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("manifest");
        fs::create_dir_all(temp.path().join("assets").join("base")).expect("assets");
        temp
    }

    #[test]
    fn manifest_alone_is_not_a_root() {
        let temp = TempDir::new().expect("temp");
        fs::write(temp.path().join("Cargo.toml"), "[workspace]\n").expect("manifest");
        assert!(!looks_like_root(temp.path()));

        fs::create_dir_all(temp.path().join("crates")).expect("crates");
        assert!(looks_like_root(temp.path()));
    }

    #[test]
    fn search_walks_up_from_the_binary_directory() {
        let temp = checkout();
        let binary_dir = temp.path().join("target").join("release");
        fs::create_dir_all(&binary_dir).expect("target");

        let root = resolve_root(RootHint::SearchFrom(binary_dir)).expect("root");

        assert_eq!(root, canonical_or_given(temp.path()));
    }

    #[test]
    fn explicit_root_must_look_like_a_checkout() {
        let temp = checkout();
        let assets = temp.path().join("assets");

        assert!(resolve_root(RootHint::Explicit(temp.path().to_path_buf())).is_ok());
        let err = resolve_root(RootHint::Explicit(assets)).expect_err("assets dir is not a root");
        assert!(matches!(err, StartupError::InvalidEnvRoot { .. }));
    }

    #[test]
    fn search_without_a_checkout_reports_start_dir() {
        let temp = TempDir::new().expect("temp");
        let err = resolve_root(RootHint::SearchFrom(temp.path().to_path_buf()))
            .expect_err("no checkout");
        assert!(err.to_string().contains(ROOT_ENV_VAR));
    }

    #[test]
    fn app_paths_layout_under_root() {
        let paths = AppPaths::from_root("/srv/runner");
        assert_eq!(paths.assets_dir, PathBuf::from("/srv/runner/assets"));
        assert_eq!(paths.base_content_dir, PathBuf::from("/srv/runner/assets/base"));
    }
}
