// ABOUTME: Daemon configuration: YAML file, environment overrides, and validation.
// ABOUTME: Validated settings are immutable and shared by the pipeline and builder.

use crate::error::{Error, Result};
use crate::runtime::RuntimeConfig;
use crate::types::{ImageRef, ProjectName};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILENAME: &str = "dockhand.yml";
pub const CONFIG_FILENAME_ALT: &str = "dockhand.yaml";

pub const ENV_PROJECT_DIR: &str = "DOCKHAND_PROJECT_DIR";
pub const ENV_DATA_DIR: &str = "DOCKHAND_DATA_DIR";
pub const ENV_SECRETS_DIR: &str = "DOCKHAND_SECRETS_DIR";
pub const ENV_DOCKER_COMPOSE: &str = "DOCKHAND_DOCKERCOMPOSE";
pub const ENV_HEROKUISH: &str = "DOCKHAND_HEROKUISH";
pub const ENV_WEBHOOK_SECRET: &str = "DOCKHAND_WEBHOOK_SECRET";
pub const ENV_BRANCH: &str = "DOCKHAND_BRANCH";
pub const ENV_BUILD_TYPE: &str = "DOCKHAND_BUILD_TYPE";
pub const ENV_PROJECT_NAME: &str = "DOCKHAND_PROJECT_NAME";

pub const DEFAULT_BUILD_TYPE: &str = "docker-compose";
pub const DEFAULT_HEROKUISH_IMAGE: &str = "gliderlabs/herokuish:v0.4.3";
pub const DAEMON_CONTAINER_NAME: &str = "dockhand-daemon";

/// Configuration as read from a file and the environment.
///
/// Required values are optional here so that every missing one can be
/// reported at once by [`Config::validate`].
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub project_directory: Option<PathBuf>,

    #[serde(default)]
    pub data_directory: Option<PathBuf>,

    #[serde(default)]
    pub secrets_directory: Option<PathBuf>,

    #[serde(default)]
    pub project_name: Option<String>,

    #[serde(default = "default_build_type")]
    pub build_type: String,

    #[serde(default)]
    pub docker_compose_version: Option<String>,

    #[serde(default = "default_herokuish_version")]
    pub herokuish_version: String,

    #[serde(default)]
    pub webhook_secret: Option<String>,

    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default = "default_infrastructure_containers")]
    pub infrastructure_containers: Vec<String>,

    #[serde(default = "default_stop_timeout", with = "humantime_serde")]
    pub stop_timeout: Duration,

    #[serde(default = "default_log_tail_lines")]
    pub log_tail_lines: usize,

    #[serde(default)]
    pub runtime: Option<RuntimeConfig>,
}

fn default_build_type() -> String {
    DEFAULT_BUILD_TYPE.to_string()
}

fn default_herokuish_version() -> String {
    DEFAULT_HEROKUISH_IMAGE.to_string()
}

fn default_infrastructure_containers() -> Vec<String> {
    vec![DAEMON_CONTAINER_NAME.to_string()]
}

fn default_stop_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_log_tail_lines() -> usize {
    200
}

impl Default for Config {
    fn default() -> Self {
        Config {
            project_directory: None,
            data_directory: None,
            secrets_directory: None,
            project_name: None,
            build_type: default_build_type(),
            docker_compose_version: None,
            herokuish_version: default_herokuish_version(),
            webhook_secret: None,
            branch: None,
            infrastructure_containers: default_infrastructure_containers(),
            stop_timeout: default_stop_timeout(),
            log_tail_lines: default_log_tail_lines(),
            runtime: None,
        }
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        let candidates = [dir.join(CONFIG_FILENAME), dir.join(CONFIG_FILENAME_ALT)];

        for path in &candidates {
            if path.exists() {
                return Self::load(path);
            }
        }

        Err(Error::ConfigNotFound(dir.to_path_buf()))
    }

    /// Defaults overlaid with `DOCKHAND_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Overwrite fields whose `DOCKHAND_*` variable is set and non-empty.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_var(ENV_PROJECT_DIR) {
            self.project_directory = Some(PathBuf::from(v));
        }
        if let Some(v) = env_var(ENV_DATA_DIR) {
            self.data_directory = Some(PathBuf::from(v));
        }
        if let Some(v) = env_var(ENV_SECRETS_DIR) {
            self.secrets_directory = Some(PathBuf::from(v));
        }
        if let Some(v) = env_var(ENV_DOCKER_COMPOSE) {
            self.docker_compose_version = Some(v);
        }
        if let Some(v) = env_var(ENV_HEROKUISH) {
            self.herokuish_version = v;
        }
        if let Some(v) = env_var(ENV_WEBHOOK_SECRET) {
            self.webhook_secret = Some(v);
        }
        if let Some(v) = env_var(ENV_BRANCH) {
            self.branch = Some(v);
        }
        if let Some(v) = env_var(ENV_BUILD_TYPE) {
            self.build_type = v;
        }
        if let Some(v) = env_var(ENV_PROJECT_NAME) {
            self.project_name = Some(v);
        }
    }

    /// Check that every required value is present and well-formed.
    pub fn validate(&self) -> Result<Settings> {
        let mut missing = Vec::new();
        let project_directory = required(&self.project_directory, "project_directory", &mut missing);
        let data_directory = required(&self.data_directory, "data_directory", &mut missing);
        let secrets_directory = required(&self.secrets_directory, "secrets_directory", &mut missing);
        let compose = required(
            &self.docker_compose_version,
            "docker_compose_version",
            &mut missing,
        );
        let webhook_secret = required(&self.webhook_secret, "webhook_secret", &mut missing);
        let branch = required(&self.branch, "branch", &mut missing);

        let (
            Some(project_directory),
            Some(data_directory),
            Some(secrets_directory),
            Some(compose),
            Some(webhook_secret),
            Some(branch),
        ) = (
            project_directory,
            data_directory,
            secrets_directory,
            compose,
            webhook_secret,
            branch,
        )
        else {
            return Err(Error::MissingConfig(missing.join(", ")));
        };

        let project = match self.project_name.as_deref() {
            Some(name) => ProjectName::new(name),
            None => ProjectName::from_directory(&project_directory),
        }
        .map_err(|e| Error::InvalidConfig(format!("project name: {}", e)))?;

        let compose_image = ImageRef::parse(&compose)
            .map_err(|e| Error::InvalidConfig(format!("docker_compose_version: {}", e)))?;
        let herokuish_image = ImageRef::parse(&self.herokuish_version)
            .map_err(|e| Error::InvalidConfig(format!("herokuish_version: {}", e)))?;

        if self.log_tail_lines == 0 {
            return Err(Error::InvalidConfig(
                "log_tail_lines must be at least 1".to_string(),
            ));
        }

        Ok(Settings {
            project_directory,
            data_directory,
            secrets_directory,
            project,
            build_type: self.build_type.trim().to_string(),
            compose_image,
            herokuish_image,
            webhook_secret,
            branch: normalize_branch(&branch),
            infrastructure_containers: self.infrastructure_containers.clone(),
            stop_timeout: self.stop_timeout,
            log_tail_lines: self.log_tail_lines,
            runtime: self.runtime.clone(),
        })
    }
}

/// Validated configuration the daemon runs with.
#[derive(Debug, Clone)]
pub struct Settings {
    pub project_directory: PathBuf,
    pub data_directory: PathBuf,
    pub secrets_directory: PathBuf,
    pub project: ProjectName,
    /// Unresolved; unknown names are rejected when a build starts.
    pub build_type: String,
    pub compose_image: ImageRef,
    pub herokuish_image: ImageRef,
    pub webhook_secret: String,
    /// Full ref, e.g. `refs/heads/main`.
    pub branch: String,
    pub infrastructure_containers: Vec<String>,
    pub stop_timeout: Duration,
    pub log_tail_lines: usize,
    pub runtime: Option<RuntimeConfig>,
}

impl Settings {
    /// Branch name without the `refs/heads/` prefix.
    pub fn branch_name(&self) -> &str {
        self.branch
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.branch)
    }

    #[cfg(test)]
    pub(crate) fn for_directory(dir: &Path, project: ProjectName) -> Self {
        Settings {
            project_directory: dir.join("project"),
            data_directory: dir.join("data"),
            secrets_directory: dir.join("secrets"),
            project,
            build_type: default_build_type(),
            compose_image: ImageRef::parse("docker/compose:1.22.0").unwrap(),
            herokuish_image: ImageRef::parse(DEFAULT_HEROKUISH_IMAGE).unwrap(),
            webhook_secret: "secret".to_string(),
            branch: "refs/heads/main".to_string(),
            infrastructure_containers: default_infrastructure_containers(),
            stop_timeout: default_stop_timeout(),
            log_tail_lines: default_log_tail_lines(),
            runtime: None,
        }
    }
}

/// `main` becomes `refs/heads/main`; anything already under `refs/` is kept.
pub fn normalize_branch(branch: &str) -> String {
    let branch = branch.trim();
    if branch.starts_with("refs/") {
        branch.to_string()
    } else {
        format!("refs/heads/{}", branch)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required<T>(value: &Option<T>, field: &'static str, missing: &mut Vec<&'static str>) -> Option<T>
where
    T: Clone + Blank,
{
    match value {
        Some(v) if !v.is_blank() => Some(v.clone()),
        _ => {
            missing.push(field);
            None
        }
    }
}

/// Values that can be present yet empty.
trait Blank {
    fn is_blank(&self) -> bool;
}

impl Blank for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl Blank for PathBuf {
    fn is_blank(&self) -> bool {
        self.as_os_str().is_empty()
    }
}
