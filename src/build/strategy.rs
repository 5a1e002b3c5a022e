// ABOUTME: Build strategy trait and the name-keyed registry that resolves build types.
// ABOUTME: Unknown build types are rejected; there is no fallback strategy.

use super::compose::ComposeStrategy;
use super::context::BuildContext;
use super::dockerfile::DockerfileStrategy;
use super::error::BuildError;
use super::herokuish::HerokuishStrategy;
use crate::config::Settings;
use crate::runtime::Runtime;
use crate::types::ImageRef;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The build types shipped with dockhand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuildType {
    DockerCompose,
    Dockerfile,
    Herokuish,
}

impl BuildType {
    pub const ALL: [BuildType; 3] = [
        BuildType::DockerCompose,
        BuildType::Dockerfile,
        BuildType::Herokuish,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BuildType::DockerCompose => "docker-compose",
            BuildType::Dockerfile => "dockerfile",
            BuildType::Herokuish => "herokuish",
        }
    }
}

impl fmt::Display for BuildType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildType {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BuildType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| BuildError::UnsupportedBuildType(s.to_string()))
    }
}

/// One way of turning the project directory into running containers.
///
/// `build` must not start the project; `deploy` starts what `build` produced.
#[async_trait]
pub trait BuildStrategy<R>: Send + Sync {
    fn name(&self) -> &str;

    /// Image this strategy tags, if it produces one of its own.
    fn artifact(&self, settings: &Settings) -> Option<ImageRef>;

    async fn build(&self, ctx: &BuildContext<R>) -> Result<(), BuildError>;

    async fn deploy(&self, ctx: &BuildContext<R>) -> Result<(), BuildError>;
}

/// Strategies by build type name.
pub struct StrategyRegistry<R> {
    strategies: BTreeMap<String, Arc<dyn BuildStrategy<R>>>,
}

impl<R: Runtime + 'static> StrategyRegistry<R> {
    pub fn empty() -> Self {
        Self {
            strategies: BTreeMap::new(),
        }
    }

    /// Registry holding the three built-in strategies.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ComposeStrategy));
        registry.register(Arc::new(DockerfileStrategy));
        registry.register(Arc::new(HerokuishStrategy));
        registry
    }

    /// Add or replace the strategy registered under its name.
    pub fn register(&mut self, strategy: Arc<dyn BuildStrategy<R>>) {
        self.strategies.insert(strategy.name().to_string(), strategy);
    }

    pub fn resolve(&self, build_type: &str) -> Result<Arc<dyn BuildStrategy<R>>, BuildError> {
        self.strategies
            .get(build_type)
            .cloned()
            .ok_or_else(|| BuildError::UnsupportedBuildType(build_type.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }
}

impl<R: Runtime + 'static> Default for StrategyRegistry<R> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::error::BuildErrorKind;
    use crate::runtime::fake::FakeRuntime;

    #[test]
    fn resolves_every_builtin() {
        let registry = StrategyRegistry::<FakeRuntime>::with_defaults();
        for build_type in BuildType::ALL {
            let strategy = registry.resolve(build_type.as_str()).unwrap();
            assert_eq!(strategy.name(), build_type.as_str());
        }
        assert_eq!(
            registry.names().collect::<Vec<_>>(),
            vec!["docker-compose", "dockerfile", "herokuish"]
        );
    }

    #[test]
    fn unknown_types_fail_closed() {
        let registry = StrategyRegistry::<FakeRuntime>::with_defaults();
        for name in ["", "buildah", "Dockerfile", "docker-compose "] {
            let err = registry.resolve(name).err().unwrap();
            assert_eq!(err.kind(), BuildErrorKind::UnsupportedBuildType);
        }
    }

    #[test]
    fn empty_registry_resolves_nothing() {
        let registry = StrategyRegistry::<FakeRuntime>::empty();
        assert!(registry.resolve("dockerfile").is_err());
    }

    #[test]
    fn build_type_round_trips_through_str() {
        assert_eq!("herokuish".parse::<BuildType>().unwrap(), BuildType::Herokuish);
        assert!("heroku".parse::<BuildType>().is_err());
    }
}
