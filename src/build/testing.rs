// ABOUTME: Test fixtures for builder and strategy tests.
// ABOUTME: Wires a FakeRuntime, a temporary project directory, and a recording log sink.

use super::builder::Builder;
use super::context::BuildContext;
use super::stopper::{ContainerStopper, ProjectContainerStopper};
use crate::config::Settings;
use crate::runtime::LogSink;
use crate::runtime::fake::FakeRuntime;
use crate::types::ProjectName;
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

#[derive(Default)]
pub(crate) struct RecordingSink {
    lines: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|l| l.contains(needle))
    }
}

impl LogSink for RecordingSink {
    fn write_line(&self, line: &str) {
        self.lines.lock().push(line.to_string());
    }
}

pub(crate) struct Harness {
    pub ctx: BuildContext<FakeRuntime>,
    pub runtime: Arc<FakeRuntime>,
    pub settings: Arc<Settings>,
    pub stopper: Arc<dyn ContainerStopper>,
    pub log: Arc<RecordingSink>,
    _dir: TempDir,
}

impl Harness {
    /// Project `shop` with an empty project directory.
    pub fn new(build_type: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            build_type: build_type.to_string(),
            ..Settings::for_directory(dir.path(), ProjectName::new("shop").unwrap())
        };
        std::fs::create_dir_all(&settings.project_directory).unwrap();
        let settings = Arc::new(settings);

        let runtime = Arc::new(FakeRuntime::new());
        let stopper: Arc<dyn ContainerStopper> = Arc::new(
            ProjectContainerStopper::new(runtime.clone(), &settings).with_own_id(None),
        );
        let log = Arc::new(RecordingSink::default());

        let ctx = BuildContext {
            runtime: runtime.clone(),
            settings: settings.clone(),
            stopper: stopper.clone(),
            sink: log.clone(),
        };

        Self {
            ctx,
            runtime,
            settings,
            stopper,
            log,
            _dir: dir,
        }
    }

    pub fn builder(&self) -> Builder<FakeRuntime> {
        Builder::new(
            self.runtime.clone(),
            self.settings.clone(),
            self.stopper.clone(),
        )
    }

    pub fn write_project_file(&self, name: &str, contents: &str) {
        std::fs::write(self.settings.project_directory.join(name), contents).unwrap();
    }
}
