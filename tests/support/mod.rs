// ABOUTME: Test support utilities.
// ABOUTME: Tracing setup, config files, and webhook fixtures shared by integration tests.

use std::path::Path;
use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("dockhand=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Complete config rooted at `dir`, with the project directory created.
#[allow(dead_code)]
pub fn write_config(dir: &Path, build_type: &str) -> std::path::PathBuf {
    let project = dir.join("shop");
    std::fs::create_dir_all(&project).unwrap();
    let yaml = format!(
        "project_directory: {}\n\
         data_directory: {}\n\
         secrets_directory: {}\n\
         docker_compose_version: docker/compose:1.22.0\n\
         webhook_secret: s3cret\n\
         branch: main\n\
         build_type: {}\n",
        project.display(),
        dir.join("data").display(),
        dir.join("secrets").display(),
        build_type,
    );
    let path = dir.join("dockhand.yml");
    std::fs::write(&path, yaml).unwrap();
    path
}

/// A raw webhook body from `tests/fixtures`.
#[allow(dead_code)]
pub fn fixture(name: &str) -> Vec<u8> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("reading {}: {}", path.display(), e))
}
