// ABOUTME: Packs the project directory into a tar archive for image builds.
// ABOUTME: Runs on a blocking thread; VCS metadata is left out of the context.

use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::debug;

const SKIPPED: &[&str] = &[".git"];

/// Tar `src` into memory, with paths relative to `src`.
pub async fn tar_directory(src: &Path) -> std::io::Result<Vec<u8>> {
    let src = src.to_owned();
    spawn_blocking(move || tar_directory_sync(&src)).await?
}

fn tar_directory_sync(src: &Path) -> std::io::Result<Vec<u8>> {
    let mut tar_data = Vec::new();

    {
        let mut tar_builder = tar::Builder::new(&mut tar_data);
        tar_builder.follow_symlinks(false);

        for path in walk(src)? {
            let relative_path = path.strip_prefix(src).map_err(|e| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
            })?;

            if path.is_dir() {
                tar_builder.append_dir(relative_path, &path)?;
            } else {
                tar_builder.append_path_with_name(&path, relative_path)?;
            }
        }

        tar_builder.finish()?;
    }

    debug!(size = tar_data.len(), "created build context");
    Ok(tar_data)
}

/// Every entry under `root`, sorted so parents precede their children.
fn walk(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if SKIPPED.iter().any(|s| entry.file_name() == *s) {
                continue;
            }
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                pending.push(path.clone());
            }
            out.push(path);
        }
    }

    out.sort();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn archives_relative_paths_without_git() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Dockerfile"), "FROM alpine\n").unwrap();
        std::fs::create_dir_all(dir.path().join("src/bin")).unwrap();
        std::fs::write(dir.path().join("src/bin/app.sh"), "echo hi\n").unwrap();
        std::fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        std::fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();

        let data = tar_directory(dir.path()).await.unwrap();

        let mut archive = tar::Archive::new(std::io::Cursor::new(data));
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| {
                e.unwrap()
                    .path()
                    .unwrap()
                    .to_string_lossy()
                    .trim_end_matches('/')
                    .to_string()
            })
            .collect();

        assert_eq!(names, vec!["Dockerfile", "src", "src/bin", "src/bin/app.sh"]);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(tar_directory(&dir.path().join("absent")).await.is_err());
    }
}
