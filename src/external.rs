//! Rasterization of DOT text through an external Graphviz process.
//!
//! The DOT generation itself never touches the filesystem; everything that
//! spawns a process or writes files lives behind `GraphBackend`.

use std::fmt;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::str::FromStr;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::Builder;
use tracing::{debug, warn};

use crate::config::{GraphvizConfig, PROCESS_POLL_INTERVAL};
use crate::dot::DotRenderer;
use crate::error::{Error, RenderBackendError};
use crate::tree::DecisionTree;

/// Output formats understood by Graphviz's `-T` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ImageFormat {
    #[default]
    Png,
    Svg,
    Pdf,
    Jpg,
    Gif,
    Dot,
}

impl ImageFormat {
    /// Name passed to `dot -T`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
            ImageFormat::Pdf => "pdf",
            ImageFormat::Jpg => "jpg",
            ImageFormat::Gif => "gif",
            ImageFormat::Dot => "dot",
        }
    }

    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "svg" => Ok(ImageFormat::Svg),
            "pdf" => Ok(ImageFormat::Pdf),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpg),
            "gif" => Ok(ImageFormat::Gif),
            "dot" | "gv" => Ok(ImageFormat::Dot),
            other => Err(format!("unsupported image format: {other}")),
        }
    }
}

/// Turns DOT text into a file on disk.
pub trait GraphBackend {
    /// Renders `dot` in `format` to `output`. Must either write `output` or fail.
    fn render(&self, dot: &str, format: ImageFormat, output: &Path) -> Result<(), RenderBackendError>;
}

/// Runs the Graphviz `dot` executable.
#[derive(Debug, Clone, Default)]
pub struct Graphviz {
    config: GraphvizConfig,
}

impl Graphviz {
    pub fn new(config: GraphvizConfig) -> Self {
        Graphviz { config }
    }

    pub fn from_env() -> Self {
        Graphviz::new(GraphvizConfig::from_env())
    }

    pub fn config(&self) -> &GraphvizConfig {
        &self.config
    }

    fn spawn(&self, source: &Path, format: ImageFormat, output: &Path, stderr: File) -> Result<Child, RenderBackendError> {
        Command::new(&self.config.executable)
            .arg(format!("-T{}", format.as_str()))
            .arg("-o")
            .arg(output)
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound | ErrorKind::PermissionDenied => RenderBackendError::Unavailable {
                    executable: self.config.executable.clone(),
                    source: e,
                },
                _ => RenderBackendError::Io(e),
            })
    }
}

/// Polls `child` until it exits or `timeout` elapses. A child still running
/// at the deadline is killed and reaped before returning `Timeout`.
fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus, RenderBackendError> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            if let Err(e) = child.kill() {
                // InvalidInput means it exited between try_wait and kill.
                if e.kind() != ErrorKind::InvalidInput {
                    return Err(e.into());
                }
            }
            child.wait()?;
            return Err(RenderBackendError::Timeout(timeout));
        }
        thread::sleep(PROCESS_POLL_INTERVAL);
    }
}

impl GraphBackend for Graphviz {
    fn render(&self, dot: &str, format: ImageFormat, output: &Path) -> Result<(), RenderBackendError> {
        // Staging dir beside `output`: `output` is only ever replaced by the final rename.
        // Dropped on every return path, removing the source, stderr and any partial image.
        let workdir = Builder::new().prefix(".dtree-dot-").tempdir_in(parent_dir(output))?;
        let source = workdir.path().join("tree.gv");
        let staged = workdir.path().join(format!("tree.{}", format.extension()));
        let stderr_path = workdir.path().join("stderr.log");
        fs::write(&source, dot)?;

        debug!(
            executable = %self.config.executable.display(),
            format = format.as_str(),
            output = %output.display(),
            "spawning graphviz"
        );
        let mut child = self.spawn(&source, format, &staged, File::create(&stderr_path)?)?;
        let status = wait_with_timeout(&mut child, self.config.timeout).inspect_err(|e| {
            warn!(error = %e, "graphviz render aborted");
        })?;

        if !status.success() {
            let stderr = fs::read_to_string(&stderr_path).unwrap_or_default();
            warn!(%status, stderr = stderr.trim(), "graphviz exited with failure");
            return Err(RenderBackendError::Failed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }
        if !staged.is_file() {
            return Err(RenderBackendError::MissingOutput(output.to_path_buf()));
        }
        fs::rename(&staged, output)?;
        Ok(())
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Renders `tree` and writes the image to `output_path` through `backend`.
///
/// # Errors
/// * `Error::InvalidModel` if the tree and name lists disagree.
/// * `Error::RenderBackend` if the backend is missing, times out, fails, or writes nothing.
pub fn save_image(
    tree: &DecisionTree,
    used_feature_names: &[String],
    class_names: &[String],
    all_feature_names: Option<&[String]>,
    output_path: &Path,
    format: ImageFormat,
    backend: &dyn GraphBackend,
) -> Result<PathBuf, Error> {
    DotRenderer::new(used_feature_names, class_names, all_feature_names).save(tree, output_path, format, backend)
}

/// Writes DOT text straight to a file, no Graphviz needed.
pub fn write_dot(dot: &str, output_path: &Path) -> Result<(), Error> {
    fs::write(output_path, dot).map_err(|source| Error::Io {
        path: output_path.to_path_buf(),
        source,
    })
}

/// Checks whether the configured executable can be started at all.
pub fn is_available(config: &GraphvizConfig) -> bool {
    Command::new(&config.executable)
        .arg("-V")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Writes an executable shell script standing in for `dot`.
    /// It receives `-T<fmt> -o <output> <source>`, so `$3` is the output path.
    #[cfg(unix)]
    fn fake_dot(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-dot");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut entries: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        entries
    }

    #[test]
    fn test_image_format_parsing() {
        assert_eq!("png".parse::<ImageFormat>(), Ok(ImageFormat::Png));
        assert_eq!("SVG".parse::<ImageFormat>(), Ok(ImageFormat::Svg));
        assert_eq!("jpeg".parse::<ImageFormat>(), Ok(ImageFormat::Jpg));
        assert!("bmp".parse::<ImageFormat>().is_err());
        assert_eq!(ImageFormat::default(), ImageFormat::Png);
        assert_eq!(ImageFormat::Pdf.to_string(), "pdf");
    }

    #[test]
    fn test_missing_executable_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let config = GraphvizConfig::default().with_executable(dir.path().join("no-such-dot"));
        let backend = Graphviz::new(config.clone());
        let output = dir.path().join("tree.png");

        let err = backend.render("digraph Tree {}", ImageFormat::Png, &output).unwrap_err();
        assert!(matches!(err, RenderBackendError::Unavailable { .. }), "got {err:?}");
        assert!(!output.exists());
        assert!(!is_available(&config));
    }

    #[cfg(unix)]
    #[test]
    fn test_non_zero_exit_is_reported() {
        // `false` ignores its arguments and exits with status 1.
        let dir = TempDir::new().unwrap();
        let backend = Graphviz::new(GraphvizConfig::default().with_executable("false"));
        let err = backend
            .render("digraph Tree {}", ImageFormat::Png, &dir.path().join("tree.png"))
            .unwrap_err();
        assert!(matches!(err, RenderBackendError::Failed { .. }), "got {err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn test_success_without_output_is_reported() {
        // `true` exits 0 without writing anything.
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("tree.png");
        let backend = Graphviz::new(GraphvizConfig::default().with_executable("true"));
        let err = backend.render("digraph Tree {}", ImageFormat::Png, &output).unwrap_err();
        assert!(matches!(err, RenderBackendError::MissingOutput(ref p) if p == &output), "got {err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn test_slow_render_is_killed_at_timeout() {
        let bin_dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("tree.png");
        let config = GraphvizConfig::default()
            .with_executable(fake_dot(bin_dir.path(), "exec sleep 30"))
            .with_timeout(Duration::from_millis(300));

        let started = Instant::now();
        let err = Graphviz::new(config)
            .render("digraph Tree {}", ImageFormat::Png, &output)
            .unwrap_err();
        assert!(matches!(err, RenderBackendError::Timeout(t) if t == Duration::from_millis(300)), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(!output.exists());
        assert!(dir_entries(out_dir.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_render_keeps_existing_output() {
        let bin_dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("tree.png");
        fs::write(&output, "old image").unwrap();
        let config =
            GraphvizConfig::default().with_executable(fake_dot(bin_dir.path(), "printf partial > \"$3\"\nexit 1"));

        let err = Graphviz::new(config)
            .render("digraph Tree {}", ImageFormat::Png, &output)
            .unwrap_err();
        assert!(matches!(err, RenderBackendError::Failed { .. }), "got {err:?}");
        assert_eq!(fs::read_to_string(&output).unwrap(), "old image");
        assert_eq!(dir_entries(out_dir.path()), ["tree.png"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_successful_render_replaces_output() {
        let bin_dir = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("tree.svg");
        fs::write(&output, "old image").unwrap();
        let config = GraphvizConfig::default().with_executable(fake_dot(bin_dir.path(), "printf rendered > \"$3\""));

        Graphviz::new(config)
            .render("digraph Tree {}", ImageFormat::Svg, &output)
            .unwrap();
        assert_eq!(fs::read_to_string(&output).unwrap(), "rendered");
        assert_eq!(dir_entries(out_dir.path()), ["tree.svg"]);
    }
}
