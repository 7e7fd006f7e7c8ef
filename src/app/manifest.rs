//! Offline cache manifest of a saved build.
//!
//! The version directory is walked concurrently: every stat and every
//! directory listing is one pending unit on a [`Latch`], registered before
//! the operation is spawned. The manifest is written by the latch's
//! continuation, after the last listing resolved.

use std::fs;
use std::io;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, anyhow};
use parking_lot::Mutex;

use super::Application;
use crate::core::Latch;
use crate::log;

const MANIFEST_FILE: &str = "app.manifest";

struct Scan<'a> {
    root: &'a Path,
    files: &'a Mutex<Vec<String>>,
    failure: &'a Mutex<Option<io::Error>>,
    aborted: AtomicBool,
    latch: Latch<'a>,
}

impl Scan<'_> {
    fn fail(&self, err: io::Error) {
        self.aborted.store(true, Ordering::Release);
        self.failure.lock().get_or_insert(err);
    }

    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }
}

/// Every regular file under `root` as a `/`-rooted relative path, sorted.
/// Entries whose name starts with `.` are skipped along with their
/// contents. The first I/O failure aborts the scan.
///
/// `on_complete` runs exactly once, after every stat and listing finished.
pub fn scan(root: &Path, on_complete: impl FnOnce(io::Result<Vec<String>>) + Send) {
    let files = Mutex::new(Vec::new());
    let failure = Mutex::new(None);
    let latch = Latch::new(0, || {
        let result = match failure.lock().take() {
            Some(err) => Err(err),
            None => {
                let mut files = mem::take(&mut *files.lock());
                files.sort();
                Ok(files)
            }
        };
        on_complete(result);
    });

    let scan = Scan {
        root,
        files: &files,
        failure: &failure,
        aborted: AtomicBool::new(false),
        latch,
    };
    rayon::scope(|s| visit(s, &scan, root.to_path_buf()));
    scan.latch.fire_if_idle();
}

fn visit<'s, 'a: 's>(scope: &rayon::Scope<'s>, scan: &'s Scan<'a>, path: PathBuf) {
    scan.latch.add(1);
    scope.spawn(move |scope| {
        if !scan.is_aborted() {
            match fs::metadata(&path) {
                Err(err) => scan.fail(err),
                Ok(meta) if meta.is_dir() => list(scope, scan, &path),
                Ok(_) => {
                    let relative = path.strip_prefix(scan.root).unwrap_or(&path);
                    scan.files.lock().push(url_path(relative));
                }
            }
        }
        scan.latch.count_down();
    });
}

fn list<'s, 'a: 's>(scope: &rayon::Scope<'s>, scan: &'s Scan<'a>, dir: &Path) {
    scan.latch.add(1);
    match fs::read_dir(dir) {
        Err(err) => scan.fail(err),
        Ok(entries) => {
            for entry in entries {
                match entry {
                    Err(err) => {
                        scan.fail(err);
                        break;
                    }
                    Ok(entry) if entry.file_name().to_string_lossy().starts_with('.') => {}
                    Ok(entry) => visit(scope, scan, entry.path()),
                }
            }
        }
    }
    scan.latch.count_down();
}

fn url_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| format!("/{}", c.as_os_str().to_string_lossy()))
        .collect()
}

/// Manifest text for `files` under `version`.
pub fn render_manifest(version: &str, files: &[String]) -> String {
    let mut out = String::from("CACHE MANIFEST\n");
    out.push_str("# List of all resources required by this project\n");
    out.push_str(&format!("# Build {version}\n"));
    out.push_str("\nCACHE:\n");
    for file in files {
        out.push_str(&format!("/{version}{file}\n"));
    }
    out.push_str("\nNETWORK:\n*\n");
    out
}

impl Application {
    /// Write `<save_path>/<version>/app.manifest` listing every saved file
    /// under the version directory.
    pub fn manifest(&self) -> Result<PathBuf> {
        let root = self.save_path.join(&self.build_version);
        let target = root.join(MANIFEST_FILE);

        let mut outcome = None;
        scan(&root, |result| {
            outcome = Some(
                result
                    .with_context(|| format!("failed to scan {}", root.display()))
                    .and_then(|mut files| {
                        files.retain(|file| file.trim_start_matches('/') != MANIFEST_FILE);
                        let text = render_manifest(&self.build_version, &files);
                        fs::write(&target, text)
                            .with_context(|| format!("failed to write {}", target.display()))?;
                        log!("manifest"; "{}: {} entries", self.name, files.len());
                        Ok(())
                    }),
            );
        });

        outcome
            .unwrap_or_else(|| Err(anyhow!("manifest scan of `{}` never completed", self.name)))?;
        Ok(target)
    }
}
