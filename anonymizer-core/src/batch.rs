//! Directory runs: discover media, order it, and drive one [`MediaJob`] per file.

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use log::{info, warn};
use walkdir::WalkDir;

use crate::{
    error::{AnonymizeError, Result},
    job::{JobContext, JobOutcome, MediaJob},
    media::{MediaKind, batch_output_root, mirrored_output_path},
    progress::{Monotonic, ProgressReporter},
};

/// One file scheduled by a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEntry {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub kind: MediaKind,
}

/// Ordered work list for a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchPlan {
    pub source_root: PathBuf,
    pub output_root: PathBuf,
    pub entries: Vec<BatchEntry>,
}

impl BatchPlan {
    /// Destinations claimed by more than one entry, in plan order.
    ///
    /// Happens when videos differing only in container (`a.avi`, `a.mov`) share a folder;
    /// the later job overwrites the earlier output.
    pub fn shared_destinations(&self) -> Vec<&Path> {
        let mut seen = HashSet::new();
        let mut shared = Vec::new();
        for entry in &self.entries {
            let dest = entry.destination.as_path();
            if !seen.insert(dest) && !shared.contains(&dest) {
                shared.push(dest);
            }
        }
        shared
    }
}

/// Result of a completed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    pub output_root: PathBuf,
    pub outcomes: Vec<JobOutcome>,
}

/// Supported media under `root`, in processing order.
///
/// Files are found depth-first with entries sorted by name, which fixes the discovery order.
/// Symlinked files count when their target is a regular file; linked directories are not entered.
/// Images are then moved ahead of videos; the sort is stable so each group keeps discovery
/// order.
pub fn discover_media(root: &Path) -> Result<Vec<(PathBuf, MediaKind)>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root).to_path_buf();
            AnonymizeError::read(&path, err)
        })?;
        let is_file = if entry.path_is_symlink() {
            entry.path().is_file()
        } else {
            entry.file_type().is_file()
        };
        if !is_file {
            continue;
        }
        if let Some(kind) = MediaKind::from_path(entry.path()) {
            found.push((entry.into_path(), kind));
        }
    }
    found.sort_by_key(|(_, kind)| *kind == MediaKind::Video);
    Ok(found)
}

/// Runs every supported file of a directory tree through the pipeline.
pub struct BatchCoordinator<'a> {
    ctx: JobContext<'a>,
}

impl<'a> BatchCoordinator<'a> {
    pub fn new(ctx: JobContext<'a>) -> Self {
        Self { ctx }
    }

    /// Resolve the output root and the ordered list of files for `root`.
    pub fn plan(&self, root: &Path) -> Result<BatchPlan> {
        if !root.is_dir() {
            return Err(AnonymizeError::Selection(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        let source_root = root
            .canonicalize()
            .map_err(|err| AnonymizeError::read(root, err))?;
        let output_root = batch_output_root(&source_root).ok_or_else(|| {
            AnonymizeError::Selection(format!(
                "cannot derive an output directory for {}",
                source_root.display()
            ))
        })?;

        let entries = discover_media(&source_root)?
            .into_iter()
            .map(|(source, kind)| BatchEntry {
                destination: mirrored_output_path(&source_root, &output_root, &source, kind),
                source,
                kind,
            })
            .collect();

        let plan = BatchPlan {
            source_root,
            output_root,
            entries,
        };
        for dest in plan.shared_destinations() {
            warn!(
                "Several inputs map to {}; only the last one processed is kept",
                dest.display()
            );
        }
        Ok(plan)
    }

    /// Anonymize every file of `root` into the sibling `<dirname>_anonymized` tree.
    ///
    /// Global progress for a file is reported before its job starts and reaches 1.0 once the
    /// last file is written. The first failure stops the batch; files already written stay.
    pub fn run(&self, root: &Path, progress: &dyn ProgressReporter) -> Result<BatchSummary> {
        let plan = self.plan(root)?;
        let total = plan.entries.len();
        if total == 0 {
            warn!("No supported images or videos found in {}", root.display());
            return Ok(BatchSummary {
                output_root: plan.output_root,
                outcomes: Vec::new(),
            });
        }
        info!(
            "Anonymizing {total} files from {} into {}",
            plan.source_root.display(),
            plan.output_root.display()
        );

        let mut global = Monotonic::default();
        let mut outcomes = Vec::with_capacity(total);
        for (index, entry) in plan.entries.iter().enumerate() {
            self.ctx.check_cancelled()?;
            progress.global(
                global.advance(index as f32 / total as f32),
                entry.kind,
                &entry.source,
            );

            if let Some(parent) = entry.destination.parent() {
                fs::create_dir_all(parent).map_err(|err| AnonymizeError::write(parent, err))?;
            }
            let mut job = MediaJob::new(&entry.source, &entry.destination, entry.kind);
            outcomes.push(job.run(&self.ctx, progress)?);
        }

        if let Some(last) = plan.entries.last() {
            progress.global(global.advance(1.0), last.kind, &last.source);
        }
        info!("Saved anonymized files to {}", plan.output_root.display());

        Ok(BatchSummary {
            output_root: plan.output_root,
            outcomes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    fn names(found: &[(PathBuf, MediaKind)], root: &Path) -> Vec<String> {
        found
            .iter()
            .map(|(p, _)| p.strip_prefix(root).unwrap().display().to_string())
            .collect()
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_media_is_discovered() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("album");
        touch(&root.join("plain.png"));
        touch(&dir.path().join("real.png"));
        std::os::unix::fs::symlink(dir.path().join("real.png"), root.join("linked.png")).unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.png"), root.join("dangling.png")).unwrap();

        let found = discover_media(&root).unwrap();
        assert_eq!(names(&found, &root), vec!["linked.png", "plain.png"]);
    }

    #[test]
    fn containers_sharing_a_stem_are_reported() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("clips");
        for name in ["a.avi", "a.mov", "a.mp4", "b.mov", "a.png"] {
            touch(&root.join(name));
        }

        let params = crate::ProcessingParameters::default();
        let oracle = |_: &image::RgbImage, _: f32| -> anyhow::Result<Vec<crate::RelativeBox>> {
            Ok(Vec::new())
        };
        let codec = crate::FfmpegCodec::default();
        let plan = BatchCoordinator::new(JobContext::new(&oracle, &codec, &params))
            .plan(&root)
            .unwrap();

        assert_eq!(plan.entries.len(), 5);
        assert_eq!(plan.shared_destinations(), vec![plan.output_root.join("a.mp4")]);
    }
}
