//! The keyframe collection the embedding table was built from.

use crate::error::{Result, SearchError};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Narrow view of the item collection used by the ranking engine.
pub trait CollectionIndex: Send + Sync {
    /// Encoded image bytes of item `id`.
    fn resolve(&self, id: usize) -> Result<Vec<u8>>;

    /// Grouping key of item `id` (the source video).
    fn group_of(&self, id: usize) -> Result<String>;

    fn count(&self) -> usize;
}

/// Keyframes laid out as `<root>/<video>/<frame>.<ext>`.
///
/// Ids are assigned by walking videos, then frames, in file-name order, so
/// they match the row order of a feature table extracted the same way.
#[derive(Debug, Clone)]
pub struct FrameDirectory {
    root: PathBuf,
    frames: Vec<PathBuf>,
}

impl FrameDirectory {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_owned();
        if !root.is_dir() {
            return Err(SearchError::Config(format!(
                "image directory {} does not exist",
                root.display()
            )));
        }

        let mut frames = Vec::new();
        // symlinked videos and frames count like regular ones
        for entry in WalkDir::new(&root)
            .min_depth(1)
            .max_depth(2)
            .follow_links(true)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|e| SearchError::Io(e.into()))?;
            if entry.depth() == 2 && !entry.file_type().is_dir() {
                frames.push(entry.into_path());
            }
        }

        tracing::info!(root = %root.display(), frames = frames.len(), "indexed keyframes");
        Ok(Self { root, frames })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, id: usize) -> Result<&Path> {
        self.frames
            .get(id)
            .map(PathBuf::as_path)
            .ok_or(SearchError::IndexOutOfRange {
                id,
                count: self.frames.len(),
            })
    }
}

impl CollectionIndex for FrameDirectory {
    fn resolve(&self, id: usize) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.path(id)?)?)
    }

    fn group_of(&self, id: usize) -> Result<String> {
        let (video, _) = frame_info(self.path(id)?)?;
        Ok(video)
    }

    fn count(&self) -> usize {
        self.frames.len()
    }
}

/// Split a keyframe path into `(video, frame)`: the parent directory name and
/// the file stem. Submission to the judging server relies on this layout.
pub fn frame_info(path: &Path) -> Result<(String, String)> {
    let video = path
        .parent()
        .and_then(Path::file_name)
        .and_then(|n| n.to_str());
    let frame = path.file_stem().and_then(|n| n.to_str());
    match (video, frame) {
        (Some(video), Some(frame)) => Ok((video.to_string(), frame.to_string())),
        _ => Err(SearchError::Config(format!(
            "{} is not a <video>/<frame> path",
            path.display()
        ))),
    }
}
