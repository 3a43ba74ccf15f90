//! Determining whether a compiled shader is out of date with respect to its
//! sources.

use crate::include::{self, IncludeError};
use std::{
    fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};
use thiserror::Error;

/// Outcome of comparing a compiled output against the files it was compiled
/// from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Staleness {
    /// Whether the output is missing or out of date.
    pub needs_compilation: bool,
    /// The dependencies that were modified no earlier than the output. Empty
    /// when the output does not exist yet.
    pub updated: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum StalenessError {
    #[error("Failed to determine dependencies")]
    Dependencies(#[from] IncludeError),

    #[error("Failed to read modification time of {}", .path.display())]
    ReadingModificationTime { path: PathBuf, source: io::Error },
}

pub type Result<T> = std::result::Result<T, StalenessError>;

impl Staleness {
    fn missing_output() -> Self {
        Self {
            needs_compilation: true,
            updated: Vec::new(),
        }
    }

    /// Whether the output has never been compiled.
    pub fn is_missing_output(&self) -> bool {
        self.needs_compilation && self.updated.is_empty()
    }
}

/// Checks whether the compiled `output` for the shader `source` must be
/// (re)generated. Both paths are relative to `shader_dir`.
///
/// A dependency counts as updated when its modification time is later than
/// *or equal to* that of the output. Equal timestamps are ambiguous at coarse
/// filesystem time resolution, so they are resolved in favor of recompiling.
///
/// # Errors
/// Returns an error if the dependencies of `source` can not be collected or
/// if the modification time of any involved file can not be read.
pub fn evaluate(shader_dir: &Path, source: &Path, output: &Path) -> Result<Staleness> {
    let output_path = shader_dir.join(output);

    let output_modified = match fs::metadata(&output_path) {
        Ok(metadata) => modification_time(&output_path, &metadata)?,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            log::debug!("{} does not exist", output_path.display());
            return Ok(Staleness::missing_output());
        }
        Err(source) => {
            return Err(StalenessError::ReadingModificationTime {
                path: output_path,
                source,
            });
        }
    };

    let dependencies = include::collect_dependencies(shader_dir, source)?;

    let mut updated = Vec::new();
    for dependency in dependencies {
        let metadata =
            fs::metadata(&dependency).map_err(|source| StalenessError::ReadingModificationTime {
                path: dependency.clone(),
                source,
            })?;
        if output_modified <= modification_time(&dependency, &metadata)? {
            log::trace!(
                "{} is not older than {}",
                output_path.display(),
                dependency.display()
            );
            updated.push(dependency);
        }
    }

    Ok(Staleness {
        needs_compilation: !updated.is_empty(),
        updated,
    })
}

fn modification_time(path: &Path, metadata: &fs::Metadata) -> Result<SystemTime> {
    metadata
        .modified()
        .map_err(|source| StalenessError::ReadingModificationTime {
            path: path.to_path_buf(),
            source,
        })
}
