//! Incremental compilation of all shaders in a directory.

use crate::{
    compiler::{CompileError, CompileStatus, CompilerConfig, ShaderCompiler},
    stage::ShaderStage,
    staleness::{self, Staleness, StalenessError},
};
use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Configuration parameters for a build.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directory containing the shader sources. Compiled outputs are written
    /// next to them, and include paths are resolved relative to it.
    pub shader_dir: PathBuf,
    /// Suffix appended to the source file name to obtain the output file name.
    pub output_suffix: String,
    /// What to do when a shader can not be evaluated or compiled.
    pub on_error: ErrorPolicy,
    pub compiler: CompilerConfig,
}

/// How a build reacts to a shader whose dependencies can not be resolved or
/// whose compiler can not be launched.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorPolicy {
    /// Stop the whole build at the first error.
    #[default]
    Abort,
    /// Report the error and continue with the remaining shaders.
    Skip,
}

/// A shader source together with the output it compiles to, both relative
/// to the shader directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShaderJob {
    pub stage: ShaderStage,
    pub source: PathBuf,
    pub output: PathBuf,
}

/// The staleness of a shader as determined without compiling anything.
#[derive(Debug)]
pub struct PlannedJob {
    pub job: ShaderJob,
    pub staleness: Result<Staleness, StalenessError>,
}

/// What happened to each shader during a build. Paths are source paths
/// relative to the shader directory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Shaders for which the compiler was run, whether or not it succeeded.
    pub compiled: Vec<PathBuf>,
    /// Shaders whose output was already up to date.
    pub up_to_date: Vec<PathBuf>,
    /// Shaders for which the compiler ran but reported failure.
    pub failed: Vec<(PathBuf, CompileStatus)>,
    /// Shaders that were skipped because of an error.
    pub skipped: Vec<PathBuf>,
}

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Failed to list shader directory {}", .path.display())]
    ReadingShaderDir { path: PathBuf, source: io::Error },

    #[error("Failed to determine whether {} needs compilation", .source_path.display())]
    Evaluating {
        source_path: PathBuf,
        source: StalenessError,
    },

    #[error("Failed to compile {}", .source_path.display())]
    Compiling {
        source_path: PathBuf,
        source: CompileError,
    },
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;

/// Receives progress notifications from a [`Driver`].
pub trait Reporter {
    /// The shader with the given output is about to be compiled. `updated`
    /// holds the dependencies that changed since the output was produced, and
    /// is empty if there was no output.
    fn compiling(&mut self, output: &Path, updated: &[PathBuf]);

    /// The shader with the given output is up to date.
    fn ready(&mut self, output: &Path);

    /// The given shader source was skipped because of the given error.
    fn skipped(&mut self, source: &Path, error: &BuildError);

    /// All shaders have been processed.
    fn finished(&mut self, summary: &BuildSummary);
}

/// [`Reporter`] printing human-readable status lines to standard output.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsoleReporter;

/// Compiles every stale shader in a directory using a [`ShaderCompiler`].
#[derive(Debug)]
pub struct Driver<C> {
    config: BuildConfig,
    compiler: C,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            shader_dir: PathBuf::from("."),
            output_suffix: ".spv".to_string(),
            on_error: ErrorPolicy::default(),
            compiler: CompilerConfig::default(),
        }
    }
}

impl ShaderJob {
    /// Creates a job for the given source if it has a recognized shader stage
    /// extension.
    pub fn for_source(source: PathBuf, output_suffix: &str) -> Option<Self> {
        let stage = ShaderStage::from_path(&source)?;
        let mut output = OsString::from(source.as_os_str());
        output.push(output_suffix);
        Some(Self {
            stage,
            source,
            output: PathBuf::from(output),
        })
    }
}

impl BuildSummary {
    pub fn n_processed(&self) -> usize {
        self.compiled.len() + self.up_to_date.len() + self.skipped.len()
    }

    /// Whether no shader was skipped because of an error. Shaders for which
    /// the compiler ran but failed do not count against completeness.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty()
    }
}

impl<C: ShaderCompiler> Driver<C> {
    pub fn new(config: BuildConfig, compiler: C) -> Self {
        Self { config, compiler }
    }

    pub fn compiler(&self) -> &C {
        &self.compiler
    }

    /// Finds all shader sources directly inside the shader directory,
    /// ordered by file name.
    ///
    /// # Errors
    /// Returns an error if the shader directory can not be listed.
    pub fn find_jobs(&self) -> Result<Vec<ShaderJob>> {
        let shader_dir = &self.config.shader_dir;
        let list_error = |source| BuildError::ReadingShaderDir {
            path: shader_dir.clone(),
            source,
        };

        let mut jobs = Vec::new();
        for entry in fs::read_dir(shader_dir).map_err(list_error)? {
            let entry = entry.map_err(list_error)?;
            if !entry.path().is_file() {
                continue;
            }
            let source = PathBuf::from(entry.file_name());
            if let Some(job) = ShaderJob::for_source(source, &self.config.output_suffix) {
                jobs.push(job);
            }
        }
        jobs.sort_by(|a, b| a.source.cmp(&b.source));

        log::debug!(
            "Found {} shader source(s) in {}",
            jobs.len(),
            shader_dir.display()
        );

        Ok(jobs)
    }

    /// Determines the staleness of every shader without compiling anything.
    ///
    /// # Errors
    /// Returns an error if the shader directory can not be listed. Errors
    /// for individual shaders are stored in the returned jobs.
    pub fn plan(&self) -> Result<Vec<PlannedJob>> {
        Ok(self
            .find_jobs()?
            .into_iter()
            .map(|job| {
                let staleness =
                    staleness::evaluate(&self.config.shader_dir, &job.source, &job.output);
                PlannedJob { job, staleness }
            })
            .collect())
    }

    /// Compiles every shader whose output is missing or out of date,
    /// notifying the given reporter of progress.
    ///
    /// A compiler that runs but fails does not stop the build; the failure is
    /// logged and recorded in the summary.
    ///
    /// # Errors
    /// Returns an error if the shader directory can not be listed, or, with
    /// [`ErrorPolicy::Abort`], at the first shader whose staleness can not be
    /// determined or whose compiler can not be launched.
    pub fn run(&mut self, reporter: &mut impl Reporter) -> Result<BuildSummary> {
        let mut summary = BuildSummary::default();

        for job in self.find_jobs()? {
            if let Err(error) = self.process(&job, reporter, &mut summary) {
                match self.config.on_error {
                    ErrorPolicy::Abort => return Err(error),
                    ErrorPolicy::Skip => {
                        log::error!("Skipping {}: {error}", job.source.display());
                        reporter.skipped(&job.source, &error);
                        summary.skipped.push(job.source);
                    }
                }
            }
        }

        log::info!(
            "Processed {} shader(s): {} compiled, {} up to date, {} failed, {} skipped",
            summary.n_processed(),
            summary.compiled.len(),
            summary.up_to_date.len(),
            summary.failed.len(),
            summary.skipped.len()
        );

        reporter.finished(&summary);

        Ok(summary)
    }

    fn process(
        &mut self,
        job: &ShaderJob,
        reporter: &mut impl Reporter,
        summary: &mut BuildSummary,
    ) -> Result<()> {
        let shader_dir = &self.config.shader_dir;

        let staleness = staleness::evaluate(shader_dir, &job.source, &job.output)
            .map_err(|source| BuildError::Evaluating {
                source_path: job.source.clone(),
                source,
            })?;

        if !staleness.needs_compilation {
            reporter.ready(&job.output);
            summary.up_to_date.push(job.source.clone());
            return Ok(());
        }

        reporter.compiling(&job.output, &staleness.updated);

        let status = self
            .compiler
            .compile(shader_dir, &job.source, &job.output)
            .map_err(|source| BuildError::Compiling {
                source_path: job.source.clone(),
                source,
            })?;

        if !status.success() {
            log::warn!("Compiler failed on {} ({status})", job.source.display());
            summary.failed.push((job.source.clone(), status));
        }
        summary.compiled.push(job.source.clone());

        Ok(())
    }
}

impl Reporter for ConsoleReporter {
    fn compiling(&mut self, output: &Path, updated: &[PathBuf]) {
        println!("{}", compiling_message(output, updated));
    }

    fn ready(&mut self, output: &Path) {
        println!("{}", ready_message(output));
    }

    fn skipped(&mut self, source: &Path, error: &BuildError) {
        eprintln!(" Skipped:\t {} ({error})", display_name(source));
    }

    fn finished(&mut self, _summary: &BuildSummary) {
        println!("\nSPVs compilation finished.");
    }
}

/// Status line for a shader that is about to be compiled, followed by a line
/// listing the file names of the updated dependencies, each in single quotes,
/// if there are any.
pub fn compiling_message(output: &Path, updated: &[PathBuf]) -> String {
    let mut message = format!(" Compiling:\t {}", display_name(output));
    if !updated.is_empty() {
        let names: Vec<_> = updated
            .iter()
            .map(|path| format!("'{}'", display_name(path)))
            .collect();
        message.push_str(&format!("\n   updated:\t [{}]", names.join(", ")));
    }
    message
}

/// Status line for a shader whose output is up to date.
pub fn ready_message(output: &Path) -> String {
    format!(" Ready:\t\t {}", display_name(output))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}
