//! Invocation of the external shader compiler.

use serde::{Deserialize, Serialize};
use std::{
    ffi::OsString,
    fmt, io,
    path::{Path, PathBuf},
    process::Command,
};
use thiserror::Error;

/// Something that can compile a shader source into a SPIR-V output.
pub trait ShaderCompiler {
    /// Compiles `source` into `output`, both given relative to `shader_dir`,
    /// blocking until compilation has finished.
    ///
    /// # Errors
    /// Returns an error only if the compiler could not be run at all. A
    /// compiler that runs and fails is reported through the returned
    /// [`CompileStatus`].
    fn compile(
        &mut self,
        shader_dir: &Path,
        source: &Path,
        output: &Path,
    ) -> Result<CompileStatus>;
}

/// Configuration parameters for [`GlslangValidator`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// The compiler executable, either a path or a name to look up in `PATH`.
    pub executable: PathBuf,
    /// Target client API environment, passed as the first `--target-env`.
    pub target_api: String,
    /// Target SPIR-V version, passed as the second `--target-env`.
    pub target_ir: String,
    /// Whether to emit debug information (`-g`) instead of compiling quietly.
    pub debug_info: bool,
}

/// Exit status of a compiler run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompileStatus {
    /// The exit code, or [`None`] if the process was terminated by a signal.
    pub exit_code: Option<i32>,
}

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Failed to launch shader compiler {}", .executable.display())]
    Launching {
        executable: PathBuf,
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CompileError>;

/// Compiles shaders by running `glslangValidator` (or a compatible
/// executable) as a child process.
#[derive(Clone, Debug, Default)]
pub struct GlslangValidator {
    config: CompilerConfig,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            executable: PathBuf::from("glslangValidator"),
            target_api: "vulkan1.3".to_string(),
            target_ir: "spirv1.6".to_string(),
            debug_info: false,
        }
    }
}

impl CompileStatus {
    pub const SUCCESS: Self = Self { exit_code: Some(0) };

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl fmt::Display for CompileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_code {
            Some(code) => write!(f, "exit code {code}"),
            None => write!(f, "terminated by signal"),
        }
    }
}

impl GlslangValidator {
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// The arguments passed to the compiler for compiling `source` into
    /// `output`.
    pub fn arguments(&self, source: &Path, output: &Path) -> Vec<OsString> {
        let verbosity = if self.config.debug_info {
            "-g"
        } else {
            "--quiet"
        };
        vec![
            verbosity.into(),
            "-V".into(),
            "--target-env".into(),
            self.config.target_api.as_str().into(),
            "--target-env".into(),
            self.config.target_ir.as_str().into(),
            source.into(),
            "-o".into(),
            output.into(),
        ]
    }
}

impl ShaderCompiler for GlslangValidator {
    fn compile(
        &mut self,
        shader_dir: &Path,
        source: &Path,
        output: &Path,
    ) -> Result<CompileStatus> {
        let launch_error = |source| CompileError::Launching {
            executable: self.config.executable.clone(),
            source,
        };

        let executable = resolve_executable(&self.config.executable).map_err(launch_error)?;

        let mut command = Command::new(executable);
        command
            .current_dir(shader_dir)
            .args(self.arguments(source, output));

        log::debug!("Running {command:?}");

        let status = command.status().map_err(launch_error)?;

        Ok(CompileStatus {
            exit_code: status.code(),
        })
    }
}

/// Makes an executable given as a relative path absolute with respect to the
/// current directory, so that it still resolves after the child process
/// switches to the shader directory. Bare names are left for `PATH` lookup.
fn resolve_executable(executable: &Path) -> io::Result<PathBuf> {
    if executable.components().count() > 1 && executable.is_relative() {
        std::path::absolute(executable)
    } else {
        Ok(executable.to_path_buf())
    }
}
