//! Incremental compilation of GLSL shaders to SPIR-V.
//!
//! A shader is recompiled when its output is missing or when the output is
//! not newer than the shader source or any of the files it transitively
//! includes.

pub mod compiler;
pub mod driver;
pub mod include;
pub mod io;
pub mod stage;
pub mod staleness;

pub use compiler::{CompilerConfig, GlslangValidator, ShaderCompiler};
pub use driver::{BuildConfig, BuildSummary, ConsoleReporter, Driver, ErrorPolicy, Reporter};
