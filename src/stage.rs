//! Shader stages recognized by their file extension.

use std::path::Path;

/// A shader stage, identified by the extension of a GLSL source file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShaderStage {
    Vertex,
    TessellationControl,
    TessellationEvaluation,
    Geometry,
    Fragment,
    Compute,
    RayGeneration,
    RayMiss,
    RayClosestHit,
    RayAnyHit,
}

impl ShaderStage {
    pub const ALL: [Self; 10] = [
        Self::Vertex,
        Self::TessellationControl,
        Self::TessellationEvaluation,
        Self::Geometry,
        Self::Fragment,
        Self::Compute,
        Self::RayGeneration,
        Self::RayMiss,
        Self::RayClosestHit,
        Self::RayAnyHit,
    ];

    /// The file extension (without the leading dot) used for sources of this
    /// stage.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Vertex => "vert",
            Self::TessellationControl => "tesc",
            Self::TessellationEvaluation => "tese",
            Self::Geometry => "geom",
            Self::Fragment => "frag",
            Self::Compute => "comp",
            Self::RayGeneration => "rgen",
            Self::RayMiss => "rmiss",
            Self::RayClosestHit => "rchit",
            Self::RayAnyHit => "rahit",
        }
    }

    /// Determines the stage of the shader source at the given path from its
    /// final extension. Returns [`None`] if the extension is missing or not
    /// one of the recognized stage extensions, which is the case for shared
    /// include files like `common.glsl` and for compiled outputs.
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        let extension = path.as_ref().extension()?.to_str()?;
        Self::ALL
            .into_iter()
            .find(|stage| stage.extension() == extension)
    }
}
