//! Utilities for input/output.

use anyhow::{Context, Result, bail};
use std::{fs, path::Path};

/// Reads the RON (Rusty Object Notation) file at the given path and
/// deserializes the contents into an object of type `T`.
pub fn parse_ron_file<T>(file_path: impl AsRef<Path>) -> Result<T>
where
    T: for<'de> serde::de::Deserialize<'de>,
{
    let file_path = file_path.as_ref();

    let text = fs::read_to_string(file_path)
        .with_context(|| format!("Could not open {}", file_path.display()))?;

    ron::from_str::<T>(&text)
        .map_err(anyhow::Error::from)
        .with_context(|| format!("Invalid syntax in {}", file_path.display()))
}

/// Serializes the given value of type `T` to RON (Rusty Object Notation)
/// and writes it to the given path, creating any missing parent directories.
pub fn write_ron_file<T>(value: &T, output_file_path: impl AsRef<Path>) -> Result<()>
where
    T: serde::ser::Serialize,
{
    let output_file_path = output_file_path.as_ref();

    let text = ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())?;

    if let Some(parent) = output_file_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_file_path, text)
        .with_context(|| format!("Could not write {}", output_file_path.display()))
}

/// Whether [`create_ron_file`] may replace an existing file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Overwrite {
    Allow,
    Refuse,
}

/// Like [`write_ron_file`], but fails without touching the file if it already
/// exists and `overwrite` is [`Overwrite::Refuse`].
pub fn create_ron_file<T>(
    value: &T,
    output_file_path: impl AsRef<Path>,
    overwrite: Overwrite,
) -> Result<()>
where
    T: serde::ser::Serialize,
{
    let output_file_path = output_file_path.as_ref();
    if overwrite == Overwrite::Refuse && output_file_path.exists() {
        bail!("File {} already exists", output_file_path.display());
    }
    write_ron_file(value, output_file_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{BuildConfig, ErrorPolicy};
    use std::path::PathBuf;

    #[test]
    fn should_parse_partial_build_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("spv_build.ron");
        fs::write(
            &config_path,
            r#"(
                shader_dir: "data/shaders",
                on_error: Skip,
                compiler: (target_api: "vulkan1.2"),
            )"#,
        )
        .unwrap();

        let config: BuildConfig = parse_ron_file(&config_path).unwrap();

        assert_eq!(config.shader_dir, PathBuf::from("data/shaders"));
        assert_eq!(config.on_error, ErrorPolicy::Skip);
        assert_eq!(config.output_suffix, ".spv");
        assert_eq!(config.compiler.target_api, "vulkan1.2");
        assert_eq!(config.compiler.target_ir, "spirv1.6");
    }

    #[test]
    fn should_read_back_written_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config/spv_build.ron");
        let config = BuildConfig {
            on_error: ErrorPolicy::Skip,
            ..Default::default()
        };

        write_ron_file(&config, &config_path).unwrap();

        assert_eq!(parse_ron_file::<BuildConfig>(&config_path).unwrap(), config);
    }

    #[test]
    fn should_refuse_to_overwrite_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("spv_build.ron");
        fs::write(&config_path, "// hand-edited").unwrap();

        let error =
            create_ron_file(&BuildConfig::default(), &config_path, Overwrite::Refuse).unwrap_err();

        assert!(error.to_string().contains("already exists"));
        assert_eq!(fs::read_to_string(&config_path).unwrap(), "// hand-edited");
    }

    #[test]
    fn should_overwrite_existing_file_when_allowed() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("spv_build.ron");
        fs::write(&config_path, "// hand-edited").unwrap();

        create_ron_file(&BuildConfig::default(), &config_path, Overwrite::Allow).unwrap();

        assert_eq!(
            parse_ron_file::<BuildConfig>(&config_path).unwrap(),
            BuildConfig::default()
        );
    }

    #[test]
    fn should_create_missing_file_when_refusing_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("spv_build.ron");

        create_ron_file(&BuildConfig::default(), &config_path, Overwrite::Refuse).unwrap();

        assert!(config_path.is_file());
    }

    #[test]
    fn should_name_file_with_invalid_syntax() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("broken.ron");
        fs::write(&config_path, "(shader_dir: ").unwrap();

        let error = parse_ron_file::<BuildConfig>(&config_path).unwrap_err();
        assert!(error.to_string().contains("broken.ron"));
    }

    #[test]
    fn should_fail_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(parse_ron_file::<BuildConfig>(dir.path().join("missing.ron")).is_err());
    }
}
