//! Collection of the files a shader source depends on through `#include`
//! directives.

use std::{
    collections::{BTreeSet, btree_set},
    fs, io,
    path::{Component, Path, PathBuf},
};
use thiserror::Error;

/// The token a line must start with to be treated as an include directive.
/// The included path follows, terminated by the next double quote.
pub const INCLUDE_MARKER: &str = "#include \"";

/// The set of files a shader source depends on, including the source itself.
///
/// Paths are unique; iteration yields them in lexicographic order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencySet {
    paths: BTreeSet<PathBuf>,
}

#[derive(Error, Debug)]
pub enum IncludeError {
    #[error("Failed to read shader source {}", .path.display())]
    ReadingSource { path: PathBuf, source: io::Error },

    #[error(
        "Unterminated include directive on line {line_number} of {}: {line}",
        .path.display()
    )]
    MalformedDirective {
        path: PathBuf,
        line_number: usize,
        line: String,
    },

    #[error("Cyclic include chain: {}", display_chain(.chain))]
    Cycle { chain: Vec<PathBuf> },
}

pub type Result<T> = std::result::Result<T, IncludeError>;

impl DependencySet {
    /// Creates a set containing only the given root source.
    pub fn with_root(root_source: PathBuf) -> Self {
        let mut paths = BTreeSet::new();
        paths.insert(root_source);
        Self { paths }
    }

    /// The number of files in the set, the root source included.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the set is empty, which is never the case for a set obtained
    /// from [`collect_dependencies`].
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Adds the given path, returning `false` if it was already present.
    pub fn insert(&mut self, path: PathBuf) -> bool {
        self.paths.insert(path)
    }

    /// Iterates over the paths in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.paths.iter().map(PathBuf::as_path)
    }
}

impl IntoIterator for DependencySet {
    type Item = PathBuf;
    type IntoIter = btree_set::IntoIter<PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.into_iter()
    }
}

impl<'a> IntoIterator for &'a DependencySet {
    type Item = &'a PathBuf;
    type IntoIter = btree_set::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}

/// Collects the transitive set of files included by the shader source at
/// `root_source`, together with the root source itself.
///
/// Both `root_source` and every included path are resolved relative to
/// `shader_dir`, not relative to the including file. Included files are
/// scanned depth-first, and a file already in the set is never scanned
/// twice.
///
/// # Errors
/// Returns an error if any of the files can not be read, if an include
/// directive lacks its closing quote, or if a file (transitively) includes a
/// file that is still being scanned further up the include chain.
pub fn collect_dependencies(
    shader_dir: &Path,
    root_source: impl AsRef<Path>,
) -> Result<DependencySet> {
    let root_source = shader_dir.join(normalize_include_path(root_source.as_ref()));

    let mut dependencies = DependencySet::with_root(root_source.clone());
    let mut include_chain = vec![root_source.clone()];

    scan_includes(
        shader_dir,
        &root_source,
        &mut dependencies,
        &mut include_chain,
    )?;

    log::debug!(
        "{} depends on {} file(s)",
        root_source.display(),
        dependencies.len()
    );

    Ok(dependencies)
}

fn scan_includes(
    shader_dir: &Path,
    source_path: &Path,
    dependencies: &mut DependencySet,
    include_chain: &mut Vec<PathBuf>,
) -> Result<()> {
    log::trace!("Scanning {} for includes", source_path.display());

    let text = fs::read_to_string(source_path).map_err(|source| IncludeError::ReadingSource {
        path: source_path.to_path_buf(),
        source,
    })?;

    for (line_idx, line) in text.lines().enumerate() {
        let included = match parse_include_directive(line) {
            Ok(Some(included)) => included,
            Ok(None) => continue,
            Err(UnterminatedDirective) => {
                return Err(IncludeError::MalformedDirective {
                    path: source_path.to_path_buf(),
                    line_number: line_idx + 1,
                    line: line.to_string(),
                });
            }
        };

        let dependency = shader_dir.join(normalize_include_path(Path::new(included)));

        if let Some(cycle_start) = include_chain.iter().position(|path| path == &dependency) {
            let mut chain = include_chain[cycle_start..].to_vec();
            chain.push(dependency);
            return Err(IncludeError::Cycle { chain });
        }

        if dependencies.insert(dependency.clone()) {
            include_chain.push(dependency.clone());
            scan_includes(shader_dir, &dependency, dependencies, include_chain)?;
            include_chain.pop();
        }
    }

    Ok(())
}

#[derive(Debug)]
struct UnterminatedDirective;

/// Extracts the included path from the given line if the line is an include
/// directive.
fn parse_include_directive(
    line: &str,
) -> std::result::Result<Option<&str>, UnterminatedDirective> {
    let Some(rest) = line.strip_prefix(INCLUDE_MARKER) else {
        return Ok(None);
    };
    match rest.split_once('"') {
        Some((included, _)) if !included.is_empty() => Ok(Some(included)),
        _ => Err(UnterminatedDirective),
    }
}

/// Drops `.` components so that `./common.glsl` and `common.glsl` refer to
/// the same dependency.
fn normalize_include_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|component| !matches!(component, Component::CurDir))
        .collect()
}

fn display_chain(chain: &[PathBuf]) -> String {
    chain
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn write_files(files: &[(&str, &str)]) -> TempDir {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            let path = dir.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        dir
    }

    fn names(dir: &Path, dependencies: &DependencySet) -> Vec<String> {
        dependencies
            .iter()
            .map(|path| {
                path.strip_prefix(dir)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn should_parse_include_directive() {
        assert_eq!(
            parse_include_directive("#include \"common.glsl\"").unwrap(),
            Some("common.glsl")
        );
        assert_eq!(
            parse_include_directive("#include \"data_scene.h\" // scene layout").unwrap(),
            Some("data_scene.h")
        );
    }

    #[test]
    fn should_ignore_lines_without_exact_marker_prefix() {
        for line in [
            "",
            "void main() {}",
            "  #include \"indented.glsl\"",
            "// #include \"commented.glsl\"",
            "#include <angled.glsl>",
            "#include\"no_space.glsl\"",
            "#extension GL_GOOGLE_include_directive : require",
        ] {
            assert_eq!(parse_include_directive(line).unwrap(), None, "{line}");
        }
    }

    #[test]
    fn should_reject_unterminated_or_empty_include() {
        assert!(parse_include_directive("#include \"common.glsl").is_err());
        assert!(parse_include_directive("#include \"\"").is_err());
    }

    #[test]
    fn should_collect_only_root_for_source_without_includes() {
        let dir = write_files(&[("a.frag", "void main() {}\n")]);
        let dependencies = collect_dependencies(dir.path(), "a.frag").unwrap();
        assert_eq!(names(dir.path(), &dependencies), ["a.frag"]);
    }

    #[test]
    fn should_collect_transitive_includes() {
        let dir = write_files(&[
            ("s.frag", "#include \"d.glsl\"\nvoid main() {}\n"),
            ("d.glsl", "#include \"e.glsl\"\n"),
            ("e.glsl", "const float PI = 3.14159;\n"),
        ]);
        let dependencies = collect_dependencies(dir.path(), "s.frag").unwrap();
        assert_eq!(
            names(dir.path(), &dependencies),
            ["d.glsl", "e.glsl", "s.frag"]
        );
    }

    #[test]
    fn should_collect_shared_include_once() {
        let dir = write_files(&[
            ("s.comp", "#include \"a.glsl\"\n#include \"b.glsl\"\n"),
            ("a.glsl", "#include \"common.glsl\"\n"),
            ("b.glsl", "#include \"common.glsl\"\n#include \"./common.glsl\"\n"),
            ("common.glsl", ""),
        ]);
        let dependencies = collect_dependencies(dir.path(), "s.comp").unwrap();
        assert_eq!(
            names(dir.path(), &dependencies),
            ["a.glsl", "b.glsl", "common.glsl", "s.comp"]
        );
    }

    #[test]
    fn should_resolve_includes_relative_to_shader_dir() {
        let dir = write_files(&[
            ("s.vert", "#include \"include/a.glsl\"\n"),
            ("include/a.glsl", "#include \"include/b.glsl\"\n"),
            ("include/b.glsl", ""),
        ]);
        let dependencies = collect_dependencies(dir.path(), "s.vert").unwrap();
        assert_eq!(
            names(dir.path(), &dependencies),
            ["include/a.glsl", "include/b.glsl", "s.vert"]
        );
    }

    #[test]
    fn should_fail_on_missing_include() {
        let dir = write_files(&[("s.frag", "#include \"missing.glsl\"\n")]);
        let error = collect_dependencies(dir.path(), "s.frag").unwrap_err();
        match error {
            IncludeError::ReadingSource { path, source } => {
                assert_eq!(path, dir.path().join("missing.glsl"));
                assert_eq!(source.kind(), io::ErrorKind::NotFound);
            }
            other => panic!("Unexpected error: {other}"),
        }
    }

    #[test]
    fn should_fail_on_missing_root() {
        let dir = write_files(&[]);
        assert!(matches!(
            collect_dependencies(dir.path(), "s.frag"),
            Err(IncludeError::ReadingSource { .. })
        ));
    }

    #[test]
    fn should_report_line_of_malformed_directive() {
        let dir = write_files(&[("s.frag", "#version 460\n#include \"common.glsl\n")]);
        match collect_dependencies(dir.path(), "s.frag").unwrap_err() {
            IncludeError::MalformedDirective { line_number, .. } => assert_eq!(line_number, 2),
            other => panic!("Unexpected error: {other}"),
        }
    }

    #[test]
    fn should_detect_self_inclusion() {
        let dir = write_files(&[("s.frag", "#include \"s.frag\"\n")]);
        match collect_dependencies(dir.path(), "s.frag").unwrap_err() {
            IncludeError::Cycle { chain } => {
                assert_eq!(chain, [dir.path().join("s.frag"), dir.path().join("s.frag")]);
            }
            other => panic!("Unexpected error: {other}"),
        }
    }

    #[test]
    fn should_detect_indirect_cycle() {
        let dir = write_files(&[
            ("s.frag", "#include \"a.glsl\"\n"),
            ("a.glsl", "#include \"b.glsl\"\n"),
            ("b.glsl", "#include \"a.glsl\"\n"),
        ]);
        match collect_dependencies(dir.path(), "s.frag").unwrap_err() {
            IncludeError::Cycle { chain } => {
                assert_eq!(
                    chain,
                    [
                        dir.path().join("a.glsl"),
                        dir.path().join("b.glsl"),
                        dir.path().join("a.glsl"),
                    ]
                );
            }
            other => panic!("Unexpected error: {other}"),
        }
    }

    proptest! {
        #[test]
        fn should_never_find_includes_in_lines_without_marker(line in "[^#]*") {
            prop_assert_eq!(parse_include_directive(&line).unwrap(), None);
        }

        #[test]
        fn should_extract_any_quote_free_include_path(path in "[a-zA-Z0-9_./]{1,32}") {
            let line = format!("{INCLUDE_MARKER}{path}\"");
            prop_assert_eq!(parse_include_directive(&line).unwrap(), Some(path.as_str()));
        }
    }
}
