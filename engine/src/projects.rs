//! Grouping mappings into named projects.
//!
//! A project name is derived purely from a mapping's source and target
//! paths; the mapping list therefore partitions into projects on every
//! configuration load. Only each project's enabled flag survives a reload,
//! carried over by name.

use std::collections::BTreeSet;
use std::path::{Component, Path};

use indexmap::IndexMap;
use tracing::debug;

use mirrorsync_config::{Mapping, ProjectFlag, ProjectFlags};

/// Bucket for mappings whose paths yield no usable project name.
pub const UNCLASSIFIED: &str = "unclassified";

/// A derived grouping of mappings, independently enabled or disabled.
#[derive(Debug, Clone)]
pub struct Project {
    /// Derived project name.
    pub name: String,

    /// Indices into the mapping list, in mapping order.
    pub mapping_indices: Vec<usize>,

    /// Whether this project's mappings are watched.
    pub enabled: bool,
}

/// Insertion-ordered map of project name to project.
pub type ProjectMap = IndexMap<String, Project>;

/// Assign every mapping to exactly one project.
///
/// The enabled flag is carried over from `previous` when the derived name
/// matches; never-seen projects default to enabled.
pub fn identify(mappings: &[Mapping], previous: &ProjectFlags) -> ProjectMap {
    let mut projects = ProjectMap::new();

    for (index, mapping) in mappings.iter().enumerate() {
        let name = derive_project_name(&mapping.source_file, &mapping.target_dir)
            .unwrap_or_else(|| UNCLASSIFIED.to_string());

        let project = projects.entry(name.clone()).or_insert_with(|| Project {
            enabled: previous.get(&name).map(|flag| flag.enabled).unwrap_or(true),
            name,
            mapping_indices: Vec::new(),
        });
        project.mapping_indices.push(index);
    }

    debug!(projects = projects.len(), mappings = mappings.len(), "projects identified");
    projects
}

/// The persisted view of a project map: name to enabled flag.
pub fn flags_of(projects: &ProjectMap) -> ProjectFlags {
    projects
        .values()
        .map(|p| (p.name.clone(), ProjectFlag { enabled: p.enabled }))
        .collect()
}

/// Indices of all mappings belonging to enabled projects, in mapping order.
pub fn enabled_indices(projects: &ProjectMap) -> BTreeSet<usize> {
    projects
        .values()
        .filter(|p| p.enabled)
        .flat_map(|p| p.mapping_indices.iter().copied())
        .collect()
}

/// Derive a project name from a mapping's two paths.
///
/// Walks the longest common segment prefix of source and target; among
/// those segments, scanning from the deepest, the first that contains a
/// digit or is longer than ten characters wins, falling back to the deepest
/// common segment. Without a common prefix the same scan runs over the
/// source path alone, and finally the source file's parent directory name.
/// Returns `None` when nothing usable remains.
pub fn derive_project_name(source_file: &Path, target_dir: &Path) -> Option<String> {
    let source_segments = segments(source_file);
    let target_segments = segments(target_dir);

    let common: Vec<&String> = source_segments
        .iter()
        .zip(target_segments.iter())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a)
        .collect();

    if !common.is_empty() {
        if let Some(seg) = common.iter().rev().find(|seg| looks_like_project(seg)) {
            return Some((*seg).clone());
        }
        return common.last().map(|seg| (*seg).clone());
    }

    if let Some(seg) = source_segments.iter().rev().find(|seg| looks_like_project(seg)) {
        return Some(seg.clone());
    }

    source_file
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}

/// Normal path segments only; root and drive prefixes do not participate.
fn segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(seg) => Some(seg.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// The "looks like a project folder" heuristic: contains a digit, or is
/// longer than ten characters.
fn looks_like_project(segment: &str) -> bool {
    segment.chars().any(|c| c.is_ascii_digit()) || segment.chars().count() > 10
}
