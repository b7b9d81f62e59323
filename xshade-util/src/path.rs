
//////
//
// Imports
//

// Standard library
use std::path::*;

// Normalize-path library
use normalize_path::NormalizePath;



//////
//
// Functions
//

/// Normalizes the given path, i.e. resolves/collapses any and all `..` and `.` contained within.
pub fn normalize<PathRef: AsRef<Path>> (path: PathRef) -> PathBuf {
	path.as_ref().normalize()
}

/// Normalizes (i.e. returns an absolute path) the given *path* relative to the given *anchor*, **iff** *path* is
/// relative. If it is not, it will just be returned verbatim.
pub fn normalizeToAnchor<PathRef1: AsRef<Path>, PathRef2: AsRef<Path>> (anchor: PathRef1, path: PathRef2) -> PathBuf
{
	if path.as_ref().is_relative() {
		anchor.as_ref().join(path).normalize()
	}
	else {
		path.as_ref().into()
	}
}

/// Bring the identity of an included file into canonical form, such that `"./common/../a.h"`, `"a.h"` and
/// `".\\a.h"` all denote the same include.
///
/// # Arguments
///
/// * `identity` – The identity string as it appeared inside the quotes of an `#include` directive.
///
/// # Returns
///
/// The canonical identity, using forward slashes as separators.
pub fn normalizeIdentity (identity: &str) -> String
{
	let unified = identity.replace('\\', "/");
	let absolute = unified.starts_with('/');
	let mut components: Vec<&str> = Vec::new();
	for component in unified.split('/')
	{
		match component {
			"" | "." => continue,
			".." => {
				// Only collapse if there is something to collapse into, otherwise keep the reference to the parent
				if components.last().is_some_and(|&last| last != "..") {
					components.pop();
				}
				else if !absolute {
					components.push("..");
				}
			},
			other => components.push(other)
		}
	}
	let joined = components.join("/");
	if absolute { format!("/{joined}") } else { joined }
}

/// Map an include identity to a path below `root`, refusing identities that are absolute or would escape `root`.
///
/// # Returns
///
/// The contained path, or [`None`] if the identity cannot be placed inside `root`.
pub fn containedPath (root: impl AsRef<Path>, identity: &str) -> Option<PathBuf>
{
	let normalized = normalizeIdentity(identity);
	if normalized.is_empty() || normalized.starts_with('/') || normalized.starts_with("..")
		|| normalized.contains(':')
	{
		return None;
	}
	Some(root.as_ref().join(normalized))
}
