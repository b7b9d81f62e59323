
//! A lightweight `#include` dependency scanner.
//!
//! This is not a C preprocessor: it only discovers which files a shader source transitively pulls in via
//! `#include "..."` directives, skipping directives that are commented out. Conditional compilation is ignored, so the
//! discovered set may be a superset of what the compiler will actually read.



//////
//
// Imports
//

// Standard library
use std::{collections::{BTreeMap, BTreeSet}, error::Error, fmt::{Display, Formatter}, path::PathBuf};

// Tracing library
use tracing;

// Local imports
use crate::util;



//////
//
// Errors
//

/// A recoverable error encountered while walking the include graph.
#[derive(Debug,Clone,PartialEq,Eq)]
pub enum PreprocessError {
	/// The stream factory could not provide the named file.
	MissingInclude {
		identity: String,
		includedFrom: Option<String>
	}
}
impl Display for PreprocessError {
	fn fmt (&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
		let desc = match self {
			Self::MissingInclude { identity, includedFrom: Some(parent) } =>
				format!("cannot resolve `{identity}` included from `{parent}`"),
			Self::MissingInclude { identity, includedFrom: None } =>
				format!("cannot resolve `{identity}` included from the root source"),
		};
		write!(formatter, "PreprocessError[{desc}]")
	}
}
impl Error for PreprocessError {}



//////
//
// Traits
//

/// The capability of opening named shader source files. Implemented by whatever owns the files (a file system search
/// path, an asset archive, an in-memory table...).
pub trait SourceStreamFactory
{
	/// Fetch the complete contents of the file with the given identity.
	///
	/// # Returns
	///
	/// The bytes of the file, or [`None`] if no such file can be found.
	fn openStream (&self, identity: &str) -> Option<Vec<u8>>;
}



//////
//
// Structs
//

/// Resolves identities against a list of search directories, falling back to the identity as a path of its own.
#[derive(Debug,Clone,Default)]
pub struct FileSystemStreamFactory {
	searchPath: Vec<PathBuf>
}
impl FileSystemStreamFactory
{
	pub fn new (searchPath: Vec<PathBuf>) -> Self {
		Self { searchPath }
	}

	/// Create the factory with the shader search path of the given run environment.
	pub fn fromEnvironment (environment: &crate::runenv::Environment) -> Self {
		Self::new(environment.shaderPath.clone())
	}

	pub fn addSearchPath (&mut self, path: impl Into<PathBuf>) -> &mut Self {
		self.searchPath.push(path.into());
		self
	}

	pub fn searchPath (&self) -> &[PathBuf] {
		&self.searchPath
	}
}
impl SourceStreamFactory for FileSystemStreamFactory
{
	fn openStream (&self, identity: &str) -> Option<Vec<u8>>
	{
		let candidates = self.searchPath.iter()
			.map(|dir| util::path::normalizeToAnchor(dir, identity))
			.chain(std::iter::once(util::path::normalize(identity)));
		for candidate in candidates
		{
			match util::fs::readIfExists(&candidate) {
				Ok(Some(bytes)) => return Some(bytes),
				Ok(None) => continue,
				Err(err) => tracing::warn!("Could not read shader source `{}`: {err}", candidate.display())
			}
		}
		None
	}
}

/// Serves shader sources from an in-memory table.
#[derive(Debug,Clone,Default)]
pub struct MemoryStreamFactory {
	files: BTreeMap<String, Vec<u8>>
}
impl MemoryStreamFactory
{
	pub fn new () -> Self {
		Self::default()
	}

	/// Add a file, replacing any earlier file with the same (normalized) identity.
	pub fn addFile (&mut self, identity: &str, contents: impl Into<Vec<u8>>) -> &mut Self {
		self.files.insert(util::path::normalizeIdentity(identity), contents.into());
		self
	}

	/// Builder-style variant of [`addFile`](Self::addFile).
	pub fn withFile (mut self, identity: &str, contents: impl Into<Vec<u8>>) -> Self {
		self.addFile(identity, contents);
		self
	}
}
impl SourceStreamFactory for MemoryStreamFactory {
	fn openStream (&self, identity: &str) -> Option<Vec<u8>> {
		self.files.get(&util::path::normalizeIdentity(identity)).cloned()
	}
}


/// A single file discovered while walking the include graph.
#[derive(Debug,Clone,PartialEq,Eq)]
pub struct IncludeFile {
	/// The normalized identity of the file.
	pub identity: String,

	/// The full contents of the file.
	pub contents: Vec<u8>
}

/// The deduplicated set of files a source transitively includes, in discovery order.
#[derive(Debug,Clone,Default,PartialEq,Eq)]
pub struct IncludeSet {
	files: Vec<IncludeFile>
}
impl IncludeSet
{
	#[inline(always)]
	pub fn len (&self) -> usize {
		self.files.len()
	}

	#[inline(always)]
	pub fn is_empty (&self) -> bool {
		self.files.is_empty()
	}

	/// Check whether a file with the given identity is part of the set.
	pub fn contains (&self, identity: &str) -> bool {
		let identity = util::path::normalizeIdentity(identity);
		self.files.iter().any(|file| file.identity == identity)
	}

	/// Iterate over the files in discovery order.
	pub fn iter (&self) -> std::slice::Iter<'_, IncludeFile> {
		self.files.iter()
	}

	/// Report the identities in discovery order.
	pub fn identities (&self) -> Vec<&str> {
		self.files.iter().map(|file| file.identity.as_str()).collect()
	}

	/// Iterate over the files ordered by identity, independent of the order they were discovered in.
	pub fn sortedByIdentity (&self) -> Vec<&IncludeFile> {
		let mut sorted: Vec<&IncludeFile> = self.files.iter().collect();
		sorted.sort_by(|a, b| a.identity.cmp(&b.identity));
		sorted
	}

	/// Insert a file at the given discovery position, shifting every file discovered after it.
	fn insert (&mut self, position: usize, file: IncludeFile) {
		self.files.insert(position, file)
	}
}
impl<'a> IntoIterator for &'a IncludeSet {
	type Item = &'a IncludeFile;
	type IntoIter = std::slice::Iter<'a, IncludeFile>;

	fn into_iter (self) -> Self::IntoIter {
		self.files.iter()
	}
}

/// The outcome of walking the include graph of a source.
#[derive(Debug,Clone,Default)]
pub struct IncludeScan {
	/// Every file that could be resolved.
	pub includes: IncludeSet,

	/// One entry per include that could not be resolved. The walk stops descending at these, everything else is still
	/// gathered.
	pub missing: Vec<PreprocessError>
}



//////
//
// Functions
//

/// Skip horizontal whitespace starting at `pos`, returning the position of the first non-whitespace byte.
#[inline]
fn skipBlanks (source: &[u8], mut pos: usize) -> usize {
	while pos < source.len() && matches!(source[pos], b' ' | b'\t') {
		pos += 1;
	}
	pos
}

/// Extract the identities named by `#include "..."` directives in the given source text, in order of appearance.
///
/// Line (`//`) and block (`/* */`) comments are skipped, so directives inside them are not reported. An unterminated
/// block comment or include string ends the scan; whatever was found before it is still returned.
pub fn scanIncludeDirectives (source: &[u8]) -> Vec<String>
{
	const INCLUDE: &[u8] = b"include";

	let mut identities = Vec::new();
	let mut pos = 0;
	while pos < source.len()
	{
		match source[pos]
		{
			b'/' if source.get(pos+1) == Some(&b'/') => {
				pos = match source[pos+2..].iter().position(|&c| c == b'\n') {
					Some(offset) => pos+2 + offset+1,
					None => source.len()
				};
			},

			b'/' if source.get(pos+1) == Some(&b'*') => {
				match util::findBytes(source, b"*/", pos+2) {
					Some(end) => pos = end+2,
					None => break
				}
			},

			b'#' => {
				let directive = skipBlanks(source, pos+1);
				if !source[directive..].starts_with(INCLUDE) {
					pos = directive;
					continue;
				}
				let quote = skipBlanks(source, directive + INCLUDE.len());
				if source.get(quote) != Some(&b'"') {
					pos = quote;
					continue;
				}
				let Some(length) = source[quote+1..].iter().position(|&c| c == b'"' || c == b'\n') else {
					break
				};
				let closing = quote+1 + length;
				if source[closing] != b'"' {
					break;
				}
				identities.push(String::from_utf8_lossy(&source[quote+1..closing]).into_owned());
				pos = closing+1;
			},

			_ => pos += 1
		}
	}
	identities
}

/// Collect all files transitively included by the given source.
///
/// Files are visited depth-first in pre-order, each at most once, so include cycles terminate. If `rootIdentity` is
/// given, the root itself counts as visited and is never re-entered through a (transitive) self-include.
///
/// # Arguments
///
/// * `rootIdentity` – The identity of the root source if it stems from a file.
/// * `source` – The text of the root source.
/// * `factory` – Used to fetch the contents of every included file.
pub fn processIncludes (rootIdentity: Option<&str>, source: &[u8], factory: &dyn SourceStreamFactory) -> IncludeScan
{
	let mut scan = IncludeScan::default();
	let mut visited = BTreeSet::new();
	if let Some(root) = rootIdentity {
		visited.insert(util::path::normalizeIdentity(root));
	}
	walkIncludes(rootIdentity, source, factory, &mut visited, &mut scan);
	for missing in &scan.missing {
		tracing::warn!("Include dependency walk incomplete: {missing}");
	}
	scan
}

/// The recursive worker of [`processIncludes`].
fn walkIncludes (
	parent: Option<&str>, source: &[u8], factory: &dyn SourceStreamFactory, visited: &mut BTreeSet<String>,
	scan: &mut IncludeScan
){
	for identity in scanIncludeDirectives(source)
	{
		let normalized = util::path::normalizeIdentity(&identity);
		if !visited.insert(normalized.clone()) {
			continue;
		}
		let Some(contents) = factory.openStream(&identity) else {
			scan.missing.push(PreprocessError::MissingInclude {
				identity: normalized, includedFrom: parent.map(str::to_owned)
			});
			continue;
		};
		// Nested includes are walked first, so the file goes in ahead of everything they added
		let position = scan.includes.len();
		walkIncludes(Some(&normalized), &contents, factory, visited, scan);
		scan.includes.insert(position, IncludeFile { identity: normalized, contents });
	}
}
