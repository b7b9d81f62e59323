
//////
//
// Imports
//

// Standard library
use std::{ffi::OsStr, io, path::{Path, PathBuf}, process::Command};

// Tempfile library
use tempfile::TempDir;

// Local imports
use crate::{util, preprocess::IncludeSet};



//////
//
// Structs
//

/// The captured result of running an external tool.
#[derive(Debug,Clone)]
pub struct ToolOutput {
	pub success: bool,
	pub stdout: String,
	pub stderr: String
}
impl ToolOutput
{
	/// Both output streams joined, skipping empty ones.
	pub fn combinedLog (&self) -> String {
		[self.stderr.trim_end(), self.stdout.trim_end()].iter().filter(|s| !s.is_empty())
			.copied().collect::<Vec<_>>().join("\n")
	}
}

/// A located external executable.
#[derive(Debug,Clone)]
pub struct Tool {
	name: &'static str,
	path: PathBuf
}
impl Tool
{
	pub fn new (name: &'static str, path: impl Into<PathBuf>) -> Self {
		Self { name, path: path.into() }
	}

	/// Locate the tool, preferring an explicitly configured path.
	pub fn locate (name: &'static str, explicit: Option<&Path>) -> Option<Self> {
		locateExecutable(explicit, name).map(|path| Self::new(name, path))
	}

	#[inline(always)]
	pub fn name (&self) -> &'static str {
		self.name
	}

	#[inline(always)]
	pub fn path (&self) -> &Path {
		&self.path
	}

	/// Run the tool to completion with the given arguments, optionally inside a working directory.
	pub fn run<Arg: AsRef<OsStr>> (&self, args: &[Arg], workDir: Option<&Path>) -> io::Result<ToolOutput>
	{
		let mut command = Command::new(&self.path);
		command.args(args);
		if let Some(dir) = workDir {
			command.current_dir(dir);
		}
		tracing::trace!(
			"Running {} {}", self.path.display(),
			args.iter().map(|arg| arg.as_ref().to_string_lossy()).collect::<Vec<_>>().join(" ")
		);
		let output = command.output()?;
		Ok(ToolOutput {
			success: output.status.success(),
			stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
			stderr: String::from_utf8_lossy(&output.stderr).into_owned()
		})
	}
}

/// A private directory that a single tool invocation works in. Removed when dropped.
pub struct Scratch {
	dir: TempDir
}
impl Scratch
{
	pub fn new () -> io::Result<Self> {
		Ok(Self { dir: tempfile::Builder::new().prefix("xshade-").tempdir()? })
	}

	#[inline(always)]
	pub fn path (&self) -> &Path {
		self.dir.path()
	}

	/// Write a file into the scratch directory, returning its full path.
	pub fn write (&self, name: &str, contents: impl AsRef<[u8]>) -> io::Result<PathBuf> {
		let path = util::path::containedPath(self.path(), name).ok_or_else(
			|| io::Error::new(io::ErrorKind::InvalidInput, format!("`{name}` does not fit into the scratch directory"))
		)?;
		util::fs::writeCreatingDirs(&path, contents).map_err(io::Error::other)?;
		Ok(path)
	}

	/// Write every include of the set at its identity path, so that a compiler given the scratch directory as include
	/// path sees exactly these contents. Identities that cannot be placed inside the directory are skipped.
	pub fn materializeIncludes (&self, includes: &IncludeSet) -> io::Result<()>
	{
		for include in includes
		{
			if util::path::containedPath(self.path(), &include.identity).is_none() {
				tracing::warn!("Include `{}` cannot be staged for the compiler and is skipped", include.identity);
				continue;
			}
			self.write(&include.identity, &include.contents)?;
		}
		Ok(())
	}

	/// Read a file the tool produced.
	pub fn read (&self, name: &str) -> io::Result<Vec<u8>> {
		std::fs::read(self.path().join(name))
	}
}



//////
//
// Functions
//

/// Find an executable, either at the explicitly given location or by name on the `PATH`.
pub fn locateExecutable (explicit: Option<&Path>, name: &str) -> Option<PathBuf>
{
	if let Some(explicit) = explicit {
		return explicit.is_file().then(|| explicit.to_owned());
	}
	let fileName = if cfg!(windows) { format!("{name}.exe") } else { name.to_owned() };
	std::env::var_os("PATH").and_then(|paths| {
		std::env::split_paths(&paths).map(|dir| dir.join(&fileName)).find(|candidate| candidate.is_file())
	})
}
