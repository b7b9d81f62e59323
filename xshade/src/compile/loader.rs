
//! Lazy, once-per-process loading of compiler toolchains.
//!
//! Probing a toolchain (locating its executable and querying its version) is comparatively expensive and often not
//! needed at all, so it only ever happens on first use. The result is shared process-wide for as long as any
//! [`LazyToolchain`] handle holds on to it; once the last owner is gone the toolchain is released and a later request
//! loads it afresh.



//////
//
// Imports
//

// Standard library
use std::{
	collections::BTreeMap, error::Error, fmt::{Display, Formatter}, path::{Path, PathBuf},
	sync::{Arc, Mutex, OnceLock, PoisonError, Weak}
};

// Tracing library
use tracing;

// Local imports
use super::tool::Tool;



//////
//
// Errors
//

#[derive(Debug,Clone,PartialEq,Eq)]
pub enum LoadError {
	/// The executable could not be found.
	NotFound { tool: &'static str },

	/// The executable was found but could not be queried.
	ProbeFailed { tool: &'static str, reason: String }
}
impl Display for LoadError {
	fn fmt (&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
		let desc = match self {
			Self::NotFound { tool } => format!("`{tool}` not found"),
			Self::ProbeFailed { tool, reason } => format!("probing `{tool}` failed: {reason}")
		};
		write!(formatter, "LoadError[{desc}]")
	}
}
impl Error for LoadError {}



//////
//
// Traits
//

/// The trait of toolchains that can be loaded from a located executable.
pub trait Toolchain: Sized+Send+Sync+'static
{
	/// The canonical executable name of the toolchain's driver.
	const EXECUTABLE: &'static str;

	/// Probe the toolchain behind the given driver executable.
	fn load (tool: Tool) -> Result<Self, LoadError>;
}



//////
//
// Structs
//

/// The process-wide table of loaded toolchains of one kind, keyed by the path of their driver executable.
pub struct ToolchainRegistry<T: Toolchain> {
	loaded: Mutex<BTreeMap<PathBuf, Weak<T>>>
}
impl<T: Toolchain> ToolchainRegistry<T>
{
	pub const fn new () -> Self {
		Self { loaded: Mutex::new(BTreeMap::new()) }
	}

	/// Obtain the toolchain for the given executable, loading it if no live instance exists. Concurrent callers block
	/// on the registry lock until the first one has finished loading and then share its result.
	pub fn acquire (&self, executable: &Path) -> Result<Arc<T>, LoadError>
	{
		let mut loaded = self.loaded.lock().unwrap_or_else(PoisonError::into_inner);
		if let Some(existing) = loaded.get(executable).and_then(Weak::upgrade) {
			return Ok(existing);
		}

		tracing::info!("Loading {} toolchain from `{}`", T::EXECUTABLE, executable.display());
		let toolchain = Arc::new(T::load(Tool::new(T::EXECUTABLE, executable))?);
		loaded.retain(|_, weak| weak.strong_count() > 0);
		loaded.insert(executable.to_owned(), Arc::downgrade(&toolchain));
		Ok(toolchain)
	}

	/// Report whether a live instance for the given executable exists.
	pub fn isLoaded (&self, executable: &Path) -> bool {
		self.loaded.lock().unwrap_or_else(PoisonError::into_inner).get(executable).is_some_and(
			|weak| weak.strong_count() > 0
		)
	}
}

/// An owned, lazily initialized handle to a toolchain.
///
/// The first call to [`get`](Self::get) locates the executable and acquires the toolchain from the process-wide
/// registry; the outcome (including failure) is remembered, so all later calls are lock-free. Dropping the handle
/// releases its share of the toolchain.
pub struct LazyToolchain<T: Toolchain> {
	registry: &'static ToolchainRegistry<T>,
	executableOverride: Option<PathBuf>,
	cell: OnceLock<Result<Arc<T>, LoadError>>
}
impl<T: Toolchain> LazyToolchain<T>
{
	pub fn new (registry: &'static ToolchainRegistry<T>, executableOverride: Option<PathBuf>) -> Self {
		Self { registry, executableOverride, cell: OnceLock::new() }
	}

	/// Obtain the toolchain, loading it on first use.
	pub fn get (&self) -> Result<&Arc<T>, LoadError> {
		self.cell.get_or_init(|| {
			let executable = super::tool::locateExecutable(self.executableOverride.as_deref(), T::EXECUTABLE)
				.ok_or(LoadError::NotFound { tool: T::EXECUTABLE })?;
			let result = self.registry.acquire(&executable);
			if let Err(err) = &result {
				tracing::warn!("Toolchain unavailable: {err}");
			}
			result
		}).as_ref().map_err(Clone::clone)
	}

	/// Report whether loading has been attempted and succeeded, without triggering it.
	pub fn isLoaded (&self) -> bool {
		matches!(self.cell.get(), Some(Ok(_)))
	}
}
