
//////
//
// Imports
//

// Standard library
use std::{fs, path::Path};

// Anyhow library
use anyhow::Result;



//////
//
// Functions
//

/// Write a file, creating all missing parent directories on the way.
pub fn writeCreatingDirs (path: impl AsRef<Path>, contents: impl AsRef<[u8]>) -> Result<()>
{
	if let Some(parent) = path.as_ref().parent() {
		fs::create_dir_all(parent)?;
	}
	Ok(fs::write(path, contents)?)
}

/// Read a file if it exists and is a regular file.
///
/// # Returns
///
/// The contents of the file, [`None`] if there is no such file, or the I/O error that occurred while reading it.
pub fn readIfExists (path: impl AsRef<Path>) -> Result<Option<Vec<u8>>>
{
	let path = path.as_ref();
	if !path.is_file() {
		return Ok(None);
	}
	Ok(Some(fs::read(path)?))
}
