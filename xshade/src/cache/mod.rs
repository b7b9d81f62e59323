
//! A content-addressed store of compiled bytecode.
//!
//! The cache is not synchronized. Callers sharing one between threads have to serialize access themselves, e.g. by
//! keeping one cache per worker or wrapping it in a lock.



//////
//
// Module definitions
//

/// Submodule implementing cache key computation.
mod fingerprint;
pub use fingerprint::{Fingerprint, computeFingerprint}; // re-export



//////
//
// Imports
//

// Standard library
use std::{collections::BTreeMap, error::Error, fmt::{Display, Formatter}, path::Path};

// Local imports
use crate::util;



//////
//
// Globals
//

/// The `(major, minor)` version written into serialized caches. Blobs of a different major version are rejected.
pub const CACHE_FORMAT_VERSION: (u32, u32) = (1, 0);



//////
//
// Errors
//

#[derive(Debug,Clone,PartialEq,Eq)]
pub enum CacheError {
	/// The blob ended in the middle of a field.
	Truncated { offset: usize },

	/// The blob was written by an incompatible format version.
	UnsupportedVersion { major: u32, minor: u32 },

	/// The blob continues past its last declared entry.
	TrailingBytes { count: usize },

	/// Reading or writing the cache file failed.
	Io(String)
}
impl Display for CacheError {
	fn fmt (&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
		let desc = match self {
			Self::Truncated { offset } => format!("data truncated at offset {offset}"),
			Self::UnsupportedVersion { major, minor } => format!("unsupported format version {major}.{minor}"),
			Self::TrailingBytes { count } => format!("{count} unexpected trailing bytes"),
			Self::Io(reason) => format!("I/O error: {reason}")
		};
		write!(formatter, "CacheError[{desc}]")
	}
}
impl Error for CacheError {}



//////
//
// Structs
//

/// Sequential little-endian reader over a serialized cache.
struct Reader<'blob> {
	bytes: &'blob [u8],
	pos: usize
}
impl<'blob> Reader<'blob>
{
	fn take (&mut self, count: usize) -> Result<&'blob [u8], CacheError> {
		let end = self.pos.checked_add(count).filter(|&end| end <= self.bytes.len())
			.ok_or(CacheError::Truncated { offset: self.pos })?;
		let slice = &self.bytes[self.pos..end];
		self.pos = end;
		Ok(slice)
	}

	fn u32 (&mut self) -> Result<u32, CacheError> {
		let bytes = self.take(4)?;
		Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
	}

	fn u64 (&mut self) -> Result<u64, CacheError> {
		let mut buf = [0u8; 8];
		buf.copy_from_slice(self.take(8)?);
		Ok(u64::from_le_bytes(buf))
	}

	fn u128 (&mut self) -> Result<u128, CacheError> {
		let mut buf = [0u8; 16];
		buf.copy_from_slice(self.take(16)?);
		Ok(u128::from_le_bytes(buf))
	}

	fn remaining (&self) -> usize {
		self.bytes.len() - self.pos
	}
}

/// Maps request fingerprints to compiled bytecode.
#[derive(Debug,Clone,Default)]
pub struct BytecodeCache {
	entries: BTreeMap<Fingerprint, Vec<u8>>
}
impl BytecodeCache
{
	pub fn new () -> Self {
		Self::default()
	}

	/// Reconstruct a cache from a blob produced by [`serializeAll`](Self::serializeAll).
	pub fn fromBytes (blob: &[u8]) -> Result<Self, CacheError> {
		let mut cache = Self::new();
		cache.deserializeAll(blob)?;
		Ok(cache)
	}

	/// Load a cache from a file written by [`saveToFile`](Self::saveToFile).
	pub fn loadFromFile (filename: impl AsRef<Path>) -> Result<Self, CacheError> {
		let blob = std::fs::read(filename.as_ref()).map_err(|err| CacheError::Io(err.to_string()))?;
		Self::fromBytes(&blob)
	}

	pub fn lookup (&self, fingerprint: Fingerprint) -> Option<&[u8]> {
		self.entries.get(&fingerprint).map(Vec::as_slice)
	}

	/// Store bytecode under a fingerprint, returning what was previously stored there.
	pub fn insert (&mut self, fingerprint: Fingerprint, bytecode: Vec<u8>) -> Option<Vec<u8>> {
		self.entries.insert(fingerprint, bytecode)
	}

	pub fn remove (&mut self, fingerprint: Fingerprint) -> Option<Vec<u8>> {
		self.entries.remove(&fingerprint)
	}

	pub fn clear (&mut self) {
		self.entries.clear()
	}

	#[inline(always)]
	pub fn len (&self) -> usize {
		self.entries.len()
	}

	#[inline(always)]
	pub fn is_empty (&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter (&self) -> impl Iterator<Item=(Fingerprint, &[u8])> {
		self.entries.iter().map(|(fingerprint, bytecode)| (*fingerprint, bytecode.as_slice()))
	}

	/// Serialize all entries into a flat blob: format major and minor version as little-endian `u32`, the entry count
	/// as little-endian `u64`, then per entry the 16-byte little-endian fingerprint, the bytecode length as
	/// little-endian `u64` and the bytecode itself.
	pub fn serializeAll (&self) -> Vec<u8>
	{
		let payload: usize = self.entries.values().map(|bytecode| 24 + bytecode.len()).sum();
		let mut blob = Vec::with_capacity(16 + payload);
		blob.extend_from_slice(&CACHE_FORMAT_VERSION.0.to_le_bytes());
		blob.extend_from_slice(&CACHE_FORMAT_VERSION.1.to_le_bytes());
		blob.extend_from_slice(&(self.entries.len() as u64).to_le_bytes());
		for (fingerprint, bytecode) in &self.entries {
			blob.extend_from_slice(&fingerprint.0.to_le_bytes());
			blob.extend_from_slice(&(bytecode.len() as u64).to_le_bytes());
			blob.extend_from_slice(bytecode);
		}
		blob
	}

	/// Merge the entries of a serialized cache into this one, replacing entries with equal fingerprints. Returns the
	/// number of entries read. If the blob is malformed in any way, the cache is left untouched.
	pub fn deserializeAll (&mut self, blob: &[u8]) -> Result<usize, CacheError>
	{
		let mut reader = Reader { bytes: blob, pos: 0 };
		let (major, minor) = (reader.u32()?, reader.u32()?);
		if major != CACHE_FORMAT_VERSION.0 {
			return Err(CacheError::UnsupportedVersion { major, minor });
		}
		let count = reader.u64()?;

		let mut parsed = BTreeMap::new();
		for _ in 0..count {
			let fingerprint = Fingerprint(reader.u128()?);
			let lengthOffset = reader.pos;
			let length = usize::try_from(reader.u64()?).map_err(|_| CacheError::Truncated { offset: lengthOffset })?;
			parsed.insert(fingerprint, reader.take(length)?.to_vec());
		}
		if reader.remaining() > 0 {
			return Err(CacheError::TrailingBytes { count: reader.remaining() });
		}

		let loaded = parsed.len();
		self.entries.extend(parsed);
		tracing::debug!("Loaded {loaded} cache entries (format {major}.{minor})");
		Ok(loaded)
	}

	/// Write the serialized cache to a file, creating missing parent directories.
	pub fn saveToFile (&self, filename: impl AsRef<Path>) -> Result<(), CacheError> {
		util::fs::writeCreatingDirs(filename, self.serializeAll()).map_err(|err| CacheError::Io(err.to_string()))
	}
}
