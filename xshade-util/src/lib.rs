
//////
//
// Language config
//

// Eff this convention.
#![allow(non_snake_case)]



//////
//
// Module definitions
//

/// Submodule providing operations on the file system.
pub mod fs;

/// Submodule providing operations on file system paths and include identities.
pub mod path;

/// Unit tests.
#[cfg(test)]
mod tests;



//////
//
// Imports
//

// Bytemuck library
use bytemuck;

// Normalize-path library
pub use normalize_path; // re-export



//////
//
// Constants
//

/// The magic number every *SPIR-V* module starts with, in native word order.
pub const SPIRV_MAGIC: u32 = 0x0723_0203;



//////
//
// Functions
//

/// Reinterpret a blob of bytes as a stream of 32-bit words in native byte order, as is required for *SPIR-V*
/// modules. The blob does not need to be aligned.
///
/// # Arguments
///
/// * `bytes` – The byte blob to convert.
///
/// # Returns
///
/// The words contained in the blob, or [`None`] if the blob length is not a multiple of 4.
pub fn bytesToWords (bytes: &[u8]) -> Option<Vec<u32>>
{
	if bytes.len() % 4 != 0 {
		return None;
	}
	Some(bytemuck::pod_collect_to_vec(bytes))
}

/// Flatten a stream of 32-bit words into bytes in native byte order.
pub fn wordsToBytes (words: &[u32]) -> Vec<u8> {
	bytemuck::cast_slice(words).to_vec()
}

/// Check whether the given blob plausibly holds a *SPIR-V* module in native byte order (i.e. is word-aligned and
/// starts with the magic number).
#[inline]
pub fn looksLikeSpirv (bytes: &[u8]) -> bool {
	bytes.len() >= 20 && bytes.len() % 4 == 0
		&& bytemuck::pod_read_unaligned::<u32>(&bytes[..4]) == SPIRV_MAGIC
}

/// Find the first occurrence of `needle` inside `haystack`, starting the search at byte offset `from`.
///
/// # Returns
///
/// The absolute byte offset of the match, or [`None`].
pub fn findBytes (haystack: &[u8], needle: &[u8], from: usize) -> Option<usize>
{
	if needle.is_empty() || from > haystack.len() || haystack.len() - from < needle.len() {
		return None;
	}
	haystack[from..].windows(needle.len()).position(|window| window == needle).map(|pos| pos + from)
}
