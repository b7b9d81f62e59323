
//////
//
// Tests for functionality in the root module
//

////
// Imports

// Local imports
use crate::*;


////
// Tests

#[test]
fn test_bytesToWords()
{
	let bytes = [SPIRV_MAGIC.to_ne_bytes(), 0x0001_0000u32.to_ne_bytes()].concat();
	assert_eq!(bytesToWords(&bytes), Some(vec![SPIRV_MAGIC, 0x0001_0000]));
	assert_eq!(bytesToWords(&bytes[..7]), None);
	assert_eq!(bytesToWords(&[]), Some(vec![]));

	// Blobs embedded at arbitrary offsets
	let mut shifted = vec![0xff];
	shifted.extend_from_slice(&bytes);
	assert_eq!(bytesToWords(&shifted[1..]), Some(vec![SPIRV_MAGIC, 0x0001_0000]));
	shifted.extend_from_slice(&[0; 12]);
	assert!(looksLikeSpirv(&shifted[1..]));
}

#[test]
fn test_wordsToBytes_inverse()
{
	let words = vec![SPIRV_MAGIC, 0xdead_beef, 42];
	assert_eq!(bytesToWords(&wordsToBytes(&words)), Some(words));
}

#[test]
fn test_looksLikeSpirv()
{
	let mut blob = wordsToBytes(&[SPIRV_MAGIC, 0x0001_0000, 0, 8, 0]);
	assert!(looksLikeSpirv(&blob));
	blob[0] = 0;
	assert!(!looksLikeSpirv(&blob));
	assert!(!looksLikeSpirv(b"DXBC"));
}

#[test]
fn test_findBytes()
{
	let haystack = b"abc \"x\" abc";
	assert_eq!(findBytes(haystack, b"abc", 0), Some(0));
	assert_eq!(findBytes(haystack, b"abc", 1), Some(8));
	assert_eq!(findBytes(haystack, b"abc", 9), None);
	assert_eq!(findBytes(haystack, b"", 0), None);
	assert_eq!(findBytes(haystack, b"abc", 100), None);
}

#[test]
fn test_normalizeIdentity()
{
	assert_eq!(path::normalizeIdentity("a.h"), "a.h");
	assert_eq!(path::normalizeIdentity("./common/../a.h"), "a.h");
	assert_eq!(path::normalizeIdentity(".\\inc\\b.hlsl"), "inc/b.hlsl");
	assert_eq!(path::normalizeIdentity("../shared/c.h"), "../shared/c.h");
	assert_eq!(path::normalizeIdentity("/abs//d.h"), "/abs/d.h");
}

#[test]
fn test_containedPath()
{
	let root = std::path::Path::new("/scratch");
	assert_eq!(path::containedPath(root, "inc/a.h"), Some(root.join("inc/a.h")));
	assert_eq!(path::containedPath(root, "x/../a.h"), Some(root.join("a.h")));
	assert_eq!(path::containedPath(root, "../a.h"), None);
	assert_eq!(path::containedPath(root, "/etc/a.h"), None);
	assert_eq!(path::containedPath(root, "C:/a.h"), None);
	assert_eq!(path::containedPath(root, ""), None);
}

#[test]
fn test_writeCreatingDirs_and_readIfExists() -> anyhow::Result<()>
{
	let dir = tempfile::tempdir()?;
	let target = dir.path().join("nested/deeper/file.bin");
	assert_eq!(fs::readIfExists(&target)?, None);
	fs::writeCreatingDirs(&target, [1u8, 2, 3])?;
	assert_eq!(fs::readIfExists(&target)?, Some(vec![1, 2, 3]));
	assert_eq!(fs::readIfExists(dir.path())?, None);
	Ok(())
}
