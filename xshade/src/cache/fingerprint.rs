
//////
//
// Imports
//

// Standard library
use std::fmt::{Display, Formatter};

// xxHash library
use xxhash_rust::xxh3::Xxh3;

// Local imports
use crate::*;
use crate::{compile::CompilerSettings, preprocess::IncludeSet};



//////
//
// Structs
//

/// The 128-bit cache key of a compile request.
#[derive(Debug,Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct Fingerprint(pub u128);
impl Display for Fingerprint {
	fn fmt (&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{:032x}", self.0)
	}
}

/// Feeds typed fields into the hash. Variable-length fields are length-prefixed so that adjacent fields can never
/// trade bytes with each other.
struct FingerprintHasher {
	state: Xxh3
}
impl FingerprintHasher
{
	fn new () -> Self {
		Self { state: Xxh3::new() }
	}

	fn bytes (&mut self, bytes: &[u8]) {
		self.state.update(&(bytes.len() as u64).to_le_bytes());
		self.state.update(bytes);
	}

	fn str (&mut self, string: &str) {
		self.bytes(string.as_bytes())
	}

	fn u8 (&mut self, value: u8) {
		self.state.update(&[value]);
	}

	fn u32 (&mut self, value: u32) {
		self.state.update(&value.to_le_bytes());
	}

	fn bool (&mut self, value: bool) {
		self.u8(value as u8)
	}

	fn finish (self) -> Fingerprint {
		Fingerprint(self.state.digest128())
	}
}



//////
//
// Functions
//

/// Compute the cache key of a request compiled for the given backend.
///
/// Besides every request field that affects the compiler's output, the key covers the settings of the front end
/// handling the request, the bytes of the root source and those of every transitively included file. Includes are
/// hashed in identity order together with their identity, so the order in which they were discovered does not matter
/// but editing any of them changes the key.
pub fn computeFingerprint (
	request: &CompileRequest, target: TargetBackend, settings: &CompilerSettings, rootSource: &[u8],
	includes: &IncludeSet
) -> Fingerprint
{
	let mut hasher = FingerprintHasher::new();
	match request.filePath() {
		Some(path) => { hasher.u8(1); hasher.str(path); },
		None => hasher.u8(0)
	}
	hasher.str(&request.entryPoint);
	hasher.str(&request.combinedSamplerSuffix);
	hasher.str(&request.name);
	hasher.u32(request.macros.len() as u32);
	for ShaderMacro { name, definition } in &request.macros {
		hasher.str(name);
		hasher.str(definition);
	}
	hasher.u32(request.stage.flag());
	hasher.bool(request.useCombinedTextureSamplers);
	hasher.u8(match request.language {
		SourceLanguage::HLSL => 1,
		SourceLanguage::GLSL => 2
	});
	hasher.u8(match request.compiler {
		CompilerKind::DXC => 1,
		CompilerKind::Glslang => 2
	});
	hasher.u32(request.hlslVersion.major);
	hasher.u32(request.hlslVersion.minor);
	match request.spirvVersion {
		Some(version) => { hasher.u8(1); hasher.u32(version.major); hasher.u32(version.minor); },
		None => hasher.u8(0)
	}
	hasher.u32(request.flags.bits());
	hasher.u8(target.discriminator());
	hasher.u32(settings.extraArgs.len() as u32);
	for arg in settings.extraArgs {
		hasher.str(arg);
	}
	hasher.bool(settings.legalizeHlsl);

	hasher.bytes(rootSource);
	hasher.u32(includes.len() as u32);
	for include in includes.sortedByIdentity() {
		hasher.str(&include.identity);
		hasher.bytes(&include.contents);
	}
	hasher.finish()
}
