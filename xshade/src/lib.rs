
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

/// Submodule implementing the `#include` dependency scanner and source stream factories.
pub mod preprocess;

/// Submodule defining compile requests.
pub mod request;
pub use request::{CompileRequest, ShaderSource, ShaderMacro}; // re-export

/// Submodule implementing the compiler front-end adapters.
pub mod compile;

/// Submodule implementing resource reflection over compiled bytecode.
pub mod reflect;

/// Submodule implementing the *SPIR-V* transform engine.
pub mod spirv;

/// Submodule implementing the textual *DXIL* resource binding patcher.
pub mod dxil;

/// Submodule implementing the content-addressed bytecode cache.
pub mod cache;

/// Submodule implementing the shader package facilities
mod pak;
pub use pak::{Program, Package, InvalidEntryPointError, InvalidTargetError}; // re-export

/// Submodule implementing the compilation session tying everything together.
mod session;
pub use session::Session; // re-export

/// Unit tests.
#[cfg(test)]
mod tests;



//////
//
// Imports
//

// Standard library
use std::fmt::{Display, Formatter};

// Bitflags library
use bitflags::bitflags;

// Tracing library
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Local imports
pub use xshade_util as util;
pub use xshade_runenv as runenv;



//////
//
// Enums
//

/// The language a shader source is written in.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub enum SourceLanguage {
	HLSL,
	GLSL
}
impl SourceLanguage {
	/// The file extension conventionally used for sources in this language.
	pub fn extension (self) -> &'static str {
		match self {
			Self::HLSL => "hlsl",
			Self::GLSL => "glsl"
		}
	}
}
impl Display for SourceLanguage {
	fn fmt (&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::HLSL => write!(f, "HLSL"),
			Self::GLSL => write!(f, "GLSL")
		}
	}
}

/// The pipeline stage a shader entry point is compiled for.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub enum ShaderStage {
	Vertex,
	Pixel,
	Geometry,
	Hull,
	Domain,
	Compute,
	Amplification,
	Mesh
}
impl ShaderStage
{
	/// The single-bit stage flag of this stage, as used when several stages need to be expressed as a mask.
	pub fn flag (self) -> u32 {
		match self {
			Self::Vertex => 0x001,
			Self::Pixel => 0x002,
			Self::Geometry => 0x004,
			Self::Hull => 0x008,
			Self::Domain => 0x010,
			Self::Compute => 0x020,
			Self::Amplification => 0x040,
			Self::Mesh => 0x080
		}
	}
}
impl Display for ShaderStage {
	fn fmt (&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{self:?}")
	}
}

/// The binary bytecode format a compilation produces.
#[derive(Debug,Ord,PartialOrd,Eq,PartialEq,Copy,Clone,Hash,bitcode::Encode,bitcode::Decode)]
pub enum TargetBackend {
	/// A *SPIR-V* word stream for *Vulkan*-style consumers.
	SPIRV,

	/// A signed *DXIL* container for *Direct3D12*-style consumers.
	DXIL
}
impl TargetBackend {
	/// The discriminator value that identifies the backend inside cache fingerprints.
	pub fn discriminator (self) -> u8 {
		match self {
			Self::SPIRV => 1,
			Self::DXIL => 2
		}
	}
}
impl Display for TargetBackend {
	fn fmt (&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::SPIRV => write!(f, "SPIR-V"),
			Self::DXIL => write!(f, "DXIL")
		}
	}
}

/// Selects which of the two third-party compiler front ends handles a request.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub enum CompilerKind {
	/// The *DirectX Shader Compiler* (*HLSL* to *DXIL* or *SPIR-V*).
	DXC,

	/// The *glslang* reference compiler (*GLSL* or *HLSL* to *SPIR-V*).
	Glslang
}
impl Display for CompilerKind {
	fn fmt (&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::DXC => write!(f, "DXC"),
			Self::Glslang => write!(f, "glslang")
		}
	}
}



//////
//
// Structs
//

/// A `major.minor` version, used both for *HLSL* shader models and *SPIR-V* versions.
#[derive(Debug,Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub struct ShaderVersion {
	pub major: u32,
	pub minor: u32
}
impl ShaderVersion {
	#[inline(always)]
	pub const fn new (major: u32, minor: u32) -> Self {
		Self { major, minor }
	}
}
impl Display for ShaderVersion {
	fn fmt (&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}.{}", self.major, self.minor)
	}
}

bitflags! {
	/// Flags that influence how a request is compiled.
	#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,Default)]
	pub struct CompileFlags: u32 {
		/// Don't extract resource reflection from the produced bytecode.
		const SKIP_REFLECTION = 0x1;

		/// Pack matrices in row-major order.
		const PACK_MATRIX_ROW_MAJOR = 0x2;

		/// Embed debug information in the produced bytecode.
		const DEBUG_INFO = 0x4;

		/// Enable native 16-bit types (shader model 6.2+).
		const ENABLE_16BIT_TYPES = 0x8;
	}
}



//////
//
// Functions
//

/// Install a `tracing` subscriber that prints to the console and honors the `RUST_LOG` environment variable. Does
/// nothing if a global subscriber has already been installed.
pub fn initTracing ()
{
	let mut envFilterBuilder = EnvFilter::builder();
	#[cfg(debug_assertions)] {
		envFilterBuilder = envFilterBuilder.with_default_directive(tracing::Level::DEBUG.into());
	}
	#[cfg(not(debug_assertions))] {
		envFilterBuilder = envFilterBuilder.with_default_directive(tracing::Level::INFO.into());
	}
	let envFilter = envFilterBuilder.from_env_lossy();

	let fmtLayer = tracing_subscriber::fmt::Layer::default();
	if tracing_subscriber::registry().with(envFilter).with(fmtLayer).try_init().is_err() {
		tracing::debug!("A tracing subscriber was already installed");
	}
}
