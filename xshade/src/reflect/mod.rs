
//////
//
// Module definitions
//

/// Reflection over *SPIR-V* modules.
mod spirv;
pub use spirv::reflectSpirv; // re-export

/// Reflection over disassembled *DXIL*.
mod dxil;
pub use dxil::parseResourceTable; // re-export



//////
//
// Imports
//

// Standard library
use std::{error::Error, fmt::{Display, Formatter}};

// Local imports
use crate::TargetBackend;



//////
//
// Errors
//

#[derive(Debug,Clone,PartialEq,Eq)]
pub enum ReflectError {
	/// The bytecode could not be decoded.
	MalformedBytecode(String),

	/// The front end cannot reflect bytecode of the given kind.
	UnsupportedTarget(TargetBackend),

	/// An external tool needed for reflection failed.
	Toolchain(String)
}
impl Display for ReflectError {
	fn fmt (&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
		let desc = match self {
			Self::MalformedBytecode(reason) => format!("malformed bytecode: {reason}"),
			Self::UnsupportedTarget(target) => format!("cannot reflect {target} bytecode"),
			Self::Toolchain(reason) => format!("toolchain error: {reason}")
		};
		write!(formatter, "ReflectError[{desc}]")
	}
}
impl Error for ReflectError {}



//////
//
// Enums
//

/// The kind of a shader resource as seen by pipeline layout construction.
#[derive(Debug,Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash,bitcode::Encode,bitcode::Decode)]
pub enum ResourceKind {
	UniformBuffer,
	StorageBuffer,
	PushConstant,
	SampledImage,
	SeparateImage,
	StorageImage,
	Sampler,
	TexelBuffer,
	AccelerationStructure
}



//////
//
// Structs
//

/// A resource binding recovered from compiled bytecode.
#[derive(Debug,Clone,PartialEq,Eq,bitcode::Encode,bitcode::Decode)]
pub struct ShaderResourceDesc {
	pub name: String,
	pub kind: ResourceKind,

	/// The binding (*SPIR-V*) or register (*DXIL*) index.
	pub register: u32,

	/// The descriptor set (*SPIR-V*) or register space (*DXIL*).
	pub space: u32,

	/// The array size, `0` for unbounded arrays.
	pub count: u32
}
