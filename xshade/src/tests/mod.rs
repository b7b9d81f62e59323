
//////
//
// Module definitions
//


// Tests for the compiler front ends and the toolchain loader
mod compile;

// Tests for resource reflection
mod reflect;








//////
//
// Imports
//

// Standard library
use std::collections::BTreeSet;

// Local imports
use crate::*;



//////
//
// Tests
//

#[test]
fn test_ShaderStage_flags_unique()
{
	let stages = [
		ShaderStage::Vertex, ShaderStage::Pixel, ShaderStage::Geometry, ShaderStage::Hull, ShaderStage::Domain,
		ShaderStage::Compute, ShaderStage::Amplification, ShaderStage::Mesh
	];
	let flags: BTreeSet<u32> = stages.iter().map(|stage| stage.flag()).collect();
	assert_eq!(flags.len(), stages.len());
	assert!(flags.iter().all(|flag| flag.is_power_of_two()));
}

#[test]
fn test_TargetBackend_discriminator() {
	assert_eq!(TargetBackend::SPIRV.discriminator(), 1);
	assert_eq!(TargetBackend::DXIL.discriminator(), 2);
}

#[test]
fn test_ShaderVersion()
{
	assert!(ShaderVersion::new(6, 10) > ShaderVersion::new(6, 2));
	assert!(ShaderVersion::new(1, 6) < ShaderVersion::new(2, 0));
	assert_eq!(ShaderVersion::new(6, 8).to_string(), "6.8");
}

#[test]
fn test_SourceLanguage_extension() {
	assert_eq!(SourceLanguage::HLSL.extension(), "hlsl");
	assert_eq!(SourceLanguage::GLSL.extension(), "glsl");
}

#[test]
fn test_CompileRequest_defaults()
{
	let request = CompileRequest::glsl("void main () {}", ShaderStage::Compute);
	assert_eq!(request.compiler, CompilerKind::Glslang);
	assert_eq!(request.entryPoint, "main");
	assert_eq!(request.displayName(), "<inline>");
	assert_eq!(request.withName("blur").displayName(), "blur");

	let request = CompileRequest::fromFile(SourceLanguage::HLSL, "lit.hlsl", "psMain", ShaderStage::Pixel);
	assert_eq!(request.compiler, CompilerKind::DXC);
	assert_eq!(request.filePath(), Some("lit.hlsl"));
	assert_eq!(request.hlslVersion, ShaderVersion::new(6, 0));
	assert_eq!(request.combinedSamplerSuffix, CompileRequest::DEFAULT_SAMPLER_SUFFIX);
	assert!(request.flags.is_empty());
}
