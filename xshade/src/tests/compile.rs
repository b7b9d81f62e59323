
//////
//
// Imports
//

// Standard library
use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};

// Tempfile library
use tempfile;

// Local imports
use crate::*;
use crate::{compile::{*, loader::*, tool::*}, preprocess::*, reflect::ResourceKind};



//////
//
// Fixtures
//

/// A toolchain that never runs anything and counts how often it gets loaded.
#[derive(Debug)]
struct CountingToolchain;
static LOADS: AtomicUsize = AtomicUsize::new(0);
impl Toolchain for CountingToolchain {
	const EXECUTABLE: &'static str = "counting-compiler";

	fn load (_: Tool) -> Result<Self, LoadError> {
		LOADS.fetch_add(1, Ordering::SeqCst);
		Ok(Self)
	}
}
static COUNTING_TOOLCHAINS: ToolchainRegistry<CountingToolchain> = ToolchainRegistry::new();

const PIXEL_SHADER: &str = "\
#include \"factor.h\"
cbuffer CB1 { float4 Factor; };
float4 main () : SV_Target { return Factor * SCALE; }
";



//////
//
// Tests
//

#[test]
fn test_ToolchainRegistry_shares_and_releases()
{
	let dir = tempfile::tempdir().unwrap();
	let executable = dir.path().join("counting-compiler");
	std::fs::write(&executable, b"").unwrap();

	let first = LazyToolchain::new(&COUNTING_TOOLCHAINS, Some(executable.clone()));
	let second = LazyToolchain::new(&COUNTING_TOOLCHAINS, Some(executable.clone()));
	assert!(!first.isLoaded());
	assert!(!COUNTING_TOOLCHAINS.isLoaded(&executable));

	let loadsBefore = LOADS.load(Ordering::SeqCst);
	let a = first.get().unwrap().clone();
	let b = second.get().unwrap().clone();
	assert!(Arc::ptr_eq(&a, &b));
	assert!(first.isLoaded());
	assert_eq!(LOADS.load(Ordering::SeqCst), loadsBefore+1);

	// Once every owner is gone the toolchain is released and loaded afresh on next use
	drop((a, b, first, second));
	assert!(!COUNTING_TOOLCHAINS.isLoaded(&executable));
	let third = LazyToolchain::new(&COUNTING_TOOLCHAINS, Some(executable));
	third.get().unwrap();
	assert_eq!(LOADS.load(Ordering::SeqCst), loadsBefore+2);
}

#[test]
fn test_LazyToolchain_missing_executable()
{
	let dir = tempfile::tempdir().unwrap();
	let lazy = LazyToolchain::new(&COUNTING_TOOLCHAINS, Some(dir.path().join("nope")));
	assert_eq!(lazy.get().unwrap_err(), LoadError::NotFound { tool: "counting-compiler" });
	assert!(!lazy.isLoaded());
}

#[test]
fn test_clampVersion()
{
	let (min, max) = (ShaderVersion::new(6, 0), ShaderVersion::new(6, 6));
	assert_eq!(clampVersion(ShaderVersion::new(6, 3), min, max, "shader model"), ShaderVersion::new(6, 3));
	assert_eq!(clampVersion(ShaderVersion::new(5, 1), min, max, "shader model"), min);
	assert_eq!(clampVersion(ShaderVersion::new(6, 8), min, max, "shader model"), max);
	assert_eq!(clampVersion(ShaderVersion::new(7, 0), min, max, "shader model"), max);
}

#[test]
fn test_combineLogAndSource() {
	assert_eq!(combineLogAndSource("error X3000", "float4 x"), b"error X3000\0float4 x\0");
}

#[test]
fn test_dxc_versions()
{
	assert_eq!(dxc::parseDxcVersion("dxcompiler.dll: 1.7 - 1.7.2308.7 (69e54e290); dxil.dll: 1.7"),
		Some(ShaderVersion::new(1, 7)));
	assert_eq!(dxc::parseDxcVersion("libdxcompiler.so: 1.8(dev;4640-45018c75)"), Some(ShaderVersion::new(1, 8)));
	assert_eq!(dxc::parseDxcVersion("unknown option"), None);

	assert_eq!(dxc::maxShaderModelFor(Some(ShaderVersion::new(1, 4))), ShaderVersion::new(6, 4));
	assert_eq!(dxc::maxShaderModelFor(Some(ShaderVersion::new(1, 9))), ShaderVersion::new(6, 8));
	assert_eq!(dxc::maxShaderModelFor(Some(ShaderVersion::new(2, 0))), ShaderVersion::new(6, 8));
	assert_eq!(dxc::maxShaderModelFor(None), ShaderVersion::new(6, 0));

	assert_eq!(dxc::spirvTargetEnv(ShaderVersion::new(1, 0)), "vulkan1.0");
	assert_eq!(dxc::spirvTargetEnv(ShaderVersion::new(1, 3)), "vulkan1.1");
	assert_eq!(dxc::spirvTargetEnv(ShaderVersion::new(1, 4)), "vulkan1.1spirv1.4");
	assert_eq!(dxc::spirvTargetEnv(ShaderVersion::new(1, 5)), "vulkan1.2");
	assert_eq!(dxc::spirvTargetEnv(ShaderVersion::new(1, 6)), "vulkan1.3");
}

#[test]
fn test_dxc_isValidatorFailure()
{
	assert!(dxc::isValidatorFailure(
		"error: validation errors\nlit.hlsl:4:5: error: Instructions should not read uninitialized value.\n"
	));
	assert!(dxc::isValidatorFailure("warning: unused variable\nValidation failed.\n"));
	assert!(dxc::isValidatorFailure("  error: Validation failed\r\n"));

	// Compile errors in files whose names mention validation
	assert!(!dxc::isValidatorFailure("validation.hlsl:1:1: error: use of undeclared identifier 'foo'\n"));
	assert!(!dxc::isValidatorFailure("validation failed.hlsl:3:7: error: expected ';' after expression\n"));
	assert!(!dxc::isValidatorFailure("error: unknown argument: '-Vd-validation'"));
	assert!(!dxc::isValidatorFailure(""));
}

#[test]
fn test_dxc_buildArguments()
{
	let request = CompileRequest::hlsl(PIXEL_SHADER, "main", ShaderStage::Pixel)
		.withMacro("SCALE", "2").withMacro("FAST", "")
		.withFlags(CompileFlags::PACK_MATRIX_ROW_MAJOR | CompileFlags::ENABLE_16BIT_TYPES)
		.withSpirvVersion(ShaderVersion::new(1, 5));
	let extra = vec!["-O3".to_owned()];

	let spirv = dxc::buildArguments(
		&request, TargetBackend::SPIRV, ShaderVersion::new(6, 2), "in.hlsl", "out.bin", false, &extra
	);
	assert_eq!(spirv, [
		"-T", "ps_6_2", "-E", "main", "-I", ".", "-Fo", "out.bin", "-spirv", "-fspv-target-env=vulkan1.2", "-Zpr",
		"-enable-16bit-types", "-D", "SCALE=2", "-D", "FAST", "-O3", "in.hlsl"
	]);

	let request = CompileRequest::hlsl(PIXEL_SHADER, "csMain", ShaderStage::Compute).withFlags(CompileFlags::DEBUG_INFO);
	let dxil = dxc::buildArguments(&request, TargetBackend::DXIL, ShaderVersion::new(6, 6), "in.hlsl", "o", true, &[]);
	assert_eq!(dxil, [
		"-T", "cs_6_6", "-E", "csMain", "-I", ".", "-Fo", "o", "-Vd", "-Zi", "-Qembed_debug", "in.hlsl"
	]);
}

#[test]
fn test_glslang_versions()
{
	let probe = "Glslang Version: 11:14.0.0\nESSL Version: OpenGL ES GLSL 3.20 glslang Khronos. 14.0.0\n\
		SPIR-V Version 0x00010600, Revision 1\nGLSL.std.450 Version 100, Revision 1\n";
	assert_eq!(glslang::parseSpirvVersion(probe), Some(ShaderVersion::new(1, 6)));
	assert_eq!(glslang::parseSpirvVersion("SPIR-V Version 0x00010300, Revision 7"), Some(ShaderVersion::new(1, 3)));
	assert_eq!(glslang::parseSpirvVersion("Glslang Version: 7.11"), None);
}

#[test]
fn test_glslang_buildArguments()
{
	let request = CompileRequest::glsl("void main () {}", ShaderStage::Vertex).withMacro("N", "4");
	let args = glslang::buildArguments(&request, ShaderVersion::new(1, 3), "in.glsl", "out.spv", &[]);
	assert_eq!(args, [
		"-V", "-S", "vert", "-e", "main", "--target-env", "spirv1.3", "-I.", "-DN=4", "-o", "out.spv", "in.glsl"
	]);

	let request = CompileRequest::glsl("void main () {}", ShaderStage::Pixel);
	let request = CompileRequest { entryPoint: "fragMain".into(), ..request };
	let args = glslang::buildArguments(&request, ShaderVersion::new(1, 0), "in.glsl", "out.spv", &[]);
	assert!(args.windows(2).any(|pair| pair == ["--source-entrypoint", "main"]));
	assert!(args.windows(2).any(|pair| pair == ["-e", "fragMain"]));

	let request = CompileRequest::hlsl("", "main", ShaderStage::Hull)
		.withFlags(CompileFlags::DEBUG_INFO | CompileFlags::ENABLE_16BIT_TYPES).withCombinedTextureSamplers("_sampler")
		.withMacro("FLAG", "");
	let args = glslang::buildArguments(&request, ShaderVersion::new(1, 5), "in.hlsl", "out.spv", &["--quiet".to_owned()]);
	assert_eq!(args, [
		"-V", "-D", "-S", "tesc", "-e", "main", "--target-env", "spirv1.5", "-I.", "-DFLAG", "-g",
		"--hlsl-enable-16bit-types", "--auto-sampled-textures", "--quiet", "-o", "out.spv", "in.hlsl"
	]);
}

#[test]
fn test_glslPreamble()
{
	assert_eq!(glslang::glslPreamble("void main () {}", false), "#version 450\nvoid main () {}");
	assert_eq!(
		glslang::glslPreamble("#version 460\n#include \"a.h\"\n", true),
		"#version 460\n#extension GL_GOOGLE_include_directive : enable\n#include \"a.h\"\n"
	);
	assert_eq!(
		glslang::glslPreamble("#include \"a.h\"", true),
		"#version 450\n#extension GL_GOOGLE_include_directive : enable\n#include \"a.h\""
	);
	assert_eq!(glslang::glslPreamble("  # version 310 es", false), "  # version 310 es");
}

#[test]
fn test_PreparedSource()
{
	let factory = MemoryStreamFactory::new()
		.withFile("shaders/lit.hlsl", PIXEL_SHADER)
		.withFile("factor.h", "#define SCALE 2");
	let fallback = MemoryStreamFactory::new();

	let request = CompileRequest::fromFile(SourceLanguage::HLSL, "shaders/lit.hlsl", "main", ShaderStage::Pixel)
		.withStreamFactory(&factory);
	let prepared = PreparedSource::fromRequest(&request, &fallback).unwrap();
	assert_eq!(prepared.rootName, "lit.hlsl");
	assert_eq!(prepared.text, PIXEL_SHADER);
	assert_eq!(prepared.includes.identities(), vec!["factor.h"]);
	assert!(prepared.missing.is_empty());

	// Inline sources fall back to the given factory for includes
	let request = CompileRequest::hlsl(PIXEL_SHADER, "main", ShaderStage::Pixel);
	let prepared = PreparedSource::fromRequest(&request, &fallback).unwrap();
	assert_eq!(prepared.rootName, "shader.hlsl");
	assert_eq!(prepared.missing.len(), 1);

	// The root name never shadows an include
	let colliding = MemoryStreamFactory::new().withFile("shader.glsl", "");
	let request = CompileRequest::glsl("#include \"shader.glsl\"", ShaderStage::Compute);
	assert_eq!(PreparedSource::fromRequest(&request, &colliding).unwrap().rootName, "_shader.glsl");

	let request = CompileRequest::fromFile(SourceLanguage::HLSL, "missing.hlsl", "main", ShaderStage::Pixel);
	assert_eq!(
		PreparedSource::fromRequest(&request, &fallback).unwrap_err(), CompileError::SourceNotFound("missing.hlsl".into())
	);
}

#[test]
fn test_Scratch_materializeIncludes()
{
	let factory = MemoryStreamFactory::new()
		.withFile("inc/a.h", "#include \"b.h\"")
		.withFile("b.h", "// b")
		.withFile("../outside.h", "// escapes");
	let scan = processIncludes(None, b"#include \"inc/a.h\"\n#include \"../outside.h\"", &factory);
	assert_eq!(scan.includes.len(), 3);

	let scratch = Scratch::new().unwrap();
	scratch.materializeIncludes(&scan.includes).unwrap();
	assert_eq!(scratch.read("inc/a.h").unwrap(), b"#include \"b.h\"");
	assert_eq!(scratch.read("b.h").unwrap(), b"// b");
	assert!(!scratch.path().parent().unwrap().join("outside.h").exists());
}

#[test]
fn test_dxc_compile_and_convert()
{
	let session = Session::default();
	if !session.isAvailable(CompilerKind::DXC) {
		return; // DXC not installed
	}
	let factory = MemoryStreamFactory::new().withFile("factor.h", "#define SCALE 2");
	let request = CompileRequest::hlsl(PIXEL_SHADER, "main", ShaderStage::Pixel).withStreamFactory(&factory);
	let module = session.compile(&request, TargetBackend::SPIRV).unwrap();
	assert!(util::looksLikeSpirv(&module.bytecode));
	let resources = module.resources.unwrap();
	assert!(resources.iter().any(|res| res.name == "CB1" && res.kind == ResourceKind::UniformBuffer));

	let words = util::bytesToWords(&module.bytecode).unwrap();
	let converted = crate::spirv::convertUniformBufferToPushConstant(&words, "CB1").unwrap();
	assert!(converted.isModified());
	let resources = crate::reflect::reflectSpirv(&converted.intoWords(&words)).unwrap();
	assert!(resources.iter().any(|res| res.name == "CB1" && res.kind == ResourceKind::PushConstant));
}

#[test]
fn test_dxc_compile_failure_carries_source()
{
	let session = Session::default();
	if !session.isAvailable(CompilerKind::DXC) {
		return; // DXC not installed
	}
	let source = "float4 main () : SV_Target { return undefinedThing; }";
	let request = CompileRequest::hlsl(source, "main", ShaderStage::Pixel);
	match session.compile(&request, TargetBackend::SPIRV) {
		Err(CompileError::Compilation { log, output }) => {
			assert!(log.contains("undefinedThing"));
			let parts: Vec<&[u8]> = output.split(|&b| b == 0).collect();
			assert_eq!(parts, vec![log.as_bytes(), source.as_bytes(), &b""[..]]);
		},
		other => panic!("expected a compilation error, got {other:?}")
	}
}

#[test]
fn test_glslang_compile_with_include()
{
	let session = Session::default();
	if !session.isAvailable(CompilerKind::Glslang) {
		return; // glslang not installed
	}
	let factory = MemoryStreamFactory::new().withFile("common.glsl", "const float SCALE = 2.0;");
	let source = "#version 450\n#include \"common.glsl\"\nlayout(location = 0) out vec4 color;\n\
		void main () { color = vec4(SCALE); }\n";
	let request = CompileRequest::glsl(source, ShaderStage::Pixel).withStreamFactory(&factory);
	let module = session.compile(&request, TargetBackend::SPIRV).unwrap();
	assert!(util::looksLikeSpirv(&module.bytecode));
	assert_eq!(module.resources, Some(vec![]));

	assert!(matches!(
		session.compile(&request, TargetBackend::DXIL),
		Err(CompileError::UnsupportedTarget { compiler: CompilerKind::Glslang, target: TargetBackend::DXIL })
	));
}
