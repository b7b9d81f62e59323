
//////
//
// Imports
//

// Standard library
use std::{path::PathBuf, sync::Arc};

// Local imports
use crate::*;
use crate::{
	compile::{*, loader::*, tool::*}, reflect::*, runenv::Environment,
	spirv::optimizer::{SpirvOptimizer, OptimizerPass}
};



//////
//
// Globals
//

/// The lowest *SPIR-V* version *glslang* can target.
pub(crate) const MIN_SPIRV_VERSION: ShaderVersion = ShaderVersion::new(1, 0);

/// The *SPIR-V* version assumed when the probe does not report one.
pub(crate) const DEFAULT_MAX_SPIRV_VERSION: ShaderVersion = ShaderVersion::new(1, 5);

/// The `#version` directive given to *GLSL* sources that lack one.
const DEFAULT_GLSL_VERSION: &str = "#version 450";

/// The extension *glslang* requires before it accepts `#include` in *GLSL*.
const INCLUDE_EXTENSION: &str = "#extension GL_GOOGLE_include_directive : enable";

/// The name of the file *glslang* writes its output to inside the scratch directory.
const OUTPUT_NAME: &str = "xshade.spv";

/// All *glslang* toolchains currently loaded in this process.
static TOOLCHAINS: ToolchainRegistry<GlslangToolchain> = ToolchainRegistry::new();



//////
//
// Structs
//

/// A loaded *glslang* reference compiler.
#[derive(Debug)]
pub struct GlslangToolchain {
	glslang: Tool,
	maxSpirvVersion: ShaderVersion
}
impl GlslangToolchain {
	/// The highest *SPIR-V* version this compiler can emit.
	#[inline(always)]
	pub fn maxSpirvVersion (&self) -> ShaderVersion {
		self.maxSpirvVersion
	}
}
impl Toolchain for GlslangToolchain
{
	const EXECUTABLE: &'static str = "glslangValidator";

	fn load (glslang: Tool) -> Result<Self, LoadError>
	{
		let probe = glslang.run(&["--version"], None).map_err(
			|err| LoadError::ProbeFailed { tool: Self::EXECUTABLE, reason: err.to_string() }
		)?;
		if !probe.success {
			return Err(LoadError::ProbeFailed { tool: Self::EXECUTABLE, reason: probe.combinedLog() });
		}
		let maxSpirvVersion = parseSpirvVersion(&probe.stdout).unwrap_or_else(|| {
			tracing::warn!("glslang did not report its SPIR-V version, assuming {DEFAULT_MAX_SPIRV_VERSION}");
			DEFAULT_MAX_SPIRV_VERSION
		});
		tracing::info!("Found glslang emitting up to SPIR-V {maxSpirvVersion} at `{}`", glslang.path().display());
		Ok(Self { glslang, maxSpirvVersion })
	}
}

/// The front end driving *glslang* for *GLSL* and *HLSL* sources. Only produces *SPIR-V*.
pub struct GlslangFrontEnd {
	toolchain: LazyToolchain<GlslangToolchain>,
	optimizerPath: Option<PathBuf>,
	legalizeHlsl: bool,
	extraArgs: Vec<String>
}
impl GlslangFrontEnd
{
	/// Create the front end for the tools and pass-through arguments configured in the given run environment. Nothing
	/// gets loaded yet.
	pub fn new (environment: &Environment) -> Self { Self {
		toolchain: LazyToolchain::new(&TOOLCHAINS, environment.tools.glslang.clone()),
		optimizerPath: environment.tools.spirvOpt.clone(),
		legalizeHlsl: environment.legalizeHlslViaGlslang,
		extraArgs: environment.glslangArgs.clone()
	}}

	/// Obtain the loaded toolchain, loading it on first use.
	pub fn toolchain (&self) -> Result<&Arc<GlslangToolchain>, LoadError> {
		self.toolchain.get()
	}

	/// Run the legalization passes over *SPIR-V* that *glslang* produced from *HLSL*.
	fn legalize (&self, bytecode: Vec<u8>) -> Result<Vec<u8>, CompileError>
	{
		let Some(optimizer) = SpirvOptimizer::locate(self.optimizerPath.as_deref()) else {
			tracing::warn!("`spirv-opt` not found, leaving HLSL-derived SPIR-V unlegalized");
			return Ok(bytecode);
		};
		let words = util::bytesToWords(&bytecode).ok_or_else(
			|| CompileError::Validation { log: "glslang produced a truncated SPIR-V module".into() }
		)?;
		let legalized = optimizer.run(&words, &[OptimizerPass::Legalization]).map_err(
			|err| CompileError::Validation { log: err.to_string() }
		)?;
		Ok(util::wordsToBytes(&legalized))
	}
}
impl FrontEnd for GlslangFrontEnd
{
	fn kind (&self) -> CompilerKind {
		CompilerKind::Glslang
	}

	fn isLoaded (&self) -> bool {
		self.toolchain.isLoaded()
	}

	fn maxVersion (&self) -> Result<ShaderVersion, LoadError> {
		Ok(self.toolchain.get()?.maxSpirvVersion)
	}

	fn supportsTarget (&self, target: TargetBackend) -> bool {
		target == TargetBackend::SPIRV
	}

	fn settings (&self) -> CompilerSettings<'_> {
		CompilerSettings { extraArgs: &self.extraArgs, legalizeHlsl: self.legalizeHlsl }
	}

	fn compile (&self, request: &CompileRequest, source: &PreparedSource, target: TargetBackend)
		-> Result<CompiledModule, CompileError>
	{
		if !self.supportsTarget(target) {
			return Err(CompileError::UnsupportedTarget { compiler: CompilerKind::Glslang, target });
		}
		let toolchain = self.toolchain.get().map_err(
			|reason| CompileError::FrontEndUnavailable { compiler: CompilerKind::Glslang, reason }
		)?;
		let spirvVersion = clampVersion(
			request.spirvVersion.unwrap_or(MIN_SPIRV_VERSION), MIN_SPIRV_VERSION, toolchain.maxSpirvVersion,
			"SPIR-V version"
		);
		let text = match request.language {
			SourceLanguage::GLSL => glslPreamble(&source.text, !source.includes.is_empty()),
			SourceLanguage::HLSL => source.text.clone()
		};

		// Stage the sources
		let scratch = Scratch::new()?;
		scratch.materializeIncludes(&source.includes)?;
		scratch.write(&source.rootName, &text)?;

		// Compile
		let args = buildArguments(request, spirvVersion, &source.rootName, OUTPUT_NAME, &self.extraArgs);
		tracing::debug!(
			"Compiling `{}` ({} stage, entry point `{}`) to SPIR-V {spirvVersion} with glslang", request.displayName(),
			request.stage, request.entryPoint
		);
		let output = toolchain.glslang.run(&args, Some(scratch.path()))?;

		// glslang echoes the input file name even when there is nothing to report
		let log = output.combinedLog().lines().filter(|line| line.trim() != source.rootName)
			.collect::<Vec<_>>().join("\n");
		if !output.success {
			return Err(CompileError::Compilation { output: combineLogAndSource(&log, &text), log });
		}
		let mut bytecode = scratch.read(OUTPUT_NAME)?;
		if request.language == SourceLanguage::HLSL && self.legalizeHlsl {
			bytecode = self.legalize(bytecode)?;
		}

		let resources = if request.flags.contains(CompileFlags::SKIP_REFLECTION) {
			None
		} else {
			Some(self.reflect(&bytecode, target)?)
		};
		Ok(CompiledModule { bytecode, log: (!log.is_empty()).then_some(log), resources })
	}

	fn reflect (&self, bytecode: &[u8], target: TargetBackend) -> Result<Vec<ShaderResourceDesc>, ReflectError>
	{
		if target != TargetBackend::SPIRV {
			return Err(ReflectError::UnsupportedTarget(target));
		}
		let words = util::bytesToWords(bytecode).ok_or_else(
			|| ReflectError::MalformedBytecode("length is not a multiple of 4".into())
		)?;
		reflectSpirv(&words)
	}
}



//////
//
// Functions
//

/// Extract the *SPIR-V* version from a `SPIR-V Version 0x0001MM00` line of `glslangValidator --version`.
pub(crate) fn parseSpirvVersion (text: &str) -> Option<ShaderVersion>
{
	const MARKER: &str = "SPIR-V Version 0x";
	let start = text.find(MARKER)? + MARKER.len();
	let hex: String = text[start..].chars().take_while(char::is_ascii_hexdigit).collect();
	let word = u32::from_str_radix(&hex, 16).ok()?;
	Some(ShaderVersion::new((word >> 16) & 0xff, (word >> 8) & 0xff))
}

/// Make a *GLSL* source acceptable to *glslang*: supply a `#version` directive if there is none, and enable the
/// include extension right after it if the source has includes.
pub(crate) fn glslPreamble (source: &str, hasIncludes: bool) -> String
{
	let isVersionLine = |line: &str| {
		line.trim_start().strip_prefix('#').is_some_and(|rest| rest.trim_start().starts_with("version"))
	};
	let mut output = String::with_capacity(source.len() + 64);
	let mut versionSeen = false;
	for line in source.split_inclusive('\n')
	{
		output.push_str(line);
		if !versionSeen && isVersionLine(line) {
			versionSeen = true;
			if hasIncludes {
				if !line.ends_with('\n') {
					output.push('\n');
				}
				output.push_str(INCLUDE_EXTENSION);
				output.push('\n');
			}
		}
	}
	if versionSeen {
		return output;
	}
	let mut prefixed = String::from(DEFAULT_GLSL_VERSION);
	prefixed.push('\n');
	if hasIncludes {
		prefixed.push_str(INCLUDE_EXTENSION);
		prefixed.push('\n');
	}
	prefixed + &output
}

/// The `-S` stage name of a stage.
fn stageName (stage: ShaderStage) -> &'static str {
	match stage {
		ShaderStage::Vertex => "vert",
		ShaderStage::Pixel => "frag",
		ShaderStage::Geometry => "geom",
		ShaderStage::Hull => "tesc",
		ShaderStage::Domain => "tese",
		ShaderStage::Compute => "comp",
		ShaderStage::Amplification => "task",
		ShaderStage::Mesh => "mesh"
	}
}

/// Build the *glslang* command line for a request.
pub(crate) fn buildArguments (
	request: &CompileRequest, spirvVersion: ShaderVersion, inputName: &str, outputName: &str, extraArgs: &[String]
) -> Vec<String>
{
	let isHlsl = request.language == SourceLanguage::HLSL;
	let mut args = vec!["-V".to_owned()];
	if isHlsl {
		args.push("-D".to_owned());
	}
	args.extend(["-S".to_owned(), stageName(request.stage).to_owned(), "-e".to_owned(), request.entryPoint.clone()]);
	if !isHlsl && request.entryPoint != "main" {
		args.extend(["--source-entrypoint".to_owned(), "main".to_owned()]);
	}
	args.extend([
		"--target-env".to_owned(), format!("spirv{}.{}", spirvVersion.major, spirvVersion.minor), "-I.".to_owned()
	]);
	for ShaderMacro { name, definition } in &request.macros {
		args.push(if definition.is_empty() { format!("-D{name}") } else { format!("-D{name}={definition}") });
	}
	if request.flags.contains(CompileFlags::DEBUG_INFO) {
		args.push("-g".to_owned());
	}
	if isHlsl && request.flags.contains(CompileFlags::ENABLE_16BIT_TYPES) {
		args.push("--hlsl-enable-16bit-types".to_owned());
	}
	if isHlsl && request.useCombinedTextureSamplers {
		args.push("--auto-sampled-textures".to_owned());
	}
	args.extend(extraArgs.iter().cloned());
	args.extend(["-o".to_owned(), outputName.to_owned(), inputName.to_owned()]);
	args
}
