
//////
//
// Imports
//

// Standard library
use std::{path::PathBuf, sync::Arc};

// Local imports
use crate::*;
use crate::{
	compile::{*, loader::*, tool::*}, dxil::{DxilToolchain, PatchError}, reflect::*, runenv::Environment
};



//////
//
// Globals
//

/// The lowest shader model *DXC* can target.
pub(crate) const MIN_SHADER_MODEL: ShaderVersion = ShaderVersion::new(6, 0);

/// The highest shader model any *DXC* release is known to support.
pub(crate) const MAX_SHADER_MODEL: ShaderVersion = ShaderVersion::new(6, 8);

/// The highest *SPIR-V* version *DXC* can be told to target.
const MAX_SPIRV_VERSION: ShaderVersion = ShaderVersion::new(1, 6);

/// The name of the file *DXC* writes its output to inside the scratch directory.
const OUTPUT_NAME: &str = "xshade.out";

/// All *DXC* toolchains currently loaded in this process.
static TOOLCHAINS: ToolchainRegistry<DxcToolchain> = ToolchainRegistry::new();



//////
//
// Structs
//

/// A loaded *DirectX Shader Compiler*.
#[derive(Debug)]
pub struct DxcToolchain {
	dxc: Tool,
	version: Option<ShaderVersion>,
	maxShaderModel: ShaderVersion
}
impl DxcToolchain
{
	/// The version of the compiler itself, if it could be determined.
	#[inline(always)]
	pub fn version (&self) -> Option<ShaderVersion> {
		self.version
	}

	/// The highest shader model this compiler supports.
	#[inline(always)]
	pub fn maxShaderModel (&self) -> ShaderVersion {
		self.maxShaderModel
	}
}
impl Toolchain for DxcToolchain
{
	const EXECUTABLE: &'static str = "dxc";

	fn load (dxc: Tool) -> Result<Self, LoadError>
	{
		let probe = dxc.run(&["--version"], None).map_err(
			|err| LoadError::ProbeFailed { tool: Self::EXECUTABLE, reason: err.to_string() }
		)?;
		let version = parseDxcVersion(&probe.combinedLog());
		match version {
			Some(version) => tracing::info!("Found DXC {version} at `{}`", dxc.path().display()),
			None => tracing::warn!(
				"Could not determine the version of `{}`, assuming shader model {MIN_SHADER_MODEL} only",
				dxc.path().display()
			)
		}
		Ok(Self { dxc, version, maxShaderModel: maxShaderModelFor(version) })
	}
}

/// The front end driving the *DirectX Shader Compiler* for *HLSL* sources.
///
/// Besides the compiler itself, it makes use of the *DXIL* validator `dxv` (to validate and sign *DXIL* output) and the
/// *DXIL* assembler `dxa` (to rebuild patched *DXIL*), both of which are optional.
pub struct DxcFrontEnd {
	toolchain: LazyToolchain<DxcToolchain>,
	validatorPath: Option<PathBuf>,
	assemblerPath: Option<PathBuf>,
	extraArgs: Vec<String>
}
impl DxcFrontEnd
{
	/// Create the front end for the tools and pass-through arguments configured in the given run environment. Nothing
	/// gets loaded yet.
	pub fn new (environment: &Environment) -> Self { Self {
		toolchain: LazyToolchain::new(&TOOLCHAINS, environment.tools.dxc.clone()),
		validatorPath: environment.tools.dxv.clone(),
		assemblerPath: environment.tools.dxa.clone(),
		extraArgs: environment.dxcArgs.clone()
	}}

	/// Obtain the loaded toolchain, loading it on first use.
	pub fn toolchain (&self) -> Result<&Arc<DxcToolchain>, LoadError> {
		self.toolchain.get()
	}

	fn validator (&self) -> Option<Tool> {
		Tool::locate("dxv", self.validatorPath.as_deref())
	}

	fn assembler (&self) -> Option<Tool> {
		Tool::locate("dxa", self.assemblerPath.as_deref())
	}

	fn loadedToolchain (&self) -> Result<&Arc<DxcToolchain>, CompileError> {
		self.toolchain.get().map_err(|reason| CompileError::FrontEndUnavailable { compiler: CompilerKind::DXC, reason })
	}
}
impl FrontEnd for DxcFrontEnd
{
	fn kind (&self) -> CompilerKind {
		CompilerKind::DXC
	}

	fn isLoaded (&self) -> bool {
		self.toolchain.isLoaded()
	}

	fn maxVersion (&self) -> Result<ShaderVersion, LoadError> {
		Ok(self.toolchain.get()?.maxShaderModel)
	}

	fn supportsTarget (&self, _: TargetBackend) -> bool {
		true
	}

	fn settings (&self) -> CompilerSettings<'_> {
		CompilerSettings { extraArgs: &self.extraArgs, legalizeHlsl: false }
	}

	fn compile (&self, request: &CompileRequest, source: &PreparedSource, target: TargetBackend)
		-> Result<CompiledModule, CompileError>
	{
		if request.language != SourceLanguage::HLSL {
			return Err(CompileError::UnsupportedLanguage { compiler: CompilerKind::DXC, language: request.language });
		}
		let toolchain = self.loadedToolchain()?;
		let shaderModel = clampVersion(request.hlslVersion, MIN_SHADER_MODEL, toolchain.maxShaderModel, "shader model");
		let validator = if target == TargetBackend::DXIL { self.validator() } else { None };

		// Stage the sources
		let scratch = Scratch::new()?;
		scratch.materializeIncludes(&source.includes)?;
		scratch.write(&source.rootName, &source.text)?;

		// Compile
		let args = buildArguments(
			request, target, shaderModel, &source.rootName, OUTPUT_NAME, validator.is_some(), &self.extraArgs
		);
		tracing::debug!(
			"Compiling `{}` ({} stage, entry point `{}`) to {target} with DXC", request.displayName(), request.stage,
			request.entryPoint
		);
		let output = toolchain.dxc.run(&args, Some(scratch.path()))?;
		let log = output.combinedLog();
		if !output.success
		{
			// Without an external validator, DXC validates internally and fails the whole compile
			if target == TargetBackend::DXIL && validator.is_none() && isValidatorFailure(&log) {
				return Err(CompileError::Validation { log });
			}
			return Err(CompileError::Compilation { output: combineLogAndSource(&log, &source.text), log });
		}
		let mut bytecode = scratch.read(OUTPUT_NAME)?;

		// Validate and sign
		if let Some(validator) = validator {
			bytecode = runValidator(&validator, &bytecode).map_err(|log| CompileError::Validation { log })?;
		}

		// Reflect
		let resources = if request.flags.contains(CompileFlags::SKIP_REFLECTION) {
			None
		} else {
			Some(self.reflect(&bytecode, target)?)
		};
		Ok(CompiledModule { bytecode, log: (!log.is_empty()).then_some(log), resources })
	}

	fn reflect (&self, bytecode: &[u8], target: TargetBackend) -> Result<Vec<ShaderResourceDesc>, ReflectError>
	{
		match target {
			TargetBackend::SPIRV => {
				let words = util::bytesToWords(bytecode).ok_or_else(
					|| ReflectError::MalformedBytecode("length is not a multiple of 4".into())
				)?;
				reflectSpirv(&words)
			},
			TargetBackend::DXIL => {
				let disassembly = self.disassemble(bytecode).map_err(|err| ReflectError::Toolchain(err.to_string()))?;
				parseResourceTable(&disassembly)
			}
		}
	}
}
impl DxilToolchain for DxcFrontEnd
{
	fn disassemble (&self, bytecode: &[u8]) -> Result<String, PatchError>
	{
		let toolchain = self.toolchain.get().map_err(|err| PatchError::Toolchain(err.to_string()))?;
		let scratch = Scratch::new().map_err(|err| PatchError::Toolchain(err.to_string()))?;
		scratch.write("input.dxil", bytecode).map_err(|err| PatchError::Toolchain(err.to_string()))?;
		let output = toolchain.dxc.run(&["-dumpbin", "input.dxil"], Some(scratch.path()))
			.map_err(|err| PatchError::Toolchain(err.to_string()))?;
		if !output.success {
			return Err(PatchError::Disassembly(output.combinedLog()));
		}
		Ok(output.stdout)
	}

	fn assemble (&self, text: &str) -> Result<Vec<u8>, PatchError>
	{
		let assembler = self.assembler().ok_or_else(|| PatchError::Toolchain("`dxa` not found".into()))?;
		let scratch = Scratch::new().map_err(|err| PatchError::Toolchain(err.to_string()))?;
		scratch.write("input.ll", text).map_err(|err| PatchError::Toolchain(err.to_string()))?;
		let output = assembler.run(&["input.ll", "-o", "output.dxil"], Some(scratch.path()))
			.map_err(|err| PatchError::Toolchain(err.to_string()))?;
		if !output.success {
			return Err(PatchError::Assembly(output.combinedLog()));
		}
		scratch.read("output.dxil").map_err(|err| PatchError::Assembly(err.to_string()))
	}

	fn validateAndSign (&self, bytecode: &[u8]) -> Result<Vec<u8>, PatchError> {
		let validator = self.validator().ok_or_else(|| PatchError::Toolchain("`dxv` not found".into()))?;
		runValidator(&validator, bytecode).map_err(PatchError::Validation)
	}
}



//////
//
// Functions
//

/// Extract the first `major.minor` pair from the output of `dxc --version`.
pub(crate) fn parseDxcVersion (text: &str) -> Option<ShaderVersion> {
	text.split(|c: char| !(c.is_ascii_digit() || c == '.')).find_map(|token| {
		let mut parts = token.split('.');
		let major = parts.next()?.parse().ok()?;
		let minor = parts.next()?.parse().ok()?;
		Some(ShaderVersion::new(major, minor))
	})
}

/// The highest shader model supported by the given compiler version. *DXC* 1.x supports shader model 6.x.
/// Whether a failed DXC run was rejected by its built-in validator rather than by the front end.
///
/// Only the summary lines the validator emits count. Diagnostics merely mentioning the word, for example in a file
/// name, do not.
pub(crate) fn isValidatorFailure (log: &str) -> bool {
	log.lines().any(|line| {
		let line = line.trim().trim_end_matches('.').to_ascii_lowercase();
		matches!(line.as_str(), "error: validation errors" | "validation failed" | "error: validation failed")
	})
}

pub(crate) fn maxShaderModelFor (dxcVersion: Option<ShaderVersion>) -> ShaderVersion {
	match dxcVersion {
		Some(version) if version.major > 1 => MAX_SHADER_MODEL,
		Some(version) if version.major == 1 => ShaderVersion::new(6, version.minor.min(MAX_SHADER_MODEL.minor)),
		_ => MIN_SHADER_MODEL
	}
}

/// The value of `-fspv-target-env` that yields (at least) the given *SPIR-V* version.
pub(crate) fn spirvTargetEnv (version: ShaderVersion) -> &'static str {
	match (version.major, version.minor) {
		(0, _) | (1, 0) => "vulkan1.0",
		(1, 1..=3) => "vulkan1.1",
		(1, 4) => "vulkan1.1spirv1.4",
		(1, 5) => "vulkan1.2",
		_ => "vulkan1.3"
	}
}

/// The target profile prefix for a stage.
fn profilePrefix (stage: ShaderStage) -> &'static str {
	match stage {
		ShaderStage::Vertex => "vs",
		ShaderStage::Pixel => "ps",
		ShaderStage::Geometry => "gs",
		ShaderStage::Hull => "hs",
		ShaderStage::Domain => "ds",
		ShaderStage::Compute => "cs",
		ShaderStage::Amplification => "as",
		ShaderStage::Mesh => "ms"
	}
}

/// Build the *DXC* command line for a request.
///
/// # Arguments
///
/// * `shaderModel` – The already clamped shader model to target.
/// * `inputName` – The root source file, relative to the working directory.
/// * `outputName` – Where to write the bytecode, relative to the working directory.
/// * `externalValidation` – Whether *DXIL* output will be validated by a separate `dxv` run, in which case internal
///   validation is disabled.
/// * `extraArgs` – Pass-through arguments, placed right before the input file.
pub(crate) fn buildArguments (
	request: &CompileRequest, target: TargetBackend, shaderModel: ShaderVersion, inputName: &str, outputName: &str,
	externalValidation: bool, extraArgs: &[String]
) -> Vec<String>
{
	let mut args = vec![
		"-T".to_owned(), format!("{}_{}_{}", profilePrefix(request.stage), shaderModel.major, shaderModel.minor),
		"-E".to_owned(), request.entryPoint.clone(),
		"-I".to_owned(), ".".to_owned(),
		"-Fo".to_owned(), outputName.to_owned()
	];
	match target
	{
		TargetBackend::SPIRV => {
			let spirvVersion = clampVersion(
				request.spirvVersion.unwrap_or(ShaderVersion::new(1, 0)), ShaderVersion::new(1, 0), MAX_SPIRV_VERSION,
				"SPIR-V version"
			);
			args.push("-spirv".to_owned());
			args.push(format!("-fspv-target-env={}", spirvTargetEnv(spirvVersion)));
		},
		TargetBackend::DXIL => if externalValidation {
			args.push("-Vd".to_owned());
		}
	}
	if request.flags.contains(CompileFlags::PACK_MATRIX_ROW_MAJOR) {
		args.push("-Zpr".to_owned());
	}
	if request.flags.contains(CompileFlags::DEBUG_INFO) {
		args.push("-Zi".to_owned());
		if target == TargetBackend::DXIL {
			args.push("-Qembed_debug".to_owned());
		}
	}
	if request.flags.contains(CompileFlags::ENABLE_16BIT_TYPES) {
		args.push("-enable-16bit-types".to_owned());
	}
	for ShaderMacro { name, definition } in &request.macros {
		args.push("-D".to_owned());
		args.push(if definition.is_empty() { name.clone() } else { format!("{name}={definition}") });
	}
	args.extend(extraArgs.iter().cloned());
	args.push(inputName.to_owned());
	args
}

/// Validate and sign a *DXIL* container with `dxv`, returning the signed container or the validator's log.
fn runValidator (validator: &Tool, bytecode: &[u8]) -> Result<Vec<u8>, String>
{
	let scratch = Scratch::new().map_err(|err| err.to_string())?;
	scratch.write("unsigned.dxil", bytecode).map_err(|err| err.to_string())?;
	let output = validator.run(&["unsigned.dxil", "-o", "signed.dxil"], Some(scratch.path()))
		.map_err(|err| err.to_string())?;
	if !output.success {
		return Err(output.combinedLog());
	}
	scratch.read("signed.dxil").map_err(|err| err.to_string())
}
