
//////
//
// Module definitions
//

/// Submodule implementing lazy, process-wide toolchain loading.
pub mod loader;
pub use loader::LoadError; // re-export

/// Submodule implementing external tool invocation and scratch directories.
pub(crate) mod tool;

/// Submodule implementing the *DirectX Shader Compiler* front end.
pub(crate) mod dxc;
pub use dxc::{DxcToolchain, DxcFrontEnd}; // re-export

/// Submodule implementing the *glslang* front end.
pub(crate) mod glslang;
pub use glslang::{GlslangToolchain, GlslangFrontEnd}; // re-export



//////
//
// Imports
//

// Standard library
use std::{error::Error, fmt::{Display, Formatter}};

// Local imports
use crate::*;
use crate::{preprocess::*, reflect::{ReflectError, ShaderResourceDesc}};



//////
//
// Errors
//

#[derive(Debug,Clone,PartialEq,Eq)]
pub enum CompileError {
	/// The root source file could not be opened.
	SourceNotFound(String),

	/// The requested front end could not be loaded.
	FrontEndUnavailable { compiler: CompilerKind, reason: LoadError },

	/// The front end cannot compile the request's source language.
	UnsupportedLanguage { compiler: CompilerKind, language: SourceLanguage },

	/// The front end cannot produce the requested bytecode kind.
	UnsupportedTarget { compiler: CompilerKind, target: TargetBackend },

	/// The compiler rejected the source. `output` holds the log and the source text that was compiled, each followed
	/// by a NUL byte, so that the failure can be reproduced from it alone.
	Compilation { log: String, output: Vec<u8> },

	/// The bytecode was produced but did not pass validation or signing.
	Validation { log: String },

	/// Resource reflection over the produced bytecode failed.
	Reflection(ReflectError),

	/// Interacting with the scratch directory or spawning a tool failed.
	Io(String)
}
impl Display for CompileError {
	fn fmt (&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
		let desc = match self {
			Self::SourceNotFound(identity) => format!("source `{identity}` not found"),
			Self::FrontEndUnavailable { compiler, reason } => format!("{compiler} unavailable: {reason}"),
			Self::UnsupportedLanguage { compiler, language } => format!("{compiler} cannot compile {language}"),
			Self::UnsupportedTarget { compiler, target } => format!("{compiler} cannot produce {target}"),
			Self::Compilation { log, .. } => format!("compilation failed:\n{log}"),
			Self::Validation { log } => format!("validation failed:\n{log}"),
			Self::Reflection(err) => format!("reflection failed: {err}"),
			Self::Io(reason) => format!("I/O error: {reason}")
		};
		write!(formatter, "CompileError[{desc}]")
	}
}
impl Error for CompileError {}
impl From<std::io::Error> for CompileError {
	fn from (err: std::io::Error) -> Self {
		Self::Io(err.to_string())
	}
}
impl From<ReflectError> for CompileError {
	fn from (err: ReflectError) -> Self {
		Self::Reflection(err)
	}
}



//////
//
// Traits
//

/// The interface of a compiler front end.
pub trait FrontEnd: Send+Sync
{
	/// Which compiler this front end drives.
	fn kind (&self) -> CompilerKind;

	/// Report whether the underlying toolchain has been loaded successfully. Never triggers loading.
	fn isLoaded (&self) -> bool;

	/// The highest target version the front end supports: the shader model for *DXC*, the *SPIR-V* version for
	/// *glslang*. Loads the toolchain if needed.
	fn maxVersion (&self) -> Result<ShaderVersion, LoadError>;

	/// Report whether the front end can produce bytecode for the given backend.
	fn supportsTarget (&self, target: TargetBackend) -> bool;

	/// The configuration of the front end that affects its output independently of the request.
	fn settings (&self) -> CompilerSettings<'_>;

	/// Compile a prepared request to the given backend.
	fn compile (&self, request: &CompileRequest, source: &PreparedSource, target: TargetBackend)
		-> Result<CompiledModule, CompileError>;

	/// Recover the resource bindings of already compiled bytecode.
	fn reflect (&self, bytecode: &[u8], target: TargetBackend) -> Result<Vec<ShaderResourceDesc>, ReflectError>;
}



//////
//
// Structs
//

/// Front-end configuration that shapes the produced bytecode beyond what the request says.
#[derive(Debug,Clone,Copy,Default,PartialEq,Eq)]
pub struct CompilerSettings<'args> {
	/// Arguments passed verbatim to every compiler invocation.
	pub extraArgs: &'args [String],

	/// Whether *SPIR-V* compiled from *HLSL* is run through the legalization passes afterwards.
	pub legalizeHlsl: bool
}

/// The result of a successful compilation.
#[derive(Debug,Clone,Default)]
pub struct CompiledModule {
	/// The *SPIR-V* words (in native byte order) or the signed *DXIL* container.
	pub bytecode: Vec<u8>,

	/// The compiler's diagnostic output, if it had any.
	pub log: Option<String>,

	/// The reflected resources, unless reflection was skipped.
	pub resources: Option<Vec<ShaderResourceDesc>>
}

/// The root source of a request together with everything it includes.
#[derive(Debug,Clone)]
pub struct PreparedSource {
	/// The file name the root source is handed to the compiler as.
	pub rootName: String,

	/// The root source text.
	pub text: String,

	/// All resolved transitive includes.
	pub includes: IncludeSet,

	/// Includes that could not be resolved.
	pub missing: Vec<PreprocessError>
}
impl PreparedSource
{
	/// Resolve the root source of a request and walk its includes. The request's own stream factory takes precedence
	/// over the given fallback.
	pub fn fromRequest (request: &CompileRequest, fallbackFactory: &dyn SourceStreamFactory)
		-> Result<Self, CompileError>
	{
		let factory = request.streamFactory.unwrap_or(fallbackFactory);
		let text = match &request.source {
			ShaderSource::Inline(text) => text.clone(),
			ShaderSource::File(identity) => {
				let bytes = factory.openStream(identity).ok_or_else(
					|| CompileError::SourceNotFound(identity.clone())
				)?;
				String::from_utf8(bytes).map_err(
					|_| CompileError::Io(format!("source `{identity}` is not valid UTF-8"))
				)?
			}
		};
		let scan = processIncludes(request.filePath(), text.as_bytes(), factory);
		let rootName = Self::rootNameFor(request, &scan.includes);
		Ok(Self { rootName, text, includes: scan.includes, missing: scan.missing })
	}

	/// Pick a flat file name for the root source that does not collide with any include.
	fn rootNameFor (request: &CompileRequest, includes: &IncludeSet) -> String
	{
		let stem: String = match request.filePath() {
			Some(path) => path.rsplit(['/', '\\']).next().unwrap_or(path).to_owned(),
			None => format!("shader.{}", request.language.extension())
		};
		let stem: String = stem.chars().map(
			|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') { c } else { '_' }
		).collect();
		let mut name = if stem.is_empty() { format!("shader.{}", request.language.extension()) } else { stem };
		while includes.contains(&name) {
			name.insert(0, '_');
		}
		name
	}
}



//////
//
// Functions
//

/// Package a compiler log and the source text that produced it into one buffer: log, NUL, source, NUL.
pub fn combineLogAndSource (log: &str, source: &str) -> Vec<u8>
{
	let mut output = Vec::with_capacity(log.len() + source.len() + 2);
	output.extend_from_slice(log.as_bytes());
	output.push(0);
	output.extend_from_slice(source.as_bytes());
	output.push(0);
	output
}

/// Clamp a requested version into the supported range, warning if it had to be changed.
pub fn clampVersion (requested: ShaderVersion, min: ShaderVersion, max: ShaderVersion, what: &str) -> ShaderVersion
{
	let clamped = requested.clamp(min, max.max(min));
	if clamped != requested {
		tracing::warn!("Requested {what} {requested} is unsupported, using {clamped} instead");
	}
	clamped
}
