
//////
//
// Imports
//

// Standard library
use std::fmt::{Debug, Formatter};

// Local imports
use crate::*;
use crate::preprocess::SourceStreamFactory;



//////
//
// Enums
//

/// Where the root source of a [`CompileRequest`] comes from.
#[derive(Debug,Clone,PartialEq,Eq)]
pub enum ShaderSource {
	/// The source text is given directly.
	Inline(String),

	/// The source is the file with the given identity, to be opened through a
	/// [`SourceStreamFactory`](preprocess::SourceStreamFactory).
	File(String)
}



//////
//
// Structs
//

/// A preprocessor macro definition handed to the compiler.
#[derive(Debug,Clone,PartialEq,Eq,Hash)]
pub struct ShaderMacro {
	pub name: String,
	pub definition: String
}
impl ShaderMacro {
	pub fn new (name: impl Into<String>, definition: impl Into<String>) -> Self {
		Self { name: name.into(), definition: definition.into() }
	}
}

/// Everything that determines the outcome of compiling one shader entry point.
///
/// Requests are assembled with the builder-style `with*` methods and not changed anymore afterwards. The optional
/// stream factory is borrowed from the caller for as long as the request lives; requests without one fall back to the
/// default factory of the [`Session`](crate::Session) they are compiled in.
#[derive(Clone)]
pub struct CompileRequest<'factory> {
	pub language: SourceLanguage,
	pub source: ShaderSource,
	pub entryPoint: String,
	pub stage: ShaderStage,

	/// Macro definitions in the order they should be defined.
	pub macros: Vec<ShaderMacro>,

	/// A human-readable name of the shader, used in logs.
	pub name: String,

	/// The *HLSL* shader model to target.
	pub hlslVersion: ShaderVersion,

	/// The *SPIR-V* version to target, or [`None`] for the front end's default.
	pub spirvVersion: Option<ShaderVersion>,

	pub compiler: CompilerKind,
	pub flags: CompileFlags,

	/// Whether textures and samplers are paired up by name into combined image samplers.
	pub useCombinedTextureSamplers: bool,

	/// The suffix that identifies the sampler belonging to a texture when combined samplers are used.
	pub combinedSamplerSuffix: String,

	pub streamFactory: Option<&'factory dyn SourceStreamFactory>
}
impl<'factory> CompileRequest<'factory>
{
	/// The default sampler suffix for combined texture samplers.
	pub const DEFAULT_SAMPLER_SUFFIX: &'static str = "_sampler";

	/// Create a request with default settings for the given source.
	pub fn new (
		language: SourceLanguage, source: ShaderSource, entryPoint: impl Into<String>, stage: ShaderStage
	) -> Self {
		let compiler = match language {
			SourceLanguage::HLSL => CompilerKind::DXC,
			SourceLanguage::GLSL => CompilerKind::Glslang
		};
		Self {
			language, source, entryPoint: entryPoint.into(), stage, macros: Vec::new(), name: String::new(),
			hlslVersion: ShaderVersion::new(6, 0), spirvVersion: None, compiler, flags: CompileFlags::empty(),
			useCombinedTextureSamplers: false, combinedSamplerSuffix: Self::DEFAULT_SAMPLER_SUFFIX.to_owned(),
			streamFactory: None
		}
	}

	/// Shorthand for an *HLSL* request with inline source.
	pub fn hlsl (source: impl Into<String>, entryPoint: impl Into<String>, stage: ShaderStage) -> Self {
		Self::new(SourceLanguage::HLSL, ShaderSource::Inline(source.into()), entryPoint, stage)
	}

	/// Shorthand for a *GLSL* request with inline source.
	pub fn glsl (source: impl Into<String>, stage: ShaderStage) -> Self {
		Self::new(SourceLanguage::GLSL, ShaderSource::Inline(source.into()), "main", stage)
	}

	/// Shorthand for a request whose source is a file.
	pub fn fromFile (
		language: SourceLanguage, identity: impl Into<String>, entryPoint: impl Into<String>, stage: ShaderStage
	) -> Self {
		Self::new(language, ShaderSource::File(identity.into()), entryPoint, stage)
	}

	pub fn withMacro (mut self, name: impl Into<String>, definition: impl Into<String>) -> Self {
		self.macros.push(ShaderMacro::new(name, definition));
		self
	}

	pub fn withName (mut self, name: impl Into<String>) -> Self {
		self.name = name.into();
		self
	}

	pub fn withHlslVersion (mut self, version: ShaderVersion) -> Self {
		self.hlslVersion = version;
		self
	}

	pub fn withSpirvVersion (mut self, version: ShaderVersion) -> Self {
		self.spirvVersion = Some(version);
		self
	}

	pub fn withCompiler (mut self, compiler: CompilerKind) -> Self {
		self.compiler = compiler;
		self
	}

	pub fn withFlags (mut self, flags: CompileFlags) -> Self {
		self.flags = flags;
		self
	}

	pub fn withCombinedTextureSamplers (mut self, suffix: impl Into<String>) -> Self {
		self.useCombinedTextureSamplers = true;
		self.combinedSamplerSuffix = suffix.into();
		self
	}

	pub fn withStreamFactory (mut self, factory: &'factory dyn SourceStreamFactory) -> Self {
		self.streamFactory = Some(factory);
		self
	}

	/// The identity of the source file, if the source stems from a file.
	pub fn filePath (&self) -> Option<&str> {
		match &self.source {
			ShaderSource::File(path) => Some(path),
			ShaderSource::Inline(_) => None
		}
	}

	/// A name suitable for log output: the declared name if any, the file path otherwise.
	pub fn displayName (&self) -> &str {
		if !self.name.is_empty() {
			&self.name
		}
		else {
			self.filePath().unwrap_or("<inline>")
		}
	}
}
impl Debug for CompileRequest<'_> {
	fn fmt (&self, f: &mut Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("CompileRequest")
			.field("language", &self.language)
			.field("source", &self.source)
			.field("entryPoint", &self.entryPoint)
			.field("stage", &self.stage)
			.field("macros", &self.macros)
			.field("name", &self.name)
			.field("hlslVersion", &self.hlslVersion)
			.field("spirvVersion", &self.spirvVersion)
			.field("compiler", &self.compiler)
			.field("flags", &self.flags)
			.field("useCombinedTextureSamplers", &self.useCombinedTextureSamplers)
			.field("combinedSamplerSuffix", &self.combinedSamplerSuffix)
			.field("streamFactory", &self.streamFactory.is_some())
			.finish()
	}
}
