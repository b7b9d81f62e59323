
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




//////
//
// Imports
//

// Standard library
use std::{fs, path::{Path, PathBuf}};

// Serde framework
use serde;
use serde_yaml_ng;



//////
//
// Structs
//

/// Explicit locations of the external tools that make up the shader toolchains. Any tool left unspecified is looked up
/// by its canonical executable name on the `PATH`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ToolPaths {
	/// The *DirectX Shader Compiler* driver (`dxc`).
	pub dxc: Option<PathBuf>,

	/// The *DXIL* validator which also signs validated containers (`dxv`).
	pub dxv: Option<PathBuf>,

	/// The *DXIL* assembler turning textual IR back into a container (`dxa`).
	pub dxa: Option<PathBuf>,

	/// The *glslang* reference front end (`glslangValidator`).
	pub glslang: Option<PathBuf>,

	/// The *SPIRV-Tools* optimizer (`spirv-opt`).
	pub spirvOpt: Option<PathBuf>,

	/// The *SPIRV-Tools* validator (`spirv-val`).
	pub spirvVal: Option<PathBuf>
}

/// A struct storing runtime environment information for the shader pipeline: where to look for shader sources, where to
/// find the compiler toolchains, and which extra arguments to hand them.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Environment {
	/// Array of directory paths to search for whenever shader files are given by a relative path.
	pub shaderPath: Vec<PathBuf>,

	/// Explicit tool locations.
	pub tools: ToolPaths,

	/// Arguments passed verbatim to every `dxc` invocation (e.g. `-Zpc`, `-O3`).
	pub dxcArgs: Vec<String>,

	/// Arguments passed verbatim to every `glslangValidator` invocation.
	pub glslangArgs: Vec<String>,

	/// Whether *HLSL* compiled through *glslang* should be run through the legalization passes afterwards.
	pub legalizeHlslViaGlslang: bool,

	/// File the bytecode cache of a session gets persisted to upon request.
	pub cacheFile: Option<PathBuf>
}
impl Default for Environment {
	fn default () -> Self { Self {
		shaderPath: Vec::new(), tools: ToolPaths::default(), dxcArgs: Vec::new(), glslangArgs: Vec::new(),
		legalizeHlslViaGlslang: true, cacheFile: None
	}}
}
impl Environment
{
	///
	pub fn serialize (&self) -> Vec<u8> {
		let mut bytes = Vec::new();
		serde_yaml_ng::to_writer(&mut bytes, self).expect(
			"INTERNAL LOGIC ERROR: failed to serialize an instance of xshade_runenv::Environment"
		);
		bytes
	}

	///
	pub fn serializeToFile (&self, filename: impl AsRef<Path>) -> anyhow::Result<()> {
		Ok(fs::write(filename, self.serialize())?)
	}

	///
	pub fn deserialize (bytes: impl AsRef<[u8]>) -> Result<Self, serde_yaml_ng::Error> {
		serde_yaml_ng::from_slice(bytes.as_ref())
	}

	/// Load the environment from the given *YAML* file.
	pub fn fromFile (filename: impl AsRef<Path>) -> anyhow::Result<Self> {
		Ok(Self::deserialize(fs::read(filename)?)?)
	}

	/// Load the environment from the given *YAML* file if it exists, falling back to the default environment if it
	/// doesn't. A file that exists but cannot be parsed is still an error.
	pub fn fromFileOrDefault (filename: impl AsRef<Path>) -> anyhow::Result<Self> {
		if filename.as_ref().exists() {
			Self::fromFile(filename)
		}
		else {
			Ok(Self::default())
		}
	}
}
