
//////
//
// Imports
//

// Standard library
use std::{path::Path, collections::BTreeMap, fmt::{Display, Formatter}};

// Anyhow library
use anyhow;

// Bitcode library
use bitcode;

// Local imports
use crate::*;
use crate::{compile::CompiledModule, reflect::ShaderResourceDesc};



//////
//
// Structs
//

/// The bytecode stored for one entry point, together with the resources it binds.
#[derive(Debug,Clone,bitcode::Encode,bitcode::Decode)]
struct StoredModule {
	bytecode: Vec<u8>,
	resources: Vec<ShaderResourceDesc>
}



//////
//
// Errors
//

/// Requested an entry point that a [`Program`] does not contain. `None` stands for the whole-module code.
#[derive(Debug)]
pub struct InvalidEntryPointError {
	entryPoint: Option<String>
}
impl Display for InvalidEntryPointError {
	fn fmt (&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
		match &self.entryPoint {
			Some(name) => write!(formatter, "InvalidEntryPointError[no entry point `{name}`]"),
			None => write!(formatter, "InvalidEntryPointError[no whole-module code]")
		}
	}
}
impl std::error::Error for InvalidEntryPointError {}

/// Requested a [target backend](TargetBackend) that a [`Package`] holds no program for.
#[derive(Debug)]
pub struct InvalidTargetError {
	target: TargetBackend
}
impl Display for InvalidTargetError {
	fn fmt (&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
		write!(formatter, "InvalidTargetError[no {} program]", self.target)
	}
}
impl std::error::Error for InvalidTargetError {}



//////
//
// Classes
//

/// The bytecode of one shader for a single backend, with one module per entry point. The entry point `None` denotes
/// a module that contains all entry points at once.
#[derive(Debug,Clone,Default,bitcode::Encode,bitcode::Decode)]
pub struct Program {
	modules: BTreeMap<Option<String>, StoredModule>
}
impl Program
{
	/// A program holding the code of a single entry point, without resource information.
	pub fn fromSingleEntryPoint (entryPoint: Option<String>, bytecode: Vec<u8>) -> Self {
		let mut program = Self::default();
		program.modules.insert(entryPoint, StoredModule { bytecode, resources: Vec::new() });
		program
	}

	/// A program holding one module that contains every entry point.
	#[inline]
	pub fn generic (bytecode: Vec<u8>) -> Self {
		Self::fromSingleEntryPoint(None, bytecode)
	}

	/// Store the code of an entry point, replacing earlier code for the same entry point.
	pub fn addEntryPoint (&mut self, entryPoint: Option<&str>, bytecode: Vec<u8>) {
		self.modules.insert(entryPoint.map(str::to_owned), StoredModule { bytecode, resources: Vec::new() });
	}

	/// Store a compiled module under an entry point, keeping its reflected resources if there are any.
	pub fn addCompiledModule (&mut self, entryPoint: Option<&str>, module: CompiledModule) {
		self.modules.insert(entryPoint.map(str::to_owned), StoredModule {
			bytecode: module.bytecode, resources: module.resources.unwrap_or_default()
		});
	}

	/// The names of all contained entry points.
	pub fn entryPointNames (&self) -> impl Iterator<Item=Option<&str>> {
		self.modules.keys().map(Option::as_deref)
	}

	fn module (&self, entryPoint: Option<&str>) -> Result<&StoredModule, InvalidEntryPointError> {
		self.modules.iter().find(|(name, _)| name.as_deref() == entryPoint).map(|(_, module)| module).ok_or_else(
			|| InvalidEntryPointError { entryPoint: entryPoint.map(str::to_owned) }
		)
	}

	pub fn code (&self, entryPoint: Option<&str>) -> Result<&[u8], InvalidEntryPointError> {
		Ok(self.module(entryPoint)?.bytecode.as_slice())
	}

	/// The resources the code of an entry point binds. Empty if none were recorded.
	pub fn resources (&self, entryPoint: Option<&str>) -> Result<&[ShaderResourceDesc], InvalidEntryPointError> {
		Ok(self.module(entryPoint)?.resources.as_slice())
	}
}

/// A bundle of the bytecode of one shader compiled for one or more [backends](TargetBackend), ready to be stored and
/// shipped as a single file.
#[derive(Debug,Clone,Default,bitcode::Encode,bitcode::Decode)]
pub struct Package {
	instances: BTreeMap<TargetBackend, Program>,
}
impl Package
{
	pub fn new () -> Self {
		Self::default()
	}

	/// Deserialize from the given bytes.
	pub fn deserialize (bytes: &[u8]) -> anyhow::Result<Self> {
		Ok(bitcode::decode(bytes)?)
	}

	/// Load a package written by [`writeToFile`](Self::writeToFile).
	pub fn fromFile (filename: impl AsRef<Path>) -> anyhow::Result<Self> {
		Self::deserialize(&std::fs::read(filename)?)
	}

	/// Create a package with a single instance.
	pub fn withSingleInstance (target: TargetBackend, program: Program) -> Self {
		Self { instances: BTreeMap::from([(target, program)]) }
	}

	/// Add the program instance for the given backend to the package. An existing instance for that backend is
	/// replaced.
	pub fn addInstance (&mut self, target: TargetBackend, program: Program) {
		self.instances.insert(target, program);
	}

	/// The program instance for the given backend, if the package contains one.
	pub fn instance (&self, target: TargetBackend) -> Option<&Program> {
		self.instances.get(&target)
	}

	/// Mutable access to the program instance for the given backend, creating an empty one if needed.
	pub fn instanceMut (&mut self, target: TargetBackend) -> &mut Program {
		self.instances.entry(target).or_default()
	}

	/// The backends the package contains instances for.
	pub fn targets (&self) -> impl Iterator<Item=TargetBackend> + '_ {
		self.instances.keys().copied()
	}

	/// Get the bytecode for the given backend and entry point.
	///
	/// # Returns
	///
	/// The bytecode if both the instance and the entry point exist. May otherwise fail with any of the following errors:
	/// * [`InvalidTargetError`] – The package does not contain an instance for the requested backend.
	/// * [`InvalidEntryPointError`] – The requested entry point does not exist.
	pub fn code (&self, target: TargetBackend, entryPoint: Option<&str>) -> anyhow::Result<&[u8]> {
		let program = self.instances.get(&target).ok_or(InvalidTargetError { target })?;
		Ok(program.code(entryPoint)?)
	}

	/// Serialize the package into a series of bytes (e.g. for storing in a file).
	pub fn serialize (&self) -> Vec<u8> {
		bitcode::encode(self)
	}

	/// Save the package to a file.
	pub fn writeToFile (&self, filename: impl AsRef<Path>) -> anyhow::Result<()> {
		util::fs::writeCreatingDirs(filename, self.serialize())
	}
}
