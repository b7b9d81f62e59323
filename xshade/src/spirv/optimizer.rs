
//////
//
// Imports
//

// Standard library
use std::{error::Error, fmt::{Display, Formatter}, path::Path};

// Local imports
use crate::{util, compile::tool::{Tool, Scratch}};



//////
//
// Errors
//

#[derive(Debug,Clone,PartialEq,Eq)]
pub enum OptimizerError {
	/// The tool ran but rejected the module.
	Rejected(String),

	/// The tool produced something that is not a *SPIR-V* module.
	MalformedOutput,

	/// Spawning the tool or staging its files failed.
	Io(String)
}
impl Display for OptimizerError {
	fn fmt (&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
		let desc = match self {
			Self::Rejected(log) => format!("module rejected:\n{log}"),
			Self::MalformedOutput => "tool output is not a SPIR-V module".into(),
			Self::Io(reason) => format!("I/O error: {reason}")
		};
		write!(formatter, "OptimizerError[{desc}]")
	}
}
impl Error for OptimizerError {}
impl From<std::io::Error> for OptimizerError {
	fn from (err: std::io::Error) -> Self {
		Self::Io(err.to_string())
	}
}



//////
//
// Enums
//

/// A group of optimizer passes.
#[derive(Debug,Clone,Copy,PartialEq,Eq,PartialOrd,Ord,Hash)]
pub enum OptimizerPass {
	/// Turn *HLSL*-derived *SPIR-V* into valid *Vulkan* *SPIR-V* (inlining, scalar replacement, dead branch
	/// elimination and the like).
	Legalization,

	/// General performance passes.
	Performance,

	/// Remove reflection-only decorations and strings. Always runs last.
	StripReflection
}
impl OptimizerPass {
	fn flag (self) -> &'static str {
		match self {
			Self::Legalization => "--legalize-hlsl",
			Self::Performance => "-O",
			Self::StripReflection => "--strip-reflect"
		}
	}
}



//////
//
// Structs
//

/// Drives the `spirv-opt` optimizer.
#[derive(Debug,Clone)]
pub struct SpirvOptimizer {
	tool: Tool
}
impl SpirvOptimizer
{
	/// Locate `spirv-opt`, preferring an explicitly configured path.
	pub fn locate (explicit: Option<&Path>) -> Option<Self> {
		Tool::locate("spirv-opt", explicit).map(|tool| Self { tool })
	}

	/// Bring passes into execution order: duplicates removed, [`StripReflection`](OptimizerPass::StripReflection)
	/// moved to the end, everything else keeping its relative order.
	pub fn orderedPasses (passes: &[OptimizerPass]) -> Vec<OptimizerPass>
	{
		let mut ordered = Vec::with_capacity(passes.len());
		for &pass in passes {
			if pass != OptimizerPass::StripReflection && !ordered.contains(&pass) {
				ordered.push(pass);
			}
		}
		if passes.contains(&OptimizerPass::StripReflection) {
			ordered.push(OptimizerPass::StripReflection);
		}
		ordered
	}

	/// Run the given passes over a module. An empty pass list returns the module unchanged without running the tool.
	pub fn run (&self, words: &[u32], passes: &[OptimizerPass]) -> Result<Vec<u32>, OptimizerError>
	{
		let ordered = Self::orderedPasses(passes);
		if ordered.is_empty() {
			return Ok(words.to_vec());
		}
		let scratch = Scratch::new()?;
		scratch.write("input.spv", util::wordsToBytes(words))?;
		let mut args: Vec<&str> = ordered.iter().map(|pass| pass.flag()).collect();
		args.extend(["input.spv", "-o", "output.spv"]);
		tracing::debug!("Running spirv-opt with {ordered:?}");

		let output = self.tool.run(&args, Some(scratch.path()))?;
		if !output.success {
			return Err(OptimizerError::Rejected(output.combinedLog()));
		}
		let optimized = scratch.read("output.spv")?;
		if !util::looksLikeSpirv(&optimized) {
			return Err(OptimizerError::MalformedOutput);
		}
		util::bytesToWords(&optimized).ok_or(OptimizerError::MalformedOutput)
	}
}

/// Drives the `spirv-val` validator.
#[derive(Debug,Clone)]
pub struct SpirvValidator {
	tool: Tool
}
impl SpirvValidator
{
	/// Locate `spirv-val`, preferring an explicitly configured path.
	pub fn locate (explicit: Option<&Path>) -> Option<Self> {
		Tool::locate("spirv-val", explicit).map(|tool| Self { tool })
	}

	/// Validate a module, returning the validator's complaints on failure.
	pub fn validate (&self, words: &[u32]) -> Result<(), OptimizerError>
	{
		let scratch = Scratch::new()?;
		scratch.write("module.spv", util::wordsToBytes(words))?;
		let output = self.tool.run(&["module.spv"], Some(scratch.path()))?;
		if output.success { Ok(()) } else { Err(OptimizerError::Rejected(output.combinedLog())) }
	}
}
