
//! Resource binding remapping for *DXIL*.
//!
//! *DXIL* containers offer no structured way to edit resource bindings, so the module is disassembled, the binding
//! fields of each resource's metadata record are rewritten in the text, and the result is reassembled, validated and
//! signed. This depends on the disassembler's output format and is treated as a best-effort bridge: any failure aborts
//! the whole remap.



//////
//
// Imports
//

// Standard library
use std::{collections::BTreeMap, error::Error, fmt::{Display, Formatter}};



//////
//
// Errors
//

#[derive(Debug,Clone,PartialEq,Eq)]
pub enum PatchError {
	/// The container could not be disassembled.
	Disassembly(String),

	/// A resource record was found but did not have the expected shape.
	MalformedRecord { resource: String },

	/// The patched text could not be reassembled.
	Assembly(String),

	/// The reassembled container failed validation or signing.
	Validation(String),

	/// A required tool is unavailable or could not be run.
	Toolchain(String)
}
impl Display for PatchError {
	fn fmt (&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
		let desc = match self {
			Self::Disassembly(log) => format!("disassembly failed:\n{log}"),
			Self::MalformedRecord { resource } => format!("unexpected metadata layout for resource `{resource}`"),
			Self::Assembly(log) => format!("reassembly failed:\n{log}"),
			Self::Validation(log) => format!("validation failed:\n{log}"),
			Self::Toolchain(reason) => format!("toolchain error: {reason}")
		};
		write!(formatter, "PatchError[{desc}]")
	}
}
impl Error for PatchError {}



//////
//
// Traits
//

/// The tools a *DXIL* remap needs.
pub trait DxilToolchain
{
	/// Turn a *DXIL* container into its textual IR.
	fn disassemble (&self, bytecode: &[u8]) -> Result<String, PatchError>;

	/// Turn textual IR back into a *DXIL* container.
	fn assemble (&self, text: &str) -> Result<Vec<u8>, PatchError>;

	/// Validate a container and sign it, returning the signed container.
	fn validateAndSign (&self, bytecode: &[u8]) -> Result<Vec<u8>, PatchError>;
}



//////
//
// Structs
//

/// Where a resource is bound.
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash)]
pub struct ResourceBinding {
	pub space: u32,
	pub register: u32,

	/// The array size of the binding, `0` if unbounded. Not patched into the IR, kept for pipeline layout
	/// construction.
	pub count: u32
}
impl ResourceBinding {
	pub fn new (space: u32, register: u32) -> Self {
		Self { space, register, count: 1 }
	}
}

/// Resource name to binding.
pub type ResourceBindingMap = BTreeMap<String, ResourceBinding>;



//////
//
// Functions
//

/// Replace the integer literal of the next `i32`-typed field after `from`, returning the position right after the new
/// literal. The field must lie within the same metadata record.
fn replaceNextI32 (text: &mut String, from: usize, value: u32) -> Option<usize>
{
	let comma = from + text[from..].find(',')?;
	let tag = comma + text[comma..].find("i32")? + 3;
	if text[from..tag].contains(['\n', '}']) {
		return None;
	}
	let bytes = text.as_bytes();
	let mut start = tag;
	while start < bytes.len() && bytes[start].is_ascii_whitespace() {
		start += 1;
	}
	let mut end = start;
	if end < bytes.len() && matches!(bytes[end], b'+' | b'-') {
		end += 1;
	}
	let digits = end;
	while end < bytes.len() && bytes[end].is_ascii_digit() {
		end += 1;
	}
	if end == digits {
		return None;
	}
	let literal = value.to_string();
	text.replace_range(start..end, &literal);
	Some(start + literal.len())
}

/// Rewrite the space and register fields of the named resources' metadata records in disassembled *DXIL*.
///
/// A record is identified by the resource's quoted name followed by a comma, e.g.
/// `!{i32 0, %struct.CB* undef, !"CB1", i32 0, i32 3, i32 1, ...}`, where the first two integer fields after the name
/// are the space and the lower register bound. Resources not mentioned in the text are skipped silently since the
/// compiler may have removed them.
pub fn patchBindingText (text: &str, bindings: &ResourceBindingMap) -> Result<String, PatchError>
{
	let mut patched = text.to_owned();
	for (name, binding) in bindings
	{
		let needle = format!("!\"{name}\",");
		let mut searchFrom = 0;
		let mut found = false;
		let mut applied = false;
		while let Some(offset) = patched[searchFrom..].find(&needle)
		{
			found = true;
			let afterName = searchFrom + offset + needle.len() - 1;

			// Edit a copy so a record that turns out to have an unexpected shape is left alone
			let mut candidate = patched.clone();
			let edited = replaceNextI32(&mut candidate, afterName, binding.space)
				.and_then(|pos| replaceNextI32(&mut candidate, pos, binding.register));
			if edited.is_some() {
				patched = candidate;
				applied = true;
				break;
			}
			searchFrom = afterName;
		}
		match (found, applied) {
			(false, _) => tracing::debug!("Resource `{name}` not present in DXIL, skipping"),
			(true, false) => return Err(PatchError::MalformedRecord { resource: name.clone() }),
			(true, true) => tracing::trace!(
				"Rebound `{name}` to register {} in space {}", binding.register, binding.space
			)
		}
	}
	Ok(patched)
}

/// Remap the resource bindings of a *DXIL* container.
///
/// Disassembles the container, patches the binding text, reassembles it and validates and signs the result. Either
/// the fully remapped, signed container is returned or an error; partial results are never surfaced.
pub fn remapResourceBindings (bytecode: &[u8], bindings: &ResourceBindingMap, toolchain: &dyn DxilToolchain)
	-> Result<Vec<u8>, PatchError>
{
	let text = toolchain.disassemble(bytecode)?;
	let patched = patchBindingText(&text, bindings)?;
	let assembled = toolchain.assemble(&patched)?;
	toolchain.validateAndSign(&assembled)
}
