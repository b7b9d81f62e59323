
//! A small pass framework operating directly on decoded *SPIR-V*.
//!
//! A [`ModuleView`] is decoded from the raw words at the start of a pass invocation, edited in place by the pass, and
//! flattened back into words at the end. It never outlives a single [`runPass`] call.



//////
//
// Module definitions
//

/// Submodule implementing the uniform-buffer-to-push-constant rewrite.
mod push_constant;
pub use push_constant::{ConvertUniformBufferToPushConstant, convertUniformBufferToPushConstant}; // re-export

/// Submodule implementing the external optimizer and validator drivers.
pub mod optimizer;
pub use optimizer::{SpirvOptimizer, SpirvValidator, OptimizerPass, OptimizerError}; // re-export



//////
//
// Imports
//

// Standard library
use std::{error::Error, fmt::{Display, Formatter}};

// rspirv library
use rspirv::{binary::Assemble, dr, spirv::{Op, StorageClass, Decoration, Word}};

// Local imports
use crate::util;



//////
//
// Globals
//

/// The largest id bound any consumer is required to accept.
pub const ID_BOUND_LIMIT: Word = 0x3F_FFFF;



//////
//
// Errors
//

#[derive(Debug,Clone,PartialEq,Eq)]
pub enum PassError {
	/// The input words are not a decodable *SPIR-V* module.
	Decode(String),

	/// A type the rewrite needs could not be synthesized.
	TypeSynthesis(String),

	/// The module is structurally inconsistent in a way the pass cannot work around.
	Malformed(String),

	/// The rewritten module was rejected by the post-pass validator.
	Validation(String)
}
impl Display for PassError {
	fn fmt (&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
		let desc = match self {
			Self::Decode(reason) => format!("cannot decode module: {reason}"),
			Self::TypeSynthesis(reason) => format!("cannot synthesize type: {reason}"),
			Self::Malformed(reason) => format!("malformed module: {reason}"),
			Self::Validation(log) => format!("rewritten module failed validation:\n{log}")
		};
		write!(formatter, "PassError[{desc}]")
	}
}
impl Error for PassError {}



//////
//
// Enums
//

/// What a pass did to the module it was applied to.
#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum PassOutcome {
	/// The module was changed.
	Modified,

	/// The pass found nothing to do. This is success, not failure.
	Unmodified
}

/// The result of running a pass over raw words.
#[derive(Debug,Clone,PartialEq,Eq)]
pub enum PassResult {
	/// The pass rewrote the module into these words.
	Modified(Vec<u32>),

	/// The pass found nothing to do; the input words stand unchanged.
	Unmodified
}
impl PassResult
{
	/// The words after the pass, given the words before it.
	pub fn intoWords (self, original: &[u32]) -> Vec<u32> {
		match self {
			Self::Modified(words) => words,
			Self::Unmodified => original.to_vec()
		}
	}

	#[inline(always)]
	pub fn isModified (&self) -> bool {
		matches!(self, Self::Modified(_))
	}
}



//////
//
// Traits
//

/// The interface of a transform over a decoded module.
pub trait Pass
{
	/// A human-readable name for log output.
	fn name (&self) -> &str;

	/// Apply the pass to the module in place. On error, the module may be left partially edited and must be discarded.
	fn apply (&self, module: &mut ModuleView) -> Result<PassOutcome, PassError>;
}



//////
//
// Structs
//

/// A mutable, decoded *SPIR-V* module with the lookups passes commonly need.
pub struct ModuleView {
	module: dr::Module
}
impl ModuleView
{
	/// Decode a module from its words.
	pub fn fromWords (words: &[u32]) -> Result<Self, PassError> {
		let module = dr::load_words(words).map_err(|err| PassError::Decode(format!("{err:?}")))?;
		if module.header.is_none() {
			return Err(PassError::Decode("missing module header".into()));
		}
		Ok(Self { module })
	}

	/// Decode a module from a byte blob holding its words in native byte order.
	pub fn fromBytes (bytes: &[u8]) -> Result<Self, PassError> {
		let words = util::bytesToWords(bytes).ok_or_else(
			|| PassError::Decode("length is not a multiple of 4".into())
		)?;
		Self::fromWords(&words)
	}

	/// Flatten the module back into words.
	pub fn toWords (&self) -> Vec<u32> {
		self.module.assemble()
	}

	/// Direct access to the decoded module.
	#[inline(always)]
	pub fn module (&self) -> &dr::Module {
		&self.module
	}

	/// Direct mutable access to the decoded module. Callers that introduce ids must obtain them via
	/// [`allocateId`](Self::allocateId).
	#[inline(always)]
	pub fn moduleMut (&mut self) -> &mut dr::Module {
		&mut self.module
	}

	/// All ids carrying an `OpName` equal to the given name, in declaration order.
	pub fn idsNamed (&self, name: &str) -> Vec<Word> {
		self.module.debug_names.iter().filter(|inst| inst.class.opcode == Op::Name).filter_map(
			|inst| match (inst.operands.first(), inst.operands.get(1)) {
				(Some(dr::Operand::IdRef(id)), Some(dr::Operand::LiteralString(declared))) if declared == name =>
					Some(*id),
				_ => None
			}
		).collect()
	}

	/// The `OpName` of an id, if any.
	pub fn nameOf (&self, id: Word) -> Option<&str> {
		self.module.debug_names.iter().filter(|inst| inst.class.opcode == Op::Name).find_map(
			|inst| match (inst.operands.first(), inst.operands.get(1)) {
				(Some(dr::Operand::IdRef(target)), Some(dr::Operand::LiteralString(name))) if *target == id =>
					Some(name.as_str()),
				_ => None
			}
		)
	}

	/// Report whether the id carries the given decoration.
	pub fn hasDecoration (&self, id: Word, decoration: Decoration) -> bool {
		self.module.annotations.iter().any(|inst| isDecorationOf(inst, id, &[decoration]))
	}

	/// Remove every `OpDecorate` of the given kinds from the id, returning how many were removed.
	pub fn removeDecorations (&mut self, id: Word, decorations: &[Decoration]) -> usize {
		let before = self.module.annotations.len();
		self.module.annotations.retain(|inst| !isDecorationOf(inst, id, decorations));
		before - self.module.annotations.len()
	}

	/// The module-level instruction (type, constant or global variable) defining the id.
	pub fn global (&self, id: Word) -> Option<&dr::Instruction> {
		self.module.types_global_values.iter().find(|inst| inst.result_id == Some(id))
	}

	/// Mutable access to the module-level instruction defining the id.
	pub fn globalMut (&mut self, id: Word) -> Option<&mut dr::Instruction> {
		self.module.types_global_values.iter_mut().find(|inst| inst.result_id == Some(id))
	}

	fn globalIndex (&self, id: Word) -> Option<usize> {
		self.module.types_global_values.iter().position(|inst| inst.result_id == Some(id))
	}

	/// All module-level `OpVariable`s.
	pub fn globalVariables (&self) -> impl Iterator<Item=&dr::Instruction> {
		self.module.types_global_values.iter().filter(|inst| inst.class.opcode == Op::Variable)
	}

	/// Decompose a pointer type into its storage class and pointee type. Returns `None` if the id is not an
	/// `OpTypePointer`.
	pub fn pointerType (&self, id: Word) -> Option<(StorageClass, Word)> {
		let inst = self.global(id)?;
		match (inst.class.opcode, inst.operands.first(), inst.operands.get(1)) {
			(Op::TypePointer, Some(dr::Operand::StorageClass(storage)), Some(dr::Operand::IdRef(pointee))) =>
				Some((*storage, *pointee)),
			_ => None
		}
	}

	/// Find an existing pointer type with the given storage class and pointee.
	pub fn findPointerType (&self, storage: StorageClass, pointee: Word) -> Option<Word> {
		self.module.types_global_values.iter().filter(|inst| inst.class.opcode == Op::TypePointer).find_map(
			|inst| match (inst.operands.first(), inst.operands.get(1)) {
				(Some(dr::Operand::StorageClass(s)), Some(dr::Operand::IdRef(p))) if *s == storage && *p == pointee =>
					inst.result_id,
				_ => None
			}
		)
	}

	/// Obtain the id of a pointer type with the given storage class and pointee, declaring it right after the pointee if
	/// no such type exists yet.
	pub fn getOrCreatePointerType (&mut self, storage: StorageClass, pointee: Word) -> Result<Word, PassError>
	{
		if let Some(existing) = self.findPointerType(storage, pointee) {
			return Ok(existing);
		}
		let Some(pointeeIndex) = self.globalIndex(pointee) else {
			return Err(PassError::TypeSynthesis(format!("pointee type %{pointee} is not declared")));
		};
		let id = self.allocateId()?;
		self.module.types_global_values.insert(pointeeIndex+1, dr::Instruction::new(
			Op::TypePointer, None, Some(id), vec![dr::Operand::StorageClass(storage), dr::Operand::IdRef(pointee)]
		));
		Ok(id)
	}

	/// Make sure the module-level instruction defining `id` precedes the one defining `user`, moving it directly in
	/// front of `user` if necessary.
	pub fn ensureDeclaredBefore (&mut self, id: Word, user: Word) -> Result<(), PassError>
	{
		let (Some(index), Some(userIndex)) = (self.globalIndex(id), self.globalIndex(user)) else {
			return Err(PassError::Malformed(format!("%{id} or %{user} is not a module-level declaration")));
		};
		if index > userIndex {
			let inst = self.module.types_global_values.remove(index);
			self.module.types_global_values.insert(userIndex, inst);
		}
		Ok(())
	}

	/// Reserve a fresh id, growing the module's id bound.
	pub fn allocateId (&mut self) -> Result<Word, PassError>
	{
		let header = self.module.header.as_mut().ok_or_else(|| PassError::Decode("missing module header".into()))?;
		if header.bound >= ID_BOUND_LIMIT {
			return Err(PassError::TypeSynthesis(format!("id bound limit of {ID_BOUND_LIMIT:#x} reached")));
		}
		let id = header.bound;
		header.bound += 1;
		Ok(id)
	}
}



//////
//
// Functions
//

fn isDecorationOf (inst: &dr::Instruction, id: Word, decorations: &[Decoration]) -> bool {
	inst.class.opcode == Op::Decorate && match (inst.operands.first(), inst.operands.get(1)) {
		(Some(dr::Operand::IdRef(target)), Some(dr::Operand::Decoration(decoration))) =>
			*target == id && decorations.contains(decoration),
		_ => false
	}
}

/// Decode a module, apply a pass to it and re-encode it if the pass changed anything.
pub fn runPass (words: &[u32], pass: &dyn Pass) -> Result<PassResult, PassError>
{
	let mut module = ModuleView::fromWords(words)?;
	match pass.apply(&mut module) {
		Ok(PassOutcome::Modified) => {
			tracing::debug!("Pass `{}` modified the module", pass.name());
			Ok(PassResult::Modified(module.toWords()))
		},
		Ok(PassOutcome::Unmodified) => {
			tracing::debug!("Pass `{}` found nothing to do", pass.name());
			Ok(PassResult::Unmodified)
		},
		Err(err) => {
			tracing::error!("Pass `{}` failed: {err}", pass.name());
			Err(err)
		}
	}
}

/// Like [`runPass`], but additionally validate a modified module. A validation failure is reported as
/// [`PassError::Validation`], distinct from failures of the pass itself.
pub fn runPassValidated (words: &[u32], pass: &dyn Pass, validator: &SpirvValidator)
	-> Result<PassResult, PassError>
{
	let result = runPass(words, pass)?;
	if let PassResult::Modified(rewritten) = &result {
		validator.validate(rewritten).map_err(|err| PassError::Validation(err.to_string()))?;
	}
	Ok(result)
}
