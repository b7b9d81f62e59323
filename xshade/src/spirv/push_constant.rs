
//////
//
// Imports
//

// Standard library
use std::collections::{BTreeMap, BTreeSet};

// rspirv library
use rspirv::{dr, spirv::{Op, StorageClass, Decoration, Word}};

// Local imports
use super::*;



//////
//
// Structs
//

/// Where an instruction lives inside the function bodies of a module.
#[derive(Debug,Clone,Copy)]
struct Location {
	function: usize,
	block: usize,
	instruction: usize
}

/// Turns the uniform buffer block of the given name into a push constant block.
///
/// The name may be that of the buffer variable or that of its block struct type. Only a variable of storage class
/// `Uniform` whose pointee is decorated `Block` qualifies, so storage buffers of the same name are left alone. All
/// pointers derived from the variable within function bodies are retyped accordingly and the variable loses its
/// `Binding` and `DescriptorSet` decorations.
#[derive(Debug,Clone)]
pub struct ConvertUniformBufferToPushConstant {
	blockName: String
}
impl ConvertUniformBufferToPushConstant
{
	pub fn new (blockName: impl Into<String>) -> Self {
		Self { blockName: blockName.into() }
	}

	/// Find the variable to convert, if the module has one.
	fn locate (&self, module: &ModuleView) -> Option<Word>
	{
		let isUniformBlockVariable = |variable: &dr::Instruction| {
			variable.class.opcode == Op::Variable && variable.result_type.and_then(|ty| module.pointerType(ty))
				.is_some_and(|(storage, pointee)| {
					storage == StorageClass::Uniform && module.hasDecoration(pointee, Decoration::Block)
				})
		};

		for candidate in module.idsNamed(&self.blockName)
		{
			let Some(inst) = module.global(candidate) else {
				continue
			};
			match inst.class.opcode
			{
				Op::Variable => if isUniformBlockVariable(inst) {
					return inst.result_id;
				},

				Op::TypeStruct => {
					let found = module.globalVariables().filter(|variable| isUniformBlockVariable(*variable)).find(
						|variable| variable.result_type.and_then(|ty| module.pointerType(ty))
							.is_some_and(|(_, pointee)| pointee == candidate)
					);
					if let Some(variable) = found {
						return variable.result_id;
					}
				},

				_ => {}
			}
		}
		None
	}
}
impl Pass for ConvertUniformBufferToPushConstant
{
	fn name (&self) -> &str {
		"convert-uniform-buffer-to-push-constant"
	}

	fn apply (&self, module: &mut ModuleView) -> Result<PassOutcome, PassError>
	{
		let Some(variable) = self.locate(module) else {
			tracing::debug!("No uniform block named `{}` found", self.blockName);
			return Ok(PassOutcome::Unmodified);
		};

		// Retype the variable
		let pointee = module.global(variable).and_then(|inst| inst.result_type)
			.and_then(|ty| module.pointerType(ty)).map(|(_, pointee)| pointee)
			.ok_or_else(|| PassError::Malformed(format!("variable %{variable} lost its pointer type")))?;
		let pushConstantType = module.getOrCreatePointerType(StorageClass::PushConstant, pointee)?;
		module.ensureDeclaredBefore(pushConstantType, variable)?;
		let inst = module.globalMut(variable).ok_or_else(
			|| PassError::Malformed(format!("variable %{variable} vanished"))
		)?;
		inst.result_type = Some(pushConstantType);
		match inst.operands.first_mut() {
			Some(operand) if matches!(operand, dr::Operand::StorageClass(_)) =>
				*operand = dr::Operand::StorageClass(StorageClass::PushConstant),
			_ => return Err(PassError::Malformed(format!("variable %{variable} has no storage class operand")))
		}

		// Propagate through every derived pointer
		let users = collectUsers(module.module());
		let mut retyped = BTreeSet::new();
		propagate(module, &users, variable, &mut retyped)?;

		// A push constant has no descriptor binding
		module.removeDecorations(variable, &[Decoration::Binding, Decoration::DescriptorSet]);
		tracing::debug!("Converted uniform block `{}` (%{variable}) to a push constant", self.blockName);
		Ok(PassOutcome::Modified)
	}
}



//////
//
// Functions
//

/// Map every id to the function body instructions that consume it as an operand.
fn collectUsers (module: &dr::Module) -> BTreeMap<Word, Vec<Location>>
{
	let mut users: BTreeMap<Word, Vec<Location>> = BTreeMap::new();
	for (function, func) in module.functions.iter().enumerate() {
		for (block, blk) in func.blocks.iter().enumerate() {
			for (instruction, inst) in blk.instructions.iter().enumerate() {
				for operand in &inst.operands {
					if let dr::Operand::IdRef(id) = operand {
						users.entry(*id).or_default().push(Location { function, block, instruction });
					}
				}
			}
		}
	}
	users
}

fn instructionAt (module: &mut ModuleView, at: Location) -> Option<&mut dr::Instruction> {
	module.moduleMut().functions.get_mut(at.function)?.blocks.get_mut(at.block)?.instructions.get_mut(at.instruction)
}

/// Retype every pointer derived from `id` to the `PushConstant` storage class, recursively.
///
/// Load, store, function call and any other consumer that does not yield a derived pointer ends the walk along its
/// branch. `retyped` holds every result already handled, so each derived pointer is visited once no matter how many
/// paths lead to it and loops through phi nodes terminate.
fn propagate (
	module: &mut ModuleView, users: &BTreeMap<Word, Vec<Location>>, id: Word, retyped: &mut BTreeSet<Word>
) -> Result<(), PassError>
{
	let Some(locations) = users.get(&id) else {
		return Ok(());
	};
	for &location in locations
	{
		let Some(inst) = instructionAt(module, location) else {
			continue
		};
		let opcode = inst.class.opcode;
		let derivesPointer = match opcode {
			Op::AccessChain | Op::InBoundsAccessChain | Op::PtrAccessChain | Op::InBoundsPtrAccessChain =>
				inst.operands.first() == Some(&dr::Operand::IdRef(id)),
			Op::CopyObject | Op::Phi => true,
			Op::Select => inst.operands.get(1..3).is_some_and(|values| values.contains(&dr::Operand::IdRef(id))),
			_ => false
		};
		if !derivesPointer {
			continue;
		}
		let (Some(resultId), Some(resultType)) = (inst.result_id, inst.result_type) else {
			continue
		};
		if !retyped.insert(resultId) {
			continue;
		}

		// Retype the result
		let Some((_, pointee)) = module.pointerType(resultType) else {
			continue
		};
		let pushConstantType = module.getOrCreatePointerType(StorageClass::PushConstant, pointee)?;
		if let Some(inst) = instructionAt(module, location) {
			inst.result_type = Some(pushConstantType);
		}

		// Continue with the users of the result
		propagate(module, users, resultId, retyped)?;
	}
	Ok(())
}

/// Convenience wrapper applying [`ConvertUniformBufferToPushConstant`] to raw words.
pub fn convertUniformBufferToPushConstant (words: &[u32], blockName: &str) -> Result<PassResult, PassError> {
	runPass(words, &ConvertUniformBufferToPushConstant::new(blockName))
}
