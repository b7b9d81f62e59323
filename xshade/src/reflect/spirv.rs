
//////
//
// Imports
//

// Standard library
use std::collections::BTreeMap;

// rspirv library
use rspirv::{dr, spirv::{self, Op, StorageClass, Decoration, Word}};

// Local imports
use super::*;



//////
//
// Structs
//

/// Lookup tables over the global section of a module.
struct Tables<'m> {
	globals: BTreeMap<Word, &'m dr::Instruction>,
	names: BTreeMap<Word, &'m str>,
	decorations: BTreeMap<(Word, u32), &'m [dr::Operand]>
}
impl<'m> Tables<'m>
{
	fn new (module: &'m dr::Module) -> Self
	{
		let globals = module.types_global_values.iter().filter_map(
			|inst| inst.result_id.map(|id| (id, inst))
		).collect();
		let names = module.debug_names.iter().filter(|inst| inst.class.opcode == Op::Name).filter_map(
			|inst| match (inst.operands.first(), inst.operands.get(1)) {
				(Some(dr::Operand::IdRef(id)), Some(dr::Operand::LiteralString(name))) => Some((*id, name.as_str())),
				_ => None
			}
		).collect();
		let decorations = module.annotations.iter().filter(|inst| inst.class.opcode == Op::Decorate).filter_map(
			|inst| match (inst.operands.first(), inst.operands.get(1)) {
				(Some(dr::Operand::IdRef(id)), Some(dr::Operand::Decoration(decoration))) =>
					Some(((*id, *decoration as u32), &inst.operands[2..])),
				_ => None
			}
		).collect();
		Self { globals, names, decorations }
	}

	fn has (&self, id: Word, decoration: Decoration) -> bool {
		self.decorations.contains_key(&(id, decoration as u32))
	}

	fn literal (&self, id: Word, decoration: Decoration) -> Option<u32> {
		match self.decorations.get(&(id, decoration as u32))?.first()? {
			dr::Operand::LiteralBit32(value) => Some(*value),
			_ => None
		}
	}

	fn constantValue (&self, id: Word) -> Option<u32> {
		let inst = self.globals.get(&id)?;
		match (inst.class.opcode, inst.operands.first()) {
			(Op::Constant, Some(dr::Operand::LiteralBit32(value))) => Some(*value),
			_ => None
		}
	}

	/// Strip (runtime) array types, returning the element type and the array size.
	fn unwrapArray (&self, mut typeId: Word) -> (Word, u32) {
		let mut count = 1u32;
		while let Some(inst) = self.globals.get(&typeId) {
			match (inst.class.opcode, inst.operands.first()) {
				(Op::TypeArray, Some(dr::Operand::IdRef(element))) => {
					let length = inst.operands.get(1).and_then(|op| match op {
						dr::Operand::IdRef(lengthId) => self.constantValue(*lengthId),
						_ => None
					}).unwrap_or(1);
					count = count.saturating_mul(length);
					typeId = *element;
				},
				(Op::TypeRuntimeArray, Some(dr::Operand::IdRef(element))) => {
					count = 0;
					typeId = *element;
				},
				_ => break
			}
		}
		(typeId, count)
	}

	fn classify (&self, storageClass: StorageClass, typeId: Word) -> Option<ResourceKind>
	{
		let inst = self.globals.get(&typeId)?;
		match storageClass {
			StorageClass::PushConstant => Some(ResourceKind::PushConstant),
			StorageClass::StorageBuffer => Some(ResourceKind::StorageBuffer),
			StorageClass::Uniform if self.has(typeId, Decoration::BufferBlock) => Some(ResourceKind::StorageBuffer),
			StorageClass::Uniform => Some(ResourceKind::UniformBuffer),
			StorageClass::UniformConstant => match inst.class.opcode {
				Op::TypeSampledImage => {
					// A sampled image over a buffer-dimensioned image is a uniform texel buffer
					let isBuffer = match inst.operands.first() {
						Some(dr::Operand::IdRef(imageType)) => self.imageDim(*imageType) == Some(spirv::Dim::DimBuffer),
						_ => false
					};
					Some(if isBuffer { ResourceKind::TexelBuffer } else { ResourceKind::SampledImage })
				},
				Op::TypeImage => {
					let sampled = match inst.operands.get(5) {
						Some(dr::Operand::LiteralBit32(sampled)) => *sampled,
						_ => 0
					};
					match (self.imageDim(typeId), sampled) {
						(Some(spirv::Dim::DimBuffer), _) => Some(ResourceKind::TexelBuffer),
						(_, 2) => Some(ResourceKind::StorageImage),
						_ => Some(ResourceKind::SeparateImage)
					}
				},
				Op::TypeSampler => Some(ResourceKind::Sampler),
				Op::TypeAccelerationStructureKHR => Some(ResourceKind::AccelerationStructure),
				_ => None
			},
			_ => None
		}
	}

	fn imageDim (&self, imageType: Word) -> Option<spirv::Dim> {
		match self.globals.get(&imageType)?.operands.get(1)? {
			dr::Operand::Dim(dim) => Some(*dim),
			_ => None
		}
	}
}



//////
//
// Functions
//

/// Recover the resource bindings of a *SPIR-V* module.
///
/// Every module-level variable in the `Uniform`, `UniformConstant`, `StorageBuffer` or `PushConstant` storage class is
/// reported. Buffers without a variable name are reported under the name of their block type.
pub fn reflectSpirv (words: &[u32]) -> Result<Vec<ShaderResourceDesc>, ReflectError>
{
	let module = dr::load_words(words).map_err(|err| ReflectError::MalformedBytecode(format!("{err:?}")))?;
	let tables = Tables::new(&module);

	let mut resources = Vec::new();
	for variable in module.types_global_values.iter().filter(|inst| inst.class.opcode == Op::Variable)
	{
		let (Some(id), Some(pointerType)) = (variable.result_id, variable.result_type) else {
			continue
		};
		let Some(dr::Operand::StorageClass(storageClass)) = variable.operands.first() else {
			continue
		};
		let Some(pointee) = tables.globals.get(&pointerType).and_then(|ptr| match ptr.operands.get(1) {
			Some(dr::Operand::IdRef(pointee)) => Some(*pointee),
			_ => None
		}) else {
			continue
		};
		let (elementType, count) = tables.unwrapArray(pointee);
		let Some(kind) = tables.classify(*storageClass, elementType) else {
			continue
		};

		let name = match tables.names.get(&id) {
			Some(name) if !name.is_empty() => name.to_string(),
			_ => tables.names.get(&elementType).map(|name| name.to_string()).unwrap_or_default()
		};
		let (register, space) = if kind == ResourceKind::PushConstant {
			(0, 0)
		} else {(
			tables.literal(id, Decoration::Binding).unwrap_or(0),
			tables.literal(id, Decoration::DescriptorSet).unwrap_or(0)
		)};
		resources.push(ShaderResourceDesc { name, kind, register, space, count });
	}
	Ok(resources)
}
