
//////
//
// Imports
//

// Local imports
use super::*;



//////
//
// Functions
//

/// Map the `Type` and `Dim` columns of the resource table to a resource kind.
fn classify (typeColumn: &str, dimColumn: &str) -> Option<ResourceKind>
{
	match (typeColumn.to_ascii_lowercase().as_str(), dimColumn) {
		("cbuffer", _) | ("tbuffer", _) => Some(ResourceKind::UniformBuffer),
		("sampler", _) => Some(ResourceKind::Sampler),
		("texture", "buf") => Some(ResourceKind::TexelBuffer),
		("texture", "r/o") => Some(ResourceKind::StorageBuffer),
		("texture", "ras") => Some(ResourceKind::AccelerationStructure),
		("texture", _) => Some(ResourceKind::SeparateImage),
		("uav", "buf") => Some(ResourceKind::TexelBuffer),
		("uav", "r/w") => Some(ResourceKind::StorageBuffer),
		("uav", _) => Some(ResourceKind::StorageImage),
		_ => None
	}
}

/// Parse an `HLSL Bind` column entry like `cb0`, `t3,space1` or `u2,space4`.
fn parseBindPoint (bind: &str) -> Option<(u32, u32)>
{
	let mut parts = bind.split(',');
	let register = parts.next()?.trim_start_matches(|c: char| c.is_ascii_alphabetic()).parse().ok()?;
	let space = match parts.next() {
		Some(space) => space.strip_prefix("space")?.parse().ok()?,
		None => 0
	};
	Some((register, space))
}

/// Recover the resource bindings from the `; Resource Bindings:` table that the *DXIL* disassembler prints ahead of
/// the module body.
///
/// A disassembly without such a table has no bound resources and yields an empty list. A table row that cannot be
/// understood is an error.
pub fn parseResourceTable (disassembly: &str) -> Result<Vec<ShaderResourceDesc>, ReflectError>
{
	let mut lines = disassembly.lines().map(str::trim);
	if !lines.by_ref().any(|line| line.starts_with(';') && line.contains("Resource Bindings:")) {
		return Ok(Vec::new());
	}

	let mut resources = Vec::new();
	let mut inTable = false;
	for line in lines
	{
		let Some(content) = line.strip_prefix(';').map(str::trim) else {
			break
		};
		if !inTable {
			// Skip the blank line and the column header until the dashed separator line
			inTable = content.starts_with("---");
			continue;
		}
		if content.is_empty() {
			break;
		}

		let columns: Vec<&str> = content.split_whitespace().collect();
		if columns.len() < 7 {
			return Err(ReflectError::MalformedBytecode(format!("unrecognized resource table row: `{content}`")));
		}
		let malformed = || ReflectError::MalformedBytecode(format!("unrecognized resource table row: `{content}`"));
		let kind = classify(columns[1], columns[3]).ok_or_else(malformed)?;
		let bind = columns[columns.len()-2];
		let (register, space) = parseBindPoint(bind).ok_or_else(malformed)?;
		let count = match columns[columns.len()-1] {
			"unbounded" => 0,
			count => count.parse().map_err(|_| malformed())?
		};
		resources.push(ShaderResourceDesc { name: columns[0].to_owned(), kind, register, space, count });
	}
	Ok(resources)
}
