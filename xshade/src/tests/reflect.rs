
//////
//
// Imports
//

// rspirv library
use rspirv::spirv::StorageClass;

// Local imports
use crate::reflect::*;
use super::spirv::{diamondModule, BlockNaming};



//////
//
// Tests
//

#[test]
fn test_reflectSpirv_uniform_block()
{
	let words = diamondModule("CB1", BlockNaming::Variable, StorageClass::Uniform, 24);
	let resources = reflectSpirv(&words).unwrap();
	assert_eq!(resources, vec![ShaderResourceDesc {
		name: "CB1".into(), kind: ResourceKind::UniformBuffer, register: 3, space: 1, count: 1
	}]);
}

#[test]
fn test_reflectSpirv_falls_back_to_block_name()
{
	let words = diamondModule("CB1", BlockNaming::Type, StorageClass::Uniform, 24);
	let resources = reflectSpirv(&words).unwrap();
	assert_eq!(resources.len(), 1);
	assert_eq!(resources[0].name, "CB1");
}

#[test]
fn test_reflectSpirv_after_conversion()
{
	let words = diamondModule("CB1", BlockNaming::Variable, StorageClass::Uniform, 24);
	let converted = crate::spirv::convertUniformBufferToPushConstant(&words, "CB1").unwrap().intoWords(&words);
	let resources = reflectSpirv(&converted).unwrap();
	assert_eq!(resources.len(), 1);
	assert_eq!(resources[0].kind, ResourceKind::PushConstant);
	assert_eq!((resources[0].register, resources[0].space), (0, 0));
}

#[test]
fn test_reflectSpirv_storage_buffer()
{
	let words = diamondModule("Particles", BlockNaming::Variable, StorageClass::StorageBuffer, 24);
	let resources = reflectSpirv(&words).unwrap();
	assert_eq!(resources[0].kind, ResourceKind::StorageBuffer);
}

#[test]
fn test_reflectSpirv_rejects_garbage() {
	assert!(matches!(reflectSpirv(&[1, 2, 3, 4, 5]), Err(ReflectError::MalformedBytecode(_))));
}

/// Shortened output of `dxc -dumpbin` for a pixel shader with a few resources.
const DISASSEMBLY: &str = r#";
; Input signature:
;
; Name                 Index   Mask Register SysValue  Format   Used
; -------------------- ----- ------ -------- -------- ------- ------
; SV_Position              0   xyzw        0      POS   float
;
; Resource Bindings:
;
; Name                                 Type  Format         Dim      ID      HLSL Bind  Count
; ------------------------------ ---------- ------- ----------- ------- -------------- ------
; CB1                               cbuffer      NA          NA     CB0            cb0     1
; g_Sampler                         sampler      NA          NA      S0             s0     1
; g_Texture                         texture     f32          2d      T0      t3,space1     1
; g_Lookup                          texture     f32         buf      T1             t4     1
; g_Output                              UAV  struct         r/w      U0             u0     1
; g_Images                              UAV     f32          2d      U1      u1,space2unbounded
;
target datalayout = "e-m:e-p:32:32-i1:32-i8:32-i16:32-i32:32-i64:64-f16:32-f32:32-f64:64-n8:16:32:64"
target triple = "dxil-ms-dx"
"#;

#[test]
fn test_parseResourceTable()
{
	// The last row is malformed on purpose further down; cut it off here
	let wellFormed: String = DISASSEMBLY.lines().filter(|line| !line.contains("g_Images")).map(|line| format!("{line}\n"))
		.collect();
	let resources = parseResourceTable(&wellFormed).unwrap();
	let summary: Vec<_> = resources.iter().map(
		|res| (res.name.as_str(), res.kind, res.register, res.space, res.count)
	).collect();
	assert_eq!(summary, vec![
		("CB1", ResourceKind::UniformBuffer, 0, 0, 1),
		("g_Sampler", ResourceKind::Sampler, 0, 0, 1),
		("g_Texture", ResourceKind::SeparateImage, 3, 1, 1),
		("g_Lookup", ResourceKind::TexelBuffer, 4, 0, 1),
		("g_Output", ResourceKind::StorageBuffer, 0, 0, 1)
	]);
}

#[test]
fn test_parseResourceTable_unbounded()
{
	let text = "; Resource Bindings:\n;\n; Name Type Format Dim ID HLSL Bind Count\n; ---- ----\n\
		; g_Images UAV f32 2d U1 u1,space2 unbounded\n;\n";
	let resources = parseResourceTable(text).unwrap();
	assert_eq!(resources[0].kind, ResourceKind::StorageImage);
	assert_eq!((resources[0].register, resources[0].space, resources[0].count), (1, 2, 0));
}

#[test]
fn test_parseResourceTable_malformed_row() {
	assert!(matches!(parseResourceTable(DISASSEMBLY), Err(ReflectError::MalformedBytecode(_))));
}

#[test]
fn test_parseResourceTable_without_resources() {
	assert_eq!(parseResourceTable("; Input signature:\n;\ntarget triple = \"dxil-ms-dx\"\n").unwrap(), vec![]);
}
