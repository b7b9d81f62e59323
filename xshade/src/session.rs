
//////
//
// Imports
//

// Standard library
use std::path::Path;

// Anyhow library
use anyhow;

// Local imports
use crate::*;
use crate::{
	cache::*, compile::*, dxil::{PatchError, ResourceBindingMap, remapResourceBindings},
	preprocess::FileSystemStreamFactory, reflect::{ReflectError, ShaderResourceDesc}, runenv::Environment,
	spirv::{SpirvOptimizer, SpirvValidator}
};



//////
//
// Classes
//

/// The entry point into the pipeline: owns the front ends, the default source stream factory and the bytecode cache.
///
/// Front ends are loaded on first use and released when the last session using them is dropped. A session is `Sync`
/// for compiling, but the cache-mutating operations take `&mut self`, so sharing a session across threads for cached
/// compilation requires external locking.
pub struct Session {
	environment: Environment,
	defaultFactory: FileSystemStreamFactory,
	dxc: DxcFrontEnd,
	glslang: GlslangFrontEnd,
	cache: BytecodeCache
}
impl Session
{
	/// Create a session for the given run environment. No toolchain is loaded yet.
	pub fn new (environment: Environment) -> Self { Self {
		defaultFactory: FileSystemStreamFactory::fromEnvironment(&environment),
		dxc: DxcFrontEnd::new(&environment),
		glslang: GlslangFrontEnd::new(&environment),
		cache: BytecodeCache::new(),
		environment
	}}

	/// Create a session for the run environment stored in the given *YAML* file, or the default environment if the
	/// file does not exist.
	pub fn fromEnvironmentFile (filename: impl AsRef<Path>) -> anyhow::Result<Self> {
		Ok(Self::new(Environment::fromFileOrDefault(filename)?))
	}

	#[inline(always)]
	pub fn environment (&self) -> &Environment {
		&self.environment
	}

	/// The front end of the given kind.
	pub fn frontEnd (&self, kind: CompilerKind) -> &dyn FrontEnd {
		match kind {
			CompilerKind::DXC => &self.dxc,
			CompilerKind::Glslang => &self.glslang
		}
	}

	#[inline(always)]
	pub fn dxc (&self) -> &DxcFrontEnd {
		&self.dxc
	}

	#[inline(always)]
	pub fn glslang (&self) -> &GlslangFrontEnd {
		&self.glslang
	}

	/// Report whether the front end of the given kind can be used, loading it if that has not been attempted yet.
	pub fn isAvailable (&self, kind: CompilerKind) -> bool {
		self.frontEnd(kind).maxVersion().is_ok()
	}

	/// The highest target version the front end of the given kind supports.
	pub fn maxVersion (&self, kind: CompilerKind) -> Result<ShaderVersion, LoadError> {
		self.frontEnd(kind).maxVersion()
	}

	/// Resolve the root source of a request and walk its includes.
	pub fn prepare (&self, request: &CompileRequest) -> Result<PreparedSource, CompileError> {
		PreparedSource::fromRequest(request, &self.defaultFactory)
	}

	/// Compile a request, bypassing the cache.
	pub fn compile (&self, request: &CompileRequest, target: TargetBackend) -> Result<CompiledModule, CompileError> {
		let source = self.prepare(request)?;
		self.compilePrepared(request, &source, target)
	}

	fn compilePrepared (&self, request: &CompileRequest, source: &PreparedSource, target: TargetBackend)
		-> Result<CompiledModule, CompileError>
	{
		let frontEnd = self.frontEnd(request.compiler);
		if !frontEnd.supportsTarget(target) {
			return Err(CompileError::UnsupportedTarget { compiler: request.compiler, target });
		}
		let result = frontEnd.compile(request, source, target);
		if let Err(err) = &result {
			tracing::error!("Compiling `{}` failed: {err}", request.displayName());
		}
		result
	}

	/// The cache key of a request compiled for the given backend.
	pub fn fingerprint (&self, request: &CompileRequest, target: TargetBackend) -> Result<Fingerprint, CompileError> {
		let source = self.prepare(request)?;
		Ok(self.fingerprintPrepared(request, &source, target))
	}

	fn fingerprintPrepared (&self, request: &CompileRequest, source: &PreparedSource, target: TargetBackend)
		-> Fingerprint
	{
		let settings = self.frontEnd(request.compiler).settings();
		computeFingerprint(request, target, &settings, source.text.as_bytes(), &source.includes)
	}

	/// Compile a request, reusing cached bytecode when an identical request was compiled before. Freshly compiled
	/// bytecode is added to the cache. Cached hits carry no compiler log; their resources are reflected anew unless
	/// reflection is skipped.
	pub fn compileCached (&mut self, request: &CompileRequest, target: TargetBackend)
		-> Result<CompiledModule, CompileError>
	{
		let source = self.prepare(request)?;
		let fingerprint = self.fingerprintPrepared(request, &source, target);
		if let Some(bytecode) = self.cache.lookup(fingerprint)
		{
			tracing::debug!("Cache hit for `{}` ({fingerprint})", request.displayName());
			let bytecode = bytecode.to_vec();
			let resources = if request.flags.contains(CompileFlags::SKIP_REFLECTION) {
				None
			} else {
				Some(self.frontEnd(request.compiler).reflect(&bytecode, target)?)
			};
			return Ok(CompiledModule { bytecode, log: None, resources });
		}

		tracing::debug!("Cache miss for `{}` ({fingerprint})", request.displayName());
		let module = self.compilePrepared(request, &source, target)?;
		self.cache.insert(fingerprint, module.bytecode.clone());
		Ok(module)
	}

	/// Recover the resource bindings of compiled bytecode using the front end of the given kind.
	pub fn reflect (&self, kind: CompilerKind, bytecode: &[u8], target: TargetBackend)
		-> Result<Vec<ShaderResourceDesc>, ReflectError>
	{
		self.frontEnd(kind).reflect(bytecode, target)
	}

	/// Remap the resource bindings of a *DXIL* container using the *DXC* toolchain.
	pub fn remapDxilBindings (&self, bytecode: &[u8], bindings: &ResourceBindingMap) -> Result<Vec<u8>, PatchError> {
		remapResourceBindings(bytecode, bindings, &self.dxc)
	}

	/// The `spirv-opt` driver, if the optimizer can be found.
	pub fn optimizer (&self) -> Option<SpirvOptimizer> {
		SpirvOptimizer::locate(self.environment.tools.spirvOpt.as_deref())
	}

	/// The `spirv-val` driver, if the validator can be found.
	pub fn validator (&self) -> Option<SpirvValidator> {
		SpirvValidator::locate(self.environment.tools.spirvVal.as_deref())
	}

	#[inline(always)]
	pub fn cache (&self) -> &BytecodeCache {
		&self.cache
	}

	#[inline(always)]
	pub fn cacheMut (&mut self) -> &mut BytecodeCache {
		&mut self.cache
	}

	/// Write the cache to the cache file of the run environment. Returns `false` if no cache file is configured.
	pub fn saveCache (&self) -> Result<bool, CacheError>
	{
		let Some(filename) = &self.environment.cacheFile else {
			return Ok(false);
		};
		self.cache.saveToFile(filename)?;
		tracing::info!("Saved {} cache entries to `{}`", self.cache.len(), filename.display());
		Ok(true)
	}

	/// Merge the cache file of the run environment into the cache, returning the number of entries read. A missing
	/// file or an unconfigured cache file loads nothing.
	pub fn loadCache (&mut self) -> Result<usize, CacheError>
	{
		let Some(filename) = &self.environment.cacheFile else {
			return Ok(0);
		};
		let Some(blob) = util::fs::readIfExists(filename).map_err(|err| CacheError::Io(err.to_string()))? else {
			return Ok(0);
		};
		self.cache.deserializeAll(&blob)
	}

	/// Compile each request for each of the given backends and bundle the results into a package, keyed by entry point
	/// name. Reflected resources are stored alongside the code.
	pub fn buildPackage (&self, requests: &[CompileRequest], targets: &[TargetBackend])
		-> Result<Package, CompileError>
	{
		let mut package = Package::new();
		for &target in targets {
			for request in requests {
				let module = self.compile(request, target)?;
				package.instanceMut(target).addCompiledModule(Some(&request.entryPoint), module);
			}
		}
		Ok(package)
	}
}
impl Default for Session {
	fn default () -> Self {
		Self::new(Environment::default())
	}
}
