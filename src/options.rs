//! Compiler options: the whole of this crate's configuration surface. This
//! is a library entry point invoked per-module, not a long-running process,
//! so there is no config file format here — only the `CompilerOptions`
//! record and its documented defaults.

use crate::diagnostics::CompilerError;

pub type WarnCallback<'a> = Box<dyn FnMut(&CompilerError) + 'a>;
pub type ModuleMetadataResolver<'a> =
    Box<dyn Fn(&str, &str) -> Option<crate::cache::ModuleMetadata> + 'a>;

pub struct CompilerOptions<'a> {
    pub dev: bool,
    pub sourcemap: bool,
    pub fine_grained_dom: bool,
    pub lazy_conditional: bool,
    pub getter_cache: bool,
    pub optimize: bool,
    pub runtime_module: String,
    pub on_warn: Option<WarnCallback<'a>>,
    pub resolve_module_metadata: Option<ModuleMetadataResolver<'a>>,
}

impl<'a> Default for CompilerOptions<'a> {
    fn default() -> Self {
        Self {
            dev: false,
            sourcemap: false,
            fine_grained_dom: false,
            lazy_conditional: false,
            getter_cache: false,
            optimize: false,
            runtime_module: "@fict/runtime".to_string(),
            on_warn: None,
            resolve_module_metadata: None,
        }
    }
}

impl<'a> CompilerOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runtime_module(mut self, module: impl Into<String>) -> Self {
        self.runtime_module = module.into();
        self
    }

    pub(crate) fn emit_warning(&mut self, err: &CompilerError) {
        tracing::warn!(code = %err.code, message = %err.message, file = %err.file, "compiler warning");
        if let Some(cb) = self.on_warn.as_mut() {
            cb(err);
        }
    }
}
