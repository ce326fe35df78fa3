//! `CompilationContext`: the per-module mutable record threaded through all
//! five pipeline stages. Owns every classification set, the derived
//! dependency graph, and the accumulated diagnostics for one module compile.

use std::collections::{HashMap, HashSet};

use oxc_span::Span;

use crate::classify::IdentifierClass;
use crate::diagnostics::CompilerError;
use crate::options::CompilerOptions;

#[derive(Default)]
pub struct CompilationContext<'o> {
    pub file: String,
    pub source: String,

    pub state_vars: HashSet<String>,
    pub memo_vars: HashSet<String>,
    pub alias_vars: HashSet<String>,
    pub getter_only_vars: HashSet<String>,

    /// Source-order record of derived output names, kept alongside the sets
    /// above so region/output emission order never depends on hash order.
    pub derived_order: Vec<String>,

    pub dependency_graph: HashMap<String, HashSet<String>>,
    pub derived_decls: HashMap<String, Span>,

    pub exported_names: HashSet<String>,
    pub helpers_used: HashSet<&'static str>,

    pub diagnostics: Vec<CompilerError>,

    _opts: std::marker::PhantomData<&'o ()>,
}

impl<'o> CompilationContext<'o> {
    pub fn new(file: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn classify(&self, name: &str) -> IdentifierClass {
        if self.state_vars.contains(name) {
            IdentifierClass::Signal
        } else if self.alias_vars.contains(name) {
            IdentifierClass::Alias
        } else if self.getter_only_vars.contains(name) {
            IdentifierClass::GetterOnly
        } else if self.memo_vars.contains(name) {
            IdentifierClass::Memo
        } else {
            IdentifierClass::Plain
        }
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        !matches!(self.classify(name), IdentifierClass::Plain)
    }

    pub fn record_dependency(&mut self, from: &str, to: &str) {
        self.dependency_graph
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    pub fn push_derived(&mut self, name: &str, span: Span) {
        if !self.derived_decls.contains_key(name) {
            self.derived_order.push(name.to_string());
        }
        self.derived_decls.insert(name.to_string(), span);
    }

    pub fn use_helper(&mut self, helper: &'static str) {
        self.helpers_used.insert(helper);
    }

    pub fn warn(&mut self, err: CompilerError, opts: &mut CompilerOptions) {
        opts.emit_warning(&err);
        self.diagnostics.push(err);
    }

    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let mut line = 1u32;
        let mut col = 1u32;
        for (i, ch) in self.source.char_indices() {
            if i as u32 >= offset {
                break;
            }
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }
        (line, col)
    }
}
