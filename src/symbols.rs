//! Import & Symbol Analyzer: detects the local aliases `$state`/`$effect`
//! are bound to, collects exported names, and strips the macro import
//! specifiers once the rewrite no longer needs them.

use std::collections::HashSet;

use oxc_ast::ast::*;

#[derive(Debug, Default, Clone)]
pub struct MacroImports {
    pub state_local: Option<String>,
    pub effect_local: Option<String>,
}

/// Scans top-level imports from `runtime_module` for `$state`/`$effect`
/// specifiers, direct or aliased (`import { $state as useState } from ...`).
pub fn analyze_macro_imports<'a>(program: &Program<'a>, runtime_module: &str) -> MacroImports {
    let mut result = MacroImports::default();
    for stmt in &program.body {
        if let Statement::ImportDeclaration(decl) = stmt {
            if decl.source.value != runtime_module {
                continue;
            }
            let Some(specifiers) = &decl.specifiers else {
                continue;
            };
            for spec in specifiers {
                if let ImportDeclarationSpecifier::ImportSpecifier(named) = spec {
                    let imported = match &named.imported {
                        ModuleExportName::IdentifierName(id) => id.name.as_str(),
                        ModuleExportName::IdentifierReference(id) => id.name.as_str(),
                        ModuleExportName::StringLiteral(s) => s.value.as_str(),
                    };
                    if imported == "$state" {
                        result.state_local = Some(named.local.name.to_string());
                    } else if imported == "$effect" {
                        result.effect_local = Some(named.local.name.to_string());
                    }
                }
            }
        }
    }
    result
}

/// Union of names appearing in `export { ... }` (no re-export source) and
/// the referent of `export default <identifier>`. `export let/const/function`
/// declarations are picked up when those declarations are visited during
/// transform, not here.
pub fn collect_exported_names<'a>(program: &Program<'a>) -> HashSet<String> {
    let mut names = HashSet::new();
    for stmt in &program.body {
        match stmt {
            Statement::ExportNamedDeclaration(decl) => {
                if decl.source.is_none() {
                    for spec in &decl.specifiers {
                        if let ModuleExportName::IdentifierName(id) = &spec.local {
                            names.insert(id.name.to_string());
                        } else if let ModuleExportName::IdentifierReference(id) = &spec.local {
                            names.insert(id.name.to_string());
                        }
                    }
                }
                if let Some(declaration) = &decl.declaration {
                    collect_names_from_declaration(declaration, &mut names);
                }
            }
            Statement::ExportDefaultDeclaration(decl) => {
                if let ExportDefaultDeclarationKind::Identifier(id) = &decl.declaration {
                    names.insert(id.name.to_string());
                }
            }
            _ => {}
        }
    }
    names
}

fn collect_names_from_declaration(decl: &Declaration<'_>, names: &mut HashSet<String>) {
    match decl {
        Declaration::VariableDeclaration(var_decl) => {
            for d in &var_decl.declarations {
                if let BindingPattern::BindingIdentifier(id) = &d.id {
                    names.insert(id.name.to_string());
                }
            }
        }
        Declaration::FunctionDeclaration(func) => {
            if let Some(id) = &func.id {
                names.insert(id.name.to_string());
            }
        }
        Declaration::ClassDeclaration(class) => {
            if let Some(id) = &class.id {
                names.insert(id.name.to_string());
            }
        }
        _ => {}
    }
}

/// Drops `$state`/`$effect` specifiers from a framework import declaration.
/// Returns `None` if nothing is left to import (no default/namespace
/// specifier, no remaining named specifiers).
pub fn strip_macro_specifiers<'a>(
    decl: &mut ImportDeclaration<'a>,
    runtime_module: &str,
) -> bool {
    if decl.source.value != runtime_module {
        return true;
    }
    let Some(specifiers) = &mut decl.specifiers else {
        return true;
    };
    specifiers.retain(|spec| {
        if let ImportDeclarationSpecifier::ImportSpecifier(named) = spec {
            let imported = match &named.imported {
                ModuleExportName::IdentifierName(id) => id.name.as_str(),
                ModuleExportName::IdentifierReference(id) => id.name.as_str(),
                ModuleExportName::StringLiteral(s) => s.value.as_str(),
            };
            imported != "$state" && imported != "$effect"
        } else {
            true
        }
    });
    !specifiers.is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    #[test]
    fn detects_aliased_state_import() {
        let alloc = Allocator::default();
        let src = "import { $state as useState, $effect } from '@fict/runtime';";
        let source_type = SourceType::default().with_jsx(true);
        let program = Parser::new(&alloc, src, source_type).parse().program;
        let imports = analyze_macro_imports(&program, "@fict/runtime");
        assert_eq!(imports.state_local.as_deref(), Some("useState"));
        assert_eq!(imports.effect_local.as_deref(), Some("$effect"));
    }

    #[test]
    fn collects_export_named_and_default() {
        let alloc = Allocator::default();
        let src = "const x = 1; export { x }; export default x;";
        let source_type = SourceType::default().with_jsx(true);
        let program = Parser::new(&alloc, src, source_type).parse().program;
        let exported = collect_exported_names(&program);
        assert!(exported.contains("x"));
    }
}
