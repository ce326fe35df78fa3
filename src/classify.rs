//! Signal/Memo Classifier: computes the disjoint `state_vars` / `memo_vars`
//! / `alias_vars` / `getter_only_vars` sets, builds the derived dependency
//! graph, and runs cycle detection over it.
//!
//! Traversal style follows the teacher's `ScopeAwareCollector`/
//! `BindingCollector` (read-only `Visit` passes collecting names), rather
//! than `ScriptRenamer`'s `VisitMut` rewrite style, since this stage never
//! mutates the AST.

use std::collections::{HashMap, HashSet};

use oxc_ast::ast::*;
use oxc_ast_visit::Visit;
use oxc_span::{GetSpan, Span};

use crate::classify_support::free_vars as free_vars_of_expression;
use crate::context::CompilationContext;
use crate::diagnostics::{self, CompilerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierClass {
    Signal,
    Memo,
    Alias,
    GetterOnly,
    Plain,
}

/// Detects `$state(...)` calls anywhere in the program and validates their
/// placement: only a top-level `let`/`const` binding at module scope or at
/// the top of a function body is allowed.
struct StateCollector<'a, 'ctx, 'o> {
    ctx: &'ctx mut CompilationContext<'o>,
    state_import_name: &'a str,
    fatal: Option<CompilerError>,
}

impl<'a, 'ctx, 'o> StateCollector<'a, 'ctx, 'o> {
    fn is_state_call(&self, call: &CallExpression<'_>) -> bool {
        matches!(&call.callee, Expression::Identifier(id) if id.name == self.state_import_name)
    }

    fn fail(&mut self, code: &str, msg: String, span: Span) {
        if self.fatal.is_some() {
            return;
        }
        let (line, col) = self.ctx.line_col(span.start);
        self.fatal = Some(CompilerError::new(code, msg, &self.ctx.file, line, col));
    }
}

impl<'a, 'ctx, 'o> Visit<'a> for StateCollector<'a, 'ctx, 'o> {
    fn visit_function_body(&mut self, body: &FunctionBody<'a>) {
        // Top level of a function body: scan declarations directly, then
        // recurse into nested statements with the "misplaced" check armed.
        for stmt in &body.statements {
            self.visit_top_level_statement(stmt);
        }
    }

    fn visit_program(&mut self, program: &Program<'a>) {
        for stmt in &program.body {
            self.visit_top_level_statement(stmt);
        }
    }
}

impl<'a, 'ctx, 'o> StateCollector<'a, 'ctx, 'o> {
    fn visit_top_level_statement(&mut self, stmt: &Statement<'a>) {
        if let Statement::VariableDeclaration(decl) = stmt {
            for d in &decl.declarations {
                if let Some(Expression::CallExpression(call)) = &d.init {
                    if self.is_state_call(call) {
                        match &d.id {
                            BindingPattern::BindingIdentifier(id) => {
                                self.ctx.state_vars.insert(id.name.to_string());
                                continue;
                            }
                            _ => {
                                self.fail(
                                    diagnostics::EFICT_STATE_DESTRUCTURE,
                                    "$state(...) binding target must be a plain identifier, not a destructuring pattern".to_string(),
                                    d.span(),
                                );
                                continue;
                            }
                        }
                    }
                }
                // Not a $state declaration at this legal position; still
                // scan its initializer for misplaced $state calls deeper in.
                if let Some(init) = &d.init {
                    self.scan_for_misplaced(init, "variable initializer");
                }
            }
            return;
        }
        // Any other top-level statement: scan its subtree for misplaced use.
        self.scan_statement_for_misplaced(stmt);
    }

    fn scan_statement_for_misplaced(&mut self, stmt: &Statement<'a>) {
        let mut finder = MisplacedStateFinder {
            state_import_name: self.state_import_name,
            found: None,
            context_label: "statement",
        };
        finder.visit_statement(stmt);
        if let Some((span, label)) = finder.found.take() {
            self.fail(
                diagnostics::EFICT_STATE_PLACEMENT,
                format!("$state(...) must be declared at module or function top level, not inside a {label}"),
                span,
            );
        }
    }

    fn scan_for_misplaced(&mut self, expr: &Expression<'a>, label: &'static str) {
        let mut finder = MisplacedStateFinder {
            state_import_name: self.state_import_name,
            found: None,
            context_label: label,
        };
        finder.visit_expression(expr);
        if let Some((span, label)) = finder.found.take() {
            self.fail(
                diagnostics::EFICT_STATE_PLACEMENT,
                format!("$state(...) must be declared at module or function top level, not inside a {label}"),
                span,
            );
        }
    }
}

/// Finds any `$state(...)` call nested below the current node (loops,
/// conditionals, nested function bodies are all illegal placements).
struct MisplacedStateFinder<'a> {
    state_import_name: &'a str,
    found: Option<(Span, &'static str)>,
    context_label: &'static str,
}

impl<'a> Visit<'a> for MisplacedStateFinder<'a> {
    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if self.found.is_some() {
            return;
        }
        if matches!(&call.callee, Expression::Identifier(id) if id.name == self.state_import_name)
        {
            self.found = Some((call.span, self.context_label));
            return;
        }
        oxc_ast_visit::walk::walk_call_expression(self, call);
    }

    fn visit_for_statement(&mut self, stmt: &ForStatement<'a>) {
        self.context_label = "loop";
        oxc_ast_visit::walk::walk_for_statement(self, stmt);
    }

    fn visit_for_of_statement(&mut self, stmt: &ForOfStatement<'a>) {
        self.context_label = "loop";
        oxc_ast_visit::walk::walk_for_of_statement(self, stmt);
    }

    fn visit_for_in_statement(&mut self, stmt: &ForInStatement<'a>) {
        self.context_label = "loop";
        oxc_ast_visit::walk::walk_for_in_statement(self, stmt);
    }

    fn visit_while_statement(&mut self, stmt: &WhileStatement<'a>) {
        self.context_label = "loop";
        oxc_ast_visit::walk::walk_while_statement(self, stmt);
    }

    fn visit_if_statement(&mut self, stmt: &IfStatement<'a>) {
        self.context_label = "conditional";
        oxc_ast_visit::walk::walk_if_statement(self, stmt);
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: oxc_syntax::scope::ScopeFlags) {
        self.context_label = "nested function";
        oxc_ast_visit::walk::walk_function(self, func, flags);
    }

    fn visit_arrow_function_expression(&mut self, func: &ArrowFunctionExpression<'a>) {
        self.context_label = "nested function";
        oxc_ast_visit::walk::walk_arrow_function_expression(self, func);
    }
}

pub fn collect_state_vars<'a, 'o>(
    program: &Program<'a>,
    ctx: &mut CompilationContext<'o>,
    state_import_name: &str,
) -> Result<(), CompilerError> {
    let mut collector = StateCollector {
        ctx,
        state_import_name,
        fatal: None,
    };
    collector.visit_program(program);
    if let Some(err) = collector.fatal {
        return Err(err);
    }
    Ok(())
}

/// Fixed-point pass collecting `const k = e` declarations whose initializer
/// transitively reads a tracked name. Splits results into `alias_vars`
/// (initializer is exactly another tracked identifier) and `memo_vars`
/// (everything else).
pub fn collect_derived_candidates<'a, 'o>(program: &Program<'a>, ctx: &mut CompilationContext<'o>) {
    let mut collector = DeclCollector { decls: Vec::new() };
    collector.visit_program(program);

    loop {
        let mut changed = false;
        for (name, init, span) in &collector.decls {
            if ctx.state_vars.contains(name)
                || ctx.memo_vars.contains(name)
                || ctx.alias_vars.contains(name)
            {
                continue;
            }
            if matches!(
                init,
                Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_)
            ) {
                continue;
            }
            let deps = free_vars_of_expression(init);
            let any_tracked = deps.iter().any(|d| {
                ctx.state_vars.contains(d) || ctx.memo_vars.contains(d) || ctx.alias_vars.contains(d)
            });
            if !any_tracked {
                continue;
            }
            for dep in &deps {
                if ctx.state_vars.contains(dep) || ctx.memo_vars.contains(dep) || ctx.alias_vars.contains(dep) {
                    ctx.record_dependency(name, dep);
                }
            }
            ctx.push_derived(name, *span);
            if let Expression::Identifier(id) = init {
                if ctx.is_tracked(&id.name) {
                    ctx.alias_vars.insert(name.clone());
                    changed = true;
                    continue;
                }
            }
            ctx.memo_vars.insert(name.clone());
            changed = true;
        }
        if !changed {
            break;
        }
    }
}

struct DeclCollector<'a> {
    decls: Vec<(String, Expression<'a>, Span)>,
}

impl<'a> Visit<'a> for DeclCollector<'a> {
    fn visit_variable_declarator(&mut self, decl: &VariableDeclarator<'a>) {
        if decl.kind == VariableDeclarationKind::Const {
            if let BindingPattern::BindingIdentifier(id) = &decl.id {
                if let Some(init) = &decl.init {
                    self.decls
                        .push((id.name.to_string(), init.clone(), decl.span()));
                }
            }
        }
        oxc_ast_visit::walk::walk_variable_declarator(self, decl);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UseKind {
    Reactive,
    Event,
    Other,
}

/// Scans every reference to `name` in the module and classifies by
/// enclosing context (§4.2.1). A derived declared at module top level or
/// exported is always a full memo and never scanned.
struct ReadSiteScanner<'a> {
    target: &'a str,
    in_event_handler: bool,
    in_jsx_reactive_position: bool,
    in_effect: bool,
    in_plain_function: bool,
    uses: Vec<UseKind>,
}

impl<'a> ReadSiteScanner<'a> {
    fn current_kind(&self) -> UseKind {
        if self.in_jsx_reactive_position || self.in_effect {
            UseKind::Reactive
        } else if self.in_event_handler || self.in_plain_function {
            UseKind::Event
        } else {
            UseKind::Other
        }
    }
}

impl<'a> Visit<'a> for ReadSiteScanner<'a> {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        if ident.name == self.target {
            self.uses.push(self.current_kind());
        }
    }

    fn visit_jsx_attribute_item(&mut self, item: &JSXAttributeItem<'a>) {
        if let JSXAttributeItem::Attribute(attr) = item {
            let attr_name = match &attr.name {
                JSXAttributeName::Identifier(id) => id.name.as_str(),
                JSXAttributeName::NamespacedName(ns) => ns.name.name.as_str(),
            };
            let is_event = attr_name.len() > 2
                && attr_name.starts_with("on")
                && attr_name.as_bytes()[2].is_ascii_uppercase();
            let is_structural = attr_name == "key" || attr_name == "ref";
            let prev = self.in_event_handler;
            let prev_reactive = self.in_jsx_reactive_position;
            if is_event {
                self.in_event_handler = true;
            } else if !is_structural {
                self.in_jsx_reactive_position = true;
            }
            oxc_ast_visit::walk::walk_jsx_attribute_item(self, item);
            self.in_event_handler = prev;
            self.in_jsx_reactive_position = prev_reactive;
        } else {
            oxc_ast_visit::walk::walk_jsx_attribute_item(self, item);
        }
    }

    fn visit_jsx_expression_container(&mut self, expr: &JSXExpressionContainer<'a>) {
        let prev = self.in_jsx_reactive_position;
        self.in_jsx_reactive_position = true;
        oxc_ast_visit::walk::walk_jsx_expression_container(self, expr);
        self.in_jsx_reactive_position = prev;
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        let is_effect = matches!(&call.callee, Expression::Identifier(id) if id.name == "$effect");
        if is_effect {
            let prev = self.in_effect;
            self.in_effect = true;
            oxc_ast_visit::walk::walk_call_expression(self, call);
            self.in_effect = prev;
            return;
        }
        oxc_ast_visit::walk::walk_call_expression(self, call);
    }

    fn visit_function(&mut self, func: &Function<'a>, flags: oxc_syntax::scope::ScopeFlags) {
        let prev = self.in_plain_function;
        self.in_plain_function = true;
        oxc_ast_visit::walk::walk_function(self, func, flags);
        self.in_plain_function = prev;
    }

    fn visit_arrow_function_expression(&mut self, func: &ArrowFunctionExpression<'a>) {
        if self.in_event_handler {
            oxc_ast_visit::walk::walk_arrow_function_expression(self, func);
            return;
        }
        let prev = self.in_plain_function;
        self.in_plain_function = true;
        oxc_ast_visit::walk::walk_arrow_function_expression(self, func);
        self.in_plain_function = prev;
    }
}

pub fn classify_getter_only<'a, 'o>(program: &Program<'a>, ctx: &mut CompilationContext<'o>) {
    let top_level_names: HashSet<String> = program
        .body
        .iter()
        .filter_map(|stmt| match stmt {
            Statement::VariableDeclaration(decl) => Some(decl),
            _ => None,
        })
        .flat_map(|decl| decl.declarations.iter())
        .filter_map(|d| match &d.id {
            BindingPattern::BindingIdentifier(id) => Some(id.name.to_string()),
            _ => None,
        })
        .collect();

    let candidates: Vec<String> = ctx
        .memo_vars
        .iter()
        .filter(|name| !ctx.exported_names.contains(*name) && !top_level_names.contains(*name))
        .cloned()
        .collect();

    for name in candidates {
        let mut scanner = ReadSiteScanner {
            target: &name,
            in_event_handler: false,
            in_jsx_reactive_position: false,
            in_effect: false,
            in_plain_function: false,
            uses: Vec::new(),
        };
        scanner.visit_program(program);
        if !scanner.uses.is_empty() && scanner.uses.iter().all(|u| *u == UseKind::Event) {
            ctx.getter_only_vars.insert(name);
        }
    }
}

/// DFS over `dependency_graph` restricted to derived-to-derived edges, with
/// an on-stack set standing in for a bitmap. Reports the first cycle found.
pub fn detect_cycles<'o>(ctx: &CompilationContext<'o>) -> Result<(), CompilerError> {
    let derived: HashSet<&str> = ctx
        .memo_vars
        .iter()
        .chain(ctx.alias_vars.iter())
        .map(|s| s.as_str())
        .collect();

    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_stack: HashSet<&str> = HashSet::new();
    let mut path: Vec<&str> = Vec::new();

    fn visit<'g>(
        node: &'g str,
        graph: &'g HashMap<String, HashSet<String>>,
        derived: &HashSet<&'g str>,
        visited: &mut HashSet<&'g str>,
        on_stack: &mut HashSet<&'g str>,
        path: &mut Vec<&'g str>,
    ) -> Option<Vec<String>> {
        if on_stack.contains(node) {
            let start = path.iter().position(|n| *n == node).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        if visited.contains(node) {
            return None;
        }
        visited.insert(node);
        on_stack.insert(node);
        path.push(node);
        if let Some(deps) = graph.get(node) {
            for dep in deps {
                if derived.contains(dep.as_str()) {
                    if let Some(cycle) = visit(dep.as_str(), graph, derived, visited, on_stack, path) {
                        return Some(cycle);
                    }
                }
            }
        }
        path.pop();
        on_stack.remove(node);
        None
    }

    for name in &derived {
        if let Some(cycle) = visit(
            name,
            &ctx.dependency_graph,
            &derived,
            &mut visited,
            &mut on_stack,
            &mut path,
        ) {
            let head = cycle.first().cloned().unwrap_or_default();
            let span = ctx.derived_decls.get(&head).copied().unwrap_or_default();
            let (line, col) = ctx.line_col(span.start);
            return Err(CompilerError::new(
                diagnostics::EFICT_CYCLE,
                format!("cyclic derived dependency: {}", cycle.join(" -> ")),
                &ctx.file,
                line,
                col,
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    fn parse<'a>(alloc: &'a Allocator, src: &'a str) -> Program<'a> {
        let source_type = SourceType::default().with_jsx(true).with_typescript(false);
        Parser::new(alloc, src, source_type).parse().program
    }

    #[test]
    fn classifies_simple_signal_and_memo() {
        let alloc = Allocator::default();
        let src = "let c = $state(0); const d = c * 2;";
        let program = parse(&alloc, src);
        let mut ctx = CompilationContext::new("test.tsx", src);
        collect_state_vars(&program, &mut ctx, "$state").unwrap();
        collect_derived_candidates(&program, &mut ctx);
        assert!(ctx.state_vars.contains("c"));
        assert!(ctx.memo_vars.contains("d"));
        detect_cycles(&ctx).unwrap();
    }

    #[test]
    fn alias_detected_for_direct_forward() {
        let alloc = Allocator::default();
        let src = "let c = $state(0); const b = c;";
        let program = parse(&alloc, src);
        let mut ctx = CompilationContext::new("test.tsx", src);
        collect_state_vars(&program, &mut ctx, "$state").unwrap();
        collect_derived_candidates(&program, &mut ctx);
        assert!(ctx.alias_vars.contains("b"));
    }

    #[test]
    fn misplaced_state_in_loop_is_fatal() {
        let alloc = Allocator::default();
        let src = "for (let i = 0; i < 3; i++) { let x = $state(i); }";
        let program = parse(&alloc, src);
        let mut ctx = CompilationContext::new("test.tsx", src);
        let err = collect_state_vars(&program, &mut ctx, "$state").unwrap_err();
        assert_eq!(err.code, diagnostics::EFICT_STATE_PLACEMENT);
    }

    #[test]
    fn cycle_is_detected() {
        let alloc = Allocator::default();
        let src = "let s = $state(0); const a = b + s; const b = a + 1;";
        let program = parse(&alloc, src);
        let mut ctx = CompilationContext::new("test.tsx", src);
        collect_state_vars(&program, &mut ctx, "$state").unwrap();
        collect_derived_candidates(&program, &mut ctx);
        let err = detect_cycles(&ctx).unwrap_err();
        assert_eq!(err.code, diagnostics::EFICT_CYCLE);
    }
}
