//! Region Grouper (Rule D) and its lazy-branch variant (Rule J). Operates
//! on one statement list at a time (function body or module top level),
//! called by `transform` immediately before visiting that list item by
//! item, after the items have already been rewritten by the transforming
//! visitor.
//!
//! The monotonic id scheme mirrors the teacher's `EXPRESSION_ID_COUNTER`/
//! `next_expression_id` idiom (`transform.rs`).

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use oxc_allocator::{Box as oxc_box, CloneIn, Vec as ArenaVec};
use oxc_ast::ast::*;
use oxc_ast::AstBuilder;
use oxc_span::SPAN;

use crate::ast_util;
use crate::context::CompilationContext;

static REGION_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_region_id() -> u64 {
    REGION_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Flattens one level of `if`/`else` nesting: an `if` statement contributes
/// the statements of its consequent/alternate blocks (recursively, for
/// `else if` chains) in place of itself, so assignments inside a branch are
/// visible to `collect_outputs`/`next_region` without descending into loops
/// or function bodies, which are never traversed here.
fn flatten_branches<'a, 'b>(stmts: &'b [Statement<'a>], out: &mut Vec<&'b Statement<'a>>) {
    for stmt in stmts {
        match stmt {
            Statement::IfStatement(if_stmt) => {
                flatten_one(&if_stmt.consequent, out);
                if let Some(alt) = &if_stmt.alternate {
                    flatten_one(alt, out);
                }
                out.push(stmt);
            }
            other => out.push(other),
        }
    }
}

fn flatten_one<'a, 'b>(stmt: &'b Statement<'a>, out: &mut Vec<&'b Statement<'a>>) {
    match stmt {
        Statement::BlockStatement(block) => flatten_branches(&block.body, out),
        Statement::IfStatement(_) => flatten_branches(std::slice::from_ref(stmt), out),
        other => out.push(other),
    }
}

/// Collects the statement-list-local output set with a bounded fixed point
/// (bounded by statement count, so ordering of declarations never matters).
/// Assignments one level inside an `if`/`else` branch count toward the same
/// output set as top-level declarations (§4.5 phase 1); deeper nesting
/// (loops, nested functions) is never traversed.
fn collect_outputs<'a, 'o>(
    stmts: &ArenaVec<'a, Statement<'a>>,
    ctx: &CompilationContext<'o>,
) -> Vec<String> {
    let mut flattened = Vec::new();
    flatten_branches(stmts, &mut flattened);

    let local_names: HashSet<String> = flattened
        .iter()
        .filter_map(|s| match s {
            Statement::VariableDeclaration(decl) => Some(decl),
            _ => None,
        })
        .flat_map(|d| d.declarations.iter())
        .filter_map(|d| match &d.id {
            BindingPattern::BindingIdentifier(id) => Some(id.name.to_string()),
            _ => None,
        })
        .collect();

    let mut outputs: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for _ in 0..flattened.len().max(1) {
        let mut changed = false;
        for stmt in &flattened {
            match stmt {
                Statement::VariableDeclaration(decl) => {
                    for d in &decl.declarations {
                        if let (BindingPattern::BindingIdentifier(id), Some(init)) =
                            (&d.id, &d.init)
                        {
                            let name = id.name.to_string();
                            if seen.contains(&name) || matches!(init, Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_)) {
                                continue;
                            }
                            let fv = crate::classify_support::free_vars(init);
                            if fv.iter().any(|n| ctx.is_tracked(n) || seen.contains(n)) {
                                seen.insert(name.clone());
                                outputs.push(name);
                                changed = true;
                            }
                        }
                    }
                }
                Statement::ExpressionStatement(expr_stmt) => {
                    if let Expression::AssignmentExpression(assign) = &expr_stmt.expression {
                        if let AssignmentTarget::AssignmentTargetIdentifier(id) = &assign.target {
                            let name = id.name.to_string();
                            if local_names.contains(&name) && !seen.contains(&name) {
                                let fv = crate::classify_support::free_vars(&assign.right);
                                if fv.iter().any(|n| ctx.is_tracked(n) || seen.contains(n)) {
                                    seen.insert(name.clone());
                                    outputs.push(name);
                                    changed = true;
                                }
                            }
                        }
                    }
                }
                _ => {}
            }
        }
        if !changed {
            break;
        }
    }
    outputs
}

/// Finds the next maximal contiguous region starting at `start`: every
/// statement in the region defines at least one output; a read-only
/// (consumer) statement, or a `return`/`throw`, ends the region.
fn next_region(
    stmts: &[Statement<'_>],
    start: usize,
    outputs: &HashSet<String>,
) -> Option<(usize, usize)> {
    let defines = |stmt: &Statement<'_>| -> bool {
        match stmt {
            Statement::VariableDeclaration(decl) => decl.declarations.iter().any(|d| {
                matches!(&d.id, BindingPattern::BindingIdentifier(id) if outputs.contains(id.name.as_str()))
            }),
            Statement::ExpressionStatement(expr_stmt) => {
                matches!(&expr_stmt.expression, Expression::AssignmentExpression(assign)
                    if matches!(&assign.target, AssignmentTarget::AssignmentTargetIdentifier(id) if outputs.contains(id.name.as_str())))
            }
            Statement::IfStatement(_) => true,
            _ => false,
        }
    };

    let mut i = start;
    while i < stmts.len() && !defines(&stmts[i]) {
        i += 1;
    }
    if i >= stmts.len() {
        return None;
    }
    let region_start = i;
    while i < stmts.len()
        && defines(&stmts[i])
        && !matches!(stmts[i], Statement::ReturnStatement(_) | Statement::ThrowStatement(_))
    {
        i += 1;
    }
    Some((region_start, i))
}

/// Rewrites one statement list in place, replacing qualifying regions with
/// a single memo plus per-output accessors. Statements outside any region,
/// and regions with fewer than two outputs, are left untouched (handled as
/// ordinary per-declaration memos by `transform`).
pub fn group_regions<'a, 'o>(
    ast: &AstBuilder<'a>,
    stmts: &mut ArenaVec<'a, Statement<'a>>,
    ctx: &mut CompilationContext<'o>,
    lazy_conditional: bool,
) {
    let all_outputs = collect_outputs(stmts, ctx);
    if all_outputs.len() < 2 {
        return;
    }
    let output_set: HashSet<String> = all_outputs.iter().cloned().collect();

    let mut rebuilt: ArenaVec<'a, Statement<'a>> = ast.vec();
    let mut idx = 0usize;
    let len = stmts.len();
    // Work over a snapshot slice; arena Statement isn't trivially indexable
    // by value without cloning, so operate by draining into a Vec first.
    let mut owned: Vec<Statement<'a>> = Vec::with_capacity(len);
    while let Some(s) = stmts.pop() {
        owned.push(s);
    }
    owned.reverse();

    while idx < owned.len() {
        match next_region(&owned, idx, &output_set) {
            Some((start, end)) if end > start => {
                for s in owned.iter().take(start).skip(idx) {
                    rebuilt.push(s.clone_in(ast.allocator));
                }

                let mut region_end = end;
                let mut region_outputs: Vec<String> = all_outputs
                    .iter()
                    .filter(|name| owned[start..region_end].iter().any(|s| statement_defines(s, name)))
                    .cloned()
                    .collect();

                // A later reassignment of one of this region's own outputs
                // (before the next return/throw) must join the region too —
                // otherwise it becomes its own single-output region pushed
                // through unmodified, reassigning what is by then a `const`.
                if region_outputs.len() >= 2 {
                    let output_names: HashSet<String> = region_outputs.iter().cloned().collect();
                    let extended_end = extend_region_for_later_reassignment(&owned, region_end, &output_names);
                    if extended_end > region_end {
                        region_end = extended_end;
                        region_outputs = all_outputs
                            .iter()
                            .filter(|name| owned[start..region_end].iter().any(|s| statement_defines(s, name)))
                            .cloned()
                            .collect();
                    }
                }

                let region_stmts: Vec<Statement<'a>> = owned[start..region_end]
                    .iter()
                    .map(|s| s.clone_in(ast.allocator))
                    .collect();

                if region_outputs.len() < 2 {
                    for s in region_stmts {
                        rebuilt.push(s);
                    }
                } else {
                    emit_region(ast, &mut rebuilt, region_stmts, &region_outputs, ctx, lazy_conditional);
                }
                idx = region_end;
            }
            _ => {
                for s in owned.iter().skip(idx) {
                    rebuilt.push(s.clone_in(ast.allocator));
                }
                idx = owned.len();
            }
        }
    }

    *stmts = rebuilt;
}

/// Scans forward from `end` (stopping at the next `return`/`throw`) for a
/// statement that reassigns one of `region_outputs`, and reports the index
/// just past the farthest such statement found. Returns `end` unchanged if
/// none is found, so the region is never shrunk.
fn extend_region_for_later_reassignment(
    owned: &[Statement<'_>],
    end: usize,
    region_outputs: &HashSet<String>,
) -> usize {
    let mut extended = end;
    let mut i = end;
    while i < owned.len() {
        if matches!(owned[i], Statement::ReturnStatement(_) | Statement::ThrowStatement(_)) {
            break;
        }
        if region_outputs.iter().any(|name| produces(&owned[i], name)) {
            extended = i + 1;
        }
        i += 1;
    }
    extended
}

fn statement_defines(stmt: &Statement<'_>, name: &str) -> bool {
    match stmt {
        Statement::VariableDeclaration(decl) => decl.declarations.iter().any(|d| {
            matches!(&d.id, BindingPattern::BindingIdentifier(id) if id.name == name)
        }),
        Statement::ExpressionStatement(expr_stmt) => {
            matches!(&expr_stmt.expression, Expression::AssignmentExpression(assign)
                if matches!(&assign.target, AssignmentTarget::AssignmentTargetIdentifier(id) if id.name == name))
        }
        Statement::BlockStatement(block) => block.body.iter().any(|s| statement_defines(s, name)),
        Statement::IfStatement(if_stmt) => {
            statement_defines(&if_stmt.consequent, name)
                || if_stmt.alternate.as_ref().is_some_and(|alt| statement_defines(alt, name))
        }
        _ => false,
    }
}

/// Locates the first top-level `if` in `stmts` that has a branch-exclusive
/// output (defined in exactly one of consequent/alternate, and not defined
/// by any other statement in the region). Returns the `if`'s index and the
/// set of such names that belong to its consequent branch (the complement,
/// restricted to `outputs`, belongs to the alternate).
fn find_lazy_split(stmts: &[Statement<'_>], outputs: &HashSet<String>) -> Option<(usize, HashSet<String>)> {
    for (idx, stmt) in stmts.iter().enumerate() {
        let Statement::IfStatement(if_stmt) = stmt else { continue };
        let consequent_defined = branch_defines(&if_stmt.consequent, outputs);
        let alternate_defined = if_stmt
            .alternate
            .as_ref()
            .map(|alt| branch_defines(alt, outputs))
            .unwrap_or_default();

        // Bare `let heading;` hoists don't produce a value, so they must not
        // count as "also defined outside this branch" — only assignments and
        // initialized declarations do.
        let outside_defined: HashSet<String> = stmts
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != idx)
            .flat_map(|(_, s)| outputs.iter().filter(move |name| produces(s, name)).cloned())
            .collect();

        let exclusive_to_consequent: HashSet<String> = consequent_defined
            .difference(&alternate_defined)
            .filter(|n| !outside_defined.contains(*n))
            .cloned()
            .collect();
        let exclusive_to_alternate: HashSet<String> = alternate_defined
            .difference(&consequent_defined)
            .filter(|n| !outside_defined.contains(*n))
            .cloned()
            .collect();

        if !exclusive_to_consequent.is_empty() || !exclusive_to_alternate.is_empty() {
            return Some((idx, exclusive_to_consequent));
        }
    }
    None
}

fn branch_defines(stmt: &Statement<'_>, outputs: &HashSet<String>) -> HashSet<String> {
    let mut names = HashSet::new();
    let mut visit = |s: &Statement<'_>| {
        for name in outputs {
            if produces(s, name) {
                names.insert(name.clone());
            }
        }
    };
    match stmt {
        Statement::BlockStatement(block) => {
            for s in &block.body {
                visit(s);
            }
        }
        other => visit(other),
    }
    names
}

/// Like `statement_defines`, but a bare `let heading;` with no initializer
/// does not count — only assignments and initialized declarations actually
/// produce a value for `name`.
fn produces(stmt: &Statement<'_>, name: &str) -> bool {
    match stmt {
        Statement::VariableDeclaration(decl) => decl.declarations.iter().any(|d| {
            d.init.is_some()
                && matches!(&d.id, BindingPattern::BindingIdentifier(id) if id.name == name)
        }),
        Statement::ExpressionStatement(expr_stmt) => {
            matches!(&expr_stmt.expression, Expression::AssignmentExpression(assign)
                if matches!(&assign.target, AssignmentTarget::AssignmentTargetIdentifier(id) if id.name == name))
        }
        Statement::BlockStatement(block) => block.body.iter().any(|s| produces(s, name)),
        Statement::IfStatement(if_stmt) => {
            produces(&if_stmt.consequent, name)
                || if_stmt.alternate.as_ref().is_some_and(|alt| produces(alt, name))
        }
        _ => false,
    }
}

fn emit_region<'a, 'o>(
    ast: &AstBuilder<'a>,
    rebuilt: &mut ArenaVec<'a, Statement<'a>>,
    mut region_stmts: Vec<Statement<'a>>,
    outputs: &[String],
    ctx: &mut CompilationContext<'o>,
    lazy_conditional: bool,
) {
    let region_id = next_region_id();
    let region_name = format!("__region_{region_id}");
    ctx.use_helper("Memo");

    let output_set: HashSet<String> = outputs.iter().cloned().collect();
    let lazy = if lazy_conditional {
        find_lazy_split(&region_stmts, &output_set)
    } else {
        None
    };

    let mut cond_name: Option<String> = None;
    let mut lazy_outputs: HashMap<String, bool> = HashMap::new();
    if let Some((if_idx, in_consequent)) = lazy {
        let cond_id = next_region_id();
        let hoisted_name = format!("__fictCond_{cond_id}");
        let original_test = match &mut region_stmts[if_idx] {
            Statement::IfStatement(if_stmt) => {
                let original_test = if_stmt.test.clone_in(ast.allocator);
                let cond_ident = ast.allocator.alloc_str(&hoisted_name);
                if_stmt.test = ast.expression_identifier(SPAN, cond_ident);
                Some(original_test)
            }
            _ => None,
        };
        if let Some(original_test) = original_test {
            let cond_ident = ast.allocator.alloc_str(&hoisted_name);
            let cond_decl = ast.statement_declaration(ast.declaration_variable(
                SPAN,
                VariableDeclarationKind::Const,
                {
                    let mut decls = ast.vec();
                    decls.push(ast.variable_declarator(
                        SPAN,
                        VariableDeclarationKind::Const,
                        ast.binding_pattern(
                            ast.binding_pattern_kind_binding_identifier(SPAN, cond_ident),
                            None::<oxc_box<TSTypeAnnotation>>,
                            false,
                        ),
                        Some(original_test),
                        false,
                    ));
                    decls
                },
                false,
            ));
            region_stmts.insert(if_idx, cond_decl);
        }
        for name in in_consequent {
            lazy_outputs.insert(name, true);
        }
        cond_name = Some(hoisted_name);
    }

    let mut body_stmts: ArenaVec<'a, Statement<'a>> = ast.vec();
    for s in region_stmts {
        body_stmts.push(s);
    }

    let mut return_props = ast.vec();
    for name in outputs {
        let ident = ast.allocator.alloc_str(name);
        match (lazy_outputs.get(name), &cond_name) {
            (Some(&is_consequent), Some(cond)) => {
                let cond_ident = ast.allocator.alloc_str(cond);
                let test = ast.expression_identifier(SPAN, cond_ident);
                let live = ast.expression_identifier(SPAN, ident);
                let null_lit = ast.expression_null_literal(SPAN);
                let (consequent, alternate) = if is_consequent {
                    (live, null_lit)
                } else {
                    (null_lit, live)
                };
                let value = ast.expression_conditional(SPAN, test, consequent, alternate);
                return_props.push(ObjectPropertyKind::ObjectProperty(ast.alloc_object_property(
                    SPAN,
                    PropertyKind::Init,
                    PropertyKey::StaticIdentifier(ast.alloc(ast.identifier_name(SPAN, ident))),
                    value,
                    false,
                    false,
                    false,
                )));
            }
            _ => {
                return_props.push(ObjectPropertyKind::ObjectProperty(ast.alloc_object_property(
                    SPAN,
                    PropertyKind::Init,
                    PropertyKey::StaticIdentifier(ast.alloc(ast.identifier_name(SPAN, ident))),
                    ast.expression_identifier(SPAN, ident),
                    true,
                    false,
                    false,
                )));
            }
        }
    }
    let return_object = ast.expression_object(SPAN, return_props);
    body_stmts.push(ast.statement_return(SPAN, Some(return_object)));

    let memo_fn = ast_util::thunk_block(ast, body_stmts);
    let mut memo_args = ast.vec();
    memo_args.push(Argument::from(memo_fn));
    let memo_call = ast_util::call_helper(ast, "Memo", memo_args);

    let region_ident = ast.allocator.alloc_str(&region_name);
    let region_decl = ast.statement_declaration(ast.declaration_variable(
        SPAN,
        VariableDeclarationKind::Const,
        {
            let mut decls = ast.vec();
            decls.push(ast.variable_declarator(
                SPAN,
                VariableDeclarationKind::Const,
                ast.binding_pattern(
                    ast.binding_pattern_kind_binding_identifier(SPAN, region_ident),
                    None::<oxc_box<TSTypeAnnotation>>,
                    false,
                ),
                Some(memo_call),
                false,
            ));
            decls
        },
        false,
    ));
    rebuilt.push(region_decl);

    for name in outputs {
        let accessor_name = ast.allocator.alloc_str(name);
        let region_call = ast_util::call_zero_arg(ast, &region_name);
        let prop_access = Expression::from(ast.member_expression_static(
            SPAN,
            region_call,
            ast.identifier_name(SPAN, ast.allocator.alloc_str(name)),
            false,
        ));
        let accessor_body = ast_util::thunk(ast, prop_access);
        let decl = ast.statement_declaration(ast.declaration_variable(
            SPAN,
            VariableDeclarationKind::Const,
            {
                let mut decls = ast.vec();
                decls.push(ast.variable_declarator(
                    SPAN,
                    VariableDeclarationKind::Const,
                    ast.binding_pattern(
                        ast.binding_pattern_kind_binding_identifier(SPAN, accessor_name),
                        None::<oxc_box<TSTypeAnnotation>>,
                        false,
                    ),
                    Some(accessor_body),
                    false,
                ));
                decls
            },
            false,
        ));
        rebuilt.push(decl);
        ctx.memo_vars.insert(name.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify;
    use crate::codegen::print_program;
    use crate::options::CompilerOptions;
    use crate::transform::TransformVisitor;
    use oxc_ast_visit::VisitMut;

    fn run(src: &str, lazy_conditional: bool) -> String {
        let alloc = oxc_allocator::Allocator::default();
        let mut result = crate::parse::parse_module(&alloc, src, false);
        let mut ctx = CompilationContext::new("t.tsx", src);
        classify::collect_state_vars(&result.program, &mut ctx, "$state").unwrap();
        classify::collect_derived_candidates(&result.program, &mut ctx);
        let mut opts = CompilerOptions::new();
        opts.lazy_conditional = lazy_conditional;
        let mut visitor = TransformVisitor::new(&alloc, &mut ctx, &mut opts, "$effect".to_string());
        visitor.visit_program(&mut result.program);
        print_program(&result.program)
    }

    #[test]
    fn groups_multiple_outputs_into_one_region_memo() {
        let src = "function view() {\nconst c = $state(0);\nlet heading; let extra;\nif (c > 0) { heading = c; extra = c; }\nreturn heading;\n}";
        let out = run(src, false);
        assert!(out.contains("__region_"));
        assert!(out.contains("Memo("));
    }

    #[test]
    fn lazy_conditional_fills_other_branch_with_null() {
        let src = "function view() {\nconst c = $state(0);\nlet heading; let extra;\nif (c > 0) { heading = c; } else { extra = c; }\nreturn heading;\n}";
        let out = run(src, true);
        assert!(out.contains("__fictCond_"));
        assert!(out.contains("null"));
    }

    #[test]
    fn later_reassignment_of_a_grouped_output_joins_the_region() {
        let src = "function view() {\nconst c = $state(0);\nlet heading; let extra;\nif (c > 0) { heading = c; extra = c; }\nheading = 'fallback';\nreturn heading;\n}";
        let out = run(src, false);
        // A single region memo absorbs the reassignment; `heading` must stay
        // a `const` accessor derived from the memo, never reassigned itself.
        assert!(out.matches("Memo(").count() == 1);
        assert!(!out.contains("heading = 'fallback'"));
        assert!(!out.contains("heading = \"fallback\""));
    }
}
