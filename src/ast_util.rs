//! Small shared `AstBuilder` helpers used by `transform`, `jsx_lower`,
//! `region` and `dom` for the handful of node shapes each of them needs
//! repeatedly: zero-arg/one-arg accessor calls, and `() => expr` thunks.
//! Centralizing them keeps the AstBuilder call shapes consistent with the
//! one pattern demonstrated in `jsx_lowerer.rs`, rather than each module
//! guessing its own construction.

use oxc_allocator::Box as oxc_box;
use oxc_ast::ast::*;
use oxc_ast::AstBuilder;
use oxc_span::SPAN;

/// Builds `name()` as an `Expression`.
pub fn call_zero_arg<'a>(ast: &AstBuilder<'a>, name: &str) -> Expression<'a> {
    let callee = ast.expression_identifier(SPAN, ast.allocator.alloc_str(name));
    ast.expression_call(
        SPAN,
        callee,
        None::<oxc_box<TSTypeParameterInstantiation>>,
        ast.vec(),
        false,
    )
}

/// Builds `name(arg)` as an `Expression`.
pub fn call_one_arg<'a>(ast: &AstBuilder<'a>, name: &str, arg: Expression<'a>) -> Expression<'a> {
    let callee = ast.expression_identifier(SPAN, ast.allocator.alloc_str(name));
    let mut args = ast.vec();
    args.push(Argument::from(arg));
    ast.expression_call(
        SPAN,
        callee,
        None::<oxc_box<TSTypeParameterInstantiation>>,
        args,
        false,
    )
}

/// Builds a call to an arbitrary runtime helper with the given arguments.
pub fn call_helper<'a>(
    ast: &AstBuilder<'a>,
    helper: &str,
    args: oxc_allocator::Vec<'a, Argument<'a>>,
) -> Expression<'a> {
    let callee = ast.expression_identifier(SPAN, ast.allocator.alloc_str(helper));
    ast.expression_call(
        SPAN,
        callee,
        None::<oxc_box<TSTypeParameterInstantiation>>,
        args,
        false,
    )
}

/// Wraps `expr` in a zero-parameter arrow function: `() => expr`.
pub fn thunk<'a>(ast: &AstBuilder<'a>, expr: Expression<'a>) -> Expression<'a> {
    let params = ast.alloc_formal_parameters(
        SPAN,
        FormalParameterKind::ArrowFormalParameters,
        ast.vec(),
        None::<oxc_box<BindingRestElement>>,
    );
    let mut stmts = ast.vec();
    stmts.push(ast.statement_expression(SPAN, expr));
    let body = ast.alloc_function_body(SPAN, ast.vec(), stmts);
    ast.expression_arrow_function(
        SPAN,
        true,
        false,
        None::<oxc_box<TSTypeParameterDeclaration>>,
        params,
        None::<oxc_box<TSTypeAnnotation>>,
        body,
    )
}

/// Wraps `body_stmts` (already-visited statements) in a zero-parameter
/// arrow function with a block body, used where a thunk needs more than a
/// single expression (region memo bodies).
pub fn thunk_block<'a>(
    ast: &AstBuilder<'a>,
    stmts: oxc_allocator::Vec<'a, Statement<'a>>,
) -> Expression<'a> {
    let params = ast.alloc_formal_parameters(
        SPAN,
        FormalParameterKind::ArrowFormalParameters,
        ast.vec(),
        None::<oxc_box<BindingRestElement>>,
    );
    let body = ast.alloc_function_body(SPAN, ast.vec(), stmts);
    ast.expression_arrow_function(
        SPAN,
        false,
        false,
        None::<oxc_box<TSTypeParameterDeclaration>>,
        params,
        None::<oxc_box<TSTypeAnnotation>>,
        body,
    )
}

/// `name.prop` static member access as an `Expression`.
pub fn static_member<'a>(ast: &AstBuilder<'a>, object_name: &str, prop: &str) -> Expression<'a> {
    let object = ast.expression_identifier(SPAN, ast.allocator.alloc_str(object_name));
    let prop_name = ast.allocator.alloc_str(prop);
    Expression::from(ast.member_expression_static(
        SPAN,
        object,
        ast.identifier_name(SPAN, prop_name),
        false,
    ))
}

/// Builds `const name = init;` as a `Statement`.
pub fn const_decl<'a>(ast: &AstBuilder<'a>, name: &str, init: Expression<'a>) -> Statement<'a> {
    let ident = ast.allocator.alloc_str(name);
    ast.statement_declaration(ast.declaration_variable(
        SPAN,
        VariableDeclarationKind::Const,
        {
            let mut decls = ast.vec();
            decls.push(ast.variable_declarator(
                SPAN,
                VariableDeclarationKind::Const,
                ast.binding_pattern(
                    ast.binding_pattern_kind_binding_identifier(SPAN, ident),
                    None::<oxc_box<TSTypeAnnotation>>,
                    false,
                ),
                Some(init),
                false,
            ));
            decls
        },
        false,
    ))
}

/// Builds `object_name.method(args)` as an `Expression`.
pub fn call_method<'a>(
    ast: &AstBuilder<'a>,
    object_name: &str,
    method: &str,
    args: oxc_allocator::Vec<'a, Argument<'a>>,
) -> Expression<'a> {
    let callee = static_member(ast, object_name, method);
    ast.expression_call(
        SPAN,
        callee,
        None::<oxc_box<TSTypeParameterInstantiation>>,
        args,
        false,
    )
}

/// Immediately invokes `callee` with no arguments: `(callee)()`.
pub fn call_immediately<'a>(ast: &AstBuilder<'a>, callee: Expression<'a>) -> Expression<'a> {
    ast.expression_call(
        SPAN,
        callee,
        None::<oxc_box<TSTypeParameterInstantiation>>,
        ast.vec(),
        false,
    )
}
