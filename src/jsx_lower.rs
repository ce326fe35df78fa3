//! JSX Lowering Decision Machine. Classifies each JSX attribute/child
//! position (§3 JSX Position Classes) and lowers it into the appropriate
//! runtime helper call. Grounded on the teacher's `JsxLowerer` (in-place
//! `*expr = lowered` rewrite via `AstBuilder`, `VisitMut`), generalized from
//! a single VDOM `createElement` target into the position-dependent
//! decision table this dialect needs.

use oxc_allocator::{Box as oxc_box, CloneIn};
use oxc_ast::ast::*;
use oxc_ast::AstBuilder;
use oxc_span::SPAN;

use crate::ast_util;
use crate::classify_support::free_vars;
use crate::context::CompilationContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsxPosition {
    StaticChild,
    ReactiveChild,
    ReactiveAttribute,
    EventHandler,
    NonReactiveAttribute,
}

pub fn classify_attribute_name(name: &str) -> JsxPosition {
    if name == "key" || name == "ref" {
        return JsxPosition::NonReactiveAttribute;
    }
    if name.len() > 2 && name.starts_with("on") && name.as_bytes()[2].is_ascii_uppercase() {
        return JsxPosition::EventHandler;
    }
    JsxPosition::ReactiveAttribute
}

pub(crate) fn reads_tracked(expr: &Expression<'_>, ctx: &CompilationContext<'_>) -> bool {
    free_vars(expr).iter().any(|n| ctx.is_tracked(n))
}

/// Lowers a JSX attribute's value expression in place according to its
/// position class. `attr_name` has already been extracted by the caller.
pub fn lower_attribute_value<'a, 'o>(
    ast: &AstBuilder<'a>,
    attr_name: &str,
    value: &mut Expression<'a>,
    ctx: &mut CompilationContext<'o>,
) {
    match classify_attribute_name(attr_name) {
        JsxPosition::EventHandler | JsxPosition::NonReactiveAttribute => {
            // Inner reads/writes are rewritten by `transform`'s visitor as
            // it walks into this expression; lowering itself does nothing
            // further here.
        }
        JsxPosition::ReactiveAttribute | JsxPosition::ReactiveChild | JsxPosition::StaticChild => {
            if reads_tracked(value, ctx) {
                let wrapped = ast_util::thunk(ast, value.clone_in(ast.allocator));
                *value = wrapped;
            }
        }
    }
}

/// Lowers one JSX child expression (`{e}`) per §4.4. Returns the lowered
/// expression to substitute into the children list.
pub fn lower_child_expression<'a, 'o>(
    ast: &AstBuilder<'a>,
    expr: &Expression<'a>,
    ctx: &mut CompilationContext<'o>,
    fine_grained_dom: bool,
) -> Expression<'a> {
    // Already a function literal: leave as-is, caller's visitor still
    // recurses into its body for nested reads.
    if matches!(
        expr,
        Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_)
    ) {
        return expr.clone_in(ast.allocator);
    }

    if let Expression::ConditionalExpression(cond) = expr {
        if reads_tracked(&cond.test, ctx) {
            return lower_conditional(ast, &cond.test, &cond.consequent, Some(&cond.alternate), ctx, fine_grained_dom);
        }
    }

    if let Expression::LogicalExpression(logical) = expr {
        if logical.operator == LogicalOperator::And && reads_tracked(&logical.left, ctx) {
            return lower_conditional(ast, &logical.left, &logical.right, None, ctx, fine_grained_dom);
        }
    }

    if let Expression::CallExpression(call) = expr {
        if is_map_call(call) {
            if let Expression::StaticMemberExpression(member) = &call.callee {
                if reads_tracked(&member.object, ctx) {
                    return lower_keyed_list(ast, call, ctx);
                }
            }
        }
    }

    if reads_tracked(expr, ctx) {
        ctx.use_helper("Insert");
        let thunked = ast_util::thunk(ast, expr.clone_in(ast.allocator));
        let mut args = ast.vec();
        args.push(Argument::from(thunked));
        return ast_util::call_helper(ast, "Insert", args);
    }

    expr.clone_in(ast.allocator)
}

pub(crate) fn is_map_call(call: &CallExpression<'_>) -> bool {
    matches!(&call.callee, Expression::StaticMemberExpression(m) if m.property.name == "map")
        && call.arguments.len() == 1
}

pub(crate) fn lower_conditional<'a, 'o>(
    ast: &AstBuilder<'a>,
    test: &Expression<'a>,
    consequent: &Expression<'a>,
    alternate: Option<&Expression<'a>>,
    ctx: &mut CompilationContext<'o>,
    _fine_grained_dom: bool,
) -> Expression<'a> {
    ctx.use_helper("Conditional");
    let test_thunk = ast_util::thunk(ast, test.clone_in(ast.allocator));
    let consequent_thunk = ast_util::thunk(ast, consequent.clone_in(ast.allocator));
    let create_element = ast.expression_identifier(SPAN, "createElement");

    let mut args = ast.vec();
    args.push(Argument::from(test_thunk));
    args.push(Argument::from(consequent_thunk));
    args.push(Argument::from(create_element));
    if let Some(alt) = alternate {
        let alt_thunk = ast_util::thunk(ast, alt.clone_in(ast.allocator));
        args.push(Argument::from(alt_thunk));
    }
    ast_util::call_helper(ast, "Conditional", args)
}

pub(crate) fn lower_keyed_list<'a, 'o>(
    ast: &AstBuilder<'a>,
    call: &CallExpression<'a>,
    ctx: &mut CompilationContext<'o>,
) -> Expression<'a> {
    ctx.use_helper("KeyedList");
    let Expression::StaticMemberExpression(member) = &call.callee else {
        return Expression::from(call.clone_in(ast.allocator));
    };
    let source_thunk = ast_util::thunk(ast, member.object.clone_in(ast.allocator));
    let render_fn = call.arguments[0]
        .as_expression()
        .map(|e| e.clone_in(ast.allocator))
        .unwrap_or_else(|| ast.expression_identifier(SPAN, "undefined"));

    let key_fn = extracted_key(ast, &render_fn).unwrap_or_else(|| fallback_index_key_fn(ast));

    let mut args = ast.vec();
    args.push(Argument::from(source_thunk));
    args.push(Argument::from(key_fn));
    args.push(Argument::from(render_fn));
    args.push(Argument::from(ast.expression_identifier(SPAN, "createElement")));
    ast_util::call_helper(ast, "KeyedList", args)
}

/// Extracts a real key function from the render function's own `key={...}`
/// attribute on the JSX element it returns: `(item) => item.id` rather than
/// the positional fallback, per §4.4.
fn extracted_key<'a>(ast: &AstBuilder<'a>, render_fn: &Expression<'a>) -> Option<Expression<'a>> {
    let param_name = first_param_name(render_fn)?;
    let element = match render_fn_return_expression(render_fn)? {
        Expression::JSXElement(el) => &**el,
        _ => return None,
    };
    let key_expr = jsx_key_attribute(ast, element)?;
    Some(build_key_fn(ast, &param_name, key_expr))
}

fn first_param_name(render_fn: &Expression<'_>) -> Option<String> {
    let params = match render_fn {
        Expression::ArrowFunctionExpression(arrow) => &arrow.params,
        Expression::FunctionExpression(func) => &func.params,
        _ => return None,
    };
    params.items.first().and_then(|p| match &p.pattern {
        BindingPattern::BindingIdentifier(id) => Some(id.name.to_string()),
        _ => None,
    })
}

fn render_fn_return_expression<'a, 'b>(render_fn: &'b Expression<'a>) -> Option<&'b Expression<'a>> {
    match render_fn {
        Expression::ArrowFunctionExpression(arrow) => {
            if arrow.expression {
                arrow.body.statements.first().and_then(|s| match s {
                    Statement::ExpressionStatement(e) => Some(&e.expression),
                    _ => None,
                })
            } else {
                find_return_argument(&arrow.body.statements)
            }
        }
        Expression::FunctionExpression(func) => {
            func.body.as_ref().and_then(|b| find_return_argument(&b.statements))
        }
        _ => None,
    }
}

fn find_return_argument<'a, 'b>(stmts: &'b oxc_allocator::Vec<'a, Statement<'a>>) -> Option<&'b Expression<'a>> {
    stmts.iter().find_map(|stmt| match stmt {
        Statement::ReturnStatement(ret) => ret.argument.as_ref(),
        _ => None,
    })
}

fn jsx_key_attribute<'a>(ast: &AstBuilder<'a>, element: &JSXElement<'a>) -> Option<Expression<'a>> {
    for attr in &element.opening_element.attributes {
        let JSXAttributeItem::Attribute(attr) = attr else { continue };
        let JSXAttributeName::Identifier(id) = &attr.name else { continue };
        if id.name.as_str() != "key" {
            continue;
        }
        if let Some(JSXAttributeValue::ExpressionContainer(container)) = &attr.value {
            return container.expression.as_expression().map(|e| e.clone_in(ast.allocator));
        }
    }
    None
}

fn build_key_fn<'a>(ast: &AstBuilder<'a>, param_name: &str, key_expr: Expression<'a>) -> Expression<'a> {
    let param_ident = ast.allocator.alloc_str(param_name);
    let params = ast.alloc_formal_parameters(
        SPAN,
        FormalParameterKind::ArrowFormalParameters,
        {
            let mut items = ast.vec();
            items.push(ast.plain_formal_parameter(
                SPAN,
                ast.binding_pattern(
                    ast.binding_pattern_kind_binding_identifier(SPAN, param_ident),
                    None::<oxc_box<TSTypeAnnotation>>,
                    false,
                ),
            ));
            items
        },
        None::<oxc_box<BindingRestElement>>,
    );
    let body = ast.alloc_function_body(SPAN, ast.vec(), {
        let mut stmts = ast.vec();
        stmts.push(ast.statement_expression(SPAN, key_expr));
        stmts
    });
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

fn fallback_index_key_fn<'a>(ast: &AstBuilder<'a>) -> Expression<'a> {
    let key_fn_params = ast.alloc_formal_parameters(
        SPAN,
        FormalParameterKind::ArrowFormalParameters,
        {
            let mut items = ast.vec();
            items.push(ast.plain_formal_parameter(
                SPAN,
                ast.binding_pattern(
                    ast.binding_pattern_kind_binding_identifier(SPAN, "item"),
                    None::<oxc_box<TSTypeAnnotation>>,
                    false,
                ),
            ));
            items.push(ast.plain_formal_parameter(
                SPAN,
                ast.binding_pattern(
                    ast.binding_pattern_kind_binding_identifier(SPAN, "index"),
                    None::<oxc_box<TSTypeAnnotation>>,
                    false,
                ),
            ));
            items
        },
        None::<oxc_box<BindingRestElement>>,
    );
    let index_ident = ast.expression_identifier(SPAN, "index");
    let key_body = ast.alloc_function_body(SPAN, ast.vec(), {
        let mut stmts = ast.vec();
        stmts.push(ast.statement_expression(SPAN, index_ident));
        stmts
    });
    ast.expression_arrow_function(
        SPAN,
        true,
        false,
        None::<oxc_box<TSTypeParameterDeclaration>>,
        key_fn_params,
        None::<oxc_box<TSTypeAnnotation>>,
        key_body,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_event_handler() {
        assert_eq!(classify_attribute_name("onClick"), JsxPosition::EventHandler);
        assert_eq!(classify_attribute_name("onClickCapture"), JsxPosition::EventHandler);
    }

    #[test]
    fn classifies_structural_attrs() {
        assert_eq!(classify_attribute_name("key"), JsxPosition::NonReactiveAttribute);
        assert_eq!(classify_attribute_name("ref"), JsxPosition::NonReactiveAttribute);
    }

    #[test]
    fn classifies_reactive_attribute() {
        assert_eq!(classify_attribute_name("className"), JsxPosition::ReactiveAttribute);
    }
}
