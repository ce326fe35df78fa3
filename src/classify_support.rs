//! Shared free-variable collection, used by `classify` (candidate
//! detection), `region` (output dependency detection) and `transform`
//! (props-destructure dependency checks). Kept separate from `classify.rs`
//! since it is a plain data-collecting `Visit` pass with no classification
//! policy of its own.

use std::collections::HashSet;

use oxc_ast::ast::{Expression, FunctionBody, IdentifierReference};
use oxc_ast_visit::Visit;

#[derive(Default)]
pub struct FreeVarCollectorPublic {
    pub names: HashSet<String>,
}

impl<'a> Visit<'a> for FreeVarCollectorPublic {
    fn visit_identifier_reference(&mut self, ident: &IdentifierReference<'a>) {
        self.names.insert(ident.name.to_string());
    }
}

pub fn free_vars(expr: &Expression<'_>) -> HashSet<String> {
    let mut collector = FreeVarCollectorPublic::default();
    collector.visit_expression(expr);
    collector.names
}

#[derive(Default)]
struct JsxPresenceCollector {
    found: bool,
}

impl<'a> Visit<'a> for JsxPresenceCollector {
    fn visit_expression(&mut self, expr: &Expression<'a>) {
        if matches!(expr, Expression::JSXElement(_) | Expression::JSXFragment(_)) {
            self.found = true;
        }
        oxc_ast_visit::walk::walk_expression(self, expr);
    }
}

/// Whether a function body contains any JSX, the trigger condition for Rule
/// E props destructuring.
pub fn function_body_contains_jsx(body: &FunctionBody<'_>) -> bool {
    let mut collector = JsxPresenceCollector::default();
    collector.visit_function_body(body);
    collector.found
}
