//! Transforming Visitor: the shadow-aware `VisitMut` rewrite of reads,
//! writes, `$state`/`$effect` declarations, and JSX. Grounded directly on
//! the teacher's `ScriptRenamer` (`jsx_lowerer.rs`) — same shadow-stack
//! push/pop-per-binder mechanics — generalized from a single "state" rename
//! target to the full Signal/Memo/Alias/GetterOnly lattice, and wired to
//! `region::group_regions` at each statement-list boundary and to
//! `jsx_lower` for JSX-specific decisions.

use std::collections::HashSet;

use oxc_allocator::{Box as oxc_box, CloneIn, Vec as ArenaVec};
use oxc_ast::ast::*;
use oxc_ast::AstBuilder;
use oxc_ast_visit::{walk_mut, VisitMut};
use oxc_span::SPAN;

use crate::ast_util;
use crate::classify::IdentifierClass;
use crate::context::CompilationContext;
use crate::diagnostics::{self, CompilerError};
use crate::dom;
use crate::jsx_lower;
use crate::options::CompilerOptions;
use crate::region;

pub struct TransformVisitor<'a, 'ctx, 'o, 'opt> {
    pub ast: AstBuilder<'a>,
    pub ctx: &'ctx mut CompilationContext<'o>,
    pub opts: &'opt mut CompilerOptions<'o>,
    pub effect_local: String,
    scope_stack: Vec<HashSet<String>>,
    pub fatal: Option<CompilerError>,
}

impl<'a, 'ctx, 'o, 'opt> TransformVisitor<'a, 'ctx, 'o, 'opt> {
    pub fn new(
        allocator: &'a oxc_allocator::Allocator,
        ctx: &'ctx mut CompilationContext<'o>,
        opts: &'opt mut CompilerOptions<'o>,
        effect_local: String,
    ) -> Self {
        Self {
            ast: AstBuilder::new(allocator),
            ctx,
            opts,
            effect_local,
            scope_stack: vec![HashSet::new()],
            fatal: None,
        }
    }

    fn push_scope(&mut self) {
        self.scope_stack.push(HashSet::new());
    }

    fn pop_scope(&mut self) {
        self.scope_stack.pop();
    }

    fn shadow(&mut self, name: String) {
        if let Some(top) = self.scope_stack.last_mut() {
            top.insert(name);
        }
    }

    fn is_shadowed(&self, name: &str) -> bool {
        self.scope_stack.iter().rev().any(|s| s.contains(name))
    }

    fn tracked_class(&self, name: &str) -> Option<IdentifierClass> {
        if self.is_shadowed(name) {
            return None;
        }
        match self.ctx.classify(name) {
            IdentifierClass::Plain => None,
            other => Some(other),
        }
    }

    fn collect_binding_names(&mut self, pattern: &BindingPattern<'a>) {
        match pattern {
            BindingPattern::BindingIdentifier(id) => self.shadow(id.name.to_string()),
            BindingPattern::ObjectPattern(obj) => {
                for prop in &obj.properties {
                    self.collect_binding_names(&prop.value);
                }
                if let Some(rest) = &obj.rest {
                    self.collect_binding_names(&rest.argument);
                }
            }
            BindingPattern::ArrayPattern(arr) => {
                for elem in arr.elements.iter().flatten() {
                    self.collect_binding_names(elem);
                }
                if let Some(rest) = &arr.rest {
                    self.collect_binding_names(&rest.argument);
                }
            }
            _ => {}
        }
    }

    fn warn(&mut self, code: &str, msg: String, span: oxc_span::Span) {
        let (line, col) = self.ctx.line_col(span.start);
        let err = CompilerError::new(code, msg, &self.ctx.file, line, col);
        self.ctx.warn(err, self.opts);
    }

    /// Rewrites a tracked identifier read into `name()`.
    fn rewrite_read(&mut self, expr: &mut Expression<'a>, name: &str) {
        *expr = ast_util::call_zero_arg(&self.ast, name);
    }

    /// Handles a top-level `let x = $state(e)` declaration: keeps the
    /// binding but replaces the initializer call target with the runtime
    /// signal constructor.
    fn lower_state_declaration(&mut self, call: &mut CallExpression<'a>) {
        self.ctx.use_helper("Signal");
        if let Expression::Identifier(id) = &mut call.callee {
            let new_name = self.ast.allocator.alloc_str("Signal");
            id.name = new_name.into();
        }
        for arg in call.arguments.iter_mut() {
            if let Some(e) = arg.as_expression_mut() {
                self.visit_expression(e);
            }
        }
    }

    /// Props destructuring (Rule E, SPEC_FULL.md §4.3): a single
    /// object-pattern parameter on a component whose body renders JSX is
    /// rewritten to a synthetic `__props` parameter plus a getter-accessor
    /// prologue, so each original bound name is read reactively through the
    /// ordinary call-site rewrite for the rest of this function body.
    /// No-op (returns without mutating anything) when the parameter list
    /// doesn't match that shape.
    fn destructure_props_if_applicable(&mut self, params: &mut FormalParameters<'a>, body: &mut FunctionBody<'a>) {
        if params.items.len() != 1 {
            return;
        }
        if !matches!(&params.items[0].pattern, BindingPattern::ObjectPattern(_)) {
            return;
        }
        if !crate::classify_support::function_body_contains_jsx(body) {
            return;
        }

        let BindingPattern::ObjectPattern(obj) = &params.items[0].pattern else {
            unreachable!("guarded above")
        };
        let obj = obj.clone_in(self.ast.allocator);

        const PROPS_NAME: &str = "__props";
        let mut prologue: ArenaVec<'a, Statement<'a>> = self.ast.vec();

        for prop in obj.properties.iter() {
            let key_name = match &prop.key {
                PropertyKey::StaticIdentifier(id) => id.name.to_string(),
                _ => continue,
            };
            let (bound_name, default_expr) = match &prop.value {
                BindingPattern::BindingIdentifier(id) => (id.name.to_string(), None),
                BindingPattern::AssignmentPattern(assign) => match &assign.left {
                    BindingPattern::BindingIdentifier(id) => (id.name.to_string(), Some(&assign.right)),
                    _ => continue,
                },
                _ => continue,
            };
            self.shadow(bound_name.clone());
            prologue.push(self.build_props_accessor(PROPS_NAME, &key_name, &bound_name, default_expr));
        }

        if let Some(rest) = &obj.rest {
            if let BindingPattern::BindingIdentifier(rest_id) = &rest.argument {
                let rest_name = rest_id.name.to_string();
                self.warn(
                    diagnostics::FICT_P001,
                    format!("rest pattern `{rest_name}` in props destructuring is not reactive"),
                    rest.span,
                );
                self.shadow(rest_name.clone());
                let props_ident = self.ast.expression_identifier(SPAN, self.ast.allocator.alloc_str(PROPS_NAME));
                prologue.push(ast_util::const_decl(&self.ast, &rest_name, props_ident));
            }
        }

        let mut owned: Vec<Statement<'a>> = Vec::with_capacity(body.statements.len());
        while let Some(s) = body.statements.pop() {
            owned.push(s);
        }
        owned.reverse();

        let mut rebuilt: ArenaVec<'a, Statement<'a>> = self.ast.vec();
        for s in prologue {
            rebuilt.push(s);
        }
        for s in owned {
            rebuilt.push(s);
        }
        body.statements = rebuilt;

        let new_param = self.ast.plain_formal_parameter(
            SPAN,
            self.ast.binding_pattern(
                self.ast.binding_pattern_kind_binding_identifier(SPAN, PROPS_NAME),
                None::<oxc_box<TSTypeAnnotation>>,
                false,
            ),
        );
        let mut new_items = self.ast.vec();
        new_items.push(new_param);
        params.items = new_items;
    }

    /// Builds `const <bound_name> = () => __props.<key_name>` (or, with a
    /// default, `() => { const tmp = __props.<key_name>; return tmp ===
    /// undefined ? default : tmp; }`), reading `__props` fresh on every
    /// call so the accessor stays reactive to prop changes.
    fn build_props_accessor(
        &mut self,
        props_name: &str,
        key_name: &str,
        bound_name: &str,
        default_expr: Option<&Expression<'a>>,
    ) -> Statement<'a> {
        let access = ast_util::static_member(&self.ast, props_name, key_name);

        let (is_expression_body, getter_body) = match default_expr {
            None => {
                let mut stmts = self.ast.vec();
                stmts.push(self.ast.statement_expression(SPAN, access));
                (true, self.ast.alloc_function_body(SPAN, self.ast.vec(), stmts))
            }
            Some(default_e) => {
                let tmp_name = format!("__{bound_name}Raw");
                let tmp_decl = ast_util::const_decl(&self.ast, &tmp_name, access);
                let tmp_ident_test = self.ast.expression_identifier(SPAN, self.ast.allocator.alloc_str(&tmp_name));
                let tmp_ident_value = self.ast.expression_identifier(SPAN, self.ast.allocator.alloc_str(&tmp_name));
                let undefined_lit = self.ast.expression_identifier(SPAN, "undefined");
                let test = self.ast.expression_binary(SPAN, tmp_ident_test, BinaryOperator::StrictEquality, undefined_lit);
                let mut default_clone = default_e.clone_in(self.ast.allocator);
                self.visit_expression(&mut default_clone);
                let conditional = self.ast.expression_conditional(SPAN, test, default_clone, tmp_ident_value);
                let mut stmts = self.ast.vec();
                stmts.push(tmp_decl);
                stmts.push(self.ast.statement_return(SPAN, Some(conditional)));
                (false, self.ast.alloc_function_body(SPAN, self.ast.vec(), stmts))
            }
        };

        let params = self.ast.alloc_formal_parameters(
            SPAN,
            FormalParameterKind::ArrowFormalParameters,
            self.ast.vec(),
            None::<oxc_box<BindingRestElement>>,
        );
        let getter = self.ast.expression_arrow_function(
            SPAN,
            is_expression_body,
            false,
            None::<oxc_box<TSTypeParameterDeclaration>>,
            params,
            None::<oxc_box<TSTypeAnnotation>>,
            getter_body,
        );
        ast_util::const_decl(&self.ast, bound_name, getter)
    }
}

impl<'a, 'ctx, 'o, 'opt> VisitMut<'a> for TransformVisitor<'a, 'ctx, 'o, 'opt> {
    fn visit_program(&mut self, program: &mut Program<'a>) {
        walk_mut::walk_program(self, program);
        region::group_regions(&self.ast, &mut program.body, self.ctx, self.opts.lazy_conditional);
    }

    fn visit_function_body(&mut self, body: &mut FunctionBody<'a>) {
        self.push_scope();
        for stmt in body.statements.iter_mut() {
            self.visit_statement(stmt);
        }
        self.pop_scope();
        region::group_regions(&self.ast, &mut body.statements, self.ctx, self.opts.lazy_conditional);
    }

    fn visit_block_statement(&mut self, block: &mut BlockStatement<'a>) {
        self.push_scope();
        for stmt in block.body.iter_mut() {
            self.visit_statement(stmt);
        }
        self.pop_scope();
    }

    fn visit_statement(&mut self, stmt: &mut Statement<'a>) {
        match stmt {
            Statement::VariableDeclaration(decl) => {
                self.visit_variable_declaration_stmt(decl);
            }
            Statement::FunctionDeclaration(func) => {
                self.push_scope();
                if let Some(body) = &mut func.body {
                    self.destructure_props_if_applicable(&mut func.params, body);
                }
                for param in &func.params.items {
                    self.collect_binding_names(&param.pattern);
                }
                if let Some(body) = &mut func.body {
                    self.visit_function_body(body);
                }
                self.pop_scope();
            }
            _ => walk_mut::walk_statement(self, stmt),
        }
    }

    fn visit_expression(&mut self, expr: &mut Expression<'a>) {
        if let Expression::TSAsExpression(inner) = expr {
            let e = inner.expression.clone_in(self.ast.allocator);
            *expr = e;
            return self.visit_expression(expr);
        }
        if let Expression::TSNonNullExpression(inner) = expr {
            let e = inner.expression.clone_in(self.ast.allocator);
            *expr = e;
            return self.visit_expression(expr);
        }
        if let Expression::TSSatisfiesExpression(inner) = expr {
            let e = inner.expression.clone_in(self.ast.allocator);
            *expr = e;
            return self.visit_expression(expr);
        }

        if let Expression::CallExpression(call) = expr {
            if matches!(&call.callee, Expression::Identifier(id) if id.name == self.effect_local) {
                self.ctx.use_helper("Effect");
                if let Expression::Identifier(id) = &mut call.callee {
                    let name = self.ast.allocator.alloc_str("Effect");
                    id.name = name.into();
                }
                for arg in call.arguments.iter_mut() {
                    if let Some(e) = arg.as_expression_mut() {
                        self.visit_expression(e);
                    }
                }
                return;
            }
        }

        if let Expression::Identifier(id) = expr {
            let name = id.name.to_string();
            if let Some(class) = self.tracked_class(&name) {
                if !matches!(class, IdentifierClass::Signal) {
                    self.ctx.use_helper("Memo");
                }
                self.rewrite_read(expr, &name);
                return;
            }
        }

        if let Expression::ObjectExpression(obj) = expr {
            for prop in obj.properties.iter_mut() {
                if let ObjectPropertyKind::ObjectProperty(p) = prop {
                    if p.shorthand {
                        if let Expression::Identifier(id) = &p.value {
                            let name = id.name.to_string();
                            if self.tracked_class(&name).is_some() {
                                p.shorthand = false;
                                self.visit_expression(&mut p.value);
                                continue;
                            }
                        }
                    }
                }
            }
            walk_mut::walk_object_expression(self, obj);
            return;
        }

        if let Expression::UpdateExpression(update) = expr {
            if let SimpleAssignmentTarget::AssignmentTargetIdentifier(id) = &update.argument {
                let name = id.name.to_string();
                if matches!(self.tracked_class(&name), Some(IdentifierClass::Signal)) {
                    let op = if update.operator == UpdateOperator::Increment { 1.0 } else { -1.0 };
                    let read = ast_util::call_zero_arg(&self.ast, &name);
                    let delta = self.ast.expression_numeric_literal(SPAN, op, None, NumberBase::Decimal);
                    let sum = self.ast.expression_binary(SPAN, read, BinaryOperator::Addition, delta);
                    *expr = ast_util::call_one_arg(&self.ast, &name, sum);
                    return;
                }
            }
        }

        if let Expression::AssignmentExpression(assign) = expr {
            if let AssignmentTarget::AssignmentTargetIdentifier(id) = &assign.target {
                let name = id.name.to_string();
                if matches!(self.tracked_class(&name), Some(IdentifierClass::Signal)) {
                    self.visit_expression(&mut assign.right);
                    let value = if assign.operator == AssignmentOperator::Assign {
                        assign.right.clone_in(self.ast.allocator)
                    } else {
                        let read = ast_util::call_zero_arg(&self.ast, &name);
                        let bin_op = compound_to_binary(assign.operator);
                        self.ast.expression_binary(SPAN, read, bin_op, assign.right.clone_in(self.ast.allocator))
                    };
                    *expr = ast_util::call_one_arg(&self.ast, &name, value);
                    return;
                }
            }
            if let AssignmentTarget::StaticMemberExpression(member) = &assign.target {
                if let Expression::Identifier(id) = &member.object {
                    let name = id.name.to_string();
                    if self.tracked_class(&name).is_some() {
                        self.warn(
                            diagnostics::FICT_M,
                            format!("deep property mutation of tracked value `{name}` is not observed reactively"),
                            member.span,
                        );
                    }
                }
            }
            if let AssignmentTarget::ComputedMemberExpression(member) = &assign.target {
                if let Expression::Identifier(id) = &member.object {
                    let name = id.name.to_string();
                    if self.tracked_class(&name).is_some() {
                        self.warn(
                            diagnostics::FICT_H,
                            format!("dynamic property access on tracked value `{name}` widens tracking"),
                            member.span,
                        );
                    }
                }
            }
            walk_mut::walk_assignment_expression(self, assign);
            return;
        }

        if let Expression::JSXElement(_) | Expression::JSXFragment(_) = expr {
            self.visit_jsx_in_expression(expr);
            return;
        }

        if let Expression::ArrowFunctionExpression(arrow) = expr {
            self.push_scope();
            self.destructure_props_if_applicable(&mut arrow.params, &mut arrow.body);
            for param in &arrow.params.items {
                self.collect_binding_names(&param.pattern);
            }
            self.visit_function_body(&mut arrow.body);
            self.pop_scope();
            return;
        }

        if let Expression::FunctionExpression(func) = expr {
            self.push_scope();
            if let Some(body) = &mut func.body {
                self.destructure_props_if_applicable(&mut func.params, body);
            }
            for param in &func.params.items {
                self.collect_binding_names(&param.pattern);
            }
            if let Some(body) = &mut func.body {
                self.visit_function_body(body);
            }
            self.pop_scope();
            return;
        }

        walk_mut::walk_expression(self, expr);
    }

    fn visit_for_statement(&mut self, stmt: &mut ForStatement<'a>) {
        self.push_scope();
        if let Some(ForStatementInit::VariableDeclaration(decl)) = &stmt.init {
            for d in &decl.declarations {
                if let BindingPattern::BindingIdentifier(id) = &d.id {
                    self.shadow(id.name.to_string());
                }
            }
        }
        if let Some(test) = &mut stmt.test {
            self.visit_expression(test);
        }
        if let Some(update) = &mut stmt.update {
            self.visit_expression(update);
        }
        self.visit_statement(&mut stmt.body);
        self.pop_scope();
    }

    fn visit_for_of_statement(&mut self, stmt: &mut ForOfStatement<'a>) {
        self.push_scope();
        if let ForStatementLeft::VariableDeclaration(decl) = &stmt.left {
            for d in &decl.declarations {
                self.collect_binding_names(&d.id);
            }
        }
        self.visit_expression(&mut stmt.right);
        self.visit_statement(&mut stmt.body);
        self.pop_scope();
    }

    fn visit_for_in_statement(&mut self, stmt: &mut ForInStatement<'a>) {
        self.push_scope();
        if let ForStatementLeft::VariableDeclaration(decl) = &stmt.left {
            for d in &decl.declarations {
                self.collect_binding_names(&d.id);
            }
        }
        self.visit_expression(&mut stmt.right);
        self.visit_statement(&mut stmt.body);
        self.pop_scope();
    }

    fn visit_catch_clause(&mut self, clause: &mut CatchClause<'a>) {
        self.push_scope();
        if let Some(param) = &clause.param {
            self.collect_binding_names(&param.pattern);
        }
        for stmt in clause.body.body.iter_mut() {
            self.visit_statement(stmt);
        }
        self.pop_scope();
    }

    fn visit_import_declaration(&mut self, decl: &mut ImportDeclaration<'a>) {
        let _keep = crate::symbols::strip_macro_specifiers(decl, &self.opts.runtime_module);
        // The program-level import emitter (lib.rs) drops import statements
        // whose specifier list becomes empty and that have no default or
        // namespace specifier, after all modules have run.
    }
}

fn compound_to_binary(op: AssignmentOperator) -> BinaryOperator {
    match op {
        AssignmentOperator::Addition => BinaryOperator::Addition,
        AssignmentOperator::Subtraction => BinaryOperator::Subtraction,
        AssignmentOperator::Multiplication => BinaryOperator::Multiplication,
        AssignmentOperator::Division => BinaryOperator::Division,
        AssignmentOperator::Remainder => BinaryOperator::Remainder,
        AssignmentOperator::Exponential => BinaryOperator::Exponential,
        AssignmentOperator::BitwiseOR => BinaryOperator::BitwiseOR,
        AssignmentOperator::BitwiseAnd => BinaryOperator::BitwiseAnd,
        AssignmentOperator::BitwiseXOR => BinaryOperator::BitwiseXOR,
        AssignmentOperator::ShiftLeft => BinaryOperator::ShiftLeft,
        AssignmentOperator::ShiftRight => BinaryOperator::ShiftRight,
        AssignmentOperator::ShiftRightZeroFill => BinaryOperator::ShiftRightZeroFill,
        _ => BinaryOperator::Addition,
    }
}

impl<'a, 'ctx, 'o, 'opt> TransformVisitor<'a, 'ctx, 'o, 'opt> {
    fn visit_variable_declaration_stmt(&mut self, decl: &mut VariableDeclaration<'a>) {
        for d in decl.declarations.iter_mut() {
            if let BindingPattern::BindingIdentifier(id) = &d.id {
                let name = id.name.to_string();
                if self.ctx.state_vars.contains(&name) {
                    if let Some(Expression::CallExpression(call)) = &mut d.init {
                        self.lower_state_declaration(call);
                    }
                    continue;
                }
                if self.ctx.is_tracked(&name) {
                    if let Some(init) = &mut d.init {
                        self.visit_expression(init);
                        if !self.ctx.getter_only_vars.contains(&name) {
                            self.ctx.use_helper("Memo");
                            let wrapped = ast_util::thunk(&self.ast, init.clone_in(self.ast.allocator));
                            let mut args = self.ast.vec();
                            args.push(Argument::from(wrapped));
                            *init = ast_util::call_helper(&self.ast, "Memo", args);
                        } else {
                            let wrapped = ast_util::thunk(&self.ast, init.clone_in(self.ast.allocator));
                            *init = wrapped;
                        }
                    }
                    self.shadow(name);
                    continue;
                }
                self.shadow(name.clone());
                if let Some(init) = &mut d.init {
                    self.visit_expression(init);
                }
                continue;
            }
            self.collect_binding_names(&d.id);
            if let Some(init) = &mut d.init {
                self.visit_expression(init);
            }
        }
    }

    fn visit_jsx_in_expression(&mut self, expr: &mut Expression<'a>) {
        match expr {
            Expression::JSXElement(element) => {
                let tag_name = dom::jsx_tag_name(&element.opening_element.name);
                if self.opts.fine_grained_dom && dom::is_intrinsic_tag(&tag_name) {
                    *expr = self.lower_intrinsic_jsx(&**element);
                    return;
                }
                for attr in element.opening_element.attributes.iter_mut() {
                    if let JSXAttributeItem::Attribute(attr) = attr {
                        let attr_name = jsx_attribute_name(&attr.name);
                        if let Some(JSXAttributeValue::ExpressionContainer(container)) = &mut attr.value {
                            if let Some(e) = container.expression.as_expression_mut() {
                                self.visit_expression(e);
                                jsx_lower::lower_attribute_value(&self.ast, &attr_name, e, self.ctx);
                            }
                        }
                    }
                }
                for child in element.children.iter_mut() {
                    self.visit_jsx_child(child);
                }
            }
            Expression::JSXFragment(fragment) => {
                for child in fragment.children.iter_mut() {
                    self.visit_jsx_child(child);
                }
            }
            _ => {}
        }
    }

    fn visit_jsx_child(&mut self, child: &mut JSXChild<'a>) {
        match child {
            JSXChild::ExpressionContainer(container) => {
                if let Some(e) = container.expression.as_expression_mut() {
                    self.visit_expression(e);
                    let lowered = jsx_lower::lower_child_expression(
                        &self.ast,
                        e,
                        self.ctx,
                        self.opts.fine_grained_dom,
                    );
                    *e = lowered;
                }
            }
            JSXChild::Element(element) => {
                let mut as_expr = Expression::JSXElement(element.clone_in(self.ast.allocator));
                self.visit_jsx_in_expression(&mut as_expr);
                if let Expression::JSXElement(rebuilt) = as_expr {
                    *element = rebuilt;
                }
            }
            JSXChild::Fragment(fragment) => {
                let mut as_expr = Expression::JSXFragment(fragment.clone_in(self.ast.allocator));
                self.visit_jsx_in_expression(&mut as_expr);
                if let Expression::JSXFragment(rebuilt) = as_expr {
                    *fragment = rebuilt;
                }
            }
            _ => {}
        }
    }

    /// Lowers an intrinsic JSX element directly to `document.createElement`
    /// construction plus per-attribute/child binding statements, wrapped in
    /// an IIFE returning the built node (§4.6). Nested intrinsic children
    /// recurse into this same method; nested components and fragments fall
    /// back to the VDOM path and are mounted via `Insert`.
    fn lower_intrinsic_jsx(&mut self, element: &JSXElement<'a>) -> Expression<'a> {
        let tag_name = dom::jsx_tag_name(&element.opening_element.name);
        let el_name = format!("__el_{}", dom::next_dom_id());

        let mut stmts: ArenaVec<'a, Statement<'a>> = self.ast.vec();

        let tag_atom = self.ast.allocator.alloc_str(&tag_name);
        let mut create_args = self.ast.vec();
        create_args.push(Argument::from(self.ast.expression_string_literal(SPAN, tag_atom, None)));
        let create_call = ast_util::call_method(&self.ast, "document", "createElement", create_args);
        stmts.push(ast_util::const_decl(&self.ast, &el_name, create_call));

        for item in element.opening_element.attributes.iter() {
            match item {
                JSXAttributeItem::Attribute(attr) => {
                    let attr_name = jsx_attribute_name(&attr.name);
                    if attr_name == "key" {
                        continue;
                    }
                    let kind = dom::classify_attribute(&attr.name);
                    let value_expr = self.jsx_attr_value_expression(&attr.value);

                    if matches!(kind, dom::AttributeBindingKind::Ref) {
                        let mut ref_args = self.ast.vec();
                        ref_args.push(Argument::from(
                            self.ast.expression_identifier(SPAN, self.ast.allocator.alloc_str(&el_name)),
                        ));
                        let call = self.ast.expression_call(
                            SPAN,
                            value_expr,
                            None::<oxc_box<TSTypeParameterInstantiation>>,
                            ref_args,
                            false,
                        );
                        stmts.push(self.ast.statement_expression(SPAN, call));
                        continue;
                    }

                    let helper = dom::binding_helper_name(kind);
                    self.ctx.use_helper(helper);
                    let thunked = ast_util::thunk(&self.ast, value_expr);
                    let mut args = self.ast.vec();
                    args.push(Argument::from(
                        self.ast.expression_identifier(SPAN, self.ast.allocator.alloc_str(&el_name)),
                    ));
                    let name_atom = self.ast.allocator.alloc_str(&attr_name);
                    args.push(Argument::from(self.ast.expression_string_literal(SPAN, name_atom, None)));
                    args.push(Argument::from(thunked));
                    if let dom::AttributeBindingKind::Event { capture, passive, once } = kind {
                        args.push(Argument::from(event_options_object(&self.ast, capture, passive, once)));
                    }
                    let call = ast_util::call_helper(&self.ast, helper, args);
                    stmts.push(self.ast.statement_expression(SPAN, call));
                }
                JSXAttributeItem::SpreadAttribute(spread) => {
                    // Spread props aren't resolvable to individual DOM
                    // bindings statically; only the inner reads are
                    // rewritten so the expression still compiles correctly.
                    let mut spread_expr = spread.argument.clone_in(self.ast.allocator);
                    self.visit_expression(&mut spread_expr);
                }
            }
        }

        for child in element.children.iter() {
            self.lower_intrinsic_jsx_child(child, &el_name, &mut stmts);
        }

        let return_el = self.ast.expression_identifier(SPAN, self.ast.allocator.alloc_str(&el_name));
        stmts.push(self.ast.statement_return(SPAN, Some(return_el)));

        let thunk_expr = ast_util::thunk_block(&self.ast, stmts);
        ast_util::call_immediately(&self.ast, thunk_expr)
    }

    /// Resolves a JSX attribute's value to a plain `Expression`, rewriting
    /// inner reads in expression-container values. Mirrors the donor's own
    /// attribute-value match in `JsxLowerer::lower_jsx_element`.
    fn jsx_attr_value_expression(&mut self, value: &Option<JSXAttributeValue<'a>>) -> Expression<'a> {
        match value {
            None => self.ast.expression_boolean_literal(SPAN, true),
            Some(JSXAttributeValue::StringLiteral(s)) => {
                Expression::StringLiteral(self.ast.alloc((**s).clone()))
            }
            Some(JSXAttributeValue::ExpressionContainer(container)) => {
                if let Some(mut e) = container.expression.as_expression().map(|e| e.clone_in(self.ast.allocator)) {
                    self.visit_expression(&mut e);
                    e
                } else {
                    self.ast.expression_identifier(SPAN, "undefined")
                }
            }
            Some(JSXAttributeValue::Element(el)) => {
                let mut as_expr = Expression::JSXElement(el.clone_in(self.ast.allocator));
                self.visit_jsx_in_expression(&mut as_expr);
                as_expr
            }
            Some(JSXAttributeValue::Fragment(frag)) => {
                let mut as_expr = Expression::JSXFragment(frag.clone_in(self.ast.allocator));
                self.visit_jsx_in_expression(&mut as_expr);
                as_expr
            }
        }
    }

    fn lower_intrinsic_jsx_child(
        &mut self,
        child: &JSXChild<'a>,
        el_name: &str,
        stmts: &mut ArenaVec<'a, Statement<'a>>,
    ) {
        match child {
            JSXChild::Text(t) => {
                let text = t.value.trim();
                if text.is_empty() {
                    return;
                }
                let text_atom = self.ast.allocator.alloc_str(text);
                let mut create_args = self.ast.vec();
                create_args.push(Argument::from(self.ast.expression_string_literal(SPAN, text_atom, None)));
                let create_call = ast_util::call_method(&self.ast, "document", "createTextNode", create_args);
                let mut append_args = self.ast.vec();
                append_args.push(Argument::from(create_call));
                let append_call = ast_util::call_method(&self.ast, el_name, "appendChild", append_args);
                stmts.push(self.ast.statement_expression(SPAN, append_call));
            }
            JSXChild::ExpressionContainer(container) => {
                if let Some(e) = container.expression.as_expression() {
                    let mut cloned = e.clone_in(self.ast.allocator);
                    self.visit_expression(&mut cloned);
                    self.emit_dom_child_binding(&cloned, el_name, stmts);
                }
            }
            JSXChild::Element(el) => {
                let child_tag = dom::jsx_tag_name(&el.opening_element.name);
                if dom::is_intrinsic_tag(&child_tag) {
                    let nested = self.lower_intrinsic_jsx(&**el);
                    let mut append_args = self.ast.vec();
                    append_args.push(Argument::from(nested));
                    let append_call = ast_util::call_method(&self.ast, el_name, "appendChild", append_args);
                    stmts.push(self.ast.statement_expression(SPAN, append_call));
                } else {
                    let mut as_expr = Expression::JSXElement(el.clone_in(self.ast.allocator));
                    self.visit_jsx_in_expression(&mut as_expr);
                    self.emit_dom_child_insert(as_expr, el_name, stmts);
                }
            }
            JSXChild::Fragment(frag) => {
                let mut as_expr = Expression::JSXFragment(frag.clone_in(self.ast.allocator));
                self.visit_jsx_in_expression(&mut as_expr);
                self.emit_dom_child_insert(as_expr, el_name, stmts);
            }
            JSXChild::Spread(spread) => {
                let mut arg = spread.expression.clone_in(self.ast.allocator);
                self.visit_expression(&mut arg);
            }
        }
    }

    /// Classifies one reactive JSX child expression the same way
    /// `jsx_lower::lower_child_expression` does for the VDOM path, but
    /// emits a binding statement against the real `el_name` node instead of
    /// substituting a value into a children array (§4.4.1).
    fn emit_dom_child_binding(&mut self, expr: &Expression<'a>, el_name: &str, stmts: &mut ArenaVec<'a, Statement<'a>>) {
        if matches!(expr, Expression::ArrowFunctionExpression(_) | Expression::FunctionExpression(_)) {
            self.ctx.use_helper("bindText");
            let mut args = self.ast.vec();
            args.push(Argument::from(
                self.ast.expression_identifier(SPAN, self.ast.allocator.alloc_str(el_name)),
            ));
            args.push(Argument::from(expr.clone_in(self.ast.allocator)));
            let call = ast_util::call_helper(&self.ast, "bindText", args);
            stmts.push(self.ast.statement_expression(SPAN, call));
            return;
        }

        if let Expression::ConditionalExpression(cond) = expr {
            if jsx_lower::reads_tracked(&cond.test, self.ctx) {
                let lowered = jsx_lower::lower_conditional(
                    &self.ast,
                    &cond.test,
                    &cond.consequent,
                    Some(&cond.alternate),
                    self.ctx,
                    self.opts.fine_grained_dom,
                );
                self.append_marker(lowered, el_name, stmts);
                return;
            }
        }

        if let Expression::LogicalExpression(logical) = expr {
            if logical.operator == LogicalOperator::And && jsx_lower::reads_tracked(&logical.left, self.ctx) {
                let lowered = jsx_lower::lower_conditional(
                    &self.ast,
                    &logical.left,
                    &logical.right,
                    None,
                    self.ctx,
                    self.opts.fine_grained_dom,
                );
                self.append_marker(lowered, el_name, stmts);
                return;
            }
        }

        if let Expression::CallExpression(call) = expr {
            if jsx_lower::is_map_call(call) {
                if let Expression::StaticMemberExpression(member) = &call.callee {
                    if jsx_lower::reads_tracked(&member.object, self.ctx) {
                        let lowered = jsx_lower::lower_keyed_list(&self.ast, call, self.ctx);
                        self.append_marker(lowered, el_name, stmts);
                        return;
                    }
                }
            }
        }

        self.emit_dom_child_insert(expr.clone_in(self.ast.allocator), el_name, stmts);
    }

    /// Appends a `Conditional`/`KeyedList` binding handle's `.marker` onto
    /// the owning element.
    fn append_marker(&mut self, lowered: Expression<'a>, el_name: &str, stmts: &mut ArenaVec<'a, Statement<'a>>) {
        let marker_access = Expression::from(self.ast.member_expression_static(
            SPAN,
            lowered,
            self.ast.identifier_name(SPAN, "marker"),
            false,
        ));
        let mut append_args = self.ast.vec();
        append_args.push(Argument::from(marker_access));
        let append_call = ast_util::call_method(&self.ast, el_name, "appendChild", append_args);
        stmts.push(self.ast.statement_expression(SPAN, append_call));
    }

    /// Mounts a VDOM-lowered child (component/fragment, or a free reactive
    /// expression) into the owning element via `Insert(el, producer,
    /// createElement)`.
    fn emit_dom_child_insert(&mut self, producer: Expression<'a>, el_name: &str, stmts: &mut ArenaVec<'a, Statement<'a>>) {
        self.ctx.use_helper("Insert");
        let thunked = ast_util::thunk(&self.ast, producer);
        let mut args = self.ast.vec();
        args.push(Argument::from(
            self.ast.expression_identifier(SPAN, self.ast.allocator.alloc_str(el_name)),
        ));
        args.push(Argument::from(thunked));
        args.push(Argument::from(self.ast.expression_identifier(SPAN, "createElement")));
        let call = ast_util::call_helper(&self.ast, "Insert", args);
        stmts.push(self.ast.statement_expression(SPAN, call));
    }
}

fn jsx_attribute_name(name: &JSXAttributeName<'_>) -> String {
    match name {
        JSXAttributeName::Identifier(id) => id.name.to_string(),
        JSXAttributeName::NamespacedName(ns) => format!("{}:{}", ns.namespace.name, ns.name.name),
    }
}

/// Builds the `{capture, passive, once}` options object passed as
/// `bindEvent`'s trailing argument.
fn event_options_object<'a>(ast: &AstBuilder<'a>, capture: bool, passive: bool, once: bool) -> Expression<'a> {
    let mut props = ast.vec();
    for (key, value) in [("capture", capture), ("passive", passive), ("once", once)] {
        props.push(ObjectPropertyKind::ObjectProperty(ast.alloc_object_property(
            SPAN,
            PropertyKind::Init,
            PropertyKey::StaticIdentifier(ast.alloc(ast.identifier_name(SPAN, ast.allocator.alloc_str(key)))),
            ast.expression_boolean_literal(SPAN, value),
            false,
            false,
            false,
        )));
    }
    ast.expression_object(SPAN, props)
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxc_allocator::Allocator;
    use oxc_parser::Parser;
    use oxc_span::SourceType;

    #[test]
    fn signal_read_and_increment_rewrite_does_not_panic() {
        let alloc = Allocator::default();
        let source_type = SourceType::default().with_jsx(true);
        let src = "let c = $state(0); c++;";
        let mut program = Parser::new(&alloc, src, source_type).parse().program;
        let mut ctx = CompilationContext::new("test.tsx", src);
        crate::classify::collect_state_vars(&program, &mut ctx, "$state").unwrap();
        let mut opts = CompilerOptions::default();
        let mut visitor = TransformVisitor::new(&alloc, &mut ctx, &mut opts, "$effect".to_string());
        visitor.visit_program(&mut program);
        assert!(visitor.fatal.is_none());
    }

    #[test]
    fn derived_const_wrapped_in_memo() {
        let alloc = Allocator::default();
        let source_type = SourceType::default().with_jsx(true);
        let src = "let c = $state(0); const d = c * 2;";
        let mut program = Parser::new(&alloc, src, source_type).parse().program;
        let mut ctx = CompilationContext::new("test.tsx", src);
        crate::classify::collect_state_vars(&program, &mut ctx, "$state").unwrap();
        crate::classify::collect_derived_candidates(&program, &mut ctx);
        let mut opts = CompilerOptions::default();
        let mut visitor = TransformVisitor::new(&alloc, &mut ctx, &mut opts, "$effect".to_string());
        visitor.visit_program(&mut program);
        assert!(ctx_has_memo_helper(&ctx));
    }

    fn ctx_has_memo_helper(ctx: &CompilationContext<'_>) -> bool {
        ctx.helpers_used.contains("Memo")
    }
}
