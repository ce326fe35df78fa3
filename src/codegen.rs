//! Thin `oxc_codegen` wrapper (external collaborator boundary). The core
//! pipeline never calls the printer itself (§1); this module exists only
//! for tests/demos that want to assert on emitted text, mirroring the
//! teacher's staged `generate_runtime_code_internal` convenience without
//! its `ZenIR`-specific input shape.

use oxc_ast::ast::Program;
use oxc_codegen::Codegen;

pub fn print_program(program: &Program<'_>) -> String {
    Codegen::new().build(program).code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify;
    use crate::context::CompilationContext;
    use crate::options::CompilerOptions;
    use crate::parse::parse_module;
    use crate::transform::TransformVisitor;
    use oxc_ast_visit::VisitMut;

    #[test]
    fn prints_transformed_signal_read() {
        let alloc = Allocator::default();
        let src = "let c = $state(0); const d = c * 2;";
        let mut result = parse_module(&alloc, src, false);
        let mut ctx = CompilationContext::new("test.tsx", src);
        classify::collect_state_vars(&result.program, &mut ctx, "$state").unwrap();
        classify::collect_derived_candidates(&result.program, &mut ctx);
        let mut opts = CompilerOptions::default();
        let mut visitor = TransformVisitor::new(&alloc, &mut ctx, &mut opts, "$effect".to_string());
        visitor.visit_program(&mut result.program);
        let printed = print_program(&result.program);
        assert!(printed.contains("Signal("));
        assert!(printed.contains("Memo("));
        assert!(printed.contains("c()"));
    }
}
