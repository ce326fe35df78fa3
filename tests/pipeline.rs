use fict_compiler::compile_module;
use fict_compiler::diagnostics;
use fict_compiler::options::CompilerOptions;
use oxc_allocator::Allocator;

#[test]
fn signal_memo_effect_round_trip() {
    let alloc = Allocator::default();
    let src = "\
import { $state, $effect } from '@fict/runtime';
let count = $state(0);
const doubled = count * 2;
$effect(() => { console.log(doubled); });
count = count + 1;
";
    let out = compile_module(&alloc, "counter.ts", src, false, CompilerOptions::new()).unwrap();
    assert!(out.code.contains("import"));
    assert!(out.code.contains("Signal("));
    assert!(out.code.contains("Memo("));
    assert!(out.code.contains("Effect("));
    assert!(out.code.contains("count()"));
    assert!(out.code.matches("count(").count() >= 2, "expected both reads and the write call");
    assert!(out.helpers_used.contains(&"Signal"));
    assert!(out.helpers_used.contains(&"Memo"));
    assert!(out.helpers_used.contains(&"Effect"));
}

#[test]
fn jsx_child_and_attribute_are_lowered() {
    let alloc = Allocator::default();
    let src = "\
import { $state } from '@fict/runtime';
let count = $state(0);
const view = () => <div className={count > 0 ? 'active' : 'idle'}>{count}</div>;
";
    let out = compile_module(&alloc, "view.tsx", src, false, CompilerOptions::new()).unwrap();
    assert!(out.code.contains("Signal("));
    assert!(out.code.contains("count()"));
}

#[test]
fn region_grouping_combines_branch_outputs_into_one_memo() {
    let alloc = Allocator::default();
    let src = "\
import { $state } from '@fict/runtime';
let count = $state(0);
const view = () => {
  let heading;
  let detail;
  if (count > 0) {
    heading = count;
    detail = count * 2;
  }
  return heading;
};
";
    let out = compile_module(&alloc, "grouped.ts", src, false, CompilerOptions::new()).unwrap();
    assert!(out.code.contains("__region_"));
    assert!(out.code.matches("Memo(").count() >= 1);
}

#[test]
fn lazy_conditional_hoists_condition_and_nulls_other_branch() {
    let alloc = Allocator::default();
    let src = "\
import { $state } from '@fict/runtime';
let count = $state(0);
const view = () => {
  let heading;
  let fallback;
  if (count > 0) {
    heading = count;
  } else {
    fallback = count;
  }
  return heading;
};
";
    let mut opts = CompilerOptions::new();
    opts.lazy_conditional = true;
    let out = compile_module(&alloc, "lazy.ts", src, false, opts).unwrap();
    assert!(out.code.contains("__fictCond_"));
    assert!(out.code.contains("null"));
}

#[test]
fn cyclic_derived_dependency_is_a_fatal_diagnostic() {
    let alloc = Allocator::default();
    let src = "\
import { $state } from '@fict/runtime';
let s = $state(0);
const a = b + s;
const b = a + 1;
";
    let err = compile_module(&alloc, "cycle.ts", src, false, CompilerOptions::new()).unwrap_err();
    assert_eq!(err.code, diagnostics::EFICT_CYCLE);
}

#[test]
fn state_declared_inside_a_loop_is_rejected() {
    let alloc = Allocator::default();
    let src = "\
import { $state } from '@fict/runtime';
for (let i = 0; i < 3; i++) {
  let x = $state(i);
}
";
    let err = compile_module(&alloc, "loop.ts", src, false, CompilerOptions::new()).unwrap_err();
    assert_eq!(err.code, diagnostics::EFICT_STATE_PLACEMENT);
}

#[test]
fn state_used_without_import_is_rejected() {
    let alloc = Allocator::default();
    let src = "let count = $state(0);\n";
    let err = compile_module(&alloc, "unimported.ts", src, false, CompilerOptions::new()).unwrap_err();
    assert_eq!(err.code, diagnostics::EFICT_UNIMPORTED);
}
