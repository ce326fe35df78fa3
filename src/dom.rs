//! Fine-grained DOM lowering (§4.6), enabled by `CompilerOptions::fine_grained_dom`.
//! Intrinsic (lowercase-tag) JSX elements are lowered to direct
//! `document.createElement` construction with per-attribute binding calls
//! instead of the VDOM factory path. Attribute classification follows the
//! teacher's attribute-name-to-binding-kind tables (`component.rs`,
//! `document.rs`), reworked against this dialect's runtime contract.

use std::sync::atomic::{AtomicU64, Ordering};

use oxc_ast::ast::{JSXAttributeName, JSXElementName, JSXMemberExpression, JSXMemberExpressionObject};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeBindingKind {
    Text,
    Attribute,
    Property,
    Class,
    Style,
    Ref,
    Event { capture: bool, passive: bool, once: bool },
}

const DOM_PROPERTIES: &[&str] = &[
    "value", "checked", "selected", "disabled", "readOnly", "multiple", "muted",
];

/// Classifies an intrinsic element's attribute name into a DOM binding kind.
/// `is_only_child_text` distinguishes a lone text-producing child binding
/// from a generic attribute; callers applying this to JSX attributes (not
/// children) should never pass that case.
pub fn classify_attribute(name: &JSXAttributeName<'_>) -> AttributeBindingKind {
    let raw = match name {
        JSXAttributeName::Identifier(id) => id.name.as_str(),
        JSXAttributeName::NamespacedName(ns) => return {
            let _ = ns;
            AttributeBindingKind::Attribute
        },
    };

    if raw == "ref" {
        return AttributeBindingKind::Ref;
    }
    if raw == "class" || raw == "className" {
        return AttributeBindingKind::Class;
    }
    if raw == "style" {
        return AttributeBindingKind::Style;
    }
    if DOM_PROPERTIES.contains(&raw) {
        return AttributeBindingKind::Property;
    }
    if raw.len() > 2 && raw.starts_with("on") && raw.as_bytes()[2].is_ascii_uppercase() {
        let (base, capture) = strip_suffix(raw, "Capture");
        let (base, passive) = strip_suffix(base, "Passive");
        let (_base, once) = strip_suffix(base, "Once");
        return AttributeBindingKind::Event { capture, passive, once };
    }
    AttributeBindingKind::Attribute
}

fn strip_suffix<'a>(s: &'a str, suffix: &str) -> (&'a str, bool) {
    if let Some(stripped) = s.strip_suffix(suffix) {
        (stripped, true)
    } else {
        (s, false)
    }
}

pub fn binding_helper_name(kind: AttributeBindingKind) -> &'static str {
    match kind {
        AttributeBindingKind::Text => "bindText",
        AttributeBindingKind::Attribute => "bindAttribute",
        AttributeBindingKind::Property => "bindProperty",
        AttributeBindingKind::Class => "bindClass",
        AttributeBindingKind::Style => "bindStyle",
        AttributeBindingKind::Ref => "ref",
        AttributeBindingKind::Event { .. } => "bindEvent",
    }
}

/// Whether a JSX tag name denotes an intrinsic DOM element (lowercase
/// first character) rather than a component (capitalized or member/
/// namespaced name, which always falls back to the VDOM `createElement`
/// path per §4.6).
pub fn is_intrinsic_tag(tag: &str) -> bool {
    tag.chars().next().is_some_and(|c| c.is_lowercase())
}

/// Resolves a JSX opening element's tag name to a plain string, following
/// the teacher's `get_tag_name`/`get_member_name` (`jsx_lowerer.rs`).
pub fn jsx_tag_name(name: &JSXElementName<'_>) -> String {
    match name {
        JSXElementName::Identifier(id) => id.name.to_string(),
        JSXElementName::IdentifierReference(id) => id.name.to_string(),
        JSXElementName::NamespacedName(ns) => format!("{}:{}", ns.namespace.name, ns.name.name),
        JSXElementName::MemberExpression(me) => jsx_member_name(me),
        JSXElementName::ThisExpression(_) => "this".to_string(),
    }
}

fn jsx_member_name(me: &JSXMemberExpression<'_>) -> String {
    let object = match &me.object {
        JSXMemberExpressionObject::IdentifierReference(id) => id.name.to_string(),
        JSXMemberExpressionObject::MemberExpression(inner) => jsx_member_name(inner),
        _ => "unknown".to_string(),
    };
    format!("{}.{}", object, me.property.name)
}

static DOM_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Monotonic id for synthetic `__el_N` DOM element bindings, mirroring
/// `region.rs`'s `next_region_id`.
pub fn next_dom_id() -> u64 {
    DOM_ID_COUNTER.fetch_add(1, Ordering::SeqCst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intrinsic_tags_are_lowercase() {
        assert!(is_intrinsic_tag("div"));
        assert!(!is_intrinsic_tag("MyComponent"));
    }

    #[test]
    fn event_suffixes_parsed() {
        match classify_attribute(&dummy_ident("onClickCapture")) {
            AttributeBindingKind::Event { capture, passive, once } => {
                assert!(capture);
                assert!(!passive);
                assert!(!once);
            }
            _ => panic!("expected event binding"),
        }
    }

    fn dummy_ident(name: &'static str) -> JSXAttributeName<'static> {
        use oxc_allocator::Allocator;
        use oxc_ast::AstBuilder;
        use oxc_span::SPAN;
        let alloc = Box::leak(Box::new(Allocator::default()));
        let ast = AstBuilder::new(alloc);
        JSXAttributeName::Identifier(ast.alloc(ast.jsx_identifier(SPAN, name)))
    }
}
