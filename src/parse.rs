//! Thin `oxc_parser` wrapper. The parser itself is an external collaborator
//! per the data model's scope boundary; this module only owns the
//! allocator/source-type setup so callers (tests, the entry point, the
//! NAPI surface) don't repeat it, mirroring the teacher's own parse entry
//! shape (`parse_script`) without its HTML5 template parsing, which has no
//! counterpart here.

use oxc_allocator::Allocator;
use oxc_parser::{ParseOptions, Parser, ParserReturn};
use oxc_span::SourceType;

/// Parses `source` as a JS/TS module with JSX enabled. `is_typescript`
/// controls whether TS syntax (type annotations, `as`/`satisfies`, etc.) is
/// accepted; reactive dialect source is plain JS/JSX or TSX, never a
/// distinct template language.
pub fn parse_module<'a>(
    allocator: &'a Allocator,
    source: &'a str,
    is_typescript: bool,
) -> ParserReturn<'a> {
    let source_type = SourceType::default()
        .with_jsx(true)
        .with_typescript(is_typescript)
        .with_module(true);
    Parser::new(allocator, source, source_type)
        .with_options(ParseOptions {
            parse_regular_expression: true,
            ..ParseOptions::default()
        })
        .parse()
}

pub fn program_is_clean(result: &ParserReturn<'_>) -> bool {
    result.errors.is_empty() && !result.panicked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_jsx_source() {
        let alloc = Allocator::default();
        let src = "let c = $state(0); const view = () => <div>{c}</div>;";
        let result = parse_module(&alloc, src, false);
        assert!(program_is_clean(&result));
    }
}
