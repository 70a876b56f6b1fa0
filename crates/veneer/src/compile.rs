//! Directive template compiler.
//!
//! [`DirectiveCompiler`] translates directive syntax into *program text*,
//! the executable representation the interpreter runs. Translation is pure
//! textual substitution applied in a fixed order:
//!
//! 1. comments `{{-- ... --}}` are stripped,
//! 2. escaped output `{{ expr }}` becomes `<% echo $escape( expr ) %>`,
//! 3. raw output `{!! expr !!}` becomes `<% echo expr %>`,
//! 4. block directives (`@if(...)` ... `@endif`, loops, `@switch`) become
//!    their `<% ... %>` counterparts one-to-one,
//! 5. an optional extension callback transforms the fully-compiled string.
//!
//! Compilation never inspects or evaluates expressions — expression text is
//! copied byte-for-byte into the program text and only evaluated at
//! execution time. Built-in passes cannot fail: unrecognized `@word`s and
//! directives with no matching close paren are left as literal text. Only
//! the extension callback can fail, and its failure propagates.
//!
//! Directive keywords are matched as whole words directly after the `@`
//! sentinel, so `@if` never fires inside `@ifx`. Matching is pattern-based,
//! not a tokenizer: a directive keyword appearing inside a string literal
//! in the template is still substituted. Known limitation, kept for
//! compatibility with the template corpus this syntax comes from.

use std::rc::Rc;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::error::ExecError;

/// Compiler-extension callback: receives the fully-compiled program text,
/// returns a (possibly further transformed) program text. The single
/// supported extension point.
pub type ExtensionFn = Rc<dyn Fn(&str) -> Result<String, Box<dyn std::error::Error>>>;

static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{--.*?--\}\}").expect("comment pattern"));
static ESCAPED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{\{\s*(.+?)\s*\}\}").expect("escaped-output pattern"));
static RAW_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\{!!\s*(.+?)\s*!!\}").expect("raw-output pattern"));
static BLOCK_OPEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@(elseif|if|foreach|for|while|switch|case)\b\s*\(").expect("block-open pattern")
});
static BLOCK_BARE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@(else|endif|endforeach|endfor|endwhile|endswitch|default|break)\b")
        .expect("block-bare pattern")
});

/// Translates directive templates into program text.
///
/// Stateless and deterministic: the same input with the same configuration
/// always yields the same output.
#[derive(Clone)]
pub struct DirectiveCompiler {
    escape_variable: String,
    extension: Option<ExtensionFn>,
}

impl DirectiveCompiler {
    /// Creates a compiler emitting escaped output through the `escape`
    /// scope variable.
    pub fn new() -> Self {
        Self {
            escape_variable: "escape".into(),
            extension: None,
        }
    }

    /// Overrides the scope variable name escaped output calls.
    pub fn with_escape_variable(mut self, name: impl Into<String>) -> Self {
        self.escape_variable = name.into();
        self
    }

    /// Installs the extension callback, applied to the fully-compiled
    /// program text as the final pass.
    pub fn with_extension(mut self, extension: ExtensionFn) -> Self {
        self.extension = Some(extension);
        self
    }

    /// Compiles a directive template into program text.
    ///
    /// Built-in passes are infallible; the only error source is the
    /// extension callback, which fails loudly.
    pub fn compile(&self, template: &str) -> Result<String, ExecError> {
        let stripped = COMMENT_RE.replace_all(template, "");
        let escaped = ESCAPED_RE.replace_all(&stripped, |caps: &Captures| {
            format!("<% echo ${}( {} ) %>", self.escape_variable, &caps[1])
        });
        let raw = RAW_RE.replace_all(&escaped, "<% echo $1 %>");
        let compiled = compile_block_directives(&raw);

        match &self.extension {
            Some(extension) => {
                extension(&compiled).map_err(|e| ExecError::Extension(e.to_string()))
            }
            None => Ok(compiled),
        }
    }
}

impl Default for DirectiveCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Translates block directives, expression-bearing ones first.
fn compile_block_directives(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(caps) = BLOCK_OPEN_RE.captures(rest) {
        let whole = caps.get(0).expect("match 0");
        let keyword = &caps[1];
        // The regex ends on the opening paren.
        let open = whole.end() - 1;
        match balanced_expr(rest, open) {
            Some((expr, after)) => {
                out.push_str(&rest[..whole.start()]);
                out.push_str("<% ");
                out.push_str(keyword);
                out.push_str("( ");
                out.push_str(expr);
                out.push_str(" ): %>");
                rest = &rest[after..];
            }
            None => {
                // No matching close paren anywhere: leave as literal text.
                out.push_str(&rest[..whole.end()]);
                rest = &rest[whole.end()..];
            }
        }
    }
    out.push_str(rest);

    BLOCK_BARE_RE
        .replace_all(&out, |caps: &Captures| match &caps[1] {
            "else" => "<% else: %>".to_string(),
            "default" => "<% default: %>".to_string(),
            "break" => "<% break %>".to_string(),
            end => format!("<% {} %>", end),
        })
        .into_owned()
}

/// Extracts the expression between a balanced paren pair starting at
/// `open`, skipping over single- and double-quoted strings. Returns the
/// expression slice and the index just past the closing paren.
fn balanced_expr(s: &str, open: usize) -> Option<(&str, usize)> {
    let bytes = s.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let b = bytes[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
        } else {
            match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((&s[open + 1..i], i + 1));
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(template: &str) -> String {
        DirectiveCompiler::new()
            .compile(template)
            .expect("built-in compilation is infallible")
    }

    #[test]
    fn test_if_substitution_exact() {
        assert_eq!(compile("@if($var)"), "<% if( $var ): %>");
        assert_eq!(compile("@endif"), "<% endif %>");
        assert_eq!(
            compile("@if($var)text@endif"),
            "<% if( $var ): %>text<% endif %>"
        );
    }

    #[test]
    fn test_full_if_chain() {
        assert_eq!(
            compile("@if($a)A@elseif($b)B@else C@endif"),
            "<% if( $a ): %>A<% elseif( $b ): %>B<% else: %> C<% endif %>"
        );
    }

    #[test]
    fn test_loop_directives() {
        assert_eq!(
            compile("@foreach($items as $item)x@endforeach"),
            "<% foreach( $items as $item ): %>x<% endforeach %>"
        );
        assert_eq!(
            compile("@for($i = 0; $i < 3; $i++)x@endfor"),
            "<% for( $i = 0; $i < 3; $i++ ): %>x<% endfor %>"
        );
        assert_eq!(
            compile("@while($go)x@endwhile"),
            "<% while( $go ): %>x<% endwhile %>"
        );
    }

    #[test]
    fn test_switch_directives() {
        assert_eq!(
            compile("@switch($n)@case(1)one@break@default other@endswitch"),
            "<% switch( $n ): %><% case( 1 ): %>one<% break %><% default: %> other<% endswitch %>"
        );
    }

    #[test]
    fn test_escaped_output() {
        assert_eq!(compile("{{ $var }}"), "<% echo $escape( $var ) %>");
        assert_eq!(compile("{{$var}}"), "<% echo $escape( $var ) %>");
    }

    #[test]
    fn test_raw_output() {
        assert_eq!(compile("{!! $var !!}"), "<% echo $var %>");
    }

    #[test]
    fn test_custom_escape_variable() {
        let compiler = DirectiveCompiler::new().with_escape_variable("e");
        assert_eq!(
            compiler.compile("{{ $var }}").unwrap(),
            "<% echo $e( $var ) %>"
        );
    }

    #[test]
    fn test_comments_stripped() {
        assert_eq!(compile("a{{-- gone --}}b"), "ab");
        assert_eq!(compile("{{-- multi\nline --}}x"), "x");
    }

    #[test]
    fn test_keyword_prefix_not_matched() {
        // `@ifx` is not an `@if` directive.
        assert_eq!(compile("@ifx($var)"), "@ifx($var)");
        assert_eq!(compile("@endiffy"), "@endiffy");
    }

    #[test]
    fn test_unrecognized_directive_left_alone() {
        assert_eq!(compile("@custom($x) stays"), "@custom($x) stays");
    }

    #[test]
    fn test_nested_parens_in_expression() {
        assert_eq!(compile("@if($f($x))"), "<% if( $f($x) ): %>");
    }

    #[test]
    fn test_paren_inside_string_literal() {
        assert_eq!(compile("@if($a == \")\")"), "<% if( $a == \")\" ): %>");
    }

    #[test]
    fn test_unbalanced_paren_left_as_literal() {
        assert_eq!(compile("@if($var"), "@if($var");
    }

    #[test]
    fn test_repeated_directives_substituted_independently() {
        assert_eq!(
            compile("@if($a)x@endif@if($b)y@endif"),
            "<% if( $a ): %>x<% endif %><% if( $b ): %>y<% endif %>"
        );
    }

    #[test]
    fn test_expression_text_copied_byte_for_byte() {
        // Whitespace already present inside the parens is preserved.
        assert_eq!(compile("@if( $var )"), "<% if(  $var  ): %>");
    }

    #[test]
    fn test_literal_text_untouched() {
        let template = "plain text with email@example.com and @ alone";
        assert_eq!(compile(template), template);
    }

    #[test]
    fn test_extension_runs_last_on_compiled_text() {
        let compiler = DirectiveCompiler::new().with_extension(Rc::new(|code| {
            assert!(code.contains("<% if( $x ): %>"));
            Ok(code.replace("@include('x')", "INCLUDED"))
        }));
        let out = compiler.compile("@if($x)@include('x')@endif").unwrap();
        assert_eq!(out, "<% if( $x ): %>INCLUDED<% endif %>");
    }

    #[test]
    fn test_extension_failure_propagates() {
        let compiler = DirectiveCompiler::new()
            .with_extension(Rc::new(|_| Err("bad include".into())));
        let err = compiler.compile("anything").unwrap_err();
        assert!(matches!(err, ExecError::Extension(_)));
        assert!(err.to_string().contains("bad include"));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let compiler = DirectiveCompiler::new();
        let template = "@if($a){{ $b }}@else{!! $c !!}@endif";
        assert_eq!(
            compiler.compile(template).unwrap(),
            compiler.compile(template).unwrap()
        );
    }
}
