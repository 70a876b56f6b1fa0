//! HTML escaping.
//!
//! The default escape callable placed in scope by the escape-injecting
//! renderer. Escaped-output directives compile to a call through a scope
//! variable, so swapping this for a custom callable changes escaping
//! without touching compiled text.

use std::rc::Rc;

use crate::value::{format_value, Callable};

/// Escapes `&`, `<`, `>` and `"` for HTML contexts. `&` is replaced first
/// so already-inserted entities are not double-escaped.
pub fn html_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            other => out.push(other),
        }
    }
    out
}

/// The default escape callable: formats its first argument for output,
/// then HTML-escapes the result.
pub fn default_escape_callable() -> Callable {
    Rc::new(|args| {
        let value = args.first().cloned().unwrap_or(serde_json::Value::Null);
        Ok(serde_json::Value::String(html_escape(&format_value(
            &value,
        ))))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_escapes_markup_characters() {
        assert_eq!(
            html_escape(r#"<a href="x">&"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;"
        );
    }

    #[test]
    fn test_single_quote_untouched() {
        assert_eq!(html_escape("it's"), "it's");
    }

    #[test]
    fn test_default_callable_formats_then_escapes() {
        let escape = default_escape_callable();
        assert_eq!(
            escape(&[json!("<b>")]).unwrap(),
            json!("&lt;b&gt;")
        );
        assert_eq!(escape(&[json!(42)]).unwrap(), json!("42"));
        assert_eq!(escape(&[json!(null)]).unwrap(), json!(""));
        assert_eq!(escape(&[]).unwrap(), json!(""));
    }
}
