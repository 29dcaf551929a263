//! Parser for the chained selector grammar.
//!
//! ```text
//! selector   := part ( ">>" part )*
//! part       := [ "*" ] [ engine "=" ] body
//! engine     := identifier (":" "light")?
//! ```
//!
//! A single `*` prefix marks the capture part. Bodies may be quoted with
//! `'...'` or `"..."` using backslash escapes; quoting is validated here and
//! interpreted by the individual engines.

use crate::result::{EngineError, EngineResult};
use crate::selector::engines::EngineRegistry;

/// One segment of a chained selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorPart {
    /// Engine name, possibly carrying a `:light` suffix
    pub name: String,
    /// Raw body, trimmed, quoting preserved
    pub body: String,
}

/// A parsed chained selector. Immutable value object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSelector {
    /// The original selector string, kept for diagnostics
    pub source: String,
    /// Ordered, non-empty sequence of parts
    pub parts: Vec<SelectorPart>,
    /// Index of the capture part, if one was marked
    pub capture: Option<usize>,
}

/// Parse a chained selector, validating every engine name against the
/// registry.
///
/// # Errors
///
/// Returns [`EngineError::MalformedSelector`] on empty parts, unbalanced
/// quotes or duplicate capture marks, and [`EngineError::UnknownEngine`]
/// when a part names an unregistered engine.
pub fn parse_selector(registry: &EngineRegistry, input: &str) -> EngineResult<ParsedSelector> {
    let malformed = || EngineError::MalformedSelector {
        selector: input.to_string(),
    };

    let raw_parts = split_chain(input).ok_or_else(malformed)?;
    if raw_parts.is_empty() {
        return Err(malformed());
    }

    let mut parts = Vec::with_capacity(raw_parts.len());
    let mut capture = None;
    for raw in raw_parts {
        let mut part = raw.trim();
        if part.is_empty() {
            return Err(malformed());
        }

        // A lone `*` is the CSS universal selector, not a capture mark.
        if part.starts_with('*') && part.len() > 1 {
            if capture.is_some() {
                return Err(malformed());
            }
            capture = Some(parts.len());
            part = part[1..].trim_start();
            if part.is_empty() {
                return Err(malformed());
            }
        }

        let (name, body) = split_engine(part);
        if !registry.contains(&name) {
            return Err(EngineError::UnknownEngine {
                name,
                selector: input.to_string(),
            });
        }
        if !quoting_is_balanced(&body) {
            return Err(malformed());
        }
        parts.push(SelectorPart { name, body });
    }

    Ok(ParsedSelector {
        source: input.to_string(),
        parts,
        capture,
    })
}

/// Split the chain on `>>` outside of quoted regions.
fn split_chain(input: &str) -> Option<Vec<String>> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            current.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '\'' | '"' => {
                quote = Some(ch);
                current.push(ch);
            }
            '>' if chars.peek() == Some(&'>') => {
                chars.next();
                parts.push(current.clone());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if quote.is_some() {
        return None;
    }
    parts.push(current);
    if parts.iter().any(|p| p.trim().is_empty()) {
        return None;
    }
    Some(parts)
}

/// Split `engine=body` when the prefix is a valid engine identifier;
/// otherwise the whole part is a CSS body.
fn split_engine(part: &str) -> (String, String) {
    if let Some(eq) = part.find('=') {
        let candidate = part[..eq].trim();
        if !candidate.is_empty() && candidate.chars().all(is_engine_ident_char) {
            return (
                candidate.to_ascii_lowercase(),
                part[eq + 1..].trim().to_string(),
            );
        }
    }
    ("css".to_string(), part.to_string())
}

fn is_engine_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | ':')
}

fn quoting_is_balanced(body: &str) -> bool {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for ch in body.chars() {
        match quote {
            Some(q) => {
                if escaped {
                    escaped = false;
                } else if ch == '\\' {
                    escaped = true;
                } else if ch == q {
                    quote = None;
                }
            }
            None => {
                if ch == '\'' || ch == '"' {
                    quote = Some(ch);
                }
            }
        }
    }
    quote.is_none() && !escaped
}

/// Unescape a fully-quoted body. Returns `None` when the body is not
/// wrapped in a single pair of matching quotes.
#[must_use]
pub(crate) fn unquote_body(body: &str) -> Option<String> {
    let mut chars = body.chars();
    let quote = chars.next()?;
    if quote != '\'' && quote != '"' {
        return None;
    }
    let mut out = String::with_capacity(body.len());
    let mut escaped = false;
    let mut closed = false;
    for ch in chars {
        if closed {
            // Trailing content after the closing quote: not a plain literal.
            return None;
        }
        if escaped {
            out.push(ch);
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == quote {
            closed = true;
        } else {
            out.push(ch);
        }
    }
    closed.then_some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> EngineRegistry {
        EngineRegistry::with_builtins()
    }

    mod chain_tests {
        use super::*;

        #[test]
        fn test_single_css_part_defaults_engine() {
            let sel = parse_selector(&registry(), "div.list").unwrap();
            assert_eq!(sel.parts.len(), 1);
            assert_eq!(sel.parts[0].name, "css");
            assert_eq!(sel.parts[0].body, "div.list");
            assert_eq!(sel.capture, None);
        }

        #[test]
        fn test_chained_parts_in_order() {
            let sel = parse_selector(&registry(), "div.list >> text=Hello >> nth=1").unwrap();
            let names: Vec<&str> = sel.parts.iter().map(|p| p.name.as_str()).collect();
            assert_eq!(names, vec!["css", "text", "nth"]);
            assert_eq!(sel.parts[1].body, "Hello");
            assert_eq!(sel.parts[2].body, "1");
        }

        #[test]
        fn test_chain_separator_inside_quotes() {
            let sel = parse_selector(&registry(), "text='a >> b' >> button").unwrap();
            assert_eq!(sel.parts.len(), 2);
            assert_eq!(sel.parts[0].body, "'a >> b'");
        }

        #[test]
        fn test_light_suffix_is_a_valid_engine_name() {
            let sel = parse_selector(&registry(), "text:light=Hi").unwrap();
            assert_eq!(sel.parts[0].name, "text:light");
        }
    }

    mod capture_tests {
        use super::*;

        #[test]
        fn test_capture_mark() {
            let sel = parse_selector(&registry(), "*section >> button").unwrap();
            assert_eq!(sel.capture, Some(0));
            assert_eq!(sel.parts[0].body, "section");
        }

        #[test]
        fn test_capture_with_explicit_engine() {
            let sel = parse_selector(&registry(), "div >> *text=Go >> span").unwrap();
            assert_eq!(sel.capture, Some(1));
            assert_eq!(sel.parts[1].name, "text");
        }

        #[test]
        fn test_lone_star_is_universal_css() {
            let sel = parse_selector(&registry(), "*").unwrap();
            assert_eq!(sel.capture, None);
            assert_eq!(sel.parts[0].body, "*");
        }

        #[test]
        fn test_duplicate_capture_rejected() {
            let err = parse_selector(&registry(), "*div >> *span").unwrap_err();
            assert!(err.to_string().contains("*div >> *span"));
        }
    }

    mod error_tests {
        use super::*;

        #[test]
        fn test_unknown_engine() {
            let err = parse_selector(&registry(), "glob=*.item").unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains("Unknown engine \"glob\""));
            assert!(msg.contains("glob=*.item"));
        }

        #[test]
        fn test_empty_part_rejected() {
            assert!(parse_selector(&registry(), "div >> ").is_err());
            assert!(parse_selector(&registry(), ">> div").is_err());
            assert!(parse_selector(&registry(), "").is_err());
        }

        #[test]
        fn test_unterminated_quote_rejected() {
            let err = parse_selector(&registry(), "text='oops").unwrap_err();
            assert!(err.to_string().contains("text='oops"));
        }
    }

    mod unquote_tests {
        use super::*;

        #[test]
        fn test_unquote_single_and_double() {
            assert_eq!(unquote_body("'hello'").as_deref(), Some("hello"));
            assert_eq!(unquote_body("\"hello\"").as_deref(), Some("hello"));
        }

        #[test]
        fn test_unquote_backslash_escapes() {
            assert_eq!(unquote_body(r"'it\'s'").as_deref(), Some("it's"));
            assert_eq!(unquote_body(r#""a\\b""#).as_deref(), Some(r"a\b"));
        }

        #[test]
        fn test_unquote_rejects_bare_and_partial() {
            assert_eq!(unquote_body("hello"), None);
            assert_eq!(unquote_body("'a' trailing"), None);
        }
    }
}
