//! Selector engine registry.
//!
//! Engines are capability objects: a name plus a `query_all` that maps a
//! `(root, body)` pair to an ordered element list. Every producer engine
//! exists in a piercing and a light variant; the `:light` suffix resolves
//! to the same engine with the piercing flag cleared. The pseudo-engines
//! `nth` and `visible` register here for name validation but always
//! return nothing: the evaluator short-circuits them as filters.

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;

use crate::dom::{ComponentTag, Document, Framework, NodeId};
use crate::result::{EngineError, EngineResult};
use crate::selector::parser::unquote_body;
use crate::selector::{css, text, xpath};

/// Construction-time knobs for the engine.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Consecutive same-rect frames required before an element counts as
    /// stable
    pub stable_frames: usize,
    /// Replace animation-frame cadence with a 16 ms timer
    pub replace_frames_with_timer: bool,
}

impl Settings {
    /// Nominal frame interval used when frames are replaced by a timer.
    pub const FRAME_INTERVAL: Duration = Duration::from_millis(16);
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            stable_frames: 1,
            replace_frames_with_timer: false,
        }
    }
}

/// A selector engine: maps `(root, body)` to an ordered element list.
pub trait SelectorEngine {
    /// Query all elements under `root` selected by `body`.
    ///
    /// # Errors
    ///
    /// Returns an error when the body fails to parse for this engine.
    fn query_all(
        &self,
        doc: &Document,
        root: NodeId,
        body: &str,
        pierce: bool,
    ) -> EngineResult<Vec<NodeId>>;
}

/// Registry of selector engines keyed by engine name.
pub struct EngineRegistry {
    engines: HashMap<String, Rc<dyn SelectorEngine>>,
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.engines.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("EngineRegistry").field("engines", &names).finish()
    }
}

impl EngineRegistry {
    /// Build a registry seeded with the built-in engines.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self {
            engines: HashMap::new(),
        };
        registry.seed("css", Rc::new(CssEngine));
        registry.seed("xpath", Rc::new(XPathEngine));
        registry.seed("text", Rc::new(TextEngine));
        for attr in ["id", "data-testid", "data-test-id", "data-test"] {
            registry.seed(attr, Rc::new(AttributeEngine { attr: attr.to_string() }));
        }
        registry.seed("_react", Rc::new(FrameworkEngine { framework: Framework::React }));
        registry.seed("_vue", Rc::new(FrameworkEngine { framework: Framework::Vue }));
        registry.seed("nth", Rc::new(PseudoEngine));
        registry.seed("visible", Rc::new(PseudoEngine));
        registry
    }

    fn seed(&mut self, name: &str, engine: Rc<dyn SelectorEngine>) {
        self.engines.insert(name.to_string(), engine);
    }

    /// Register a caller-supplied engine.
    ///
    /// # Errors
    ///
    /// Fails when the name (or its `:light` base) is already taken.
    pub fn register(&mut self, name: &str, engine: Rc<dyn SelectorEngine>) -> EngineResult<()> {
        let base = name.strip_suffix(":light").unwrap_or(name);
        if self.engines.contains_key(base) {
            return Err(EngineError::EngineAlreadyRegistered {
                name: base.to_string(),
            });
        }
        self.engines.insert(base.to_string(), engine);
        Ok(())
    }

    /// Whether `name` (possibly `:light`-suffixed) resolves to an engine.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        let base = name.strip_suffix(":light").unwrap_or(name);
        self.engines.contains_key(base)
    }

    /// Resolve a part name to its engine and piercing flag.
    pub(crate) fn resolve(&self, name: &str) -> Option<(Rc<dyn SelectorEngine>, bool)> {
        match name.strip_suffix(":light") {
            Some(base) => self.engines.get(base).map(|e| (Rc::clone(e), false)),
            None => self.engines.get(name).map(|e| (Rc::clone(e), true)),
        }
    }
}

// =============================================================================
// Built-in engines
// =============================================================================

struct CssEngine;

impl SelectorEngine for CssEngine {
    fn query_all(
        &self,
        doc: &Document,
        root: NodeId,
        body: &str,
        pierce: bool,
    ) -> EngineResult<Vec<NodeId>> {
        let list = css::parse_css(body).map_err(|body| EngineError::MalformedBody {
            engine: "css".to_string(),
            body,
        })?;
        Ok(css::query_all(doc, root, &list, pierce))
    }
}

struct XPathEngine;

impl SelectorEngine for XPathEngine {
    fn query_all(
        &self,
        doc: &Document,
        root: NodeId,
        body: &str,
        _pierce: bool,
    ) -> EngineResult<Vec<NodeId>> {
        xpath::query(doc, root, body).map_err(|body| EngineError::MalformedBody {
            engine: "xpath".to_string(),
            body,
        })
    }
}

struct TextEngine;

impl SelectorEngine for TextEngine {
    fn query_all(
        &self,
        doc: &Document,
        root: NodeId,
        body: &str,
        pierce: bool,
    ) -> EngineResult<Vec<NodeId>> {
        let matcher = text::parse_text_body(body).map_err(|body| EngineError::MalformedBody {
            engine: "text".to_string(),
            body,
        })?;
        Ok(text::query_all(doc, root, &matcher, pierce))
    }
}

/// Engine synthesized as CSS `[attr=<json-escaped body>]`.
struct AttributeEngine {
    attr: String,
}

impl SelectorEngine for AttributeEngine {
    fn query_all(
        &self,
        doc: &Document,
        root: NodeId,
        body: &str,
        pierce: bool,
    ) -> EngineResult<Vec<NodeId>> {
        let escaped = serde_json::to_string(body)?;
        let selector = format!("[{}={}]", self.attr, escaped);
        let list = css::parse_css(&selector).map_err(|_| EngineError::MalformedBody {
            engine: self.attr.clone(),
            body: body.to_string(),
        })?;
        Ok(css::query_all(doc, root, &list, pierce))
    }
}

/// Component-tree engine matching framework annotations.
///
/// Body grammar: `Name` with optional `[prop=value]` filters, values
/// quoted or bare.
struct FrameworkEngine {
    framework: Framework,
}

impl SelectorEngine for FrameworkEngine {
    fn query_all(
        &self,
        doc: &Document,
        root: NodeId,
        body: &str,
        pierce: bool,
    ) -> EngineResult<Vec<NodeId>> {
        let engine_name = match self.framework {
            Framework::React => "_react",
            Framework::Vue => "_vue",
        };
        let (name, props) =
            parse_component_body(body).ok_or_else(|| EngineError::MalformedBody {
                engine: engine_name.to_string(),
                body: body.to_string(),
            })?;
        Ok(doc
            .descendant_elements(root, pierce)
            .into_iter()
            .filter(|&el| {
                doc.component(el)
                    .is_some_and(|tag| component_matches(tag, self.framework, &name, &props))
            })
            .collect())
    }
}

fn component_matches(
    tag: &ComponentTag,
    framework: Framework,
    name: &str,
    props: &BTreeMap<String, String>,
) -> bool {
    tag.framework == framework
        && tag.name == name
        && props
            .iter()
            .all(|(key, value)| tag.props.get(key) == Some(value))
}

fn parse_component_body(body: &str) -> Option<(String, BTreeMap<String, String>)> {
    let body = body.trim();
    let name_end = body.find('[').unwrap_or(body.len());
    let name = body[..name_end].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }

    let mut props = BTreeMap::new();
    let mut rest = body[name_end..].trim();
    while !rest.is_empty() {
        let inner_end = rest.find(']')?;
        let inner = &rest.strip_prefix('[')?[..inner_end - 1];
        let (key, raw_value) = inner.split_once('=')?;
        let raw_value = raw_value.trim();
        let value = unquote_body(raw_value).unwrap_or_else(|| raw_value.to_string());
        props.insert(key.trim().to_string(), value);
        rest = rest[inner_end + 1..].trim();
    }
    Some((name.to_string(), props))
}

/// The `nth` and `visible` pseudo-engines produce nothing; the evaluator
/// treats their parts as filters.
struct PseudoEngine;

impl SelectorEngine for PseudoEngine {
    fn query_all(
        &self,
        _doc: &Document,
        _root: NodeId,
        _body: &str,
        _pierce: bool,
    ) -> EngineResult<Vec<NodeId>> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names_resolve() {
        let registry = EngineRegistry::with_builtins();
        for name in [
            "css",
            "css:light",
            "xpath",
            "xpath:light",
            "text",
            "text:light",
            "id",
            "id:light",
            "data-testid",
            "data-test-id",
            "data-test",
            "_react",
            "_vue",
            "nth",
            "visible",
        ] {
            assert!(registry.contains(name), "missing {name}");
        }
        assert!(!registry.contains("glob"));
    }

    #[test]
    fn test_light_resolution_clears_pierce() {
        let registry = EngineRegistry::with_builtins();
        let (_, pierce) = registry.resolve("css").unwrap();
        assert!(pierce);
        let (_, pierce) = registry.resolve("css:light").unwrap();
        assert!(!pierce);
    }

    #[test]
    fn test_register_rejects_taken_names() {
        let mut registry = EngineRegistry::with_builtins();
        let err = registry.register("css", Rc::new(PseudoEngine)).unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn test_attribute_engine_handles_spaces() {
        let mut doc = Document::new();
        let root = doc.root();
        let el = doc.append_element(root, "div", &[("data-testid", "submit button")]);

        let registry = EngineRegistry::with_builtins();
        let (engine, pierce) = registry.resolve("data-testid").unwrap();
        let found = engine.query_all(&doc, root, "submit button", pierce).unwrap();
        assert_eq!(found, vec![el]);
    }

    #[test]
    fn test_framework_engine_matches_name_and_props() {
        let mut doc = Document::new();
        let root = doc.root();
        let card = doc.append_element(root, "div", &[]);
        doc.set_component(card, Framework::React, "BookItem", &[("author", "Melville")]);
        let other = doc.append_element(root, "div", &[]);
        doc.set_component(other, Framework::React, "BookItem", &[("author", "Austen")]);

        let registry = EngineRegistry::with_builtins();
        let (engine, pierce) = registry.resolve("_react").unwrap();
        assert_eq!(
            engine.query_all(&doc, root, "BookItem", pierce).unwrap(),
            vec![card, other]
        );
        assert_eq!(
            engine
                .query_all(&doc, root, "BookItem[author=\"Melville\"]", pierce)
                .unwrap(),
            vec![card]
        );
        let (vue, pierce) = registry.resolve("_vue").unwrap();
        assert!(vue.query_all(&doc, root, "BookItem", pierce).unwrap().is_empty());
    }

    #[test]
    fn test_pseudo_engines_produce_nothing() {
        let doc = Document::new();
        let registry = EngineRegistry::with_builtins();
        let (nth, _) = registry.resolve("nth").unwrap();
        assert!(nth.query_all(&doc, doc.root(), "0", true).unwrap().is_empty());
    }
}
