//! Assertion expressions: the `expect` table, text matchers and deep
//! equality over the wire-value domain.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dom::{style, Document, NodeId};
use crate::result::{EngineError, EngineResult};
use crate::state::{element_state, ElementState, StateProbe};

/// Controller-supplied assertion parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectParams {
    /// Assertion expression, e.g. `to.have.text`
    pub expression: String,
    /// Invert the pass criterion
    #[serde(default)]
    pub is_not: bool,
    /// Expected number for `to.have.count`
    #[serde(default)]
    pub expected_number: Option<f64>,
    /// Expected value for `to.have.property`
    #[serde(default)]
    pub expected_value: Option<Value>,
    /// Attribute/property/css-property name argument
    #[serde(default)]
    pub expression_arg: Option<String>,
    /// Expected text matchers (one per receiver for array forms)
    #[serde(default)]
    pub expected_text: Vec<ExpectedText>,
    /// Read `innerText` instead of `textContent` for text receivers
    #[serde(default)]
    pub use_inner_text: bool,
}

/// One expected-text entry of the value-vs-pattern protocol.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedText {
    /// Literal to compare against
    #[serde(default)]
    pub string: Option<String>,
    /// Substring match instead of full equality
    #[serde(default)]
    pub match_substring: bool,
    /// Trim and collapse whitespace runs on both sides
    #[serde(default)]
    pub normalize_white_space: bool,
    /// Regex source (takes precedence over `string`)
    #[serde(default)]
    pub regex_source: Option<String>,
    /// Regex flags (`i`, `s`, `m` honored)
    #[serde(default)]
    pub regex_flags: Option<String>,
}

/// Result of one assertion evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectCheck {
    /// Whether the assertion (after negation) passed
    pub pass: bool,
    /// The received value, for reporting while unsatisfied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<Value>,
}

// =============================================================================
// ExpectedTextMatcher
// =============================================================================

/// Matches received strings against an [`ExpectedText`]: substring,
/// exact string, or regex, with optional whitespace normalization
/// applied to both sides for the string modes and to neither for regex.
#[derive(Debug)]
pub struct ExpectedTextMatcher {
    regex: Option<Regex>,
    string: Option<String>,
    match_substring: bool,
    normalize_white_space: bool,
}

impl ExpectedTextMatcher {
    /// Compile a matcher.
    ///
    /// # Errors
    ///
    /// Fails when the regex source does not compile.
    pub fn new(expected: &ExpectedText) -> EngineResult<Self> {
        let regex = match &expected.regex_source {
            Some(source) => {
                let flags: String = expected
                    .regex_flags
                    .as_deref()
                    .unwrap_or("")
                    .chars()
                    .filter(|c| matches!(c, 'i' | 's' | 'm'))
                    .collect();
                let pattern = if flags.is_empty() {
                    source.clone()
                } else {
                    format!("(?{flags}){source}")
                };
                Some(
                    Regex::new(&pattern).map_err(|_| EngineError::MalformedBody {
                        engine: "expect".to_string(),
                        body: source.clone(),
                    })?,
                )
            }
            None => None,
        };
        Ok(Self {
            regex,
            string: expected.string.clone(),
            match_substring: expected.match_substring,
            normalize_white_space: expected.normalize_white_space,
        })
    }

    /// Whether the received text satisfies this matcher.
    #[must_use]
    pub fn matches(&self, received: &str) -> bool {
        if let Some(regex) = &self.regex {
            return regex.is_match(received);
        }
        let Some(expected) = &self.string else {
            return false;
        };
        let (received, expected) = if self.normalize_white_space {
            (normalize(received), normalize(expected))
        } else {
            (received.to_string(), expected.clone())
        };
        if self.match_substring {
            received.contains(&expected)
        } else {
            received == expected
        }
    }
}

fn normalize(text: &str) -> String {
    let pieces: Vec<&str> = text.split_whitespace().collect();
    pieces.join(" ")
}

// =============================================================================
// Property values and deep equality
// =============================================================================

/// A value in the RPC value-encoder domain.
#[derive(Debug, Clone, PartialEq)]
pub enum PropValue {
    /// JavaScript `undefined`
    Undefined,
    /// JavaScript `null`
    Null,
    /// Boolean
    Bool(bool),
    /// Number (NaN representable)
    Number(f64),
    /// String
    String(String),
    /// Array
    Array(Vec<PropValue>),
    /// Plain object
    Object(Vec<(String, PropValue)>),
}

impl From<&Value> for PropValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Value::String(s) => Self::String(s.clone()),
            Value::Array(items) => Self::Array(items.iter().map(Self::from).collect()),
            Value::Object(map) => {
                Self::Object(map.iter().map(|(k, v)| (k.clone(), Self::from(v))).collect())
            }
        }
    }
}

impl PropValue {
    /// Render for intermediate-result publishing.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Undefined | Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => serde_json::Number::from_f64(*n)
                .map_or_else(|| Value::String(n.to_string()), Value::Number),
            Self::String(s) => Value::String(s.clone()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

/// Structural deep equality: arrays element-wise, objects by key set
/// with recursive values, and `NaN` equal to `NaN`.
#[must_use]
pub fn deep_equals(a: &PropValue, b: &PropValue) -> bool {
    match (a, b) {
        (PropValue::Undefined, PropValue::Undefined) | (PropValue::Null, PropValue::Null) => true,
        (PropValue::Bool(x), PropValue::Bool(y)) => x == y,
        (PropValue::Number(x), PropValue::Number(y)) => {
            x == y || (x.is_nan() && y.is_nan())
        }
        (PropValue::String(x), PropValue::String(y)) => x == y,
        (PropValue::Array(x), PropValue::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| deep_equals(a, b))
        }
        (PropValue::Object(x), PropValue::Object(y)) => {
            if x.len() != y.len() {
                return false;
            }
            x.iter().all(|(key, value)| {
                y.iter()
                    .find(|(other, _)| other == key)
                    .is_some_and(|(_, other_value)| deep_equals(value, other_value))
            })
        }
        _ => false,
    }
}

/// Read an element property into the value domain.
#[must_use]
pub fn element_property(doc: &Document, el: NodeId, name: &str) -> PropValue {
    match name {
        "value" => PropValue::String(doc.value(el).to_string()),
        "checked" => PropValue::Bool(doc.checked(el)),
        "disabled" => PropValue::Bool(crate::state::is_disabled(doc, el)),
        "id" => PropValue::String(doc.attribute(el, "id").unwrap_or("").to_string()),
        "className" => PropValue::String(doc.attribute(el, "class").unwrap_or("").to_string()),
        "tagName" | "nodeName" => PropValue::String(doc.tag(el).to_ascii_uppercase()),
        "textContent" => PropValue::String(doc.text_content(el)),
        "innerText" => PropValue::String(doc.inner_text(el)),
        "childElementCount" => {
            #[allow(clippy::cast_precision_loss)]
            let count = doc.child_elements(el).len() as f64;
            PropValue::Number(count)
        }
        other => doc
            .attribute(el, other)
            .map_or(PropValue::Undefined, |v| PropValue::String(v.to_string())),
    }
}

// =============================================================================
// The expression table
// =============================================================================

fn state_for_expression(expression: &str) -> Option<ElementState> {
    match expression {
        "to.be.checked" => Some(ElementState::Checked),
        "to.be.disabled" => Some(ElementState::Disabled),
        "to.be.editable" => Some(ElementState::Editable),
        "to.be.enabled" => Some(ElementState::Enabled),
        "to.be.hidden" => Some(ElementState::Hidden),
        "to.be.visible" => Some(ElementState::Visible),
        _ => None,
    }
}

/// Evaluate an assertion against resolved elements.
///
/// Single-element expressions read `elements[0]`; `to.have.count` and
/// the `.array` forms consume the whole list. Negation inverts the pass
/// criterion at the end.
///
/// # Errors
///
/// [`EngineError::UnknownExpectMatcher`] for expressions outside the
/// table; regex compilation failures from the matcher.
pub fn expect_check(
    doc: &Document,
    elements: &[NodeId],
    params: &ExpectParams,
) -> EngineResult<ExpectCheck> {
    let expression = params.expression.as_str();
    let element = elements.first().copied();

    let (pass, received) = if let Some(state) = state_for_expression(expression) {
        match element {
            None => (state == ElementState::Hidden, None),
            Some(el) => match element_state(doc, el, state)? {
                StateProbe::Holds(holds) => (holds, Some(Value::Bool(holds))),
                StateProbe::NotConnected => (state == ElementState::Hidden, None),
            },
        }
    } else {
        match expression {
            "to.be.empty" => match element {
                None => (false, None),
                Some(el) => {
                    let received = if matches!(doc.tag(el), "input" | "textarea") {
                        doc.value(el).to_string()
                    } else {
                        doc.text_content(el)
                    };
                    (received.trim().is_empty(), Some(Value::String(received)))
                }
            },
            "to.be.focused" => match element {
                None => (false, None),
                Some(el) => {
                    let focused = doc.active_element() == Some(el);
                    (focused, Some(Value::Bool(focused)))
                }
            },
            "to.have.count" => {
                let count = elements.len();
                #[allow(clippy::cast_precision_loss)]
                let pass = params.expected_number == Some(count as f64);
                (pass, Some(Value::Number(count.into())))
            }
            "to.have.property" => match element {
                None => (false, None),
                Some(el) => {
                    let name = params.expression_arg.as_deref().unwrap_or("");
                    let actual = element_property(doc, el, name);
                    let expected = params
                        .expected_value
                        .as_ref()
                        .map_or(PropValue::Undefined, PropValue::from);
                    (deep_equals(&actual, &expected), Some(actual.to_json()))
                }
            },
            "to.have.text.array" | "to.have.class.array" => {
                let receiver = if expression == "to.have.text.array" {
                    text_receiver
                } else {
                    class_receiver
                };
                let received: Vec<String> =
                    elements.iter().map(|&el| receiver(doc, el, params)).collect();
                let pass = received.len() == params.expected_text.len()
                    && received
                        .iter()
                        .zip(&params.expected_text)
                        .map(|(text, expected)| {
                            Ok::<bool, EngineError>(
                                ExpectedTextMatcher::new(expected)?.matches(text),
                            )
                        })
                        .collect::<EngineResult<Vec<bool>>>()?
                        .into_iter()
                        .all(|ok| ok);
                let received_json =
                    Value::Array(received.into_iter().map(Value::String).collect());
                (pass, Some(received_json))
            }
            "to.have.attribute" | "to.have.class" | "to.have.css" | "to.have.id"
            | "to.have.text" | "to.have.title" | "to.have.url" | "to.have.value" => {
                match string_receiver(doc, element, expression, params) {
                    None => (false, None),
                    Some(received) => {
                        let expected = params.expected_text.first().cloned().unwrap_or_default();
                        let pass = ExpectedTextMatcher::new(&expected)?.matches(&received);
                        (pass, Some(Value::String(received)))
                    }
                }
            }
            _ => {
                return Err(EngineError::UnknownExpectMatcher {
                    expression: expression.to_string(),
                })
            }
        }
    };

    Ok(ExpectCheck {
        pass: pass != params.is_not,
        received,
    })
}

fn text_receiver(doc: &Document, el: NodeId, params: &ExpectParams) -> String {
    if params.use_inner_text {
        doc.inner_text(el)
    } else {
        doc.text_content(el)
    }
}

fn class_receiver(doc: &Document, el: NodeId, _params: &ExpectParams) -> String {
    doc.attribute(el, "class").unwrap_or("").to_string()
}

fn string_receiver(
    doc: &Document,
    element: Option<NodeId>,
    expression: &str,
    params: &ExpectParams,
) -> Option<String> {
    // Document-level receivers work without an element.
    match expression {
        "to.have.title" => return Some(doc.title().to_string()),
        "to.have.url" => return Some(doc.url().to_string()),
        _ => {}
    }
    let el = element?;
    match expression {
        "to.have.attribute" => params
            .expression_arg
            .as_deref()
            .and_then(|name| doc.attribute(el, name))
            .map(String::from),
        "to.have.class" => Some(class_receiver(doc, el, params)),
        "to.have.css" => {
            let name = params.expression_arg.as_deref()?;
            let inline = doc.attribute(el, "style").map(style::parse_inline_style)?;
            inline.get(name).map(String::from)
        }
        "to.have.id" => Some(doc.attribute(el, "id").unwrap_or("").to_string()),
        "to.have.text" => Some(text_receiver(doc, el, params)),
        "to.have.value" => Some(doc.value(el).to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_expectation(s: &str, normalize: bool) -> ExpectedText {
        ExpectedText {
            string: Some(s.to_string()),
            normalize_white_space: normalize,
            ..ExpectedText::default()
        }
    }

    mod matcher_tests {
        use super::*;

        #[test]
        fn test_exact_string() {
            let m = ExpectedTextMatcher::new(&text_expectation("hello", false)).unwrap();
            assert!(m.matches("hello"));
            assert!(!m.matches(" hello "));
        }

        #[test]
        fn test_normalize_white_space_applies_to_both_sides() {
            let m = ExpectedTextMatcher::new(&text_expectation("hello  world", true)).unwrap();
            assert!(m.matches("  hello \n world  "));
        }

        #[test]
        fn test_substring() {
            let expected = ExpectedText {
                string: Some("ell".to_string()),
                match_substring: true,
                ..ExpectedText::default()
            };
            let m = ExpectedTextMatcher::new(&expected).unwrap();
            assert!(m.matches("hello"));
            assert!(!m.matches("halo"));
        }

        #[test]
        fn test_regex_skips_normalization() {
            let expected = ExpectedText {
                regex_source: Some("^h.llo$".to_string()),
                regex_flags: Some("i".to_string()),
                normalize_white_space: true,
                ..ExpectedText::default()
            };
            let m = ExpectedTextMatcher::new(&expected).unwrap();
            assert!(m.matches("HALLO".to_lowercase().as_str()));
            assert!(m.matches("Hello"));
            assert!(!m.matches(" hello "));
        }
    }

    mod deep_equals_tests {
        use super::*;

        #[test]
        fn test_reflexive_and_nan() {
            let value = PropValue::Array(vec![
                PropValue::Number(1.0),
                PropValue::String("x".into()),
            ]);
            assert!(deep_equals(&value, &value));
            assert!(deep_equals(
                &PropValue::Number(f64::NAN),
                &PropValue::Number(f64::NAN)
            ));
        }

        #[test]
        fn test_arrays_differ_by_length_or_element() {
            let a = PropValue::Array(vec![PropValue::Number(1.0)]);
            let b = PropValue::Array(vec![PropValue::Number(1.0), PropValue::Number(2.0)]);
            let c = PropValue::Array(vec![PropValue::Number(3.0)]);
            assert!(!deep_equals(&a, &b));
            assert!(!deep_equals(&a, &c));
        }

        #[test]
        fn test_objects_by_key_set() {
            let a = PropValue::Object(vec![
                ("x".into(), PropValue::Number(1.0)),
                ("y".into(), PropValue::Bool(true)),
            ]);
            let b = PropValue::Object(vec![
                ("y".into(), PropValue::Bool(true)),
                ("x".into(), PropValue::Number(1.0)),
            ]);
            let c = PropValue::Object(vec![("x".into(), PropValue::Number(1.0))]);
            assert!(deep_equals(&a, &b));
            assert!(!deep_equals(&a, &c));
        }

        #[test]
        fn test_mixed_kinds_never_equal() {
            assert!(!deep_equals(&PropValue::Null, &PropValue::Undefined));
            assert!(!deep_equals(
                &PropValue::Number(1.0),
                &PropValue::String("1".into())
            ));
        }
    }

    mod expect_tests {
        use super::*;
        use crate::geometry::Rect;

        fn params(expression: &str) -> ExpectParams {
            ExpectParams {
                expression: expression.to_string(),
                ..ExpectParams::default()
            }
        }

        #[test]
        fn test_text_with_normalization() {
            let mut doc = Document::new();
            let root = doc.root();
            let el = doc.append_element(root, "div", &[]);
            doc.append_text(el, "  hello   world  ");

            let mut p = params("to.have.text");
            p.expected_text = vec![text_expectation("hello world", true)];
            assert!(expect_check(&doc, &[el], &p).unwrap().pass);

            p.expected_text = vec![text_expectation("hello world", false)];
            assert!(!expect_check(&doc, &[el], &p).unwrap().pass);
        }

        #[test]
        fn test_negation_inverts() {
            let mut doc = Document::new();
            let root = doc.root();
            let el = doc.append_element(root, "div", &[("class", "on")]);

            let mut p = params("to.have.class");
            p.expected_text = vec![text_expectation("on", false)];
            assert!(expect_check(&doc, &[el], &p).unwrap().pass);
            p.is_not = true;
            assert!(!expect_check(&doc, &[el], &p).unwrap().pass);
        }

        #[test]
        fn test_count() {
            let mut doc = Document::new();
            let root = doc.root();
            let a = doc.append_element(root, "li", &[]);
            let b = doc.append_element(root, "li", &[]);

            let mut p = params("to.have.count");
            p.expected_number = Some(2.0);
            let check = expect_check(&doc, &[a, b], &p).unwrap();
            assert!(check.pass);
            assert_eq!(check.received, Some(Value::Number(2.into())));
        }

        #[test]
        fn test_property_deep_equality() {
            let mut doc = Document::new();
            let root = doc.root();
            let input = doc.append_element(root, "input", &[]);
            doc.set_value(input, "abc");

            let mut p = params("to.have.property");
            p.expression_arg = Some("value".to_string());
            p.expected_value = Some(Value::String("abc".to_string()));
            assert!(expect_check(&doc, &[input], &p).unwrap().pass);

            p.expected_value = Some(Value::String("xyz".to_string()));
            let check = expect_check(&doc, &[input], &p).unwrap();
            assert!(!check.pass);
            assert_eq!(check.received, Some(Value::String("abc".into())));
        }

        #[test]
        fn test_visible_and_hidden_states() {
            let mut doc = Document::new();
            let root = doc.root();
            let el = doc.append_element(root, "div", &[]);
            doc.set_rect(el, Rect::new(0.0, 0.0, 10.0, 10.0));

            assert!(expect_check(&doc, &[el], &params("to.be.visible")).unwrap().pass);
            assert!(!expect_check(&doc, &[el], &params("to.be.hidden")).unwrap().pass);
            // Missing element counts as hidden.
            assert!(expect_check(&doc, &[], &params("to.be.hidden")).unwrap().pass);
            assert!(!expect_check(&doc, &[], &params("to.be.visible")).unwrap().pass);
        }

        #[test]
        fn test_empty_receiver_kinds() {
            let mut doc = Document::new();
            let root = doc.root();
            let input = doc.append_element(root, "input", &[]);
            let div = doc.append_element(root, "div", &[]);
            doc.append_text(div, "   ");

            assert!(expect_check(&doc, &[input], &params("to.be.empty")).unwrap().pass);
            assert!(expect_check(&doc, &[div], &params("to.be.empty")).unwrap().pass);
            doc.set_value(input, "x");
            assert!(!expect_check(&doc, &[input], &params("to.be.empty")).unwrap().pass);
        }

        #[test]
        fn test_text_array_length_then_per_index() {
            let mut doc = Document::new();
            let root = doc.root();
            let a = doc.append_element(root, "li", &[]);
            doc.append_text(a, "one");
            let b = doc.append_element(root, "li", &[]);
            doc.append_text(b, "two");

            let mut p = params("to.have.text.array");
            p.expected_text = vec![
                text_expectation("one", false),
                text_expectation("two", false),
            ];
            assert!(expect_check(&doc, &[a, b], &p).unwrap().pass);

            p.expected_text.pop();
            assert!(!expect_check(&doc, &[a, b], &p).unwrap().pass);
        }

        #[test]
        fn test_title_and_url_receivers() {
            let mut doc = Document::new();
            doc.set_title("Dashboard");
            doc.set_url("https://example.test/app");

            let mut p = params("to.have.title");
            p.expected_text = vec![text_expectation("Dashboard", false)];
            assert!(expect_check(&doc, &[], &p).unwrap().pass);

            let mut p = params("to.have.url");
            p.expected_text = vec![ExpectedText {
                string: Some("example.test".to_string()),
                match_substring: true,
                ..ExpectedText::default()
            }];
            assert!(expect_check(&doc, &[], &p).unwrap().pass);
        }

        #[test]
        fn test_unknown_matcher() {
            let doc = Document::new();
            let err = expect_check(&doc, &[], &params("to.be.sideways")).unwrap_err();
            assert_eq!(err.to_string(), "Unknown expect matcher: to.be.sideways");
        }
    }
}
