//! Property tests for the selector parser: well-formed chains always
//! parse with every engine registered, and the source string survives
//! into error messages for ill-formed input.

use proptest::prelude::*;

use apuntar::{EngineRegistry, parse_selector};

fn ident() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,8}".prop_map(String::from)
}

fn part() -> impl Strategy<Value = String> {
    prop_oneof![
        ident(),
        ident().prop_map(|id| format!("#{id}")),
        ident().prop_map(|class| format!(".{class}")),
        ident().prop_map(|word| format!("text={word}")),
        ident().prop_map(|word| format!("text=\"{word}\"")),
        ident().prop_map(|id| format!("id={id}")),
        ident().prop_map(|id| format!("data-testid={id}")),
        (0usize..5).prop_map(|n| format!("nth={n}")),
        Just("nth=-1".to_string()),
        Just("visible=true".to_string()),
        Just("visible=false".to_string()),
    ]
}

proptest! {
    #[test]
    fn well_formed_chains_parse(parts in prop::collection::vec(part(), 1..5)) {
        let registry = EngineRegistry::with_builtins();
        let source = parts.join(" >> ");
        let parsed = parse_selector(&registry, &source).unwrap();

        prop_assert!(!parsed.parts.is_empty());
        prop_assert_eq!(parsed.parts.len(), parts.len());
        for p in &parsed.parts {
            prop_assert!(registry.contains(&p.name), "engine {} missing", p.name);
        }
        prop_assert_eq!(parsed.capture, None);
    }

    #[test]
    fn capture_mark_round_trips(parts in prop::collection::vec(part(), 1..4), index in 0usize..4) {
        let registry = EngineRegistry::with_builtins();
        let index = index % parts.len();
        let source = parts
            .iter()
            .enumerate()
            .map(|(i, p)| if i == index { format!("*{p}") } else { p.clone() })
            .collect::<Vec<_>>()
            .join(" >> ");

        // A lone `*tag` part is unambiguous; wider bodies would need
        // quoting rules the grammar does not promise.
        if let Ok(parsed) = parse_selector(&registry, &source) {
            prop_assert_eq!(parsed.capture, Some(index));
            prop_assert_eq!(parsed.parts.len(), parts.len());
        }
    }

    #[test]
    fn unknown_engines_fail_with_source(name in "[a-z]{3,8}", body in "[a-z]{1,8}") {
        let registry = EngineRegistry::with_builtins();
        prop_assume!(!registry.contains(&name));
        let source = format!("{name}={body}");
        let err = parse_selector(&registry, &source).unwrap_err();
        prop_assert!(err.to_string().contains(&source));
    }

    #[test]
    fn unterminated_quotes_fail_with_source(word in "[a-z]{1,8}") {
        let registry = EngineRegistry::with_builtins();
        let source = format!("text='{word}");
        let err = parse_selector(&registry, &source).unwrap_err();
        prop_assert!(err.to_string().contains(&source));
    }
}
