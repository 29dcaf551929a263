//! End-to-end scenarios driving the full engine through the `Page`
//! facade: chained selection, capture, strict mode, stability waits,
//! the fill protocol, assertions and hit-target checks.

use std::cell::RefCell;
use std::rc::Rc;

use apuntar::{
    ElementState, ExpectParams, ExpectedText, FillResult, HitCheck, HitTargetResult, Page, Point,
    PollOutcome, Ready, Rect, ScriptedTicks, Settings, Step, TickSource,
};

fn scripted_page(settings: Settings) -> (Page, Rc<RefCell<ScriptedTicks>>) {
    let ticks = Rc::new(RefCell::new(ScriptedTicks::frames()));
    let source: Rc<RefCell<dyn TickSource>> = ticks.clone();
    (Page::new(settings).with_tick_source(source), ticks)
}

fn default_page() -> (Page, Rc<RefCell<ScriptedTicks>>) {
    scripted_page(Settings::default())
}

/// S1: `div.list >> text=Hello >> nth=1` picks the second match across
/// the flattened traversal order.
#[test]
fn chained_css_text_nth() {
    let (page, _) = default_page();
    let expected = {
        let mut doc = page.document_mut();
        let root = doc.root();
        let mut all = Vec::new();
        for _ in 0..2 {
            let list = doc.append_element(root, "div", &[("class", "list")]);
            for _ in 0..2 {
                let child = doc.append_element(list, "span", &[]);
                doc.append_text(child, "Hello");
                all.push(child);
            }
        }
        all[1]
    };

    let found = page
        .query_selector("div.list >> text=Hello >> nth=1", true)
        .unwrap();
    assert_eq!(found, Some(expected));
}

/// S2: a capture mark projects the marked part, not the final one.
#[test]
fn capture_mark_projects_section() {
    let (page, _) = default_page();
    let section = {
        let mut doc = page.document_mut();
        let root = doc.root();
        let section = doc.append_element(root, "section", &[]);
        doc.append_element(section, "button", &[]);
        section
    };

    let found = page.query_selector("*section >> button", true).unwrap();
    assert_eq!(found, Some(section));
}

/// S3: strict resolution over two matches raises the violation
/// diagnostic with previews.
#[test]
fn strict_violation_two_paragraphs() {
    let (page, _) = default_page();
    {
        let mut doc = page.document_mut();
        let root = doc.root();
        doc.append_element(root, "p", &[("class", "x")]);
        doc.append_element(root, "p", &[("class", "x")]);
    }

    let err = page.query_selector("p.x", true).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("strict mode violation: \"p.x\" resolved to 2 elements"));
    assert!(message.contains("1) <p class=\"x\"></p>"));
}

/// S4: with two required stable frames, the wait survives a rect change
/// and resolves on the second same-rect frame after it.
#[test]
fn stability_wait_across_rect_change() {
    let settings = Settings {
        stable_frames: 2,
        ..Settings::default()
    };
    let (page, ticks) = scripted_page(settings);
    let el = {
        let mut doc = page.document_mut();
        let root = doc.root();
        let el = doc.append_element(root, "div", &[]);
        doc.set_rect(el, Rect::new(0.0, 0.0, 10.0, 10.0));
        el
    };

    let handle = page.document_handle();
    ticks.borrow_mut().set_hook(move |tick| {
        if tick == 2 {
            handle.borrow_mut().set_rect(el, Rect::new(0.0, 0.0, 12.0, 10.0));
        }
    });

    let mut poll = page.wait_for_element_states_and_perform_action(
        el,
        vec![ElementState::Stable],
        false,
        |_, _| Ok(Step::Done(Ready::Value("acted"))),
    );
    let outcome = poll.run();
    assert_eq!(outcome, PollOutcome::Done(Ready::Value("acted")));
    // Frames observed: prime, old, old, changed, same, same -> six
    // predicate calls means five scheduled gaps.
    assert_eq!(ticks.borrow().ticks_taken(), 5);

    let logs = poll.take_last_logs();
    assert!(logs.iter().any(|l| l.contains("element is not stable")));
}

/// S5: number inputs reject non-numeric fills and select their contents
/// for numeric ones.
#[test]
fn fill_number_input() {
    let (page, _) = default_page();
    let input = {
        let mut doc = page.document_mut();
        let root = doc.root();
        let input = doc.append_element(root, "input", &[("type", "number")]);
        doc.set_rect(input, Rect::new(0.0, 0.0, 80.0, 20.0));
        input
    };

    let mut poll = page.fill(input, "abc");
    match poll.run() {
        PollOutcome::Failed(message) => {
            assert_eq!(message, "Cannot type text into input[type=number]");
        }
        other => panic!("expected failure, got {other:?}"),
    }

    let mut poll = page.fill(input, "12");
    assert_eq!(
        poll.run(),
        PollOutcome::Done(Ready::Value(FillResult::NeedsInput))
    );
    let doc = page.document();
    assert_eq!(doc.selection(input), Some((0, 0)));
    assert_eq!(doc.active_element(), Some(input));
}

/// S6: `to.have.text` with whitespace normalization on both sides.
#[test]
fn expect_text_with_normalization() {
    let (page, _) = default_page();
    {
        let mut doc = page.document_mut();
        let root = doc.root();
        let el = doc.append_element(root, "div", &[("id", "t")]);
        doc.append_text(el, "  hello   world  ");
    }

    let normalized = ExpectParams {
        expression: "to.have.text".to_string(),
        expected_text: vec![ExpectedText {
            string: Some("hello world".to_string()),
            normalize_white_space: true,
            ..ExpectedText::default()
        }],
        ..ExpectParams::default()
    };
    assert!(page.expect_now("#t", &normalized).unwrap().pass);

    let mut negated = normalized.clone();
    negated.is_not = true;
    assert!(!page.expect_now("#t", &negated).unwrap().pass);

    let raw = ExpectParams {
        expression: "to.have.text".to_string(),
        expected_text: vec![ExpectedText {
            string: Some("hello world".to_string()),
            ..ExpectedText::default()
        }],
        ..ExpectParams::default()
    };
    assert!(!page.expect_now("#t", &raw).unwrap().pass);
}

/// S7: a dialog overlaying the target is named in the hit-target
/// description together with its subtree root.
#[test]
fn hit_target_overlay_description() {
    let (page, _) = default_page();
    let button = {
        let mut doc = page.document_mut();
        let root = doc.root();
        let body = doc.append_element(root, "body", &[]);
        doc.set_rect(body, Rect::new(0.0, 0.0, 800.0, 600.0));
        let button = doc.append_element(body, "button", &[("id", "b")]);
        doc.set_rect(button, Rect::new(0.0, 0.0, 100.0, 40.0));
        let dialog = doc.append_element(body, "div", &[("class", "dialog")]);
        doc.set_rect(dialog, Rect::new(0.0, 0.0, 400.0, 400.0));
        let text = doc.append_element(dialog, "p", &[]);
        doc.set_rect(text, Rect::new(0.0, 0.0, 400.0, 40.0));
        button
    };

    let result = page
        .check_hit_target_at(button, Point::new(10.0, 10.0))
        .unwrap();
    let HitTargetResult::Checked(HitCheck::Blocked {
        hit_target_description,
    }) = result
    else {
        panic!("expected a blocked hit, got {result:?}");
    };
    assert!(hit_target_description.contains("from <div class=\"dialog\"></div> subtree"));
}

/// Options appearing after the first tick are picked up by the
/// re-polling selection protocol.
#[test]
fn select_options_waits_for_missing_option() {
    let (page, ticks) = default_page();
    let select = {
        let mut doc = page.document_mut();
        let root = doc.root();
        let select = doc.append_element(root, "select", &[]);
        doc.set_rect(select, Rect::new(0.0, 0.0, 120.0, 24.0));
        let option = doc.append_element(select, "option", &[("value", "red")]);
        doc.append_text(option, "Red");
        select
    };

    let handle = page.document_handle();
    ticks.borrow_mut().set_hook(move |tick| {
        if tick == 1 {
            let mut doc = handle.borrow_mut();
            let option = doc.append_element(select, "option", &[("value", "blue")]);
            doc.append_text(option, "Blue");
        }
    });

    let specs = vec![apuntar::OptionSpec::Filter(apuntar::OptionFilter {
        value: Some("blue".to_string()),
        ..apuntar::OptionFilter::default()
    })];
    let mut poll = page.select_options(select, specs);
    assert_eq!(
        poll.run(),
        PollOutcome::Done(Ready::Value(vec!["blue".to_string()]))
    );
    let logs = poll.take_last_logs();
    assert!(logs.iter().any(|l| l.contains("did not find some options")));
}
