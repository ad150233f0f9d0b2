//! Tests for the validation context pipeline: debounce, deduplication,
//! dirty gating and rule dispatch.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use formwatch::diagnostics::{Issue, MemorySink};
use formwatch::prelude::*;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

/// Longer than the default 200ms debounce window.
async fn settle() {
    sleep(Duration::from_millis(250)).await;
}

fn abc_form() -> FormGroup {
    FormGroup::builder()
        .control("a", "", vec![])
        .control("b", "", vec![])
        .control("c", "", vec![])
        .build()
}

/// Rule set over `triggers` that counts derivations and records each value.
fn counting_set(
    triggers: &[&str],
    calls: &Arc<AtomicUsize>,
    seen: &Arc<Mutex<Vec<FormValue>>>,
) -> RuleSet {
    let calls = Arc::clone(calls);
    let seen = Arc::clone(seen);
    RuleSet::custom(triggers.iter().copied(), move |value| {
        calls.fetch_add(1, Ordering::SeqCst);
        seen.lock().unwrap().push(value.clone());
    })
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_burst_is_evaluated_once_with_last_value() {
    let form = abc_form();
    let a = form.control("a").unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let cx = ValidationContext::new(form.clone(), CancellationToken::new());
    cx.validate([counting_set(&["a"], &calls, &seen)]);

    for text in ["h", "he", "hel", "hell", "hello"] {
        a.input(text);
        sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].get("a"), Some(&Value::from("hello")));
}

#[tokio::test(start_paused = true)]
async fn test_custom_debounce_window() {
    let form = abc_form();
    let a = form.control("a").unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let cx = ValidationContext::new(form.clone(), CancellationToken::new());
    cx.validate_with(Duration::from_millis(20), [counting_set(&["a"], &calls, &seen)]);

    a.input("x");
    sleep(Duration::from_millis(30)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_changes_outside_triggers_do_not_reevaluate() {
    let form = abc_form();
    let (a, c) = (form.control("a").unwrap(), form.control("c").unwrap());
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let cx = ValidationContext::new(form.clone(), CancellationToken::new());
    cx.validate([counting_set(&["a", "b"], &calls, &seen)]);

    a.input("x");
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    c.input("unrelated");
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    a.input("y");
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pristine_triggers_block_evaluation() {
    let form = abc_form();
    let (a, b) = (form.control("a").unwrap(), form.control("b").unwrap());
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let cx = ValidationContext::new(form.clone(), CancellationToken::new());
    cx.validate([counting_set(&["a", "b"], &calls, &seen)]);

    // Programmatic changes leave both triggers pristine.
    a.set_value("1");
    settle().await;
    b.set_value("2");
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    b.input("3");
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_custom_validation_attaches_nothing() {
    let form = abc_form();
    let (a, b) = (form.control("a").unwrap(), form.control("b").unwrap());
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let b_runs = b.validation_runs();

    let cx = ValidationContext::new(form.clone(), CancellationToken::new());
    cx.validate([
        counting_set(&["a", "b"], &calls, &seen),
        RuleSet::new(["a"], |_| Some(RuleAssignment::new())).unwrap(),
    ]);

    a.input("x");
    settle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(b.rules_len(), 0);
    assert_eq!(b.validation_runs(), b_runs);
}

#[tokio::test(start_paused = true)]
async fn test_missing_field_is_isolated() {
    let form = abc_form();
    let (a, b, c) = (
        form.control("a").unwrap(),
        form.control("b").unwrap(),
        form.control("c").unwrap(),
    );
    let sink = Arc::new(MemorySink::new());

    let cx = ValidationContext::new(form.clone(), CancellationToken::new()).with_sink(sink.clone());
    cx.validate([
        RuleSet::new(["a"], |_| {
            Some(
                RuleAssignment::new()
                    .assign("ghost", required())
                    .assign("b", required()),
            )
        })
        .unwrap()
        .with_label("first"),
        RuleSet::new(["a"], |_| Some(RuleAssignment::new().assign("c", [required()]))).unwrap(),
    ]);

    a.input("x");
    settle().await;

    assert_eq!(
        sink.issues(),
        vec![Issue::MissingField {
            rule_set: "first".to_string(),
            field: "ghost".to_string(),
        }]
    );
    assert!(b.has_violation("required"));
    assert!(c.has_violation("required"));

    // The broken assignment does not poison later emissions.
    a.input("y");
    settle().await;
    assert_eq!(sink.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_trigger_counts_as_pristine() {
    let form = abc_form();
    let a = form.control("a").unwrap();
    let sink = Arc::new(MemorySink::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let cx = ValidationContext::new(form.clone(), CancellationToken::new()).with_sink(sink.clone());
    cx.validate([
        counting_set(&["nope"], &calls, &seen),
        counting_set(&["nope", "a"], &calls, &seen),
    ]);

    a.input("x");
    settle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let issues = sink.issues();
    assert_eq!(issues.len(), 2);
    assert!(matches!(&issues[0], Issue::UnknownTrigger { field, .. } if field == "nope"));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_trigger_after_dirty_one_is_reported() {
    let form = abc_form();
    let a = form.control("a").unwrap();
    let sink = Arc::new(MemorySink::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let cx = ValidationContext::new(form.clone(), CancellationToken::new()).with_sink(sink.clone());
    cx.validate([counting_set(&["a", "nope"], &calls, &seen)]);

    a.input("x");
    settle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        sink.issues(),
        vec![Issue::UnknownTrigger {
            rule_set: "a,nope".to_string(),
            field: "nope".to_string(),
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn test_rule_sets_run_in_registration_order() {
    let form = abc_form();
    let a = form.control("a").unwrap();
    let order = Arc::new(Mutex::new(Vec::new()));

    let set = |name: &'static str| {
        let order = Arc::clone(&order);
        RuleSet::custom(["a"], move |_| order.lock().unwrap().push(name)).unwrap()
    };

    let cx = ValidationContext::new(form.clone(), CancellationToken::new());
    cx.validate([set("first"), set("second"), set("third")]);

    a.input("x");
    settle().await;
    assert_eq!(*order.lock().unwrap(), ["first", "second", "third"]);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_attachment_keeps_outcome() {
    let form = abc_form();
    let (a, b) = (form.control("a").unwrap(), form.control("b").unwrap());

    let cx = ValidationContext::new(form.clone(), CancellationToken::new());
    cx.validate([RuleSet::new(["a"], |_| Some(RuleAssignment::new().assign("b", required()))).unwrap()]);

    a.input("x");
    settle().await;
    let status = b.status();
    let runs = b.validation_runs();

    a.input("y");
    settle().await;
    assert_eq!(b.status(), status);
    assert_eq!(b.validation_runs(), runs + 1);
}

#[tokio::test(start_paused = true)]
async fn test_validate_single_set_skips_gate() {
    let form = abc_form();
    let b = form.control("b").unwrap();
    let cx = ValidationContext::new(form.clone(), CancellationToken::new());

    let set = RuleSet::new(["a"], |_| Some(RuleAssignment::new().assign("b", required()))).unwrap();
    cx.validate_single_set(&form.value(), &set);

    assert_eq!(b.rules_len(), 1);
    assert!(!b.is_valid());
}

#[tokio::test(start_paused = true)]
async fn test_dedup_scope_is_per_call() {
    let form = abc_form();
    let (a, c) = (form.control("a").unwrap(), form.control("c").unwrap());
    let a_calls = Arc::new(AtomicUsize::new(0));
    let c_calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(Mutex::new(Vec::new()));

    let cx = ValidationContext::new(form.clone(), CancellationToken::new());
    cx.validate([counting_set(&["a"], &a_calls, &seen)]);
    cx.validate([counting_set(&["c"], &c_calls, &seen)]);

    a.input("x");
    settle().await;
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    // The first emission always passes deduplication; c is still pristine.
    assert_eq!(c_calls.load(Ordering::SeqCst), 0);

    c.input("y");
    settle().await;
    assert_eq!(a_calls.load(Ordering::SeqCst), 1);
    assert_eq!(c_calls.load(Ordering::SeqCst), 1);
}
