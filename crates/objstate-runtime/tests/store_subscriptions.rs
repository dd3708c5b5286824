//! Subscription semantics across re-entrant mutation.
//!
//! Every scenario here exercises the commit-on-next-mutation rule: the
//! listeners notified for a mutation are fixed when it commits.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use objstate_runtime::{Patch, State, Store, Unsubscribe, state_from_value};
use serde_json::{Value, json};

fn foo_bar() -> State {
    state_from_value(json!({ "foo": "bar" })).unwrap()
}

fn counter() -> Rc<Cell<u32>> {
    Rc::new(Cell::new(0))
}

fn bump(count: &Cell<u32>) {
    count.set(count.get() + 1);
}

fn counting(count: &Rc<Cell<u32>>) -> impl Fn(&State, &State, Option<&str>) + use<> {
    let count = Rc::clone(count);
    move |_, _, _| bump(&count)
}

/// Slot for a handle that the listener it controls needs to reach.
type HandleSlot = Rc<RefCell<Option<Unsubscribe>>>;

fn unsubscribe_slot(slot: &HandleSlot) {
    let handle = slot.borrow().clone();
    if let Some(handle) = handle {
        handle.unsubscribe();
    }
}

#[test]
fn supports_multiple_subscriptions() {
    let store = Store::new(foo_bar());
    let a = counter();
    let b = counter();

    let unsubscribe_a = store.subscribe(counting(&a));
    store.set_state(foo_bar()).unwrap();
    assert_eq!((a.get(), b.get()), (1, 0));

    store.set_state(foo_bar()).unwrap();
    assert_eq!((a.get(), b.get()), (2, 0));

    let unsubscribe_b = store.subscribe(counting(&b));
    assert_eq!((a.get(), b.get()), (2, 0));

    store.set_state(foo_bar()).unwrap();
    assert_eq!((a.get(), b.get()), (3, 1));

    unsubscribe_a.unsubscribe();
    assert_eq!((a.get(), b.get()), (3, 1));

    store.set_state(foo_bar()).unwrap();
    assert_eq!((a.get(), b.get()), (3, 2));

    unsubscribe_b.unsubscribe();
    assert_eq!((a.get(), b.get()), (3, 2));

    store.set_state(foo_bar()).unwrap();
    assert_eq!((a.get(), b.get()), (3, 2));

    let _resubscribed = store.subscribe(counting(&a));
    assert_eq!((a.get(), b.get()), (3, 2));

    store.set_state(foo_bar()).unwrap();
    assert_eq!((a.get(), b.get()), (4, 2));
}

#[test]
fn listeners_fire_in_subscription_order() {
    let store = Store::new(State::new());
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut handles = Vec::new();
    for tag in ['A', 'B', 'C'] {
        let log = Rc::clone(&log);
        handles.push(store.subscribe(move |_, _, _| log.borrow_mut().push(tag)));
    }
    store.set_state(Patch::new().set("x", 1)).unwrap();
    assert_eq!(*log.borrow(), vec!['A', 'B', 'C']);
}

#[test]
fn only_removes_listener_once_when_unsubscribe_is_called() {
    let store = Store::new(foo_bar());
    let a = counter();
    let b = counter();

    let unsubscribe_a = store.subscribe(counting(&a));
    let _b = store.subscribe(counting(&b));

    assert!(unsubscribe_a.unsubscribe());
    assert!(!unsubscribe_a.unsubscribe());

    store.set_state(foo_bar()).unwrap();
    assert_eq!(a.get(), 0);
    assert_eq!(b.get(), 1);
}

#[test]
fn only_removes_relevant_listener_when_unsubscribe_is_called() {
    let store = Store::new(foo_bar());
    let a = counter();
    let shared: Rc<dyn Fn(&State, &State, Option<&str>)> = Rc::new(counting(&a));

    let first = Rc::clone(&shared);
    let _first = store.subscribe(move |n, p, l| first(n, p, l));
    let second = Rc::clone(&shared);
    let unsubscribe_second = store.subscribe(move |n, p, l| second(n, p, l));

    unsubscribe_second.unsubscribe();
    unsubscribe_second.unsubscribe();

    store.set_state(foo_bar()).unwrap();
    assert_eq!(a.get(), 1);
    assert_eq!(store.subscriber_count(), 1);
}

#[test]
fn cloned_handles_share_the_one_shot_flag() {
    let store = Store::new(foo_bar());
    let a = counter();
    let b = counter();
    let handle = store.subscribe(counting(&a));
    let _b = store.subscribe(counting(&b));
    let copy = handle.clone();

    assert!(copy.unsubscribe());
    assert!(!handle.is_subscribed());
    assert!(!handle.unsubscribe());

    store.set_state(foo_bar()).unwrap();
    assert_eq!((a.get(), b.get()), (0, 1));
}

#[test]
fn supports_removing_a_subscription_within_a_subscription() {
    let store = Store::new(foo_bar());
    let a = counter();
    let b = counter();
    let c = counter();

    let _a = store.subscribe(counting(&a));
    let slot: HandleSlot = Rc::default();
    let unsubscribe_b = {
        let b = Rc::clone(&b);
        let slot = Rc::clone(&slot);
        store.subscribe(move |_, _, _| {
            bump(&b);
            unsubscribe_slot(&slot);
        })
    };
    *slot.borrow_mut() = Some(unsubscribe_b);
    let _c = store.subscribe(counting(&c));

    store.set_state(foo_bar()).unwrap();
    store.set_state(foo_bar()).unwrap();

    assert_eq!(a.get(), 2);
    assert_eq!(b.get(), 1);
    assert_eq!(c.get(), 2);
}

#[test]
fn delays_unsubscribe_to_the_next_state_mutation() {
    let store = Store::new(foo_bar());
    let handles: Rc<RefCell<Vec<Unsubscribe>>> = Rc::default();
    let a = counter();
    let b = counter();
    let c = counter();

    let first = store.subscribe(counting(&a));
    handles.borrow_mut().push(first);
    let second = {
        let b = Rc::clone(&b);
        let handles = Rc::clone(&handles);
        store.subscribe(move |_, _, _| {
            bump(&b);
            let all = handles.borrow().clone();
            for handle in &all {
                handle.unsubscribe();
            }
        })
    };
    handles.borrow_mut().push(second);
    let third = store.subscribe(counting(&c));
    handles.borrow_mut().push(third);

    store.set_state(foo_bar()).unwrap();
    assert_eq!((a.get(), b.get(), c.get()), (1, 1, 1));

    store.set_state(foo_bar()).unwrap();
    assert_eq!((a.get(), b.get(), c.get()), (1, 1, 1));
    assert_eq!(store.subscriber_count(), 0);
}

#[test]
fn delays_subscribe_to_the_next_state_mutation() {
    let store = Store::new(foo_bar());
    let one = counter();
    let two = counter();
    let three = counter();
    let added = Rc::new(Cell::new(false));
    let late_handles: Rc<RefCell<Vec<Unsubscribe>>> = Rc::default();

    let _one = store.subscribe(counting(&one));
    let _two = {
        let inner = store.downgrade();
        let two = Rc::clone(&two);
        let three = Rc::clone(&three);
        let late_handles = Rc::clone(&late_handles);
        store.subscribe(move |_, _, _| {
            bump(&two);
            if !added.replace(true) {
                if let Some(store) = inner.upgrade() {
                    let handle = store.subscribe(counting(&three));
                    late_handles.borrow_mut().push(handle);
                }
            }
        })
    };

    store.set_state(foo_bar()).unwrap();
    assert_eq!((one.get(), two.get(), three.get()), (1, 1, 0));

    store.set_state(foo_bar()).unwrap();
    assert_eq!((one.get(), two.get(), three.get()), (2, 2, 1));
    assert_eq!(late_handles.borrow().len(), 1);
}

#[test]
fn uses_the_last_snapshot_of_subscribers_during_nested_state_mutation() {
    let store = Store::new(foo_bar());
    let c1 = counter();
    let c2 = counter();
    let c3 = counter();
    let c4 = counter();
    let slot1: HandleSlot = Rc::default();
    let slot4: HandleSlot = Rc::default();

    let unsubscribe1 = {
        let inner = store.downgrade();
        let (c1, c2, c3, c4) = (Rc::clone(&c1), Rc::clone(&c2), Rc::clone(&c3), Rc::clone(&c4));
        let slot1 = Rc::clone(&slot1);
        let slot4 = Rc::clone(&slot4);
        store.subscribe(move |_, _, _| {
            bump(&c1);
            assert_eq!((c1.get(), c2.get(), c3.get(), c4.get()), (1, 0, 0, 0));

            unsubscribe_slot(&slot1);
            let Some(store) = inner.upgrade() else { return };
            *slot4.borrow_mut() = Some(store.subscribe(counting(&c4)));
            store.set_state(foo_bar()).unwrap();

            assert_eq!((c1.get(), c2.get(), c3.get(), c4.get()), (1, 1, 1, 1));
        })
    };
    *slot1.borrow_mut() = Some(unsubscribe1);
    let _two = store.subscribe(counting(&c2));
    let _three = store.subscribe(counting(&c3));

    store.set_state(foo_bar()).unwrap();
    assert_eq!((c1.get(), c2.get(), c3.get(), c4.get()), (1, 2, 2, 1));

    unsubscribe_slot(&slot4);
    store.set_state(foo_bar()).unwrap();
    assert_eq!((c1.get(), c2.get(), c3.get(), c4.get()), (1, 3, 3, 1));
}

#[test]
fn handles_nested_state_mutations_gracefully() {
    let store = Store::new(State::new());
    let slot: HandleSlot = Rc::default();
    let first_seen = Rc::new(RefCell::new(None));

    let handle = {
        let inner = store.downgrade();
        let slot = Rc::clone(&slot);
        let first_seen = Rc::clone(&first_seen);
        store.subscribe(move |next, _, _| {
            if next.get("bar") != Some(&json!("foo")) {
                *first_seen.borrow_mut() = Some(Value::Object(next.clone()));
            }
            unsubscribe_slot(&slot);
            if let Some(store) = inner.upgrade() {
                store.set_state(Patch::new().set("bar", "foo")).unwrap();
            }
        })
    };
    *slot.borrow_mut() = Some(handle);

    store.set_state(foo_bar()).unwrap();
    assert_eq!(*first_seen.borrow(), Some(json!({ "foo": "bar" })));
    assert_eq!(Value::Object(store.state()), json!({ "foo": "bar", "bar": "foo" }));
    assert_eq!(store.version(), 2);
}

#[test]
fn nested_mutation_runs_before_outer_notification_resumes() {
    let store = Store::new(json!({ "n": 0 }).as_object().cloned().unwrap_or_default());
    let log = Rc::new(RefCell::new(Vec::new()));

    let _first = {
        let inner = store.downgrade();
        let log = Rc::clone(&log);
        store.subscribe(move |next, _, _| {
            let n = next["n"].as_i64().unwrap_or(0);
            log.borrow_mut().push(format!("first:{n}"));
            if n == 1 {
                if let Some(store) = inner.upgrade() {
                    store.set_state(Patch::new().set("n", 2)).unwrap();
                }
            }
        })
    };
    let _second = {
        let log = Rc::clone(&log);
        store.subscribe(move |next, previous, _| {
            log.borrow_mut().push(format!("second:{}<-{}", next["n"], previous["n"]));
        })
    };

    store.set_state(Patch::new().set("n", 1)).unwrap();
    assert_eq!(
        *log.borrow(),
        vec!["first:1", "first:2", "second:2<-1", "second:1<-0"]
    );
    assert_eq!(store.state()["n"], json!(2));
}

#[test]
fn provides_listeners_with_previous_and_current_state() {
    let store = Store::new(foo_bar());
    let before = store.state();
    let reader = store.downgrade();
    let checked = Rc::new(Cell::new(false));
    let slot: HandleSlot = Rc::default();

    let handle = {
        let checked = Rc::clone(&checked);
        let slot = Rc::clone(&slot);
        store.subscribe(move |next, previous, _| {
            assert_eq!(previous, &before);
            if let Some(store) = reader.upgrade() {
                assert_eq!(next, &store.state());
            }
            checked.set(true);
            unsubscribe_slot(&slot);
        })
    };
    *slot.borrow_mut() = Some(handle);

    store.set_state(Patch::new().set("bar", "foo")).unwrap();
    assert!(checked.get());
}

#[test]
fn arrays_are_replaced_not_merged() {
    let store = Store::from_value(json!({
        "userData": { "submitPayload": { "aZg7gFGB": ["option-1"] } }
    }))
    .unwrap();

    store
        .set_state(state_from_value(json!({
            "userData": { "submitPayload": { "aZg7gFGB": ["option-1", "option-2"] } }
        }))
        .unwrap())
        .unwrap();
    assert_eq!(
        Value::Object(store.state()),
        json!({ "userData": { "submitPayload": { "aZg7gFGB": ["option-1", "option-2"] } } })
    );

    store
        .set_state(state_from_value(json!({
            "userData": { "submitPayload": { "aZg7gFGB": ["option-1"] } }
        }))
        .unwrap())
        .unwrap();
    assert_eq!(
        Value::Object(store.state()),
        json!({ "userData": { "submitPayload": { "aZg7gFGB": ["option-1"] } } })
    );
}

#[test]
fn listener_arguments_are_independent_of_store_storage() {
    let store = Store::new(foo_bar());
    let captured = Rc::new(RefCell::new(None));
    let _handle = {
        let captured = Rc::clone(&captured);
        store.subscribe(move |next, _, _| *captured.borrow_mut() = Some(next.clone()))
    };
    store.set_state(Patch::new().set("n", 1)).unwrap();

    let mut copy = captured.borrow_mut().take().unwrap_or_default();
    copy.insert("n".into(), json!("tampered"));
    assert_eq!(store.state()["n"], json!(1));
}
