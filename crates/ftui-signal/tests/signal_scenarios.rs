//! End-to-end scenarios for signals, handles and auto-disconnecting
//! observers.
//!
//! Each test builds a small subject/observer graph and checks the observable
//! contract: which callbacks ran, in what order, and what `count()` reports
//! after handles, observers or signals go away in various orders.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use ftui_signal::{AutoDisconnect, ByMut, ByRef, ByValue, ConnectionView, Observer, Signal};

// ── Fixtures ──────────────────────────────────────────────────────────────

thread_local! {
    static X: Cell<i32> = const { Cell::new(0) };
    static Y: Cell<i32> = const { Cell::new(0) };
}

fn set_x(v: i32) {
    X.with(|x| x.set(v));
}

fn set_y(v: i32) {
    Y.with(|y| y.set(v));
}

fn x() -> i32 {
    X.with(Cell::get)
}

fn y() -> i32 {
    Y.with(Cell::get)
}

#[derive(Debug, Clone, PartialEq)]
struct Param {
    value: i32,
}

/// Records every call it receives.
#[derive(Default)]
struct Recorder {
    values: Vec<i32>,
}

impl Recorder {
    fn set_value(&mut self, v: i32) {
        self.values.push(v);
    }

    fn set_param(&mut self, p: Param) {
        self.values.push(p.value);
    }

    fn set_param_const(&mut self, p: &Param) {
        self.values.push(p.value);
    }

    fn set_param_ref(&mut self, p: &mut Param) {
        self.values.push(p.value);
        p.value += 1;
    }
}

impl Observer for Recorder {}

/// Observer that disconnects itself when dropped.
struct Tracked {
    id: usize,
    log: Rc<RefCell<Vec<usize>>>,
    tracker: AutoDisconnect,
}

impl Tracked {
    fn new(id: usize, log: &Rc<RefCell<Vec<usize>>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            id,
            log: Rc::clone(log),
            tracker: AutoDisconnect::new(),
        }))
    }

    fn on_changed(&mut self, _: ()) {
        self.log.borrow_mut().push(self.id);
    }
}

impl Observer for Tracked {
    fn auto_disconnect(&self) -> Option<&AutoDisconnect> {
        Some(&self.tracker)
    }
}

/// Subject that owns a signal, as a host object would.
#[derive(Default)]
struct Subject {
    changed: Signal<ByValue<()>>,
}

impl Subject {
    fn notify(&mut self) {
        self.changed.emit(());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Free functions
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn set_x_set_y_scenario() {
    let mut sig: Signal<ByValue<i32>> = Signal::new();
    let mut con_x = sig.add(set_x);
    let mut con_y = sig.add(set_y);

    sig.emit(1);
    assert_eq!((x(), y()), (1, 1));

    con_x.disconnect();
    assert_eq!(sig.count(), 1);
    sig.emit(2);
    assert_eq!((x(), y()), (1, 2));

    con_y.disconnect();
    assert_eq!(sig.count(), 0);
    sig.emit(3);
    assert_eq!((x(), y()), (1, 2));
}

#[test]
fn repeated_disconnect_matches_single() {
    let mut sig: Signal<ByValue<i32>> = Signal::new();
    let mut con = sig.add(set_x);
    assert_eq!(sig.count(), 1);
    for _ in 0..4 {
        con.disconnect();
        assert_eq!(sig.count(), 0);
    }
}

#[test]
fn hundred_views_count_down() {
    let mut sig: Signal<ByValue<i32>> = Signal::new();
    let mut views: Vec<ConnectionView> = Vec::new();
    for n in 1..=100 {
        views.push(sig.add(set_x));
        assert_eq!(sig.count(), n);
    }
    for (n, view) in views.iter_mut().enumerate().rev() {
        view.disconnect();
        assert_eq!(sig.count(), n);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Member functions and parameter passing
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn member_function_by_value() {
    let mut sig: Signal<ByValue<i32>> = Signal::new();
    let rec = Rc::new(RefCell::new(Recorder::default()));
    let mut con = sig.add_method(&rec, Recorder::set_value);

    sig.emit(1);
    sig.emit(2);
    con.disconnect();
    sig.emit(3);
    assert_eq!(rec.borrow().values, vec![1, 2]);
}

#[test]
fn member_function_by_value_struct() {
    let mut sig: Signal<ByValue<Param>> = Signal::new();
    let rec = Rc::new(RefCell::new(Recorder::default()));
    sig.add_method(&rec, Recorder::set_param);
    sig.add_method(&rec, Recorder::set_param);
    sig.emit(Param { value: 4 });
    assert_eq!(rec.borrow().values, vec![4, 4]);
}

#[test]
fn member_function_by_const_ref() {
    let mut sig: Signal<ByRef<Param>> = Signal::new();
    let rec = Rc::new(RefCell::new(Recorder::default()));
    sig.add_method(&rec, Recorder::set_param_const);

    let param = Param { value: 1 };
    sig.emit(&param);
    sig.emit(&Param { value: 2 });
    assert_eq!(rec.borrow().values, vec![1, 2]);
}

#[test]
fn member_function_by_mut_ref() {
    let mut sig: Signal<ByMut<Param>> = Signal::new();
    let rec = Rc::new(RefCell::new(Recorder::default()));
    sig.add_method(&rec, Recorder::set_param_ref);
    sig.add_method(&rec, Recorder::set_param_ref);

    let mut param = Param { value: 10 };
    sig.emit(&mut param);
    assert_eq!(rec.borrow().values, vec![10, 11]);
    assert_eq!(param.value, 12);
}

// ═════════════════════════════════════════════════════════════════════════
// Lifetimes
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn view_outlives_signal() {
    let rec = Rc::new(RefCell::new(Recorder::default()));
    let mut con: ConnectionView;
    {
        let mut sig: Signal<ByValue<i32>> = Signal::new();
        con = sig.add_method(&rec, Recorder::set_value);
        sig.emit(1);
        assert!(con.is_connected());
    }
    assert!(!con.is_connected());
    assert!(!con.disconnect());
    assert_eq!(rec.borrow().values, vec![1]);
}

#[test]
fn signal_outlives_view() {
    let mut sig: Signal<ByValue<i32>> = Signal::new();
    let rec = Rc::new(RefCell::new(Recorder::default()));
    {
        let _con = sig.add_method(&rec, Recorder::set_value);
        sig.emit(1);
    }
    sig.emit(2);
    assert_eq!(rec.borrow().values, vec![1, 2]);
    assert_eq!(sig.count(), 1);
}

#[test]
fn moved_signal_keeps_slots() {
    let mut first: Signal<ByValue<i32>> = Signal::new();
    let rec = Rc::new(RefCell::new(Recorder::default()));
    let con = first.add_method(&rec, Recorder::set_value);

    let mut second = std::mem::take(&mut first);
    first.emit(1);
    second.emit(2);

    let mut third: Signal<ByValue<i32>> = Signal::new();
    third.emit(3);
    third = std::mem::take(&mut second);
    assert_eq!(second.count(), 0);
    assert_eq!(third.count(), 1);
    third.emit(4);

    assert_eq!(rec.borrow().values, vec![2, 4]);
    assert!(con.is_connected());
}

#[test]
fn dropped_target_without_tracker_is_skipped() {
    let mut sig: Signal<ByValue<i32>> = Signal::new();
    let rec = Rc::new(RefCell::new(Recorder::default()));
    let con = sig.add_method(&rec, Recorder::set_value);
    drop(rec);

    sig.emit(1);
    assert_eq!(sig.count(), 0);
    assert!(!con.is_connected());
}

// ═════════════════════════════════════════════════════════════════════════
// Auto-disconnecting observers
// ═════════════════════════════════════════════════════════════════════════

#[test]
fn hundred_auto_observers() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut sig: Signal<ByValue<()>> = Signal::new();
    let observers: Vec<_> = (0..100).map(|id| Tracked::new(id, &log)).collect();
    for observer in &observers {
        sig.add_method(observer, Tracked::on_changed);
    }
    assert_eq!(sig.count(), 100);

    drop(observers);
    assert_eq!(sig.count(), 0);
    sig.emit(());
    assert!(log.borrow().is_empty());
}

#[test]
fn observer_drop_removes_exactly_its_slots() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut sig: Signal<ByValue<()>> = Signal::new();
    let a = Tracked::new(1, &log);
    let b = Tracked::new(2, &log);
    sig.add_method(&a, Tracked::on_changed);
    sig.add_method(&b, Tracked::on_changed);
    sig.add_method(&a, Tracked::on_changed);
    assert_eq!(sig.count(), 3);

    drop(a);
    assert_eq!(sig.count(), 1);
    sig.emit(());
    assert_eq!(*log.borrow(), vec![2]);
}

#[test]
fn observer_dropped_mid_emit() {
    // Slot 0 drops the last strong reference to the observer behind slot 1.
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut sig: Signal<ByValue<()>> = Signal::new();
    let victim: Rc<RefCell<Option<Rc<RefCell<Tracked>>>>> =
        Rc::new(RefCell::new(Some(Tracked::new(9, &log))));

    let victim_clone = Rc::clone(&victim);
    sig.add_fn(move |()| {
        victim_clone.borrow_mut().take();
    });
    if let Some(observer) = victim.borrow().as_ref() {
        sig.add_method(observer, Tracked::on_changed);
    }

    sig.emit(());
    assert!(log.borrow().is_empty());
    assert_eq!(sig.count(), 1);
    assert_eq!(sig.storage_len(), 1);
}

#[test]
fn manual_and_automatic_observers() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut subject = Subject::default();
    {
        let auto = Tracked::new(1, &log);
        let manual_log = Rc::clone(&log);
        let _manual = subject
            .changed
            .add_fn(move |()| manual_log.borrow_mut().push(2))
            .scoped();
        subject.changed.add_method(&auto, Tracked::on_changed);

        subject.notify();
        assert_eq!(*log.borrow(), vec![2, 1]);
    }
    subject.notify();
    assert_eq!(subject.changed.count(), 0);
    assert_eq!(*log.borrow(), vec![2, 1]);
}

#[test]
fn observer_outlives_signal() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let observer = Tracked::new(1, &log);
    {
        let mut sig: Signal<ByValue<()>> = Signal::new();
        sig.add_method(&observer, Tracked::on_changed);
        sig.emit(());
    }
    assert!(observer.borrow().tracker.is_empty());
    drop(observer);
    assert_eq!(*log.borrow(), vec![1]);
}

/// Observer that wires a second slot onto another signal the first time one
/// of its handlers runs.
struct SelfWiring {
    me: Weak<RefCell<SelfWiring>>,
    other: Rc<RefCell<Signal<ByValue<i32>>>>,
    seen: Vec<i32>,
    tracker: AutoDisconnect,
}

impl SelfWiring {
    fn on_first(&mut self, _: i32) {
        if let Some(me) = self.me.upgrade() {
            self.other
                .borrow_mut()
                .add_method(&me, SelfWiring::on_second);
        }
    }

    fn on_second(&mut self, v: i32) {
        self.seen.push(v);
    }
}

impl Observer for SelfWiring {
    fn auto_disconnect(&self) -> Option<&AutoDisconnect> {
        Some(&self.tracker)
    }
}

#[test]
fn observer_connects_itself_from_handler() {
    let mut first: Signal<ByValue<i32>> = Signal::new();
    let other: Rc<RefCell<Signal<ByValue<i32>>>> = Rc::new(RefCell::new(Signal::new()));
    let observer = Rc::new_cyclic(|me| {
        RefCell::new(SelfWiring {
            me: me.clone(),
            other: Rc::clone(&other),
            seen: Vec::new(),
            tracker: AutoDisconnect::new(),
        })
    });
    first.add_method(&observer, SelfWiring::on_first);

    first.emit(1);
    assert_eq!(other.borrow().count(), 1);
    assert_eq!(observer.borrow().tracker.len(), 2);

    other.borrow_mut().emit(5);
    assert_eq!(observer.borrow().seen, vec![5]);

    drop(observer);
    assert_eq!(first.count(), 0);
    assert_eq!(other.borrow().count(), 0);
}
