//! Resource limits: recursion depth, arena memory, host cancellation.

use monty::{
    CancelToken, ExcType, LimitedTracker, Monty, NoPrint, Object, RunOptions,
};
use pretty_assertions::assert_eq;

fn run_limited(code: &str, tracker: LimitedTracker) -> Result<Object, monty::Exception> {
    let m = Monty::new(code.to_owned(), "<test>", vec![]).unwrap();
    m.run(
        vec![],
        RunOptions {
            tracker,
            os: None,
            print: &mut NoPrint,
            hash_seed: 0,
        },
    )
}

#[test]
fn unbounded_recursion_raises_recursion_error() {
    let code = "\
def f(n):
    return f(n + 1)
f(0)";
    let m = Monty::new(code.to_owned(), "<test>", vec![]).unwrap();
    let err = m.run_no_limits(vec![]).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::RecursionError);
    assert_eq!(err.message(), Some("maximum recursion depth exceeded"));
}

#[test]
fn recursion_limit_is_configurable() {
    let code = "\
def f(n):
    if n == 0:
        return 'done'
    return f(n - 1)
f(20)";
    // 20 frames is fine under a limit of 30
    let result = run_limited(code, LimitedTracker::new().with_max_recursion_depth(30)).unwrap();
    assert_eq!(result, Object::String("done".to_owned()));
    // but not under a limit of 10
    let err = run_limited(code, LimitedTracker::new().with_max_recursion_depth(10)).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::RecursionError);
}

#[test]
fn recursion_error_is_catchable_in_script() {
    let code = "\
def f():
    return f()
try:
    f()
except RecursionError:
    result = 'caught'
result";
    let m = Monty::new(code.to_owned(), "<test>", vec![]).unwrap();
    assert_eq!(m.run_no_limits(vec![]).unwrap(), Object::String("caught".to_owned()));
}

#[test]
fn memory_limit_raises_memory_error() {
    let code = "\
data = []
while True:
    data.append('0123456789abcdef' * 64)";
    let err = run_limited(code, LimitedTracker::new().with_max_memory(64 * 1024)).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::MemoryError);
}

#[test]
fn memory_limit_rejects_huge_results_preemptively() {
    let err = run_limited("2 ** 10_000_000", LimitedTracker::new().with_max_memory(64 * 1024)).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::MemoryError);
    let err = run_limited("'x' * 10_000_000", LimitedTracker::new().with_max_memory(64 * 1024)).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::MemoryError);
}

#[test]
fn memory_error_is_catchable_in_script() {
    let code = "\
try:
    x = 2 ** 10_000_000
    result = 'no limit hit'
except MemoryError:
    result = 'caught'
result";
    let result = run_limited(code, LimitedTracker::new().with_max_memory(64 * 1024)).unwrap();
    assert_eq!(result, Object::String("caught".to_owned()));
}

#[test]
fn pre_cancelled_token_interrupts_at_first_back_edge() {
    let token = CancelToken::new();
    token.cancel();
    let code = "\
n = 0
while True:
    n += 1";
    let err = run_limited(code, LimitedTracker::new().with_cancel_token(token)).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::KeyboardInterrupt);
    assert_eq!(err.message(), None);
}

#[test]
fn cancellation_unwinds_through_finally() {
    let token = CancelToken::new();
    token.cancel();
    // KeyboardInterrupt is catchable; try/except/finally unwind cleanly
    let code = "\
log = []
try:
    while True:
        log.append('tick')
except KeyboardInterrupt:
    log.append('interrupted')
finally:
    log.append('finally')
log";
    let result = run_limited(code, LimitedTracker::new().with_cancel_token(token)).unwrap();
    assert_eq!(
        result,
        Object::List(vec![
            Object::String("interrupted".to_owned()),
            Object::String("finally".to_owned()),
        ])
    );
}

#[test]
fn cancellation_checked_at_calls_too() {
    let token = CancelToken::new();
    token.cancel();
    let code = "\
def f():
    return 1
f()";
    let err = run_limited(code, LimitedTracker::new().with_cancel_token(token)).unwrap_err();
    assert_eq!(err.exc_type(), ExcType::KeyboardInterrupt);
}

#[test]
fn deeply_nested_data_raises_recursion_error_not_host_overflow() {
    // 500 nested lists; repr would recurse past the data-depth budget
    let code = "\
x = []
for _ in range(500):
    x = [x]
try:
    result = repr(x)
except RecursionError:
    result = 'deep'
result";
    let m = Monty::new(code.to_owned(), "<test>", vec![]).unwrap();
    assert_eq!(m.run_no_limits(vec![]).unwrap(), Object::String("deep".to_owned()));
}

#[test]
fn each_run_gets_a_fresh_arena() {
    let m = Monty::new("data = [1] * 1000\nlen(data)".to_owned(), "<test>", vec![]).unwrap();
    // the same compiled program runs repeatedly under a limit that a single
    // run fits but two accumulated runs would not, proving release per run
    for _ in 0..5 {
        let result = run_limited(m.code(), LimitedTracker::new().with_max_memory(64 * 1024)).unwrap();
        assert_eq!(result, Object::Int(1000));
    }
}
