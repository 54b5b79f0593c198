use super::*;
use kestrel_diagnostic::ErrorCode;
use pretty_assertions::assert_eq;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

/// Minimal query owner exercising the engine without a resolver.
#[derive(Default)]
struct Owner {
    engine: Engine,
    squares: QueryTable<u32, u64>,
    sums: QueryTable<u32, u64>,
    calls: AtomicUsize,
}

const INPUT: QueryKey = QueryKey::ModuleInput(Name::EMPTY);

impl Owner {
    fn square(&self, n: u32) -> QueryResult<u64> {
        self.engine
            .memo(self, &self.squares, n, QueryKey::Test(n), |o| {
                o.calls.fetch_add(1, Ordering::SeqCst);
                o.engine.record_read(&INPUT);
                if n == 13 {
                    o.engine
                        .report(Diagnostic::error(ErrorCode::E2002).with_message("unlucky"));
                }
                Ok(u64::from(n) * u64::from(n))
            })
    }

    fn sum_of_squares(&self, n: u32) -> QueryResult<u64> {
        self.engine
            .memo(self, &self.sums, n, QueryKey::Test(1000 + n), |o| {
                (1..=n).map(|i| o.square(i)).sum()
            })
    }

    fn slow_square(&self, n: u32) -> QueryResult<u64> {
        self.engine
            .memo(self, &self.squares, n, QueryKey::Test(n), |o| {
                o.calls.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(20));
                Ok(u64::from(n) * u64::from(n))
            })
    }

    fn cyclic(&self, n: u32) -> QueryResult<u64> {
        self.engine
            .memo(self, &self.sums, n, QueryKey::Test(2000 + n), |o| {
                o.calls.fetch_add(1, Ordering::SeqCst);
                o.cyclic(n)
            })
    }
}

#[test]
fn second_call_hits_the_cache() {
    let owner = Owner::default();
    assert_eq!(owner.square(4), Ok(16));
    assert_eq!(owner.square(4), Ok(16));
    assert_eq!(owner.calls.load(Ordering::SeqCst), 1);
    assert_eq!(owner.engine.executions(), 1);
}

#[test]
fn nested_queries_share_results() {
    let owner = Owner::default();
    assert_eq!(owner.sum_of_squares(3), Ok(14));
    assert_eq!(owner.sum_of_squares(4), Ok(30));
    // 1..=4 squared once each
    assert_eq!(owner.calls.load(Ordering::SeqCst), 4);
}

#[test]
fn self_dependency_is_an_error_and_not_cached() {
    let owner = Owner::default();
    let err = owner.cyclic(1);
    assert_eq!(
        err,
        Err(ResolveError::RecursionDetected {
            query: QueryKey::Test(2001)
        })
    );
    assert!(owner.sums.is_empty());
    assert_eq!(owner.engine.executions(), 0);

    // The claim was released, so asking again fails the same way.
    assert_eq!(owner.cyclic(1), err);
    assert_eq!(owner.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn diagnostics_are_reported_once() {
    let owner = Owner::default();
    owner.square(13).unwrap();
    owner.square(13).unwrap();
    owner.sum_of_squares(13).unwrap();
    let diags = owner.engine.diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].code, ErrorCode::E2002);
}

#[test]
fn session_diagnostics_follow_query_diagnostics() {
    let owner = Owner::default();
    owner
        .engine
        .report(Diagnostic::error(ErrorCode::E9001).with_message("loose"));
    owner.square(13).unwrap();
    let codes: Vec<_> = owner
        .engine
        .diagnostics()
        .into_iter()
        .map(|d| d.code)
        .collect();
    assert_eq!(codes, vec![ErrorCode::E2002, ErrorCode::E9001]);
}

#[test]
fn invalidation_reaches_transitive_dependents() {
    let owner = Owner::default();
    owner.sum_of_squares(2).unwrap();
    owner.square(13).unwrap();

    let mut stale = owner.engine.invalidate(&INPUT);
    stale.sort_by_key(|k| format!("{k:?}"));
    assert_eq!(
        stale,
        vec![
            QueryKey::Test(1),
            QueryKey::Test(1002),
            QueryKey::Test(13),
            QueryKey::Test(2),
        ]
    );
    assert!(owner.engine.diagnostics().is_empty());

    for key in stale {
        match key {
            QueryKey::Test(n) if n >= 1000 => owner.sums.remove(&(n - 1000)),
            QueryKey::Test(n) => owner.squares.remove(&n),
            _ => None,
        };
    }
    owner.square(1).unwrap();
    assert_eq!(owner.calls.load(Ordering::SeqCst), 4);
}

#[test]
fn concurrent_callers_compute_once() {
    let owner = Owner::default();
    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8).map(|_| s.spawn(|| owner.slow_square(7))).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(results.iter().all(|r| *r == Ok(49)));
    assert_eq!(owner.calls.load(Ordering::SeqCst), 1);
}
