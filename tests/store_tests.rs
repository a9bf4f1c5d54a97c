//! Behavioural tests for the store's mutation and execution pipeline.
//!
//! Most async tests run on a paused tokio clock, so debounce windows and
//! producer latencies are exact. The tests at the bottom drive the store
//! from several threads at once on the real clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tristore::core::Triple;
use tristore::observe::Propagator;
use tristore::{Either, ExecuteOutcome, Observer, Store, TripleEvent};

type Log = Arc<Mutex<Vec<String>>>;

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Record every observed segment change as a readable line.
fn record_all(store: &Store<String, u32>) -> (Log, tristore::Disposer) {
    let log: Log = Arc::default();
    let (states, loading, errors) = (log.clone(), log.clone(), log.clone());
    let disposer = store.observer(
        Observer::new()
            .on_state(move |s| states.lock().unwrap().push(format!("state={s}")))
            .on_loading(move |l| loading.lock().unwrap().push(format!("loading={l}")))
            .on_error(move |e| errors.lock().unwrap().push(format!("error={e:?}"))),
    );
    (log, disposer)
}

fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

#[test]
fn update_with_current_state_changes_nothing() {
    let store: Store<String, u32> = Store::new(3);
    store.set_loading(true);
    store.set_error("old".into());
    let (log, _disposer) = record_all(&store);
    let before = store.triple();

    store.update(3);

    assert!(Arc::ptr_eq(&before, &store.triple()));
    assert!(store.is_loading());
    assert_eq!(store.error().as_deref(), Some("old"));
    assert!(entries(&log).is_empty());
}

#[test]
fn set_loading_always_tags_loading() {
    let store: Store<String, u32> = Store::new(0);

    store.update(1);
    store.set_loading(true);
    assert_eq!(store.triple().event(), TripleEvent::Loading);

    store.set_error("e".into());
    store.set_loading(false);
    assert_eq!(store.triple().event(), TripleEvent::Loading);
}

#[test]
fn last_triple_trails_by_one_accepted_mutation() {
    let store: Store<String, u32> = Store::new(0);

    store.update(1);
    store.update(1);
    store.set_loading(true);

    assert_eq!(*store.last_triple().state(), 1);
    assert!(!store.last_triple().is_loading());
    assert!(store.is_loading());
}

#[test]
fn direct_mutations_are_observed_in_call_order() {
    let store: Store<String, u32> = Store::new(0);
    let (log, _disposer) = record_all(&store);

    store.set_loading(true);
    store.update(5);
    store.set_error("bad".into());
    store.set_loading(false);
    store.clear_error();

    assert_eq!(
        entries(&log),
        vec![
            "loading=true",
            "state=5",
            "error=Some(\"bad\")",
            "loading=false",
            "error=None",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn rapid_calls_collapse_to_the_last_one() {
    let store: Store<String, u32> = Store::new(0);
    let first_runs = Arc::new(AtomicUsize::new(0));
    let runs = first_runs.clone();

    let (first, second) = tokio::join!(
        store.execute_with_delay(
            move || {
                runs.fetch_add(1, Ordering::SeqCst);
                async { Ok(1) }
            },
            ms(50),
        ),
        async {
            sleep(ms(10)).await;
            store.execute_with_delay(|| async { Ok(2) }, ms(50)).await
        }
    );

    assert_eq!(first, ExecuteOutcome::Superseded);
    assert_eq!(second, ExecuteOutcome::Committed);
    assert_eq!(first_runs.load(Ordering::SeqCst), 0);
    assert_eq!(store.state(), 2);
}

#[tokio::test(start_paused = true)]
async fn admitted_call_cancels_running_producer() {
    let store: Store<String, u32> = Store::new(0);
    let (log, _disposer) = record_all(&store);
    let finished = Arc::new(AtomicUsize::new(0));
    let done = finished.clone();

    let (first, second) = tokio::join!(
        store.execute_with_delay(
            move || async move {
                sleep(ms(1_000)).await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            },
            ms(50),
        ),
        async {
            sleep(ms(100)).await;
            assert!(store.is_loading());
            store.execute_with_delay(|| async { Ok(2) }, ms(50)).await
        }
    );

    assert_eq!(first, ExecuteOutcome::Cancelled);
    assert_eq!(second, ExecuteOutcome::Committed);

    sleep(ms(2_000)).await;
    assert_eq!(finished.load(Ordering::SeqCst), 0);
    assert_eq!(store.state(), 2);
    assert!(!store.is_loading());
    assert_eq!(entries(&log), vec!["loading=true", "state=2", "loading=false"]);
}

#[tokio::test(start_paused = true)]
async fn cancelled_failure_is_never_applied() {
    let store: Store<String, u32> = Store::new(0);

    let (first, second) = tokio::join!(
        store.execute_with_delay(
            || async {
                sleep(ms(500)).await;
                Err("stale failure".to_string())
            },
            ms(50),
        ),
        async {
            sleep(ms(100)).await;
            store.execute_with_delay(|| async { Ok(7) }, ms(50)).await
        }
    );

    assert_eq!(first, ExecuteOutcome::Cancelled);
    assert_eq!(second, ExecuteOutcome::Committed);
    sleep(ms(1_000)).await;
    assert_eq!(store.error(), None);
    assert_eq!(store.state(), 7);
}

#[tokio::test(start_paused = true)]
async fn producer_finishing_during_newer_debounce_still_applies() {
    let store: Store<String, u32> = Store::new(0);
    let (log, _disposer) = record_all(&store);

    let (first, second) = tokio::join!(
        store.execute_with_delay(
            || async {
                sleep(ms(20)).await;
                Ok(1)
            },
            ms(50),
        ),
        async {
            sleep(ms(60)).await;
            store.execute_with_delay(|| async { Ok(2) }, ms(50)).await
        }
    );

    assert_eq!(first, ExecuteOutcome::Committed);
    assert_eq!(second, ExecuteOutcome::Committed);
    assert_eq!(
        entries(&log),
        vec![
            "loading=true",
            "state=1",
            "loading=false",
            "loading=true",
            "state=2",
            "loading=false",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn successful_producer_is_bracketed_by_loading() {
    let store: Store<String, u32> = Store::new(0);
    let (log, _disposer) = record_all(&store);

    let outcome = store
        .execute(|| async {
            sleep(ms(30)).await;
            Ok(42)
        })
        .await;

    assert_eq!(outcome, ExecuteOutcome::Committed);
    assert_eq!(entries(&log), vec!["loading=true", "state=42", "loading=false"]);
}

#[tokio::test(start_paused = true)]
async fn failing_producer_is_bracketed_by_loading() {
    let store: Store<String, u32> = Store::new(0);
    let (log, _disposer) = record_all(&store);

    let outcome = store.execute(|| async { Err("timeout".to_string()) }).await;

    assert_eq!(outcome, ExecuteOutcome::Failed);
    assert_eq!(
        entries(&log),
        vec!["loading=true", "error=Some(\"timeout\")", "loading=false"]
    );
}

#[tokio::test(start_paused = true)]
async fn execute_waits_for_configured_debounce() {
    let store: Store<String, u32> = Store::builder(0).debounce(ms(300)).build().unwrap();
    let started = tokio::time::Instant::now();

    store.execute(|| async { Ok(1) }).await;

    assert!(started.elapsed() >= ms(300));
    assert_eq!(store.state(), 1);
}

#[tokio::test(start_paused = true)]
async fn either_left_becomes_error() {
    let store: Store<String, u32> = Store::new(0);

    let outcome = store
        .execute_either(|| async { Either::Left("denied".to_string()) })
        .await;

    assert_eq!(outcome, ExecuteOutcome::Failed);
    assert_eq!(store.error().as_deref(), Some("denied"));
    assert!(!store.is_loading());
}

#[tokio::test(start_paused = true)]
async fn either_right_becomes_state() {
    let store: Store<String, u32> = Store::new(0);

    let outcome = store
        .execute_either(|| async { Either::Right(11) })
        .await;

    assert_eq!(outcome, ExecuteOutcome::Committed);
    assert_eq!(store.state(), 11);
    assert!(!store.is_loading());
}

#[tokio::test(start_paused = true)]
async fn either_calls_share_the_debounce_with_execute() {
    let store: Store<String, u32> = Store::new(0);

    let (first, second) = tokio::join!(
        store.execute_with_delay(|| async { Ok(1) }, ms(50)),
        async {
            sleep(ms(10)).await;
            store
                .execute_either_with_delay(|| async { Either::Right(2) }, ms(50))
                .await
        }
    );

    assert_eq!(first, ExecuteOutcome::Superseded);
    assert_eq!(second, ExecuteOutcome::Committed);
    assert_eq!(store.state(), 2);
}

#[test]
fn error_observer_ignores_state_changes() {
    let store: Store<String, u32> = Store::new(0);
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    let _disposer = store.observer(Observer::new().on_error(move |e: Option<&String>| {
        sink.lock().unwrap().push(e.cloned());
    }));

    store.update(1);
    assert!(errors.lock().unwrap().is_empty());

    store.set_error("broken".into());
    assert_eq!(*errors.lock().unwrap(), vec![Some("broken".to_string())]);
}

#[tokio::test]
async fn disposed_observer_is_never_called_again() {
    let store: Store<String, u32> = Store::new(0);
    let (log, disposer) = record_all(&store);

    store.update(1);
    disposer.dispose().await;
    store.update(2);
    store.set_loading(true);
    store.set_error("late".into());

    assert_eq!(entries(&log), vec!["state=1"]);
}

#[tokio::test(start_paused = true)]
async fn destroy_cancels_in_flight_work_and_silences_observers() {
    let store: Store<String, u32> = Store::new(0);
    let (log, _disposer) = record_all(&store);

    let (outcome, ()) = tokio::join!(
        store.execute_with_delay(
            || async {
                sleep(ms(500)).await;
                Ok(9)
            },
            ms(10),
        ),
        async {
            sleep(ms(100)).await;
            store.destroy().await;
        }
    );

    assert_eq!(outcome, ExecuteOutcome::Cancelled);
    store.update(3);
    assert_eq!(store.state(), 0);
    assert_eq!(entries(&log), vec!["loading=true"]);
}

#[tokio::test(start_paused = true)]
async fn destroy_supersedes_debouncing_calls() {
    let store: Store<String, u32> = Store::new(0);

    let (outcome, ()) = tokio::join!(
        store.execute_with_delay(|| async { Ok(1) }, ms(50)),
        async {
            sleep(ms(10)).await;
            store.destroy().await;
        }
    );

    assert_eq!(outcome, ExecuteOutcome::Destroyed);
    assert_eq!(store.state(), 0);
    assert!(!store.is_loading());
}

#[tokio::test(start_paused = true)]
async fn subscribers_receive_each_triple_of_an_execution() {
    let store: Store<String, u32> = Store::new(0);
    let mut stream = store.subscribe();

    store.execute(|| async { Ok(5) }).await;

    let first = stream.recv().await.unwrap();
    let second = stream.recv().await.unwrap();
    let third = stream.recv().await.unwrap();
    assert_eq!(first.event(), TripleEvent::Loading);
    assert!(first.is_loading());
    assert_eq!(*second.state(), 5);
    assert_eq!(second.event(), TripleEvent::State);
    assert!(!third.is_loading());

    store.destroy().await;
    assert!(stream.recv().await.is_err());
}

#[tokio::test(start_paused = true)]
async fn store_handles_can_be_driven_from_spawned_tasks() {
    let store: Store<String, u32> = Store::new(0);

    let calls: Vec<_> = (1..=3)
        .map(|n| {
            let store = store.clone();
            tokio::spawn(async move {
                sleep(ms(n * 5)).await;
                store.execute(move || async move { Ok(n as u32) }).await
            })
        })
        .collect();

    let mut outcomes = Vec::new();
    for call in calls {
        outcomes.push(call.await.unwrap());
    }

    assert_eq!(
        outcomes,
        vec![
            ExecuteOutcome::Superseded,
            ExecuteOutcome::Superseded,
            ExecuteOutcome::Committed,
        ]
    );
    assert_eq!(store.state(), 3);
}

/// Holds up delivery of the first state-1 triple until released.
struct Gate {
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
    delivered: Mutex<Vec<u32>>,
}

impl Propagator<String, u32> for Gate {
    fn propagate(&self, triple: &Triple<String, u32>) {
        let first = self.delivered.lock().unwrap().is_empty();
        if first && *triple.state() == 1 {
            self.entered.lock().unwrap().send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
        }
        self.delivered.lock().unwrap().push(*triple.state());
    }
}

#[test]
fn concurrent_mutations_are_delivered_in_install_order() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let gate = Arc::new(Gate {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
        delivered: Mutex::new(Vec::new()),
    });
    let store: Store<String, u32> = Store::builder(0).propagator(gate.clone()).build().unwrap();

    let first = {
        let store = store.clone();
        thread::spawn(move || store.update(1))
    };
    entered_rx.recv().unwrap();

    // Installed while state 1 is still being delivered on the other thread.
    assert!(store.update(2));
    assert_eq!(store.state(), 2);

    release_tx.send(()).unwrap();
    assert!(first.join().unwrap());

    assert_eq!(*gate.delivered.lock().unwrap(), vec![1, 2]);
}

#[derive(Default)]
struct Recorder(Mutex<Vec<Triple<String, u32>>>);

impl Propagator<String, u32> for Recorder {
    fn propagate(&self, triple: &Triple<String, u32>) {
        self.0.lock().unwrap().push(triple.clone());
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn last_delivered_triple_matches_the_store_under_contention() {
    let recorder = Arc::new(Recorder::default());
    let store: Store<String, u32> = Store::builder(0)
        .propagator(recorder.clone())
        .build()
        .unwrap();

    let writers: Vec<_> = (0..4u32)
        .map(|writer| {
            let store = store.clone();
            tokio::spawn(async move {
                let mut accepted = 0;
                for step in 0..250u32 {
                    let changed = match step % 3 {
                        0 => store.update(writer * 1000 + step),
                        1 => store.set_loading(step % 2 == 0),
                        _ => store.set_error(format!("writer {writer}")),
                    };
                    accepted += usize::from(changed);
                    if step % 50 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
                accepted
            })
        })
        .collect();

    let mut accepted = 0;
    for writer in writers {
        accepted += writer.await.unwrap();
    }

    let delivered = recorder.0.lock().unwrap();
    assert_eq!(delivered.len(), accepted);
    assert_eq!(delivered.last(), Some(&*store.triple()));
    // Every installed triple differs from the one it replaced.
    assert!(delivered.windows(2).all(|pair| pair[0] != pair[1]));
}

async fn slow_explode() -> Result<u32, String> {
    sleep(ms(50)).await;
    panic!("producer exploded");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn producer_panic_clears_loading_after_the_caller_is_aborted() {
    let store: Store<String, u32> = Store::new(0);

    let caller = {
        let store = store.clone();
        tokio::spawn(async move { store.execute_with_delay(slow_explode, Duration::ZERO).await })
    };

    timeout(Duration::from_secs(5), async {
        while !store.is_loading() {
            sleep(ms(1)).await;
        }
    })
    .await
    .expect("execution never started");

    caller.abort();
    assert!(caller.await.unwrap_err().is_cancelled());

    timeout(Duration::from_secs(5), async {
        while store.is_loading() {
            sleep(ms(5)).await;
        }
    })
    .await
    .expect("loading flag was never cleared");

    assert_eq!(store.state(), 0);
    assert_eq!(store.error(), None);
}
