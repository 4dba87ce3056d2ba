use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::json;
use sq_client::{
    ClientError, ClientResult, Column, ExecutionClient, QueryKind, QueryStatus, ResultId,
    ResultPage, RowValues, SubmitParams,
};
use sq_core::request::DecompositionRequest;
use sq_core::trace::AttemptStatus;
use sq_core::window::{CalendarResolver, TimeRange, TimeWindow};
use sq_runner::{run, run_traced, ExecutorSettings, RetryPolicy, RunnerError};

/// In-process service holding a fixed set of event timestamps.
///
/// A submitted window returns the events inside it, oldest first, capped at
/// the submitted limit. Named ranges see every event.
struct ScriptedClient {
    events: Vec<DateTime<Utc>>,
    /// Submits to reject before accepting any.
    failing_submits: AtomicUsize,
    never_ready: bool,
    poll_delay: StdDuration,
    next_id: AtomicUsize,
    pending: Mutex<HashMap<String, (Vec<DateTime<Utc>>, u32)>>,
    submits: AtomicUsize,
    closes: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedClient {
    fn new(events: Vec<DateTime<Utc>>) -> Self {
        Self {
            events,
            failing_submits: AtomicUsize::new(0),
            never_ready: false,
            poll_delay: StdDuration::from_millis(0),
            next_id: AtomicUsize::new(1),
            pending: Mutex::new(HashMap::new()),
            submits: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    fn failing(mut self, submits: usize) -> Self {
        self.failing_submits = AtomicUsize::new(submits);
        self
    }

    fn slow(mut self, poll_delay_ms: u64) -> Self {
        self.poll_delay = StdDuration::from_millis(poll_delay_ms);
        self
    }

    fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn peak(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn matching(&self, kind: QueryKind, params: &SubmitParams) -> Vec<DateTime<Utc>> {
        match kind {
            QueryKind::Event => self.events.clone(),
            QueryKind::EventCustomTime => {
                let parse = |s: &Option<String>| {
                    DateTime::parse_from_rfc3339(s.as_deref().expect("custom bound"))
                        .expect("rfc3339 bound")
                        .with_timezone(&Utc)
                };
                let (start, end) = (parse(&params.custom_start), parse(&params.custom_end));
                self.events
                    .iter()
                    .copied()
                    .filter(|t| *t >= start && *t < end)
                    .collect()
            }
        }
    }
}

#[async_trait]
impl ExecutionClient for ScriptedClient {
    async fn submit(&self, kind: QueryKind, params: &SubmitParams) -> ClientResult<ResultId> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        let rejected = self
            .failing_submits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(ClientError::remote("service busy"));
        }

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let mut events = self.matching(kind, params);
        events.sort();
        self.pending
            .lock()
            .expect("pending lock")
            .insert(id.clone(), (events, params.limit));
        Ok(ResultId::new(id))
    }

    async fn poll_status(&self, _result_id: &ResultId) -> ClientResult<QueryStatus> {
        tokio::time::sleep(self.poll_delay).await;
        Ok(QueryStatus {
            complete: !self.never_ready,
        })
    }

    async fn fetch_rows(
        &self,
        result_id: &ResultId,
        start_pos: u32,
        num_rows: u32,
    ) -> ClientResult<ResultPage> {
        assert_eq!(start_pos, 0);
        let pending = self.pending.lock().expect("pending lock");
        let (events, limit) = pending
            .get(result_id.as_str())
            .ok_or_else(|| ClientError::remote("unknown result"))?;
        assert_eq!(num_rows, *limit);

        let rows = events
            .iter()
            .take(num_rows as usize)
            .enumerate()
            .map(|(i, t)| RowValues {
                values: vec![
                    json!(format!("144|{}", t.timestamp())),
                    json!(t.to_rfc3339()),
                    json!(format!("rule {i}")),
                ],
            })
            .collect();
        Ok(ResultPage {
            columns: vec![
                Column { name: "Alert.IPSIDAlertID".into() },
                Column { name: "Alert.LastTime".into() },
                Column { name: "Rule.msg".into() },
            ],
            rows,
        })
    }

    async fn close(&self, result_id: &ResultId) -> ClientResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.pending.lock().expect("pending lock").remove(result_id.as_str()).is_some() {
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap()
}

/// `count` events spread evenly across `[start, start + span)`.
fn spread(start: DateTime<Utc>, span: Duration, count: i64) -> Vec<DateTime<Utc>> {
    let step = span.num_milliseconds() / count;
    (0..count)
        .map(|i| start + Duration::milliseconds(i * step))
        .collect()
}

fn ten_hours() -> TimeRange {
    TimeRange::Custom(TimeWindow::new(t0(), t0() + Duration::hours(10)).unwrap())
}

fn settings(max_retries: u32) -> ExecutorSettings {
    ExecutorSettings {
        poll_interval_ms: 1,
        wait_timeout_ms: 50,
        retry: RetryPolicy {
            max_retries,
            backoff_ms: 0,
            ..Default::default()
        },
    }
}

fn resolver() -> Arc<CalendarResolver> {
    Arc::new(CalendarResolver::at(t0() + Duration::hours(10)))
}

async fn run_with(
    client: &Arc<ScriptedClient>,
    request: DecompositionRequest,
    max_retries: u32,
) -> Result<sq_core::request::QueryOutcome, RunnerError> {
    run(client.clone(), &request, settings(max_retries), resolver()).await
}

fn event_seconds(outcome: &sq_core::request::QueryOutcome) -> Vec<i64> {
    outcome
        .rows
        .iter()
        .map(|row| {
            let id = row.event_id().expect("event id");
            id.trim_start_matches("144|").parse().expect("timestamp")
        })
        .collect()
}

#[tokio::test]
async fn fewer_rows_than_limit_needs_no_split() {
    let client = Arc::new(ScriptedClient::new(spread(t0(), Duration::hours(10), 40)));
    let request = DecompositionRequest::new(ten_hours()).with_max_depth(3);

    let outcome = run_with(&client, request, 0).await.unwrap();
    assert!(outcome.complete);
    assert_eq!(outcome.rows.len(), 40);
    assert_eq!(outcome.attempts, 1);
    assert_eq!(outcome.windows_queried, 1);
    assert_eq!(client.submits(), 1);
}

#[tokio::test]
async fn exactly_limit_rows_without_depth_is_incomplete() {
    let client = Arc::new(ScriptedClient::new(spread(t0(), Duration::hours(10), 500)));
    let request = DecompositionRequest::new(ten_hours()).with_limit(500);

    let outcome = run_with(&client, request, 0).await.unwrap();
    assert!(!outcome.complete);
    assert_eq!(outcome.rows.len(), 500);
    assert_eq!(outcome.windows_queried, 1);
}

#[tokio::test]
async fn ten_hour_window_splits_into_ten_complete_hours() {
    // 120 events per hour
    let client = Arc::new(ScriptedClient::new(spread(t0(), Duration::hours(10), 1200)));
    let request = DecompositionRequest::new(ten_hours())
        .with_limit(500)
        .with_slots(10)
        .with_max_depth(1);

    let outcome = run_with(&client, request, 0).await.unwrap();
    assert!(outcome.complete);
    assert_eq!(outcome.rows.len(), 1200);
    assert_eq!(outcome.windows_queried, 11);
    assert_eq!(outcome.attempts, 11);

    let seconds = event_seconds(&outcome);
    let mut sorted = seconds.clone();
    sorted.sort();
    assert_eq!(seconds, sorted, "rows follow window order");
}

#[tokio::test]
async fn dense_sub_window_recurses_and_sums() {
    let mut events = spread(t0(), Duration::hours(10), 500);
    // A burst inside the fourth hour
    events.extend(spread(t0() + Duration::hours(3), Duration::hours(1), 800));
    let total = events.len();
    let client = Arc::new(ScriptedClient::new(events));
    let request = DecompositionRequest::new(ten_hours())
        .with_limit(500)
        .with_max_depth(2);

    let outcome = run_with(&client, request, 0).await.unwrap();
    assert!(outcome.complete);
    assert_eq!(outcome.rows.len(), total);
    // root + 10 hours + 10 slices of the dense hour
    assert_eq!(outcome.windows_queried, 21);
}

#[tokio::test]
async fn depth_exhausted_below_root_reports_incomplete() {
    let mut events = spread(t0(), Duration::hours(10), 500);
    events.extend(spread(t0() + Duration::hours(3), Duration::hours(1), 800));
    let client = Arc::new(ScriptedClient::new(events));
    let request = DecompositionRequest::new(ten_hours())
        .with_limit(500)
        .with_max_depth(1);

    let outcome = run_with(&client, request, 0).await.unwrap();
    assert!(!outcome.complete);
    // nine sparse hours of 50 events, plus the capped dense hour
    assert_eq!(outcome.rows.len(), 9 * 50 + 500);
}

#[tokio::test]
async fn delta_splits_only_the_root() {
    let client = Arc::new(ScriptedClient::new(spread(t0(), Duration::hours(10), 1200)));
    let request = DecompositionRequest::new(ten_hours())
        .with_limit(500)
        .with_delta("2h")
        .with_slots(3)
        .with_max_depth(2);

    let outcome = run_with(&client, request, 0).await.unwrap();
    assert!(outcome.complete);
    assert_eq!(outcome.rows.len(), 1200);
    // 240 events per 2h window: five children, none truncated
    assert_eq!(outcome.windows_queried, 6);
}

#[tokio::test]
async fn in_flight_attempts_never_exceed_workers() {
    let mut events = spread(t0(), Duration::hours(10), 2000);
    events.extend(spread(t0(), Duration::minutes(30), 600));
    let client = Arc::new(ScriptedClient::new(events).slow(3));
    let request = DecompositionRequest::new(ten_hours())
        .with_limit(500)
        .with_slots(20)
        .with_workers(3)
        .with_max_depth(3);

    let outcome = run_with(&client, request, 0).await.unwrap();
    assert!(outcome.complete);
    assert_eq!(outcome.rows.len(), 2600);
    assert!(client.peak() <= 3, "peak in-flight was {}", client.peak());
    assert_eq!(client.closes(), client.submits());
}

#[tokio::test]
async fn more_workers_than_windows_still_runs() {
    let client = Arc::new(ScriptedClient::new(spread(t0(), Duration::hours(10), 600)));
    let request = DecompositionRequest::new(ten_hours())
        .with_limit(500)
        .with_slots(4)
        .with_workers(50)
        .with_max_depth(1);

    let outcome = run_with(&client, request, 0).await.unwrap();
    assert!(outcome.complete);
    assert_eq!(outcome.rows.len(), 600);
    assert!(client.peak() <= 4);
}

#[tokio::test]
async fn transient_failure_within_budget_is_retried() {
    let client = Arc::new(ScriptedClient::new(spread(t0(), Duration::hours(1), 10)).failing(1));
    let request = DecompositionRequest::new(ten_hours());

    let (outcome, spans) = run_traced(client.clone(), &request, settings(1), resolver())
        .await
        .unwrap();
    assert!(outcome.complete);
    assert_eq!(outcome.rows.len(), 10);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(client.submits(), 2);

    assert_eq!(spans[0].status, AttemptStatus::Failed);
    assert_eq!(spans[1].status, AttemptStatus::Closed);
    assert_eq!(spans[1].attempt, 2);
    assert!(spans.iter().all(|s| s.run_id == outcome.run_id));
}

#[tokio::test]
async fn retry_budget_bounds_reattempts() {
    let client = Arc::new(ScriptedClient::new(Vec::new()).failing(10));
    let request = DecompositionRequest::new(ten_hours());

    let err = run_with(&client, request, 3).await.unwrap_err();
    assert!(matches!(err, RunnerError::RemoteService(ref msg) if msg.contains("service busy")));
    assert_eq!(client.submits(), 4);
}

#[tokio::test]
async fn stuck_query_times_out() {
    let client = Arc::new(ScriptedClient {
        never_ready: true,
        ..ScriptedClient::new(Vec::new())
    });
    let request = DecompositionRequest::new(ten_hours());

    let err = run_with(&client, request, 1).await.unwrap_err();
    assert!(matches!(err, RunnerError::QueryTimeout { .. }));
    assert!(err.is_transient());
    assert_eq!(client.submits(), 2);
    assert_eq!(client.closes(), 2);
}

#[tokio::test]
async fn failing_sub_window_aborts_the_run() {
    let inner = Arc::new(ScriptedClient::new(spread(t0(), Duration::hours(10), 600)));
    let flaky = Arc::new(FlakyAfterRoot {
        inner: inner.clone(),
        calls: AtomicUsize::new(0),
    });
    let request = DecompositionRequest::new(ten_hours())
        .with_limit(500)
        .with_max_depth(1);

    let err = run(flaky, &request, settings(0), resolver()).await.unwrap_err();
    assert!(matches!(err, RunnerError::RemoteService(ref msg) if msg.contains("connection reset")));
    assert_eq!(inner.submits(), 1);
}

/// Accepts the first submit, rejects the rest.
struct FlakyAfterRoot {
    inner: Arc<ScriptedClient>,
    calls: AtomicUsize,
}

#[async_trait]
impl ExecutionClient for FlakyAfterRoot {
    async fn submit(&self, kind: QueryKind, params: &SubmitParams) -> ClientResult<ResultId> {
        if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(ClientError::connection("connection reset"));
        }
        self.inner.submit(kind, params).await
    }

    async fn poll_status(&self, result_id: &ResultId) -> ClientResult<QueryStatus> {
        self.inner.poll_status(result_id).await
    }

    async fn fetch_rows(
        &self,
        result_id: &ResultId,
        start_pos: u32,
        num_rows: u32,
    ) -> ClientResult<ResultPage> {
        self.inner.fetch_rows(result_id, start_pos, num_rows).await
    }

    async fn close(&self, result_id: &ResultId) -> ClientResult<()> {
        self.inner.close(result_id).await
    }
}

#[tokio::test]
async fn named_range_resolves_before_splitting() {
    let now = t0() + Duration::hours(10);
    let client = Arc::new(ScriptedClient::new(spread(now - Duration::hours(1), Duration::hours(1), 700)));
    let request = DecompositionRequest::new(TimeRange::named("LAST_HOUR"))
        .with_limit(500)
        .with_max_depth(1);

    let outcome = run_with(&client, request, 0).await.unwrap();
    assert!(outcome.complete);
    assert_eq!(outcome.rows.len(), 700);
    assert_eq!(outcome.windows_queried, 11);
}

#[tokio::test]
async fn unresolvable_named_range_cannot_split() {
    let client = Arc::new(ScriptedClient::new(spread(t0(), Duration::hours(1), 600)));
    let request = DecompositionRequest::new(TimeRange::named("CURRENT_QUARTER"))
        .with_limit(500)
        .with_max_depth(1);
    let err = run_with(&client, request.clone(), 0).await.unwrap_err();
    assert!(matches!(err, RunnerError::UnsupportedRange(_)));

    // Without a depth budget the range is never resolved.
    let outcome = run_with(&client, request.with_max_depth(0), 0).await.unwrap();
    assert!(!outcome.complete);
    assert_eq!(outcome.rows.len(), 500);
}

#[tokio::test]
async fn invalid_parameters_fail_before_any_query() {
    let client = Arc::new(ScriptedClient::new(Vec::new()));
    let err = run_with(&client, DecompositionRequest::new(ten_hours()).with_slots(0), 0)
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::InvalidArgument(_)));
    assert_eq!(client.submits(), 0);
}
