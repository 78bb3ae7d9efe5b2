//! SSE streaming of reanalysis progress.
//!
//! Provides `GET /api/llm/score-progress/{id}`: an event stream that polls
//! the progress tracker at a fixed cadence, suppresses duplicate payloads
//! byte-wise, and closes once a terminal status has been delivered. Client
//! disconnects end the stream only — the underlying reanalysis keeps
//! running and publishing for any later subscriber.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::IntoResponse;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use newslens_core::progress::{ProgressState, ProgressTracker, Status};

use crate::error::ApiError;
use crate::routes::parse_article_id;
use crate::state::AppState;

/// Tracker poll cadence; transitions are observed within one tick.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Grace period before closing a stream that delivered `Complete`, giving
/// UIs time to play their completion animation.
const COMPLETE_CLOSE_DELAY: Duration = Duration::from_secs(3);

/// `GET /api/llm/score-progress/{id}` — stream progress events.
pub async fn score_progress(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_article_id(&id)?;
    let tracker = Arc::clone(&state.progress);

    let (tx, rx) = mpsc::channel::<String>(32);
    tokio::spawn(stream_progress(tracker, id, tx));

    let events = ReceiverStream::new(rx)
        .map(|payload| Ok::<_, Infallible>(Event::default().event("progress").data(payload)));

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        Sse::new(events),
    ))
}

/// Poll the tracker and forward state changes as JSON payloads until a
/// terminal status has been sent or the client goes away (send failure).
/// Dropping the sender closes the event stream.
async fn stream_progress(
    tracker: Arc<ProgressTracker>,
    article_id: i64,
    tx: mpsc::Sender<String>,
) {
    let initial = tracker
        .get(article_id)
        .unwrap_or_else(ProgressState::connected);
    let Ok(mut last_payload) = serde_json::to_string(&initial) else {
        return;
    };

    if tx.send(last_payload.clone()).await.is_err() {
        return;
    }
    if initial.status.is_terminal() {
        close_delay(initial.status).await;
        return;
    }

    loop {
        tokio::time::sleep(POLL_INTERVAL).await;

        let Some(state) = tracker.get(article_id) else {
            continue;
        };
        let Ok(payload) = serde_json::to_string(&state) else {
            continue;
        };

        if payload != last_payload {
            if tx.send(payload.clone()).await.is_err() {
                // Client disconnected; the reanalysis is unaffected.
                return;
            }
            last_payload = payload;
        }

        if state.status.is_terminal() {
            close_delay(state.status).await;
            return;
        }
    }
}

async fn close_delay(status: Status) {
    if status == Status::Complete {
        tokio::time::sleep(COMPLETE_CLOSE_DELAY).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parse(payload: &str) -> Value {
        serde_json::from_str(payload).expect("valid JSON payload")
    }

    async fn collect_payloads(mut rx: mpsc::Receiver<String>) -> Vec<Value> {
        let mut payloads = Vec::new();
        while let Some(payload) = rx.recv().await {
            payloads.push(parse(&payload));
        }
        payloads
    }

    #[tokio::test(start_paused = true)]
    async fn synthetic_connected_event_when_no_state_exists_yet() {
        let tracker = Arc::new(ProgressTracker::new());
        let (tx, mut rx) = mpsc::channel(32);

        let handle = tokio::spawn(stream_progress(Arc::clone(&tracker), 1, tx));

        let first = parse(&rx.recv().await.expect("initial event"));
        assert_eq!(first["status"], "Connected");
        assert_eq!(first["step"], "Initializing");
        assert_eq!(first["percent"], 0.0);

        // Publish a terminal state so the stream closes.
        tracker.set(1, ProgressState::error("Error", "boom", 0.0));
        handle.await.expect("join");
    }

    #[tokio::test(start_paused = true)]
    async fn stream_closes_after_terminal_event() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.set(1, ProgressState::in_progress("Queued", "queued", 0.0));

        let (tx, mut rx) = mpsc::channel(32);
        let handle = tokio::spawn(stream_progress(Arc::clone(&tracker), 1, tx));

        let initial = parse(&rx.recv().await.expect("initial"));
        assert_eq!(initial["step"], "Queued");

        tracker.set(1, ProgressState::complete(0.25));

        let terminal = parse(&rx.recv().await.expect("terminal"));
        assert_eq!(terminal["status"], "Complete");
        assert_eq!(terminal["final_score"], 0.25);

        // Channel closes after the terminal event: at most one final event.
        assert!(rx.recv().await.is_none());
        handle.await.expect("join");
    }

    #[tokio::test(start_paused = true)]
    async fn already_terminal_state_yields_one_event_then_close() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.set(1, ProgressState::skipped());

        let (tx, rx) = mpsc::channel(32);
        let handle = tokio::spawn(stream_progress(tracker, 1, tx));

        let payloads = collect_payloads(rx).await;
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0]["status"], "Skipped");
        handle.await.expect("join");
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_states_are_suppressed() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.set(1, ProgressState::in_progress("Queued", "queued", 0.0));

        let (tx, mut rx) = mpsc::channel(32);
        let handle = tokio::spawn(stream_progress(Arc::clone(&tracker), 1, tx));

        let _initial = rx.recv().await.expect("initial");

        // Re-setting an identical state before the next tick must not
        // produce a second event.
        tracker.set(1, ProgressState::in_progress("Queued", "queued", 0.0));
        tracker.set(1, ProgressState::error("Error", "boom", 50.0));

        let next = parse(&rx.recv().await.expect("next"));
        assert_eq!(next["status"], "Error");
        assert_eq!(next["error"], "boom");
        assert!(rx.recv().await.is_none());
        handle.await.expect("join");
    }

    #[tokio::test(start_paused = true)]
    async fn observed_percent_sequence_is_non_decreasing() {
        let tracker = Arc::new(ProgressTracker::new());
        tracker.set(1, ProgressState::in_progress("Queued", "queued", 0.0));

        let (tx, rx) = mpsc::channel(32);
        let handle = tokio::spawn(stream_progress(Arc::clone(&tracker), 1, tx));

        let writer = {
            let tracker = Arc::clone(&tracker);
            tokio::spawn(async move {
                let steps = [("Preparing", 17.0), ("Scoring", 50.0), ("Calculating", 67.0)];
                for (step, percent) in steps {
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    tracker.set(1, ProgressState::in_progress(step, step, percent));
                }
                tokio::time::sleep(Duration::from_millis(300)).await;
                tracker.set(1, ProgressState::complete(0.1));
            })
        };

        let payloads = collect_payloads(rx).await;
        writer.await.expect("writer");
        handle.await.expect("join");

        let percents: Vec<f64> = payloads
            .iter()
            .filter_map(|p| p["percent"].as_f64())
            .collect();

        assert!(percents.len() >= 2, "expected several events: {payloads:?}");
        for pair in percents.windows(2) {
            assert!(pair[0] <= pair[1], "percents regressed: {percents:?}");
        }
        assert_eq!(payloads.last().expect("last")["status"], "Complete");
    }
}
