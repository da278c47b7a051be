mod common;

use std::time::Duration;

use common::{api_error, progress, FakeApi, RealSleeper, RecordingSleeper, VecSink};
use pretty_assertions::assert_eq;
use report_core::JobStatus;
use report_engine::{poll_job, EngineEvent, FailureKind, PollSettings};
use tokio_util::sync::CancellationToken;

fn settings(max_attempts: u32) -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(500),
        max_attempts,
    }
}

fn attempts(sink: &VecSink) -> Vec<u32> {
    sink.events
        .lock()
        .unwrap()
        .iter()
        .filter_map(|event| match event {
            EngineEvent::Progress { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn stops_at_first_terminal_status() {
    let api = FakeApi::with_progress(vec![
        Ok(progress(JobStatus::Starting, 0, 3)),
        Ok(progress(JobStatus::Processing, 1, 3)),
        Ok(progress(JobStatus::Completed, 3, 3)),
        Ok(progress(JobStatus::Processing, 1, 3)),
    ]);
    let sleeper = RecordingSleeper::default();
    let sink = VecSink::default();

    let last = poll_job(
        &api,
        "job_1",
        &settings(10),
        &sleeper,
        &sink,
        &CancellationToken::new(),
    )
    .await
    .expect("completed");

    assert_eq!(last.status, JobStatus::Completed);
    assert_eq!(api.progress_calls(), 3);
    assert_eq!(attempts(&sink), vec![1, 2, 3]);
    assert_eq!(
        *sleeper.sleeps.lock().unwrap(),
        vec![Duration::from_millis(500); 2]
    );
}

#[tokio::test]
async fn error_status_is_terminal_too() {
    let mut failed = progress(JobStatus::Error, 1, 3);
    failed.error = Some("Sheet missing".into());
    let api = FakeApi::with_progress(vec![Ok(failed)]);
    let sink = VecSink::default();

    let last = poll_job(
        &api,
        "job_1",
        &settings(10),
        &RecordingSleeper::default(),
        &sink,
        &CancellationToken::new(),
    )
    .await
    .expect("terminal error is still a finished poll");

    assert_eq!(last.error.as_deref(), Some("Sheet missing"));
    assert_eq!(api.progress_calls(), 1);
}

#[tokio::test]
async fn request_failure_ends_loop_without_retry() {
    let api = FakeApi::with_progress(vec![
        Ok(progress(JobStatus::Processing, 1, 3)),
        Err(api_error(FailureKind::HttpStatus(404), "Job not found")),
        Ok(progress(JobStatus::Completed, 3, 3)),
    ]);
    let sink = VecSink::default();

    let err = poll_job(
        &api,
        "job_1",
        &settings(10),
        &RecordingSleeper::default(),
        &sink,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind, FailureKind::HttpStatus(404));
    assert_eq!(api.progress_calls(), 2);
    assert_eq!(attempts(&sink), vec![1]);
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let api = FakeApi::with_progress(vec![Ok(progress(JobStatus::Processing, 1, 3))]);
    let sleeper = RecordingSleeper::default();
    let sink = VecSink::default();

    let err = poll_job(
        &api,
        "job_1",
        &settings(4),
        &sleeper,
        &sink,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind, FailureKind::PollLimitExceeded { attempts: 4 });
    assert_eq!(api.progress_calls(), 4);
    assert_eq!(attempts(&sink), vec![1, 2, 3, 4]);
    assert_eq!(sleeper.sleeps.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn cancelled_token_stops_before_any_request() {
    let api = FakeApi::with_progress(vec![Ok(progress(JobStatus::Processing, 1, 3))]);
    let token = CancellationToken::new();
    token.cancel();

    let err = poll_job(
        &api,
        "job_1",
        &settings(10),
        &RecordingSleeper::default(),
        &VecSink::default(),
        &token,
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind, FailureKind::Cancelled);
}

#[tokio::test]
async fn cancellation_interrupts_sleep() {
    let api = FakeApi::with_progress(vec![Ok(progress(JobStatus::Processing, 1, 3))]);
    let token = CancellationToken::new();
    let sink = VecSink::default();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        canceller.cancel();
    });

    let err = poll_job(
        &api,
        "job_1",
        &PollSettings {
            interval: Duration::from_secs(30),
            max_attempts: 10,
        },
        &RealSleeper,
        &sink,
        &token,
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind, FailureKind::Cancelled);
    assert_eq!(api.progress_calls(), 1);
}
