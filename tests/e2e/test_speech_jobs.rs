use crate::e2e::helpers;

use helpers::assertions::{assert_job_response, job_chunk_urls};
use helpers::fixtures::{plain_words, short_text};
use helpers::{TestContext, TestOptions};
use hyper::StatusCode;
use serde_json::json;
use speechcast_backend::infrastructure::providers::ProviderError;
use std::collections::HashSet;
use std::time::Duration;
use test_context::test_context;

#[tokio::test]
async fn it_should_share_one_job_between_concurrent_identical_requests() {
    let ctx = TestContext::new().await;
    let text = plain_words(500);

    let mut futures = Vec::new();
    for _ in 0..10 {
        let client = ctx.client.clone();
        let body = json!({ "text": text });
        futures.push(async move { client.post("/api/speech/jobs", &body).await });
    }
    let responses = futures::future::join_all(futures).await;

    let mut job_ids = HashSet::new();
    for response in responses {
        let response = response.unwrap();
        assert!(
            response.status == StatusCode::ACCEPTED || response.status == StatusCode::OK,
            "unexpected status {}",
            response.status
        );
        job_ids.insert(response.str_field("job_id").unwrap().to_string());
    }
    assert_eq!(job_ids.len(), 1, "all requests must join the same job");

    let job_id = job_ids.into_iter().next().unwrap();
    let job = ctx.wait_for_job(&job_id).await;

    assert_job_response(&job, "completed", 4);
    assert_eq!(job.get("completed_chunks").and_then(|v| v.as_i64()), Some(4));
    let urls = job_chunk_urls(&job);
    assert_eq!(
        urls.iter().map(|(index, _)| *index).collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );
    assert_eq!(
        urls[0].1,
        format!("memory://audio/jobs/{}/chunk_0.mp3", job_id)
    );

    // One provider request per chunk, no matter how many callers
    assert_eq!(ctx.provider.call_count(), 4);
    assert_eq!(ctx.storage.upload_count(), 4);

    let repeat = ctx
        .client
        .post("/api/speech/jobs", &json!({ "text": text }))
        .await
        .unwrap();
    repeat.assert_status(StatusCode::OK);
    assert_eq!(repeat.str_field("job_id"), Some(job_id.as_str()));
    assert_eq!(
        repeat.body.as_ref().unwrap().get("cached").and_then(|v| v.as_bool()),
        Some(true)
    );
    assert_eq!(ctx.provider.call_count(), 4);
}

#[tokio::test]
async fn it_should_return_immediately_and_queue_every_chunk() {
    let mut ctx = TestContext::with_options(TestOptions {
        start_workers: false,
        ..TestOptions::default()
    })
    .await;
    let text = plain_words(500);

    let response = ctx
        .client
        .post("/api/speech/jobs", &json!({ "text": text }))
        .await
        .unwrap();
    response.assert_status(StatusCode::ACCEPTED);
    let job = response.body.as_ref().unwrap();
    assert_job_response(job, "pending", 4);
    assert_eq!(job.get("cached").and_then(|v| v.as_bool()), Some(false));
    assert!(job_chunk_urls(job).is_empty());

    assert_eq!(ctx.queue.len(), 4);
    assert_eq!(ctx.provider.call_count(), 0);

    // Joining the in-flight job does not enqueue anything new
    let joined = ctx
        .client
        .post("/api/speech/jobs", &json!({ "text": text }))
        .await
        .unwrap();
    joined.assert_status(StatusCode::ACCEPTED);
    assert_eq!(joined.str_field("job_id"), response.str_field("job_id"));
    assert_eq!(ctx.queue.len(), 4);

    ctx.start_workers();
    let job_id = response.str_field("job_id").unwrap().to_string();
    let job = ctx.wait_for_job(&job_id).await;
    assert_eq!(job.get("status").and_then(|v| v.as_str()), Some("completed"));
    assert_eq!(ctx.provider.call_count(), 4);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_keep_separate_jobs_per_voice(ctx: &TestContext) {
    let text = short_text("voices");

    let joanna = ctx
        .client
        .post("/api/speech/jobs", &json!({ "text": text, "voice": "Joanna" }))
        .await
        .unwrap();
    let matthew = ctx
        .client
        .post("/api/speech/jobs", &json!({ "text": text, "voice": "Matthew" }))
        .await
        .unwrap();

    assert_ne!(joanna.str_field("job_id"), matthew.str_field("job_id"));
    assert_eq!(matthew.str_field("voice"), Some("Matthew"));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_resolve_auto_voice_from_language(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/speech/jobs",
            &json!({
                "text": "Este es un artículo bastante largo escrito en español para escuchar más tarde.",
                "voice": "auto"
            }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::ACCEPTED);
    assert_eq!(response.str_field("voice"), Some("Lupe"));
}

#[tokio::test]
async fn it_should_end_rate_limited_when_provider_keeps_throttling() {
    let ctx = TestContext::with_options(TestOptions {
        worker_concurrency: 1,
        ..TestOptions::default()
    })
    .await;
    ctx.provider
        .fail_always(ProviderError::RateLimited("quota exceeded".to_string()));

    let response = ctx
        .client
        .post("/api/speech/jobs", &json!({ "text": short_text("throttled") }))
        .await
        .unwrap();
    response.assert_status(StatusCode::ACCEPTED);

    let job = ctx
        .wait_for_job(response.str_field("job_id").unwrap())
        .await;

    assert_eq!(job.get("status").and_then(|v| v.as_str()), Some("rate_limited"));
    assert_eq!(job.get("completed_chunks").and_then(|v| v.as_i64()), Some(0));
    let message = job.get("error_message").and_then(|v| v.as_str()).unwrap();
    assert!(message.contains("chunk 0 failed"), "got {}", message);

    // First attempt plus one retry
    assert_eq!(ctx.provider.call_count(), 2);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_retry_transient_provider_errors(ctx: &TestContext) {
    ctx.provider.fail_next(ProviderError::Http {
        status: 503,
        message: "try again".to_string(),
    });

    let response = ctx
        .client
        .post("/api/speech/jobs", &json!({ "text": short_text("flaky") }))
        .await
        .unwrap();

    let job = ctx
        .wait_for_job(response.str_field("job_id").unwrap())
        .await;

    assert_eq!(job.get("status").and_then(|v| v.as_str()), Some("completed"));
    assert_eq!(job_chunk_urls(&job).len(), 1);
    assert_eq!(ctx.provider.call_count(), 2);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_fail_without_retry_on_client_errors(ctx: &TestContext) {
    ctx.provider.fail_always(ProviderError::Http {
        status: 400,
        message: "voice not supported".to_string(),
    });

    let response = ctx
        .client
        .post("/api/speech/jobs", &json!({ "text": short_text("rejected") }))
        .await
        .unwrap();

    let job = ctx
        .wait_for_job(response.str_field("job_id").unwrap())
        .await;

    assert_eq!(job.get("status").and_then(|v| v.as_str()), Some("failed"));
    assert!(job
        .get("error_message")
        .and_then(|v| v.as_str())
        .unwrap()
        .contains("voice not supported"));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctx.provider.call_count(), 1);
}

#[tokio::test]
async fn it_should_skip_remaining_chunks_once_job_has_failed() {
    let mut ctx = TestContext::with_options(TestOptions {
        worker_concurrency: 1,
        start_workers: false,
        ..TestOptions::default()
    })
    .await;
    ctx.provider.fail_next(ProviderError::Http {
        status: 400,
        message: "text rejected".to_string(),
    });

    let response = ctx
        .client
        .post("/api/speech/jobs", &json!({ "text": plain_words(500) }))
        .await
        .unwrap();
    response.assert_status(StatusCode::ACCEPTED);
    assert_eq!(ctx.queue.len(), 4);

    ctx.start_workers();
    let job_id = response.str_field("job_id").unwrap().to_string();
    let job = ctx.wait_for_job(&job_id).await;
    assert_eq!(job.get("status").and_then(|v| v.as_str()), Some("failed"));
    assert!(job
        .get("error_message")
        .and_then(|v| v.as_str())
        .unwrap()
        .contains("chunk 0 failed"));

    // The other three tasks are drained without reaching the provider
    while !ctx.queue.is_empty() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(ctx.provider.call_count(), 1);
    assert_eq!(ctx.storage.upload_count(), 0);

    let after = ctx.client.get(&format!("/api/speech/jobs/{}", job_id)).await.unwrap();
    let after = after.body.as_ref().unwrap();
    assert_eq!(after.get("status").and_then(|v| v.as_str()), Some("failed"));
    assert_eq!(after.get("completed_chunks").and_then(|v| v.as_i64()), Some(0));
    assert!(job_chunk_urls(after).is_empty());
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_start_a_new_job_after_a_failed_one(ctx: &TestContext) {
    ctx.provider.fail_next(ProviderError::Http {
        status: 400,
        message: "bad input".to_string(),
    });
    let text = short_text("second chance");

    let first = ctx
        .client
        .post("/api/speech/jobs", &json!({ "text": text }))
        .await
        .unwrap();
    let first_id = first.str_field("job_id").unwrap().to_string();
    let failed = ctx.wait_for_job(&first_id).await;
    assert_eq!(failed.get("status").and_then(|v| v.as_str()), Some("failed"));

    let second = ctx
        .client
        .post("/api/speech/jobs", &json!({ "text": text }))
        .await
        .unwrap();
    second.assert_status(StatusCode::ACCEPTED);
    let second_id = second.str_field("job_id").unwrap().to_string();
    assert_ne!(first_id, second_id);

    let job = ctx.wait_for_job(&second_id).await;
    assert_eq!(job.get("status").and_then(|v| v.as_str()), Some("completed"));
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_return_404_for_unknown_job(ctx: &TestContext) {
    let response = ctx
        .client
        .get(&format!("/api/speech/jobs/{}", uuid::Uuid::new_v4()))
        .await
        .unwrap();

    response.assert_status(StatusCode::NOT_FOUND);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_empty_text(ctx: &TestContext) {
    let response = ctx
        .client
        .post("/api/speech/jobs", &json!({ "text": "   \n\t " }))
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_error_message("empty");
    assert_eq!(ctx.provider.call_count(), 0);
}

#[test_context(TestContext)]
#[tokio::test]
async fn it_should_reject_unsupported_format(ctx: &TestContext) {
    let response = ctx
        .client
        .post(
            "/api/speech/jobs",
            &json!({ "text": short_text("format"), "format": "midi" }),
        )
        .await
        .unwrap();

    response.assert_status(StatusCode::BAD_REQUEST);
    response.assert_error_message("Unsupported audio format");
}

#[tokio::test]
async fn it_should_reject_jobs_when_provider_is_not_configured() {
    let ctx = TestContext::with_options(TestOptions {
        provider_configured: false,
        ..TestOptions::default()
    })
    .await;

    let response = ctx
        .client
        .post("/api/speech/jobs", &json!({ "text": short_text("no keys") }))
        .await
        .unwrap();

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert!(ctx.queue.is_empty());
}
