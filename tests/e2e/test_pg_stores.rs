// Postgres-backed store tests. They need Docker, so they only run on demand:
//
//     cargo test --test e2e_tests -- --ignored

use crate::e2e::helpers;

use chrono::{Duration as ChronoDuration, Utc};
use helpers::pg_database;
use serial_test::serial;
use speechcast_backend::domain::chunking::ChunkBoundary;
use speechcast_backend::domain::material::{
    ChunkClaim, ChunkKey, ChunkStatus, MaterialChunkPlan, PlanOutcome,
};
use speechcast_backend::domain::speech::{AudioFormat, GenerationJob, JobStatus};
use speechcast_backend::infrastructure::repositories::{
    JobAdmission, JobStore, MaterialStore, PgJobStore, PgMaterialStore,
};
use std::sync::Arc;
use uuid::Uuid;

fn long_ago() -> chrono::DateTime<Utc> {
    Utc::now() - ChronoDuration::hours(1)
}

fn plan(material_id: Uuid, hash: &str, chunks: usize) -> MaterialChunkPlan {
    let boundaries = (0..chunks)
        .map(|i| ChunkBoundary {
            start: i * 10,
            end: (i + 1) * 10,
        })
        .collect();
    MaterialChunkPlan::new(material_id, hash.to_string(), boundaries, 10)
}

fn claim(material_id: Uuid, index: i32, hash: &str) -> ChunkClaim {
    ChunkClaim {
        key: ChunkKey {
            material_id,
            chunk_index: index,
            voice: "Joanna".to_string(),
        },
        content_hash: hash.to_string(),
        char_start: index * 10,
        char_end: (index + 1) * 10,
        processing_stale_before: long_ago(),
        pending_stale_before: long_ago(),
    }
}

#[tokio::test]
#[serial]
#[ignore]
async fn it_should_admit_one_in_flight_job_per_key() {
    let db = pg_database().await;
    let store = PgJobStore::new(Arc::new(db.pool.clone()));

    let first = GenerationJob::new("h1".to_string(), "Joanna".to_string(), AudioFormat::Mp3, 2, None);
    let second = GenerationJob::new("h1".to_string(), "Joanna".to_string(), AudioFormat::Mp3, 2, None);

    let created = store.create_or_join_job(first.clone(), long_ago()).await.unwrap();
    assert!(matches!(created, JobAdmission::Created(_)));

    let joined = store.create_or_join_job(second, long_ago()).await.unwrap();
    match joined {
        JobAdmission::Existing(job) => assert_eq!(job.id, first.id),
        JobAdmission::Created(_) => panic!("second job must join the first"),
    }
}

#[tokio::test]
#[serial]
#[ignore]
async fn it_should_complete_job_exactly_once() {
    let db = pg_database().await;
    let store = PgJobStore::new(Arc::new(db.pool.clone()));

    let job = GenerationJob::new("h2".to_string(), "Joanna".to_string(), AudioFormat::Mp3, 2, None);
    store.create_or_join_job(job.clone(), long_ago()).await.unwrap();
    assert_eq!(
        store.mark_job_processing(job.id).await.unwrap(),
        Some(JobStatus::Processing)
    );

    let first = store.record_job_chunk(job.id, 1, "u1").await.unwrap().unwrap();
    assert_eq!(first.completed_chunks, 1);
    assert!(!first.job_completed);

    // Same slot again changes nothing
    assert!(store.record_job_chunk(job.id, 1, "u1-late").await.unwrap().is_none());

    let last = store.record_job_chunk(job.id, 0, "u0").await.unwrap().unwrap();
    assert!(last.job_completed);
    assert_eq!(last.status, JobStatus::Completed);

    let stored = store.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(
        stored.chunk_urls,
        vec![Some("u0".to_string()), Some("u1".to_string())]
    );
    assert!(!store
        .fail_job(job.id, JobStatus::Failed, "too late")
        .await
        .unwrap());
}

#[tokio::test]
#[serial]
#[ignore]
async fn it_should_fail_stalled_jobs_before_admitting_new_ones() {
    let db = pg_database().await;
    let store = PgJobStore::new(Arc::new(db.pool.clone()));

    let stalled = GenerationJob::new("h3".to_string(), "Joanna".to_string(), AudioFormat::Mp3, 1, None);
    store.create_or_join_job(stalled.clone(), long_ago()).await.unwrap();

    let fresh = GenerationJob::new("h3".to_string(), "Joanna".to_string(), AudioFormat::Mp3, 1, None);
    let admission = store
        .create_or_join_job(fresh.clone(), Utc::now() + ChronoDuration::seconds(1))
        .await
        .unwrap();

    assert!(matches!(admission, JobAdmission::Created(ref job) if job.id == fresh.id));
    let old = store.get_job(stalled.id).await.unwrap().unwrap();
    assert_eq!(old.status, JobStatus::Failed);
}

#[tokio::test]
#[serial]
#[ignore]
async fn it_should_purge_chunk_audio_when_plan_changes() {
    let db = pg_database().await;
    let store = PgMaterialStore::new(Arc::new(db.pool.clone()));
    let material_id = Uuid::new_v4();

    let created = store.ensure_plan(plan(material_id, "v1", 3)).await.unwrap();
    assert!(matches!(created, PlanOutcome::Created(_)));
    assert!(store.claim_chunk(&claim(material_id, 0, "v1")).await.unwrap());
    assert!(store.claim_chunk(&claim(material_id, 1, "v1")).await.unwrap());

    let unchanged = store.ensure_plan(plan(material_id, "v1", 3)).await.unwrap();
    assert!(matches!(unchanged, PlanOutcome::Unchanged(_)));

    let replaced = store.ensure_plan(plan(material_id, "v2", 2)).await.unwrap();
    match replaced {
        PlanOutcome::Replaced {
            plan,
            invalidated_rows,
        } => {
            assert_eq!(plan.total_chunks, 2);
            assert_eq!(invalidated_rows, 2);
        }
        other => panic!("expected a replaced plan, got {:?}", other),
    }
    assert!(store
        .list_chunk_audio(material_id, "Joanna")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
#[serial]
#[ignore]
async fn it_should_claim_complete_and_reclaim_chunks() {
    let db = pg_database().await;
    let store = PgMaterialStore::new(Arc::new(db.pool.clone()));
    let material_id = Uuid::new_v4();
    store.ensure_plan(plan(material_id, "v1", 2)).await.unwrap();

    let first = claim(material_id, 0, "v1");
    assert!(store.claim_chunk(&first).await.unwrap());
    assert!(!store.claim_chunk(&first).await.unwrap());

    assert!(store.mark_chunk_processing(&first.key, "v1").await.unwrap());
    assert!(store
        .complete_chunk(&first.key, "v1", "url-0", "key-0")
        .await
        .unwrap());
    assert!(!store
        .complete_chunk(&first.key, "v1", "url-0b", "key-0b")
        .await
        .unwrap());
    assert!(!store.fail_chunk(&first.key, "v1", "late").await.unwrap());

    let second = claim(material_id, 1, "v1");
    assert!(store.claim_chunk(&second).await.unwrap());
    assert!(store.fail_chunk(&second.key, "v1", "boom").await.unwrap());
    assert!(store.claim_chunk(&second).await.unwrap());

    let rows = store.list_chunk_audio(material_id, "Joanna").await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].status, ChunkStatus::Completed);
    assert_eq!(rows[0].audio_url.as_deref(), Some("url-0"));
    assert_eq!(rows[1].status, ChunkStatus::Pending);
    assert_eq!(rows[1].error_message, None);
}

#[tokio::test]
#[serial]
#[ignore]
async fn it_should_reject_claims_for_replaced_content() {
    let db = pg_database().await;
    let store = PgMaterialStore::new(Arc::new(db.pool.clone()));
    let material_id = Uuid::new_v4();
    store.ensure_plan(plan(material_id, "v1", 2)).await.unwrap();
    store.ensure_plan(plan(material_id, "v2", 2)).await.unwrap();

    assert!(store.claim_chunk(&claim(material_id, 0, "v2")).await.unwrap());
    // A request still holding v1 must neither reset the v2 row nor insert a v1 row
    assert!(!store.claim_chunk(&claim(material_id, 0, "v1")).await.unwrap());
    assert!(!store.claim_chunk(&claim(material_id, 1, "v1")).await.unwrap());

    let rows = store.list_chunk_audio(material_id, "Joanna").await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].content_hash, "v2");
    assert!(store
        .mark_chunk_processing(&claim(material_id, 0, "v2").key, "v2")
        .await
        .unwrap());

    let unplanned = Uuid::new_v4();
    assert!(!store.claim_chunk(&claim(unplanned, 0, "v1")).await.unwrap());
}
