//! Database integration tests.
//!
//! All tests require TEST_DATABASE_URL to be set.
//! Run with: TEST_DATABASE_URL=postgres://... cargo test --test db_integration
//!
//! Tests in this binary serialize on `common::db_lock()` because they share
//! one database and the migration tests drop the whole schema.

#[macro_use]
mod common;

use ai_tutor::admin::views::find_view;
use ai_tutor::db::{
    constraint_violation, Database, NewCourseModule, NewMaterial, NewScheduleItem, NewStudent,
};
use ai_tutor::domain::{
    AttestationKind, FeedbackKind, MaterialCategory, ProgressStatus, ScheduleKind, SenderRole,
    StudentStatus,
};
use ai_tutor::migrations;
use chrono::{NaiveDate, NaiveTime};

async fn setup() -> Database {
    common::setup_test_db().await
}

fn student(phone: &str) -> NewStudent {
    NewStudent {
        first_name: "Anna".into(),
        last_name: "Petrova".into(),
        phone: phone.into(),
        ..Default::default()
    }
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Program with one stream, one module and one enrolled student.
async fn seed(db: &Database) -> (i64, i64, i64, i64) {
    let program = db.create_program("Data Science", None, Some(72)).await.unwrap();
    let stream = db
        .create_stream(program.id, "ds-2025-1", date(2025, 9, 1), date(2025, 12, 20), None)
        .await
        .unwrap();
    let module = db
        .create_module(&NewCourseModule {
            program_id: program.id,
            order_index: 1,
            name: "Statistics".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let s = db
        .create_student(&NewStudent {
            program_id: Some(program.id),
            ..student("+79001234567")
        })
        .await
        .unwrap();
    assert!(db.enroll_student(s.id, stream.id).await.unwrap());
    (program.id, stream.id, module.id, s.id)
}

// --- Students ---

#[tokio::test]
async fn duplicate_phone_is_a_unique_violation() {
    require_db!();
    let _guard = common::db_lock().await;
    let db = setup().await;

    db.create_student(&student("+79001234567")).await.unwrap();
    let err = db.create_student(&student(" +79001234567 ")).await.unwrap_err();
    let (code, constraint) = constraint_violation(&err).expect("database error in chain");
    assert_eq!(code, "23505");
    assert_eq!(constraint.as_deref(), Some("students_phone_key"));
}

#[tokio::test]
async fn malformed_phone_never_reaches_the_store() {
    require_db!();
    let _guard = common::db_lock().await;
    let db = setup().await;

    assert!(db.create_student(&student("12345")).await.is_err());
    assert!(db.find_student_by_phone("not a phone").await.unwrap().is_none());
    let direct = sqlx::query(
        "INSERT INTO students (first_name, last_name, phone) VALUES ('A', 'B', 'abc')",
    )
    .execute(db.pool())
    .await;
    assert!(direct.is_err(), "column check rejects bad phones too");
}

#[tokio::test]
async fn student_lookup_and_status() {
    require_db!();
    let _guard = common::db_lock().await;
    let db = setup().await;

    let s = db.create_student(&student("+79001112233")).await.unwrap();
    assert_eq!(s.status, "active");
    db.touch_student_login(s.id, Some(555), Some(777)).await.unwrap();

    let by_tg = db.find_student_by_telegram(555).await.unwrap().unwrap();
    assert_eq!(by_tg.id, s.id);
    assert!(by_tg.last_login_at.is_some());

    let updated = db
        .update_student_status(s.id, StudentStatus::Graduated)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, "graduated");
    assert!(db.update_student_status(-1, StudentStatus::Active).await.unwrap().is_none());
}

// --- Cascades ---

#[tokio::test]
async fn deleting_a_program_leaves_no_dangling_rows() {
    require_db!();
    let _guard = common::db_lock().await;
    let db = setup().await;

    let (program, stream, module, s) = seed(&db).await;
    let topic = db
        .create_topic(module, 1, "Distributions", None, false, true)
        .await
        .unwrap();
    db.create_material(&NewMaterial {
        program_id: program,
        module_id: Some(module),
        topic_id: Some(topic.id),
        title: "Lecture 1".into(),
        content: Some("notes".into()),
        external_url: None,
        category: MaterialCategory::Lecture,
        is_visible: true,
    })
    .await
    .unwrap();
    db.create_schedule_item(&NewScheduleItem {
        module_id: module,
        topic_id: Some(topic.id),
        stream_id: Some(stream),
        kind: ScheduleKind::Lecture,
        scheduled_date: date(2025, 9, 8),
        start_time: NaiveTime::from_hms_opt(18, 0, 0),
        end_time: NaiveTime::from_hms_opt(19, 30, 0),
        location: Some("Room 4".into()),
    })
    .await
    .unwrap();
    db.create_feedback(s, Some(module), FeedbackKind::Module, 5, Some("great"))
        .await
        .unwrap();
    db.upsert_progress(s, module, None, 1, 4).await.unwrap();
    db.append_message(s, SenderRole::Student, "hello", None).await.unwrap();
    db.increment_rate_limit(s, date(2025, 10, 1)).await.unwrap();
    let test = db
        .create_attestation_test(module, "Midterm", AttestationKind::Intermediate, 100, 60)
        .await
        .unwrap();
    db.record_test_result(test.id, s, 70).await.unwrap();

    assert!(db.delete_program(program).await.unwrap());

    for table in [
        "streams",
        "students",
        "student_streams",
        "course_modules",
        "topics",
        "course_materials",
        "schedule_items",
        "feedback",
        "student_module_progress",
        "messages",
        "rate_limits",
        "attestation_tests",
        "test_results",
    ] {
        let n: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(n, 0, "{} still has rows", table);
    }
}

// --- Export ---

#[tokio::test]
async fn capped_export_reports_missing_rows() {
    require_db!();
    let _guard = common::db_lock().await;
    let db = setup().await;
    for name in ["A", "B", "C"] {
        db.create_program(name, None, None).await.unwrap();
    }
    let view = find_view("programs").unwrap();

    let capped = db.export_entities_capped(view, 2).await.unwrap();
    assert_eq!(capped.rows.len(), 2);
    assert!(capped.truncated);
    assert_eq!(capped.rows[0]["name"], "A");

    let exact = db.export_entities_capped(view, 3).await.unwrap();
    assert_eq!(exact.rows.len(), 3);
    assert!(!exact.truncated);
}

// --- Progress ---

#[tokio::test]
async fn progress_upsert_keeps_one_row_per_pair() {
    require_db!();
    let _guard = common::db_lock().await;
    let db = setup().await;
    let (_, _, module, s) = seed(&db).await;

    let first = db.upsert_progress(s, module, None, 1, 3).await.unwrap();
    assert_eq!(first.status, "in_progress");
    assert!((first.progress_percent - 33.33).abs() < 1e-9);

    let second = db.upsert_progress(s, module, None, 3, 3).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.status, "completed");
    assert_eq!(second.progress_percent, 100.0);

    let forced = db
        .upsert_progress(s, module, Some(ProgressStatus::NotStarted), 0, 0)
        .await
        .unwrap();
    assert_eq!(forced.progress_percent, 0.0);

    assert_eq!(db.list_student_progress(s).await.unwrap().len(), 1);
}

// --- Rate limits ---

#[tokio::test]
async fn concurrent_increments_are_all_counted() {
    require_db!();
    let _guard = common::db_lock().await;
    let db = setup().await;
    let sid = db.create_student(&student("+79005550000")).await.unwrap().id;
    let day = date(2025, 10, 15);

    const N: i32 = 20;
    let mut handles = Vec::new();
    for _ in 0..N {
        let db = db.clone();
        handles.push(tokio::spawn(async move {
            db.increment_rate_limit(sid, day).await.unwrap()
        }));
    }
    let mut seen = Vec::new();
    for h in handles {
        seen.push(h.await.unwrap());
    }
    seen.sort_unstable();
    assert_eq!(seen, (1..=N).collect::<Vec<_>>());
    assert_eq!(db.get_rate_limit_count(sid, day).await.unwrap(), N);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM rate_limits WHERE student_id = $1")
        .bind(sid)
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(rows, 1);

    assert!(!db.check_rate_limit(sid, day, N).await.unwrap());
    assert!(db.check_rate_limit(sid, day, N + 1).await.unwrap());
    assert!(db.check_rate_limit(sid, date(2025, 10, 16), 1).await.unwrap());
}

// --- Attestation ---

#[tokio::test]
async fn test_results_number_attempts_and_derive_pass() {
    require_db!();
    let _guard = common::db_lock().await;
    let db = setup().await;
    let (_, _, module, s) = seed(&db).await;
    let test = db
        .create_attestation_test(module, "Final exam", AttestationKind::Final, 100, 60)
        .await
        .unwrap();

    let a = db.record_test_result(test.id, s, 59).await.unwrap();
    let b = db.record_test_result(test.id, s, 60).await.unwrap();
    assert_eq!((a.attempt, a.passed), (1, false));
    assert_eq!((b.attempt, b.passed), (2, true));
    assert!(db.record_test_result(-1, s, 80).await.is_err());
    assert_eq!(db.list_test_results(test.id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn passing_score_above_max_is_rejected() {
    require_db!();
    let _guard = common::db_lock().await;
    let db = setup().await;
    let (_, _, module, _) = seed(&db).await;

    let err = db
        .create_attestation_test(module, "Broken", AttestationKind::Final, 50, 60)
        .await
        .unwrap_err();
    let (code, _) = constraint_violation(&err).unwrap();
    assert_eq!(code, "23514");
}

// --- Materials ---

#[tokio::test]
async fn material_file_roundtrip_and_visibility() {
    require_db!();
    let _guard = common::db_lock().await;
    let db = setup().await;
    let (program, _, module, _) = seed(&db).await;

    let visible = db
        .create_material(&NewMaterial {
            program_id: program,
            module_id: Some(module),
            topic_id: None,
            title: "Lecture 1".into(),
            content: None,
            external_url: Some("https://example.com/l1".into()),
            category: MaterialCategory::Lecture,
            is_visible: true,
        })
        .await
        .unwrap();
    db.create_material(&NewMaterial {
        program_id: program,
        module_id: None,
        topic_id: None,
        title: "Draft".into(),
        content: Some("wip".into()),
        external_url: None,
        category: MaterialCategory::Methodical,
        is_visible: false,
    })
    .await
    .unwrap();

    assert_eq!(db.list_materials(program, true).await.unwrap().len(), 1);
    assert_eq!(db.list_materials(program, false).await.unwrap().len(), 2);

    let stored = db
        .store_material_file(visible.id, "l1.pdf", Some("application/pdf"), b"%PDF-1.4")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.file_size, Some(8));
    let file = db.load_material_file(visible.id).await.unwrap().unwrap();
    assert_eq!(file.file_data, b"%PDF-1.4");
    assert_eq!(file.mime_type.as_deref(), Some("application/pdf"));
}

// --- Sessions ---

#[tokio::test]
async fn expired_sessions_are_invisible_and_pruned() {
    require_db!();
    let _guard = common::db_lock().await;
    let db = setup().await;
    let now = chrono::Utc::now();

    db.create_admin_session("live", "admin", now + chrono::Duration::hours(1))
        .await
        .unwrap();
    db.create_admin_session("dead", "admin", now - chrono::Duration::hours(1))
        .await
        .unwrap();

    assert_eq!(db.find_admin_session("live").await.unwrap().as_deref(), Some("admin"));
    assert!(db.find_admin_session("dead").await.unwrap().is_none());
    assert_eq!(db.prune_expired_sessions().await.unwrap(), 1);
    assert_eq!(db.count_admin_sessions().await.unwrap(), 1);
    assert!(db.delete_admin_session("live").await.unwrap());
    assert!(!db.delete_admin_session("live").await.unwrap());
}

// --- Migrations ---

#[tokio::test]
async fn full_revert_and_reapply_leaves_no_schema_diff() {
    require_db!();
    let _guard = common::db_lock().await;
    let db = setup().await;
    let pool = db.pool();

    let before = migrations::schema_snapshot(pool).await.unwrap();
    assert!(!before.is_empty());

    migrations::revert_to(pool, 0).await.unwrap();
    let empty = migrations::schema_snapshot(pool).await.unwrap();
    assert!(empty.is_empty(), "leftovers after full revert: {:?}", before.diff(&empty));

    migrations::run_pending(pool).await.unwrap();
    let after = migrations::schema_snapshot(pool).await.unwrap();
    assert!(before.diff(&after).is_empty(), "{:?}", before.diff(&after));
}

#[tokio::test]
async fn each_step_reverses_cleanly() {
    require_db!();
    let _guard = common::db_lock().await;
    let db = setup().await;
    let pool = db.pool();
    let versions = migrations::available_versions();
    let full = migrations::schema_snapshot(pool).await.unwrap();

    // Peel one more step off the top each round, then reapply everything.
    for i in (0..versions.len()).rev() {
        let below = if i == 0 { 0 } else { versions[i - 1] };
        migrations::revert_to(pool, below).await.unwrap();
        assert_eq!(
            migrations::applied_versions(pool).await.unwrap(),
            versions[..i].to_vec()
        );
        migrations::run_pending(pool).await.unwrap();
        let after = migrations::schema_snapshot(pool).await.unwrap();
        assert!(
            full.diff(&after).is_empty(),
            "reapplying from {} drifted: {:?}",
            below,
            full.diff(&after)
        );
    }
}

#[tokio::test]
async fn revert_steps_counts_from_the_top() {
    require_db!();
    let _guard = common::db_lock().await;
    let db = setup().await;
    let pool = db.pool();
    let versions = migrations::available_versions();

    let now_at = migrations::revert_steps(pool, 2).await.unwrap();
    assert_eq!(now_at, versions[versions.len() - 3]);
    assert_eq!(migrations::applied_versions(pool).await.unwrap().last(), Some(&now_at));

    let now_at = migrations::revert_last(pool).await.unwrap();
    assert_eq!(now_at, versions[versions.len() - 4]);
    migrations::run_pending(pool).await.unwrap();
}
