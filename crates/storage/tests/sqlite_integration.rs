use chrono::Duration;
use course_core::model::{
    CourseId, CourseTree, CourseTreeDraft, Email, LectureDraft, OtpCode, OtpRecord, SectionDraft,
    SubSectionId, UserId,
};
use course_core::time::fixed_now;
use storage::repository::{
    CompletionRecord, CourseRepository, OtpRepository, ProgressRepository, StorageError,
};
use storage::sqlite::SqliteRepository;

async fn connect(name: &str) -> SqliteRepository {
    let repo = SqliteRepository::connect(&format!("sqlite:file:{name}?mode=memory&cache=shared"))
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn build_course(id: &str, shape: &[(&str, &[&str])]) -> CourseTree {
    CourseTreeDraft {
        name: Some(format!("Course {id}")),
        sections: shape
            .iter()
            .map(|(section, lectures)| {
                SectionDraft::new(
                    *section,
                    lectures
                        .iter()
                        .map(|l| {
                            LectureDraft::new(*l, format!("Lecture {l}"), format!("https://cdn.example.com/{l}.mp4"))
                                .with_description("watch me")
                                .with_duration_secs(90.0)
                        })
                        .collect(),
                )
                .with_title(format!("Section {section}"))
            })
            .collect(),
    }
    .validate(CourseId::new(id).unwrap())
    .unwrap()
}

#[tokio::test]
async fn sqlite_roundtrip_preserves_tree_order() {
    let repo = connect("memdb_course_roundtrip").await;
    // section and lecture ids chosen so alphabetical order differs from course order
    let course = build_course("c1", &[("zeta", &["z2", "z1"]), ("alpha", &["a9", "a1", "a5"])]);
    repo.upsert_course(&course).await.unwrap();

    let fetched = repo
        .get_course(course.course_id())
        .await
        .unwrap()
        .expect("course stored");
    assert_eq!(fetched, course);

    assert!(
        repo.get_course(&CourseId::new("missing").unwrap())
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn sqlite_upsert_replaces_content_but_keeps_progress() {
    let repo = connect("memdb_course_replace").await;
    let user = UserId::new("student-1").unwrap();
    let course = build_course("c1", &[("s1", &["l1", "l2"])]);
    repo.upsert_course(&course).await.unwrap();
    repo.enroll(&user, course.course_id(), fixed_now()).await.unwrap();
    repo.record_completion(&CompletionRecord {
        user_id: user.clone(),
        course_id: course.course_id().clone(),
        sub_section_id: SubSectionId::new("l1").unwrap(),
        completed_at: fixed_now(),
    })
    .await
    .unwrap();

    let revised = build_course("c1", &[("s1", &["l1"]), ("s2", &["l3"])]);
    repo.upsert_course(&revised).await.unwrap();

    let fetched = repo.get_course(revised.course_id()).await.unwrap().unwrap();
    assert_eq!(fetched.lecture_count(), 2);

    let listed = repo.list_courses(10).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].lecture_count, 2);
    assert_eq!(listed[0].name.as_deref(), Some("Course c1"));

    let done = repo
        .completed_lectures(&user, revised.course_id())
        .await
        .unwrap();
    assert!(done.contains(&SubSectionId::new("l1").unwrap()));
}

#[tokio::test]
async fn sqlite_completion_is_idempotent_and_needs_enrollment() {
    let repo = connect("memdb_progress").await;
    let course = build_course("c1", &[("s1", &["l1", "l2"])]);
    repo.upsert_course(&course).await.unwrap();
    let user = UserId::new("u1").unwrap();
    let record = CompletionRecord {
        user_id: user.clone(),
        course_id: course.course_id().clone(),
        sub_section_id: SubSectionId::new("l2").unwrap(),
        completed_at: fixed_now(),
    };

    let err = repo.record_completion(&record).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    assert!(repo.enroll(&user, course.course_id(), fixed_now()).await.unwrap());
    assert!(repo.is_enrolled(&user, course.course_id()).await.unwrap());
    assert!(repo.record_completion(&record).await.unwrap());
    assert!(!repo.record_completion(&record).await.unwrap());

    let done = repo.completed_lectures(&user, course.course_id()).await.unwrap();
    assert_eq!(done.len(), 1);

    let err = repo
        .enroll(&user, &CourseId::new("nope").unwrap(), fixed_now())
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_otp_latest_and_purge() {
    let repo = connect("memdb_otps").await;
    let email = Email::parse("learner@example.com").unwrap();
    let now = fixed_now();

    repo.insert_otp(&OtpRecord::new(
        email.clone(),
        OtpCode::parse("123456").unwrap(),
        now,
    ))
    .await
    .unwrap();
    let fresh = OtpRecord::new(
        email.clone(),
        OtpCode::parse("654321").unwrap(),
        now + Duration::minutes(3),
    );
    repo.insert_otp(&fresh).await.unwrap();

    assert_eq!(repo.latest_otp(&email).await.unwrap(), Some(fresh));

    let purged = repo.purge_expired(now + Duration::minutes(6)).await.unwrap();
    assert_eq!(purged, 1);
    assert_eq!(repo.delete_otps(&email).await.unwrap(), 1);
    assert!(repo.latest_otp(&email).await.unwrap().is_none());
}
