use lms_core::model::{
    CourseLevel, CoursePatch, LessonKind, LessonPatch, LessonUpdate, ProgressStatus, UserId,
};
use lms_core::time::fixed_now;
use services::wire::{CourseRequest, LessonRequest};
use services::{AppServices, Clock, CourseServiceError};
use storage::repository::Storage;

const INSTRUCTOR: u64 = 40;
const STRANGER: u64 = 41;

fn instructor() -> UserId {
    UserId::new(INSTRUCTOR)
}

fn services() -> AppServices {
    AppServices::from_storage(Storage::in_memory(), Clock::fixed(fixed_now()))
}

fn course_request(title: &str, published: bool) -> CourseRequest {
    CourseRequest {
        title: title.into(),
        description: "Brushes, layers, light".into(),
        category: "art".into(),
        level: CourseLevel::Beginner,
        price_cents: 1_500,
        published,
    }
}

fn article(title: &str, order: Option<u32>) -> LessonRequest {
    LessonRequest {
        title: title.into(),
        order,
        duration: 8,
        is_preview: false,
        content: LessonKind::Article {
            body: "text".into(),
        },
    }
}

#[tokio::test]
async fn instructor_builds_and_edits_a_course() {
    let services = services();
    let catalog = services.catalog();

    let course = catalog
        .create_course(instructor(), course_request("Digital painting", true))
        .await
        .unwrap();
    assert_eq!(course.instructor(), instructor());
    assert_eq!(course.created_at(), fixed_now());

    let first = catalog
        .create_lesson(instructor(), course.id(), article("Canvas", None))
        .await
        .unwrap();
    let second = catalog
        .create_lesson(instructor(), course.id(), article("Layers", None))
        .await
        .unwrap();
    assert_eq!(first.order(), 1);
    assert_eq!(second.order(), 2);

    let renamed = catalog
        .update_lesson(
            instructor(),
            second.id(),
            LessonPatch {
                title: Some("Layer blending".into()),
                order: Some(0),
                ..LessonPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.title(), "Layer blending");

    let detail = catalog.detail(course.id()).await.unwrap();
    let titles: Vec<&str> = detail.lessons.iter().map(|l| l.title.as_str()).collect();
    assert_eq!(titles, vec!["Layer blending", "Canvas"]);

    let repriced = catalog
        .update_course(
            instructor(),
            course.id(),
            CoursePatch {
                price_cents: Some(0),
                ..CoursePatch::default()
            },
        )
        .await
        .unwrap();
    assert!(repriced.is_free());

    catalog.delete_lesson(instructor(), first.id()).await.unwrap();
    assert_eq!(catalog.lessons(course.id()).await.unwrap().len(), 1);

    catalog.delete_course(instructor(), course.id()).await.unwrap();
    assert!(matches!(
        catalog.course(course.id()).await.unwrap_err(),
        CourseServiceError::CourseNotFound(_)
    ));
    assert!(matches!(
        catalog.lesson(second.id()).await.unwrap_err(),
        CourseServiceError::LessonNotFound(_)
    ));
}

#[tokio::test]
async fn only_the_instructor_may_change_a_course() {
    let services = services();
    let catalog = services.catalog();
    let course = catalog
        .create_course(instructor(), course_request("Inking", true))
        .await
        .unwrap();
    let lesson = catalog
        .create_lesson(instructor(), course.id(), article("Pens", Some(1)))
        .await
        .unwrap();
    let stranger = UserId::new(STRANGER);

    let err = catalog
        .update_course(stranger, course.id(), CoursePatch::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CourseServiceError::NotInstructor(_)));
    let err = catalog
        .create_lesson(stranger, course.id(), article("Mine now", None))
        .await
        .unwrap_err();
    assert!(matches!(err, CourseServiceError::NotInstructor(_)));
    let err = catalog.delete_lesson(stranger, lesson.id()).await.unwrap_err();
    assert!(matches!(err, CourseServiceError::NotInstructor(_)));
    let err = catalog.delete_course(stranger, course.id()).await.unwrap_err();
    assert!(matches!(err, CourseServiceError::NotInstructor(_)));
    let err = services
        .analytics()
        .course(stranger, course.id())
        .await
        .unwrap_err();
    assert!(matches!(err, CourseServiceError::NotInstructor(_)));

    assert_eq!(catalog.lessons(course.id()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_drafts_are_rejected() {
    let services = services();
    let catalog = services.catalog();
    let err = catalog
        .create_course(instructor(), course_request("  ", true))
        .await
        .unwrap_err();
    assert!(matches!(err, CourseServiceError::Course(_)));

    let course = catalog
        .create_course(instructor(), course_request("Perspective", true))
        .await
        .unwrap();
    let mut video = article("Vanishing points", None);
    video.content = LessonKind::Video {
        url: "not a url".into(),
    };
    let err = catalog
        .create_lesson(instructor(), course.id(), video)
        .await
        .unwrap_err();
    assert!(matches!(err, CourseServiceError::Lesson(_)));
}

#[tokio::test]
async fn catalog_lists_published_courses_newest_first() {
    let services = services();
    let catalog = services.catalog();
    let older = catalog
        .create_course(instructor(), course_request("Older", true))
        .await
        .unwrap();
    catalog
        .create_course(instructor(), course_request("Draft", false))
        .await
        .unwrap();
    let newer = catalog
        .create_course(instructor(), course_request("Newer", true))
        .await
        .unwrap();

    let page = catalog.list_published(None, None).await.unwrap();
    assert_eq!(page.total, 2);
    let ids: Vec<_> = page.courses.iter().map(|c| c.id).collect();
    // Same timestamp, so the higher id comes first.
    assert_eq!(ids, vec![newer.id(), older.id()]);

    let second = catalog.list_published(Some(2), Some(1)).await.unwrap();
    assert_eq!(second.courses.len(), 1);
    assert_eq!(second.courses[0].id, older.id());
}

#[tokio::test]
async fn analytics_follow_learner_progress() {
    let services = services();
    let catalog = services.catalog();
    let course = catalog
        .create_course(instructor(), course_request("Watercolor", true))
        .await
        .unwrap();
    let lessons = [
        catalog
            .create_lesson(instructor(), course.id(), article("Washes", None))
            .await
            .unwrap(),
        catalog
            .create_lesson(instructor(), course.id(), article("Glazing", None))
            .await
            .unwrap(),
    ];

    for learner in [1, 2] {
        services
            .enrollments()
            .enroll(UserId::new(learner), course.id())
            .await
            .unwrap();
    }
    for lesson in &lessons {
        services
            .progress()
            .update_lesson_progress(
                UserId::new(1),
                course.id(),
                lesson.id(),
                LessonUpdate {
                    completed: Some(true),
                    quiz_score: Some(80),
                    ..LessonUpdate::default()
                },
            )
            .await
            .unwrap();
    }

    let report = services
        .analytics()
        .course(instructor(), course.id())
        .await
        .unwrap();
    assert_eq!(report.total_students, 2);
    assert_eq!(report.completed_students, 1);
    assert_eq!(report.active_students, 1);
    assert_eq!(report.average_quiz_score, Some(80.0));
    assert_eq!(report.total_revenue_cents, 3_000);
    assert_eq!(report.lesson_completion.len(), 2);
    assert_eq!(report.lesson_completion[0].completion_rate, 50);

    let overview = services.analytics().overview(instructor()).await.unwrap();
    assert_eq!(overview.total_courses, 1);
    assert_eq!(overview.total_students, 2);
    assert_eq!(overview.course_performance[0].completed, 1);

    let rows = services
        .analytics()
        .students_progress(instructor())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, ProgressStatus::Completed);
    assert_eq!(rows[0].course_title, "Watercolor");
}
