use std::fmt;

use chrono::{DateTime, Utc};
use lms_core::model::{
    Course, CourseId, CourseLevel, Enrollment, Lesson, LessonId, LessonKind, QuizQuestion, UserId,
};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    course_id: CourseId,
    title: String,
    instructor: UserId,
    learners: Vec<UserId>,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidCourseId { raw: String },
    InvalidUserId { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidCourseId { raw } => write!(f, "invalid --course-id value: {raw}"),
            ArgsError::InvalidUserId { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_user(flag: &'static str, raw: String) -> Result<UserId, ArgsError> {
    raw.parse::<UserId>()
        .map_err(|_| ArgsError::InvalidUserId { flag, raw })
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("LMS_DB_URL").unwrap_or_else(|_| "sqlite://lms.sqlite3?mode=rwc".into());
        let mut course_id = std::env::var("LMS_SEED_COURSE_ID")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or_else(|| CourseId::new(1), CourseId::new);
        let mut title =
            std::env::var("LMS_SEED_TITLE").unwrap_or_else(|_| "Rust for Beginners".into());
        let mut instructor = UserId::new(1);
        let mut learners = Vec::new();
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--course-id" => {
                    let value = require_value(&mut args, "--course-id")?;
                    course_id = value
                        .parse::<CourseId>()
                        .map_err(|_| ArgsError::InvalidCourseId { raw: value.clone() })?;
                }
                "--title" => {
                    title = require_value(&mut args, "--title")?;
                }
                "--instructor" => {
                    let value = require_value(&mut args, "--instructor")?;
                    instructor = parse_user("--instructor", value)?;
                }
                "--enroll" => {
                    let value = require_value(&mut args, "--enroll")?;
                    learners.push(parse_user("--enroll", value)?);
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            course_id,
            title,
            instructor,
            learners,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite://lms.sqlite3?mode=rwc)");
    eprintln!("  --course-id <id>          Course id to upsert (default: 1)");
    eprintln!("  --title <title>           Course title (default: Rust for Beginners)");
    eprintln!("  --instructor <user_id>    Instructor user id (default: 1)");
    eprintln!("  --enroll <user_id>        Enroll a learner; repeatable");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  LMS_DB_URL, LMS_SEED_COURSE_ID, LMS_SEED_TITLE");
}

fn demo_lessons(course_id: CourseId) -> Result<Vec<Lesson>, lms_core::Error> {
    let base = course_id.value() * 100;
    let quiz = vec![
        QuizQuestion::new(
            "Which keyword declares an immutable binding?",
            vec!["let".into(), "mut".into(), "var".into()],
            0,
            None,
        ),
        QuizQuestion::new(
            "Who frees a value when it goes out of scope?",
            vec!["The garbage collector".into(), "Its owner".into()],
            1,
            Some(3),
        ),
    ];
    Ok(vec![
        Lesson::new(
            LessonId::new(base + 1),
            course_id,
            "Welcome",
            1,
            5,
            LessonKind::Video {
                url: "https://videos.example.com/rust/welcome.mp4".into(),
            },
        )?
        .with_preview(true),
        Lesson::new(
            LessonId::new(base + 2),
            course_id,
            "Ownership",
            2,
            12,
            LessonKind::Article {
                body: "Every value has exactly one owner.".into(),
            },
        )?,
        Lesson::new(
            LessonId::new(base + 3),
            course_id,
            "Borrowing",
            3,
            15,
            LessonKind::Video {
                url: "https://videos.example.com/rust/borrowing.mp4".into(),
            },
        )?,
        Lesson::new(
            LessonId::new(base + 4),
            course_id,
            "Checkpoint",
            4,
            5,
            LessonKind::Quiz { questions: quiz },
        )?,
    ])
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let course = Course::new(
        args.course_id,
        args.title.clone(),
        "Ownership, borrowing and a short checkpoint quiz.",
        args.instructor,
        "programming",
        CourseLevel::Beginner,
        0,
        true,
        now,
    )?;
    storage.courses.upsert_course(&course).await?;

    let lessons = demo_lessons(course.id())?;
    for lesson in &lessons {
        storage.lessons.upsert_lesson(lesson).await?;
    }

    let mut enrolled = 0;
    for learner in &args.learners {
        let inserted = storage
            .enrollments
            .insert_enrollment(&Enrollment::for_course(*learner, &course, now))
            .await?;
        if inserted.created {
            enrolled += 1;
        }
    }

    println!(
        "Seeded course {} with {} lessons and {} new enrollments into {}",
        course.id(),
        lessons.len(),
        enrolled,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
