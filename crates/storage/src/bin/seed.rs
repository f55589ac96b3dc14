use std::fmt;

use chrono::{DateTime, Utc};
use course_core::model::{CourseId, CourseTreeDraft, LectureDraft, SectionDraft, UserId};
use storage::repository::{CourseRepository, ProgressRepository, Storage};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    from: Option<(CourseId, String)>,
    enroll: Option<UserId>,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidId { flag: &'static str, raw: String },
    InvalidNow { raw: String },
    FromWithoutCourse,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw:?}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
            ArgsError::FromWithoutCourse => write!(f, "--from requires --course-id"),
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("COURSE_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut course_id: Option<CourseId> = None;
        let mut from_path: Option<String> = None;
        let mut enroll = None;
        let mut now = None;

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
                    course_id = Some(value.parse().map_err(|_| ArgsError::InvalidId {
                        flag: "--course-id",
                        raw: value.clone(),
                    })?);
                }
                "--from" => {
                    from_path = Some(require_value(&mut args, "--from")?);
                }
                "--enroll" => {
                    let value = require_value(&mut args, "--enroll")?;
                    enroll = Some(value.parse().map_err(|_| ArgsError::InvalidId {
                        flag: "--enroll",
                        raw: value.clone(),
                    })?);
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

        let from = match (course_id, from_path) {
            (Some(id), Some(path)) => Some((id, path)),
            (None, Some(_)) => return Err(ArgsError::FromWithoutCourse),
            _ => None,
        };

        Ok(Self {
            db_url,
            from,
            enroll,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --course-id <id> --from <file.json>");
    eprintln!("                            Load one course tree from JSON instead of the samples");
    eprintln!("  --enroll <user_id>        Enroll this user in every seeded course");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COURSE_DB_URL");
}

fn lecture(course: &str, n: u32, title: &str, secs: f64) -> LectureDraft {
    LectureDraft::new(
        format!("{course}-l{n}"),
        title,
        format!("https://media.example.com/{course}/{n}.mp4"),
    )
    .with_duration_secs(secs)
}

/// Sample catalogue: one entry per seeded course.
fn sample_courses() -> Vec<(&'static str, &'static str, Vec<(&'static str, Vec<&'static str>)>)> {
    vec![
        (
            "web-dev-bootcamp",
            "Complete Web Development Bootcamp",
            vec![
                ("HTML & CSS", vec!["Document structure", "Selectors", "Flexbox"]),
                ("JavaScript", vec!["Values and types", "The DOM"]),
                ("React", vec!["Components", "State and props"]),
            ],
        ),
        (
            "python-data-science",
            "Python for Data Science",
            vec![
                ("Python basics", vec!["Syntax tour", "Collections"]),
                ("pandas", vec!["DataFrames", "Grouping"]),
            ],
        ),
        (
            "react-native",
            "React Native Mobile App Development",
            vec![
                ("Setup", vec!["Tooling"]),
                ("Navigation", vec!["Stacks", "Tabs"]),
            ],
        ),
        (
            "js-fundamentals",
            "JavaScript Fundamentals",
            vec![("Core language", vec!["Variables", "Functions", "Objects"])],
        ),
        (
            "advanced-react",
            "Advanced React Development",
            vec![
                ("Hooks", vec!["useEffect in depth", "Custom hooks"]),
                ("Performance", vec!["Memoization"]),
            ],
        ),
    ]
}

fn sample_drafts() -> Vec<(CourseId, CourseTreeDraft)> {
    sample_courses()
        .into_iter()
        .filter_map(|(id, name, sections)| {
            let mut n = 0_u32;
            let sections = sections
                .into_iter()
                .enumerate()
                .map(|(idx, (title, lectures))| {
                    let lectures = lectures
                        .into_iter()
                        .map(|t| {
                            n += 1;
                            lecture(id, n, t, 240.0 + 60.0 * f64::from(n))
                        })
                        .collect();
                    SectionDraft::new(format!("{id}-s{}", idx + 1), lectures).with_title(title)
                })
                .collect();
            let draft = CourseTreeDraft {
                name: Some(name.to_owned()),
                sections,
            };
            CourseId::new(id).ok().map(|course_id| (course_id, draft))
        })
        .collect()
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let drafts = match &args.from {
        Some((course_id, path)) => {
            let raw = std::fs::read_to_string(path)?;
            let draft: CourseTreeDraft = serde_json::from_str(&raw)?;
            vec![(course_id.clone(), draft)]
        }
        None => sample_drafts(),
    };

    let mut lectures = 0;
    for (course_id, draft) in &drafts {
        let tree = draft.clone().validate(course_id.clone())?;
        lectures += tree.lecture_count();
        storage.courses.upsert_course(&tree).await?;
        if let Some(user) = &args.enroll {
            storage.progress.enroll(user, course_id, now).await?;
        }
    }

    println!(
        "Seeded {} courses ({} lectures) into {}",
        drafts.len(),
        lectures,
        args.db_url
    );
    if let Some(user) = &args.enroll {
        println!("Enrolled {user} in every seeded course");
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
