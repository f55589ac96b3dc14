use std::fmt;
use std::time::Duration;

use course_core::model::{CourseId, LectureRoute, SectionId, SubSectionId, UserId};
use services::{AppServices, Clock, CompletionClientConfig, CourseViewer};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingFlag { command: &'static str, flag: &'static str },
    UnknownArg(String),
    UnknownCommand(String),
    InvalidDbUrl { raw: String },
    InvalidId { flag: &'static str, raw: String },
    InvalidSteps { raw: String },
    InvalidRoute { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { command, flag } => write!(f, "{command} requires {flag}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidId { flag, raw } => write!(f, "invalid {flag} value: {raw:?}"),
            ArgsError::InvalidSteps { raw } => write!(f, "invalid --steps value: {raw}"),
            ArgsError::InvalidRoute { raw } => write!(f, "invalid --route value: {raw}"),
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

fn parse_id<T: std::str::FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidId { flag, raw })
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  viewer courses                          [global options]");
    eprintln!("  viewer outline --course <id> [--user <id>]");
    eprintln!("  viewer enroll  --course <id> --user <id>");
    eprintln!("  viewer watch   --course <id> --user <id> [--section <id> --lecture <id>] [--steps <n>]");
    eprintln!("  viewer watch   --route <path> --user <id> [--steps <n>]");
    eprintln!("  viewer otp send   --email <address>");
    eprintln!("  viewer otp verify --email <address> --code <digits>");
    eprintln!("  viewer otp purge");
    eprintln!();
    eprintln!("Global options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --api-base-url <url>      Send completions to this backend instead of the local db");
    eprintln!("  --api-token <token>       Bearer token for --api-base-url");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  COURSE_DB_URL, COURSE_API_BASE_URL, COURSE_API_TOKEN, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Courses,
    Outline {
        course_id: CourseId,
        user_id: Option<UserId>,
    },
    Enroll {
        course_id: CourseId,
        user_id: UserId,
    },
    Watch {
        course_id: CourseId,
        user_id: UserId,
        start: Option<(SectionId, SubSectionId)>,
        steps: usize,
    },
    OtpSend {
        email: String,
    },
    OtpVerify {
        email: String,
        code: String,
    },
    OtpPurge,
}

#[derive(Debug, Default)]
struct Flags {
    db_url: Option<String>,
    api_base_url: Option<String>,
    api_token: Option<String>,
    course_id: Option<CourseId>,
    user_id: Option<UserId>,
    section_id: Option<SectionId>,
    sub_section_id: Option<SubSectionId>,
    steps: Option<usize>,
    route: Option<LectureRoute>,
    email: Option<String>,
    code: Option<String>,
}

impl Flags {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut flags = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    flags.db_url = Some(value);
                }
                "--api-base-url" => flags.api_base_url = Some(require_value(args, "--api-base-url")?),
                "--api-token" => flags.api_token = Some(require_value(args, "--api-token")?),
                "--course" => {
                    flags.course_id = Some(parse_id("--course", require_value(args, "--course")?)?);
                }
                "--user" => flags.user_id = Some(parse_id("--user", require_value(args, "--user")?)?),
                "--section" => {
                    flags.section_id = Some(parse_id("--section", require_value(args, "--section")?)?);
                }
                "--lecture" => {
                    flags.sub_section_id =
                        Some(parse_id("--lecture", require_value(args, "--lecture")?)?);
                }
                "--steps" => {
                    let value = require_value(args, "--steps")?;
                    let steps = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidSteps { raw: value.clone() })?;
                    flags.steps = Some(steps);
                }
                "--route" => {
                    let value = require_value(args, "--route")?;
                    let route = LectureRoute::parse(&value)
                        .map_err(|_| ArgsError::InvalidRoute { raw: value.clone() })?;
                    flags.route = Some(route);
                }
                "--email" => flags.email = Some(require_value(args, "--email")?),
                "--code" => flags.code = Some(require_value(args, "--code")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }
        Ok(flags)
    }
}

fn required<T>(value: Option<T>, command: &'static str, flag: &'static str) -> Result<T, ArgsError> {
    value.ok_or(ArgsError::MissingFlag { command, flag })
}

struct Args {
    db_url: String,
    remote: Option<CompletionClientConfig>,
    command: Command,
}

impl Args {
    fn parse(argv: Vec<String>) -> Result<Self, ArgsError> {
        let mut iter = argv.into_iter().peekable();
        let has_command = iter.peek().is_some_and(|first| !first.starts_with('-'));
        let name = if has_command {
            iter.next().unwrap_or_default()
        } else {
            "courses".to_owned()
        };
        let name = if name == "otp" {
            let action = iter.next().unwrap_or_default();
            format!("otp {action}")
        } else {
            name
        };

        let flags = Flags::parse(&mut iter)?;
        let command = match name.as_str() {
            "courses" => Command::Courses,
            "outline" => Command::Outline {
                course_id: required(flags.course_id.clone(), "outline", "--course")?,
                user_id: flags.user_id.clone(),
            },
            "enroll" => Command::Enroll {
                course_id: required(flags.course_id.clone(), "enroll", "--course")?,
                user_id: required(flags.user_id.clone(), "enroll", "--user")?,
            },
            "watch" => match flags.route.clone() {
                Some(route) => Command::Watch {
                    course_id: route.course_id,
                    user_id: required(flags.user_id.clone(), "watch", "--user")?,
                    start: Some((route.section_id, route.sub_section_id)),
                    steps: flags.steps.unwrap_or(1),
                },
                None => Command::Watch {
                    course_id: required(flags.course_id.clone(), "watch", "--course")?,
                    user_id: required(flags.user_id.clone(), "watch", "--user")?,
                    start: flags.section_id.clone().zip(flags.sub_section_id.clone()),
                    steps: flags.steps.unwrap_or(1),
                },
            },
            "otp send" => Command::OtpSend {
                email: required(flags.email.clone(), "otp send", "--email")?,
            },
            "otp verify" => Command::OtpVerify {
                email: required(flags.email.clone(), "otp verify", "--email")?,
                code: required(flags.code.clone(), "otp verify", "--code")?,
            },
            "otp purge" => Command::OtpPurge,
            other => return Err(ArgsError::UnknownCommand(other.to_owned())),
        };

        let db_url = flags
            .db_url
            .or_else(|| std::env::var("COURSE_DB_URL").ok())
            .map_or_else(|| "sqlite://dev.sqlite3".into(), normalize_sqlite_url);

        let remote = match flags.api_base_url {
            Some(base_url) => Some(CompletionClientConfig {
                base_url,
                token: flags
                    .api_token
                    .or_else(|| std::env::var("COURSE_API_TOKEN").ok()),
            }),
            None => CompletionClientConfig::from_env().map(|mut config| {
                if flags.api_token.is_some() {
                    config.token = flags.api_token;
                }
                config
            }),
        };

        Ok(Self {
            db_url,
            remote,
            command,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") || raw.starts_with("sqlite:file:") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }
    Ok(())
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

// ─── commands ───

async fn list_courses(services: &AppServices) -> Result<(), Box<dyn std::error::Error>> {
    let courses = services.list_courses(100).await?;
    if courses.is_empty() {
        println!("No courses yet. Run the seed tool first.");
    }
    for course in courses {
        println!(
            "{:<24} {:>3} lectures  {}",
            course.id,
            course.lecture_count,
            course.name.as_deref().unwrap_or("(untitled)")
        );
    }
    Ok(())
}

async fn outline(
    services: &AppServices,
    course_id: &CourseId,
    user_id: Option<&UserId>,
) -> Result<(), Box<dyn std::error::Error>> {
    let anonymous = UserId::new("anonymous")?;
    let viewer = services
        .open_viewer(user_id.unwrap_or(&anonymous), course_id)
        .await?;
    let Some(tree) = viewer.tree() else {
        return Ok(());
    };

    println!(
        "{} ({}, {} lectures, {})",
        tree.name().unwrap_or("(untitled)"),
        tree.course_id(),
        tree.lecture_count(),
        format_duration(tree.total_duration())
    );
    for (idx, section) in tree.sections().iter().enumerate() {
        println!("  {}. {}", idx + 1, section.title().unwrap_or(section.id().as_str()));
        for lecture in section.lectures() {
            let mark = if viewer.completion().contains(lecture.id()) {
                "x"
            } else {
                " "
            };
            println!(
                "     [{mark}] {:<28} {:>6}  {}",
                lecture.id(),
                format_duration(lecture.duration()),
                lecture.title()
            );
        }
    }
    if user_id.is_some() {
        println!("Progress: {:.0}%", viewer.progress_percent());
    }
    Ok(())
}

fn announce(route: &LectureRoute, viewer: &CourseViewer) {
    let title = viewer.current_lecture().map_or("", |l| l.title());
    println!("> {route}  {title}");
}

async fn watch(
    services: &AppServices,
    course_id: &CourseId,
    user_id: &UserId,
    start: Option<(SectionId, SubSectionId)>,
    steps: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut viewer = services.open_viewer(user_id, course_id).await?;
    let opened = match &start {
        Some((section_id, sub_section_id)) => viewer.open(section_id, sub_section_id),
        None => viewer.open_first(),
    };
    let Some(mut route) = opened else {
        println!("Course content is still loading.");
        return Ok(());
    };

    for _ in 0..steps {
        announce(&route, &viewer);
        if let Some(duration) = viewer.current_lecture().map(|l| l.duration()) {
            viewer.on_duration(duration);
        }
        viewer.on_play()?;
        viewer.on_progress(0.5);
        if let Some(milestone) = viewer.on_progress(0.95) {
            tracing::debug!(?milestone, "lecture ended");
        }

        let Some(overlay) = viewer.end_overlay() else {
            break;
        };
        if overlay.show_mark_complete {
            if let Some(outcome) = viewer.mark_current_complete().await {
                let saved = if outcome.persisted { "saved" } else { "queued for retry" };
                println!("  marked complete ({saved})");
            }
        } else {
            println!("  already complete");
        }

        if !overlay.show_next {
            println!("  end of course");
            break;
        }
        match viewer.next()? {
            Some(next) => route = next,
            None => break,
        }
    }

    if !viewer.pending_completions().is_empty() {
        let sent = viewer.retry_pending().await;
        tracing::info!(sent, left = viewer.pending_completions().len(), "retried completions");
    }
    println!("Progress: {:.0}%", viewer.progress_percent());
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if matches!(argv.first().map(String::as_str), Some("--help" | "-h")) {
        print_usage();
        return Ok(());
    }
    let args = Args::parse(argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    prepare_sqlite_file(&args.db_url)?;
    let services = AppServices::new_sqlite(&args.db_url, Clock::system(), args.remote).await?;
    tracing::debug!(db_url = %args.db_url, "storage ready");

    match args.command {
        Command::Courses => list_courses(&services).await,
        Command::Outline { course_id, user_id } => {
            outline(&services, &course_id, user_id.as_ref()).await
        }
        Command::Enroll { course_id, user_id } => {
            let created = services.progress().enroll(&user_id, &course_id).await?;
            if created {
                println!("Enrolled {user_id} in {course_id}");
            } else {
                println!("{user_id} is already enrolled in {course_id}");
            }
            Ok(())
        }
        Command::Watch {
            course_id,
            user_id,
            start,
            steps,
        } => watch(&services, &course_id, &user_id, start, steps).await,
        Command::OtpSend { email } => {
            let record = services.otp().send_otp(&email).await?;
            println!(
                "Verification code sent to {} (valid until {})",
                record.email(),
                record.expires_at().to_rfc3339()
            );
            Ok(())
        }
        Command::OtpVerify { email, code } => {
            services.otp().verify(&email, &code).await?;
            println!("Email verified");
            Ok(())
        }
        Command::OtpPurge => {
            let removed = services.otp().purge_expired().await?;
            println!("Removed {removed} expired codes");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| (*s).to_owned()).collect()
    }

    #[test]
    fn parses_watch_with_start() {
        let args = Args::parse(argv(&[
            "watch", "--course", "c1", "--user", "u1", "--section", "S1", "--lecture", "S1b",
            "--steps", "3", "--db", "sqlite::memory:",
        ]))
        .unwrap();
        assert_eq!(args.db_url, "sqlite::memory:");
        assert_eq!(
            args.command,
            Command::Watch {
                course_id: CourseId::new("c1").unwrap(),
                user_id: UserId::new("u1").unwrap(),
                start: Some((SectionId::new("S1").unwrap(), SubSectionId::new("S1b").unwrap())),
                steps: 3,
            }
        );
    }

    #[test]
    fn watch_accepts_dashboard_route() {
        let args = Args::parse(argv(&[
            "watch",
            "--route",
            "/dashboard/enrolled-courses/view-course/c1/section/S2/sub-section/S2a",
            "--user",
            "u1",
            "--db",
            "sqlite::memory:",
        ]))
        .unwrap();
        let Command::Watch {
            course_id, start, ..
        } = args.command
        else {
            panic!("expected watch");
        };
        assert_eq!(course_id, CourseId::new("c1").unwrap());
        assert_eq!(
            start,
            Some((SectionId::new("S2").unwrap(), SubSectionId::new("S2a").unwrap()))
        );
    }

    #[test]
    fn otp_subcommands_take_two_words() {
        let args = Args::parse(argv(&[
            "otp", "verify", "--email", "a@example.com", "--code", "123456", "--db",
            "sqlite::memory:",
        ]))
        .unwrap();
        assert!(matches!(args.command, Command::OtpVerify { .. }));
    }

    #[test]
    fn missing_required_flag_is_reported() {
        let err = Args::parse(argv(&["enroll", "--course", "c1"])).err().unwrap();
        assert!(matches!(
            err,
            ArgsError::MissingFlag {
                command: "enroll",
                flag: "--user"
            }
        ));
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = Args::parse(argv(&["dance"])).err().unwrap();
        assert!(matches!(err, ArgsError::UnknownCommand(_)));
    }

    #[test]
    fn explicit_api_base_url_wins() {
        let args = Args::parse(argv(&[
            "courses",
            "--api-base-url",
            "https://api.example.com/api/v1",
            "--api-token",
            "t",
            "--db",
            "sqlite::memory:",
        ]))
        .unwrap();
        let remote = args.remote.unwrap();
        assert_eq!(remote.base_url, "https://api.example.com/api/v1");
        assert_eq!(remote.token.as_deref(), Some("t"));
    }

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_duration(Duration::from_secs(605)), "10:05");
    }
}
