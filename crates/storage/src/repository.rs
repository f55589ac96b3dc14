use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use course_core::model::{
    CompletionSet, CourseId, CourseTree, Email, OTP_TTL_SECS, OtpRecord, SubSectionId, UserId,
};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Row returned when listing courses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseListItem {
    pub id: CourseId,
    pub name: Option<String>,
    pub lecture_count: u32,
}

/// A single "lecture finished" fact for a user in a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRecord {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub sub_section_id: SubSectionId,
    pub completed_at: DateTime<Utc>,
}

/// Repository contract for course content.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Persist a course tree, replacing any previous content for the course.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the tree cannot be stored.
    async fn upsert_course(&self, tree: &CourseTree) -> Result<(), StorageError>;

    /// Fetch a course tree by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn get_course(&self, id: &CourseId) -> Result<Option<CourseTree>, StorageError>;

    /// List courses ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn list_courses(&self, limit: u32) -> Result<Vec<CourseListItem>, StorageError>;
}

/// Repository contract for enrollments and lecture completion.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Enroll a user. Returns `false` if they were already enrolled.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course does not exist.
    async fn enroll(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        enrolled_at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn is_enrolled(&self, user_id: &UserId, course_id: &CourseId)
    -> Result<bool, StorageError>;

    /// Record a completion. Returns `false` if it was already recorded.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the user is not enrolled.
    async fn record_completion(&self, record: &CompletionRecord) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn completed_lectures(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<CompletionSet, StorageError>;
}

/// Repository contract for email verification codes.
#[async_trait]
pub trait OtpRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn insert_otp(&self, record: &OtpRecord) -> Result<(), StorageError>;

    /// Most recently issued code for an email, expired or not.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection or decoding failures.
    async fn latest_otp(&self, email: &Email) -> Result<Option<OtpRecord>, StorageError>;

    /// Remove every code issued for an email.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn delete_otps(&self, email: &Email) -> Result<u64, StorageError>;

    /// Remove codes whose time-to-live has elapsed at `now`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on connection failures.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError>;
}

#[derive(Default)]
struct InMemoryState {
    courses: BTreeMap<CourseId, CourseTree>,
    enrollments: HashSet<(UserId, CourseId)>,
    progress: HashMap<(UserId, CourseId), CompletionSet>,
    otps: Vec<OtpRecord>,
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn upsert_course(&self, tree: &CourseTree) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.courses.insert(tree.course_id().clone(), tree.clone());
        Ok(())
    }

    async fn get_course(&self, id: &CourseId) -> Result<Option<CourseTree>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.courses.get(id).cloned())
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<CourseListItem>, StorageError> {
        let guard = self.lock()?;
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        guard
            .courses
            .values()
            .take(limit)
            .map(|tree| {
                Ok(CourseListItem {
                    id: tree.course_id().clone(),
                    name: tree.name().map(ToOwned::to_owned),
                    lecture_count: u32::try_from(tree.lecture_count())
                        .map_err(|_| StorageError::Serialization("lecture count overflow".into()))?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn enroll(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
        _enrolled_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        if !guard.courses.contains_key(course_id) {
            return Err(StorageError::NotFound);
        }
        Ok(guard
            .enrollments
            .insert((user_id.clone(), course_id.clone())))
    }

    async fn is_enrolled(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<bool, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .enrollments
            .contains(&(user_id.clone(), course_id.clone())))
    }

    async fn record_completion(&self, record: &CompletionRecord) -> Result<bool, StorageError> {
        let mut guard = self.lock()?;
        let key = (record.user_id.clone(), record.course_id.clone());
        if !guard.enrollments.contains(&key) {
            return Err(StorageError::Conflict);
        }
        let set = guard.progress.entry(key).or_insert_with(|| {
            CompletionSet::new(record.user_id.clone(), record.course_id.clone())
        });
        Ok(set.insert(record.sub_section_id.clone()))
    }

    async fn completed_lectures(
        &self,
        user_id: &UserId,
        course_id: &CourseId,
    ) -> Result<CompletionSet, StorageError> {
        let guard = self.lock()?;
        Ok(guard
            .progress
            .get(&(user_id.clone(), course_id.clone()))
            .cloned()
            .unwrap_or_else(|| CompletionSet::new(user_id.clone(), course_id.clone())))
    }
}

#[async_trait]
impl OtpRepository for InMemoryRepository {
    async fn insert_otp(&self, record: &OtpRecord) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.otps.push(record.clone());
        Ok(())
    }

    async fn latest_otp(&self, email: &Email) -> Result<Option<OtpRecord>, StorageError> {
        let guard = self.lock()?;
        // later inserts win ties on created_at
        Ok(guard
            .otps
            .iter()
            .enumerate()
            .filter(|(_, r)| r.email() == email)
            .max_by_key(|(idx, r)| (r.created_at(), *idx))
            .map(|(_, r)| r.clone()))
    }

    async fn delete_otps(&self, email: &Email) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let before = guard.otps.len();
        guard.otps.retain(|r| r.email() != email);
        Ok((before - guard.otps.len()) as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StorageError> {
        let mut guard = self.lock()?;
        let before = guard.otps.len();
        guard.otps.retain(|r| !r.is_expired(now));
        Ok((before - guard.otps.len()) as u64)
    }
}

/// Cutoff for codes issued at or before which a code is expired at `now`.
#[must_use]
pub fn otp_expiry_cutoff(now: DateTime<Utc>) -> DateTime<Utc> {
    now - Duration::seconds(OTP_TTL_SECS)
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn CourseRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub otps: Arc<dyn OtpRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let courses: Arc<dyn CourseRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let otps: Arc<dyn OtpRepository> = Arc::new(repo);
        Self {
            courses,
            progress,
            otps,
        }
    }
}
