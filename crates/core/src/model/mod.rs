mod completion;
mod course;
mod ids;
mod otp;
mod position;

pub use completion::CompletionSet;
pub use course::{
    CourseTree, CourseTreeDraft, CourseTreeError, Lecture, LectureDraft, Section, SectionDraft,
};
pub use ids::{CourseId, ParseIdError, SectionId, SubSectionId, UserId};
pub use otp::{Email, OTP_TTL_SECS, OtpCode, OtpError, OtpRecord};
pub use position::{LectureRoute, Position, RouteError};
