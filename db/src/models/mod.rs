pub mod annotation;
pub mod feedback_comment;
pub mod grade;
pub mod page_rotation;
pub mod subject;
pub mod subject_override;
pub mod submission;
pub mod team_group;
pub mod team_group_member;
pub mod user;
pub mod user_flags;
pub mod user_mapping;

pub use annotation::Entity as Annotation;
pub use feedback_comment::Entity as FeedbackComment;
pub use grade::Entity as Grade;
pub use page_rotation::Entity as PageRotation;
pub use subject::Entity as Subject;
pub use subject_override::Entity as SubjectOverride;
pub use submission::Entity as Submission;
pub use team_group::Entity as TeamGroup;
pub use team_group_member::Entity as TeamGroupMember;
pub use user::Entity as User;
pub use user_flags::Entity as UserFlags;
pub use user_mapping::Entity as UserMapping;
