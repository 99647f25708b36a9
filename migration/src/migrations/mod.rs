pub mod m202608260001_create_users;
pub mod m202608260002_create_subjects;
pub mod m202608260003_create_team_groups;
pub mod m202608260004_create_team_group_members;
pub mod m202608260005_create_submissions;
pub mod m202608260006_create_grades;
pub mod m202608260007_create_user_flags;
pub mod m202608260008_create_user_mappings;
pub mod m202608260009_create_overrides;
pub mod m202608260010_create_annotations;
pub mod m202608260011_create_feedback_comments;
pub mod m202608260012_create_page_rotations;
