pub mod app_user;
pub mod audio;
pub mod organization;
pub mod problem;
pub mod rbac_policy;
pub mod space;
pub mod study_record;
pub mod user_group;
pub mod user_quota;
pub mod workbook;
