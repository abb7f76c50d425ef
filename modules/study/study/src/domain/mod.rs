//! Authorization, quota, processor and recordbook core.
//!
//! Nothing in here opens a transaction: every facade receives repository
//! factories bound to the caller's transaction by [`service::Service`].

pub mod clock;
pub mod error;
pub mod model;
pub mod processor;
pub mod quota;
pub mod rbac;
pub mod recordbook;
pub mod repos;
pub mod service;
pub mod space;
pub mod student;
pub mod system_admin;
pub mod system_owner;
pub mod system_student;
