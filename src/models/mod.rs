pub mod cycle;
pub mod kpi;
pub mod rbac;
pub mod user;
