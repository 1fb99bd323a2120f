pub mod applications;
pub mod bug_report;
