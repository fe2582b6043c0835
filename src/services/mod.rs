//! Business logic services

pub mod accrual;
pub mod grader;
