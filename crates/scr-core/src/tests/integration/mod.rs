#![cfg(test)]

pub mod concurrency_tests;
pub mod cycle_tests;
pub mod lifecycle_tests;
pub mod scheduler_tests;
