//! Shared helpers for the black-box queue tests

pub use bqueue_core::port::job::mocks::wait_until;
