//! Thread placement helpers for the link workers.

pub mod task_pin;
