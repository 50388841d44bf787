//! Request and response bodies

pub mod rules;
