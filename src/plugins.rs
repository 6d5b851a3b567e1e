//! Module containing plugin groups

pub mod client;
