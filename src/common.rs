//! Code shared by every part of the client

pub mod trace;
