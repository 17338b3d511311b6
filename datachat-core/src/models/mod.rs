// datachat-core/src/models/mod.rs

pub mod chat;
pub mod domain;
pub mod tools;
