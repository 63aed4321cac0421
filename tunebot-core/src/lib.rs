// src/lib.rs

pub mod music;

pub use tunebot_common::Error;
