//! Infrastructure: platform capture, configuration persistence, and track
//! export. Everything here sits behind a trait or a narrow function surface
//! so the application layer stays platform-free.

pub mod export;
pub mod input_capture;
pub mod storage;
