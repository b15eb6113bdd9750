//! Pure domain logic of the input engine: pointer identity, motion
//! accumulation, and track storage. No OS dependencies live here.

pub mod motion;
pub mod registry;
pub mod track;
