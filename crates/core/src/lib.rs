pub mod course;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod quiz;
pub mod response;
pub mod wizard;
