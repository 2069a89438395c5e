pub mod generate;
pub mod job;
pub mod preview;
