pub mod envelope;
pub mod procedures;
