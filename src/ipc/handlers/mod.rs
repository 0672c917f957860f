pub mod core;
pub mod feedback;
pub mod students;
pub mod suggestions;
