pub mod classes;
pub mod core;
pub mod entries;
pub mod grades;
pub mod records;
pub mod reports;
pub mod settings;
pub mod students;
