pub mod core;
pub mod export;
pub mod prefects;
pub mod schedules;
pub mod subjects;
pub mod teachers;
