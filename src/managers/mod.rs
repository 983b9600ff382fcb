pub mod capture;
pub mod loans;
pub mod workflow;
