pub mod audit;
pub mod category;
pub mod organization;
pub mod role;
pub mod task;
pub mod user;
