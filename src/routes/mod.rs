pub mod audit;
pub mod auth;
pub mod categories;
pub mod health;
pub mod organizations;
pub mod roles;
pub mod statuses;
pub mod tasks;
pub mod users;
