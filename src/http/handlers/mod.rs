pub mod advances;
pub mod attendance;
pub mod audit_logs;
pub mod auth;
pub mod designations;
pub mod employees;
pub mod health;
pub mod leaves;
pub mod loans;
pub mod payruns;
