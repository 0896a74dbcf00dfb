pub mod advances;
pub mod audit;
pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod leave;
pub mod loans;
pub mod money;
pub mod payroll;
pub mod ratelimit;
pub mod store;
pub mod types;

// re-export key types
pub use config::{AppConfig, StatutoryProfile};
pub use errors::{HrError, Result};
pub use money::{Money, Rate};
pub use types::{EmployeeId, Month, PayPeriod, Role};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
