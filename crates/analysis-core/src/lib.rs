pub mod error;
pub mod history;
pub mod traits;
pub mod types;

pub use error::*;
pub use history::RollingHistory;
pub use traits::*;
pub use types::*;

/// Round to two decimal places (cents).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
