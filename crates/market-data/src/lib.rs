//! Market data and news clients.
//!
//! `YahooClient` serves option chains, intraday bars and quotes;
//! `NewsApiClient` serves headlines. Both implement the collaborator traits
//! from `analysis-core` so the scanner and signal engine stay transport-agnostic.

mod rate_limit;
pub mod news;
pub mod yahoo;

pub use news::NewsApiClient;
pub use yahoo::YahooClient;
