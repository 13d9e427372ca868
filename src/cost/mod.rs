pub mod ledger;
pub mod rate;

pub use ledger::{CostLedger, CostLedgerState, Pricing, RateRefresh, UsageRecord};
pub use rate::{ExchangeRate, ExchangeRateSource, OpenErApiSource};
