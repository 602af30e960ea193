//! Repository modules — query contracts consumed by the analysis engine

pub mod fills;
pub mod ingest;
pub mod markets;
pub mod onchain;
pub mod positions;

pub use fills::{
    DailySummaryRow, DayOfWeekRow, ExecutionDetailRow, FillRepository, HourlyActivityRow,
    PerMarketSummaryRow, PriceTrajectoryRow, SellDetailRow,
};
pub use ingest::{IngestRepository, TradeRecord};
pub use markets::{MarketRepository, MarketRow};
pub use onchain::{CounterpartyRow, MakerTakerRow, OnchainFillRow, OnchainRepository};
pub use positions::{PositionPnlRow, PositionRepository, PositionRow};
