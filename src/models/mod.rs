// Cost models
// Slippage, market impact, and maker/taker estimation over book snapshots

pub mod impact;
pub mod maker_taker;
pub mod slippage;

pub use impact::{ImpactParams, MarketImpactModel};
pub use maker_taker::{MakerTakerParams, MakerTakerPredictor};
pub use slippage::BookFill;
