pub mod copy_engine;
pub mod exchange;
pub mod live;
pub mod paper;
pub mod risk;
pub mod state;

pub use copy_engine::{run_copy_engine, CopyEngine, CopyEngineConfig, EngineDeps, TickError, TickSummary};
pub use exchange::{ExchangeAdapter, ExchangeBackend, ExchangeError, OrderBookTop};
pub use live::LiveExchange;
pub use paper::PaperExchange;
