//! The batch pipeline: partitioning, split generation, backtesting, and the
//! worker-pool batch runner.

mod backtest;
mod batch;
mod partition;
mod split;

pub use backtest::{backtest_series, final_forecast, BacktestResult};
pub use batch::{run_batch, BatchConfig, BatchReport, CancelFlag, SeriesOutcome, SeriesStatus};
pub use partition::{partition, GapFillPolicy, PartitionConfig, PartitionOutcome};
pub use split::{generate_splits, BacktestConfig, Split};
