//! Orchestration: wires the odds adapter, driver engine, and settlement
//! engine to the store under the job runtime contract. This crate owns no
//! business logic of its own beyond sequencing reads/writes — the actual
//! math lives in `odk-odds`, `odk-drivers`, and `odk-settlement`.

pub mod fanout;
pub mod ingest;
pub mod results;
pub mod settlement;

pub use fanout::{run_fanout_for_game, run_fanout_for_sport, FanoutSummary};
pub use ingest::{run_ingest_tick, IngestSummary, SportIngestResult, CONTRACT_GUARD_MIN_SURVIVAL};
pub use results::{HttpResultsProvider, RawGameResult, ResultsError, ResultsProvider};
pub use settlement::{run_settle_game_results, run_settle_pending_cards, SettleCardsSummary, SettleGamesSummary};
