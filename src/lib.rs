pub mod analysis;
pub mod api_football;
pub mod bet_tiers;
pub mod fallback;
pub mod http_cache;
pub mod http_client;
pub mod ledger;
pub mod logging;
pub mod narrative;
pub mod provider;
pub mod state;
pub mod stats_engine;
pub mod value_bet;
