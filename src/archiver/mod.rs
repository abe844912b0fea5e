pub mod config;
pub mod dedup;
pub mod flow;
pub mod ledger;
pub mod orchestrator;
pub mod paths;
pub mod poller;
pub mod query;
pub mod run_lock;
pub mod submit;
pub mod time_range;
pub mod util;

#[cfg(test)]
pub mod testing;
