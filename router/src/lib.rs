pub mod algo;
pub mod autorouter;
pub mod corridor;
pub mod error;
pub mod grid;
pub mod optimizer;
pub mod route;
pub mod strategy;
pub mod utils;

pub use autorouter::{
    Autorouter, NetEntry, NetMap, NetStatus, RouterOptions, RoutingStatistics, load_for_routing,
    load_with_options,
};
pub use error::RouterError;
pub use route::Route;
pub use strategy::{ConvergenceState, RoutingResult, Strategy};

use pcb_common::db::core::BoardDB;
use pcb_common::util::config::Config;

/// Route `db` in place with the strategy and rules from `config`.
pub fn route(db: &mut BoardDB, config: &Config) -> Result<RoutingStatistics, RouterError> {
    let options = RouterOptions::from_config(config);
    let strategy = options.strategy()?;
    let mut router = Autorouter::new(db.clone(), config.rules.clone(), options)?;
    router.route_with(&strategy)?;
    *db = router.routed_board();
    Ok(router.get_statistics())
}
