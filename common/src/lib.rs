pub mod db;
pub mod geom;
pub mod rules;
pub mod util;
