pub mod core;
pub mod indices;
pub mod layers;
pub mod parser;
pub mod writer;
