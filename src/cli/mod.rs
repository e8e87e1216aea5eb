//! Command line front-end

pub mod rate;
pub mod setup;
pub mod stored;
pub mod table;
pub mod ui;
