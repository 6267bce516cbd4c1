pub mod filter_applier;
pub mod filter_map;
