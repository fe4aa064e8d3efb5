pub mod exponential_decay;
pub mod lumped_battery;
