pub mod config;
pub mod explicit_rk;
pub mod method;
pub mod rhs;
pub mod tableau;
