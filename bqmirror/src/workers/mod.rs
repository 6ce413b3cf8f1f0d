pub mod base;
pub mod copy;
pub mod pool;
