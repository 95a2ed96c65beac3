pub mod error;
pub mod mount;
pub mod oclass;
pub mod params;
pub mod pool;
