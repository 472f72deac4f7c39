pub mod convexity;
pub mod long_long;
pub mod point_order;
pub mod types;
