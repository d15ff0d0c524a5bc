pub mod model;
pub mod receivers;
pub mod store;
