pub mod factory;
pub mod linear;
pub mod nlms;
pub mod regressor_trait;
pub mod utils;
