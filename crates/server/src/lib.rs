pub mod errors;
pub mod routes;
pub mod self_register;
pub mod startup;
pub mod state;

pub use startup::run;
