pub mod attribution;
pub mod consent;
pub mod event;
pub mod market;
