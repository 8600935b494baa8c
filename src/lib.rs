pub mod cli;
pub mod crd;
pub mod migration;
