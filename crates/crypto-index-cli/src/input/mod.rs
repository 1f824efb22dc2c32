pub mod file;
pub mod history;
pub mod price_store;
pub mod stdin;
