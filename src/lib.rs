pub mod config;
pub mod pipeline;
pub mod screener;
pub mod sheets;
pub mod table;
