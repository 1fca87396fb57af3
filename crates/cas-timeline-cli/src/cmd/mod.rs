pub mod add;
pub mod completions;
pub mod context;
pub mod delete;
pub mod export;
pub mod list;
pub mod publish;
pub mod status;
