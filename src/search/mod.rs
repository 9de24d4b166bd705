pub mod coordinator;
pub mod highlight;
pub mod history;
pub mod timeout;
pub mod types;
