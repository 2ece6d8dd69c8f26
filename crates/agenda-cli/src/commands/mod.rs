pub mod add;
pub mod delete;
pub mod list;
pub mod serve;
pub mod skip;
