pub mod actions;
pub mod ai;
pub mod config;
pub mod conversation;
pub mod db;
pub mod dispatch;
pub mod pipeline;
pub mod tags;
pub mod version;
pub mod web;

#[cfg(test)]
pub mod test_support;
