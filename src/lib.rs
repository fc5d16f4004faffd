pub mod client;
pub mod poller;
pub mod status;
pub mod summary;
pub mod summary_client;
pub mod ui;

#[cfg(feature = "test-helpers")]
pub mod test_helpers;
