//! Common test utilities
//!
//! This module is shared across all integration tests

pub mod fixtures;

#[allow(unused_imports)]
pub use fixtures::{
    callback_update, message_update, pre_checkout_update, TestEnvironment, TEST_CHAT_ID, TEST_TOKEN,
    TEST_USER_ID,
};
