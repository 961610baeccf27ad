//! static-i18n
//!
//! 翻訳キーの遅延登録・重複排除と、国名のファジー検索

pub mod config;
pub mod fuzzy;
pub mod logging;
pub mod registry;
pub mod render;
pub mod scheduler;
pub mod service;
pub mod types;

mod test_utils;

pub use registry::{
    KeyRequest,
    Registry,
    StaticString,
    TranslationHandle,
};
pub use service::I18n;
