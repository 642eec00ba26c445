// Configuration infrastructure - JSON file backed ConfigProvider

mod json_config_store;

pub use json_config_store::{JsonConfigStore, GENERAL_SECTION};
