//! Purchase automation for Lulu Hypermarket via a headless browser.
//!
//! The crate drives search, sign-in, cart management, and checkout flows
//! through UI selectors over a pool of browser instances. See
//! [`flows`] for the operations callers consume, and [`driver`] for the
//! automation seam tests fake out.

pub mod browser_setup;
pub mod driver;
pub mod flows;
pub mod observer;
pub mod pool;
pub mod site;
pub mod sync;
pub mod tasks;
pub mod types;

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use driver::cdp::CdpDriver;
pub use flows::{add_filtered_items_to_cart, checkout, clear_cart, fetch_items, sign_in};
pub use observer::{CheckoutStage, FlowEvent, FlowObserver, LogObserver};
pub use tasks::{FlowError, FlowResult};
pub use types::{CartItem, Credentials, ItemResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub browser: BrowserConfig,
}

/// Browser launch options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Disable web security features. Only for trusted content.
    #[serde(default)]
    pub disable_security: bool,

    #[serde(default)]
    pub window: WindowConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_window_width")]
    pub width: u32,

    #[serde(default = "default_window_height")]
    pub height: u32,
}

fn default_headless() -> bool {
    true
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    720
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            disable_security: false,
            window: WindowConfig::default(),
        }
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_window_width(),
            height: default_window_height(),
        }
    }
}

impl Config {
    /// Load `config.yaml` from the working directory, falling back to
    /// defaults when absent.
    pub fn load() -> anyhow::Result<Self> {
        let path = PathBuf::from("config.yaml");
        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            Ok(serde_yaml::from_str(&contents)?)
        } else {
            Ok(Config::default())
        }
    }
}
