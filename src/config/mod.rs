// Runtime configuration

mod env;
mod forge;

pub use env::{EnvConfig, ENV_PREFIX};
pub use forge::ForgeConfig;
