mod args;

pub use args::{InventoryArgs, version_string};
