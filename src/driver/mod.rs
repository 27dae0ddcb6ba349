pub mod attribute;
pub mod blink;
pub mod module;

pub use attribute::LedControl;
pub use blink::Blinker;
pub use module::{LedModule, Params, Variant};
