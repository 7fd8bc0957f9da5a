//! Aggregates module
pub mod account;
pub mod order;
pub mod product;
pub mod settings;

pub use account::{Account, AccountError, AccountView, Address, Profile, Registration};
pub use order::{InvalidStatus, LineItem, Order, OrderCustomer, OrderError, OrderStatus};
pub use product::{NewProduct, Product, ProductError, ProductPatch};
pub use settings::{GlobalSettings, SettingsError, GLOBAL_SETTINGS_KEY};
