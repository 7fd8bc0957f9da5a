//! Application services sitting between the HTTP handlers and the stores.

use std::sync::Arc;

use crate::config::Config;
use crate::store::Stores;

pub mod accounts;
pub mod catalog;
pub mod events;
pub mod export;
pub mod orders;
pub mod reporting;
pub mod settings;

pub use accounts::AccountService;
pub use catalog::CatalogService;
pub use events::{EventPublisher, LogPublisher, NatsPublisher};
pub use orders::OrderEngine;
pub use reporting::ReportingService;
pub use settings::SettingsService;

#[derive(Clone)]
pub struct Services {
    pub orders: OrderEngine,
    pub settings: SettingsService,
    pub catalog: CatalogService,
    pub accounts: AccountService,
    pub reporting: ReportingService,
}

impl Services {
    pub fn new(stores: Stores, events: Arc<dyn EventPublisher>, config: &Config) -> Self {
        let settings = SettingsService::new(stores.settings.clone());
        Self {
            orders: OrderEngine::new(
                stores.catalog.clone(),
                stores.orders.clone(),
                settings.clone(),
                events,
                config.serving_option_policy,
            ),
            catalog: CatalogService::new(stores.catalog.clone()),
            accounts: AccountService::new(stores.accounts.clone()),
            reporting: ReportingService::new(stores.catalog, stores.accounts, stores.orders, config.admin_page_size),
            settings,
        }
    }
}
