//! Application state shared across handlers.

use std::sync::Arc;

use aurelia_core::CurrencyCode;

use crate::config::StorefrontConfig;
use crate::db::Store;
use crate::services::catalog::CatalogService;
use crate::services::email::{Mailer, Notifier};
use crate::services::payments::PaymentClients;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and hands out the store,
/// the catalog cache, the notifier and the payment clients.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    store: Arc<dyn Store>,
    catalog: CatalogService,
    notifier: Notifier,
    payments: PaymentClients,
    base_url: String,
    currency: CurrencyCode,
}

/// Settings the state needs that do not come from a backing service.
#[derive(Debug, Clone)]
pub struct StateSettings {
    pub base_url: String,
    pub currency: CurrencyCode,
}

impl From<&StorefrontConfig> for StateSettings {
    fn from(config: &StorefrontConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            currency: config.currency,
        }
    }
}

impl AppState {
    /// Create application state over a store and a mailer.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        payments: PaymentClients,
        settings: StateSettings,
    ) -> Self {
        let notifier = Notifier::new(mailer, &settings.base_url, settings.currency);
        let catalog = CatalogService::new(Arc::clone(&store));

        Self {
            inner: Arc::new(AppStateInner {
                store,
                catalog,
                notifier,
                payments,
                base_url: settings.base_url,
                currency: settings.currency,
            }),
        }
    }

    #[must_use]
    pub fn store(&self) -> &dyn Store {
        self.inner.store.as_ref()
    }

    /// Cached catalog reads.
    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn notifier(&self) -> &Notifier {
        &self.inner.notifier
    }

    #[must_use]
    pub fn payments(&self) -> &PaymentClients {
        &self.inner.payments
    }

    /// Public base URL, used for links and payment redirects.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    #[must_use]
    pub fn currency(&self) -> CurrencyCode {
        self.inner.currency
    }
}
