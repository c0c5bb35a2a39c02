//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;

use parley_core::UserId;

use crate::config::ServerConfig;
use crate::crypto::SettingsCipher;
use crate::db::SettingsRepository;
use crate::error::AppError;
use crate::image_host::ImageHostClient;
use crate::payments::PaymentGatewayClient;
use crate::realtime::{CHANNEL_CAPACITY, EventBus};
use crate::whatsapp::WhatsAppClient;

/// How long a phone-number-id → tenant mapping is trusted.
const TENANT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Application state shared across all handlers.
///
/// Cheap to clone: everything lives behind one `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: PgPool,
    whatsapp: WhatsAppClient,
    image_host: Option<ImageHostClient>,
    payments: Option<PaymentGatewayClient>,
    events: EventBus,
    cipher: SettingsCipher,
    tenants_by_phone_id: Cache<String, UserId>,
}

impl AppState {
    /// Build the state and every outbound client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if an HTTP client cannot be built or the settings key
    /// is invalid.
    pub fn new(config: ServerConfig, pool: PgPool) -> Result<Self, AppError> {
        let whatsapp = WhatsAppClient::new(&config.whatsapp)?;
        let image_host = config
            .image_host
            .as_ref()
            .map(ImageHostClient::new)
            .transpose()?;
        let payments = config
            .payments
            .as_ref()
            .map(PaymentGatewayClient::new)
            .transpose()?;
        let cipher = SettingsCipher::from_base64_key(&config.settings_key)?;

        let tenants_by_phone_id = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(TENANT_CACHE_TTL)
            .build();

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                whatsapp,
                image_host,
                payments,
                events: EventBus::new(CHANNEL_CAPACITY),
                cipher,
                tenants_by_phone_id,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn whatsapp(&self) -> &WhatsAppClient {
        &self.inner.whatsapp
    }

    /// Image host client, when configured.
    #[must_use]
    pub fn image_host(&self) -> Option<&ImageHostClient> {
        self.inner.image_host.as_ref()
    }

    /// Payment gateway client, when configured.
    #[must_use]
    pub fn payments(&self) -> Option<&PaymentGatewayClient> {
        self.inner.payments.as_ref()
    }

    /// The process-wide realtime event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    #[must_use]
    pub fn cipher(&self) -> &SettingsCipher {
        &self.inner.cipher
    }

    /// Resolve the tenant owning a WhatsApp phone number id.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings lookup fails.
    pub async fn tenant_for_phone_number_id(
        &self,
        phone_number_id: &str,
    ) -> Result<Option<UserId>, AppError> {
        if let Some(tenant) = self.inner.tenants_by_phone_id.get(phone_number_id).await {
            return Ok(Some(tenant));
        }

        let tenant = SettingsRepository::new(self.pool())
            .find_tenant_by_phone_number_id(phone_number_id)
            .await?;
        if let Some(tenant) = tenant {
            self.inner
                .tenants_by_phone_id
                .insert(phone_number_id.to_owned(), tenant)
                .await;
        }
        Ok(tenant)
    }

    /// Drop cached tenant lookups after a settings change.
    pub fn invalidate_tenant_cache(&self) {
        self.inner.tenants_by_phone_id.invalidate_all();
    }
}
