//! Administration console for the parqueo parking-management API.
//!
//! Resources are described as data ([`ResourceSchema`]) and served by two
//! generic engines: a list engine ([`table`]) and a form engine
//! ([`form`]). Two special-purpose controllers sit beside them: the lot
//! occupancy map ([`occupancy`]) and reservation payment collection
//! ([`payments`]). Every request goes through the [`Transport`] seam.
//!
//! # Example
//!
//! ```no_run
//! use parqueo_admin::{Admin, Config};
//!
//! # async fn demo() -> parqueo_admin::Result<()> {
//! let admin = Admin::new(Config::default())?;
//!
//! let mut usuarios = admin.list_view("usuarios")?;
//! usuarios.submit_search("ana").await;
//!
//! let map = admin.occupancy().load(1).await?;
//! println!("{}: {} libres", map.title(), map.free());
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod console;
pub mod data;
pub mod error;
pub mod form;
pub mod money;
pub mod normalize;
pub mod notice;
pub mod occupancy;
pub mod options;
pub mod payments;
pub mod resources;
pub mod schema;
pub mod stats;
pub mod table;
pub mod transport;
pub mod view;

use std::sync::Arc;

use jiff::tz::TimeZone;
use tracing::debug;

pub use cache::{QueryCache, QueryKey};
pub use config::Config;
pub use data::ResourceClient;
pub use error::{Error, Result};
pub use form::{CrudForm, FormMode};
pub use notice::Notice;
pub use occupancy::{OccupancyController, OccupancyMap, SpaceCommand};
pub use options::OptionResolver;
pub use payments::{PaymentController, ReservationFilter};
pub use resources::ResourceRegistry;
pub use schema::{Coercion, FieldDescriptor, FieldType, ResourceSchema};
pub use stats::StatsClient;
pub use table::{ListView, Table};
pub use transport::http::HttpTransport;
pub use transport::{ApiRequest, Transport};
pub use view::{Loaded, ViewEpoch};

/// One console session: configuration, the transport, the shared query
/// cache and the resource registry.
pub struct Admin {
    config: Config,
    transport: Arc<dyn Transport>,
    cache: Arc<QueryCache>,
    registry: ResourceRegistry,
    options: OptionResolver,
    epoch: ViewEpoch,
    time_zone: TimeZone,
}

impl Admin {
    /// Create a session talking HTTP to `config.base_url`.
    pub fn new(config: Config) -> Result<Self> {
        let transport = HttpTransport::new(&config.base_url, config.timeout())?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Create a session over a custom transport implementation.
    pub fn with_transport(config: Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let mut registry = ResourceRegistry::builtin();
        registry.extend(config.resources.clone())?;
        let time_zone = config.time_zone()?;
        let cache = Arc::new(QueryCache::new());
        let options = OptionResolver::new(transport.clone(), cache.clone(), config.options_ttl());

        debug!(
            "Session ready: {} resources, page size {}",
            registry.iter().count(),
            config.page_size
        );

        Ok(Self {
            config,
            transport,
            cache,
            registry,
            options,
            epoch: ViewEpoch::new(),
            time_zone,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn options(&self) -> &OptionResolver {
        &self.options
    }

    pub fn epoch(&self) -> &ViewEpoch {
        &self.epoch
    }

    pub fn time_zone(&self) -> &TimeZone {
        &self.time_zone
    }

    /// Data access for one resource.
    pub fn resource(&self, key: &str) -> Result<ResourceClient> {
        Ok(ResourceClient::new(
            self.registry.get(key)?,
            self.transport.clone(),
            self.cache.clone(),
            self.config.page_size,
        ))
    }

    pub fn list_view(&self, key: &str) -> Result<ListView> {
        Ok(ListView::new(self.resource(key)?, self.epoch.clone()))
    }

    pub fn create_form(&self, key: &str) -> Result<CrudForm> {
        Ok(CrudForm::create(self.registry.get(key)?, self.time_zone.clone()))
    }

    /// A form seeded with the current record.
    pub async fn edit_form(&self, key: &str, id: &str) -> Result<CrudForm> {
        let client = self.resource(key)?;
        let record = client.get_one(id).await?;
        let record = match record {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(Error::Validation(format!(
                    "{} {} is not a record: {}",
                    key, id, other
                )))
            }
        };
        Ok(CrudForm::edit(
            client.schema().clone(),
            id.trim(),
            record,
            self.time_zone.clone(),
        ))
    }

    pub fn occupancy(&self) -> OccupancyController {
        OccupancyController::new(
            self.transport.clone(),
            self.cache.clone(),
            self.config.page_size,
        )
    }

    pub fn payments(&self) -> PaymentController {
        PaymentController::new(self.transport.clone(), self.cache.clone())
    }

    pub fn stats(&self) -> StatsClient {
        StatsClient::new(self.transport.clone())
    }
}
