//! The shared handles every repository and builder is created from.

use std::fmt;
use std::sync::Arc;

use crate::config::OdmConfig;
use crate::gateway::DocumentGateway;
use crate::types::{FirstPage, PageResolver};

/// Gateway, configuration and page resolver, shared by cheap clones.
#[derive(Clone)]
pub struct OdmContext {
    gateway: Arc<dyn DocumentGateway>,
    config: Arc<OdmConfig>,
    page_resolver: Arc<dyn PageResolver>,
}

impl OdmContext {
    /// Creates a context that always paginates from page 1 unless told otherwise.
    pub fn new(gateway: Arc<dyn DocumentGateway>, config: OdmConfig) -> Self {
        Self {
            gateway,
            config: Arc::new(config),
            page_resolver: Arc::new(FirstPage),
        }
    }

    /// Connects an [`ElasticsearchGateway`](crate::gateway::ElasticsearchGateway)
    /// using the connection settings in `config`.
    #[cfg(feature = "elasticsearch")]
    pub fn connect(config: OdmConfig) -> crate::error::OdmResult<Self> {
        let gateway = crate::gateway::ElasticsearchGateway::new(&config)?;
        Ok(Self::new(Arc::new(gateway), config))
    }

    /// Replaces the page resolver used by `paginate`.
    pub fn with_page_resolver(mut self, resolver: Arc<dyn PageResolver>) -> Self {
        self.page_resolver = resolver;
        self
    }

    /// Returns the gateway.
    pub fn gateway(&self) -> &Arc<dyn DocumentGateway> {
        &self.gateway
    }

    /// Returns the configuration.
    pub fn config(&self) -> &OdmConfig {
        &self.config
    }

    /// Returns the page resolver.
    pub fn page_resolver(&self) -> &Arc<dyn PageResolver> {
        &self.page_resolver
    }
}

impl fmt::Debug for OdmContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdmContext")
            .field("gateway", &self.gateway.name())
            .field("config", &self.config)
            .finish()
    }
}
