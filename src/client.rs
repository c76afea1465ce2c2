//! Top-level entry point: regional resolution, construction-time
//! validation, and the resource sub-clients.

use std::time::Duration;

use crate::config::{ConnectionParams, DataFormat, Region};
use crate::connection::Connection;
use crate::users::UsersClient;
use crate::Error;

/// Client for the Alma REST APIs.
///
/// Construction resolves the regional gateway, validates the requested data
/// format, and hands every resource sub-client its own copy of the
/// connection parameters.
///
/// ```no_run
/// # async fn run() -> Result<(), alma_api::Error> {
/// use alma_api::{Alma, BriefQuery, PageOptions};
///
/// let alma = Alma::new("l8xxSECRET")?;
/// let query = BriefQuery::new().with_field("last_name", "Archer");
/// let found = alma.users.read(None, &query, &PageOptions::new()).await?;
/// println!("{:?}", found.total_record_count());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Alma {
    /// The Users API family, including nested loans, requests, fees, and
    /// deposits.
    pub users: UsersClient,
}

impl Alma {
    /// Client for the default region (America) and format (JSON).
    pub fn new(api_key: &str) -> Result<Self, Error> {
        Alma::builder(api_key).build()
    }

    /// Starts a builder for a non-default region, format, timeout, or base
    /// URL.
    pub fn builder(api_key: &str) -> AlmaBuilder {
        AlmaBuilder {
            api_key: api_key.to_string(),
            region: Region::default(),
            format: DataFormat::default(),
            timeout: None,
            base_url: None,
        }
    }

    /// Construction from plain string settings. Unknown regions or formats
    /// fail here, before any request is made.
    pub fn from_settings(api_key: &str, region: &str, format: &str) -> Result<Self, Error> {
        Alma::builder(api_key)
            .region(region.parse()?)
            .format(format.parse()?)
            .build()
    }
}

/// Builder for [`Alma`].
pub struct AlmaBuilder {
    api_key: String,
    region: Region,
    format: DataFormat,
    timeout: Option<Duration>,
    base_url: Option<String>,
}

impl AlmaBuilder {
    /// Selects the regional API gateway.
    pub fn region(mut self, region: Region) -> Self {
        self.region = region;
        self
    }

    /// Preferred representation for request and response bodies.
    pub fn format(mut self, format: DataFormat) -> Self {
        self.format = format;
        self
    }

    /// Request timeout, 30 seconds by default.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Replaces the regional base URL, e.g. to point at a local mock server
    /// in tests.
    pub fn base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.trim_end_matches('/').to_string());
        self
    }

    pub fn build(self) -> Result<Alma, Error> {
        let mut params = ConnectionParams::new(&self.api_key, self.region, self.format);
        if let Some(timeout) = self.timeout {
            params.timeout = timeout;
        }
        if let Some(base_url) = self.base_url {
            params.base_url = base_url;
        }
        let conn = Connection::new(params)?;
        Ok(Alma {
            users: UsersClient::new(&conn),
        })
    }
}
