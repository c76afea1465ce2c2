//! Connection configuration: regions, data formats, and the parameter
//! record every sub-client carries its own copy of.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::Error;

/// Default request timeout. Large user records can take a while.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Namespace Alma uses for its XML error envelopes.
pub(crate) const ERROR_NS: &str = "http://com/exlibris/urm/general/xmlbeans";

pub(crate) const USER_AGENT: &str =
    concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Geographic API region, selecting the regional Alma gateway host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Region {
    /// `api-na.hosted.exlibrisgroup.com`. This is the default.
    #[default]
    America,
    /// `api-eu.hosted.exlibrisgroup.com`.
    Europe,
    /// `api-ap.hosted.exlibrisgroup.com`.
    AsiaPacific,
    /// `api-ca.hosted.exlibrisgroup.com`.
    Canada,
    /// `api-cn.hosted.exlibrisgroup.com`.
    China,
}

impl Region {
    /// Base URL of the regional gateway.
    pub fn base_url(&self) -> &'static str {
        match self {
            Region::America => "https://api-na.hosted.exlibrisgroup.com",
            Region::Europe => "https://api-eu.hosted.exlibrisgroup.com",
            Region::AsiaPacific => "https://api-ap.hosted.exlibrisgroup.com",
            Region::Canada => "https://api-ca.hosted.exlibrisgroup.com",
            Region::China => "https://api-cn.hosted.exlibrisgroup.com",
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Region::America => "America",
            Region::Europe => "Europe",
            Region::AsiaPacific => "Asia Pacific",
            Region::Canada => "Canada",
            Region::China => "China",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "America" => Ok(Region::America),
            "Europe" => Ok(Region::Europe),
            "Asia Pacific" => Ok(Region::AsiaPacific),
            "Canada" => Ok(Region::Canada),
            "China" => Ok(Region::China),
            other => Err(Error::InvalidArgument(format!(
                "unknown region {other:?}; valid regions are America, Europe, Asia Pacific, Canada, China"
            ))),
        }
    }
}

/// Preferred representation for request and response bodies.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DataFormat {
    /// `application/json`. This is the default.
    #[default]
    Json,
    /// `application/xml`.
    Xml,
}

impl DataFormat {
    /// Value sent in the `format` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataFormat::Json => "json",
            DataFormat::Xml => "xml",
        }
    }

    /// MIME type sent in the `content-type` header.
    pub fn mime(&self) -> &'static str {
        match self {
            DataFormat::Json => "application/json",
            DataFormat::Xml => "application/xml",
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "json" => Ok(DataFormat::Json),
            "xml" => Ok(DataFormat::Xml),
            other => Err(Error::InvalidArgument(format!(
                "format must be either 'json' or 'xml', got {other:?}"
            ))),
        }
    }
}

/// Connection parameters shared by construction. Every sub-client gets its
/// own clone, so mutating one copy can never reach another.
#[derive(Clone, Debug)]
pub(crate) struct ConnectionParams {
    pub base_url: String,
    pub format: DataFormat,
    pub api_key: String,
    pub user_agent: String,
    pub xml_ns: &'static str,
    pub timeout: Duration,
}

impl ConnectionParams {
    pub fn new(api_key: &str, region: Region, format: DataFormat) -> Self {
        ConnectionParams {
            base_url: region.base_url().to_string(),
            format,
            api_key: api_key.to_string(),
            user_agent: USER_AGENT.to_string(),
            xml_ns: ERROR_NS,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}
