//! Flavor handle and payload types

use reqwest::Method;
use serde::de::{Deserializer, Error as _};
use serde::Deserialize;

use crate::connection::Connection;
use crate::error::Result;
use crate::instance::Link;

/// Attributes of a database flavor
#[derive(Debug, Clone, Deserialize)]
pub struct FlavorInfo {
    /// Flavor id; the API renders it as either a number or a string
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    /// Flavor name
    pub name: String,
    /// Available memory in MB, on detail payloads
    #[serde(default)]
    pub ram: Option<u32>,
    /// Virtual CPU count, on detail payloads
    #[serde(default)]
    pub vcpus: Option<u32>,
    /// Resource links
    #[serde(default)]
    pub links: Vec<Link>,
}

impl FlavorInfo {
    /// The `self` link for this flavor, usable as the `flavor_ref` when
    /// creating an instance
    #[must_use]
    pub fn reference(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|link| link.rel == "self")
            .map(|link| link.href.as_str())
    }
}

/// Deserialize an id that the API renders as either a JSON number or a
/// string.
pub(crate) fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(value) => Ok(value),
        serde_json::Value::Number(value) => Ok(value.to_string()),
        other => Err(D::Error::custom(format!("invalid id value: {other}"))),
    }
}

#[derive(Deserialize)]
pub(crate) struct FlavorsEnvelope {
    pub flavors: Vec<FlavorInfo>,
}

#[derive(Deserialize)]
struct FlavorEnvelope {
    flavor: FlavorInfo,
}

/// Handle to a database flavor.
///
/// Obtained from [`Connection::flavor`]; carries a snapshot of the flavor
/// attributes which [`Flavor::refresh`] updates in place.
#[derive(Debug)]
pub struct Flavor<'a> {
    connection: &'a Connection,
    id: String,
    info: FlavorInfo,
}

impl<'a> Flavor<'a> {
    pub(crate) async fn fetch(connection: &'a Connection, id: &str) -> Result<Self> {
        let info = Self::fetch_info(connection, id).await?;
        Ok(Self {
            connection,
            id: id.to_string(),
            info,
        })
    }

    async fn fetch_info(connection: &Connection, id: &str) -> Result<FlavorInfo> {
        let response = connection
            .service_request(
                Method::GET,
                &format!("/flavors/{}", urlencoding::encode(id)),
                None,
            )
            .await?;
        response.ensure_success()?;
        let envelope: FlavorEnvelope = response.json()?;
        Ok(envelope.flavor)
    }

    /// Flavor id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cached flavor attributes from the last fetch
    #[must_use]
    pub fn info(&self) -> &FlavorInfo {
        &self.info
    }

    /// Re-fetch the flavor attributes from the API.
    ///
    /// # Errors
    ///
    /// Returns a classified [`CloudDbError::Api`](crate::CloudDbError::Api)
    /// fault on any non-2xx response.
    pub async fn refresh(&mut self) -> Result<()> {
        self.info = Self::fetch_info(self.connection, &self.id).await?;
        Ok(())
    }
}
