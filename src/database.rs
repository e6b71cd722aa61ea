//! Database handle and payload types

use reqwest::Method;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::connection::Connection;
use crate::error::{CloudDbError, Result};

/// Hard API limit on database names
const MAX_DATABASE_NAME_LEN: usize = 64;

const DEFAULT_CHARACTER_SET: &str = "utf8";
const DEFAULT_COLLATE: &str = "utf8_general_ci";

/// Attributes of a database on an instance
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseInfo {
    /// Database name
    pub name: String,
    /// Character set, when reported
    #[serde(default)]
    pub character_set: Option<String>,
    /// Collation, when reported
    #[serde(default)]
    pub collate: Option<String>,
}

/// Description of a database to create, either on its own via
/// [`crate::Instance::create_database`] or nested in an instance-create
/// request.
#[derive(Debug, Clone, Serialize, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for DatabaseSpec"),
    builder_type(doc = "Builder for DatabaseSpec", vis = "pub"),
    build_method(doc = "Build the DatabaseSpec")
)]
pub struct DatabaseSpec {
    /// Database name, limited to 64 characters
    #[builder(setter(into))]
    pub name: String,

    /// Character set; the API default is `utf8`
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option, into))]
    pub character_set: Option<String>,

    /// Collation; the API default is `utf8_general_ci`
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(default, setter(strip_option, into))]
    pub collate: Option<String>,
}

impl DatabaseSpec {
    /// Spec with only a name, using the API defaults for everything else
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            character_set: None,
            collate: None,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CloudDbError::missing_argument(
                "must provide a name to create a database",
            ));
        }
        if self.name.chars().count() > MAX_DATABASE_NAME_LEN {
            return Err(CloudDbError::syntax(format!(
                "database name must be {MAX_DATABASE_NAME_LEN} characters or less"
            )));
        }
        Ok(())
    }

    /// The create-database call always sends an explicit character set
    /// and collation.
    pub(crate) fn with_defaults(&self) -> Self {
        Self {
            name: self.name.clone(),
            character_set: Some(
                self.character_set
                    .clone()
                    .unwrap_or_else(|| DEFAULT_CHARACTER_SET.to_string()),
            ),
            collate: Some(
                self.collate
                    .clone()
                    .unwrap_or_else(|| DEFAULT_COLLATE.to_string()),
            ),
        }
    }
}

/// Handle to a database on an instance
#[derive(Debug)]
pub struct Database<'a> {
    connection: &'a Connection,
    instance_id: String,
    name: String,
}

impl<'a> Database<'a> {
    pub(crate) fn new(
        connection: &'a Connection,
        instance_id: &str,
        name: impl Into<String>,
    ) -> Self {
        Self {
            connection,
            instance_id: instance_id.to_string(),
            name: name.into(),
        }
    }

    /// Database name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deletes this database from its instance.
    ///
    /// # Errors
    ///
    /// Returns a classified [`CloudDbError::Api`] fault on any non-2xx
    /// response.
    pub async fn delete(self) -> Result<()> {
        let response = self
            .connection
            .service_request(
                Method::DELETE,
                &format!(
                    "/instances/{}/databases/{}",
                    urlencoding::encode(&self.instance_id),
                    urlencoding::encode(&self.name)
                ),
                None,
            )
            .await?;
        response.ensure_success()?;
        Ok(())
    }
}
