//! User handle and payload types

use reqwest::Method;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::connection::Connection;
use crate::database::{DatabaseInfo, DatabaseSpec};
use crate::error::{CloudDbError, Result};

/// Attributes of a user on an instance
#[derive(Debug, Clone, Deserialize)]
pub struct UserInfo {
    /// User name
    pub name: String,
    /// Databases the user has access to
    #[serde(default)]
    pub databases: Vec<DatabaseInfo>,
}

/// Description of a user to create, either via
/// [`crate::Instance::create_user`] or nested in an instance-create
/// request.
#[derive(Debug, Clone, Serialize, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for UserSpec"),
    builder_type(doc = "Builder for UserSpec", vis = "pub"),
    build_method(doc = "Build the UserSpec")
)]
pub struct UserSpec {
    /// User name
    #[builder(setter(into))]
    pub name: String,

    /// Password for database access
    #[builder(setter(into))]
    pub password: String,

    /// Databases to grant access to; at least one is required when
    /// creating a user directly
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub databases: Vec<DatabaseSpec>,
}

impl UserSpec {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CloudDbError::missing_argument(
                "must provide a name for the user",
            ));
        }
        if self.password.is_empty() {
            return Err(CloudDbError::missing_argument(
                "must provide a password for the user",
            ));
        }
        if self.databases.is_empty() {
            return Err(CloudDbError::syntax(
                "must provide at least one database to grant to the user",
            ));
        }
        Ok(())
    }
}

/// Handle to a user on an instance
#[derive(Debug)]
pub struct User<'a> {
    connection: &'a Connection,
    instance_id: String,
    name: String,
}

impl<'a> User<'a> {
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

    /// User name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deletes this user from its instance.
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
                    "/instances/{}/users/{}",
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
