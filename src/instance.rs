//! Database instance handle and payload types

use reqwest::Method;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::connection::Connection;
use crate::database::{Database, DatabaseInfo, DatabaseSpec};
use crate::error::{ApiFault, CloudDbError, FaultKind, Result};
use crate::flavor::lenient_id;
use crate::user::{User, UserInfo, UserSpec};

/// Hard API limit on instance names
const MAX_INSTANCE_NAME_LEN: usize = 128;

/// A hypermedia link attached to a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Relation of the link to the resource (`self`, `bookmark`, ...)
    pub rel: String,
    /// Target URL
    pub href: String,
}

/// Current state of a database instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceStatus {
    /// The instance is being provisioned
    Build,
    /// The instance is up and responding
    Active,
    /// The instance is unreachable
    Blocked,
    /// The instance is being resized
    Resize,
    /// The instance is shut down
    Shutdown,
    /// Provisioning or operation failed
    Failed,
    /// A state this client does not recognize
    #[serde(other)]
    Unknown,
}

/// Flavor reference embedded in an instance payload
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceFlavor {
    /// Flavor id; the API renders it as either a number or a string
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    /// Links to the flavor resource
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Storage volume attached to an instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    /// Volume size in gigabytes
    pub size: u32,
    /// Gigabytes in use, reported on detail payloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used: Option<f64>,
}

impl Volume {
    /// Volume of the given size in gigabytes
    #[must_use]
    pub fn new(size: u32) -> Self {
        Self { size, used: None }
    }
}

/// Database instance attributes as returned by the API.
///
/// Listing payloads carry only id/name/status; detail and single-instance
/// payloads fill in the rest.
#[derive(Debug, Clone, Deserialize)]
pub struct InstanceInfo {
    /// Instance id
    pub id: String,
    /// Instance name
    pub name: String,
    /// Current state
    #[serde(default)]
    pub status: Option<InstanceStatus>,
    /// DNS-resolvable hostname of the instance
    #[serde(default)]
    pub hostname: Option<String>,
    /// Flavor the instance runs on
    #[serde(default)]
    pub flavor: Option<InstanceFlavor>,
    /// Attached storage volume
    #[serde(default)]
    pub volume: Option<Volume>,
    /// Whether the root user has been enabled
    #[serde(rename = "rootEnabled", default)]
    pub root_enabled: Option<bool>,
    /// Creation timestamp
    #[serde(default)]
    pub created: Option<String>,
    /// Last-update timestamp
    #[serde(default)]
    pub updated: Option<String>,
    /// Resource links
    #[serde(default)]
    pub links: Vec<Link>,
}

/// Root credentials returned by [`Instance::enable_root`]
#[derive(Debug, Clone, Deserialize)]
pub struct RootUser {
    /// Root user name
    pub name: String,
    /// Generated root password
    pub password: String,
}

/// Parameters for creating a database instance.
///
/// The builder enforces the required fields (`flavor_ref`, `name`,
/// `volume`) at compile time.
#[derive(Debug, Clone, Serialize, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for CreateInstanceParams"),
    builder_type(doc = "Builder for CreateInstanceParams", vis = "pub"),
    build_method(doc = "Build the CreateInstanceParams")
)]
pub struct CreateInstanceParams {
    /// Reference to a flavor, as returned by the flavor listing
    #[serde(rename = "flavorRef")]
    #[builder(setter(into))]
    pub flavor_ref: String,

    /// Instance name, limited to 128 characters
    #[builder(setter(into))]
    pub name: String,

    /// Volume to provision for the instance
    pub volume: Volume,

    /// Databases to create with the instance
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub databases: Vec<DatabaseSpec>,

    /// Users to create with the instance
    #[serde(skip_serializing_if = "Vec::is_empty")]
    #[builder(default)]
    pub users: Vec<UserSpec>,
}

impl CreateInstanceParams {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CloudDbError::missing_argument(
                "must provide a name to create an instance",
            ));
        }
        if self.name.chars().count() > MAX_INSTANCE_NAME_LEN {
            return Err(CloudDbError::syntax(format!(
                "instance name must be {MAX_INSTANCE_NAME_LEN} characters or less"
            )));
        }
        Ok(())
    }
}

#[derive(Serialize)]
pub(crate) struct CreateInstanceEnvelope<'a> {
    pub instance: &'a CreateInstanceParams,
}

#[derive(Deserialize)]
pub(crate) struct InstancesEnvelope {
    pub instances: Vec<InstanceInfo>,
}

#[derive(Deserialize)]
pub(crate) struct InstanceEnvelope {
    pub instance: InstanceInfo,
}

#[derive(Deserialize)]
struct RootUserEnvelope {
    user: RootUser,
}

#[derive(Deserialize)]
struct RootEnabledEnvelope {
    #[serde(rename = "rootEnabled")]
    root_enabled: bool,
}

/// Handle to a database instance.
///
/// Obtained from [`Connection::instance`] or
/// [`Connection::create_instance`]; carries a snapshot of the instance
/// attributes which [`Instance::refresh`] updates in place.
#[derive(Debug)]
pub struct Instance<'a> {
    connection: &'a Connection,
    id: String,
    info: InstanceInfo,
}

impl<'a> Instance<'a> {
    pub(crate) fn from_info(connection: &'a Connection, info: InstanceInfo) -> Self {
        Self {
            connection,
            id: info.id.clone(),
            info,
        }
    }

    pub(crate) async fn fetch(connection: &'a Connection, id: &str) -> Result<Self> {
        let response = connection
            .service_request(
                Method::GET,
                &format!("/instances/{}", urlencoding::encode(id)),
                None,
            )
            .await?;
        response.ensure_success()?;
        let envelope: InstanceEnvelope = response.json()?;
        Ok(Self::from_info(connection, envelope.instance))
    }

    /// Instance id
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Cached instance attributes from the last fetch
    #[must_use]
    pub fn info(&self) -> &InstanceInfo {
        &self.info
    }

    /// Re-fetch the instance attributes from the API.
    ///
    /// # Errors
    ///
    /// Returns a classified [`CloudDbError::Api`] fault on any non-2xx
    /// response.
    pub async fn refresh(&mut self) -> Result<()> {
        let response = self
            .connection
            .service_request(
                Method::GET,
                &format!("/instances/{}", urlencoding::encode(&self.id)),
                None,
            )
            .await?;
        response.ensure_success()?;
        let envelope: InstanceEnvelope = response.json()?;
        self.info = envelope.instance;
        Ok(())
    }

    /// Enable the root user for this instance and return its generated
    /// credentials.
    ///
    /// # Errors
    ///
    /// Returns a classified [`CloudDbError::Api`] fault on any non-2xx
    /// response.
    pub async fn enable_root(&mut self) -> Result<RootUser> {
        let response = self
            .connection
            .service_request(
                Method::POST,
                &format!("/instances/{}/root", urlencoding::encode(&self.id)),
                None,
            )
            .await?;
        response.ensure_success()?;
        let envelope: RootUserEnvelope = response.json()?;
        self.info.root_enabled = Some(true);
        Ok(envelope.user)
    }

    /// Whether the root user has ever been enabled for this instance.
    ///
    /// # Errors
    ///
    /// Returns a classified [`CloudDbError::Api`] fault on any non-2xx
    /// response.
    pub async fn root_enabled(&mut self) -> Result<bool> {
        let response = self
            .connection
            .service_request(
                Method::GET,
                &format!("/instances/{}/root", urlencoding::encode(&self.id)),
                None,
            )
            .await?;
        response.ensure_success()?;
        let envelope: RootEnabledEnvelope = response.json()?;
        self.info.root_enabled = Some(envelope.root_enabled);
        Ok(envelope.root_enabled)
    }

    /// Lists the databases on this instance.
    ///
    /// # Errors
    ///
    /// Returns a classified [`CloudDbError::Api`] fault on any non-2xx
    /// response.
    pub async fn list_databases(&self) -> Result<Vec<DatabaseInfo>> {
        let response = self
            .connection
            .service_request(
                Method::GET,
                &format!("/instances/{}/databases", urlencoding::encode(&self.id)),
                None,
            )
            .await?;
        response.ensure_success()?;
        #[derive(Deserialize)]
        struct Envelope {
            databases: Vec<DatabaseInfo>,
        }
        let envelope: Envelope = response.json()?;
        Ok(envelope.databases)
    }

    /// Creates a database on this instance. The character set and
    /// collation default to `utf8` / `utf8_general_ci` when unset.
    ///
    /// # Errors
    ///
    /// Returns [`CloudDbError::Syntax`] before any HTTP call when the
    /// name exceeds the API limit, and a classified fault when the API
    /// rejects the request.
    pub async fn create_database(&self, spec: DatabaseSpec) -> Result<()> {
        spec.validate()?;
        let body = serde_json::to_string(&spec.with_defaults())?;
        let response = self
            .connection
            .service_request(
                Method::POST,
                &format!("/instances/{}/databases", urlencoding::encode(&self.id)),
                Some(body),
            )
            .await?;
        response.ensure_success()?;
        Ok(())
    }

    /// Handle to a database on this instance by name
    #[must_use]
    pub fn database(&self, name: impl Into<String>) -> Database<'a> {
        Database::new(self.connection, &self.id, name)
    }

    /// Lists the users on this instance.
    ///
    /// # Errors
    ///
    /// Returns a classified [`CloudDbError::Api`] fault on any non-2xx
    /// response.
    pub async fn list_users(&self) -> Result<Vec<UserInfo>> {
        let response = self
            .connection
            .service_request(
                Method::GET,
                &format!("/instances/{}/users", urlencoding::encode(&self.id)),
                None,
            )
            .await?;
        response.ensure_success()?;
        #[derive(Deserialize)]
        struct Envelope {
            users: Vec<UserInfo>,
        }
        let envelope: Envelope = response.json()?;
        Ok(envelope.users)
    }

    /// Creates a user on this instance with access to the listed
    /// databases.
    ///
    /// # Errors
    ///
    /// Returns [`CloudDbError::Syntax`] before any HTTP call when no
    /// databases are granted, and a classified fault when the API rejects
    /// the request.
    pub async fn create_user(&self, spec: UserSpec) -> Result<()> {
        spec.validate()?;
        #[derive(Serialize)]
        struct Envelope<'b> {
            users: [&'b UserSpec; 1],
        }
        let body = serde_json::to_string(&Envelope { users: [&spec] })?;
        let response = self
            .connection
            .service_request(
                Method::POST,
                &format!("/instances/{}/users", urlencoding::encode(&self.id)),
                Some(body),
            )
            .await?;
        response.ensure_success()?;
        Ok(())
    }

    /// Handle to a user on this instance by name
    #[must_use]
    pub fn user(&self, name: impl Into<String>) -> User<'a> {
        User::new(self.connection, &self.id, name)
    }

    /// Deletes this instance. The API acknowledges deletion with status
    /// 202 specifically; any other status is an error.
    ///
    /// # Errors
    ///
    /// Returns a classified [`CloudDbError::Api`] fault; a 2xx status
    /// other than 202 maps to a [`FaultKind::Other`] fault.
    pub async fn delete(self) -> Result<()> {
        let response = self
            .connection
            .service_request(
                Method::DELETE,
                &format!("/instances/{}", urlencoding::encode(&self.id)),
                None,
            )
            .await?;
        let status = response.status.as_u16();
        if status != 202 {
            response.ensure_success()?;
            return Err(CloudDbError::Api(ApiFault {
                kind: FaultKind::Other,
                message: format!("expected status 202 deleting an instance, got {status}"),
                status,
                body: response.body,
            }));
        }
        Ok(())
    }
}
