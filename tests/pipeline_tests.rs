//! End-to-end tests for authentication and the request pipeline.
//!
//! These drive a real `Connection` against a wiremock server: the
//! credential exchange, token attachment, expired-token refresh, fault
//! classification, and the resource operations on top of them.

use clouddb::{
    CloudDbError, Connection, ConnectionBuilder, CreateInstanceParams, DatabaseSpec, FaultKind,
    Region, UserSpec, Volume,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN: &str = "a7f2bc7e-c4f8-4df8-9ef4-f0f4ff0bb7e3";

fn auth_response(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(204)
        .insert_header("X-Auth-Token", token)
        .insert_header(
            "X-Server-Management-Url",
            "https://servers.api.rackspacecloud.com/v1.0/1234",
        )
}

async fn mount_auth(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/auth"))
        .and(header("X-Auth-User", "rsuser"))
        .and(header("X-Auth-Key", "apikey"))
        .respond_with(auth_response(TOKEN))
        .mount(server)
        .await;
}

/// Builder pointed at the mock server for both auth and service calls.
fn builder_for(server: &MockServer) -> ConnectionBuilder {
    Connection::builder()
        .username("rsuser")
        .api_key("apikey")
        .region(Region::Dfw)
        .auth_url(format!("{}/auth", server.uri()))
        .service_url(format!("{}/v1.0", server.uri()))
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_authenticate_populates_session() {
    let server = MockServer::start().await;
    mount_auth(&server).await;

    let dbaas = builder_for(&server).connect().await.unwrap();

    assert!(dbaas.authenticated().await);
    assert_eq!(dbaas.auth_token().await.as_deref(), Some(TOKEN));
    let location = dbaas.service_location().await.unwrap();
    assert_eq!(location.path, "/v1.0/1234");
    assert_eq!(location.scheme, "http");
}

#[tokio::test]
async fn test_authentication_failure_is_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = builder_for(&server).connect().await.unwrap_err();
    match err {
        CloudDbError::Authentication(msg) => assert!(msg.contains("401")),
        other => panic!("expected Authentication error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_authentication_rejects_malformed_management_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth"))
        .respond_with(
            ResponseTemplate::new(204)
                .insert_header("X-Auth-Token", TOKEN)
                .insert_header(
                    "X-Server-Management-Url",
                    "https://servers.api.rackspacecloud.com/v1.0/not-an-account",
                ),
        )
        .mount(&server)
        .await;

    let err = builder_for(&server).connect().await.unwrap_err();
    match err {
        CloudDbError::Authentication(msg) => assert!(msg.contains("account id")),
        other => panic!("expected Authentication error, got {other:?}"),
    }
}

// ============================================================================
// Request pipeline
// ============================================================================

#[tokio::test]
async fn test_list_instances_sends_token_and_parses_envelope() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/1234/instances"))
        .and(header("X-Auth-Token", TOKEN))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "instances": [
                {"id": "44b277eb-39be-4921-be31-3d61b43651d7", "name": "instance_one", "status": "ACTIVE"},
                {"id": "d6ddd38f-8f5f-4fbe-8a9d-36e3e3a4e3cd", "name": "instance_two", "status": "BUILD"}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dbaas = builder_for(&server).connect().await.unwrap();
    let instances = dbaas.list_instances().await.unwrap();

    assert_eq!(instances.len(), 2);
    assert_eq!(instances[0].name, "instance_one");
    assert_eq!(instances[1].name, "instance_two");
}

#[tokio::test]
async fn test_expired_token_triggers_exactly_one_reauth() {
    let server = MockServer::start().await;
    // one auth for the initial connect, exactly one more for the refresh
    Mock::given(method("GET"))
        .and(path("/auth"))
        .respond_with(auth_response(TOKEN))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/1234/instances"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/1234/instances"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"instances": []})))
        .expect(1)
        .mount(&server)
        .await;

    let dbaas = builder_for(&server).connect().await.unwrap();
    let instances = dbaas.list_instances().await.unwrap();
    assert!(instances.is_empty());
}

#[tokio::test]
async fn test_expired_token_with_retry_disabled_fails_fast() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth"))
        .respond_with(auth_response(TOKEN))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/1234/instances"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let dbaas = builder_for(&server)
        .retry_auth(false)
        .connect()
        .await
        .unwrap();
    let err = dbaas.list_instances().await.unwrap_err();
    match err {
        CloudDbError::Connection(msg) => assert!(msg.contains("disabled")),
        other => panic!("expected Connection error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_persistent_401_exhausts_reauth_attempts() {
    let server = MockServer::start().await;
    // initial connect plus the bounded re-authentication attempts
    Mock::given(method("GET"))
        .and(path("/auth"))
        .respond_with(auth_response(TOKEN))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/1234/instances"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&server)
        .await;

    let dbaas = builder_for(&server).connect().await.unwrap();
    let err = dbaas.list_instances().await.unwrap_err();
    match err {
        CloudDbError::Connection(msg) => assert!(msg.contains("re-authentication")),
        other => panic!("expected Connection error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_concurrent_expiry_refreshes_once() {
    let server = MockServer::start().await;
    // initial auth hands out the stale token, the refresh hands out a new
    // one; expect(1) on the refresh mock proves the refresh was serialized
    Mock::given(method("GET"))
        .and(path("/auth"))
        .respond_with(auth_response("token-stale"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/auth"))
        .respond_with(auth_response("token-fresh"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/1234/instances"))
        .and(header("X-Auth-Token", "token-stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/1234/instances"))
        .and(header("X-Auth-Token", "token-fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"instances": []})))
        .mount(&server)
        .await;

    let dbaas = builder_for(&server).connect().await.unwrap();
    let (first, second) = tokio::join!(dbaas.list_instances(), dbaas.list_instances());
    first.unwrap();
    second.unwrap();
    assert_eq!(dbaas.auth_token().await.as_deref(), Some("token-fresh"));
}

#[tokio::test]
async fn test_transport_failures_exhaust_after_five_attempts() {
    let server = MockServer::start().await;
    mount_auth(&server).await;

    // auth against the mock server, service calls against a dead port
    let dbaas = builder_for(&server)
        .service_url("http://127.0.0.1:1/v1.0")
        .connect()
        .await
        .unwrap();

    let err = dbaas.list_instances().await.unwrap_err();
    match err {
        CloudDbError::Connection(msg) => {
            assert!(msg.contains("127.0.0.1"));
            assert!(msg.contains("5 attempts"));
        }
        other => panic!("expected Connection error, got {other:?}"),
    }
}

// ============================================================================
// Fault classification
// ============================================================================

#[tokio::test]
async fn test_api_fault_is_classified() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/1234/instances"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"badRequest": {"message": "bad size"}})),
        )
        .mount(&server)
        .await;

    let dbaas = builder_for(&server).connect().await.unwrap();
    let err = dbaas.list_instances().await.unwrap_err();
    match err {
        CloudDbError::Api(fault) => {
            assert_eq!(fault.kind, FaultKind::BadRequest);
            assert_eq!(fault.message, "bad size");
            assert_eq!(fault.status, 400);
        }
        other => panic!("expected Api fault, got {other:?}"),
    }
}

// ============================================================================
// Resource operations
// ============================================================================

async fn mount_instance(server: &MockServer, id: &str, name: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/v1.0/1234/instances/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "instance": {"id": id, "name": name, "status": "ACTIVE"}
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_create_instance_sends_wrapped_body() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("POST"))
        .and(path("/v1.0/1234/instances"))
        .and(body_json(json!({
            "instance": {
                "flavorRef": "flavor-1",
                "name": "test_instance",
                "volume": {"size": 1},
                "databases": [{"name": "testdb"}]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "instance": {"id": "new-id", "name": "test_instance", "status": "BUILD"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dbaas = builder_for(&server).connect().await.unwrap();
    let params = CreateInstanceParams::builder()
        .flavor_ref("flavor-1")
        .name("test_instance")
        .volume(Volume::new(1))
        .databases(vec![DatabaseSpec::named("testdb")])
        .build();
    let instance = dbaas.create_instance(params).await.unwrap();
    assert_eq!(instance.id(), "new-id");
}

#[tokio::test]
async fn test_oversize_instance_name_is_rejected_before_any_call() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    let dbaas = builder_for(&server).connect().await.unwrap();

    let params = CreateInstanceParams::builder()
        .flavor_ref("flavor-1")
        .name("x".repeat(129))
        .volume(Volume::new(1))
        .build();
    let err = dbaas.create_instance(params).await.unwrap_err();
    // no instances mock is mounted: an HTTP call would surface as a fault
    assert!(matches!(err, CloudDbError::Syntax(_)));
}

#[tokio::test]
async fn test_delete_instance_accepts_202() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_instance(&server, "doomed", "doomed_instance").await;
    Mock::given(method("DELETE"))
        .and(path("/v1.0/1234/instances/doomed"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let dbaas = builder_for(&server).connect().await.unwrap();
    let instance = dbaas.instance("doomed").await.unwrap();
    instance.delete().await.unwrap();
}

#[tokio::test]
async fn test_delete_missing_instance_is_item_not_found() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_instance(&server, "ghost", "ghost_instance").await;
    Mock::given(method("DELETE"))
        .and(path("/v1.0/1234/instances/ghost"))
        .respond_with(ResponseTemplate::new(404).set_body_json(
            json!({"itemNotFound": {"message": "The resource could not be found."}}),
        ))
        .mount(&server)
        .await;

    let dbaas = builder_for(&server).connect().await.unwrap();
    let instance = dbaas.instance("ghost").await.unwrap();
    let err = instance.delete().await.unwrap_err();
    match err {
        CloudDbError::Api(fault) => assert_eq!(fault.kind, FaultKind::ItemNotFound),
        other => panic!("expected Api fault, got {other:?}"),
    }
}

#[tokio::test]
async fn test_instance_databases_and_users_roundtrip() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_instance(&server, "inst-1", "instance_one").await;
    Mock::given(method("POST"))
        .and(path("/v1.0/1234/instances/inst-1/databases"))
        .and(body_json(json!({
            "name": "testdb",
            "character_set": "utf8",
            "collate": "utf8_general_ci"
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/1234/instances/inst-1/databases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "databases": [{"name": "testdb"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1.0/1234/instances/inst-1/users"))
        .and(body_json(json!({
            "users": [{"name": "test", "password": "hunter2", "databases": [{"name": "testdb"}]}]
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1.0/1234/instances/inst-1/users/test"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let dbaas = builder_for(&server).connect().await.unwrap();
    let instance = dbaas.instance("inst-1").await.unwrap();

    instance
        .create_database(DatabaseSpec::named("testdb"))
        .await
        .unwrap();
    let databases = instance.list_databases().await.unwrap();
    assert_eq!(databases.len(), 1);
    assert_eq!(databases[0].name, "testdb");

    instance
        .create_user(
            UserSpec::builder()
                .name("test")
                .password("hunter2")
                .databases(vec![DatabaseSpec::named("testdb")])
                .build(),
        )
        .await
        .unwrap();

    instance.user("test").delete().await.unwrap();
}

#[tokio::test]
async fn test_create_user_without_databases_is_rejected_locally() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_instance(&server, "inst-1", "instance_one").await;

    let dbaas = builder_for(&server).connect().await.unwrap();
    let instance = dbaas.instance("inst-1").await.unwrap();
    let err = instance
        .create_user(UserSpec::builder().name("test").password("hunter2").build())
        .await
        .unwrap_err();
    assert!(matches!(err, CloudDbError::Syntax(_)));
}

#[tokio::test]
async fn test_enable_root_and_root_enabled() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_instance(&server, "inst-1", "instance_one").await;
    Mock::given(method("POST"))
        .and(path("/v1.0/1234/instances/inst-1/root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": {"name": "root", "password": "12345"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/1234/instances/inst-1/root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rootEnabled": true})))
        .expect(1)
        .mount(&server)
        .await;

    let dbaas = builder_for(&server).connect().await.unwrap();
    let mut instance = dbaas.instance("inst-1").await.unwrap();

    let root = instance.enable_root().await.unwrap();
    assert_eq!(root.name, "root");
    assert_eq!(root.password, "12345");
    assert_eq!(instance.info().root_enabled, Some(true));

    assert!(instance.root_enabled().await.unwrap());
}

#[tokio::test]
async fn test_list_flavors_and_fetch_one() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1.0/1234/flavors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "flavors": [
                {"id": 1, "name": "m1.tiny"},
                {"id": 2, "name": "m1.small"}
            ]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1.0/1234/flavors/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "flavor": {"id": 1, "name": "m1.tiny", "ram": 512, "vcpus": 1}
        })))
        .mount(&server)
        .await;

    let dbaas = builder_for(&server).connect().await.unwrap();
    let flavors = dbaas.list_flavors().await.unwrap();
    assert_eq!(flavors.len(), 2);
    assert_eq!(flavors[0].id, "1");

    let flavor = dbaas.flavor("1").await.unwrap();
    assert_eq!(flavor.info().ram, Some(512));
}

#[tokio::test]
async fn test_resource_names_are_percent_encoded() {
    let server = MockServer::start().await;
    mount_auth(&server).await;
    mount_instance(&server, "inst-1", "instance_one").await;
    Mock::given(method("DELETE"))
        .and(path("/v1.0/1234/instances/inst-1/databases/my%20db"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let dbaas = builder_for(&server).connect().await.unwrap();
    let instance = dbaas.instance("inst-1").await.unwrap();
    instance.database("my db").delete().await.unwrap();
}
