use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use failover_tester::ControlPlaneClient;
use failover_tester::ControlPlaneConfig;
use parking_lot::Mutex;
use tokio::sync::oneshot;
use warp::http::Method;
use warp::http::Response;
use warp::path::FullPath;
use warp::Filter;

pub const PROJECT_ID: &str = "5f1b2c3d4e";
pub const CLUSTER_NAME: &str = "Cluster0";
pub const PUBLIC_KEY: &str = "public-key";
pub const PRIVATE_KEY: &str = "private-key";
pub const REALM: &str = "MMS Public API";
pub const NONCE: &str = "YWJjZGVmZ2hpams";
pub const API_PREFIX: &str = "/api/atlas/v2";

/// One request as seen by [`MockControlPlaneServer`]
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
}

/// Canned reply for an authenticated request
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub body: String,
}

impl CannedResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn status(
        status: u16,
        body: impl Into<String>,
    ) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

struct ServerState {
    secret: String,
    send_challenge: bool,
    responses: HashMap<(String, String), CannedResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Control plane stand-in that insists on MD5 digest authentication
pub struct MockControlPlaneServer {
    pub addr: SocketAddr,
    state: Arc<ServerState>,
    shutdown: Option<oneshot::Sender<()>>,
}

pub struct MockControlPlaneBuilder {
    secret: String,
    send_challenge: bool,
    responses: HashMap<(String, String), CannedResponse>,
}

impl MockControlPlaneBuilder {
    pub fn new() -> Self {
        Self {
            secret: PRIVATE_KEY.to_string(),
            send_challenge: true,
            responses: HashMap::new(),
        }
    }

    /// Reply for `method` on `path`, relative to the API prefix
    pub fn respond(
        mut self,
        method: Method,
        path: &str,
        response: CannedResponse,
    ) -> Self {
        self.responses
            .insert((method.to_string(), format!("{}{}", API_PREFIX, path)), response);
        self
    }

    /// Answer unauthenticated requests with a bare 401
    pub fn without_challenge(mut self) -> Self {
        self.send_challenge = false;
        self
    }

    pub async fn start(self) -> MockControlPlaneServer {
        let state = Arc::new(ServerState {
            secret: self.secret,
            send_challenge: self.send_challenge,
            responses: self.responses,
            requests: Mutex::new(Vec::new()),
        });

        let handler_state = state.clone();
        let route = warp::method()
            .and(warp::path::full())
            .and(warp::header::optional::<String>("authorization"))
            .map(move |method: Method, path: FullPath, authorization: Option<String>| {
                handler_state.respond(method, path.as_str(), authorization)
            });

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let (addr, server) = warp::serve(route).bind_with_graceful_shutdown(([127, 0, 0, 1], 0), async {
            shutdown_rx.await.ok();
        });
        tokio::spawn(server);

        MockControlPlaneServer {
            addr,
            state,
            shutdown: Some(shutdown_tx),
        }
    }
}

impl ServerState {
    fn respond(
        &self,
        method: Method,
        path: &str,
        authorization: Option<String>,
    ) -> Response<String> {
        self.requests.lock().push(RecordedRequest {
            method: method.to_string(),
            path: path.to_string(),
            authorization: authorization.clone(),
        });

        let authenticated = authorization
            .as_deref()
            .is_some_and(|header| verify_digest(header, method.as_str(), path, &self.secret));
        if !authenticated {
            let body = if authorization.is_some() {
                "INVALID_DIGEST"
            } else {
                "UNAUTHORIZED"
            };
            return self.challenge(body);
        }

        let canned = self
            .responses
            .get(&(method.to_string(), path.to_string()))
            .cloned()
            .unwrap_or_else(|| CannedResponse::status(404, "RESOURCE_NOT_FOUND"));
        Response::builder()
            .status(canned.status)
            .header("content-type", "application/json")
            .body(canned.body)
            .unwrap()
    }

    fn challenge(
        &self,
        body: &str,
    ) -> Response<String> {
        let mut builder = Response::builder().status(401);
        if self.send_challenge {
            builder = builder.header(
                "www-authenticate",
                format!(
                    "Digest realm=\"{}\", domain=\"\", nonce=\"{}\", algorithm=MD5, qop=\"auth\", stale=false",
                    REALM, NONCE
                ),
            );
        }
        builder.body(body.to_string()).unwrap()
    }
}

impl MockControlPlaneServer {
    pub fn base_url(&self) -> String {
        format!("http://{}{}", self.addr, API_PREFIX)
    }

    pub fn client(&self) -> ControlPlaneClient {
        self.client_with_secret(PRIVATE_KEY)
    }

    pub fn client_with_secret(
        &self,
        secret: &str,
    ) -> ControlPlaneClient {
        let config = ControlPlaneConfig {
            base_url: self.base_url(),
            public_key: PUBLIC_KEY.to_string(),
            private_key: secret.to_string(),
            project_id: PROJECT_ID.to_string(),
            cluster_name: CLUSTER_NAME.to_string(),
            ..Default::default()
        };
        ControlPlaneClient::new(&config).expect("client")
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }
}

impl Drop for MockControlPlaneServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Parameters of an `Authorization: Digest ...` header
pub fn digest_params(header: &str) -> HashMap<String, String> {
    header
        .trim_start_matches("Digest ")
        .split(", ")
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().trim_matches('"').to_string()))
        .collect()
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}

fn verify_digest(
    header: &str,
    method: &str,
    path: &str,
    secret: &str,
) -> bool {
    let params = digest_params(header);
    let field = |name: &str| params.get(name).map(String::as_str).unwrap_or_default();

    if field("username") != PUBLIC_KEY || field("realm") != REALM || field("nonce") != NONCE || field("uri") != path {
        return false;
    }

    let ha1 = md5_hex(&format!("{}:{}:{}", PUBLIC_KEY, REALM, secret));
    let ha2 = md5_hex(&format!("{}:{}", method, path));
    let expected = md5_hex(&format!(
        "{}:{}:{}:{}:{}:{}",
        ha1,
        NONCE,
        field("nc"),
        field("cnonce"),
        field("qop"),
        ha2
    ));
    field("response") == expected
}
