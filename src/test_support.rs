//! Test support utilities shared across unit and integration tests.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::env;
use std::ffi::OsString;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::rc::Rc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use crate::fuel::{
    Cluster, FuelApi, FuelError, NetworkConfiguration, NetworkingParameters, Node, NodeNetwork,
    OstfTest, OstfTestRun,
};
use crate::keystone::{AUTH_TOKEN_HEADER, KeystoneError};
use crate::openstack::{
    Backup, CloudApi, ComputeService, NOVA_COMPUTE_BINARY, OpenStackError, Server, ServerRequest,
    Snapshot, Volume, VolumeAttachment,
};
use crate::ssh::{CommandOutput, CommandRunner, SshError};
use crate::wait::Clock;

/// Scripted command runner that returns pre-seeded outputs in FIFO order.
///
/// Used to drive deterministic command outcomes without spawning processes.
#[derive(Clone, Debug, Default)]
pub struct ScriptedRunner {
    responses: Rc<RefCell<VecDeque<CommandOutput>>>,
    invocations: Rc<RefCell<Vec<CommandInvocation>>>,
}

/// Records a single invocation made through [`ScriptedRunner`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandInvocation {
    /// Program name as passed to the runner.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<OsString>,
    /// Extra environment variables passed to the program.
    pub env: Vec<(String, String)>,
}

impl CommandInvocation {
    /// Returns a shell-like command string for assertions.
    #[must_use]
    pub fn command_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.clone());
        parts.extend(
            self.args
                .iter()
                .map(|arg| arg.to_string_lossy().into_owned()),
        );
        parts.join(" ")
    }

    /// Returns `true` when any argument equals `needle`.
    #[must_use]
    pub fn has_arg(&self, needle: &str) -> bool {
        self.args.iter().any(|arg| arg.to_string_lossy() == needle)
    }

    /// Returns `true` for an `ssh -O exit` control request.
    #[must_use]
    pub fn is_release(&self) -> bool {
        self.has_arg("-O") && self.has_arg("exit")
    }
}

impl ScriptedRunner {
    /// Creates a new runner with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all invocations recorded so far.
    #[must_use]
    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.borrow().clone()
    }

    /// Counts recorded `ssh -O exit` requests.
    #[must_use]
    pub fn release_count(&self) -> usize {
        self.invocations
            .borrow()
            .iter()
            .filter(|call| call.is_release())
            .count()
    }

    /// Returns the number of responses not yet consumed.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.responses.borrow().len()
    }

    /// Pushes a successful exit status.
    pub fn push_success(&self) {
        self.push_output(Some(0), "", "");
    }

    /// Pushes a failing exit code with stderr text.
    pub fn push_failure(&self, code: i32) {
        self.push_output(Some(code), "", "simulated failure");
    }

    /// Pushes a successful exit status with the given stdout.
    pub fn push_stdout(&self, stdout: impl Into<String>) {
        self.push_output(Some(0), stdout, "");
    }

    /// Pushes an explicit command output response.
    pub fn push_output(
        &self,
        code: Option<i32>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) {
        self.responses.borrow_mut().push_back(CommandOutput {
            code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        });
    }

    /// Queues the three responses of a one-command session: master start,
    /// the command itself, and release.
    pub fn push_session(&self, code: i32, stdout: impl Into<String>, stderr: impl Into<String>) {
        self.push_success();
        self.push_output(Some(code), stdout, stderr);
        self.push_success();
    }
}

impl CommandRunner for ScriptedRunner {
    fn run_with_env(
        &self,
        program: &str,
        args: &[OsString],
        env: &[(&str, &str)],
    ) -> Result<CommandOutput, SshError> {
        self.invocations.borrow_mut().push(CommandInvocation {
            program: program.to_owned(),
            args: args.to_vec(),
            env: env
                .iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                .collect(),
        });
        self.responses
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| SshError::Spawn {
                program: program.to_owned(),
                message: String::from("no scripted response available"),
            })
    }
}

/// Virtual clock: `sleep` advances time instantly and is recorded.
#[derive(Clone, Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Rc<Cell<Duration>>,
    sleeps: Rc<RefCell<Vec<Duration>>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Rc::new(Cell::new(Duration::ZERO)),
            sleeps: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Virtual time passed since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }

    /// Every sleep requested so far, in order.
    #[must_use]
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.borrow().clone()
    }

    /// Moves virtual time forward without recording a sleep.
    pub fn advance(&self, duration: Duration) {
        self.elapsed.set(self.elapsed.get().saturating_add(duration));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed.get()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.borrow_mut().push(duration);
        self.advance(duration);
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets a single environment variable while holding the global mutex.
    #[must_use]
    pub fn set_var(key: &str, value: &str) -> Self {
        Self::set_vars(&[(key, value)])
    }

    /// Sets multiple environment variables while holding the global mutex.
    #[must_use]
    pub fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}

/// Produces a Fuel cluster record as returned by `/api/clusters`.
#[must_use]
pub fn json_cluster(id: u64, name: &str, mode: &str, status: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "mode": mode,
        "status": status,
        "net_provider": "neutron",
    })
}

/// Produces a Fuel node record as returned by `/api/nodes`.
#[must_use]
pub fn json_node(id: u64, fqdn: &str, ip: &str, roles: &[&str], online: bool) -> Value {
    let name = fqdn.split('.').next().unwrap_or(fqdn);
    json!({
        "id": id,
        "name": name,
        "fqdn": fqdn,
        "ip": ip,
        "roles": roles,
        "online": online,
        "status": "ready",
        "network_data": [
            { "name": "admin", "ip": format!("{ip}/24") },
            { "name": "management", "ip": format!("192.168.0.{id}/24") },
            { "name": "storage" },
        ],
    })
}

/// Produces an OSTF test run as returned by `/ostf/testruns/{id}`.
#[must_use]
pub fn json_test_run(status: &str, tests: &[(&str, &str)]) -> Value {
    let entries: Vec<Value> = tests
        .iter()
        .map(|(name, test_status)| {
            json!({
                "name": name,
                "status": test_status,
                "message": if *test_status == "success" { "" } else { "assertion failed" },
            })
        })
        .collect();
    json!({ "id": 1, "testset": "sanity", "status": status, "tests": entries })
}

/// Builds a cluster record.
#[must_use]
pub fn cluster(id: u64, mode: &str, status: &str) -> Cluster {
    Cluster {
        id,
        name: format!("env-{id}"),
        status: status.to_owned(),
        mode: mode.to_owned(),
        net_provider: String::from("neutron"),
    }
}

/// Builds a node record with admin and management addresses.
#[must_use]
pub fn node(id: u64, fqdn: &str, ip: &str, roles: &[&str], online: bool) -> Node {
    Node {
        id,
        name: fqdn.split('.').next().unwrap_or(fqdn).to_owned(),
        fqdn: fqdn.to_owned(),
        ip: ip.to_owned(),
        roles: roles.iter().map(|role| (*role).to_owned()).collect(),
        online,
        status: String::from("ready"),
        network_data: vec![
            NodeNetwork {
                name: String::from("admin"),
                ip: Some(format!("{ip}/24")),
            },
            NodeNetwork {
                name: String::from("management"),
                ip: Some(format!("192.168.0.{id}/24")),
            },
        ],
    }
}

/// Builds an OSTF run of `testset` from `(name, status)` pairs.
#[must_use]
pub fn test_run(id: u64, testset: &str, status: &str, tests: &[(&str, &str)]) -> OstfTestRun {
    OstfTestRun {
        id,
        testset: testset.to_owned(),
        status: status.to_owned(),
        tests: tests
            .iter()
            .map(|(name, test_status)| OstfTest {
                name: (*name).to_owned(),
                status: (*test_status).to_owned(),
                message: (*test_status != "success").then(|| String::from("assertion failed")),
            })
            .collect(),
    }
}

fn next_sticky<T: Clone>(queue: &RefCell<VecDeque<T>>) -> Option<T> {
    pop_sticky(&mut queue.borrow_mut())
}

fn pop_sticky<T: Clone>(items: &mut VecDeque<T>) -> Option<T> {
    if items.len() > 1 {
        items.pop_front()
    } else {
        items.front().cloned()
    }
}

/// In-memory [`FuelApi`] whose node and OSTF answers are scripted.
///
/// Queued node lists and per-run states are served in order; the last one
/// keeps being served once the queue is drained. Starting a test set hands
/// back the newest scripted run of that set.
#[derive(Clone, Debug, Default)]
pub struct StubFuelApi {
    clusters: Rc<RefCell<Vec<Cluster>>>,
    nodes: Rc<RefCell<VecDeque<Vec<Node>>>>,
    network: Rc<RefCell<NetworkConfiguration>>,
    attributes: Rc<RefCell<Value>>,
    test_runs: Rc<RefCell<BTreeMap<u64, VecDeque<OstfTestRun>>>>,
    started: Rc<RefCell<Vec<(u64, Vec<String>)>>>,
    node_queries: Rc<Cell<usize>>,
}

impl StubFuelApi {
    /// Creates an API with no clusters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the cluster list.
    pub fn set_clusters(&self, clusters: Vec<Cluster>) {
        *self.clusters.borrow_mut() = clusters;
    }

    /// Queues one answer of `nodes`.
    pub fn push_nodes(&self, nodes: Vec<Node>) {
        self.nodes.borrow_mut().push_back(nodes);
    }

    /// Sets the public VIP and segmentation type.
    pub fn set_network(&self, public_vip: Option<&str>, segmentation_type: Option<&str>) {
        *self.network.borrow_mut() = NetworkConfiguration {
            public_vip: public_vip.map(str::to_owned),
            networking_parameters: NetworkingParameters {
                segmentation_type: segmentation_type.map(str::to_owned),
            },
        };
    }

    /// Sets the raw cluster attributes.
    pub fn set_attributes(&self, attributes: Value) {
        *self.attributes.borrow_mut() = attributes;
    }

    /// Appends a state to the timeline of the run carrying `run.id`.
    pub fn push_test_run(&self, run: OstfTestRun) {
        self.test_runs
            .borrow_mut()
            .entry(run.id)
            .or_default()
            .push_back(run);
    }

    /// Test sets started so far, with their cluster id.
    #[must_use]
    pub fn started_test_sets(&self) -> Vec<(u64, Vec<String>)> {
        self.started.borrow().clone()
    }

    /// Number of node list queries served.
    #[must_use]
    pub fn node_queries(&self) -> usize {
        self.node_queries.get()
    }

    fn not_found(path: String) -> FuelError {
        FuelError::Api(KeystoneError::Status {
            method: String::from("GET"),
            url: path,
            status: 404,
            body: String::new(),
        })
    }
}

impl FuelApi for StubFuelApi {
    fn clusters(&self) -> Result<Vec<Cluster>, FuelError> {
        Ok(self.clusters.borrow().clone())
    }

    fn cluster(&self, cluster_id: u64) -> Result<Cluster, FuelError> {
        self.clusters
            .borrow()
            .iter()
            .find(|cluster| cluster.id == cluster_id)
            .cloned()
            .ok_or_else(|| Self::not_found(format!("/api/clusters/{cluster_id}")))
    }

    fn nodes(&self, _cluster_id: u64) -> Result<Vec<Node>, FuelError> {
        self.node_queries.set(self.node_queries.get() + 1);
        Ok(next_sticky(&self.nodes).unwrap_or_default())
    }

    fn network_configuration(&self, _cluster: &Cluster) -> Result<NetworkConfiguration, FuelError> {
        Ok(self.network.borrow().clone())
    }

    fn cluster_attributes(&self, _cluster_id: u64) -> Result<Value, FuelError> {
        Ok(self.attributes.borrow().clone())
    }

    fn run_test_sets(&self, cluster_id: u64, test_sets: &[&str]) -> Result<Vec<u64>, FuelError> {
        self.started.borrow_mut().push((
            cluster_id,
            test_sets.iter().map(|set| (*set).to_owned()).collect(),
        ));
        let runs = self.test_runs.borrow();
        Ok(test_sets
            .iter()
            .filter_map(|set| {
                runs.iter()
                    .rev()
                    .find(|(_, states)| states.front().is_some_and(|run| run.testset == *set))
                    .map(|(id, _)| *id)
            })
            .collect())
    }

    fn test_run(&self, run_id: u64) -> Result<OstfTestRun, FuelError> {
        self.test_runs
            .borrow_mut()
            .get_mut(&run_id)
            .and_then(pop_sticky)
            .ok_or_else(|| Self::not_found(format!("/ostf/testruns/{run_id}")))
    }
}

/// Builds a Nova server record.
#[must_use]
pub fn server(id: &str, status: &str) -> Server {
    Server {
        id: id.to_owned(),
        name: format!("vm-{id}"),
        status: status.to_owned(),
        host: Some(String::from("node-3")),
        hypervisor_hostname: Some(String::from("node-3.test.domain.local")),
    }
}

/// Builds a Cinder volume attached to each of `servers`.
#[must_use]
pub fn volume(id: &str, status: &str, servers: &[&str]) -> Volume {
    Volume {
        id: id.to_owned(),
        status: status.to_owned(),
        attachments: servers
            .iter()
            .map(|server_id| VolumeAttachment {
                server_id: (*server_id).to_owned(),
                device: Some(String::from("/dev/vdb")),
            })
            .collect(),
    }
}

/// Builds a snapshot record.
#[must_use]
pub fn snapshot(id: &str, status: &str) -> Snapshot {
    Snapshot {
        id: id.to_owned(),
        status: status.to_owned(),
        volume_id: String::from("vol-1"),
    }
}

/// Builds a backup record.
#[must_use]
pub fn backup(id: &str, status: &str) -> Backup {
    Backup {
        id: id.to_owned(),
        status: status.to_owned(),
        volume_id: String::from("vol-1"),
    }
}

/// Builds a `nova-compute` service record.
#[must_use]
pub fn compute_service(host: &str, status: &str, state: &str) -> ComputeService {
    ComputeService {
        binary: NOVA_COMPUTE_BINARY.to_owned(),
        host: host.to_owned(),
        status: status.to_owned(),
        state: state.to_owned(),
    }
}

type Timeline<T> = Rc<RefCell<HashMap<String, VecDeque<Option<T>>>>>;

fn next_in_timeline<T: Clone>(timeline: &Timeline<T>, id: &str) -> Option<T> {
    let mut states = timeline.borrow_mut();
    let queue = states.get_mut(id)?;
    if queue.len() > 1 {
        queue.pop_front().flatten()
    } else {
        queue.front().cloned().flatten()
    }
}

fn push_to_timeline<T>(timeline: &Timeline<T>, id: &str, state: Option<T>) {
    timeline
        .borrow_mut()
        .entry(id.to_owned())
        .or_default()
        .push_back(state);
}

/// In-memory [`CloudApi`] replaying scripted resource states.
///
/// Each resource id has its own timeline; `None` entries model a resource
/// that no longer exists. The last entry of a timeline keeps being served.
/// Mutating calls are recorded as `action:id` strings. A created server is
/// given its name as id.
#[derive(Clone, Debug, Default)]
pub struct StubCloud {
    servers: Timeline<Server>,
    volumes: Timeline<Volume>,
    services: Rc<RefCell<VecDeque<Vec<ComputeService>>>>,
    snapshots: Rc<RefCell<VecDeque<Vec<Snapshot>>>>,
    backups: Rc<RefCell<VecDeque<Vec<Backup>>>>,
    actions: Rc<RefCell<Vec<String>>>,
}

impl StubCloud {
    /// Creates an empty cloud.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a state to the timeline of server `id`.
    pub fn push_server(&self, id: &str, state: Option<Server>) {
        push_to_timeline(&self.servers, id, state);
    }

    /// Appends a state to the timeline of volume `id`.
    pub fn push_volume(&self, id: &str, state: Option<Volume>) {
        push_to_timeline(&self.volumes, id, state);
    }

    /// Queues one answer of `os-services`.
    pub fn push_services(&self, services: Vec<ComputeService>) {
        self.services.borrow_mut().push_back(services);
    }

    /// Queues one snapshot listing.
    pub fn push_snapshots(&self, snapshots: Vec<Snapshot>) {
        self.snapshots.borrow_mut().push_back(snapshots);
    }

    /// Queues one backup listing.
    pub fn push_backups(&self, backups: Vec<Backup>) {
        self.backups.borrow_mut().push_back(backups);
    }

    /// Mutating calls made so far.
    #[must_use]
    pub fn actions(&self) -> Vec<String> {
        self.actions.borrow().clone()
    }

    fn record(&self, action: &str, id: &str) {
        self.actions.borrow_mut().push(format!("{action}:{id}"));
    }
}

impl CloudApi for StubCloud {
    fn server(&self, server_id: &str) -> Result<Option<Server>, OpenStackError> {
        Ok(next_in_timeline(&self.servers, server_id))
    }

    fn create_server(&self, request: &ServerRequest) -> Result<String, OpenStackError> {
        self.record("create", &request.name);
        Ok(request.name.clone())
    }

    fn delete_server(&self, server_id: &str) -> Result<(), OpenStackError> {
        self.record("delete", server_id);
        Ok(())
    }

    fn force_delete_server(&self, server_id: &str) -> Result<(), OpenStackError> {
        self.record("force_delete", server_id);
        Ok(())
    }

    fn restore_server(&self, server_id: &str) -> Result<(), OpenStackError> {
        self.record("restore", server_id);
        Ok(())
    }

    fn compute_services(&self) -> Result<Vec<ComputeService>, OpenStackError> {
        Ok(next_sticky(&self.services).unwrap_or_default())
    }

    fn volume(&self, volume_id: &str) -> Result<Option<Volume>, OpenStackError> {
        Ok(next_in_timeline(&self.volumes, volume_id))
    }

    fn snapshot(&self, snapshot_id: &str) -> Result<Option<Snapshot>, OpenStackError> {
        Ok(self
            .snapshots()?
            .into_iter()
            .find(|snapshot| snapshot.id == snapshot_id))
    }

    fn snapshots(&self) -> Result<Vec<Snapshot>, OpenStackError> {
        Ok(next_sticky(&self.snapshots).unwrap_or_default())
    }

    fn backup(&self, backup_id: &str) -> Result<Option<Backup>, OpenStackError> {
        Ok(self
            .backups()?
            .into_iter()
            .find(|backup| backup.id == backup_id))
    }

    fn backups(&self) -> Result<Vec<Backup>, OpenStackError> {
        Ok(next_sticky(&self.backups).unwrap_or_default())
    }
}

/// Request captured by [`HttpStub`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: String,
    /// Request target, including any query string.
    pub path: String,
    /// Value of the Keystone token header, when sent.
    pub token: Option<String>,
    /// Raw request body.
    pub body: String,
}

impl RecordedRequest {
    /// Body parsed as JSON; `Value::Null` when empty or malformed.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap_or(Value::Null)
    }
}

type Replies = Arc<Mutex<VecDeque<(u16, String)>>>;
type Requests = Arc<Mutex<Vec<RecordedRequest>>>;

/// Loopback HTTP/1.1 server answering each connection with the next
/// scripted reply, or `500` once the script runs out.
#[derive(Debug)]
pub struct HttpStub {
    base_url: String,
    port: u16,
    replies: Replies,
    requests: Requests,
}

impl HttpStub {
    /// Binds an ephemeral loopback port and starts serving.
    ///
    /// # Errors
    ///
    /// Returns the I/O error raised while binding.
    pub fn start() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let replies = Replies::default();
        let requests = Requests::default();
        let served_replies = Arc::clone(&replies);
        let served_requests = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                if let Err(err) = serve_one(stream, &served_replies, &served_requests) {
                    tracing::debug!(error = %err, "stub connection dropped");
                }
            }
        });
        Ok(Self {
            base_url: format!("http://{addr}"),
            port: addr.port(),
            replies,
            requests,
        })
    }

    /// Base URL such as `http://127.0.0.1:40123`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Listening port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Queues a JSON reply.
    pub fn reply(&self, status: u16, body: &Value) {
        self.reply_text(status, &body.to_string());
    }

    /// Queues a reply with a raw body.
    pub fn reply_text(&self, status: u16, body: &str) {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back((status, body.to_owned()));
    }

    /// Queues a Keystone v2.0 token reply carrying `token` and `catalog`.
    pub fn reply_token(&self, token: &str, catalog: &Value) {
        self.reply(
            200,
            &json!({ "access": { "token": { "id": token }, "serviceCatalog": catalog } }),
        );
    }

    /// Requests received so far, in arrival order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn serve_one(mut stream: TcpStream, replies: &Replies, requests: &Requests) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_owned();
    let path = parts.next().unwrap_or_default().to_owned();

    let mut token = None;
    let mut length = 0_usize;
    loop {
        let mut raw = String::new();
        if reader.read_line(&mut raw)? == 0 {
            break;
        }
        let header = raw.trim_end();
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                length = value.trim().parse().unwrap_or(0);
            } else if name.eq_ignore_ascii_case(AUTH_TOKEN_HEADER) {
                token = Some(value.trim().to_owned());
            }
        }
    }
    let mut body = vec![0_u8; length];
    reader.read_exact(&mut body)?;
    requests
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(RecordedRequest {
            method,
            path,
            token,
            body: String::from_utf8_lossy(&body).into_owned(),
        });

    let (status, payload) = replies
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .pop_front()
        .unwrap_or_else(|| (500, String::from("unscripted request")));
    write!(
        stream,
        "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len()
    )?;
    stream.flush()
}
