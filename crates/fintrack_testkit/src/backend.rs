//! In-process fake of the fintrack REST backend.
//!
//! [`FakeBackend`] implements [`HttpClient`] directly, so a
//! [`RestEntityClient`] can be pointed at it without sockets. Records are
//! kept as JSON objects per resource. Faults, empty create bodies and
//! mid-request pauses can be injected to drive the engine's edge cases.

use fintrack_model::SyncEntity;
use fintrack_sync_engine::{HttpClient, HttpRequest, HttpResponse, Method, RestEntityClient};
use parking_lot::{Condvar, Mutex};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Base URL the fake answers on.
pub const FAKE_BASE_URL: &str = "http://fintrack.test/api";

/// A failure injected into one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// No response; surfaces as a network error.
    Network(String),
    /// A response with the given status and body.
    Status(u16, String),
}

impl Fault {
    /// A 500 with a short body.
    pub fn internal() -> Self {
        Fault::Status(500, "internal server error".into())
    }
}

/// How the backend answers a successful create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateReply {
    /// The stored record as JSON.
    #[default]
    Record,
    /// 201 with an empty body.
    Empty,
    /// 201 with a whitespace-only body.
    Whitespace,
    /// 201 with a body that is not JSON.
    Garbage,
}

#[derive(Default)]
struct BackendState {
    resources: BTreeMap<String, BTreeMap<u64, Value>>,
    next_id: u64,
    requests: Vec<HttpRequest>,
    next_faults: VecDeque<Fault>,
    indexed_faults: HashMap<usize, Fault>,
    create_reply: CreateReply,
    paused: bool,
    blocked: usize,
}

/// An in-memory REST backend.
pub struct FakeBackend {
    state: Mutex<BackendState>,
    resumed: Condvar,
    blocked: Condvar,
}

impl FakeBackend {
    /// Creates an empty backend. Ids are issued from 1.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(BackendState {
                next_id: 1,
                ..BackendState::default()
            }),
            resumed: Condvar::new(),
            blocked: Condvar::new(),
        })
    }

    /// Returns a REST client for `E` talking to this backend.
    pub fn client<E: SyncEntity>(self: &Arc<Self>) -> RestEntityClient<E, Arc<FakeBackend>> {
        RestEntityClient::new(FAKE_BASE_URL, Arc::clone(self))
    }

    /// Sets the id issued by the next create.
    pub fn set_next_id(&self, id: u64) {
        self.state.lock().next_id = id;
    }

    /// Stores `record` under `resource` as if created by another device.
    pub fn seed(&self, resource: &str, mut record: Value) -> u64 {
        let mut state = self.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        record["id"] = json!(id);
        state
            .resources
            .entry(resource.to_string())
            .or_default()
            .insert(id, record);
        id
    }

    /// Returns the stored records of `resource` in id order.
    pub fn records(&self, resource: &str) -> Vec<Value> {
        self.state
            .lock()
            .resources
            .get(resource)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns one stored record.
    pub fn record(&self, resource: &str, id: u64) -> Option<Value> {
        self.state
            .lock()
            .resources
            .get(resource)
            .and_then(|records| records.get(&id).cloned())
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state.lock().requests.clone()
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Returns `(method, path)` of every request, with the base URL removed.
    pub fn request_log(&self) -> Vec<(Method, String)> {
        self.state
            .lock()
            .requests
            .iter()
            .map(|r| (r.method, r.url.trim_start_matches(FAKE_BASE_URL).to_string()))
            .collect()
    }

    /// Sets how successful creates are answered.
    pub fn set_create_reply(&self, reply: CreateReply) {
        self.state.lock().create_reply = reply;
    }

    /// Fails the next request that has no other fault queued.
    pub fn fail_next(&self, fault: Fault) {
        self.state.lock().next_faults.push_back(fault);
    }

    /// Fails the request with the given zero-based position in the log.
    pub fn fail_request(&self, index: usize, fault: Fault) {
        self.state.lock().indexed_faults.insert(index, fault);
    }

    /// Holds every following request until [`resume`](Self::resume).
    pub fn pause(&self) {
        self.state.lock().paused = true;
    }

    /// Releases held requests.
    pub fn resume(&self) {
        self.state.lock().paused = false;
        self.resumed.notify_all();
    }

    /// Waits until at least one request is held by [`pause`](Self::pause).
    pub fn wait_until_blocked(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.blocked == 0 {
            if self.blocked.wait_until(&mut state, deadline).timed_out() {
                return state.blocked > 0;
            }
        }
        true
    }

    fn route(&self, state: &mut BackendState, request: &HttpRequest) -> HttpResponse {
        let path = request.url.trim_start_matches(FAKE_BASE_URL);
        let mut segments = path.trim_matches('/').splitn(2, '/');
        let resource = segments.next().unwrap_or_default().to_string();
        let id = match segments.next().filter(|s| !s.is_empty()) {
            None => None,
            Some(raw) => match raw.parse::<u64>() {
                Ok(id) => Some(id),
                Err(_) => return HttpResponse::new(400, "bad id"),
            },
        };

        match (request.method, id) {
            (Method::Get, None) => {
                let records: Vec<Value> = state
                    .resources
                    .get(&resource)
                    .map(|r| r.values().cloned().collect())
                    .unwrap_or_default();
                HttpResponse::new(200, Value::Array(records).to_string())
            }
            (Method::Post, None) => {
                let Some(mut record) = parse_body(request) else {
                    return HttpResponse::new(400, "malformed body");
                };
                let id = state.next_id;
                state.next_id += 1;
                record["id"] = json!(id);
                let body = record.to_string();
                state.resources.entry(resource).or_default().insert(id, record);
                match state.create_reply {
                    CreateReply::Record => HttpResponse::new(201, body),
                    CreateReply::Empty => HttpResponse::new(201, ""),
                    CreateReply::Whitespace => HttpResponse::new(201, " \n"),
                    CreateReply::Garbage => HttpResponse::new(201, "<html>created</html>"),
                }
            }
            (Method::Put, Some(id)) => {
                let Some(mut record) = parse_body(request) else {
                    return HttpResponse::new(400, "malformed body");
                };
                let Some(slot) = state.resources.get_mut(&resource).and_then(|r| r.get_mut(&id))
                else {
                    return HttpResponse::new(404, "not found");
                };
                record["id"] = json!(id);
                *slot = record;
                HttpResponse::new(200, slot.to_string())
            }
            (Method::Delete, Some(id)) => {
                match state.resources.get_mut(&resource).and_then(|r| r.remove(&id)) {
                    Some(_) => HttpResponse::new(204, ""),
                    None => HttpResponse::new(404, "not found"),
                }
            }
            _ => HttpResponse::new(405, "method not allowed"),
        }
    }
}

fn parse_body(request: &HttpRequest) -> Option<Value> {
    let body = request.body.as_deref()?;
    serde_json::from_slice::<Value>(body)
        .ok()
        .filter(Value::is_object)
}

impl HttpClient for FakeBackend {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, String> {
        let mut state = self.state.lock();
        let index = state.requests.len();
        state.requests.push(request.clone());

        if state.paused {
            state.blocked += 1;
            self.blocked.notify_all();
            while state.paused {
                self.resumed.wait(&mut state);
            }
            state.blocked -= 1;
        }

        let fault = state
            .indexed_faults
            .remove(&index)
            .or_else(|| state.next_faults.pop_front());
        match fault {
            Some(Fault::Network(message)) => Err(message),
            Some(Fault::Status(status, body)) => Ok(HttpResponse::new(status, body)),
            None => Ok(self.route(&mut state, &request)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fintrack_model::Category;
    use fintrack_sync_engine::{CreateOutcome, RemoteEntityClient, SyncError};

    #[test]
    fn create_update_delete_cycle() {
        let backend = FakeBackend::new();
        let client = backend.client::<Category>();

        let created = match client.create(&Category::expense(7, "Rent")).unwrap() {
            CreateOutcome::Created(record) => record,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(created.id, 1);
        assert_eq!(created.local_id, Some(7));

        let mut renamed = Category::expense(7, "Housing");
        renamed.remote_id = Some(created.id);
        client.update(created.id, &renamed).unwrap();
        assert_eq!(backend.record("category", 1).unwrap()["name"], "Housing");

        client.delete(created.id).unwrap();
        assert!(backend.records("category").is_empty());
        // second delete is a 404, which the client accepts
        client.delete(created.id).unwrap();

        assert_eq!(
            backend.request_log(),
            vec![
                (Method::Post, "/category/".to_string()),
                (Method::Put, "/category/1".to_string()),
                (Method::Delete, "/category/1".to_string()),
                (Method::Delete, "/category/1".to_string()),
            ]
        );
    }

    #[test]
    fn update_of_missing_record_is_404() {
        let backend = FakeBackend::new();
        let client = backend.client::<Category>();
        let err = client.update(9, &Category::expense(1, "x")).unwrap_err();
        assert!(matches!(err, SyncError::Server { status: 404, .. }));
    }

    #[test]
    fn faults_are_applied_in_order() {
        let backend = FakeBackend::new();
        let client = backend.client::<Category>();
        backend.fail_request(1, Fault::internal());
        backend.fail_next(Fault::Network("reset".into()));

        assert!(matches!(client.list(), Err(SyncError::Network(_))));
        assert!(matches!(client.list(), Err(SyncError::Server { status: 500, .. })));
        assert!(client.list().unwrap().is_empty());
    }

    #[test]
    fn seeded_records_are_listed() {
        let backend = FakeBackend::new();
        let id = backend.seed("category", json!({"name": "Food"}));
        let listed = backend.client::<Category>().list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].remote_id, Some(id));
        assert_eq!(listed[0].name, "Food");
    }

    #[test]
    fn empty_create_reply() {
        let backend = FakeBackend::new();
        backend.set_create_reply(CreateReply::Whitespace);
        let outcome = backend.client::<Category>().create(&Category::expense(1, "a")).unwrap();
        assert_eq!(outcome, CreateOutcome::EmptyBody);
        assert_eq!(backend.records("category").len(), 1);
    }

    #[test]
    fn paused_requests_wait_for_resume() {
        let backend = FakeBackend::new();
        backend.pause();

        let worker = {
            let backend = Arc::clone(&backend);
            std::thread::spawn(move || backend.client::<Category>().list().map(|v| v.len()))
        };
        assert!(backend.wait_until_blocked(Duration::from_secs(5)));
        assert!(!worker.is_finished());

        backend.resume();
        assert_eq!(worker.join().unwrap().unwrap(), 0);
    }
}
