//! Transport-neutral request dispatcher.
//!
//! Maps each [`Request`] onto the store and shapes the outcome as a
//! [`Response`] carrying an HTTP-style status and a JSON body. Insert and update
//! bodies arrive as raw JSON and are validated here before the store sees them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use crate::error::{Error, Result};
use crate::filter::{distinct_groups, TrackerFilter};
use crate::model::{NewContact, NewLocation, NewTracker, TrackerChanges};
use crate::store::{TrackerStore, DEFAULT_HISTORY_LIMIT};

/// One caller-visible operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Request {
    /// List active trackers.
    ListTrackers,
    /// List active trackers matching search, group and status selectors.
    SearchTrackers {
        /// Free-text search over name and tracker id.
        search: Option<String>,
        /// Group name, or `all`.
        group: Option<String>,
        /// Status name, or `all`.
        status: Option<String>,
    },
    /// List the distinct groups of active trackers.
    ListGroups,
    /// Get one tracker by internal id.
    GetTracker {
        /// Internal id.
        id: i64,
    },
    /// Create a tracker from a JSON body.
    CreateTracker {
        /// Tracker fields minus `id` and `lastUpdate`.
        tracker: Value,
    },
    /// Partially update a tracker.
    UpdateTracker {
        /// Internal id.
        id: i64,
        /// Fields to change.
        changes: Value,
    },
    /// Soft-delete a tracker.
    DeleteTracker {
        /// Internal id.
        id: i64,
    },
    /// List active emergency contacts.
    ListContacts,
    /// Create an emergency contact from a JSON body.
    CreateContact {
        /// Contact fields minus `id`.
        contact: Value,
    },
    /// Location history for an external tracker id, newest first.
    LocationHistory {
        /// External tracker id.
        tracker_id: String,
        /// Maximum number of samples.
        limit: Option<usize>,
    },
    /// Record a location sample from a JSON body.
    AddLocation {
        /// Location fields minus `id` and `timestamp`.
        location: Value,
    },
    /// Dashboard counts.
    GetStats,
    /// Move a tracker and record the sample in its history.
    UpdateTrackerLocation {
        /// External tracker id.
        tracker_id: String,
        /// New latitude.
        latitude: f64,
        /// New longitude.
        longitude: f64,
        /// Optional place name.
        location_name: Option<String>,
    },
    /// Raise an SOS for a tracker.
    TriggerSos {
        /// External tracker id.
        tracker_id: String,
    },
}

impl Request {
    /// Description used in failure messages, e.g. "Failed to fetch trackers".
    #[must_use]
    pub fn operation(&self) -> &'static str {
        match self {
            Self::ListTrackers => "fetch trackers",
            Self::SearchTrackers { .. } => "search trackers",
            Self::ListGroups => "fetch groups",
            Self::GetTracker { .. } => "fetch tracker",
            Self::CreateTracker { .. } => "create tracker",
            Self::UpdateTracker { .. } => "update tracker",
            Self::DeleteTracker { .. } => "delete tracker",
            Self::ListContacts => "fetch emergency contacts",
            Self::CreateContact { .. } => "create emergency contact",
            Self::LocationHistory { .. } => "fetch location history",
            Self::AddLocation { .. } => "add location",
            Self::GetStats => "fetch statistics",
            Self::UpdateTrackerLocation { .. } => "update location",
            Self::TriggerSos { .. } => "trigger SOS alert",
        }
    }
}

/// Outcome of a request: an HTTP-style status code and a JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// 200, 201, 400, 404 or 500.
    pub status: u16,
    /// Result payload or `{"error": ...}`.
    pub body: Value,
}

impl Response {
    /// 200 with the given body.
    #[must_use]
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// 201 with the created record.
    #[must_use]
    pub fn created(body: Value) -> Self {
        Self { status: 201, body }
    }

    /// Check for a 2xx status.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Failure text of a non-2xx response, with details appended when present.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        if self.is_success() {
            return None;
        }
        let error = self.body["error"].as_str().unwrap_or("Request failed");
        Some(match self.body["details"].as_str() {
            Some(details) => format!("{error}: {details}"),
            None => error.to_string(),
        })
    }

    /// Deserialize the body of a successful response.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Request`] for a failure status, or a JSON error if the
    /// body does not have the expected shape.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T> {
        if let Some(message) = self.error_message() {
            return Err(Error::Request {
                status: self.status,
                message,
            });
        }
        Ok(serde_json::from_value(self.body)?)
    }

    fn from_error(operation: &str, err: &Error) -> Self {
        match err {
            Error::NotFound { entity, key } => {
                debug!("{} not found: {}", entity, key);
                Self {
                    status: 404,
                    body: json!({ "error": format!("{} not found", capitalize(entity)) }),
                }
            }
            Error::Validation { message } => Self {
                status: 400,
                body: json!({ "error": "Invalid data", "details": message }),
            },
            other => {
                error!("Failed to {}: {}", operation, other);
                Self {
                    status: 500,
                    body: json!({ "error": format!("Failed to {operation}") }),
                }
            }
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body).map_err(|e| Error::validation(e.to_string()))
}

/// Owns the store for the lifetime of the process and serves requests against it.
#[derive(Debug)]
pub struct Dispatcher {
    store: Box<dyn TrackerStore>,
    history_limit: usize,
}

impl Dispatcher {
    /// Create a dispatcher around an opened store.
    #[must_use]
    pub fn new(store: Box<dyn TrackerStore>) -> Self {
        Self {
            store,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Set the number of history samples returned when a request gives no limit.
    #[must_use]
    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &dyn TrackerStore {
        self.store.as_ref()
    }

    /// Serve one request. Never fails; errors become 4xx/5xx responses.
    pub fn handle(&self, request: Request) -> Response {
        let operation = request.operation();
        self.execute(request)
            .unwrap_or_else(|err| Response::from_error(operation, &err))
    }

    /// Parse a JSON-encoded request and serve it.
    pub fn handle_json(&self, line: &str) -> Response {
        match serde_json::from_str::<Request>(line) {
            Ok(request) => self.handle(request),
            Err(e) => Response {
                status: 400,
                body: json!({ "error": "Invalid request", "details": e.to_string() }),
            },
        }
    }

    fn execute(&self, request: Request) -> Result<Response> {
        let store = self.store();
        let response = match request {
            Request::ListTrackers => {
                Response::ok(serde_json::to_value(store.list_active_trackers()?)?)
            }
            Request::SearchTrackers {
                search,
                group,
                status,
            } => {
                let filter = TrackerFilter::from_params(
                    search.as_deref(),
                    group.as_deref(),
                    status.as_deref(),
                )?;
                let trackers = filter.apply(&store.list_active_trackers()?);
                Response::ok(serde_json::to_value(trackers)?)
            }
            Request::ListGroups => {
                Response::ok(serde_json::to_value(distinct_groups(&store.list_active_trackers()?))?)
            }
            Request::GetTracker { id } => {
                let tracker = store
                    .get_tracker(id)?
                    .ok_or_else(|| Error::not_found("tracker", id))?;
                Response::ok(serde_json::to_value(tracker)?)
            }
            Request::CreateTracker { tracker } => {
                let tracker: NewTracker = parse_body(tracker)?;
                tracker.validate()?;
                Response::created(serde_json::to_value(store.create_tracker(tracker)?)?)
            }
            Request::UpdateTracker { id, changes } => {
                let changes: TrackerChanges = parse_body(changes)?;
                changes.validate()?;
                Response::ok(serde_json::to_value(store.update_tracker(id, changes)?)?)
            }
            Request::DeleteTracker { id } => {
                store.delete_tracker(id)?;
                Response::ok(json!({ "success": true }))
            }
            Request::ListContacts => {
                Response::ok(serde_json::to_value(store.list_active_contacts()?)?)
            }
            Request::CreateContact { contact } => {
                let contact: NewContact = parse_body(contact)?;
                contact.validate()?;
                Response::created(serde_json::to_value(store.create_contact(contact)?)?)
            }
            Request::LocationHistory { tracker_id, limit } => {
                let history =
                    store.location_history(&tracker_id, limit.unwrap_or(self.history_limit))?;
                Response::ok(serde_json::to_value(history)?)
            }
            Request::AddLocation { location } => {
                let location: NewLocation = parse_body(location)?;
                Response::created(serde_json::to_value(store.add_location(location)?)?)
            }
            Request::GetStats => Response::ok(serde_json::to_value(store.stats()?)?),
            Request::UpdateTrackerLocation {
                tracker_id,
                latitude,
                longitude,
                location_name,
            } => {
                store.update_tracker_location(NewLocation {
                    tracker_id,
                    latitude,
                    longitude,
                    location_name,
                })?;
                Response::ok(json!({ "success": true }))
            }
            Request::TriggerSos { tracker_id } => {
                let tracker = store.trigger_sos(&tracker_id)?;
                warn!("SOS triggered for {} ({})", tracker.tracker_id, tracker.name);
                Response::ok(json!({ "success": true, "message": "SOS alert triggered" }))
            }
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::init_test_logging;
    use crate::seed::seed_if_empty;
    use crate::store::{MemoryStore, SqliteStore};

    fn dispatcher() -> Dispatcher {
        init_test_logging();
        Dispatcher::new(Box::new(MemoryStore::new()))
    }

    fn seeded() -> Dispatcher {
        let dispatcher = dispatcher();
        seed_if_empty(dispatcher.store()).unwrap();
        dispatcher
    }

    fn create_scenario_tracker(dispatcher: &Dispatcher) -> Value {
        let response = dispatcher.handle(Request::CreateTracker {
            tracker: json!({
                "trackerId": "TK-9001",
                "name": "X",
                "group": "G",
                "status": "safe",
                "lastLocation": "Gate1",
                "latitude": 1.0,
                "longitude": 1.0
            }),
        });
        assert_eq!(response.status, 201);
        response.body
    }

    #[test]
    fn test_create_tracker_scenario() {
        let dispatcher = dispatcher();
        let body = create_scenario_tracker(&dispatcher);

        assert_eq!(body["id"], 1);
        assert_eq!(body["batteryLevel"], 100);
        assert_eq!(body["isActive"], true);
        assert!(body["lastUpdate"].is_string());
    }

    #[test]
    fn test_create_tracker_missing_field_is_validation_error() {
        let dispatcher = dispatcher();
        let response = dispatcher.handle(Request::CreateTracker {
            tracker: json!({ "trackerId": "TK-1", "name": "X" }),
        });
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "Invalid data");
        assert!(response.body["details"].is_string());
        assert!(dispatcher.store().list_active_trackers().unwrap().is_empty());
    }

    #[test]
    fn test_create_tracker_bad_status_is_validation_error() {
        let dispatcher = dispatcher();
        let response = dispatcher.handle(Request::CreateTracker {
            tracker: json!({
                "trackerId": "TK-1", "name": "X", "group": "G", "status": "lost",
                "lastLocation": "L", "latitude": 0.0, "longitude": 0.0
            }),
        });
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_get_tracker_and_not_found() {
        let dispatcher = dispatcher();
        create_scenario_tracker(&dispatcher);

        let response = dispatcher.handle(Request::GetTracker { id: 1 });
        assert_eq!(response.status, 200);
        assert_eq!(response.body["trackerId"], "TK-9001");

        let response = dispatcher.handle(Request::GetTracker { id: 9999 });
        assert_eq!(response.status, 404);
        assert_eq!(response.body, json!({ "error": "Tracker not found" }));
    }

    #[test]
    fn test_delete_nonexistent_tracker() {
        let dispatcher = dispatcher();
        let response = dispatcher.handle(Request::DeleteTracker { id: 9999 });
        assert_eq!(response.status, 404);
    }

    #[test]
    fn test_delete_then_list() {
        let dispatcher = seeded();
        let response = dispatcher.handle(Request::DeleteTracker { id: 2 });
        assert_eq!(response.body, json!({ "success": true }));

        let response = dispatcher.handle(Request::ListTrackers);
        assert_eq!(response.body.as_array().unwrap().len(), 2);

        let response = dispatcher.handle(Request::GetTracker { id: 2 });
        assert_eq!(response.body["isActive"], false);
    }

    #[test]
    fn test_update_tracker_partial() {
        let dispatcher = dispatcher();
        create_scenario_tracker(&dispatcher);

        let response = dispatcher.handle(Request::UpdateTracker {
            id: 1,
            changes: json!({ "batteryLevel": 20, "status": "alert" }),
        });
        assert_eq!(response.status, 200);
        assert_eq!(response.body["batteryLevel"], 20);
        assert_eq!(response.body["status"], "alert");
        assert_eq!(response.body["name"], "X");

        let response = dispatcher.handle(Request::UpdateTracker {
            id: 42,
            changes: json!({}),
        });
        assert_eq!(response.status, 404);

        let response = dispatcher.handle(Request::UpdateTracker {
            id: 1,
            changes: json!({ "latitude": "north" }),
        });
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_sos_scenario() {
        let dispatcher = dispatcher();
        create_scenario_tracker(&dispatcher);
        let before = dispatcher.store().stats().unwrap();

        let response = dispatcher.handle(Request::TriggerSos {
            tracker_id: "TK-9001".to_string(),
        });
        assert_eq!(
            response.body,
            json!({ "success": true, "message": "SOS alert triggered" })
        );

        let tracker = dispatcher.handle(Request::GetTracker { id: 1 });
        assert_eq!(tracker.body["status"], "emergency");

        let after = dispatcher.store().stats().unwrap();
        assert_eq!(after.emergencies, before.emergencies + 1);
        assert_eq!(after.safe_locations, before.safe_locations - 1);
    }

    #[test]
    fn test_sos_unknown_tracker() {
        let dispatcher = dispatcher();
        let response = dispatcher.handle(Request::TriggerSos {
            tracker_id: "TK-0".to_string(),
        });
        assert_eq!(response.status, 404);
    }

    #[test]
    fn test_update_location_scenario() {
        let dispatcher = dispatcher();
        create_scenario_tracker(&dispatcher);

        let response = dispatcher.handle_json(concat!(
            r#"{"op":"update_tracker_location","trackerId":"TK-9001","#,
            r#""latitude":2.0,"longitude":2.0,"locationName":"Gate2"}"#,
        ));
        assert_eq!(response.body, json!({ "success": true }));

        let tracker = dispatcher.handle(Request::GetTracker { id: 1 }).body;
        assert_eq!(tracker["latitude"], 2.0);
        assert_eq!(tracker["longitude"], 2.0);
        assert_eq!(tracker["lastLocation"], "Gate2");

        let history = dispatcher
            .handle(Request::LocationHistory {
                tracker_id: "TK-9001".to_string(),
                limit: None,
            })
            .body;
        let history = history.as_array().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0]["latitude"], 2.0);
        assert_eq!(history[0]["locationName"], "Gate2");
    }

    #[test]
    fn test_location_history_uses_configured_limit() {
        let dispatcher = dispatcher().with_history_limit(2);
        for n in 0..4 {
            let response = dispatcher.handle(Request::AddLocation {
                location: json!({ "trackerId": "TK-1", "latitude": n, "longitude": n }),
            });
            assert_eq!(response.status, 201);
        }

        let response = dispatcher.handle(Request::LocationHistory {
            tracker_id: "TK-1".to_string(),
            limit: None,
        });
        assert_eq!(response.body.as_array().unwrap().len(), 2);

        let response = dispatcher.handle(Request::LocationHistory {
            tracker_id: "TK-1".to_string(),
            limit: Some(3),
        });
        assert_eq!(response.body.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_contacts() {
        let dispatcher = seeded();
        let response = dispatcher.handle(Request::CreateContact {
            contact: json!({ "name": "Lost & Found", "phone": "+91 1", "type": "security" }),
        });
        assert_eq!(response.status, 201);
        assert_eq!(response.body["id"], 4);

        let response = dispatcher.handle(Request::ListContacts);
        assert_eq!(response.body.as_array().unwrap().len(), 4);

        let response = dispatcher.handle(Request::CreateContact {
            contact: json!({ "name": "Fire", "phone": "101", "type": "fire" }),
        });
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_stats_and_groups() {
        let dispatcher = seeded();
        let response = dispatcher.handle(Request::GetStats);
        assert_eq!(
            response.body,
            json!({ "activeTrackers": 3, "safeLocations": 2, "alerts": 1, "emergencies": 0 })
        );

        let response = dispatcher.handle(Request::ListGroups);
        assert_eq!(
            response.body,
            json!(["Family A", "Family B", "Individual"])
        );
    }

    #[test]
    fn test_search_trackers() {
        let dispatcher = seeded();
        let response = dispatcher.handle_json(
            r#"{"op":"search_trackers","search":"sharma","group":"all","status":"all"}"#,
        );
        let found = response.body.as_array().unwrap().clone();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0]["trackerId"], "TK-1923");

        let response = dispatcher.handle(Request::SearchTrackers {
            search: None,
            group: None,
            status: Some("bogus".to_string()),
        });
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_malformed_request_line() {
        let dispatcher = dispatcher();
        let response = dispatcher.handle_json("{\"op\":\"launch_rockets\"}");
        assert_eq!(response.status, 400);
        assert_eq!(response.body["error"], "Invalid request");

        let response = dispatcher.handle_json("not json");
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_backend_failure_maps_to_internal_error() {
        init_test_logging();
        let db_path = std::env::temp_dir().join(format!(
            "crowdwatch_dispatch_{}.db",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&db_path);

        let store = SqliteStore::open(&db_path).unwrap();
        store
            .create_tracker(NewTracker::new("TK-1", "A", "G", "L", 0.0, 0.0))
            .unwrap();
        let dispatcher = Dispatcher::new(Box::new(store));

        // Write a status the store cannot read back.
        rusqlite::Connection::open(&db_path)
            .unwrap()
            .execute("UPDATE trackers SET status = 'lost' WHERE id = 1", [])
            .unwrap();

        let response = dispatcher.handle(Request::GetTracker { id: 1 });
        assert_eq!(response.status, 500);
        assert_eq!(response.body, json!({ "error": "Failed to fetch tracker" }));

        drop(dispatcher);
        let _ = std::fs::remove_file(&db_path);
        let _ = std::fs::remove_file(db_path.with_extension("db-wal"));
        let _ = std::fs::remove_file(db_path.with_extension("db-shm"));
    }

    #[test]
    fn test_request_type_mismatch_is_invalid_request() {
        let dispatcher = dispatcher();
        let response = dispatcher.handle_json(r#"{"op":"get_tracker","id":"one"}"#);
        assert_eq!(response.status, 400);
    }

    #[test]
    fn test_request_wire_format() {
        let request = Request::LocationHistory {
            tracker_id: "TK-1".to_string(),
            limit: Some(5),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            json!({ "op": "location_history", "trackerId": "TK-1", "limit": 5 })
        );
    }

    #[test]
    fn test_response_is_success() {
        assert!(Response::ok(Value::Null).is_success());
        assert!(Response::created(Value::Null).is_success());
        assert!(!Response::from_error("x", &Error::not_found("tracker", 1)).is_success());
    }

    #[test]
    fn test_response_error_message() {
        assert_eq!(Response::ok(Value::Null).error_message(), None);
        assert_eq!(
            Response::from_error("x", &Error::not_found("tracker", 1)).error_message(),
            Some("Tracker not found".to_string())
        );
        assert_eq!(
            Response::from_error("x", &Error::validation("name must not be empty")).error_message(),
            Some("Invalid data: name must not be empty".to_string())
        );
    }

    #[test]
    fn test_response_decode() {
        let dispatcher = seeded();
        let stats: crate::stats::TrackerStats =
            dispatcher.handle(Request::GetStats).decode().unwrap();
        assert_eq!(stats.active_trackers, 3);

        let err = dispatcher
            .handle(Request::GetTracker { id: 99 })
            .decode::<crate::model::Tracker>()
            .unwrap_err();
        assert!(matches!(err, Error::Request { status: 404, .. }));
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("tracker"), "Tracker");
        assert_eq!(capitalize(""), "");
    }
}
