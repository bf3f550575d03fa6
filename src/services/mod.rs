/// Operator announcements and the shared announcement feed.
pub mod announcement_service;
/// Cancellable handles for the node's long-running tasks.
pub mod background;
/// OpenAPI documentation generation.
pub mod documentation;
/// Periodic expiry and warning detection.
pub mod expiry_detector;
/// Expiry acknowledgements and the audio gate.
pub mod floor_service;
/// Health check service.
pub mod health_service;
/// Serialized per-node announcement playback.
pub mod playback;
/// Atomic session transfer and player-join protocols.
pub mod session_service;
/// Speech service client and local audio programs.
pub mod speech;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Follows the store's station list.
pub mod station_feed;
/// Station management and session operations behind the REST API.
pub mod station_service;
/// Storage connection supervision and degraded mode.
pub mod storage_supervisor;
