use thiserror::Error;

/// Core engine failures.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid segment record: {0}")]
    InvalidSegment(String),
    #[error("graph has no vertices")]
    EmptyGraph,
    #[error("no path between the requested vertices")]
    NoPath,
    #[error("routing failure: {0}")]
    RoutingFailure(String),
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("invalid risk config: {0}")]
    InvalidConfig(String),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("malformed dataset: {0}")]
    MalformedDataset(#[from] serde_json::Error),
    #[error("GeoJSON error: {0}")]
    GeoJsonError(String),
}

/// Failures reported to route-query callers.
///
/// Everything that can go wrong inside a query collapses into these five
/// cases; internal errors are logged with detail and reported generically so
/// a worker never crashes on a malformed graph or a search bug.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RoutingError {
    #[error("origin is too far from the road network")]
    OriginTooFar,
    #[error("destination is too far from the road network")]
    DestinationTooFar,
    #[error("no route available between origin and destination")]
    NoRoute,
    #[error("invalid query: {0}")]
    InvalidQuery(String),
    #[error("routing failure")]
    Failure,
}
