/// Completion serving.
///
/// - **context**: What the cursor is on (identifier prefix, enclosing call)
/// - **index**: The merged in-memory catalog answering prefix and
///   signature queries
/// - **service**: Detection, loading, caching, and directory selection
pub mod context;
pub mod index;
pub mod service;
