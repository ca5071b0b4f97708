//! Blob-set reconciliation across save generations
//!
//! Computes the difference between a graph's live blob references and
//! its persisted metadata, then persists new blobs and purges orphans.
//! Atomicity is by ordering, not transaction: the write phase starts
//! only after every fetch has completed.
//!
//! There is no per-graph mutual exclusion: two saves in flight for the
//! same graph id can interleave their reconciliation writes. The
//! cooperative single-threaded model makes each await point the only
//! interleaving boundary; callers that need single-writer semantics
//! must serialize their own save calls.

mod errors;
mod reconciler;

pub use errors::{ReconcileError, ReconcileResult};
pub use reconciler::{reconcile, BlobPayload, BlobRef, BlobSource, ReconcileOutcome};
