//! Claim-once tags shared by the workers of one generation pass.

use parking_lot::Mutex;
use rustc_hash::FxHashSet;

/// Set of tags claimed so far, e.g. one per partial type so only the
/// first fragment's worker emits the shared members.
///
/// One lock around the whole set; critical sections are a lookup and an
/// insert.
#[derive(Debug, Default)]
pub struct TagSet {
    claimed: Mutex<FxHashSet<String>>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `true` for exactly one caller per tag.
    pub fn claim(&self, tag: &str) -> bool {
        let mut claimed = self.claimed.lock();
        if claimed.contains(tag) {
            return false;
        }
        claimed.insert(tag.to_string())
    }
}
