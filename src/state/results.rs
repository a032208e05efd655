use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use uuid::Uuid;

/// Exclusive claim on one stored result. Not `Clone`: whoever holds it is the
/// one that has to hand it back to [`ResultStore::revoke`].
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ResultHandle {
    id: Uuid,
}

impl ResultHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn url(&self) -> String {
        format!("blob:flip/{}", self.id)
    }
}

/// Keeps result payloads alive until their handle is revoked.
#[derive(Default)]
pub struct ResultStore {
    live: HashMap<Uuid, Arc<[u8]>>,
}

impl ResultStore {
    pub fn create(&mut self, bytes: Arc<[u8]>) -> ResultHandle {
        let id = Uuid::new_v4();
        self.live.insert(id, bytes);
        debug!("created result blob:flip/{}", id);
        ResultHandle { id }
    }

    pub fn resolve(&self, handle: &ResultHandle) -> Option<Arc<[u8]>> {
        self.live.get(&handle.id).cloned()
    }

    /// Returns `false` when the handle was not live.
    pub fn revoke(&mut self, handle: ResultHandle) -> bool {
        match self.live.remove(&handle.id) {
            Some(_) => {
                debug!("revoked result {}", handle.url());
                true
            }
            None => false,
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}
