//! Typed change events for the two watched resource kinds.
//!
//! The watch stream only reports "this object now looks like X". The
//! [`SnapshotStore`] remembers the last snapshot of every object so that an
//! update carries both the old and the new version, re-lists after a watch
//! restart are turned into adds, updates and deletes, and periodic resyncs can
//! be replayed as updates whose old and new snapshots are identical.

use crds::WeblogicServer;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::{Resource, ResourceExt};
use kube_runtime::watcher;
use std::collections::{BTreeMap, BTreeSet};

/// A change to one object of kind `K`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceEvent<K> {
    Added(K),
    Updated { old: K, new: K },
    Deleted(K),
}

/// Change to a WeblogicServer.
pub type ServerEvent = ResourceEvent<WeblogicServer>;

/// Change to a StatefulSet.
pub type WorkloadEvent = ResourceEvent<StatefulSet>;

impl<K: Resource> ResourceEvent<K> {
    /// The object as it looks after this event (the last snapshot for deletes).
    pub fn object(&self) -> &K {
        match self {
            ResourceEvent::Added(obj) | ResourceEvent::Deleted(obj) => obj,
            ResourceEvent::Updated { new, .. } => new,
        }
    }

    /// True for an update whose old and new snapshots share a resource version.
    pub fn is_resync(&self) -> bool {
        match self {
            ResourceEvent::Updated { old, new } => {
                old.meta().resource_version == new.meta().resource_version
            }
            _ => false,
        }
    }
}

fn object_key<K: Resource>(obj: &K) -> String {
    format!(
        "{}/{}",
        obj.meta().namespace.as_deref().unwrap_or_default(),
        obj.name_any()
    )
}

/// Last known snapshot of every object seen on one watch stream.
#[derive(Debug)]
pub struct SnapshotStore<K> {
    objects: BTreeMap<String, K>,
    /// Keys seen since the current re-list began; `None` outside a re-list
    relisted: Option<BTreeSet<String>>,
}

impl<K> Default for SnapshotStore<K> {
    fn default() -> Self {
        Self {
            objects: BTreeMap::new(),
            relisted: None,
        }
    }
}

impl<K: Resource + Clone> SnapshotStore<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tracked objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Fold one raw watcher event into the store, returning the typed events it implies.
    pub fn apply(&mut self, event: watcher::Event<K>) -> Vec<ResourceEvent<K>> {
        match event {
            watcher::Event::Init => {
                self.relisted = Some(BTreeSet::new());
                Vec::new()
            }
            watcher::Event::InitApply(obj) => {
                if let Some(seen) = self.relisted.as_mut() {
                    seen.insert(object_key(&obj));
                }
                vec![self.upsert(obj)]
            }
            watcher::Event::InitDone => {
                let Some(seen) = self.relisted.take() else {
                    return Vec::new();
                };
                let gone: Vec<String> = self
                    .objects
                    .keys()
                    .filter(|key| !seen.contains(*key))
                    .cloned()
                    .collect();
                gone.into_iter()
                    .filter_map(|key| self.objects.remove(&key))
                    .map(ResourceEvent::Deleted)
                    .collect()
            }
            watcher::Event::Apply(obj) => vec![self.upsert(obj)],
            watcher::Event::Delete(obj) => {
                let last = self.objects.remove(&object_key(&obj)).unwrap_or(obj);
                vec![ResourceEvent::Deleted(last)]
            }
        }
    }

    /// Replay every known object as an update with identical snapshots.
    pub fn resync(&self) -> Vec<ResourceEvent<K>> {
        self.objects
            .values()
            .map(|obj| ResourceEvent::Updated {
                old: obj.clone(),
                new: obj.clone(),
            })
            .collect()
    }

    fn upsert(&mut self, obj: K) -> ResourceEvent<K> {
        match self.objects.insert(object_key(&obj), obj.clone()) {
            Some(old) => ResourceEvent::Updated { old, new: obj },
            None => ResourceEvent::Added(obj),
        }
    }
}
