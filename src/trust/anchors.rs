//! Trust anchors organized into named groups.
//!
//! A static group holds anchors added one at a time. A dynamic group mirrors
//! a file or a directory of base64-encoded certificates and is re-read when
//! its refresh period lapses. The same certificate may belong to several
//! groups and stays indexed until the last group holding it lets go.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use thiserror::Error;

use crate::packet::{Interest, Name};
use crate::security::Certificate;
use crate::time::Clock;
use crate::trust::cache::warn_on_implicit_digest;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnchorError {
    #[error("Cannot add static anchor to non-static anchor group `{0}`")]
    NotStaticGroup(String),

    #[error("Cannot create dynamic group, because group `{0}` already exists")]
    GroupExists(String),

    #[error("Invalid refresh period for group `{0}`")]
    InvalidRefreshPeriod(String),
}

#[derive(Debug, Clone)]
enum GroupSource {
    Static,
    Dynamic {
        path: PathBuf,
        is_directory: bool,
        refresh_period: Duration,
        expire_time: DateTime<Utc>,
    },
}

#[derive(Debug, Clone)]
pub struct TrustAnchorGroup {
    id: String,
    source: GroupSource,
    names: BTreeSet<Name>,
}

impl TrustAnchorGroup {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.source, GroupSource::Dynamic { .. })
    }

    pub fn names(&self) -> impl Iterator<Item = &Name> {
        self.names.iter()
    }
}

struct AnchorEntry {
    certificate: Certificate,
    groups: usize,
}

pub struct TrustAnchorContainer {
    groups: HashMap<String, TrustAnchorGroup>,
    anchors: BTreeMap<Name, AnchorEntry>,
    clock: Arc<dyn Clock>,
}

impl TrustAnchorContainer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        TrustAnchorContainer {
            groups: HashMap::new(),
            anchors: BTreeMap::new(),
            clock,
        }
    }

    /// Adds `certificate` to the static group `group_id`, creating the group if needed.
    pub fn insert(&mut self, group_id: &str, certificate: Certificate) -> Result<(), AnchorError> {
        let group = self
            .groups
            .entry(group_id.to_string())
            .or_insert_with(|| TrustAnchorGroup {
                id: group_id.to_string(),
                source: GroupSource::Static,
                names: BTreeSet::new(),
            });
        if group.is_dynamic() {
            return Err(AnchorError::NotStaticGroup(group_id.to_string()));
        }
        if group.names.insert(certificate.name().clone()) {
            info!("Added trust anchor {} to group `{}`", certificate.name(), group_id);
            retain(&mut self.anchors, certificate);
        }
        Ok(())
    }

    /// Creates the dynamic group `group_id` backed by `path` and loads it immediately.
    pub fn insert_from_path(
        &mut self,
        group_id: &str,
        path: &Path,
        refresh_period: std::time::Duration,
        is_directory: bool,
    ) -> Result<(), AnchorError> {
        if self.groups.contains_key(group_id) {
            return Err(AnchorError::GroupExists(group_id.to_string()));
        }
        let refresh_period = Duration::from_std(refresh_period)
            .map_err(|_| AnchorError::InvalidRefreshPeriod(group_id.to_string()))?;
        let mut group = TrustAnchorGroup {
            id: group_id.to_string(),
            source: GroupSource::Dynamic {
                path: path.to_path_buf(),
                is_directory,
                refresh_period,
                expire_time: self.clock.now(),
            },
            names: BTreeSet::new(),
        };
        reload_group(&mut group, &mut self.anchors, self.clock.now());
        self.groups.insert(group_id.to_string(), group);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.groups.clear();
        self.anchors.clear();
    }

    pub fn group(&self, group_id: &str) -> Option<&TrustAnchorGroup> {
        self.groups.get(group_id)
    }

    /// Number of distinct anchors across all groups.
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    /// First anchor whose name starts with `prefix`.
    pub fn find(&mut self, prefix: &Name) -> Option<Certificate> {
        self.refresh();
        warn_on_implicit_digest(prefix);
        self.anchors
            .range::<Name, _>((Bound::Included(prefix), Bound::Unbounded))
            .next()
            .filter(|(name, _)| prefix.is_prefix_of(name))
            .map(|(_, entry)| entry.certificate.clone())
    }

    /// First anchor under the Interest name that satisfies the Interest.
    pub fn find_interest(&mut self, interest: &Interest) -> Option<Certificate> {
        self.refresh();
        warn_on_implicit_digest(interest.name());
        self.anchors
            .range::<Name, _>((Bound::Included(interest.name()), Bound::Unbounded))
            .take_while(|(name, _)| interest.name().is_prefix_of(name))
            .find(|(_, entry)| interest.matches_data(entry.certificate.data()))
            .map(|(_, entry)| entry.certificate.clone())
    }

    /// Reloads every dynamic group whose refresh period has lapsed.
    pub fn refresh(&mut self) {
        let now = self.clock.now();
        for group in self.groups.values_mut() {
            let due = match &group.source {
                GroupSource::Dynamic { expire_time, .. } => *expire_time <= now,
                GroupSource::Static => false,
            };
            if due {
                reload_group(group, &mut self.anchors, now);
            }
        }
    }
}

fn retain(anchors: &mut BTreeMap<Name, AnchorEntry>, certificate: Certificate) {
    anchors
        .entry(certificate.name().clone())
        .and_modify(|entry| entry.groups += 1)
        .or_insert(AnchorEntry {
            certificate,
            groups: 1,
        });
}

fn release(anchors: &mut BTreeMap<Name, AnchorEntry>, name: &Name) {
    let remove = match anchors.get_mut(name) {
        Some(entry) => {
            entry.groups -= 1;
            entry.groups == 0
        }
        None => false,
    };
    if remove {
        anchors.remove(name);
    }
}

fn reload_group(
    group: &mut TrustAnchorGroup,
    anchors: &mut BTreeMap<Name, AnchorEntry>,
    now: DateTime<Utc>,
) {
    let GroupSource::Dynamic {
        path,
        is_directory,
        refresh_period,
        expire_time,
    } = &mut group.source
    else {
        return;
    };
    *expire_time = now + *refresh_period;

    let files = if *is_directory {
        match std::fs::read_dir(&*path) {
            Ok(entries) => {
                let mut files: Vec<PathBuf> = entries
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| p.is_file())
                    .collect();
                files.sort();
                files
            }
            Err(e) => {
                warn!("Cannot read anchor directory {}: {}", path.display(), e);
                Vec::new()
            }
        }
    } else {
        vec![path.clone()]
    };

    let mut loaded = BTreeMap::new();
    for file in files {
        match load_certificate(&file) {
            Ok(certificate) => {
                loaded.insert(certificate.name().clone(), certificate);
            }
            Err(e) => warn!("Skipping trust anchor file {}: {}", file.display(), e),
        }
    }

    let stale: Vec<Name> = group
        .names
        .iter()
        .filter(|name| !loaded.contains_key(*name))
        .cloned()
        .collect();
    for name in stale {
        debug!("Trust anchor {} removed from group `{}`", name, group.id);
        group.names.remove(&name);
        release(anchors, &name);
    }
    for (name, certificate) in loaded {
        if group.names.insert(name) {
            debug!("Trust anchor {} loaded into group `{}`", certificate.name(), group.id);
            retain(anchors, certificate);
        }
    }
}

fn load_certificate(path: &Path) -> Result<Certificate, String> {
    let text = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
    Certificate::from_base64(&text).map_err(|e| e.to_string())
}
