use crate::settings::ResolutionPolicy;
use crate::store::{RecordStore, StreamId, StreamRecord, now_unix};
use anyhow::Result;
use tracing::debug;
use url::Url;

/// Window in which a throttled bump is ignored.
pub const BUMP_THROTTLE_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamField {
    Name,
    Url,
    Resolution,
}

impl StreamField {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "Name",
            Self::Url => "URL",
            Self::Resolution => "Resolution",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added(StreamId),
    /// A record with the same URL already existed and was left untouched.
    Existing(StreamId),
}

impl AddOutcome {
    #[must_use]
    pub fn id(self) -> StreamId {
        match self {
            Self::Added(id) | Self::Existing(id) => id,
        }
    }
}

/// Owns every stream record plus the filtered, display-ordered view over them.
///
/// Every mutating method writes a full snapshot through the store before returning.
/// The in-memory change is kept even when that write fails; the error is handed back
/// so the caller can report it.
pub struct Registry<S: RecordStore> {
    store: S,
    streams: Vec<StreamRecord>,
    filtered: Vec<StreamId>,
    filter: String,
    max_id: StreamId,
    resolution_policy: ResolutionPolicy,
}

impl<S: RecordStore> Registry<S> {
    pub fn load(mut store: S, resolution_policy: ResolutionPolicy) -> Result<Self> {
        let mut streams = store.load()?;
        streams.sort_by(|a, b| b.seen_count.cmp(&a.seen_count));
        let max_id = streams.iter().map(|stream| stream.id).max().unwrap_or(0);

        let mut registry = Self {
            store,
            streams,
            filtered: Vec::new(),
            filter: String::new(),
            max_id,
            resolution_policy,
        };
        registry.rebuild_filtered();
        Ok(registry)
    }

    #[must_use]
    pub fn streams(&self) -> &[StreamRecord] {
        &self.streams
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    #[must_use]
    pub fn filter(&self) -> &str {
        &self.filter
    }

    #[must_use]
    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    pub fn filtered(&self) -> impl Iterator<Item = &StreamRecord> {
        self.filtered.iter().filter_map(|id| self.get(*id))
    }

    #[must_use]
    pub fn filtered_at(&self, row: usize) -> Option<&StreamRecord> {
        self.filtered.get(row).and_then(|id| self.get(*id))
    }

    #[must_use]
    pub fn filtered_position(&self, id: StreamId) -> Option<usize> {
        self.filtered.iter().position(|candidate| *candidate == id)
    }

    #[must_use]
    pub fn get(&self, id: StreamId) -> Option<&StreamRecord> {
        self.streams.iter().find(|stream| stream.id == id)
    }

    #[must_use]
    pub fn find(&self, url: &str) -> Option<&StreamRecord> {
        self.streams.iter().find(|stream| stream.url == url)
    }

    pub fn add(&mut self, name: &str, url: &str, resolution: Option<&str>) -> Result<AddOutcome> {
        if let Some(existing) = self.find(url) {
            return Ok(AddOutcome::Existing(existing.id));
        }

        self.max_id += 1;
        let id = self.max_id;
        let resolution = match resolution {
            Some(explicit) if !explicit.trim().is_empty() => explicit.to_owned(),
            _ => self.resolution_policy.resolve(url),
        };
        let record = StreamRecord {
            id,
            name: name.to_owned(),
            url: url.to_owned(),
            resolution,
            seen_count: 0,
            last_seen: 0,
        };
        debug!(id, url, resolution = %record.resolution, "stream added");

        if matches_filter(&record, &self.filter) {
            self.filtered.push(id);
        }
        self.streams.push(record);
        self.persist()?;
        Ok(AddOutcome::Added(id))
    }

    /// Returns the removed record, or `None` when `id` is not (or no longer) present.
    pub fn delete(&mut self, id: StreamId) -> Result<Option<StreamRecord>> {
        let Some(index) = self.streams.iter().position(|stream| stream.id == id) else {
            return Ok(None);
        };
        let removed = self.streams.remove(index);
        self.filtered.retain(|candidate| *candidate != id);
        self.persist()?;
        Ok(Some(removed))
    }

    pub fn edit(&mut self, id: StreamId, field: StreamField, value: &str) -> Result<bool> {
        let Some(record) = self.get_mut(id) else {
            return Ok(false);
        };
        let target = match field {
            StreamField::Name => &mut record.name,
            StreamField::Url => &mut record.url,
            StreamField::Resolution => &mut record.resolution,
        };
        value.clone_into(target);
        self.refilter_one(id);
        self.persist()?;
        Ok(true)
    }

    pub fn bump(&mut self, id: StreamId, throttle: bool) -> Result<bool> {
        self.bump_at(id, throttle, now_unix())
    }

    /// Counts one view of `id` at unix time `now`. Returns whether the counter moved.
    pub fn bump_at(&mut self, id: StreamId, throttle: bool, now: u64) -> Result<bool> {
        let Some(record) = self.get_mut(id) else {
            return Ok(false);
        };
        if throttle && now.saturating_sub(record.last_seen) < BUMP_THROTTLE_SECS {
            return Ok(false);
        }
        record.seen_count = record.seen_count.saturating_add(1);
        record.last_seen = now;
        self.persist()?;
        Ok(true)
    }

    pub fn reset_counters(&mut self, id: StreamId) -> Result<bool> {
        let Some(record) = self.get_mut(id) else {
            return Ok(false);
        };
        record.seen_count = 0;
        record.last_seen = 0;
        self.persist()?;
        Ok(true)
    }

    /// Applies a case-insensitive substring filter over name and URL; empty text clears it.
    /// Returns the number of matches.
    pub fn set_filter(&mut self, text: &str) -> usize {
        self.filter = text.trim().to_lowercase();
        self.rebuild_filtered();
        self.filtered.len()
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &S {
        &self.store
    }

    fn rebuild_filtered(&mut self) {
        let mut matches = self
            .streams
            .iter()
            .filter(|stream| matches_filter(stream, &self.filter))
            .collect::<Vec<_>>();
        matches.sort_by(|a, b| b.seen_count.cmp(&a.seen_count));
        self.filtered = matches.into_iter().map(|stream| stream.id).collect();
    }

    /// Keeps `filtered` consistent with one record's current fields without reordering the rest.
    fn refilter_one(&mut self, id: StreamId) {
        let matches = self
            .get(id)
            .is_some_and(|stream| matches_filter(stream, &self.filter));
        let listed = self.filtered.contains(&id);
        if listed && !matches {
            self.filtered.retain(|candidate| *candidate != id);
        } else if matches && !listed {
            self.filtered.push(id);
        }
    }

    fn get_mut(&mut self, id: StreamId) -> Option<&mut StreamRecord> {
        self.streams.iter_mut().find(|stream| stream.id == id)
    }

    fn persist(&mut self) -> Result<()> {
        self.store.save(&self.streams)
    }
}

/// Name offered for a new stream: the last non-empty path segment of its URL.
#[must_use]
pub fn default_stream_name(url: &str) -> Option<String> {
    let url = url.trim();
    let from_path = Url::parse(url).ok().and_then(|parsed| {
        parsed
            .path_segments()
            .and_then(|mut segments| segments.rfind(|segment| !segment.is_empty()))
            .map(str::to_owned)
    });
    from_path.or_else(|| {
        url.rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .map(str::to_owned)
    })
}

fn matches_filter(stream: &StreamRecord, filter: &str) -> bool {
    filter.is_empty()
        || stream.name.to_lowercase().contains(filter)
        || stream.url.to_lowercase().contains(filter)
}
