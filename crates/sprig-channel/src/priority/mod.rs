//! Channel priority ranks

use indexmap::IndexMap;

/// Ordered map from channel URL to rank. Lower rank is preferred.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelPriorityMap {
    ranks: IndexMap<String, usize>,
}

impl ChannelPriorityMap {
    /// Rank channels by their position in `urls`.
    ///
    /// A channel listed twice keeps the rank of its first occurrence.
    pub fn prioritize<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut ranks = IndexMap::new();
        for url in urls {
            let url = url.as_ref().trim_end_matches('/').to_string();
            let next = ranks.len();
            ranks.entry(url).or_insert(next);
        }
        Self { ranks }
    }

    /// Rank of a channel; channels not in the map rank after every known one
    pub fn rank(&self, channel: &str) -> usize {
        self.ranks
            .get(channel.trim_end_matches('/'))
            .copied()
            .unwrap_or(self.ranks.len())
    }

    /// Whether the channel has an explicit rank
    pub fn contains(&self, channel: &str) -> bool {
        self.ranks.contains_key(channel.trim_end_matches('/'))
    }

    /// Channels in priority order
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.ranks.keys().map(String::as_str)
    }

    /// Number of distinct channels
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    /// Whether no channels are ranked
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}
