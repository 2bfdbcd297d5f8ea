//! Merging per-chunk topic lists into one chronological summary.

use lectio_core::models::SummaryItem;

/// Decides how the topics of consecutive transcript chunks are merged.
pub trait TopicStitcher: Send + Sync {
    /// Fold one chunk's topics into `merged`.
    ///
    /// Returns the topic to hand to the next chunk's summarization as context, if any.
    /// For the last chunk the return value is ignored.
    fn stitch(
        &self,
        merged: &mut Vec<SummaryItem>,
        chunk_topics: Vec<SummaryItem>,
        is_last: bool,
    ) -> Option<SummaryItem>;
}

/// Withholds the last topic of every non-final chunk and carries it forward, since a
/// chunk boundary usually cuts through a topic. The next chunk's summary either
/// continues it under the same title or starts fresh; either way the carried copy is
/// not emitted on its own.
///
/// The merged length is therefore `sum(topics_i - 1)` over non-final chunks plus the
/// final chunk's topic count.
#[derive(Debug, Clone, Copy, Default)]
pub struct CarryForwardStitcher;

impl TopicStitcher for CarryForwardStitcher {
    fn stitch(
        &self,
        merged: &mut Vec<SummaryItem>,
        mut chunk_topics: Vec<SummaryItem>,
        is_last: bool,
    ) -> Option<SummaryItem> {
        if is_last {
            merged.append(&mut chunk_topics);
            return None;
        }

        let carried = chunk_topics.pop();
        merged.append(&mut chunk_topics);
        carried
    }
}
