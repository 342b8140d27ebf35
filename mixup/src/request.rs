//! Search-level request and response for grouping mixup
//!
//! A request asks for one page (`from`, `size`) of a list that is re-ranked
//! first. The retrieval layer therefore has to deliver
//! [`MixupRequest::fetch_size`] hits: enough to fill both the re-rank window
//! and the requested page.

use crate::candidate::{Candidate, Hits};
use crate::config::{GroupingMixupConfig, RerankConfig};
use crate::pager;
use crate::ranking::{DeclineRegistry, FieldResolver, GroupingReranker, RerankStats};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

fn default_size() -> usize {
    10
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixupRequest {
    #[serde(default)]
    pub from: usize,
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(alias = "mixup")]
    pub grouping_mixup: GroupingMixupConfig,
}

impl MixupRequest {
    pub fn new(grouping_mixup: GroupingMixupConfig) -> Self {
        Self {
            from: 0,
            size: default_size(),
            grouping_mixup,
        }
    }

    pub fn with_page(mut self, from: usize, size: usize) -> Self {
        self.from = from;
        self.size = size;
        self
    }

    /// Number of hits the retrieval layer must deliver for this request
    pub fn fetch_size(&self) -> usize {
        let window = usize::try_from(self.grouping_mixup.window_size.max(0)).unwrap_or(usize::MAX);
        window.max(self.from.saturating_add(self.size))
    }

    /// Reject pages whose end offset does not fit in `usize`
    pub fn validate(&self) -> Result<()> {
        match self.from.checked_add(self.size) {
            Some(_) => Ok(()),
            None => Err(Error::InvalidRequest(format!(
                "from + size overflows (from={}, size={})",
                self.from, self.size
            ))),
        }
    }

    /// Compile the mixup config and execute against `hits`.
    pub fn run(
        &self,
        hits: Hits,
        registry: &DeclineRegistry,
        resolver: &dyn FieldResolver,
    ) -> Result<MixupResponse> {
        let config = self.grouping_mixup.compile(registry)?;
        self.execute(hits, &config, resolver)
    }

    /// Re-rank `hits`, then slice the requested page when pagination is on.
    pub fn execute(
        &self,
        hits: Hits,
        config: &RerankConfig,
        resolver: &dyn FieldResolver,
    ) -> Result<MixupResponse> {
        self.validate()?;
        let Hits { total, hits: mut candidates } = hits;

        if self.size == 0 {
            return Ok(MixupResponse {
                total,
                max_score: candidates.first().map(|h| h.score),
                hits: Vec::new(),
                stats: RerankStats::default(),
            });
        }

        let stats = GroupingReranker::new(config).rerank(&mut candidates, resolver)?;
        let max_score = candidates.first().map(|h| h.score);

        let page = if config.pagination {
            pager::into_page(candidates, self.from, self.size)
        } else {
            candidates
        };
        debug!(
            "Mixup returned {} of {} hits (from={}, size={}, pagination={})",
            page.len(),
            total,
            self.from,
            self.size,
            config.pagination
        );

        Ok(MixupResponse {
            total,
            max_score,
            hits: page.into_iter().map(ScoredHit::from).collect(),
            stats,
        })
    }
}

/// One returned hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredHit {
    pub id: String,
    pub score: f32,
}

impl From<Candidate> for ScoredHit {
    fn from(candidate: Candidate) -> Self {
        Self {
            id: candidate.id,
            score: candidate.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MixupResponse {
    /// Total hit count as reported by retrieval; never reduced by paging
    pub total: u64,
    /// Best score of the re-ranked list
    pub max_score: Option<f32>,
    pub hits: Vec<ScoredHit>,
    #[serde(skip)]
    pub stats: RerankStats,
}

impl MixupResponse {
    pub fn ids(&self) -> Vec<&str> {
        self.hits.iter().map(|h| h.id.as_str()).collect()
    }
}
