// src/enrich.rs

use std::sync::Arc;
use tracing::warn;

use crate::config::CompareConfig;
use crate::db::comps::ComparablesEngine;
use crate::db::executor::SqlExecutor;
use crate::db::writer::PersistenceWriter;
use crate::domain::context::ComparisonContext;
use crate::domain::geo::GeoIdentity;
use crate::domain::listing::{ExtractedAttributes, Listing};
use crate::errors::EngineError;
use crate::extract;
use crate::geo::cache::CacheStore;
use crate::geo::geocode::Geocoder;
use crate::geo::resolver::GeoResolver;

/// Everything the downstream evaluator needs for one listing.
#[derive(Debug, Clone)]
pub struct EnrichedListing {
    pub attrs: ExtractedAttributes,
    pub geo: GeoIdentity,
    pub context: ComparisonContext,
}

/// Wires extractor -> resolver -> comparables engine into the one
/// sequential per-listing flow, and owns the post-evaluation write
/// step. Clone-cheap; clones share the executor, cache, and rate gate,
/// so concurrently processed listings still serialize remote geocodes.
#[derive(Clone)]
pub struct ListingEnricher {
    config: Arc<CompareConfig>,
    resolver: GeoResolver,
    engine: Arc<ComparablesEngine>,
    writer: Arc<PersistenceWriter>,
}

impl ListingEnricher {
    /// Validates the configuration up front; a misconfigured identifier
    /// for an enabled feature is the one hard failure in this crate.
    pub fn new(
        db: Arc<dyn SqlExecutor>,
        cache: Arc<dyn CacheStore>,
        geocoder: Option<Arc<dyn Geocoder>>,
        config: CompareConfig,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let config = Arc::new(config);
        let resolver = GeoResolver::new(
            Arc::clone(&db),
            cache,
            geocoder,
            Arc::clone(&config),
        );
        let engine = Arc::new(ComparablesEngine::new(Arc::clone(&db), Arc::clone(&config)));
        let writer = Arc::new(PersistenceWriter::new(db, Arc::clone(&config)));
        Ok(Self {
            config,
            resolver,
            engine,
            writer,
        })
    }

    /// Extraction -> resolution -> comparables. Never fails per
    /// listing; degraded sub-results surface as empty context pieces.
    pub fn enrich(&self, listing: &Listing) -> EnrichedListing {
        let attrs = extract::extract(&listing.title, &listing.description);
        let (city, state) = extract::parse_location(&listing.location);
        let text = format!("{} {}", listing.location, listing.full_text());
        let geo = self
            .resolver
            .resolve(&text, city.as_deref(), state.as_deref());
        let context = self.engine.build_context(listing, &attrs, &geo);
        EnrichedListing {
            attrs,
            geo,
            context,
        }
    }

    /// Post-evaluation persistence. Honors the acceptance gate, logs
    /// write failures, and never lets them escape the evaluation loop.
    pub fn persist_evaluated(
        &self,
        listing: &Listing,
        enriched: &EnrichedListing,
        accepted: bool,
    ) -> bool {
        if !self.writer.should_persist(accepted) {
            return false;
        }
        let mut ok = true;
        if let Err(e) = self
            .writer
            .upsert_listing(listing, &enriched.attrs, &enriched.geo)
        {
            warn!("listing upsert failed for {}: {e}", listing.id);
            ok = false;
        }
        if let Err(e) = self.writer.record_price_history(listing) {
            warn!("price history insert failed for {}: {e}", listing.id);
            ok = false;
        }
        ok
    }

    /// Text block to append to the evaluator prompt, honoring the
    /// configured output format. None when suppressed or empty.
    pub fn summary(&self, enriched: &EnrichedListing) -> Option<String> {
        enriched.context.summary(self.config.output_format)
    }

    pub fn writer(&self) -> &PersistenceWriter {
        &self.writer
    }
}
