//! Proxy search over an LD reference.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::GwasError;
use crate::ld::{validate_min_r2, LdReference, LdTag, PanelAlleles};
use crate::query::{Filter, GwasSource, QueryPlan, QueryPlanner};
use crate::rsid::{format_rsid, rsid_key, same_variant};
use crate::variants::VariantSet;
use crate::vcf::VariantRecord;

use super::align::align_proxy;
use super::{ProxyMode, ProxyOptions, ProxyResult, ResolutionState, TieBreak};

/// Canonical grouping key so `rs1` and `1` collide
fn id_key(id: &str) -> String {
    rsid_key(id).map_or_else(|| id.to_string(), format_rsid)
}

fn group_by_id(records: VariantSet) -> HashMap<String, Vec<VariantRecord>> {
    let mut groups: HashMap<String, Vec<VariantRecord>> = HashMap::new();
    for record in records.into_records() {
        if let Some(id) = record.id.as_deref() {
            groups.entry(id_key(id)).or_default().push(record);
        }
    }
    groups
}

fn compare_ids(a: &str, b: &str) -> Ordering {
    match (rsid_key(a), rsid_key(b)) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}

/// Everything needed to pick a proxy for any target, without further I/O.
///
/// Read-only once built, so targets can be resolved concurrently.
#[derive(Debug, Default)]
pub struct ProxySelector {
    candidates: HashMap<String, Vec<LdTag>>,
    records: HashMap<String, Vec<VariantRecord>>,
    alleles: HashMap<String, PanelAlleles>,
}

impl ProxySelector {
    /// Pick the first candidate present in the source whose alleles align
    pub fn select(&self, target: &str) -> ProxyResult {
        let key = id_key(target);
        let Some(tags) = self.candidates.get(&key) else {
            debug!("{}: no LD tags", target);
            return ProxyResult::unresolved(target);
        };
        let requested = self.alleles.get(&key);

        for tag in tags {
            let Some(records) = self.records.get(&id_key(&tag.tag)) else {
                continue;
            };
            let proxy = self.alleles.get(&id_key(&tag.tag));
            let aligned: Vec<VariantRecord> = records
                .iter()
                .filter_map(|r| align_proxy(r, tag, target, requested, proxy))
                .collect();
            if aligned.is_empty() {
                debug!("{}: proxy {} alleles do not match the panel", target, tag.tag);
                continue;
            }
            debug!("{}: resolved by {} (r² {:.3})", target, tag.tag, tag.r2());
            return ProxyResult {
                requested: target.to_string(),
                state: ResolutionState::Resolved,
                resolved: Some(tag.tag.clone()),
                r2: Some(tag.r2()),
                sign: Some(tag.sign()),
                records: aligned,
            };
        }

        debug!("{}: none of {} candidates present", target, tags.len());
        ProxyResult::unresolved(target)
    }
}

/// Result of resolving a batch of identifiers
#[derive(Debug, Clone, Serialize)]
pub struct ProxyOutcome {
    /// Present and resolved records, position-sorted
    #[serde(skip)]
    pub records: VariantSet,
    /// One entry per distinct requested identifier, in request order
    pub results: Vec<ProxyResult>,
}

impl ProxyOutcome {
    /// Results in a given state
    pub fn in_state(&self, state: ResolutionState) -> impl Iterator<Item = &ProxyResult> {
        self.results.iter().filter(move |r| r.state == state)
    }
}

/// Resolves identifiers to present or proxy records
pub struct ProxyResolver<'a> {
    planner: &'a QueryPlanner,
    reference: &'a dyn LdReference,
    options: ProxyOptions,
}

impl<'a> ProxyResolver<'a> {
    pub fn new(
        planner: &'a QueryPlanner,
        reference: &'a dyn LdReference,
        options: ProxyOptions,
    ) -> Self {
        Self {
            planner,
            reference,
            options,
        }
    }

    pub fn options(&self) -> &ProxyOptions {
        &self.options
    }

    /// Tags per canonical target after self-pair removal, cutoff and ordering
    fn candidates(&self, targets: &[String]) -> Result<HashMap<String, Vec<LdTag>>, GwasError> {
        let min_r2 = self.options.min_r2;
        let mut grouped: HashMap<String, Vec<LdTag>> = HashMap::new();
        for tag in self.reference.tags(targets, min_r2)? {
            if same_variant(&tag.target, &tag.tag) || tag.r2() < min_r2 {
                continue;
            }
            grouped.entry(id_key(&tag.target)).or_default().push(tag);
        }
        for tags in grouped.values_mut() {
            // stable: equal r² keep reported order unless broken by identifier
            match self.options.tie_break {
                TieBreak::ReportedOrder => tags.sort_by(|a, b| b.r2().total_cmp(&a.r2())),
                TieBreak::Identifier => tags.sort_by(|a, b| {
                    b.r2()
                        .total_cmp(&a.r2())
                        .then_with(|| compare_ids(&a.tag, &b.tag))
                }),
            }
        }
        Ok(grouped)
    }

    /// Resolve `ids` against `source`.
    ///
    /// Identifiers that cannot be resolved are reported as
    /// [`ResolutionState::Unresolved`] and contribute no records.
    pub fn resolve(&self, source: &GwasSource, ids: &[String]) -> Result<ProxyOutcome, GwasError> {
        validate_min_r2(self.options.min_r2)?;
        let clock = self.planner.budget().start();

        let mut seen = HashSet::new();
        let requested: Vec<String> = ids
            .iter()
            .filter(|id| seen.insert(id_key(id)))
            .cloned()
            .collect();

        let mut results: HashMap<String, ProxyResult> = HashMap::new();
        let searching: Vec<String> = match self.options.mode {
            ProxyMode::Yes => {
                let direct = self
                    .planner
                    .query(source, &QueryPlan::single(Filter::Ids(requested.clone())))?;
                let mut direct = group_by_id(direct);
                let mut missing = Vec::new();
                for id in &requested {
                    match direct.remove(&id_key(id)) {
                        Some(records) => {
                            results.insert(id.clone(), ProxyResult::present(id, records));
                        }
                        None => missing.push(id.clone()),
                    }
                }
                missing
            }
            ProxyMode::Only => requested.clone(),
        };
        clock.check_time()?;

        if !searching.is_empty() {
            // the reference is asked in canonical form, whatever spelling was requested
            let canonical: Vec<String> = searching.iter().map(|id| id_key(id)).collect();
            let candidates = self.candidates(&canonical)?;

            let mut tag_ids: Vec<String> = Vec::new();
            let mut seen_tags = HashSet::new();
            for tag in candidates.values().flatten() {
                if seen_tags.insert(id_key(&tag.tag)) {
                    tag_ids.push(tag.tag.clone());
                }
            }
            let records = if tag_ids.is_empty() {
                HashMap::new()
            } else {
                group_by_id(
                    self.planner
                        .query(source, &QueryPlan::single(Filter::Ids(tag_ids.clone())))?,
                )
            };
            clock.check_time()?;

            let mut alleles = HashMap::new();
            for id in canonical.iter().chain(&tag_ids) {
                if let Some(a) = self.reference.alleles(id)? {
                    alleles.insert(id_key(id), a);
                }
            }

            debug!(
                "Proxy search: {} targets, {} candidate tags, {} present in source",
                searching.len(),
                tag_ids.len(),
                records.len()
            );
            let selector = ProxySelector {
                candidates,
                records,
                alleles,
            };

            #[cfg(feature = "parallel")]
            let proxied = crate::parallel::select_proxies_parallel(&selector, &searching);
            #[cfg(not(feature = "parallel"))]
            let proxied: Vec<ProxyResult> = searching.iter().map(|t| selector.select(t)).collect();

            for result in proxied {
                results.insert(result.requested.clone(), result);
            }
        }

        let ordered: Vec<ProxyResult> = requested
            .iter()
            .filter_map(|id| results.remove(id))
            .collect();
        let records: VariantSet = ordered
            .iter()
            .flat_map(|r| r.records.iter().cloned())
            .collect();
        clock.check(records.len())?;

        let count = |state: ResolutionState| ordered.iter().filter(|r| r.state == state).count();
        info!(
            "Proxy resolution ({} mode, r² >= {}, {}): {} present, {} resolved, {} unresolved",
            self.options.mode,
            self.options.min_r2,
            self.reference.name(),
            count(ResolutionState::Present),
            count(ResolutionState::Resolved),
            count(ResolutionState::Unresolved)
        );

        Ok(ProxyOutcome {
            records,
            results: ordered,
        })
    }
}
