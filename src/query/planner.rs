//! Access path selection and plan execution.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::GwasError;
use crate::external::{Accelerator, Capabilities};
use crate::index::{IdentifierIndex, ThresholdIndex};
use crate::variants::VariantSet;
use crate::vcf::VariantRecord;

use super::budget::{BudgetClock, QueryBudget};
use super::plan::{AccessPath, Filter, IdMatcher, QueryPlan};
use super::source::GwasSource;

/// Records scanned between deadline checks
const SCAN_CHECK_INTERVAL: usize = 4096;

/// A collaborator plus whether the caller demanded it
struct Slot<T> {
    value: T,
    required: bool,
}

/// Result of executing a [`QueryPlan`]
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    /// Matching records in source order
    pub records: VariantSet,
    /// Access path that answered each step
    pub paths: Vec<AccessPath>,
}

/// Chooses an access path per filter and evaluates plans.
///
/// Preference order:
/// - region: ChromPos
/// - identifier: identifier index, accelerator, full scan
/// - threshold: threshold index, accelerator, full scan
///
/// A failing path falls through to the next one only if its error permits
/// fallback and the caller did not [`require`](Self::require) it.
pub struct QueryPlanner {
    accelerator: Option<Slot<Box<dyn Accelerator>>>,
    identifier_index: Option<Slot<IdentifierIndex>>,
    threshold_index: Option<Slot<ThresholdIndex>>,
    budget: QueryBudget,
}

impl std::fmt::Debug for QueryPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryPlanner")
            .field(
                "accelerator",
                &self.accelerator.as_ref().map(|s| s.value.name().to_string()),
            )
            .field(
                "identifier_index",
                &self.identifier_index.as_ref().map(|s| s.value.path()),
            )
            .field(
                "threshold_index",
                &self.threshold_index.as_ref().map(|s| s.value.path()),
            )
            .field("budget", &self.budget)
            .finish()
    }
}

impl Default for QueryPlanner {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl QueryPlanner {
    /// Planner using whatever tools `capabilities` found
    pub fn new(capabilities: &Capabilities) -> Self {
        let mut planner = Self::in_memory();
        if let Some(bcftools) = capabilities.accelerator() {
            planner.accelerator = Some(Slot {
                value: Box::new(bcftools),
                required: false,
            });
        }
        planner
    }

    /// Planner with no external collaborators or indexes
    pub fn in_memory() -> Self {
        Self {
            accelerator: None,
            identifier_index: None,
            threshold_index: None,
            budget: QueryBudget::default(),
        }
    }

    /// Use a specific accelerator
    pub fn with_accelerator(mut self, accelerator: Box<dyn Accelerator>) -> Self {
        self.accelerator = Some(Slot {
            value: accelerator,
            required: false,
        });
        self
    }

    /// Use a prebuilt identifier index
    pub fn with_identifier_index(mut self, index: IdentifierIndex) -> Self {
        self.identifier_index = Some(Slot {
            value: index,
            required: false,
        });
        self
    }

    /// Use a prebuilt threshold index
    pub fn with_threshold_index(mut self, index: ThresholdIndex) -> Self {
        self.threshold_index = Some(Slot {
            value: index,
            required: false,
        });
        self
    }

    pub fn with_budget(mut self, budget: QueryBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn budget(&self) -> QueryBudget {
        self.budget
    }

    /// Pin an access path: its failures are surfaced instead of falling back.
    ///
    /// Fails with a configuration error if the path is not available.
    pub fn require(mut self, path: AccessPath) -> Result<Self, GwasError> {
        let missing = |what: &str| {
            GwasError::configuration(format!("{} was requested but is not configured", what))
        };
        match path {
            AccessPath::IdentifierIndex => {
                self.identifier_index
                    .as_mut()
                    .ok_or_else(|| missing("identifier index"))?
                    .required = true;
            }
            AccessPath::ThresholdIndex => {
                self.threshold_index
                    .as_mut()
                    .ok_or_else(|| missing("threshold index"))?
                    .required = true;
            }
            AccessPath::Accelerator => {
                self.accelerator
                    .as_mut()
                    .ok_or_else(|| missing("accelerator"))?
                    .required = true;
            }
            AccessPath::ChromPos | AccessPath::FullScan => {}
        }
        Ok(self)
    }

    fn is_required(&self, path: AccessPath) -> bool {
        match path {
            AccessPath::IdentifierIndex => self.identifier_index.as_ref().is_some_and(|s| s.required),
            AccessPath::ThresholdIndex => self.threshold_index.as_ref().is_some_and(|s| s.required),
            AccessPath::Accelerator => self.accelerator.as_ref().is_some_and(|s| s.required),
            AccessPath::ChromPos | AccessPath::FullScan => false,
        }
    }

    /// Candidate paths for a filter applied directly to `source`, best first
    pub fn candidates(&self, source: &GwasSource, filter: &Filter) -> Vec<AccessPath> {
        let accelerator = self.accelerator.is_some() && source.path().is_some();
        let mut paths = Vec::new();
        match filter {
            Filter::Region(_) => paths.push(AccessPath::ChromPos),
            Filter::Ids(ids) => {
                // a pinned index is kept so that unkeyed ids surface as an error
                if self.identifier_index.is_some()
                    && (self.is_required(AccessPath::IdentifierIndex)
                        || !IdMatcher::new(ids).has_unkeyed())
                {
                    paths.push(AccessPath::IdentifierIndex);
                }
                if accelerator {
                    paths.push(AccessPath::Accelerator);
                }
                paths.push(AccessPath::FullScan);
            }
            Filter::Threshold(_) => {
                if self.threshold_index.is_some() {
                    paths.push(AccessPath::ThresholdIndex);
                }
                if accelerator {
                    paths.push(AccessPath::Accelerator);
                }
                paths.push(AccessPath::FullScan);
            }
        }

        // A pinned path is the only candidate
        if let Some(pinned) = paths.iter().copied().find(|p| self.is_required(*p)) {
            return vec![pinned];
        }
        paths
    }

    /// Evaluate a plan against `source`.
    ///
    /// The first step may use indexes or the accelerator; later steps
    /// narrow the previous result in memory unless a path serving the
    /// filter is pinned, in which case that path narrows it.
    pub fn execute(&self, source: &GwasSource, plan: &QueryPlan) -> Result<QueryOutcome, GwasError> {
        plan.validate()?;
        let clock = self.budget.start();

        let mut current: Option<VariantSet> = None;
        let mut paths = Vec::with_capacity(plan.steps.len());
        for filter in &plan.steps {
            let (result, path) = match &current {
                None => self.run_first(source, filter, &clock)?,
                Some(previous) => {
                    let path = self.chained_path(filter);
                    (self.run_path(source, previous, filter, path, &clock)?, path)
                }
            };
            debug!("{} filter via {}: {} records", filter.kind(), path, result.len());
            clock.check(result.len())?;
            paths.push(path);
            current = Some(result);
        }

        let records = match current {
            Some(records) => records,
            None => {
                clock.check(source.len())?;
                source.variants().clone()
            }
        };
        Ok(QueryOutcome { records, paths })
    }

    /// Convenience wrapper returning only the records
    pub fn query(&self, source: &GwasSource, plan: &QueryPlan) -> Result<VariantSet, GwasError> {
        Ok(self.execute(source, plan)?.records)
    }

    /// Path for a step that narrows an earlier result
    fn chained_path(&self, filter: &Filter) -> AccessPath {
        match filter {
            Filter::Region(_) => AccessPath::ChromPos,
            Filter::Ids(_) if self.is_required(AccessPath::IdentifierIndex) => {
                AccessPath::IdentifierIndex
            }
            Filter::Threshold(_) if self.is_required(AccessPath::ThresholdIndex) => {
                AccessPath::ThresholdIndex
            }
            _ if self.is_required(AccessPath::Accelerator) => AccessPath::Accelerator,
            _ => AccessPath::FullScan,
        }
    }

    fn run_first(
        &self,
        source: &GwasSource,
        filter: &Filter,
        clock: &BudgetClock,
    ) -> Result<(VariantSet, AccessPath), GwasError> {
        let candidates = self.candidates(source, filter);
        let last = candidates.len().saturating_sub(1);
        for (i, path) in candidates.iter().copied().enumerate() {
            info!("{} filter: using {}", filter.kind(), path);
            match self.run_path(source, source.variants(), filter, path, clock) {
                Ok(result) => return Ok((result, path)),
                Err(e) if i < last && e.is_fallback_permitted() && !self.is_required(path) => {
                    warn!("{} failed ({}); falling back to {}", path, e, candidates[i + 1]);
                }
                Err(e) => return Err(e),
            }
        }
        Err(GwasError::configuration(format!(
            "no access path for {} filter",
            filter.kind()
        )))
    }

    fn run_path(
        &self,
        source: &GwasSource,
        set: &VariantSet,
        filter: &Filter,
        path: AccessPath,
        clock: &BudgetClock,
    ) -> Result<VariantSet, GwasError> {
        match (path, filter) {
            (AccessPath::ChromPos, Filter::Region(ranges)) => set.filter_ranges(ranges),
            (AccessPath::IdentifierIndex, Filter::Ids(ids)) => match &self.identifier_index {
                Some(_) if IdMatcher::new(ids).has_unkeyed() => Err(GwasError::configuration(
                    "identifier index cannot look up identifiers that are not rs numbers",
                )),
                Some(slot) => slot.value.query(set, ids),
                None => Err(GwasError::configuration("identifier index is not configured")),
            },
            (AccessPath::ThresholdIndex, Filter::Threshold(pval)) => match &self.threshold_index {
                Some(slot) => slot.value.query(set, *pval),
                None => Err(GwasError::configuration("threshold index is not configured")),
            },
            (AccessPath::Accelerator, _) => self.run_accelerator(source, set, filter),
            (AccessPath::FullScan, _) => scan(set, filter, clock),
            (path, filter) => Err(GwasError::configuration(format!(
                "{} cannot answer a {} filter",
                path,
                filter.kind()
            ))),
        }
    }

    /// Run the accelerator over the source file and keep the records of
    /// `set` it reported that also satisfy `filter`
    fn run_accelerator(
        &self,
        source: &GwasSource,
        set: &VariantSet,
        filter: &Filter,
    ) -> Result<VariantSet, GwasError> {
        let (Some(slot), Some(path)) = (&self.accelerator, source.path()) else {
            return Err(GwasError::configuration("accelerator is not configured"));
        };
        let raw = slot.value.query(path, filter)?;
        let reported: HashSet<SiteKey> = raw.iter().map(site_key).collect();
        let records = set.retain(|r| reported.contains(&site_key(r)) && filter.matches(r));
        debug!(
            "{} returned {} records, {} after re-filtering",
            slot.value.name(),
            raw.len(),
            records.len()
        );
        Ok(records)
    }
}

/// Study, locus and alleles of a record
type SiteKey = (String, String, u64, String, String);

fn site_key(record: &VariantRecord) -> SiteKey {
    (
        record.study.clone(),
        record.chrom.clone(),
        record.pos,
        record.non_effect.clone(),
        record.effect.clone(),
    )
}

/// In-memory scan, checking the deadline periodically
fn scan(set: &VariantSet, filter: &Filter, clock: &BudgetClock) -> Result<VariantSet, GwasError> {
    let ids = match filter {
        Filter::Ids(ids) => Some(IdMatcher::new(ids)),
        _ => None,
    };
    let mut kept = Vec::new();
    for (i, record) in set.records().iter().enumerate() {
        if i % SCAN_CHECK_INTERVAL == 0 {
            clock.check_time()?;
        }
        let keep = match &ids {
            Some(matcher) => matcher.matches(record),
            None => filter.matches(record),
        };
        if keep {
            kept.push(record.clone());
        }
    }
    Ok(VariantSet::new(kept))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::GenomicRange;
    use crate::vcf::{GwasHeader, VariantRecord};
    use std::cell::Cell;
    use std::path::Path;
    use tempfile::TempDir;

    fn records() -> Vec<VariantRecord> {
        vec![
            VariantRecord::new("1", 100, Some("rs1"), "A", "G").with_stats(0.5, 0.1, 9.0),
            VariantRecord::new("1", 200, Some("rs2"), "C", "T").with_stats(0.1, 0.1, 0.5),
            VariantRecord::new("1", 300, Some("rs3"), "G", "A").with_stats(0.2, 0.05, 2.5),
            VariantRecord::new("2", 50, Some("2:50_T_C"), "T", "C").with_stats(0.3, 0.05, 4.0),
        ]
    }

    fn source() -> GwasSource {
        GwasSource::from_records(GwasHeader::default(), records())
    }

    fn ids(set: &VariantSet) -> Vec<String> {
        set.records().iter().map(|r| r.display_id()).collect()
    }

    /// Accelerator that always fails, counting calls
    struct FailingAccelerator(Cell<usize>);

    impl Accelerator for FailingAccelerator {
        fn name(&self) -> &str {
            "failing"
        }

        fn query(
            &self,
            _source: &Path,
            _filter: &Filter,
        ) -> Result<Vec<VariantRecord>, GwasError> {
            self.0.set(self.0.get() + 1);
            Err(GwasError::delegation("failing", "exit status 1"))
        }
    }

    #[test]
    fn test_region_uses_chrom_pos() {
        let planner = QueryPlanner::in_memory();
        let plan = QueryPlan::new().region(vec![GenomicRange::new("1", 150, 300).unwrap()]);
        let outcome = planner.execute(&source(), &plan).unwrap();
        assert_eq!(ids(&outcome.records), vec!["rs2", "rs3"]);
        assert_eq!(outcome.paths, vec![AccessPath::ChromPos]);
    }

    #[test]
    fn test_ids_without_index_scan() {
        let planner = QueryPlanner::in_memory();
        let plan = QueryPlan::new().ids(&["rs3", "2:50_T_C", "rs99"]);
        let outcome = planner.execute(&source(), &plan).unwrap();
        assert_eq!(ids(&outcome.records), vec!["rs3", "2:50_T_C"]);
        assert_eq!(outcome.paths, vec![AccessPath::FullScan]);
    }

    #[test]
    fn test_ids_with_index() {
        let dir = TempDir::new().unwrap();
        let recs = records();
        let index = IdentifierIndex::build(&recs, dir.path().join("x.rsidx")).unwrap();
        let planner = QueryPlanner::in_memory().with_identifier_index(index);

        let outcome = planner.execute(&source(), &QueryPlan::new().ids(&["rs1"])).unwrap();
        assert_eq!(ids(&outcome.records), vec!["rs1"]);
        assert_eq!(outcome.paths, vec![AccessPath::IdentifierIndex]);

        // identifiers without a numeric key cannot be answered by the index
        let outcome = planner
            .execute(&source(), &QueryPlan::new().ids(&["rs1", "2:50_T_C"]))
            .unwrap();
        assert_eq!(ids(&outcome.records), vec!["rs1", "2:50_T_C"]);
        assert_eq!(outcome.paths, vec![AccessPath::FullScan]);
    }

    #[test]
    fn test_pinned_identifier_index_rejects_unkeyed_ids() {
        let dir = TempDir::new().unwrap();
        let recs = records();
        let index = IdentifierIndex::build(&recs, dir.path().join("x.rsidx")).unwrap();
        let planner = QueryPlanner::in_memory()
            .with_identifier_index(index)
            .require(AccessPath::IdentifierIndex)
            .unwrap();

        let filter = Filter::Ids(vec!["rs1".to_string(), "2:50_T_C".to_string()]);
        assert_eq!(
            planner.candidates(&source(), &filter),
            vec![AccessPath::IdentifierIndex]
        );
        let err = planner
            .execute(&source(), &QueryPlan::new().ids(&["rs1", "2:50_T_C"]))
            .unwrap_err();
        assert!(matches!(err, GwasError::Configuration { .. }));
    }

    #[test]
    fn test_threshold_index_falls_back_when_not_required() {
        let dir = TempDir::new().unwrap();
        let recs = records();
        let index = ThresholdIndex::build(&recs, 0.001, dir.path().join("x.pvalidx")).unwrap();
        let planner = QueryPlanner::in_memory().with_threshold_index(index);

        let outcome = planner
            .execute(&source(), &QueryPlan::new().threshold(0.01))
            .unwrap();
        assert_eq!(ids(&outcome.records), vec!["rs1", "rs3", "2:50_T_C"]);
        assert_eq!(outcome.paths, vec![AccessPath::FullScan]);
    }

    #[test]
    fn test_threshold_index_required_surfaces_error() {
        let dir = TempDir::new().unwrap();
        let recs = records();
        let index = ThresholdIndex::build(&recs, 0.001, dir.path().join("x.pvalidx")).unwrap();
        let planner = QueryPlanner::in_memory()
            .with_threshold_index(index)
            .require(AccessPath::ThresholdIndex)
            .unwrap();

        let err = planner
            .execute(&source(), &QueryPlan::new().threshold(0.01))
            .unwrap_err();
        assert!(matches!(err, GwasError::ThresholdExceeded { .. }));
    }

    #[test]
    fn test_require_missing_path_is_configuration_error() {
        let err = QueryPlanner::in_memory()
            .require(AccessPath::Accelerator)
            .unwrap_err();
        assert!(matches!(err, GwasError::Configuration { .. }));
    }

    #[test]
    fn test_accelerator_failure_falls_back() {
        let planner =
            QueryPlanner::in_memory().with_accelerator(Box::new(FailingAccelerator(Cell::new(0))));
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gwas.vcf");
        std::fs::write(
            &path,
            "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n1\t100\trs1\tA\tG\t.\t.\t.\n",
        )
        .unwrap();
        let src = GwasSource::open(&path).unwrap();

        let outcome = planner.execute(&src, &QueryPlan::new().ids(&["rs1"])).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.paths, vec![AccessPath::FullScan]);
    }

    #[test]
    fn test_accelerator_required_surfaces_failure() {
        let planner = QueryPlanner::in_memory()
            .with_accelerator(Box::new(FailingAccelerator(Cell::new(0))))
            .require(AccessPath::Accelerator)
            .unwrap();
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gwas.vcf");
        std::fs::write(
            &path,
            "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n1\t100\trs1\tA\tG\t.\t.\t.\n",
        )
        .unwrap();
        let src = GwasSource::open(&path).unwrap();

        let err = planner.execute(&src, &QueryPlan::new().ids(&["rs1"])).unwrap_err();
        assert!(matches!(err, GwasError::Delegation { .. }));
    }

    #[test]
    fn test_accelerator_skipped_for_in_memory_source() {
        let planner =
            QueryPlanner::in_memory().with_accelerator(Box::new(FailingAccelerator(Cell::new(0))));
        let paths = planner.candidates(&source(), &Filter::Threshold(0.05));
        assert_eq!(paths, vec![AccessPath::FullScan]);
    }

    #[test]
    fn test_chained_steps_narrow_previous_result() {
        let planner = QueryPlanner::in_memory();
        let plan = QueryPlan::new()
            .region(vec![GenomicRange::chromosome("1")])
            .threshold(0.01);
        let outcome = planner.execute(&source(), &plan).unwrap();
        assert_eq!(ids(&outcome.records), vec!["rs1", "rs3"]);
        assert_eq!(outcome.paths, vec![AccessPath::ChromPos, AccessPath::FullScan]);
    }

    #[test]
    fn test_pinned_threshold_index_serves_chained_step() {
        let dir = TempDir::new().unwrap();
        let recs = records();
        let index = ThresholdIndex::build(&recs, 0.05, dir.path().join("x.pvalidx")).unwrap();
        let planner = QueryPlanner::in_memory()
            .with_threshold_index(index)
            .require(AccessPath::ThresholdIndex)
            .unwrap();
        let plan = QueryPlan::new()
            .region(vec![GenomicRange::chromosome("1")])
            .threshold(0.01);
        let outcome = planner.execute(&source(), &plan).unwrap();
        assert_eq!(ids(&outcome.records), vec!["rs1", "rs3"]);
        assert_eq!(
            outcome.paths,
            vec![AccessPath::ChromPos, AccessPath::ThresholdIndex]
        );
    }

    #[test]
    fn test_pinned_threshold_index_coverage_checked_on_chained_step() {
        let dir = TempDir::new().unwrap();
        let recs = records();
        let index = ThresholdIndex::build(&recs, 0.001, dir.path().join("x.pvalidx")).unwrap();
        let planner = QueryPlanner::in_memory()
            .with_threshold_index(index)
            .require(AccessPath::ThresholdIndex)
            .unwrap();
        let plan = QueryPlan::new()
            .region(vec![GenomicRange::chromosome("1")])
            .threshold(0.05);
        let err = planner.execute(&source(), &plan).unwrap_err();
        assert!(matches!(err, GwasError::ThresholdExceeded { .. }));
    }

    #[test]
    fn test_budget_exceeded() {
        let planner =
            QueryPlanner::in_memory().with_budget(QueryBudget::unlimited().with_max_records(1));
        let err = planner
            .execute(&source(), &QueryPlan::new().region(vec![GenomicRange::chromosome("1")]))
            .unwrap_err();
        assert!(matches!(err, GwasError::BudgetExceeded { .. }));
    }

    #[test]
    fn test_empty_plan_returns_source() {
        let planner = QueryPlanner::in_memory();
        let outcome = planner.execute(&source(), &QueryPlan::new()).unwrap();
        assert_eq!(outcome.records.len(), 4);
        assert!(outcome.paths.is_empty());
    }

    #[test]
    fn test_empty_plan_respects_record_budget() {
        let planner =
            QueryPlanner::in_memory().with_budget(QueryBudget::unlimited().with_max_records(1));
        let err = planner.execute(&source(), &QueryPlan::new()).unwrap_err();
        assert!(matches!(err, GwasError::BudgetExceeded { .. }));
    }

    #[test]
    fn test_invalid_threshold_rejected_up_front() {
        let planner = QueryPlanner::in_memory();
        let err = planner
            .execute(&source(), &QueryPlan::new().threshold(0.0))
            .unwrap_err();
        assert!(matches!(err, GwasError::InvalidArgument { .. }));
    }
}
