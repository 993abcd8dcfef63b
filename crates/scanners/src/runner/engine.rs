use crate::core::{AnalysisContext, Finding, Scanner, ScannerConfig};
use crate::model::ast::Program;
use crate::model::oracle::SemanticOracle;
use anyhow::Result;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

/// Runs a set of scanners over one program snapshot. A scanner failure is
/// logged and its findings dropped; the other scanners are unaffected.
pub struct ScanningEngine {
    scanners: Vec<Arc<dyn Scanner>>,
    config: ScannerConfig,
}

impl ScanningEngine {
    pub fn new(config: ScannerConfig) -> Self {
        Self {
            scanners: Vec::new(),
            config,
        }
    }

    pub fn add_scanner<S: Scanner + 'static>(mut self, scanner: S) -> Self {
        self.scanners.push(Arc::new(scanner));
        self
    }

    pub fn with_scanners(mut self, scanners: Vec<Arc<dyn Scanner>>) -> Self {
        self.scanners.extend(scanners);
        self
    }

    pub fn run(
        &self,
        program: Arc<Program>,
        oracle: Arc<dyn SemanticOracle>,
    ) -> Result<ScanReport> {
        let context = AnalysisContext::with_config(program, oracle, self.config.clone());
        Ok(ScanReport::new(self.collect(&self.scanners, &context)))
    }

    /// Like [`run`](Self::run), restricted to the named scanners. Unknown
    /// ids are ignored.
    pub fn run_scanners(
        &self,
        scanner_ids: &[&str],
        program: Arc<Program>,
        oracle: Arc<dyn SemanticOracle>,
    ) -> Result<ScanReport> {
        let context = AnalysisContext::with_config(program, oracle, self.config.clone());

        let selected: Vec<_> = self
            .scanners
            .iter()
            .filter(|s| scanner_ids.contains(&s.id()))
            .cloned()
            .collect();

        Ok(ScanReport::new(self.collect(&selected, &context)))
    }

    fn collect(&self, scanners: &[Arc<dyn Scanner>], context: &AnalysisContext) -> Vec<Finding> {
        if self.config.parallel_execution {
            scanners
                .par_iter()
                .filter_map(|scanner| match scanner.scan(context) {
                    Ok(findings) => Some(findings),
                    Err(e) => {
                        warn!(scanner = scanner.id(), error = %e, "scanner failed");
                        None
                    }
                })
                .flatten()
                .collect()
        } else {
            let mut all_findings = Vec::new();
            for scanner in scanners {
                match scanner.scan(context) {
                    Ok(findings) => all_findings.extend(findings),
                    Err(e) => warn!(scanner = scanner.id(), error = %e, "scanner failed"),
                }
            }
            all_findings
        }
    }

    pub fn list_scanners(&self) -> Vec<ScannerInfo> {
        self.scanners
            .iter()
            .map(|s| ScannerInfo {
                id: s.id().to_string(),
                name: s.name().to_string(),
                description: s.description().to_string(),
                severity: s.severity(),
                confidence: s.confidence(),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ScannerInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub severity: crate::core::Severity,
    pub confidence: crate::core::Confidence,
}

#[derive(Debug)]
pub struct ScanReport {
    findings: Vec<Finding>,
}

impl ScanReport {
    /// Orders findings deterministically regardless of scanner scheduling:
    /// highest severity first, then rule id, then the flagged node.
    pub fn new(mut findings: Vec<Finding>) -> Self {
        findings.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.scanner_id.cmp(&b.scanner_id))
                .then_with(|| {
                    let an = a.primary_location().map(|l| l.node);
                    let bn = b.primary_location().map(|l| l.node);
                    an.cmp(&bn)
                })
        });
        Self { findings }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn count_by_rule(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for finding in &self.findings {
            *counts.entry(finding.scanner_id.as_str()).or_insert(0) += 1;
        }
        counts
    }

    pub fn count_by_severity(&self) -> SeverityCount {
        let mut count = SeverityCount::default();
        for finding in &self.findings {
            match finding.severity {
                crate::core::Severity::High => count.high += 1,
                crate::core::Severity::Medium => count.medium += 1,
                crate::core::Severity::Low => count.low += 1,
                crate::core::Severity::Informational => count.informational += 1,
            }
        }
        count
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.findings)?)
    }
}

#[derive(Debug, Default)]
pub struct SeverityCount {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub informational: usize,
}
