//! Download check driver: probe every descriptor and summarize.
use crate::downloads::DownloadDescriptor;
use crate::probe::SourceProbers;
use serde::Serialize;

const PASS_GLYPH: char = '✔';
const FAIL_GLYPH: char = '✘';

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    #[serde(flatten)]
    pub download: DownloadDescriptor,
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    pub checked: usize,
    pub reachable: usize,
    pub unreachable: usize,
    /// Reachable results first, then unreachable, each in enumeration order.
    pub results: Vec<CheckResult>,
}

impl CheckReport {
    pub fn all_reachable(&self) -> bool {
        self.unreachable == 0
    }

    /// One glyph-tagged line per result followed by a summary line.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        for result in &self.results {
            let glyph = if result.reachable {
                PASS_GLYPH
            } else {
                FAIL_GLYPH
            };
            let download = &result.download;
            out.push_str(&format!(
                "{glyph} {} : {} : {} : {}",
                download.file.display(),
                download.tag,
                download.kind,
                download.reference
            ));
            if let Some(reason) = &result.reason {
                out.push_str(&format!(" ({reason})"));
            }
            out.push('\n');
        }
        out.push_str(&format!(
            "Checked {} download(s): {} reachable, {} unreachable\n",
            self.checked, self.reachable, self.unreachable
        ));
        out
    }
}

/// Probe each download once, in order, and partition the results.
pub fn run_checks(downloads: Vec<DownloadDescriptor>, probers: &SourceProbers) -> CheckReport {
    let checked = downloads.len();
    let (successes, failures): (Vec<CheckResult>, Vec<CheckResult>) = downloads
        .into_iter()
        .map(|download| {
            let probe = probers.probe(&download);
            CheckResult {
                reachable: probe.is_reachable(),
                reason: probe.reason().map(str::to_string),
                download,
            }
        })
        .partition(|result| result.reachable);
    let mut report = CheckReport {
        checked,
        reachable: successes.len(),
        unreachable: failures.len(),
        results: successes,
    };
    report.results.extend(failures);
    report
}
