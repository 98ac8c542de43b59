//! Plain-text rendering of the plan and of the apply results

use crate::executor::ApplySummary;
use crate::reconcile::ActionDecision;

const CREATED: &str = "✔ created";
const MISSING: &str = "✘ missing";

fn status(missing: bool) -> &'static str {
    if missing {
        MISSING
    } else {
        CREATED
    }
}

/// Table of every planned repository, sorted by GitLab path
pub fn summary_table(plan: &[ActionDecision]) -> String {
    let headers = ["GitLab repo", "GitHub repo", "Mirror"];

    let mut rows: Vec<[&str; 3]> = plan
        .iter()
        .map(|d| {
            [
                d.repo.full_name.as_str(),
                status(d.create_target_repo),
                status(d.create_mirror),
            ]
        })
        .collect();
    rows.sort();

    let mut widths = headers.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let render = |cells: [&str; 3]| -> String {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render(headers)];
    lines.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("-+-"),
    );
    lines.extend(rows.into_iter().map(render));
    lines.join("\n")
}

/// One-paragraph summary of what an apply pass did
pub fn apply_summary(summary: &ApplySummary) -> String {
    let mut out = format!(
        "GitHub repositories created: {}\nMirrors created: {}",
        summary.repos_created, summary.mirrors_created
    );
    if summary.fallbacks > 0 {
        out.push_str(&format!("\nMirrors created through API fallback: {}", summary.fallbacks));
    }
    if !summary.failures.is_empty() {
        out.push_str(&format!("\nFailed repositories: {}", summary.failures.len()));
        for (repo, error) in &summary.failures {
            out.push_str(&format!("\n  {}: {}", repo, error));
        }
    }
    out
}
