//! Quiz run report as a single HTML page.
//!
//! CSS and the table-sorting script are inlined so the file can be opened
//! or attached on its own.

use anyhow::{Context, Result};
use std::path::Path;

use adaptiq_core::model::BloomLevel;
use adaptiq_core::replay::ReplayOutcome;
use adaptiq_core::report::QuizReport;
use adaptiq_core::results::BadgeLevel;
use adaptiq_core::scoring::EfficiencyRating;

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

/// Generate an HTML report from a quiz report.
pub fn generate_html(report: &QuizReport) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>adaptiq report: {}</title>\n",
        html_escape(&report.quiz.name)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    html.push_str("<header>\n");
    html.push_str("<h1>adaptiq report</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">Quiz: <strong>{}</strong> | {} questions | {} transcripts | {}</p>\n",
        html_escape(&report.quiz.name),
        report.quiz.question_count,
        report.runs.len(),
        report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    // Summary dashboard
    html.push_str("<section class=\"dashboard\">\n");
    html.push_str("<h2>Summary</h2>\n");
    html.push_str("<table class=\"summary\" id=\"summary\">\n");
    html.push_str("<thead><tr><th onclick=\"sortTable('summary', 0)\">Transcript</th><th onclick=\"sortTable('summary', 1)\">Completion</th><th onclick=\"sortTable('summary', 2)\">Score</th><th onclick=\"sortTable('summary', 3)\">Percentage</th><th onclick=\"sortTable('summary', 4)\">Badge</th><th onclick=\"sortTable('summary', 5)\">Correct</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for run in &report.runs {
        let r = &run.result;
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{:.1}</td><td>{:.1}%</td><td class=\"badge-{}\">{}</td><td>{}/{}</td></tr>\n",
            html_escape(&run.transcript_name),
            r.completion_type,
            r.final_score,
            r.percentage,
            r.badge_level,
            r.badge_level,
            r.questions_correct,
            r.questions_attempted,
        ));
    }
    html.push_str("</tbody></table>\n");

    if !report.runs.is_empty() {
        html.push_str(&generate_bar_chart(&report.runs));
    }
    html.push_str("</section>\n");

    for (i, run) in report.runs.iter().enumerate() {
        html.push_str(&generate_run_section(i, run));
    }

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(&html_escape(
        &serde_json::to_string_pretty(report).unwrap_or_default(),
    ));
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("<script>\n");
    html.push_str(JS);
    html.push_str("</script>\n");

    html.push_str("</body>\n</html>");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(report: &QuizReport, path: &Path) -> Result<()> {
    let html = generate_html(report);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

fn generate_run_section(index: usize, run: &ReplayOutcome) -> String {
    let r = &run.result;
    let mut html = String::new();

    html.push_str("<section class=\"run\">\n");
    html.push_str(&format!("<h2>{}</h2>\n", html_escape(&run.transcript_name)));
    html.push_str(&format!(
        "<p class=\"meta\">Session {} | {} | {}s total, {:.1}s per question</p>\n",
        html_escape(&run.session_id),
        r.completion_type,
        r.time_breakdown.total_time_secs,
        r.time_breakdown.average_time_per_question,
    ));

    html.push_str("<h3>Stages</h3>\n");
    html.push_str("<table>\n<thead><tr><th>Stage</th><th>Correct</th><th>Accuracy</th><th>Score</th><th>Passed</th><th>Recovery</th><th>Time</th></tr></thead>\n<tbody>\n");
    for (stage, s) in &r.stage_breakdown {
        let class = if s.passed {
            "pass"
        } else if s.attempted > 0 {
            "fail"
        } else {
            ""
        };
        html.push_str(&format!(
            "<tr class=\"{}\"><td>{}</td><td>{}/{}</td><td>{:.1}%</td><td>{:.1}</td><td>{}</td><td>{}</td><td>{}s</td></tr>\n",
            class,
            stage,
            s.correct,
            s.attempted,
            s.percentage,
            s.score,
            if s.passed { "yes" } else { "no" },
            if s.recovery_used { "used" } else { "-" },
            r.time_breakdown.time_by_stage.get(stage).copied().unwrap_or(0),
        ));
    }
    html.push_str("</tbody></table>\n");

    html.push_str("<h3>Bloom levels</h3>\n");
    html.push_str("<table>\n<thead><tr><th>Level</th><th>Correct</th><th>Score</th><th>Score %</th><th>Rating</th><th>Avg time</th></tr></thead>\n<tbody>\n");
    for (level, p) in &r.bloom_breakdown {
        if p.efficiency_rating == EfficiencyRating::NotAttempted {
            html.push_str(&format!(
                "<tr class=\"muted\"><td>{level}</td><td colspan=\"5\">not attempted</td></tr>\n"
            ));
            continue;
        }
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}/{}</td><td>{:.1}/{:.1}</td><td>{:.1}%</td><td class=\"rating-{}\">{}</td><td>{:.1}s</td></tr>\n",
            level,
            p.questions_correct,
            p.questions_attempted,
            p.actual_score,
            p.possible_score,
            p.score_percentage,
            p.efficiency_rating,
            p.efficiency_rating,
            p.avg_time_per_question,
        ));
    }
    html.push_str("</tbody></table>\n");

    let profile = &r.cognitive_profile;
    html.push_str("<h3>Cognitive profile</h3>\n<ul class=\"profile\">\n");
    html.push_str(&format!(
        "<li>Strengths: {}</li>\n<li>Growth areas: {}</li>\n<li>Complexity: {:.2}</li>\n",
        join_levels(&profile.dominant_strengths),
        join_levels(&profile.growth_areas),
        profile.cognitive_complexity,
    ));
    html.push_str("</ul>\n<ul class=\"recommendations\">\n");
    for rec in &profile.learning_recommendations {
        html.push_str(&format!("<li>{}</li>\n", html_escape(rec)));
    }
    html.push_str("</ul>\n");

    if !run.steps.is_empty() {
        let table_id = format!("steps-{index}");
        html.push_str("<details>\n<summary>Answers</summary>\n");
        html.push_str(&format!("<table id=\"{table_id}\">\n"));
        html.push_str(&format!(
            "<thead><tr><th onclick=\"sortTable('{table_id}', 0)\">#</th><th onclick=\"sortTable('{table_id}', 1)\">Question</th><th onclick=\"sortTable('{table_id}', 2)\">Stage</th><th onclick=\"sortTable('{table_id}', 3)\">Level</th><th>Answer</th><th>Points</th><th>Time</th></tr></thead>\n<tbody>\n"
        ));
        for step in &run.steps {
            let (class, text) = if step.is_correct {
                ("pass", "correct")
            } else {
                ("fail", "wrong")
            };
            html.push_str(&format!(
                "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{:.1}</td><td>{}s</td></tr>\n",
                class,
                step.index + 1,
                html_escape(&step.question_id),
                step.stage,
                step.bloom_level,
                text,
                step.points_earned,
                step.time_secs,
            ));
        }
        html.push_str("</tbody></table>\n</details>\n");
    }

    html.push_str("</section>\n");
    html
}

fn join_levels(levels: &[BloomLevel]) -> String {
    if levels.is_empty() {
        return "-".to_string();
    }
    levels
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

const CHART_ROW: usize = 26;
const CHART_GAP: usize = 8;
const CHART_LABEL: usize = 180;
const CHART_SCALE: f64 = 4.0; // px per percentage point

/// Horizontal percentage bars, one per run, coloured by badge.
fn generate_bar_chart(runs: &[ReplayOutcome]) -> String {
    let height = CHART_GAP + runs.len() * (CHART_ROW + CHART_GAP);
    let width = CHART_LABEL + (100.0 * CHART_SCALE) as usize + 64;

    let mut svg = format!(
        "<svg width=\"{width}\" height=\"{height}\" xmlns=\"http://www.w3.org/2000/svg\">\n"
    );

    for (row, run) in runs.iter().enumerate() {
        let pct = run.result.percentage.clamp(0.0, 100.0);
        let top = CHART_GAP + row * (CHART_ROW + CHART_GAP);
        let mid = top + CHART_ROW / 2;
        let bar = (pct * CHART_SCALE).round() as usize;
        let fill = match run.result.badge_level {
            BadgeLevel::Platinum => "#6366f1",
            BadgeLevel::Gold => "#f59e0b",
            BadgeLevel::Silver => "#94a3b8",
            BadgeLevel::Bronze => "#b45309",
            BadgeLevel::Participant => "#ef4444",
        };

        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{mid}\" font-size=\"13\" fill=\"currentColor\" text-anchor=\"end\" dominant-baseline=\"middle\">{}</text>\n",
            CHART_LABEL - 8,
            html_escape(&run.transcript_name)
        ));
        svg.push_str(&format!(
            "  <rect x=\"{CHART_LABEL}\" y=\"{top}\" width=\"{bar}\" height=\"{CHART_ROW}\" fill=\"{fill}\" rx=\"3\"><title>{}</title></rect>\n",
            run.result.badge_level
        ));
        svg.push_str(&format!(
            "  <text x=\"{}\" y=\"{mid}\" font-size=\"12\" fill=\"currentColor\" dominant-baseline=\"middle\">{pct:.1}%</text>\n",
            CHART_LABEL + bar + 6
        ));
    }

    svg.push_str("</svg>\n");
    svg
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --pass: #dcfce7; --fail: #fde2e2; --muted: #9ca3af; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --pass: #064e3b; --fail: #7f1d1d; --muted: #6b7280; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta { color: #6b7280; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); cursor: pointer; }
.pass { background: var(--pass); }
.fail { background: var(--fail); }
.muted { color: var(--muted); }
.badge-platinum, .badge-gold, .rating-excellent { font-weight: bold; }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
svg { margin: 1rem 0; }
"#;

const JS: &str = r#"
function sortTable(id, col) {
  const table = document.getElementById(id);
  const tbody = table.querySelector('tbody');
  const rows = Array.from(tbody.querySelectorAll('tr'));
  const asc = table.dataset.sortCol == col && table.dataset.sortDir == 'asc' ? false : true;
  rows.sort((a, b) => {
    const va = a.cells[col].textContent;
    const vb = b.cells[col].textContent;
    return asc ? va.localeCompare(vb, undefined, {numeric: true}) : vb.localeCompare(va, undefined, {numeric: true});
  });
  table.dataset.sortCol = col;
  table.dataset.sortDir = asc ? 'asc' : 'desc';
  rows.forEach(r => tbody.appendChild(r));
}
"#;
