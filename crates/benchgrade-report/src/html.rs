//! HTML report-card generator.
//!
//! Produces a self-contained HTML file with all CSS inlined, one card per
//! student.

use anyhow::{Context, Result};
use std::path::Path;

use benchgrade_core::engine::PrettyAverage;
use benchgrade_core::report::{CategoryCounts, CourseReport, ReportCardSet, StudentReport};

/// Escape a string for safe HTML insertion.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn average_text(average: &Option<PrettyAverage>) -> String {
    match average {
        Some(average) => html_escape(&average.to_string()),
        None => "&mdash;".to_string(),
    }
}

fn flag_class(flagged: bool) -> &'static str {
    if flagged {
        " class=\"flag\""
    } else {
        ""
    }
}

fn percentage_text(counts: &CategoryCounts) -> String {
    match counts.percentage {
        Some(percentage) => format!("{percentage}%"),
        None => "&mdash;".to_string(),
    }
}

/// Generate an HTML document from a set of report cards.
pub fn generate_html(set: &ReportCardSet) -> String {
    let mut html = String::new();

    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    html.push_str(&format!(
        "<title>Report cards: {} {}</title>\n",
        html_escape(&set.school_year),
        html_escape(&set.marking_period)
    ));
    html.push_str("<style>\n");
    html.push_str(CSS);
    html.push_str("</style>\n");
    html.push_str("</head>\n<body>\n");

    // Header
    html.push_str("<header>\n");
    html.push_str("<h1>Report cards</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">School year: <strong>{}</strong> | Marking period: <strong>{}</strong> | As of {} | {} students | generated {}</p>\n",
        html_escape(&set.school_year),
        html_escape(&set.marking_period),
        set.for_date.format("%Y-%m-%d"),
        set.students.len(),
        set.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    html.push_str("</header>\n");

    for student in &set.students {
        html.push_str(&student_card(student));
    }

    // Raw JSON
    html.push_str("<section class=\"raw-data\">\n");
    html.push_str("<details>\n<summary>Raw JSON Data</summary>\n");
    html.push_str("<pre><code>");
    html.push_str(
        &serde_json::to_string_pretty(set)
            .unwrap_or_default()
            .replace('&', "&amp;")
            .replace('<', "&lt;")
            .replace('>', "&gt;"),
    );
    html.push_str("</code></pre>\n");
    html.push_str("</details>\n</section>\n");

    html.push_str("</body>\n</html>");
    html
}

fn student_card(student: &StudentReport) -> String {
    let mut html = String::new();
    html.push_str("<section class=\"card\">\n");
    html.push_str(&format!("<h2>{}</h2>\n", html_escape(&student.name)));
    html.push_str(&format!(
        "<p class=\"gpa\">Session GPA: <strong>{}</strong> | Cumulative GPA: <strong>{}</strong></p>\n",
        student.session_gpa, student.cumulative_gpa
    ));

    // Course summary
    html.push_str("<table class=\"summary\">\n");
    html.push_str("<thead><tr><th>Course</th><th>Department</th><th>Average</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for course in &student.courses {
        html.push_str(&format!(
            "<tr{}><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            flag_class(course.flagged),
            html_escape(&course.name),
            html_escape(course.department.as_deref().unwrap_or("")),
            average_text(&course.average),
        ));
    }
    html.push_str("</tbody></table>\n");

    for course in &student.courses {
        html.push_str(&course_detail(course));
    }

    // Totals by category
    if !student.category_counts.is_empty() {
        html.push_str("<h3>Totals by category</h3>\n");
        html.push_str("<table class=\"totals\">\n");
        html.push_str("<thead><tr><th>Category</th><th>Graded</th><th>Missing</th><th>Passing</th><th>Passing %</th></tr></thead>\n");
        html.push_str("<tbody>\n");
        for (name, counts) in &student.category_counts {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                html_escape(name),
                counts.total,
                counts.missing,
                counts.passing,
                percentage_text(counts),
            ));
        }
        html.push_str("</tbody></table>\n");
    }

    html.push_str("</section>\n");
    html
}

fn course_detail(course: &CourseReport) -> String {
    let mut html = String::new();
    html.push_str("<details class=\"course\">\n");
    html.push_str(&format!(
        "<summary>{} ({})</summary>\n",
        html_escape(&course.name),
        average_text(&course.average)
    ));
    html.push_str("<table class=\"categories\">\n");
    html.push_str("<thead><tr><th>Category</th><th>Weight</th>");
    for period in &course.marking_periods {
        html.push_str(&format!("<th>{}</th>", html_escape(period)));
    }
    html.push_str("<th>Passing</th></tr></thead>\n");
    html.push_str("<tbody>\n");
    for category in &course.categories {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}%</td>",
            html_escape(&category.name),
            category.weight_percentage
        ));
        for period in &category.periods {
            html.push_str(&format!(
                "<td{}>{} <span class=\"count\">{}/{}</span></td>",
                flag_class(period.flagged),
                average_text(&period.average),
                period.counts.passing,
                period.counts.total
            ));
        }
        html.push_str(&format!("<td>{}</td></tr>\n", percentage_text(&category.overall)));
    }
    html.push_str("</tbody></table>\n");
    html.push_str("</details>\n");
    html
}

/// Write an HTML report to a file.
pub fn write_html_report(set: &ReportCardSet, path: &Path) -> Result<()> {
    let html = generate_html(set);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, html)
        .with_context(|| format!("failed to write HTML report to {}", path.display()))?;
    Ok(())
}

const CSS: &str = r#"
:root { --bg: #fff; --fg: #1a1a1a; --border: #e5e7eb; --flag: #fde2e2; }
@media (prefers-color-scheme: dark) {
  :root { --bg: #111827; --fg: #f9fafb; --border: #374151; --flag: #7f1d1d; }
}
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', sans-serif; margin: 0; padding: 2rem; background: var(--bg); color: var(--fg); }
h1, h2 { margin-top: 2rem; }
.meta, .count { color: #6b7280; }
.card { border-top: 2px solid var(--border); page-break-after: always; }
table { border-collapse: collapse; width: 100%; margin: 1rem 0; }
th, td { border: 1px solid var(--border); padding: 0.5rem 1rem; text-align: left; }
th { background: var(--border); }
.flag { background: var(--flag); }
pre { overflow-x: auto; padding: 1rem; background: var(--border); border-radius: 8px; }
code { font-family: 'JetBrains Mono', 'Fira Code', monospace; font-size: 0.85rem; }
details { margin: 1rem 0; }
summary { cursor: pointer; font-weight: bold; }
@media print { .raw-data { display: none; } }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use benchgrade_core::gpa::Gpa;
    use benchgrade_core::report::{CategoryPeriodReport, CategoryReport};
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;

    fn make_test_set() -> ReportCardSet {
        let counts = CategoryCounts {
            total: 2,
            missing: 1,
            passing: 1,
            percentage: Some(Decimal::from(50)),
        };
        ReportCardSet {
            id: uuid::Uuid::nil(),
            created_at: chrono::Utc::now(),
            for_date: chrono::NaiveDate::from_ymd_opt(2013, 11, 15).unwrap(),
            school_year: "2013-2014".into(),
            marking_period: "Q2".into(),
            students: vec![StudentReport {
                student: 1,
                name: "Ada <Park>".into(),
                courses: vec![CourseReport {
                    course: 10,
                    name: "Algebra I".into(),
                    department: Some("Mathematics".into()),
                    average: Some(PrettyAverage::Substitution("INC".into())),
                    flagged: true,
                    marking_periods: vec!["Q1".into(), "Q2".into()],
                    categories: vec![CategoryReport {
                        category: 2,
                        name: "Engagement".into(),
                        weight_percentage: Decimal::from(30),
                        periods: vec![CategoryPeriodReport {
                            marking_period: 1,
                            name: "Q1".into(),
                            average: Some(PrettyAverage::Substitution("M".into())),
                            flagged: false,
                            counts,
                            item_groups: vec![],
                        }],
                        overall: counts,
                    }],
                }],
                category_counts: BTreeMap::from([("Engagement".to_string(), counts)]),
                session_gpa: Gpa::Value(Decimal::new(341, 2)),
                cumulative_gpa: Gpa::NotAvailable,
            }],
        }
    }

    #[test]
    fn html_report_contains_required_elements() {
        let set = make_test_set();
        let html = generate_html(&set);

        assert!(html.contains("<html"));
        assert!(html.contains("</html>"));
        assert!(html.contains("2013-2014"));
        assert!(html.contains("Algebra I"));
        assert!(html.contains("<td>M <span"));
        assert!(html.contains("3.41"));
        assert!(html.contains("N/A"));
        assert!(html.contains("class=\"flag\""));
    }

    #[test]
    fn html_flags_only_highlighted_substitutions() {
        let mut set = make_test_set();
        set.students[0].courses[0].flagged = false;
        let html = generate_html(&set);
        assert!(!html.contains("class=\"flag\""));
        assert!(html.contains("INC"));
    }

    #[test]
    fn html_escapes_names() {
        let html = generate_html(&make_test_set());
        assert!(html.contains("Ada &lt;Park&gt;"));
        assert!(!html.contains("<h2>Ada <Park></h2>"));
    }

    #[test]
    fn html_report_write_to_file() {
        let set = make_test_set();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("cards.html");

        write_html_report(&set, &path).unwrap();
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("<html"));
    }
}
