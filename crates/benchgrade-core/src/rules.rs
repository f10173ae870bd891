//! Calculation rules: year-scoped weights, scales and substitutions.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{GradebookError, Result};
use crate::model::{CategoryId, DepartmentId, Gradebook, RuleId, SchoolYearId};

/// Configuration of benchmark grading, effective from a school year onward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationRule {
    pub id: RuleId,
    pub first_year_effective: SchoolYearId,
    /// Point scale that per-course category aggregates are normalized against.
    #[serde(default = "default_points_possible")]
    pub points_possible: Decimal,
    /// Decimal places shown for averages.
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
    #[serde(default)]
    pub per_course_categories: Vec<PerCourseCategory>,
    #[serde(default)]
    pub categories_as_courses: Vec<CategoryAsCourse>,
    #[serde(default)]
    pub substitutions: Vec<Substitution>,
}

fn default_points_possible() -> Decimal {
    Decimal::from(4)
}

fn default_decimal_places() -> u32 {
    2
}

/// A weighted category feeding the course average.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerCourseCategory {
    pub category: CategoryId,
    pub weight: Decimal,
    #[serde(default)]
    pub apply_to_departments: Vec<DepartmentId>,
}

/// A category scored across courses as if it were a course itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryAsCourse {
    pub category: CategoryId,
    #[serde(default)]
    pub include_departments: Vec<DepartmentId>,
}

/// Comparison used to decide whether a substitution applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
}

impl Operator {
    pub fn compare(self, value: Decimal, against: Decimal) -> bool {
        match self {
            Operator::Equal => value == against,
            Operator::NotEqual => value != against,
            Operator::Less => value < against,
            Operator::LessOrEqual => value <= against,
            Operator::Greater => value > against,
            Operator::GreaterOrEqual => value >= against,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Equal => "==",
            Operator::NotEqual => "!=",
            Operator::Less => "<",
            Operator::LessOrEqual => "<=",
            Operator::Greater => ">",
            Operator::GreaterOrEqual => ">=",
        };
        f.write_str(symbol)
    }
}

/// Replaces a numeric value with a display code and/or another number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Substitution {
    pub operator: Operator,
    pub match_value: Decimal,
    #[serde(default)]
    pub display_as: Option<String>,
    #[serde(default)]
    pub calculate_as: Option<Decimal>,
    /// Empty applies to every department.
    #[serde(default)]
    pub apply_to_departments: Vec<DepartmentId>,
    /// Empty applies to every category.
    #[serde(default)]
    pub apply_to_categories: Vec<CategoryId>,
    #[serde(default)]
    pub flag_visually: bool,
}

impl Substitution {
    pub fn applies_to(&self, value: Decimal) -> bool {
        self.operator.compare(value, self.match_value)
    }

    fn covers(&self, department: Option<DepartmentId>, category: Option<CategoryId>) -> bool {
        let department_ok = match department {
            Some(d) => self.apply_to_departments.is_empty() || self.apply_to_departments.contains(&d),
            None => true,
        };
        let category_ok = match category {
            Some(c) => self.apply_to_categories.is_empty() || self.apply_to_categories.contains(&c),
            None => self.apply_to_categories.is_empty(),
        };
        department_ok && category_ok
    }
}

/// Outcome of running a value through the substitution table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Substituted {
    pub calculate_as: Decimal,
    pub display_as: Option<String>,
}

/// Department matching for rule entries: a course without a department only
/// matches entries that name no departments.
fn department_listed(list: &[DepartmentId], department: Option<DepartmentId>) -> bool {
    match department {
        Some(d) => list.contains(&d),
        None => list.is_empty(),
    }
}

impl CalculationRule {
    /// Run a value through the substitution table. The first substitution
    /// that covers the department/category and matches the value wins.
    pub fn substitute(
        &self,
        department: Option<DepartmentId>,
        category: Option<CategoryId>,
        value: Decimal,
    ) -> Substituted {
        let matched = self
            .substitutions
            .iter()
            .filter(|s| s.covers(department, category))
            .find(|s| s.applies_to(value));

        match matched {
            Some(s) => Substituted {
                calculate_as: s.calculate_as.unwrap_or(value),
                display_as: s.display_as.clone().filter(|text| !text.is_empty()),
            },
            None => Substituted {
                calculate_as: value,
                display_as: None,
            },
        }
    }

    /// Whether a substitution displaying `text` asks to be highlighted.
    pub fn flags_visually(&self, text: &str) -> bool {
        self.substitutions
            .iter()
            .any(|s| s.flag_visually && s.display_as.as_deref() == Some(text))
    }

    /// Weighted categories that feed the average of a course in `department`.
    pub fn per_course_categories_for(
        &self,
        department: Option<DepartmentId>,
    ) -> impl Iterator<Item = &PerCourseCategory> {
        self.per_course_categories
            .iter()
            .filter(move |entry| department_listed(&entry.apply_to_departments, department))
    }

    pub fn per_course_category(
        &self,
        category: CategoryId,
        department: Option<DepartmentId>,
    ) -> Option<&PerCourseCategory> {
        self.per_course_categories_for(department)
            .find(|entry| entry.category == category)
    }

    pub fn category_as_course(&self, category: CategoryId) -> Option<&CategoryAsCourse> {
        self.categories_as_courses
            .iter()
            .find(|entry| entry.category == category)
    }

    /// Whether marks in `category` feed the overall course score.
    pub fn feeds_course(&self, category: CategoryId, department: Option<DepartmentId>) -> bool {
        self.per_course_category(category, department).is_some()
    }

    /// Whether marks in `category` feed a category-as-course aggregate.
    pub fn feeds_category_as_course(
        &self,
        category: CategoryId,
        department: Option<DepartmentId>,
    ) -> bool {
        self.categories_as_courses.iter().any(|entry| {
            entry.category == category && department_listed(&entry.include_departments, department)
        })
    }
}

impl Gradebook {
    /// The calculation rule in effect for a school year.
    ///
    /// A rule effective exactly from this year wins; otherwise the most
    /// recent rule effective from an earlier year applies.
    pub fn find_calculation_rule(&self, school_year: SchoolYearId) -> Result<&CalculationRule> {
        let year = self.school_year(school_year)?;

        if let Some(rule) = self
            .rules()
            .iter()
            .find(|rule| rule.first_year_effective == year.id)
        {
            return Ok(rule);
        }

        self.rules()
            .iter()
            .filter_map(|rule| {
                self.school_year(rule.first_year_effective)
                    .ok()
                    .filter(|effective| effective.start_date < year.start_date)
                    .map(|effective| (effective.start_date, rule))
            })
            .max_by_key(|(start, _)| *start)
            .map(|(_, rule)| rule)
            .ok_or_else(|| GradebookError::NoApplicableRule(year.name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SchoolYear;
    use crate::testing::{d, sample_gradebook};
    use chrono::NaiveDate;

    fn year(id: SchoolYearId, start: &str) -> SchoolYear {
        let start_date: NaiveDate = start.parse().unwrap();
        SchoolYear {
            id,
            name: format!("year-{id}"),
            start_date,
            end_date: start_date + chrono::Days::new(300),
            benchmark_grade: true,
        }
    }

    fn rule(id: RuleId, first_year_effective: SchoolYearId) -> CalculationRule {
        CalculationRule {
            id,
            first_year_effective,
            points_possible: d("4"),
            decimal_places: 2,
            per_course_categories: vec![],
            categories_as_courses: vec![],
            substitutions: vec![],
        }
    }

    #[test]
    fn exact_year_match_wins() {
        let mut book = Gradebook::new("rules");
        book.insert_school_year(year(2011, "2011-08-29"));
        book.insert_school_year(year(2012, "2012-08-27"));
        book.push_rule(rule(1, 2011));
        book.push_rule(rule(2, 2012));
        assert_eq!(book.find_calculation_rule(2012).unwrap().id, 2);
        assert_eq!(book.find_calculation_rule(2011).unwrap().id, 1);
    }

    #[test]
    fn falls_back_to_most_recent_earlier_rule() {
        let mut book = Gradebook::new("rules");
        book.insert_school_year(year(2010, "2010-08-30"));
        book.insert_school_year(year(2011, "2011-08-29"));
        book.insert_school_year(year(2013, "2013-08-26"));
        book.push_rule(rule(1, 2010));
        book.push_rule(rule(2, 2011));
        assert_eq!(book.find_calculation_rule(2013).unwrap().id, 2);
    }

    #[test]
    fn no_rule_before_year_is_an_error() {
        let mut book = Gradebook::new("rules");
        book.insert_school_year(year(2010, "2010-08-30"));
        book.insert_school_year(year(2011, "2011-08-29"));
        book.push_rule(rule(1, 2011));
        let err = book.find_calculation_rule(2010).unwrap_err();
        assert!(matches!(err, GradebookError::NoApplicableRule(ref name) if name == "year-2010"));
    }

    #[test]
    fn substitution_overrides_value_and_display() {
        let book = sample_gradebook();
        let rule = book.find_calculation_rule(2013).unwrap();

        let plain = rule.substitute(Some(1), Some(1), d("3"));
        assert_eq!(plain.calculate_as, d("3"));
        assert_eq!(plain.display_as, None);

        let incomplete = rule.substitute(Some(1), Some(1), d("0"));
        assert_eq!(incomplete.calculate_as, d("0"));
        assert_eq!(incomplete.display_as.as_deref(), Some("INC"));
    }

    #[test]
    fn substitution_respects_category_filter() {
        let mut rule = rule(1, 2011);
        rule.substitutions.push(Substitution {
            operator: Operator::Less,
            match_value: d("1"),
            display_as: None,
            calculate_as: Some(d("1")),
            apply_to_departments: vec![],
            apply_to_categories: vec![7],
            flag_visually: false,
        });
        assert_eq!(rule.substitute(None, Some(7), d("0.5")).calculate_as, d("1"));
        assert_eq!(rule.substitute(None, Some(8), d("0.5")).calculate_as, d("0.5"));
    }

    #[test]
    fn only_flagged_substitutions_are_highlighted() {
        let mut rule = rule(1, 2011);
        for (display_as, flag_visually) in [("INC", true), ("M", false)] {
            rule.substitutions.push(Substitution {
                operator: Operator::Equal,
                match_value: d("0"),
                display_as: Some(display_as.into()),
                calculate_as: None,
                apply_to_departments: vec![],
                apply_to_categories: vec![],
                flag_visually,
            });
        }
        assert!(rule.flags_visually("INC"));
        assert!(!rule.flags_visually("M"));
        assert!(!rule.flags_visually("EX"));
    }

    #[test]
    fn department_membership_drives_feeds() {
        let book = sample_gradebook();
        let rule = book.find_calculation_rule(2013).unwrap();
        assert!(rule.feeds_course(1, Some(1)));
        assert!(!rule.feeds_course(1, None));
        assert!(rule.feeds_category_as_course(2, Some(1)));
        assert!(!rule.feeds_category_as_course(1, Some(1)));
    }

    #[test]
    fn operator_parses_from_symbols() {
        #[derive(Deserialize)]
        struct Wrapper {
            op: Operator,
        }
        let parsed: Wrapper = toml::from_str(r#"op = "<=""#).unwrap();
        assert_eq!(parsed.op, Operator::LessOrEqual);
        assert_eq!(parsed.op.to_string(), "<=");
        assert!(parsed.op.compare(d("2"), d("2")));
    }
}
