//! Publication gate
//!
//! Deterministic checks against a created record. Violations become issue
//! strings in the [`QaReport`]; a failing report only keeps the record in
//! draft, it is never an error.

use crate::models::QaReport;
use cmt_common::config::QaSection;

/// What QA looks at for one created record
#[derive(Debug, Clone, Copy)]
pub struct QaSubject<'a> {
    pub title: &'a str,
    pub body_html: &'a str,
    /// Sub-resources successfully attached
    pub sub_resources: usize,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QaRules {
    pub min_title_len: usize,
    pub min_description_len: usize,
    pub min_sub_resources: usize,
    pub max_price: f64,
}

impl Default for QaRules {
    fn default() -> Self {
        Self::from(&QaSection::default())
    }
}

impl From<&QaSection> for QaRules {
    fn from(section: &QaSection) -> Self {
        Self {
            min_title_len: section.min_title_len,
            min_description_len: section.min_description_len,
            min_sub_resources: section.min_sub_resources,
            max_price: section.max_price,
        }
    }
}

impl QaRules {
    pub fn check(&self, subject: &QaSubject<'_>) -> QaReport {
        let mut issues = Vec::new();

        let title_len = subject.title.trim().chars().count();
        if title_len == 0 {
            issues.push("title missing".to_string());
        } else if title_len < self.min_title_len {
            issues.push(format!(
                "title shorter than {} characters",
                self.min_title_len
            ));
        }

        let description_len = strip_tags(subject.body_html).chars().count();
        if description_len == 0 {
            issues.push("description missing".to_string());
        } else if description_len < self.min_description_len {
            issues.push(format!(
                "description shorter than {} characters",
                self.min_description_len
            ));
        }

        if subject.sub_resources == 0 {
            issues.push("no sub-resources attached".to_string());
        } else if subject.sub_resources < self.min_sub_resources {
            issues.push(format!(
                "only {} of {} required sub-resources attached",
                subject.sub_resources, self.min_sub_resources
            ));
        }

        if !(subject.price > 0.0) {
            issues.push(format!("price must be positive (got {:.2})", subject.price));
        } else if subject.price >= self.max_price {
            issues.push(format!(
                "price {:.2} exceeds sanity ceiling {:.2}",
                subject.price, self.max_price
            ));
        }

        QaReport::from_issues(issues)
    }
}

/// Visible text of an HTML fragment, whitespace collapsed
fn strip_tags(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                text.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
