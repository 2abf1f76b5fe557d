use crate::model::{Fix, FixStatus};
use std::collections::BTreeMap;

/// Applied/failed fix counts for display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixCounts {
    pub applied: usize,
    pub failed: usize,
}

pub fn fix_counts(fixes: &[Fix]) -> FixCounts {
    fixes.iter().fold(FixCounts::default(), |mut acc, f| {
        match f.status {
            FixStatus::Applied => acc.applied += 1,
            FixStatus::Failed => acc.failed += 1,
        }
        acc
    })
}

/// Number of fixes per bug category, ordered by category label.
pub fn bug_type_breakdown(fixes: &[Fix]) -> Vec<(String, usize)> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for f in fixes {
        *counts.entry(f.bug_type.label().to_string()).or_default() += 1;
    }
    counts.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BugType;

    fn fix(bug_type: BugType, status: FixStatus) -> Fix {
        Fix {
            bug_type,
            file: "src/app.py".into(),
            line: 1,
            fix_description: "fix".into(),
            status,
        }
    }

    #[test]
    fn counts_applied_and_failed() {
        let fixes = vec![
            fix(BugType::Linting, FixStatus::Applied),
            fix(BugType::Syntax, FixStatus::Applied),
            fix(BugType::Logic, FixStatus::Failed),
        ];
        assert_eq!(fix_counts(&fixes), FixCounts { applied: 2, failed: 1 });
        assert_eq!(fix_counts(&[]), FixCounts::default());
    }

    #[test]
    fn breakdown_groups_by_label() {
        let fixes = vec![
            fix(BugType::Import, FixStatus::Applied),
            fix(BugType::Linting, FixStatus::Applied),
            fix(BugType::Import, FixStatus::Failed),
        ];
        assert_eq!(
            bug_type_breakdown(&fixes),
            vec![("IMPORT".to_string(), 2), ("LINTING".to_string(), 1)]
        );
    }
}
