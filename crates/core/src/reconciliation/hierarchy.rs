//! Chart-of-accounts hierarchy validation and header rollups.

use std::collections::{HashMap, HashSet};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::types::AccountType;

/// An account as seen by the hierarchy validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyNode {
    /// The account ID.
    pub id: Uuid,
    /// Account code.
    pub code: String,
    /// Account classification.
    pub account_type: AccountType,
    /// Parent account.
    pub parent_id: Option<Uuid>,
    /// Whether the account is a header.
    pub is_header: bool,
    /// Whether the account is active.
    pub is_active: bool,
    /// Cached balance.
    pub balance: Decimal,
    /// Whether any journal line references the account.
    pub has_lines: bool,
}

/// Kind of hierarchy problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyIssueKind {
    /// Following parents leads back to the account.
    Cycle,
    /// Parent does not exist.
    Orphan,
    /// Active account under an inactive parent.
    InactiveParent,
    /// Header account referenced by journal lines.
    HeaderWithLines,
    /// Parent is a postable account.
    ParentNotHeader,
    /// Child and parent have different account types.
    TypeMismatch,
    /// Account is nested deeper than allowed.
    DepthExceeded,
    /// Child code does not start with the parent's prefix.
    CodePrefixMismatch,
    /// Header cached balance differs from the sum of its descendants.
    HeaderBalanceMismatch,
}

/// One hierarchy problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyIssue {
    /// Kind of issue.
    pub kind: HierarchyIssueKind,
    /// The offending account.
    pub account_id: Uuid,
    /// Its code.
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

/// Returns the rollup prefix of a header code: the code without trailing zeros.
///
/// `"1000"` → `"1"`, `"1100"` → `"11"`, `"1101"` → `"1101"`.
#[must_use]
pub fn code_prefix(code: &str) -> &str {
    code.trim_end_matches('0')
}

/// Sums the balances of active, non-header accounts under `header_code` by prefix.
///
/// The header itself is excluded.
pub fn rollup_by_prefix<'a, I>(header_code: &str, accounts: I) -> Decimal
where
    I: IntoIterator<Item = &'a HierarchyNode>,
{
    let prefix = code_prefix(header_code);
    accounts
        .into_iter()
        .filter(|a| a.is_active && !a.is_header && a.code != header_code)
        .filter(|a| a.code.starts_with(prefix))
        .map(|a| a.balance)
        .sum()
}

/// Stateless hierarchy validator.
pub struct HierarchyValidator;

impl HierarchyValidator {
    /// Validates the whole chart of accounts.
    ///
    /// Structural issues come first in input order, followed by header
    /// balance mismatches.
    #[must_use]
    pub fn validate(
        nodes: &[HierarchyNode],
        max_depth: u32,
        tolerance: Decimal,
    ) -> Vec<HierarchyIssue> {
        let by_id: HashMap<Uuid, &HierarchyNode> = nodes.iter().map(|n| (n.id, n)).collect();
        let mut issues = Vec::new();
        let mut cyclic = HashSet::new();

        for node in nodes {
            let issue = |kind, message: String| HierarchyIssue {
                kind,
                account_id: node.id,
                code: node.code.clone(),
                message,
            };

            let in_cycle = match Self::depth(node, &by_id) {
                None => {
                    cyclic.insert(node.id);
                    issues.push(issue(
                        HierarchyIssueKind::Cycle,
                        "parent chain loops back to this account".to_string(),
                    ));
                    true
                }
                Some(depth) => {
                    if depth > max_depth {
                        issues.push(issue(
                            HierarchyIssueKind::DepthExceeded,
                            format!("depth {depth} exceeds maximum {max_depth}"),
                        ));
                    }
                    false
                }
            };

            if node.is_header && node.has_lines {
                issues.push(issue(
                    HierarchyIssueKind::HeaderWithLines,
                    "header account is referenced by journal lines".to_string(),
                ));
            }

            if in_cycle {
                continue;
            }
            let Some(parent_id) = node.parent_id else {
                continue;
            };
            let Some(parent) = by_id.get(&parent_id) else {
                issues.push(issue(
                    HierarchyIssueKind::Orphan,
                    format!("parent {parent_id} does not exist"),
                ));
                continue;
            };

            if node.is_active && !parent.is_active {
                issues.push(issue(
                    HierarchyIssueKind::InactiveParent,
                    format!("parent {} is inactive", parent.code),
                ));
            }
            if !parent.is_header {
                issues.push(issue(
                    HierarchyIssueKind::ParentNotHeader,
                    format!("parent {} is not a header account", parent.code),
                ));
            }
            if parent.account_type != node.account_type {
                issues.push(issue(
                    HierarchyIssueKind::TypeMismatch,
                    format!(
                        "type {} differs from parent {} type {}",
                        node.account_type.as_str(),
                        parent.code,
                        parent.account_type.as_str()
                    ),
                ));
            }
            if !node.code.starts_with(code_prefix(&parent.code)) {
                issues.push(issue(
                    HierarchyIssueKind::CodePrefixMismatch,
                    format!(
                        "code does not start with parent prefix '{}'",
                        code_prefix(&parent.code)
                    ),
                ));
            }
        }

        for node in nodes.iter().filter(|n| n.is_header && !cyclic.contains(&n.id)) {
            let expected = Self::descendant_leaf_sum(node.id, nodes);
            if (node.balance - expected).abs() > tolerance {
                issues.push(HierarchyIssue {
                    kind: HierarchyIssueKind::HeaderBalanceMismatch,
                    account_id: node.id,
                    code: node.code.clone(),
                    message: format!("cached {} but descendants sum to {expected}", node.balance),
                });
            }
        }

        issues
    }

    /// Depth of a node (a root is 1), or `None` if its parent chain is cyclic.
    ///
    /// A missing parent ends the chain.
    fn depth(node: &HierarchyNode, by_id: &HashMap<Uuid, &HierarchyNode>) -> Option<u32> {
        let mut seen = HashSet::from([node.id]);
        let mut depth = 1;
        let mut current = node.parent_id;

        while let Some(parent_id) = current {
            if !seen.insert(parent_id) {
                return (parent_id != node.id).then_some(depth);
            }
            let Some(parent) = by_id.get(&parent_id) else {
                break;
            };
            depth += 1;
            current = parent.parent_id;
        }

        Some(depth)
    }

    /// Sums active non-header descendants of `root` through `parent_id` links.
    #[must_use]
    pub fn descendant_leaf_sum(root: Uuid, nodes: &[HierarchyNode]) -> Decimal {
        let mut children: HashMap<Uuid, Vec<&HierarchyNode>> = HashMap::new();
        for node in nodes {
            if let Some(parent_id) = node.parent_id {
                children.entry(parent_id).or_default().push(node);
            }
        }

        let mut total = Decimal::ZERO;
        let mut visited = HashSet::from([root]);
        let mut stack = vec![root];

        while let Some(id) = stack.pop() {
            for child in children.get(&id).into_iter().flatten() {
                if !visited.insert(child.id) {
                    continue;
                }
                if child.is_header {
                    stack.push(child.id);
                } else if child.is_active {
                    total += child.balance;
                }
            }
        }

        total
    }
}
