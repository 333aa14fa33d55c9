//! Line reconciliation.
//!
//! Diffs the lines of an edited in-memory order against the lines currently
//! persisted for it. Line identity is the only key: a line with an
//! identifier is the same line (possibly edited), a line without one is new.

use std::collections::HashSet;

use crate::model::Orderline;

/// Statements needed to make the persisted lines match the edited ones.
///
/// Apply in field order: deletes, then updates, then inserts.
#[derive(Debug, Default, PartialEq)]
pub struct ReconciliationPlan<'a> {
    /// Identifiers of persisted lines absent from the edited order.
    pub deletes: Vec<i32>,
    /// Edited lines carrying an identifier, paired with it.
    pub updates: Vec<(i32, &'a Orderline)>,
    /// Edited lines without an identifier, paired with their index in the
    /// edited collection so the assigned identifier can be written back.
    pub inserts: Vec<(usize, &'a Orderline)>,
}

impl ReconciliationPlan<'_> {
    /// Total number of line statements in the plan.
    #[must_use]
    pub fn len(&self) -> usize {
        self.deletes.len() + self.updates.len() + self.inserts.len()
    }

    /// Returns `true` when no line statement is needed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Computes the line diff between `persisted` and `edited`.
///
/// Every edited line with an identifier is planned as an update, even if it
/// is unchanged or was not among `persisted`; the update statement rewrites
/// the owning order reference as well.
#[must_use]
pub fn plan<'a>(persisted: &[Orderline], edited: &'a [Orderline]) -> ReconciliationPlan<'a> {
    let kept: HashSet<i32> = edited.iter().filter_map(|l| l.id).collect();

    let deletes = persisted
        .iter()
        .filter_map(|l| l.id)
        .filter(|id| !kept.contains(id))
        .collect();

    let mut updates = Vec::new();
    let mut inserts = Vec::new();
    for (index, line) in edited.iter().enumerate() {
        match line.id {
            Some(id) => updates.push((id, line)),
            None => inserts.push((index, line)),
        }
    }

    ReconciliationPlan {
        deletes,
        updates,
        inserts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn persisted_line(id: i32, product: &str, quantity: i32) -> Orderline {
        Orderline {
            id: Some(id),
            ..Orderline::new(product, 19.99, quantity)
        }
    }

    #[test]
    fn test_unchanged_lines_are_all_updates() {
        let persisted = vec![persisted_line(1, "Americano", 3), persisted_line(2, "Cappuccino", 2)];
        let edited = persisted.clone();

        let plan = plan(&persisted, &edited);

        assert!(plan.deletes.is_empty());
        assert!(plan.inserts.is_empty());
        assert_eq!(
            plan.updates.iter().map(|(id, _)| *id).collect::<Vec<_>>(),
            vec![1, 2]
        );
    }

    #[test]
    fn test_removed_line_is_deleted() {
        let persisted = vec![persisted_line(1, "Americano", 3), persisted_line(2, "Cappuccino", 2)];
        let edited = vec![persisted[1].clone()];

        let plan = plan(&persisted, &edited);

        assert_eq!(plan.deletes, vec![1]);
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].0, 2);
        assert!(plan.inserts.is_empty());
    }

    #[test]
    fn test_line_without_id_is_inserted_with_its_index() {
        let persisted = vec![persisted_line(1, "Americano", 3), persisted_line(2, "Cappuccino", 2)];
        let mut edited = persisted.clone();
        edited.push(Orderline::new("Espresso", 2.5, 1));

        let plan = plan(&persisted, &edited);

        assert!(plan.deletes.is_empty());
        assert_eq!(plan.updates.len(), 2);
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.inserts[0].0, 2);
        assert_eq!(plan.inserts[0].1.product.as_deref(), Some("Espresso"));
    }

    #[test]
    fn test_edited_fields_are_carried_by_update() {
        let persisted = vec![persisted_line(5, "Americano", 3)];
        let mut edited = persisted.clone();
        edited[0].quantity = 10;

        let plan = plan(&persisted, &edited);

        assert_eq!(plan.updates[0].1.quantity, 10);
    }

    #[test]
    fn test_replacing_every_line() {
        let persisted = vec![persisted_line(1, "Americano", 3), persisted_line(2, "Cappuccino", 2)];
        let edited = vec![Orderline::new("Mocha", 4.0, 1)];

        let plan = plan(&persisted, &edited);

        assert_eq!(plan.deletes, vec![1, 2]);
        assert!(plan.updates.is_empty());
        assert_eq!(plan.inserts.len(), 1);
        assert_eq!(plan.len(), 3);
    }

    #[test]
    fn test_empty_on_both_sides_is_empty_plan() {
        let plan = plan(&[], &[]);

        assert!(plan.is_empty());
        assert_eq!(plan, ReconciliationPlan::default());
    }
}
