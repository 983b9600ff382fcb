use crate::error::ReconcileError;
use crate::models::{LocationId, RecognizedItem};
use log::debug;

/// What makes an item ready for submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileMode {
    /// A non-empty name is enough.
    Flat,
    /// Name plus zone, furniture and drawer.
    Location,
}

/// Included items split by readiness. Indices refer to the list at the time
/// of the split.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcceptedItems {
    pub complete: Vec<(usize, RecognizedItem)>,
    pub incomplete: Vec<(usize, RecognizedItem)>,
}

/// Editable list of recognised candidates.
#[derive(Debug, Clone)]
pub struct ResultReconciler {
    mode: ReconcileMode,
    items: Vec<RecognizedItem>,
}

impl ResultReconciler {
    pub fn new(mode: ReconcileMode) -> Self {
        Self {
            mode,
            items: Vec::new(),
        }
    }

    pub fn mode(&self) -> ReconcileMode {
        self.mode
    }

    /// Replace the whole set. Every item starts included unless the server
    /// explicitly said otherwise.
    pub fn load(&mut self, items: Vec<RecognizedItem>) {
        debug!("Loading {} recognised items", items.len());
        self.items = items;
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn items(&self) -> &[RecognizedItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn item_mut(&mut self, index: usize) -> Result<&mut RecognizedItem, ReconcileError> {
        let len = self.items.len();
        self.items
            .get_mut(index)
            .ok_or(ReconcileError::StaleIndex { index, len })
    }

    pub fn set_name(&mut self, index: usize, name: impl Into<String>) -> Result<(), ReconcileError> {
        self.item_mut(index)?.name = name.into();
        Ok(())
    }

    pub fn set_included(&mut self, index: usize, included: bool) -> Result<(), ReconcileError> {
        self.item_mut(index)?.included = included;
        Ok(())
    }

    /// Changing the zone invalidates the furniture and drawer below it.
    pub fn set_zone(
        &mut self,
        index: usize,
        zone_id: Option<LocationId>,
    ) -> Result<(), ReconcileError> {
        let item = self.item_mut(index)?;
        item.zone_id = zone_id;
        item.furniture_id = None;
        item.drawer_id = None;
        Ok(())
    }

    pub fn set_furniture(
        &mut self,
        index: usize,
        furniture_id: Option<LocationId>,
    ) -> Result<(), ReconcileError> {
        let item = self.item_mut(index)?;
        item.furniture_id = furniture_id;
        item.drawer_id = None;
        Ok(())
    }

    pub fn set_drawer(
        &mut self,
        index: usize,
        drawer_id: Option<LocationId>,
    ) -> Result<(), ReconcileError> {
        self.item_mut(index)?.drawer_id = drawer_id;
        Ok(())
    }

    /// Later items shift down by one.
    pub fn remove(&mut self, index: usize) -> Result<RecognizedItem, ReconcileError> {
        if index >= self.items.len() {
            return Err(ReconcileError::StaleIndex {
                index,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    pub fn is_complete(&self, item: &RecognizedItem) -> bool {
        match self.mode {
            ReconcileMode::Flat => item.has_name(),
            ReconcileMode::Location => item.has_name() && item.has_location(),
        }
    }

    /// Excluded items appear in neither list.
    pub fn accepted_items(&self) -> AcceptedItems {
        let mut accepted = AcceptedItems::default();
        for (index, item) in self.items.iter().enumerate().filter(|(_, i)| i.included) {
            if self.is_complete(item) {
                accepted.complete.push((index, item.clone()));
            } else {
                accepted.incomplete.push((index, item.clone()));
            }
        }
        accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn located(name: &str, zone: i64, furniture: i64, drawer: i64) -> RecognizedItem {
        let mut item = RecognizedItem::named(name);
        item.zone_id = Some(zone);
        item.furniture_id = Some(furniture);
        item.drawer_id = Some(drawer);
        item
    }

    #[test]
    fn test_set_zone_clears_children() {
        let mut reconciler = ResultReconciler::new(ReconcileMode::Location);
        reconciler.load(vec![located("Marteau", 1, 2, 3)]);

        reconciler.set_zone(0, Some(2)).unwrap();
        let item = &reconciler.items()[0];
        assert_eq!(item.zone_id, Some(2));
        assert_eq!(item.furniture_id, None);
        assert_eq!(item.drawer_id, None);
    }

    #[test]
    fn test_set_furniture_clears_drawer_only() {
        let mut reconciler = ResultReconciler::new(ReconcileMode::Location);
        reconciler.load(vec![located("Marteau", 1, 2, 3)]);

        reconciler.set_furniture(0, Some(4)).unwrap();
        let item = &reconciler.items()[0];
        assert_eq!(item.zone_id, Some(1));
        assert_eq!(item.furniture_id, Some(4));
        assert_eq!(item.drawer_id, None);
    }

    #[test]
    fn test_excluded_items_never_accepted() {
        let mut reconciler = ResultReconciler::new(ReconcileMode::Location);
        reconciler.load(vec![
            located("Marteau", 1, 2, 3),
            RecognizedItem::named("Vis"),
        ]);
        reconciler.set_included(0, false).unwrap();
        reconciler.set_included(1, false).unwrap();

        let accepted = reconciler.accepted_items();
        assert!(accepted.complete.is_empty());
        assert!(accepted.incomplete.is_empty());
    }

    #[test]
    fn test_empty_load_accepts_nothing() {
        let mut reconciler = ResultReconciler::new(ReconcileMode::Flat);
        reconciler.load(vec![RecognizedItem::named("Pince")]);
        reconciler.load(vec![]);
        assert_eq!(reconciler.accepted_items(), AcceptedItems::default());
    }

    #[test]
    fn test_partial_location_is_incomplete() {
        let mut item = RecognizedItem::named("Vis");
        item.zone_id = Some(1);
        item.furniture_id = Some(2);

        let mut reconciler = ResultReconciler::new(ReconcileMode::Location);
        reconciler.load(vec![item.clone()]);
        let accepted = reconciler.accepted_items();
        assert!(accepted.complete.is_empty());
        assert_eq!(accepted.incomplete, vec![(0, item.clone())]);

        let mut flat = ResultReconciler::new(ReconcileMode::Flat);
        flat.load(vec![item]);
        assert_eq!(flat.accepted_items().complete.len(), 1);
    }

    #[test]
    fn test_blank_name_is_incomplete() {
        let mut reconciler = ResultReconciler::new(ReconcileMode::Location);
        reconciler.load(vec![located("Marteau", 1, 2, 3)]);
        reconciler.set_name(0, "   ").unwrap();
        assert_eq!(reconciler.accepted_items().incomplete.len(), 1);
    }

    #[test]
    fn test_remove_reindexes() {
        let mut reconciler = ResultReconciler::new(ReconcileMode::Flat);
        reconciler.load(vec![
            RecognizedItem::named("A"),
            RecognizedItem::named("B"),
            RecognizedItem::named("C"),
        ]);

        let removed = reconciler.remove(1).unwrap();
        assert_eq!(removed.name, "B");
        let names: Vec<_> = reconciler.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);

        assert_eq!(
            reconciler.remove(2),
            Err(ReconcileError::StaleIndex { index: 2, len: 2 })
        );
        assert_eq!(
            reconciler.set_name(5, "X"),
            Err(ReconcileError::StaleIndex { index: 5, len: 2 })
        );
    }
}
