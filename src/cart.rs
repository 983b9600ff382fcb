use crate::api::{LoanRequest, LoanRequestItem};
use crate::models::{InventoryItem, LocationId};
use log::debug;

/// Label the server stores on temporary items that have no location.
pub const TEMPORARY_LOCATION_PLACEHOLDER: &str = "Article temporaire (sans emplacement)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartItemKind {
    Temporary,
    Regular,
}

impl CartItemKind {
    /// Type tag sent with loan requests.
    pub fn wire_name(&self) -> &'static str {
        match self {
            CartItemKind::Temporary => "temp",
            CartItemKind::Regular => "regular",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartEntry {
    pub id: Option<LocationId>,
    pub name: String,
    pub kind: CartItemKind,
    pub location: String,
}

/// Human-readable location for a cart entry.
pub fn location_label(item: &InventoryItem) -> String {
    if item.is_temporary {
        return "Temporary item".to_string();
    }

    let parts: Vec<String> = [
        ("Zone", &item.zone_name),
        ("Furniture", &item.furniture_name),
        ("Drawer", &item.drawer_name),
    ]
    .iter()
    .filter_map(|(label, name)| {
        name.as_deref()
            .filter(|n| !n.trim().is_empty())
            .map(|n| format!("{}: {}", label, n))
    })
    .collect();

    if !parts.is_empty() {
        return parts.join(" | ");
    }

    match item.location_info.as_deref().map(str::trim) {
        Some(info) if !info.is_empty() && info != TEMPORARY_LOCATION_PLACEHOLDER => info.to_string(),
        _ => "Location not specified".to_string(),
    }
}

/// Items queued for borrowing.
#[derive(Debug, Clone, Default)]
pub struct BorrowCart {
    entries: Vec<CartEntry>,
}

impl BorrowCart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[CartEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .iter()
            .any(|e| e.name.to_lowercase() == name.to_lowercase())
    }

    /// Adds `item` under `display_name`. Returns false when an entry with the
    /// same name (ignoring case) is already queued.
    pub fn add(&mut self, item: &InventoryItem, display_name: &str) -> bool {
        if self.contains(display_name) {
            debug!("{} already in the cart", display_name);
            return false;
        }

        self.entries.push(CartEntry {
            id: item.id,
            name: display_name.to_string(),
            kind: if item.is_temporary {
                CartItemKind::Temporary
            } else {
                CartItemKind::Regular
            },
            location: location_label(item),
        });
        true
    }

    pub fn remove(&mut self, index: usize) -> Option<CartEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries the server never gave an id; they cannot be borrowed.
    pub fn unidentified(&self) -> impl Iterator<Item = &CartEntry> {
        self.entries.iter().filter(|e| e.id.is_none())
    }

    /// Drop the entries a loan request was built from.
    pub fn clear_borrowed(&mut self) {
        self.entries.retain(|e| e.id.is_none());
    }

    /// Entries without a server id cannot be borrowed and are left out.
    pub fn loan_request(&self, return_date: &str) -> Option<LoanRequest> {
        let items: Vec<LoanRequestItem> = self
            .entries
            .iter()
            .filter_map(|e| {
                e.id.map(|id| LoanRequestItem {
                    id,
                    kind: e.kind.wire_name().to_string(),
                    name: e.name.clone(),
                })
            })
            .collect();

        if items.is_empty() {
            return None;
        }
        Some(LoanRequest {
            items,
            return_date: return_date.to_string(),
        })
    }
}
