use crate::api::{InventoryApi, LoanBatchResult};
use crate::cart::{BorrowCart, CartEntry};
use crate::error::ApiError;
use crate::models::{InventoryItem, Loan};
use crate::notifications::{Notifier, Toast, ToastLevel};
use chrono::NaiveDate;
use log::{error, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// Returns true for an existing calendar date written `DD/MM/YYYY`.
pub fn is_valid_return_date(date: &str) -> bool {
    let date = date.trim();
    let shape: Vec<usize> = date.split('/').map(str::len).collect();
    shape == [2, 2, 4] && NaiveDate::parse_from_str(date, "%d/%m/%Y").is_ok()
}

/// Borrowing side of the app: the shared cart, active loans and returns.
pub struct LoanDesk {
    api: Arc<dyn InventoryApi>,
    notifier: Arc<dyn Notifier>,
    cart: Arc<Mutex<BorrowCart>>,
}

impl LoanDesk {
    pub fn new(
        api: Arc<dyn InventoryApi>,
        notifier: Arc<dyn Notifier>,
        cart: Arc<Mutex<BorrowCart>>,
    ) -> Self {
        Self { api, notifier, cart }
    }

    pub fn cart(&self) -> Vec<CartEntry> {
        lock(&self.cart).entries().to_vec()
    }

    pub fn remove_from_cart(&self, index: usize) -> Option<CartEntry> {
        lock(&self.cart).remove(index)
    }

    pub async fn items(&self, temporary_only: bool) -> Result<Vec<InventoryItem>, ApiError> {
        self.api.list_items(temporary_only).await.inspect_err(|e| {
            error!("Failed to list items: {}", e);
            self.notifier
                .notify(Toast::danger("Error", format!("Unable to load items: {}", e)));
        })
    }

    pub async fn active_loans(&self) -> Result<Vec<Loan>, ApiError> {
        self.api.active_loans().await.inspect_err(|e| {
            error!("Failed to list loans: {}", e);
            self.notifier
                .notify(Toast::danger("Error", format!("Unable to load loans: {}", e)));
        })
    }

    pub async fn return_loan(&self, loan_id: i64) -> Result<(), ApiError> {
        match self.api.return_loan(loan_id).await {
            Ok(()) => {
                info!("Loan {} returned", loan_id);
                self.notifier
                    .notify(Toast::success("Returned", "Item returned successfully"));
                Ok(())
            }
            Err(e) => {
                error!("Failed to return loan {}: {}", loan_id, e);
                self.notifier.notify(Toast::danger("Error", e.to_string()));
                Err(e)
            }
        }
    }

    /// Borrow everything in the cart until `return_date` (`DD/MM/YYYY`).
    /// Sent entries leave the cart only when at least one loan was created;
    /// entries without a server id are reported and stay.
    pub async fn borrow(&self, return_date: &str) -> Option<LoanBatchResult> {
        let request = {
            let cart = lock(&self.cart);
            if cart.is_empty() {
                self.notifier.notify(Toast::warning(
                    "Empty list",
                    "Please add at least one item",
                ));
                return None;
            }
            if !is_valid_return_date(return_date) {
                self.notifier.notify(Toast::warning(
                    "Return date",
                    "Please choose a return date",
                ));
                return None;
            }
            for entry in cart.unidentified() {
                warn!("{} has no inventory id, not borrowed", entry.name);
                self.notifier.notify(Toast::warning(
                    "Not borrowed",
                    format!(
                        "Item \"{}\" has no inventory id and stays in your borrow list",
                        entry.name
                    ),
                ));
            }
            cart.loan_request(return_date.trim())
        };

        let Some(request) = request else {
            warn!("No cart entry has a server id");
            self.notifier.notify(Toast::warning(
                "Empty list",
                "Please add at least one item",
            ));
            return None;
        };

        let result = match self.api.create_loans(&request).await {
            Ok(result) => result,
            Err(e) => {
                error!("Loan creation failed: {}", e);
                self.notifier.notify(Toast::danger("Error", e.to_string()));
                return None;
            }
        };

        self.report(&result);
        if result.loans.iter().any(|l| l.is_success()) {
            lock(&self.cart).clear_borrowed();
        }
        Some(result)
    }

    fn report(&self, result: &LoanBatchResult) {
        let succeeded = result.loans.iter().filter(|l| l.is_success()).count();
        let failed = result.loans.len() - succeeded;

        let summary = match (succeeded, failed) {
            (n, 0) => Toast::success("Loans", format!("{} item(s) borrowed successfully", n)),
            (0, e) => Toast::warning(
                "Loans",
                format!("No item borrowed. {} item(s) already borrowed", e),
            ),
            (n, e) => Toast::new(
                ToastLevel::Info,
                "Loans",
                format!("{} item(s) borrowed, {} item(s) already borrowed", n, e),
            ),
        };
        info!("Loans created: {} ok, {} failed", succeeded, failed);
        self.notifier.notify(summary);

        for outcome in result.loans.iter().filter(|l| !l.is_success()) {
            let reason = outcome.error.as_deref().unwrap_or("unknown error");
            self.notifier.notify(Toast::warning(
                "Loan refused",
                format!("Item \"{}\": {}", outcome.item_name, reason),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::MemoryNotifier;
    use crate::test_support::{inventory_item, FakeApi};

    fn desk() -> (LoanDesk, Arc<FakeApi>, Arc<MemoryNotifier>, Arc<Mutex<BorrowCart>>) {
        let api = Arc::new(FakeApi::default());
        let notifier = Arc::new(MemoryNotifier::new());
        let cart = Arc::new(Mutex::new(BorrowCart::new()));
        let desk = LoanDesk::new(api.clone(), notifier.clone(), cart.clone());
        (desk, api, notifier, cart)
    }

    #[test]
    fn test_return_date_format() {
        assert!(is_valid_return_date("01/11/2026"));
        assert!(is_valid_return_date(" 31/12/2026 "));
        assert!(!is_valid_return_date("2026-11-01"));
        assert!(!is_valid_return_date("32/01/2026"));
        assert!(!is_valid_return_date("31/02/2026"));
        assert!(!is_valid_return_date("31/04/2026"));
        assert!(!is_valid_return_date("29/02/2027"));
        assert!(is_valid_return_date("29/02/2028"));
        assert!(!is_valid_return_date("1/1/2026"));
        assert!(!is_valid_return_date(""));
    }

    #[tokio::test]
    async fn test_borrow_empty_cart_warns() {
        let (desk, api, notifier, _) = desk();
        assert!(desk.borrow("01/11/2026").await.is_none());
        assert!(api.loan_requests.lock().unwrap().is_empty());
        let toasts = notifier.take();
        assert_eq!(toasts[0].message, "Please add at least one item");
    }

    #[tokio::test]
    async fn test_borrow_requires_date() {
        let (desk, api, notifier, cart) = desk();
        cart.lock().unwrap().add(&inventory_item(4, "Pince", true), "Pince");
        assert!(desk.borrow("").await.is_none());
        assert!(api.loan_requests.lock().unwrap().is_empty());
        assert_eq!(notifier.take()[0].level, ToastLevel::Warning);
        assert_eq!(desk.cart().len(), 1);
    }

    #[tokio::test]
    async fn test_borrow_sends_cart_and_clears_it() {
        let (desk, api, notifier, cart) = desk();
        cart.lock().unwrap().add(&inventory_item(4, "Pince", true), "Pince");
        cart.lock().unwrap().add(&inventory_item(9, "Scie", false), "Scie");

        let result = desk.borrow("01/11/2026").await.unwrap();
        assert_eq!(result.loans.len(), 2);
        assert!(desk.cart().is_empty());

        let requests = api.loan_requests.lock().unwrap().clone();
        assert_eq!(requests[0].return_date, "01/11/2026");
        assert_eq!(requests[0].items[0].kind, "temp");
        assert_eq!(requests[0].items[1].kind, "regular");

        let toasts = notifier.take();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].message, "2 item(s) borrowed successfully");
    }

    #[tokio::test]
    async fn test_borrow_keeps_entries_without_id() {
        let (desk, api, notifier, cart) = desk();
        let mut partial = inventory_item(7, "Perceuse", false);
        partial.id = None;
        cart.lock().unwrap().add(&partial, "Perceuse");
        cart.lock().unwrap().add(&inventory_item(4, "Pince", true), "Pince");

        assert!(desk.borrow("01/11/2026").await.is_some());

        let requests = api.loan_requests.lock().unwrap().clone();
        assert_eq!(requests[0].items.len(), 1);
        assert_eq!(requests[0].items[0].name, "Pince");

        let remaining = desk.cart();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "Perceuse");

        let toasts = notifier.take();
        assert_eq!(toasts[0].level, ToastLevel::Warning);
        assert!(toasts[0].message.contains("\"Perceuse\""));
        assert_eq!(toasts[1].message, "1 item(s) borrowed successfully");
    }

    #[test]
    fn test_report_lists_each_refusal() {
        let (desk, _, notifier, _) = desk();
        let result: LoanBatchResult = serde_json::from_value(serde_json::json!({
            "success": true,
            "loans": [
                {"status": "error", "item_name": "Pince", "error": "Already borrowed"},
                {"status": "error", "item_name": "Scie"}
            ]
        }))
        .unwrap();
        desk.report(&result);

        let toasts = notifier.take();
        assert_eq!(toasts.len(), 3);
        assert_eq!(toasts[0].message, "No item borrowed. 2 item(s) already borrowed");
        assert_eq!(toasts[1].message, "Item \"Pince\": Already borrowed");
        assert_eq!(toasts[2].message, "Item \"Scie\": unknown error");
    }

    #[tokio::test]
    async fn test_return_unknown_loan_fails() {
        let (desk, api, notifier, _) = desk();
        api.loans.lock().unwrap().push(Loan {
            id: 3,
            item_name: "Pince".into(),
            borrow_date: None,
            expected_return_date: None,
            is_temporary: true,
            item_zone: None,
            item_mobilier: None,
            item_niveau_tiroir: None,
        });

        assert!(desk.return_loan(8).await.is_err());
        desk.return_loan(3).await.unwrap();
        assert_eq!(*api.returned.lock().unwrap(), vec![3]);
        assert!(desk.active_loans().await.unwrap().is_empty());

        let levels: Vec<_> = notifier.take().into_iter().map(|t| t.level).collect();
        assert_eq!(levels, vec![ToastLevel::Danger, ToastLevel::Success]);
    }
}
