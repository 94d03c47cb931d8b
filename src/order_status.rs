//! Order lifecycle.
//!
//! ```text
//! pending ──► paid ──► processing ──► shipped ──► delivered
//!    │          │           │             │            │
//!    └► cancelled ◄─────────┘             └──► refunded ◄┘
//!               └──────────► refunded ◄───┘
//! ```
//!
//! `cancelled` and `refunded` are terminal.

use crate::error::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
        OrderStatus::Refunded,
    ];

    /// Statuses whose orders count toward revenue.
    pub const REVENUE: [OrderStatus; 4] = [
        OrderStatus::Paid,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Refunded => "refunded",
        }
    }

    pub fn allowed_next(&self) -> &'static [OrderStatus] {
        use OrderStatus::*;
        match self {
            Pending => &[Paid, Cancelled],
            Paid => &[Processing, Cancelled, Refunded],
            Processing => &[Shipped, Cancelled, Refunded],
            Shipped => &[Delivered, Refunded],
            Delivered => &[Refunded],
            Cancelled | Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.allowed_next().contains(&next)
    }

    pub fn check_transition(&self, next: OrderStatus) -> Result<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(StoreError::InvalidTransition {
                from: self.as_str().to_string(),
                to: next.as_str().to_string(),
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_next().is_empty()
    }

    /// Moving to `cancelled` from here puts the items back on the shelf.
    pub fn restocks_on_cancel(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending | OrderStatus::Paid | OrderStatus::Processing
        )
    }

    /// Customers may cancel on their own before fulfilment starts.
    pub fn customer_cancellable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Paid)
    }

    /// Transitions the customer hears about by email.
    pub fn notifies_customer(&self) -> bool {
        matches!(
            self,
            OrderStatus::Shipped
                | OrderStatus::Delivered
                | OrderStatus::Cancelled
                | OrderStatus::Refunded
        )
    }

    pub fn counts_as_purchase(&self) -> bool {
        OrderStatus::REVENUE.contains(self)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        OrderStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| StoreError::validation(format!("Unknown order status '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::OrderStatus::*;
    use super::*;

    #[test]
    fn test_happy_path_is_allowed() {
        let path = [Pending, Paid, Processing, Shipped, Delivered];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for status in OrderStatus::ALL {
            assert!(!Cancelled.can_transition_to(status));
            assert!(!Refunded.can_transition_to(status));
        }
        assert!(Cancelled.is_terminal());
        assert!(!Delivered.is_terminal());
    }

    #[test]
    fn test_self_transition_is_rejected() {
        for status in OrderStatus::ALL {
            assert!(status.check_transition(status).is_err());
        }
    }

    #[test]
    fn test_cannot_skip_or_go_back() {
        assert!(!Pending.can_transition_to(Shipped));
        assert!(!Shipped.can_transition_to(Processing));
        assert!(!Shipped.can_transition_to(Cancelled));
        assert!(!Pending.can_transition_to(Refunded));

        match Delivered.check_transition(Pending) {
            Err(StoreError::InvalidTransition { from, to }) => {
                assert_eq!(from, "delivered");
                assert_eq!(to, "pending");
            }
            other => panic!("expected invalid transition, got {other:?}"),
        }
    }

    #[test]
    fn test_cancellation_rules() {
        assert!(Pending.customer_cancellable());
        assert!(Paid.customer_cancellable());
        assert!(!Processing.customer_cancellable());
        assert!(Processing.restocks_on_cancel());
        assert!(!Shipped.restocks_on_cancel());
    }

    #[test]
    fn test_parse() {
        assert_eq!("shipped".parse::<OrderStatus>().unwrap(), Shipped);
        assert!("lost".parse::<OrderStatus>().is_err());
    }
}
