use chrono::{DateTime, Utc};
use mongodb::bson::{self, oid::ObjectId};
use serde::{Deserialize, Serialize};

use crate::config::HybridPolicy;
use crate::errors::{AppError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingType {
    OneWay,
    RoundTrip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Cash,
    Online,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    UnPaid,
    #[serde(rename = "Partially-Paid")]
    PartiallyPaid,
    Paid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Pending,
    Assigning,
    Confirmed,
    Completed,
    Cancelled,
}

/// Events that move an order along the booking lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderEvent {
    Assign,
    Confirm,
    Cancel,
    Complete,
}

impl std::fmt::Display for OrderEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OrderEvent::Assign => "assign",
            OrderEvent::Confirm => "confirm",
            OrderEvent::Cancel => "cancel",
            OrderEvent::Complete => "complete",
        };
        f.write_str(name)
    }
}

impl BookingStatus {
    /// The state reached by applying `event`, or `None` when the graph has no such edge.
    pub fn next(self, event: OrderEvent) -> Option<BookingStatus> {
        use BookingStatus::*;
        match (self, event) {
            (Pending, OrderEvent::Assign) => Some(Assigning),
            (Assigning, OrderEvent::Confirm) => Some(Confirmed),
            (Assigning, OrderEvent::Cancel) => Some(Pending),
            (Confirmed, OrderEvent::Complete) => Some(Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "Pending",
            BookingStatus::Assigning => "Assigning",
            BookingStatus::Confirmed => "Confirmed",
            BookingStatus::Completed => "Completed",
            BookingStatus::Cancelled => "Cancelled",
        }
    }
}

/// Who hands the driver their cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaidVia {
    Customer,
    Us,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShareStatus {
    UnPaid,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverShare {
    pub driver_cut: f64,
    #[serde(rename = "Via")]
    pub via: PaidVia,
    pub status: ShareStatus,
    pub paid_at: Option<DateTime<Utc>>,
}

impl DriverShare {
    pub fn for_order(order: &Order, hybrid: &HybridPolicy) -> Self {
        let driver_cut = match order.payment_method {
            PaymentMethod::Hybrid => hybrid.driver_cut(order.booking_amount),
            PaymentMethod::Cash | PaymentMethod::Online => order.booking_amount,
        };
        let via = if order.payment_method == PaymentMethod::Online {
            PaidVia::Us
        } else {
            PaidVia::Customer
        };

        DriverShare {
            driver_cut,
            via,
            status: ShareStatus::UnPaid,
            paid_at: None,
        }
    }

    pub fn mark_paid(&mut self, at: DateTime<Utc>) {
        self.status = ShareStatus::Paid;
        self.paid_at = Some(at);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Passenger {
    pub first_name: String,
    pub last_name: String,
    pub age: u32,
    pub gender: String,
}

// Database model for the orders collection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub user_id: ObjectId,
    #[serde(default)]
    pub booked_cab: Option<ObjectId>,
    #[serde(default)]
    pub driver_id: Option<ObjectId>,

    pub booking_type: BookingType,
    pub departure_date: DateTime<Utc>,
    #[serde(default)]
    pub drop_off_date: Option<DateTime<Utc>>,
    pub pickup_location: String,
    #[serde(default)]
    pub exact_location: Option<String>,
    pub destination: String,
    pub number_of_passengers: u32,
    #[serde(default)]
    pub passengers: Vec<Passenger>,

    pub booking_amount: f64,
    pub paid_amount: f64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub booking_status: BookingStatus,
    #[serde(default)]
    pub driver_share: Option<DriverShare>,

    pub razorpay_order_id: String,
    // BSON date so the expiry sweep can index it
    #[serde(rename = "order_expire", default)]
    pub order_expire: Option<bson::DateTime>,

    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: i64,
}

impl Order {
    /// Validates `event` against the lifecycle graph without mutating anything.
    pub fn check(&self, event: OrderEvent) -> Result<BookingStatus> {
        self.booking_status.next(event).ok_or_else(|| {
            AppError::InvalidTransition(format!(
                "cannot {} an order that is {}",
                event,
                self.booking_status.as_str()
            ))
        })
    }

    pub fn display_location(&self) -> &str {
        self.exact_location
            .as_deref()
            .filter(|loc| !loc.is_empty())
            .unwrap_or(&self.pickup_location)
    }

    pub fn is_driver(&self, user_id: &ObjectId) -> bool {
        self.driver_id.as_ref() == Some(user_id)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.order_expire.map(|at| at.to_chrono())
    }
}

// Model for order response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub booked_cab: Option<String>,
    pub driver_id: Option<String>,
    pub booking_type: BookingType,
    pub departure_date: DateTime<Utc>,
    pub drop_off_date: Option<DateTime<Utc>>,
    pub pickup_location: String,
    pub exact_location: Option<String>,
    pub destination: String,
    pub number_of_passengers: u32,
    pub passengers: Vec<Passenger>,
    pub booking_amount: f64,
    pub paid_amount: f64,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub booking_status: BookingStatus,
    pub driver_share: Option<DriverShare>,
    pub razorpay_order_id: String,
    #[serde(rename = "order_expire")]
    pub order_expire: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let order_expire = order.expires_at();
        OrderResponse {
            id: order.id.to_hex(),
            user_id: order.user_id.to_hex(),
            booked_cab: order.booked_cab.map(|id| id.to_hex()),
            driver_id: order.driver_id.map(|id| id.to_hex()),
            booking_type: order.booking_type,
            departure_date: order.departure_date,
            drop_off_date: order.drop_off_date,
            pickup_location: order.pickup_location,
            exact_location: order.exact_location,
            destination: order.destination,
            number_of_passengers: order.number_of_passengers,
            passengers: order.passengers,
            booking_amount: order.booking_amount,
            paid_amount: order.paid_amount,
            payment_method: order.payment_method,
            payment_status: order.payment_status,
            booking_status: order.booking_status,
            driver_share: order.driver_share,
            razorpay_order_id: order.razorpay_order_id,
            order_expire,
            created_at: order.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PercentageMeaning;
    use chrono::Duration;

    const ALL_STATES: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Assigning,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
    ];
    const ALL_EVENTS: [OrderEvent; 4] = [
        OrderEvent::Assign,
        OrderEvent::Confirm,
        OrderEvent::Cancel,
        OrderEvent::Complete,
    ];

    fn order(method: PaymentMethod, amount: f64) -> Order {
        let now = Utc::now();
        Order {
            id: ObjectId::new(),
            user_id: ObjectId::new(),
            booked_cab: None,
            driver_id: None,
            booking_type: BookingType::OneWay,
            departure_date: now + Duration::days(2),
            drop_off_date: None,
            pickup_location: "Pune Station".into(),
            exact_location: None,
            destination: "Mumbai Airport".into(),
            number_of_passengers: 2,
            passengers: vec![],
            booking_amount: amount,
            paid_amount: 0.0,
            payment_method: method,
            payment_status: PaymentStatus::UnPaid,
            booking_status: BookingStatus::Pending,
            driver_share: None,
            razorpay_order_id: "order_1".into(),
            order_expire: None,
            created_at: now,
            version: 0,
        }
    }

    #[test]
    fn only_the_documented_edges_exist() {
        let mut valid = vec![];
        for state in ALL_STATES {
            for event in ALL_EVENTS {
                if let Some(to) = state.next(event) {
                    valid.push((state, event, to));
                }
            }
        }
        assert_eq!(
            valid,
            vec![
                (BookingStatus::Pending, OrderEvent::Assign, BookingStatus::Assigning),
                (BookingStatus::Assigning, OrderEvent::Confirm, BookingStatus::Confirmed),
                (BookingStatus::Assigning, OrderEvent::Cancel, BookingStatus::Pending),
                (BookingStatus::Confirmed, OrderEvent::Complete, BookingStatus::Completed),
            ]
        );
    }

    #[test]
    fn rejected_check_leaves_order_untouched() {
        let order = order(PaymentMethod::Online, 500.0);
        let err = order.check(OrderEvent::Complete).unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        assert_eq!(order.booking_status, BookingStatus::Pending);
    }

    #[test]
    fn hybrid_share_keeps_platform_cut_out() {
        let order = order(PaymentMethod::Hybrid, 1000.0);
        let share = DriverShare::for_order(&order, &HybridPolicy::default());
        assert!((share.driver_cut - 900.0).abs() < 1e-9);
        assert_eq!(share.via, PaidVia::Customer);
        assert_eq!(share.status, ShareStatus::UnPaid);
    }

    #[test]
    fn hybrid_share_as_driver_fraction() {
        let order = order(PaymentMethod::Hybrid, 1000.0);
        let policy = HybridPolicy {
            percentage: 0.1,
            meaning: PercentageMeaning::DriverCut,
        };
        let share = DriverShare::for_order(&order, &policy);
        assert!((share.driver_cut - 100.0).abs() < 1e-9);
    }

    #[test]
    fn online_and_cash_shares_are_full_amount() {
        let policy = HybridPolicy::default();
        let online = DriverShare::for_order(&order(PaymentMethod::Online, 750.0), &policy);
        assert_eq!(online.driver_cut, 750.0);
        assert_eq!(online.via, PaidVia::Us);

        let cash = DriverShare::for_order(&order(PaymentMethod::Cash, 750.0), &policy);
        assert_eq!(cash.driver_cut, 750.0);
        assert_eq!(cash.via, PaidVia::Customer);
    }

    #[test]
    fn exact_location_overrides_pickup() {
        let mut order = order(PaymentMethod::Cash, 100.0);
        assert_eq!(order.display_location(), "Pune Station");
        order.exact_location = Some("Gate 4".into());
        assert_eq!(order.display_location(), "Gate 4");
    }
}
