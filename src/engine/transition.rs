//! The ride state machine as an explicit transition table.
//!
//! Each [`RideTransition`] carries the data its guard needs. A store applies
//! a transition by evaluating [`RideTransition::allows`] and, only if it
//! holds, [`RideTransition::apply`] against the current record while holding
//! that record exclusively. A failed guard mutates nothing.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::dispatch::{DispatchOffer, OfferStatus};
use crate::models::driver::{DriverProfile, GeoPoint};
use crate::models::ride::{PaymentMethod, PaymentStatus, Ride, RideStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RideTransition {
    BeginSearch { rider_id: String },
    Accept { driver_id: String, otp: String },
    /// Compensation for `Accept` when the rest of the accept saga fails.
    RevertAccept { driver_id: String },
    EnRoute { driver_id: String },
    Start { driver_id: String, otp: String },
    Complete { driver_id: String },
    /// `assigned` pins the driver observed before cancelling so the caller
    /// knows exactly whom to release.
    RiderCancel {
        rider_id: String,
        assigned: Option<String>,
    },
    DriverCancel { driver_id: String },
    BeginPayment { rider_id: String },
    /// Compensation for `BeginPayment` when the gateway order fails.
    RevertPayment,
    RecordOrder { order_id: String },
    SettlePayment { order_id: String, payment_id: String },
    FailPayment { order_id: String },
    MarkPaidCash { driver_id: String },
}

impl RideTransition {
    pub fn name(&self) -> &'static str {
        match self {
            RideTransition::BeginSearch { .. } => "begin_search",
            RideTransition::Accept { .. } => "accept",
            RideTransition::RevertAccept { .. } => "revert_accept",
            RideTransition::EnRoute { .. } => "en_route",
            RideTransition::Start { .. } => "start",
            RideTransition::Complete { .. } => "complete",
            RideTransition::RiderCancel { .. } => "rider_cancel",
            RideTransition::DriverCancel { .. } => "driver_cancel",
            RideTransition::BeginPayment { .. } => "begin_payment",
            RideTransition::RevertPayment => "revert_payment",
            RideTransition::RecordOrder { .. } => "record_order",
            RideTransition::SettlePayment { .. } => "settle_payment",
            RideTransition::FailPayment { .. } => "fail_payment",
            RideTransition::MarkPaidCash { .. } => "mark_paid_cash",
        }
    }

    /// Guard predicate evaluated against the currently stored record.
    pub fn allows(&self, ride: &Ride) -> bool {
        use RideStatus::*;

        match self {
            RideTransition::BeginSearch { rider_id } => {
                ride.status == Requested && ride.rider_id == *rider_id
            }
            RideTransition::Accept { driver_id, .. } => {
                ride.status == Searching && ride.driver_id.is_none() && ride.rider_id != *driver_id
            }
            RideTransition::RevertAccept { driver_id } => {
                matches!(ride.status, Accepted | DriverEnRoute) && ride.is_driven_by(driver_id)
            }
            RideTransition::EnRoute { driver_id } => {
                ride.status == Accepted && ride.is_driven_by(driver_id)
            }
            RideTransition::Start { driver_id, otp } => {
                ride.status == DriverEnRoute
                    && ride.is_driven_by(driver_id)
                    && ride.otp_code.as_deref() == Some(otp.as_str())
            }
            RideTransition::Complete { driver_id } => {
                ride.status == Started && ride.is_driven_by(driver_id) && ride.otp_code.is_none()
            }
            RideTransition::RiderCancel { rider_id, assigned } => {
                ride.rider_id == *rider_id
                    && ride.driver_id == *assigned
                    && matches!(ride.status, Requested | Searching | Accepted | DriverEnRoute)
            }
            RideTransition::DriverCancel { driver_id } => {
                ride.is_driven_by(driver_id) && matches!(ride.status, Accepted | DriverEnRoute)
            }
            RideTransition::BeginPayment { rider_id } => {
                ride.status == Completed
                    && ride.rider_id == *rider_id
                    && ride.payment_method == PaymentMethod::Gateway
                    && match ride.payment_status {
                        PaymentStatus::Pending | PaymentStatus::Failed => true,
                        PaymentStatus::Processing => ride.gateway_order_id.is_none(),
                        PaymentStatus::Paid => false,
                    }
            }
            RideTransition::RevertPayment => {
                ride.payment_status == PaymentStatus::Processing && ride.gateway_order_id.is_none()
            }
            RideTransition::RecordOrder { .. } => {
                ride.payment_method == PaymentMethod::Gateway
                    && ride.payment_status == PaymentStatus::Processing
                    && ride.gateway_order_id.is_none()
            }
            RideTransition::SettlePayment { order_id, .. }
            | RideTransition::FailPayment { order_id } => {
                ride.payment_method == PaymentMethod::Gateway
                    && ride.payment_status == PaymentStatus::Processing
                    && ride.gateway_order_id.as_deref() == Some(order_id.as_str())
            }
            RideTransition::MarkPaidCash { driver_id } => {
                ride.status == Completed
                    && ride.is_driven_by(driver_id)
                    && ride.payment_method == PaymentMethod::Cash
                    && ride.payment_status == PaymentStatus::Pending
            }
        }
    }

    /// Field mutations for a transition whose guard already held.
    pub fn apply(&self, ride: &mut Ride, now: DateTime<Utc>) {
        match self {
            RideTransition::BeginSearch { .. } => {
                ride.status = RideStatus::Searching;
            }
            RideTransition::Accept { driver_id, otp } => {
                ride.status = RideStatus::Accepted;
                ride.driver_id = Some(driver_id.clone());
                ride.otp_code = Some(otp.clone());
                ride.accepted_at = Some(now);
            }
            RideTransition::RevertAccept { .. } | RideTransition::DriverCancel { .. } => {
                ride.status = RideStatus::Searching;
                ride.driver_id = None;
                ride.otp_code = None;
                ride.accepted_at = None;
            }
            RideTransition::EnRoute { .. } => {
                ride.status = RideStatus::DriverEnRoute;
            }
            RideTransition::Start { .. } => {
                ride.status = RideStatus::Started;
                ride.otp_code = None;
                ride.started_at = Some(now);
            }
            RideTransition::Complete { .. } => {
                ride.status = RideStatus::Completed;
                ride.completed_at = Some(now);
            }
            RideTransition::RiderCancel { .. } => {
                ride.status = RideStatus::Cancelled;
                ride.driver_id = None;
                ride.otp_code = None;
                ride.cancelled_at = Some(now);
            }
            RideTransition::BeginPayment { .. } => {
                ride.payment_status = PaymentStatus::Processing;
                // A retry after FAILED starts a fresh order.
                ride.gateway_order_id = None;
                ride.gateway_payment_id = None;
            }
            RideTransition::RevertPayment => {
                ride.payment_status = PaymentStatus::Pending;
            }
            RideTransition::RecordOrder { order_id } => {
                ride.gateway_order_id = Some(order_id.clone());
            }
            RideTransition::SettlePayment { payment_id, .. } => {
                ride.payment_status = PaymentStatus::Paid;
                ride.gateway_payment_id = Some(payment_id.clone());
            }
            RideTransition::FailPayment { .. } => {
                ride.payment_status = PaymentStatus::Failed;
            }
            RideTransition::MarkPaidCash { .. } => {
                ride.payment_status = PaymentStatus::Paid;
            }
        }
        ride.updated_at = now;
    }
}

/// Conditional updates on the live offer of one `(ride_id, driver_id)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferTransition {
    Accept,
    Reject,
    Expire,
}

impl OfferTransition {
    pub fn name(self) -> &'static str {
        match self {
            OfferTransition::Accept => "accept",
            OfferTransition::Reject => "reject",
            OfferTransition::Expire => "expire",
        }
    }

    pub fn allows(self, offer: &DispatchOffer, now: DateTime<Utc>) -> bool {
        match self {
            // The ride-level accept already decided the winner; only the
            // status is re-checked here.
            OfferTransition::Accept | OfferTransition::Expire => {
                offer.status == OfferStatus::Pending
            }
            OfferTransition::Reject => offer.is_live(now),
        }
    }

    pub fn apply(self, offer: &mut DispatchOffer, now: DateTime<Utc>) {
        offer.status = match self {
            OfferTransition::Accept => OfferStatus::Accepted,
            OfferTransition::Reject => OfferStatus::Rejected,
            OfferTransition::Expire => OfferStatus::Expired,
        };
        offer.resolved_at = Some(now);
    }
}

/// Bulk expiry selectors. Each selected offer is expired with its own
/// conditional update, so sweeps are idempotent and safe to overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OfferSweep {
    /// Every pending offer whose window has closed.
    Stale,
    /// Pending offers of a ride, except the given driver's.
    Siblings { ride_id: Uuid, keep_driver: String },
    /// Every pending offer of a ride.
    Ride { ride_id: Uuid },
}

impl OfferSweep {
    pub fn selects(&self, offer: &DispatchOffer, now: DateTime<Utc>) -> bool {
        if offer.status != OfferStatus::Pending {
            return false;
        }
        match self {
            OfferSweep::Stale => offer.expires_at <= now,
            OfferSweep::Siblings {
                ride_id,
                keep_driver,
            } => offer.ride_id == *ride_id && offer.driver_id != *keep_driver,
            OfferSweep::Ride { ride_id } => offer.ride_id == *ride_id,
        }
    }
}

/// Conditional flips on a driver profile.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverTransition {
    GoOnline,
    GoOffline,
    Claim,
    Release,
    Locate(GeoPoint),
}

impl DriverTransition {
    pub fn name(&self) -> &'static str {
        match self {
            DriverTransition::GoOnline => "go_online",
            DriverTransition::GoOffline => "go_offline",
            DriverTransition::Claim => "claim",
            DriverTransition::Release => "release",
            DriverTransition::Locate(_) => "locate",
        }
    }

    pub fn allows(&self, driver: &DriverProfile) -> bool {
        match self {
            DriverTransition::GoOnline => !driver.is_online,
            // A claimed driver holds a ride and cannot leave mid-trip.
            DriverTransition::GoOffline => driver.is_online && driver.is_available,
            DriverTransition::Locate(_) => driver.is_online,
            DriverTransition::Claim => driver.is_online && driver.is_available,
            DriverTransition::Release => driver.is_online && !driver.is_available,
        }
    }

    pub fn apply(&self, driver: &mut DriverProfile, now: DateTime<Utc>) {
        match self {
            DriverTransition::GoOnline => {
                driver.is_online = true;
                driver.is_available = true;
            }
            DriverTransition::GoOffline => {
                driver.is_online = false;
                driver.is_available = false;
            }
            DriverTransition::Claim => driver.is_available = false,
            DriverTransition::Release => driver.is_available = true,
            DriverTransition::Locate(point) => driver.location = Some(*point),
        }
        driver.updated_at = now;
    }
}
