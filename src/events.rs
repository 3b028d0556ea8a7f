use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Domain events emitted by the service layer after state changes commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: i64,
        invoice_no: String,
    },
    OrderStatusChanged {
        order_id: i64,
        old_status: String,
        new_status: String,
    },
    StockRestored {
        order_id: i64,
        size_variant_id: i64,
        quantity: i32,
    },
    CouponRedeemed {
        coupon_id: i64,
        order_id: i64,
    },
    WheelSpun {
        order_ref: String,
        coupon_id: i64,
    },
    OtpIssued {
        phone_number: String,
        delivered: bool,
    },
    UserRegistered {
        user_id: i64,
        provider: String,
    },
    ReviewSubmitted {
        review_id: i64,
        product_id: i64,
        verified_buyer: bool,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event. Delivery is best-effort; a full or closed channel is
    /// logged and never fails the caller.
    pub async fn send(&self, event: Event) {
        if let Err(e) = self.sender.send(event).await {
            warn!(error = %e, "Failed to dispatch domain event");
        }
    }
}

/// Background consumer draining the event channel into the log. External
/// delivery (webhooks, analytics) would hang off this loop.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                invoice_no,
            } => {
                info!(order_id, invoice_no = %invoice_no, "event: order created");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(order_id, old_status = %old_status, new_status = %new_status, "event: order status changed");
            }
            Event::StockRestored {
                order_id,
                size_variant_id,
                quantity,
            } => {
                info!(order_id, size_variant_id, quantity, "event: stock restored");
            }
            Event::CouponRedeemed {
                coupon_id,
                order_id,
            } => {
                info!(coupon_id, order_id, "event: coupon redeemed");
            }
            Event::WheelSpun {
                order_ref,
                coupon_id,
            } => {
                info!(order_ref = %order_ref, coupon_id, "event: wheel spun");
            }
            Event::OtpIssued {
                phone_number,
                delivered,
            } => {
                info!(phone_number = %phone_number, delivered, "event: otp issued");
            }
            Event::UserRegistered { user_id, provider } => {
                info!(user_id, provider = %provider, "event: user registered");
            }
            Event::ReviewSubmitted {
                review_id,
                product_id,
                verified_buyer,
            } => {
                info!(review_id, product_id, verified_buyer, "event: review submitted");
            }
        }
    }
    info!("Event channel closed; consumer exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_is_best_effort_after_receiver_drop() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        // Must not panic or error out.
        EventSender::new(tx)
            .send(Event::OrderCreated {
                order_id: 1,
                invoice_no: "NC-2025-0001".into(),
            })
            .await;
    }

    #[tokio::test]
    async fn events_round_trip_through_channel() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender
            .send(Event::WheelSpun {
                order_ref: "42".into(),
                coupon_id: 7,
            })
            .await;

        match rx.recv().await {
            Some(Event::WheelSpun {
                order_ref,
                coupon_id,
            }) => {
                assert_eq!(order_ref, "42");
                assert_eq!(coupon_id, 7);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
