//! Checkout state machine over the fake automation layer.

#[allow(dead_code)]
mod common;

use std::sync::atomic::Ordering;

use common::{FakeDriver, FakeWorld, RecordingObserver};
use trolley::observer::{CheckoutStage, FlowEvent};
use trolley::site::selectors;
use trolley::types::Credentials;

fn credentials() -> Credentials {
    Credentials::new("user@test.local", "secret")
}

#[tokio::test]
async fn completes_payment_through_the_slot_modal() {
    let world = FakeWorld::new();
    let driver = FakeDriver::new(world.clone());
    let observer = RecordingObserver::new();

    world.slot_available.store(true, Ordering::SeqCst);

    trolley::checkout(&driver, &credentials(), "user@upi", &observer)
        .await
        .unwrap();

    let events = observer.events();
    let stage_positions: Vec<CheckoutStage> = events
        .iter()
        .filter_map(|e| match e {
            FlowEvent::CheckoutStage { stage } => Some(*stage),
            _ => None,
        })
        .collect();
    assert_eq!(
        stage_positions,
        vec![
            CheckoutStage::SlotModalShown,
            CheckoutStage::SlotPicked,
            CheckoutStage::AddressConfirmed,
            CheckoutStage::UpiSelected,
        ]
    );
    assert!(observer.contains(&FlowEvent::PaymentSubmitted));
    assert!(observer.contains(&FlowEvent::PaymentSettled { confirmed: true }));

    // The UPI ID was typed and the pay control clicked.
    assert_eq!(
        world.count_containing(&format!("type:{}", selectors::UPI_ID_INPUT)),
        1
    );
    assert_eq!(
        world.count_containing(&format!("click:{}", selectors::PAY_BUTTON)),
        1
    );

    // Dedicated browser and page released.
    assert_eq!(world.handle_launches.load(Ordering::SeqCst), 1);
    assert_eq!(world.handle_closes.load(Ordering::SeqCst), 1);
    assert_eq!(world.live_pages.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_modal_goes_straight_to_payment() {
    let world = FakeWorld::new();
    let driver = FakeDriver::new(world.clone());
    let observer = RecordingObserver::new();

    world.mark_missing(selectors::SLOT_MODAL_VISIBLE);

    trolley::checkout(&driver, &credentials(), "user@upi", &observer)
        .await
        .unwrap();

    assert!(observer.contains(&FlowEvent::CheckoutStage {
        stage: CheckoutStage::DirectToPayment
    }));
    assert!(observer.contains(&FlowEvent::PaymentSubmitted));
    // The delivery-slot script never ran.
    assert_eq!(world.count_containing("evaluate"), 0);
}

#[tokio::test]
async fn step_failure_is_a_hard_error_with_resources_released() {
    let world = FakeWorld::new();
    let driver = FakeDriver::new(world.clone());
    let observer = RecordingObserver::new();

    world.slot_available.store(true, Ordering::SeqCst);
    world.mark_missing(selectors::UPI_ID_INPUT);

    let result = trolley::checkout(&driver, &credentials(), "user@upi", &observer).await;
    assert!(result.is_err());

    assert!(!observer.contains(&FlowEvent::PaymentSubmitted));
    assert_eq!(world.handle_closes.load(Ordering::SeqCst), 1);
    assert_eq!(world.live_pages.load(Ordering::SeqCst), 0);
}
