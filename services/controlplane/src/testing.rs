//! Fixtures shared by the unit tests of the service modules.
use crate::clock::Clock;
use crate::model::StackOutputs;
use crate::provision::Provisioner;
use crate::provision::standard::{StandardStackParams, standard_template};
use crate::store::GuestflagStore;
use crate::store::memory::InMemoryStore;
use chrono::{DateTime, Utc};
use guestflag_authz::{AccountId, Region, SigningKey, SigningKeys};
use std::sync::Arc;

pub(crate) const TEST_REGION: &str = "local-1";
pub(crate) const TEST_ACCOUNT: &str = "000000000000";
pub(crate) const TEST_STACK: &str = "InfraStack";

pub(crate) fn test_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).expect("timestamp")
}

pub(crate) fn test_keys(seed: u8) -> SigningKeys {
    SigningKeys {
        current: SigningKey::from_seed(format!("k{seed}"), [seed; 32]),
        previous: Vec::new(),
    }
}

/// Store holding the standard stack applied at the clock's current time.
pub(crate) async fn provisioned_store(
    clock: Arc<dyn Clock>,
) -> (Arc<dyn GuestflagStore>, StackOutputs) {
    let store: Arc<dyn GuestflagStore> = Arc::new(InMemoryStore::new());
    let provisioner = Provisioner::new(
        store.clone(),
        Region::new(TEST_REGION),
        AccountId::new(TEST_ACCOUNT),
        clock.clone(),
    );
    let template =
        standard_template(&StandardStackParams::default(), clock.now()).expect("template");
    let outcome = provisioner
        .apply(TEST_STACK, template)
        .await
        .expect("apply standard stack");
    (store, outcome.outputs)
}
