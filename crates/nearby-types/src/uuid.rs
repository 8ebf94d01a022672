//! Bluetooth UUIDs for the proximity identity service.
//!
//! Every participating device advertises [`PROXIMITY_SERVICE`] and exposes
//! its identity payload through [`IDENTITY_CHARACTERISTIC`].

use uuid::{Uuid, uuid};

/// Service UUID advertised by participating devices. Discovery filters on it.
pub const PROXIMITY_SERVICE: Uuid = uuid!("6e1f0c2a-5b3d-4f8e-9a41-7c2d9b0e5a10");

/// Readable characteristic carrying the `"<user id>,<name>"` identity payload.
pub const IDENTITY_CHARACTERISTIC: Uuid = uuid!("6e1f0c2b-5b3d-4f8e-9a41-7c2d9b0e5a10");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_and_characteristic_differ() {
        assert_ne!(PROXIMITY_SERVICE, IDENTITY_CHARACTERISTIC);
    }
}
