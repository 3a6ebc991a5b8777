// Small helpers shared by multiple packet types, grounded on hebo's codec::utils.

use rand::Rng;

/// Generate a random client identifier for clients that connect with an
/// empty `ClientId` and `AllowEmptyClientId` is enabled [MQTT-3.1.3-6].
#[must_use]
pub fn random_client_id() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    let id: String = (0..22)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect();
    format!("monstermq-{id}")
}
