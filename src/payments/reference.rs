use rand::Rng;

use crate::models::PurchaseKind;

/// Build a fresh gateway reference for one checkout attempt.
///
/// Format: `{pv|pe}_{subject_id}_{unix_millis}{6 hex}`. The random suffix keeps
/// concurrent checkouts for the same subject within one millisecond apart.
pub fn generate_reference(kind: PurchaseKind, subject_id: &str) -> String {
    let prefix = match kind {
        PurchaseKind::Course => "pv",
        PurchaseKind::Ebook => "pe",
    };

    // Gateways restrict references to [A-Za-z0-9._=-]
    let subject: String = subject_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .take(48)
        .collect();

    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::thread_rng().gen_range(0..0x100_0000);

    format!("{}_{}_{}{:06x}", prefix, subject, millis, suffix)
}
