use crate::config::ConvertConfig;
use sha2::{Digest, Sha256};

pub fn sha256_hex(s: &str) -> String {
    let mut h = Sha256::new();
    h.update(s.as_bytes());
    hex::encode(h.finalize())
}

/// Fingerprint of every setting that changes what a conversion produces.
///
/// A cache record made under a different fingerprint must not be reused. Runner,
/// timeout and discovery settings are left out: they decide whether a submission
/// converts at all, not what its matrix looks like.
pub fn config_fingerprint(cfg: &ConvertConfig) -> String {
    let parts = [
        format!("goal={}", cfg.goal),
        format!("rolls={}..={}", cfg.min_rolls, cfg.max_rolls),
        format!("default_roll={}", cfg.default_roll),
        format!("entry_point={}", cfg.entry_point),
        format!("name_fields={}", cfg.name_fields.join(",")),
        format!("max_name_len={}", cfg.max_name_len),
        format!("empty_name_template={}", cfg.empty_name_template),
        // Invalidate everything on upgrade.
        format!("hogconv_version={}", env!("CARGO_PKG_VERSION")),
    ];
    sha256_hex(&parts.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_for_equal_configs() {
        let a = ConvertConfig::default();
        let b = ConvertConfig::default();
        assert_eq!(config_fingerprint(&a), config_fingerprint(&b));
        assert_eq!(config_fingerprint(&a).len(), 64);
    }

    #[test]
    fn changes_with_output_shape() {
        let base = config_fingerprint(&ConvertConfig::default());
        let goal = ConvertConfig {
            goal: 50,
            ..ConvertConfig::default()
        };
        let roll = ConvertConfig {
            default_roll: 4,
            ..ConvertConfig::default()
        };
        assert_ne!(base, config_fingerprint(&goal));
        assert_ne!(base, config_fingerprint(&roll));
    }

    #[test]
    fn ignores_timeout() {
        let slow = ConvertConfig {
            timeout_secs: 600,
            ..ConvertConfig::default()
        };
        assert_eq!(
            config_fingerprint(&ConvertConfig::default()),
            config_fingerprint(&slow)
        );
    }
}
