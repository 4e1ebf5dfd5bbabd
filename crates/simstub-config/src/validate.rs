use crate::config::Config;
use crate::error::ConfigError;

/// Smallest packet size worth advertising; `g` on small cores fits.
pub const MIN_PACKET_SIZE: usize = 64;
/// Largest packet size accepted.
pub const MAX_PACKET_SIZE: usize = 65536;

fn violation(field: &str, message: String) -> ConfigError {
    ConfigError::Validation {
        field: field.to_string(),
        message,
    }
}

/// Validate a [`Config`], returning all detected violations.
///
/// Returns `Ok(())` when the config is valid, or `Err` with a
/// vector of every validation error found.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.server.port == 0 {
        errors.push(violation("server.port", "must not be 0".to_string()));
    }

    if config.server.bind_address.trim().is_empty() {
        errors.push(violation("server.bind_address", "must not be empty".to_string()));
    }

    let packet = config.session.max_packet_size;
    if !(MIN_PACKET_SIZE..=MAX_PACKET_SIZE).contains(&packet) {
        errors.push(violation(
            "session.max_packet_size",
            format!("must be {MIN_PACKET_SIZE}..={MAX_PACKET_SIZE}, got {packet}"),
        ));
    }

    if config.session.max_retransmits == 0 {
        errors.push(violation("session.max_retransmits", "must be at least 1".to_string()));
    }

    if config.session.max_framing_errors == 0 {
        errors.push(violation(
            "session.max_framing_errors",
            "must be at least 1".to_string(),
        ));
    }

    let machine = &config.machine;
    if machine.registers == 0 {
        errors.push(violation("machine.registers", "must be at least 1".to_string()));
    }
    if !(1..=8).contains(&machine.register_width) {
        errors.push(violation(
            "machine.register_width",
            format!("must be 1..=8, got {}", machine.register_width),
        ));
    }
    if machine.pc_register >= machine.registers.max(1) {
        errors.push(violation(
            "machine.pc_register",
            format!(
                "must be below the register count {}, got {}",
                machine.registers, machine.pc_register
            ),
        ));
    }
    if machine.memory_size == 0 {
        errors.push(violation("machine.memory_size", "must not be 0".to_string()));
    }
    if machine.instruction_width == 0 {
        errors.push(violation(
            "machine.instruction_width",
            "must not be 0".to_string(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_error_field(cfg: &Config) -> String {
        let errs = validate(cfg).unwrap_err();
        assert_eq!(errs.len(), 1, "{errs:?}");
        format!("{}", errs[0])
    }

    #[test]
    fn valid_default_config_passes() {
        let cfg = Config::default();
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn port_zero_rejected() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        assert!(single_error_field(&cfg).contains("server.port"));
    }

    #[test]
    fn empty_bind_address_rejected() {
        let mut cfg = Config::default();
        cfg.server.bind_address = "  ".into();
        assert!(single_error_field(&cfg).contains("server.bind_address"));
    }

    #[test]
    fn packet_size_bounds() {
        let mut cfg = Config::default();
        cfg.session.max_packet_size = 63;
        assert!(single_error_field(&cfg).contains("session.max_packet_size"));
        cfg.session.max_packet_size = 65537;
        assert!(single_error_field(&cfg).contains("got 65537"));
        cfg.session.max_packet_size = 64;
        assert!(validate(&cfg).is_ok());
        cfg.session.max_packet_size = 65536;
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn zero_retry_limits_rejected() {
        let mut cfg = Config::default();
        cfg.session.max_retransmits = 0;
        assert!(single_error_field(&cfg).contains("session.max_retransmits"));

        let mut cfg = Config::default();
        cfg.session.max_framing_errors = 0;
        assert!(single_error_field(&cfg).contains("session.max_framing_errors"));
    }

    #[test]
    fn register_width_out_of_range() {
        let mut cfg = Config::default();
        cfg.machine.register_width = 9;
        assert!(single_error_field(&cfg).contains("machine.register_width"));
    }

    #[test]
    fn pc_register_must_exist() {
        let mut cfg = Config::default();
        cfg.machine.pc_register = 33;
        assert!(single_error_field(&cfg).contains("machine.pc_register"));
    }

    #[test]
    fn multiple_errors_returned() {
        let mut cfg = Config::default();
        cfg.server.port = 0;
        cfg.session.max_packet_size = 0;
        cfg.machine.memory_size = 0;
        cfg.machine.instruction_width = 0;
        let errs = validate(&cfg).unwrap_err();
        assert_eq!(errs.len(), 4);
    }
}
