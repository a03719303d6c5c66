#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Arbitrary TOML must either fail to parse or validate without panicking;
    // a config that validates must also satisfy the cross-field burst limit.
    if let Ok(cfg) = stim_config::load_toml(data)
        && cfg.validate().is_ok()
    {
        let period_s = 1.0 / cfg.shock.burst_freq;
        assert!(f64::from(cfg.shock.pulse_dur_ms) / 1000.0 <= period_s);
        assert!(cfg.display.refresh_hz > 0.0);
    }
});
