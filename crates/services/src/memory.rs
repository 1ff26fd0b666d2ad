use sysinfo::System;

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Memory currently available to new processes, in GB.
pub fn available_gb() -> f64 {
    let mut sys = System::new();
    sys.refresh_memory();
    sys.available_memory() as f64 / GIB
}

/// Human-readable line for the model picker.
pub fn describe_available(gb: f64) -> String {
    format!("{:.2} GB of available memory", gb)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_memory_is_positive() {
        assert!(available_gb() > 0.0);
    }

    #[test]
    fn test_describe_rounds_to_two_places() {
        assert_eq!(describe_available(7.4567), "7.46 GB of available memory");
    }
}
