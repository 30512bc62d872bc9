// Engine settings shared by every subcommand

use log::warn;
use segmap_map::ErrorPolicy;
use segmap_order::AssemblyMode;

/// Record warnings for ignored and overwritten order segments.
pub const STRICT_VAR: &str = "SEGMAP_STRICT";
/// Stop mapping a message at its first failing field.
pub const FAIL_FAST_VAR: &str = "SEGMAP_FAIL_FAST";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineConfig {
    pub strict_orders: bool,
    pub error_policy: ErrorPolicy,
}

impl EngineConfig {
    /// Defaults overridden by `SEGMAP_STRICT` and `SEGMAP_FAIL_FAST`.
    pub fn from_env() -> Self {
        Self::default().with_vars(|name| std::env::var(name).ok())
    }

    /// Apply overrides from a variable source. Unparseable values are
    /// reported and ignored.
    pub fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(strict) = var(STRICT_VAR).and_then(|v| flag(STRICT_VAR, &v)) {
            self.strict_orders = strict;
        }
        if let Some(fail_fast) = var(FAIL_FAST_VAR).and_then(|v| flag(FAIL_FAST_VAR, &v)) {
            self.error_policy = if fail_fast {
                ErrorPolicy::FailFast
            } else {
                ErrorPolicy::CollectAll
            };
        }
        self
    }

    pub fn assembly_mode(&self) -> AssemblyMode {
        if self.strict_orders {
            AssemblyMode::Strict
        } else {
            AssemblyMode::Lenient
        }
    }
}

fn flag(name: &str, value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        other => {
            warn!("ignoring {name}={other:?}: expected a boolean");
            None
        }
    }
}
