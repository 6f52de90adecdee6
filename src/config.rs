// CONFIGURATION MANAGEMENT
//
// Config is set once, before first enqueue (spec.md §6). A malformed Config
// is rejected at construction time with a ConfigError rather than panicking
// the way internal invariant violations do -- this is the one place the
// scheduler propagates a Result, matching SPEC_FULL.md §7.
//
//   Config - DRR scheduler configuration (n, byte_limit, quantum, mask)
//   SfqConfig - SFQ scheduler configuration (adds admission/perturbation knobs)
//   ConfigError - why construction was refused
//   MtuProvider - collaborator consulted once at init if quantum is unset

use std::error::Error;
use std::fmt;

pub trait MtuProvider {
    fn mtu(&self) -> u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    NoFilterInstalled,
    PreexistingFlowClasses,
    PreexistingInternalQueues,
    ZeroFlows,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let msg = match self {
            ConfigError::NoFilterInstalled =>
                "scheduler needs at least one installed packet filter",
            ConfigError::PreexistingFlowClasses =>
                "scheduler cannot be constructed with pre-attached flow classes",
            ConfigError::PreexistingInternalQueues =>
                "scheduler cannot be constructed with pre-attached internal queues",
            ConfigError::ZeroFlows =>
                "scheduler needs a non-zero flow count (n)",
        };
        f.write_str(msg)
    }
}

impl Error for ConfigError {}

#[derive(Clone, Debug)]
pub struct Config {
    pub n: usize,
    pub byte_limit: u64,
    pub quantum: Option<u32>,
    pub network_mask: Option<u32>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            n: 1024,
            byte_limit: 10 * 1024,
            quantum: None,
            network_mask: None,
        }
    }
}

impl Config {
    pub fn new() -> Config {
        Config::default()
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.n == 0 {
            return Err(ConfigError::ZeroFlows);
        }
        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct SfqConfig {
    pub n: usize,
    pub max_packets: usize,
    pub quantum: Option<u32>,
    pub mean_packet_size: u32,
    pub ns2_style: bool,
    pub perturbation_interval: Option<std::time::Duration>,
    pub network_mask: Option<u32>,
}

impl Default for SfqConfig {
    fn default() -> SfqConfig {
        SfqConfig {
            n: 1024,
            max_packets: 10 * 1024,
            quantum: None,
            mean_packet_size: 500,
            ns2_style: false,
            perturbation_interval: None,
            network_mask: None,
        }
    }
}

impl SfqConfig {
    pub fn new() -> SfqConfig {
        SfqConfig::default()
    }

    pub fn check(&self) -> Result<(), ConfigError> {
        if self.n == 0 {
            return Err(ConfigError::ZeroFlows);
        }
        Ok(())
    }

    // max_packets / n, rounded down per spec.md's Glossary definition.
    pub fn fairshare(&self) -> usize {
        self.max_packets / self.n
    }
}

#[cfg(test)]
mod selftest {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = Config::new();
        assert_eq!(c.n, 1024);
        assert_eq!(c.byte_limit, 10 * 1024);
        assert_eq!(c.quantum, None);
    }

    #[test]
    fn zero_flows_rejected() {
        let mut c = Config::new();
        c.n = 0;
        assert_eq!(c.check(), Err(ConfigError::ZeroFlows));
    }

    #[test]
    fn fairshare_rounds_down() {
        let mut c = SfqConfig::new();
        c.max_packets = 10;
        c.n = 4;
        assert_eq!(c.fairshare(), 2);
    }
}
