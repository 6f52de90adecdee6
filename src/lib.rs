// CRATE ROOT
//
// A Deficit Round Robin fair-queueing scheduler, with a Stochastic Fairness
// Queueing variant, for a network egress point. See SPEC_FULL.md for the
// full component breakdown; module docs below point to the file grounding
// each one.

pub mod packet;
pub mod classifier;
pub mod flow;
pub mod config;
pub mod stats;
pub mod drr;
pub mod sfq;

pub use classifier::{Classifier, Family, PROTOCOL_TCP, PROTOCOL_UDP};
pub use config::{Config, ConfigError, MtuProvider, SfqConfig};
pub use drr::Drr;
pub use packet::{Address, PacketDescriptor};
pub use sfq::Sfq;
pub use stats::{DropReason, DropSink, Stats};
