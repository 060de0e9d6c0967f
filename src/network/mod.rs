//! Network module - scan targets, reverse DNS, neighbour cache

mod dns;
mod neighbor;
mod target;

pub use dns::{lookup_hostnames, reverse_lookup};
pub use neighbor::{lookup_mac, parse_arp_output, parse_proc_net_arp, pick_mac, NeighborEntry};
pub use target::{is_special_address, ScanTarget};
