//! Wire and text formats spoken by aliver: ICMPv4 echo messages and the
//! neighbor cache dumps of the supported operating systems.

pub mod icmp;
pub mod neighbor;
