pub mod framer;
pub mod hex;
pub mod packet;

pub use framer::StreamFramer;
pub use packet::{decode_packet, is_packet_like, PACKET_GRAMMAR};
