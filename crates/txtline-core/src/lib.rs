//! txtline-core: frame wire format, fragmentation, and the TXT name mapper.
//! The store, API and binaries all depend on this one.

pub mod clock;
pub mod config;
pub mod error;
pub mod fragment;
pub mod names;
pub mod wire;
pub mod zone;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ChannelConfig, Encoding, ProtocolConfig, ServerConfig, TxtlineConfig};
pub use error::{FrameError, ProtocolError, SizeError};
pub use fragment::{Fragmenter, Message};
pub use names::{ChannelMapper, Manifest, RecordKind, TxtRecord};
pub use wire::{Frame, FrameCodec, FrameHeader};
pub use zone::{parse_zone, render_zone, ZoneContents};
