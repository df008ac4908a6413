//! Sink implementations
//!
//! Contains RawSink, FramedSink, HexdumpSink, the built-in plugin sinks
//! (TraceSink, CountSink) and NullSink.

mod count;
mod file;
mod framed;
mod hexdump;
mod null;
mod raw;
mod trace;

pub use self::count::CountSink;
pub use self::file::AppendFile;
pub use self::framed::FramedSink;
pub use self::hexdump::HexdumpSink;
pub use self::null::NullSink;
pub use self::raw::RawSink;
pub use self::trace::TraceSink;
