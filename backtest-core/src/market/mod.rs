//! Market data primitives: immutable ticks, OHLC bars, and the
//! `BarRenderer` that aggregates one into the other (spec §3, §4.5).

pub mod bar;
pub mod renderer;
pub mod tick;

pub use bar::{Bar, Timeframe};
pub use renderer::BarRenderer;
pub use tick::Tick;
