//! Output sink abstraction.
//!
//! The merge engine only ever appends byte runs; everything about the
//! physical destination hides behind [`Sink`]. [`RoutableSink`] adds the
//! one trick the decoration pipeline needs: the destination can be decided
//! (and re-decided) after writing logic is already wired up, with the real
//! destination created lazily on first use. A caller can thereby inspect
//! captured content and only then choose whether the processed or the raw
//! page goes to the final destination, without buffering everything twice.

use std::io::Write;

use crate::error::Result;

/// Append-only destination for byte runs.
pub trait Sink {
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-memory sink; the common case for building a merged page buffer.
impl Sink for Vec<u8> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.extend_from_slice(bytes);
        Ok(())
    }
}

/// Adapter for any `std::io::Write` destination (files, sockets).
pub struct WriteSink<W: Write>(pub W);

impl<W: Write> Sink for WriteSink<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.0.write_all(bytes)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.0.flush()?;
        Ok(())
    }
}

/// Deferred constructor for a sink destination. Only invoked when bytes
/// actually need somewhere to go.
pub type SinkFactory = Box<dyn FnOnce() -> Result<Box<dyn Sink>> + Send>;

enum Route {
    Pending(SinkFactory),
    Live(Box<dyn Sink>),
    // A factory returned an error; the sink stays unusable until rebound.
    Failed,
}

/// A sink whose destination can be swapped at any point.
///
/// Rebinding before the first write means the previously pending factory is
/// dropped uninvoked; its destination is never instantiated. Rebinding after
/// writes have happened drops the live handle but cannot claw back bytes
/// already written to it.
pub struct RoutableSink {
    route: Route,
}

impl RoutableSink {
    pub fn new(factory: SinkFactory) -> Self {
        RoutableSink {
            route: Route::Pending(factory),
        }
    }

    /// Route all future writes to the destination this factory creates.
    pub fn rebind(&mut self, factory: SinkFactory) {
        self.route = Route::Pending(factory);
    }

    fn destination(&mut self) -> Result<&mut Box<dyn Sink>> {
        if matches!(self.route, Route::Pending(_)) {
            if let Route::Pending(factory) = std::mem::replace(&mut self.route, Route::Failed) {
                self.route = Route::Live(factory()?);
            }
        }
        match &mut self.route {
            Route::Live(dest) => Ok(dest),
            Route::Pending(_) | Route::Failed => Err(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "output destination unavailable; sink requires rebind",
            )
            .into()),
        }
    }
}

impl Sink for RoutableSink {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.destination()?.write(bytes)
    }

    fn flush(&mut self) -> Result<()> {
        self.destination()?.flush()
    }

    fn close(&mut self) -> Result<()> {
        self.destination()?.close()
    }
}
